//! `bulkhead check` command
//!
//! Fails when a denied violation is found, when an interface is withheld, or
//! when the written artifacts differ from a fresh analysis.

use anyhow::{bail, Result};

use super::{analyze, apply_output, context, deny_list, failure_summary, plural, report_json, report_problems, shell};
use crate::cli::{CheckArgs, GlobalOpts};
use bulkhead::ops::{check_artifacts, ArtifactState};
use bulkhead::util::diagnostic::suggestions;
use bulkhead::util::shell::Status;

pub fn execute(args: CheckArgs, global: GlobalOpts) -> Result<()> {
    let mut ctx = context(global, &args.input)?;
    let format = apply_output(&mut ctx, &args.output)?;
    let deny = deny_list(&ctx, &args.analysis)?;
    let shell = shell(global, args.analysis.json);

    let (_, report) = analyze(&ctx, &shell, &args.analysis)?;
    report_problems(&shell, &report, &deny);

    let states = if args.no_artifacts {
        Vec::new()
    } else {
        let out_dir = ctx.out_dir();
        shell.status(Status::Checking, ctx.display_path(&out_dir));
        let mut states = check_artifacts(
            &out_dir,
            report.interfaces.iter().map(|i| &i.artifact),
            format,
        )?;
        // A filtered run can't tell orphans from other packages' files.
        if !args.analysis.packages.is_empty() {
            states.retain(|(_, state)| *state != ArtifactState::Orphaned);
        }
        states
    };

    let mut out_of_date = 0;
    for (path, state) in &states {
        let (status, label) = match state {
            ArtifactState::Fresh => (Status::Fresh, None),
            ArtifactState::Stale => (Status::Stale, None),
            ArtifactState::Missing => (Status::Stale, Some("missing")),
            ArtifactState::Orphaned => (Status::Stale, Some("orphaned")),
        };
        if !state.is_fresh() {
            out_of_date += 1;
        }
        if !state.is_fresh() || shell.is_verbose() {
            match label {
                Some(label) => shell.status(status, format!("{} ({})", ctx.display_path(path), label)),
                None => shell.status(status, ctx.display_path(path)),
            }
        }
    }

    if shell.is_json() {
        let mut doc = report_json(&report);
        doc["artifacts"] = serde_json::json!(states
            .iter()
            .map(|(path, state)| serde_json::json!({ "path": path, "state": state }))
            .collect::<Vec<_>>());
        shell.json(&doc);
    }

    let mut problems = Vec::new();
    if let Some(summary) = failure_summary(&report, &deny) {
        problems.push(summary);
    }
    if out_of_date > 0 {
        if !shell.is_json() {
            eprintln!("{}", suggestions::STALE_INTERFACES);
        }
        problems.push(format!(
            "{} out-of-date artifact{}",
            out_of_date,
            plural(out_of_date)
        ));
    }

    if !problems.is_empty() {
        bail!("check failed: {}", problems.join(", "));
    }

    let violations = report.violations().count();
    shell.status(
        Status::Finished,
        format!(
            "{} interface{} checked, {} violation{}",
            report.interfaces.len(),
            plural(report.interfaces.len()),
            violations,
            plural(violations)
        ),
    );
    Ok(())
}
