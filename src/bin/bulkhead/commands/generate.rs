//! `bulkhead generate` command

use std::time::Instant;

use anyhow::{bail, Result};

use super::{analyze, apply_output, context, deny_list, failure_summary, plural, report_json, report_problems, shell};
use crate::cli::{GenerateArgs, GlobalOpts};
use bulkhead::ops::{remove_artifacts, write_artifacts, WriteStatus};
use bulkhead::util::shell::{format_duration, Status};

pub fn execute(args: GenerateArgs, global: GlobalOpts) -> Result<()> {
    let start = Instant::now();
    let mut ctx = context(global, &args.input)?;
    let format = apply_output(&mut ctx, &args.output)?;
    let deny = deny_list(&ctx, &args.analysis)?;
    let shell = shell(global, args.analysis.json);

    let (_, report) = analyze(&ctx, &shell, &args.analysis)?;
    report_problems(&shell, &report, &deny);

    let out_dir = ctx.out_dir();
    shell.status(Status::Generating, ctx.display_path(&out_dir));
    let mut written = write_artifacts(
        &out_dir,
        report.interfaces.iter().map(|i| &i.artifact),
        format,
    )?;
    written.extend(remove_artifacts(
        &out_dir,
        report.withheld.iter().map(|(package, tier, _)| (*package, *tier)),
        format,
    )?);

    let mut changed = 0;
    for (path, status) in &written {
        let status = match status {
            WriteStatus::Created => Status::Created,
            WriteStatus::Updated => Status::Updated,
            WriteStatus::Unchanged => Status::Unchanged,
            WriteStatus::Removed => Status::Removed,
        };
        if status != Status::Unchanged {
            changed += 1;
        }
        if status != Status::Unchanged || shell.is_verbose() {
            shell.status(status, ctx.display_path(path));
        }
    }

    if shell.is_json() {
        let mut doc = report_json(&report);
        doc["files"] = serde_json::json!(written
            .iter()
            .map(|(path, status)| serde_json::json!({ "path": path, "status": status }))
            .collect::<Vec<_>>());
        shell.json(&doc);
    }

    let interfaces = report.interfaces.len();
    let violations = report.violations().count();
    shell.status(
        Status::Finished,
        format!(
            "{} interface{} ({} written, {} violation{}) in {}",
            interfaces,
            plural(interfaces),
            changed,
            violations,
            plural(violations),
            format_duration(start.elapsed())
        ),
    );

    if let Some(summary) = failure_summary(&report, &deny) {
        bail!("generate failed: {}", summary);
    }
    Ok(())
}
