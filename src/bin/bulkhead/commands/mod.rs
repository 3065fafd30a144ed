//! Command implementations

pub mod check;
pub mod closure;
pub mod completions;
pub mod generate;
pub mod packages;

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{AnalysisArgs, GlobalOpts, InputArgs, OutputArgs};
use bulkhead::core::ExportTier;
use bulkhead::interface::ViolationKind;
use bulkhead::ops::{Analysis, AnalysisReport, AnalyzeOptions, OutputFormat};
use bulkhead::util::diagnostic::emit;
use bulkhead::util::shell::Status;
use bulkhead::util::{GlobalContext, Shell};

/// Build the context for this invocation, applying CLI overrides on top of
/// the configuration files.
pub fn context(global: GlobalOpts, input: &InputArgs) -> Result<GlobalContext> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(global.verbose);
    ctx.set_color(!global.no_color);

    let config = ctx.config_mut();
    if let Some(symbols) = &input.symbols {
        config.input.symbols = Some(symbols.clone());
    }
    if let Some(root) = &input.root {
        config.input.root = Some(root.clone());
    }

    Ok(ctx)
}

/// Apply output overrides and return the effective format.
pub fn apply_output(ctx: &mut GlobalContext, output: &OutputArgs) -> Result<OutputFormat> {
    let config = ctx.config_mut();
    if let Some(out) = &output.out {
        config.output.dir = Some(out.clone());
    }
    if output.no_test_tier {
        config.output.test_tier = Some(false);
    }
    if let Some(format) = output.format {
        config.output.format = Some(format.as_str().to_string());
    }

    Ok(ctx.config().format()?.unwrap_or_default())
}

/// Combine the configured deny list with `--deny`.
pub fn deny_list(ctx: &GlobalContext, args: &AnalysisArgs) -> Result<BTreeSet<ViolationKind>> {
    let mut deny = ctx.config().deny()?;
    for kind in &args.deny {
        deny.insert(kind.parse::<ViolationKind>().map_err(|e| anyhow::anyhow!(e))?);
    }
    Ok(deny)
}

/// Create the output shell for a command.
pub fn shell(global: GlobalOpts, json: bool) -> Arc<Shell> {
    Arc::new(Shell::from_flags(global.verbose, global.no_color, json))
}

/// Load inputs and analyze every selected package, reporting progress.
pub fn analyze(
    ctx: &GlobalContext,
    shell: &Arc<Shell>,
    args: &AnalysisArgs,
) -> Result<(Analysis, AnalysisReport)> {
    shell.status(Status::Loading, ctx.display_path(&ctx.manifest_root()));
    let analysis = Analysis::load(ctx)?;

    let tiers = if ctx.config().test_tier() {
        ExportTier::ALL.to_vec()
    } else {
        vec![ExportTier::Public]
    };
    let opts = AnalyzeOptions {
        jobs: args.jobs.filter(|&j| j > 0).unwrap_or_else(|| ctx.jobs()),
        tiers,
        packages: args.packages.clone(),
    };

    let total = analysis.select_packages(&opts.packages)?.len() * opts.tiers.len();
    let progress = shell.progress(total as u64, "Analyzing");
    let report = analysis.run(&opts, &|outcome| {
        progress.tick(format!("{} ({})", outcome.package(), outcome.tier().as_str()))
    })?;
    progress.finish();

    Ok((analysis, report))
}

/// Print violations and withheld packages as diagnostics; denied
/// violations are printed as errors.
pub fn report_problems(shell: &Shell, report: &AnalysisReport, deny: &BTreeSet<ViolationKind>) {
    if shell.is_json() {
        return;
    }

    for diagnostic in report.diagnostics(deny) {
        emit(&diagnostic, shell.use_color());
    }
}

/// A one-line summary of the deny-list outcome, or `None` when it passes.
pub fn failure_summary(report: &AnalysisReport, deny: &BTreeSet<ViolationKind>) -> Option<String> {
    if !report.is_failure(deny) {
        return None;
    }

    let mut parts = Vec::new();
    let denied = report.denied(deny).count();
    if denied > 0 {
        parts.push(format!("{} denied violation{}", denied, plural(denied)));
    }
    if !report.withheld.is_empty() {
        let n = report.withheld.len();
        parts.push(format!("{} withheld interface{}", n, plural(n)));
    }
    Some(parts.join(", "))
}

pub fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// The JSON shape shared by `generate --json` and `check --json`.
pub fn report_json(report: &AnalysisReport) -> serde_json::Value {
    serde_json::json!({
        "interfaces": report.interfaces.iter().map(|i| serde_json::json!({
            "package": i.artifact.package,
            "tier": i.artifact.tier,
            "digest": i.artifact.digest,
            "symbols": i.artifact.symbol_count(),
            "violations": i.violations,
        })).collect::<Vec<_>>(),
        "withheld": report.withheld.iter().map(|(package, tier, error)| serde_json::json!({
            "package": package,
            "tier": tier,
            "error": error.to_string(),
        })).collect::<Vec<_>>(),
        "unresolved": report.unresolved,
    })
}
