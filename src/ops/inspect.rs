//! Read-only views over an analysis: package listings, closure listings and
//! "why is this symbol in the interface" chains.

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::core::{ExportTier, SymbolKind};
use crate::graph::EdgeKind;
use crate::interface::{Closure, Reach};
use crate::ops::analyze::Analysis;
use crate::util::QualifiedName;

/// One row of `bulkhead packages`.
#[derive(Debug, Clone, Serialize)]
pub struct PackageSummary {
    pub name: QualifiedName,
    pub manifest: Option<PathBuf>,
    pub dependencies: Vec<QualifiedName>,
    pub dependents: Vec<QualifiedName>,
    pub exports: Vec<QualifiedName>,
    pub test_exports: Vec<QualifiedName>,
}

/// Summarize every package, sorted by name.
pub fn package_summaries(analysis: &Analysis) -> Vec<PackageSummary> {
    let packages = &analysis.packages;

    packages
        .iter()
        .map(|pkg| {
            let exports_at = |tier| pkg.exports(tier).map(|e| e.name).collect::<Vec<_>>();
            PackageSummary {
                name: pkg.name(),
                manifest: pkg.manifest_path().cloned(),
                dependencies: pkg.dependency_names().iter().copied().collect(),
                dependents: packages
                    .dependents_of(pkg.name())
                    .iter()
                    .map(|d| d.name())
                    .collect(),
                exports: exports_at(ExportTier::Public),
                test_exports: exports_at(ExportTier::TestOnly),
            }
        })
        .collect()
}

/// One member of a closure, as listed by `bulkhead closure`.
#[derive(Debug, Clone, Serialize)]
pub struct ClosureEntry {
    pub symbol: QualifiedName,
    pub kind: SymbolKind,
    pub owner: Option<QualifiedName>,
    pub tier: ExportTier,
    pub reach: Reach,
    pub seed: bool,
    /// The symbol and edge that pulled this one in
    pub via: Option<(QualifiedName, EdgeKind)>,
}

/// List a closure's members sorted by name.
pub fn closure_entries(analysis: &Analysis, closure: &Closure) -> Vec<ClosureEntry> {
    let table = &analysis.table;

    let mut entries: Vec<_> = closure
        .iter()
        .map(|(id, membership)| {
            let symbol = table.get(id);
            ClosureEntry {
                symbol: symbol.name,
                kind: symbol.kind,
                owner: symbol.package,
                tier: membership.tier,
                reach: membership.reach,
                seed: closure.is_seed(id),
                via: membership
                    .via
                    .map(|(from, kind)| (table.get(from).name, kind)),
            }
        })
        .collect();
    entries.sort_by_key(|e| e.symbol);
    entries
}

/// One link of an explanation chain.
#[derive(Debug, Clone, Serialize)]
pub struct ExplainStep {
    pub symbol: QualifiedName,
    /// Edge from the previous step; `None` for the export it starts from
    pub edge: Option<EdgeKind>,
}

/// Why `symbol` is part of `closure`: the chain of references from one of
/// the package's exports, export first.
pub fn explain_symbol(
    analysis: &Analysis,
    closure: &Closure,
    symbol: &str,
) -> Result<Vec<ExplainStep>> {
    let Some(id) = analysis.table.lookup(symbol) else {
        bail!("symbol `{}` not found in the symbol table", symbol);
    };

    if !closure.contains(id) {
        bail!(
            "`{}` is not part of the {} interface of `{}`",
            symbol,
            closure.tier().as_str(),
            closure.package()
        );
    }

    Ok(closure
        .path_to(id)
        .into_iter()
        .map(|(id, edge)| ExplainStep {
            symbol: analysis.table.get(id).name,
            edge,
        })
        .collect())
}
