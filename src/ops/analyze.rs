//! Whole-project analysis: load inputs once, then compute every package's
//! interface in parallel.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::core::manifest::load_all;
use crate::core::{ExportTier, Packages, SymbolTable};
use crate::graph::{build_graph, AliasCycleError, ReferenceGraph};
use crate::interface::{emit, validate, Closure, ClosureComputer, InterfaceArtifact, Violation, ViolationKind};
use crate::util::config::CONFIG_FILE;
use crate::util::diagnostic::{suggestions, Diagnostic, Severity};
use crate::util::{GlobalContext, QualifiedName};

/// Shared, read-only inputs of a run.
#[derive(Debug)]
pub struct Analysis {
    pub packages: Packages,
    pub table: SymbolTable,
    pub graph: ReferenceGraph,
}

/// Options for [`Analysis::run`].
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Number of parallel jobs
    pub jobs: usize,

    /// Tiers to compute for every package
    pub tiers: Vec<ExportTier>,

    /// Specific packages to analyze (empty = all)
    pub packages: Vec<String>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        AnalyzeOptions {
            jobs: 1,
            tiers: ExportTier::ALL.to_vec(),
            packages: Vec::new(),
        }
    }
}

/// The interface of one package at one tier.
#[derive(Debug, Clone, Serialize)]
pub struct PackageInterface {
    pub artifact: InterfaceArtifact,
    pub violations: Vec<Violation>,
}

/// Result of one (package, tier) job.
#[derive(Debug, Clone)]
pub enum PackageOutcome {
    Interface(PackageInterface),
    Withheld {
        package: QualifiedName,
        tier: ExportTier,
        error: AliasCycleError,
    },
}

impl PackageOutcome {
    pub fn package(&self) -> QualifiedName {
        match self {
            PackageOutcome::Interface(i) => i.artifact.package,
            PackageOutcome::Withheld { package, .. } => *package,
        }
    }

    pub fn tier(&self) -> ExportTier {
        match self {
            PackageOutcome::Interface(i) => i.artifact.tier,
            PackageOutcome::Withheld { tier, .. } => *tier,
        }
    }
}

/// Everything a run produced, sorted by package then tier.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub interfaces: Vec<PackageInterface>,
    pub withheld: Vec<(QualifiedName, ExportTier, AliasCycleError)>,
    pub unresolved: usize,
}

impl AnalysisReport {
    /// All violations, in package order.
    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.interfaces.iter().flat_map(|i| i.violations.iter())
    }

    /// Violations whose kind is in `deny`.
    pub fn denied<'a>(
        &'a self,
        deny: &'a BTreeSet<ViolationKind>,
    ) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations().filter(move |v| deny.contains(&v.kind()))
    }

    /// Whether the run should fail given a deny list. Withheld artifacts
    /// always fail.
    pub fn is_failure(&self, deny: &BTreeSet<ViolationKind>) -> bool {
        !self.withheld.is_empty() || self.denied(deny).next().is_some()
    }

    /// Diagnostics for every violation and withheld interface. Violations
    /// whose kind is denied are reported as errors.
    pub fn diagnostics(&self, deny: &BTreeSet<ViolationKind>) -> Vec<Diagnostic> {
        let violations = self.violations().map(|v| {
            let diagnostic = v.to_diagnostic();
            if deny.contains(&v.kind()) {
                diagnostic.with_severity(Severity::Error)
            } else {
                diagnostic
            }
        });
        let withheld = self
            .withheld
            .iter()
            .map(|(package, _, error)| error.to_diagnostic(*package));

        violations.chain(withheld).collect()
    }
}

impl Analysis {
    /// Build the shared state from already-parsed inputs.
    pub fn new(table: SymbolTable, manifests: &[crate::core::Manifest]) -> Result<Self> {
        let packages = Packages::load(manifests, &table)?;
        let graph = build_graph(&table);

        tracing::debug!(
            "graph: {} nodes, {} edges, {} packages",
            graph.node_count(),
            graph.edge_count(),
            packages.len()
        );

        Ok(Analysis {
            packages,
            table,
            graph,
        })
    }

    /// Load the symbol table and manifests configured for this context.
    pub fn load(ctx: &GlobalContext) -> Result<Self> {
        let Some(symbols) = ctx.symbols_path() else {
            let help = if ctx.project_root().join(CONFIG_FILE).is_file() {
                suggestions::NO_SYMBOL_TABLE
            } else {
                suggestions::NO_CONFIG
            };
            bail!("no symbol table configured\n{}", help);
        };
        Self::load_from(ctx, &symbols)
    }

    /// Like [`Analysis::load`] with an explicit symbol table path.
    pub fn load_from(ctx: &GlobalContext, symbols: &Path) -> Result<Self> {
        let table = SymbolTable::load(symbols)?;

        let paths = ctx.manifest_paths()?;
        if paths.is_empty() {
            bail!(
                "no package manifests found under {}\n{}",
                ctx.manifest_root().display(),
                suggestions::NO_MANIFESTS
            );
        }
        tracing::debug!("found {} manifests", paths.len());

        let manifests = load_all(&paths)?;
        Self::new(table, &manifests)
            .with_context(|| format!("failed to load packages under {}", ctx.manifest_root().display()))
    }

    pub fn closure_computer(&self) -> ClosureComputer<'_> {
        ClosureComputer::new(&self.packages, &self.table, &self.graph)
    }

    /// Compute the closure of one package.
    pub fn closure_for(&self, package: QualifiedName, tier: ExportTier) -> Result<Closure> {
        if self.packages.get(package).is_none() {
            bail!(
                "package `{}` not found\n{}",
                package,
                suggestions::PACKAGE_NOT_FOUND
            );
        }
        self.closure_computer()
            .closure_for(package, tier)
            .with_context(|| format!("interface for `{}` withheld", package))
    }

    /// Closure, validation and emission for one package and tier.
    pub fn analyze_package(&self, package: QualifiedName, tier: ExportTier) -> PackageOutcome {
        let closure = match self.closure_computer().closure_for(package, tier) {
            Ok(closure) => closure,
            Err(error) => {
                tracing::warn!("withholding {} ({}): {}", package, tier.as_str(), error);
                return PackageOutcome::Withheld {
                    package,
                    tier,
                    error,
                };
            }
        };

        let violations = validate(&self.packages, &self.table, &self.graph, &closure);
        let artifact = emit(&self.table, &self.graph, &closure);

        tracing::debug!(
            "{} ({}): {} symbols, {} violations",
            package,
            tier.as_str(),
            closure.len(),
            violations.len()
        );

        PackageOutcome::Interface(PackageInterface {
            artifact,
            violations: violations.into_iter().collect(),
        })
    }

    /// The packages selected by a filter, or all of them.
    pub fn select_packages(&self, filter: &[String]) -> Result<Vec<QualifiedName>> {
        if filter.is_empty() {
            return Ok(self.packages.names().collect());
        }

        let mut selected = Vec::new();
        for name in filter {
            let name = QualifiedName::new(name);
            if self.packages.get(name).is_none() {
                let known: Vec<_> = self.packages.names().map(|n| n.to_string()).collect();
                bail!(
                    "package `{}` not found\n\
                     available packages: {}",
                    name,
                    if known.is_empty() {
                        "(none)".to_string()
                    } else {
                        known.join(", ")
                    }
                );
            }
            selected.push(name);
        }
        selected.sort();
        selected.dedup();
        Ok(selected)
    }

    /// Analyze every selected (package, tier) pair.
    ///
    /// Jobs run on a dedicated rayon pool sized by `opts.jobs`; `on_done`
    /// is called from the workers as each job completes.
    pub fn run(
        &self,
        opts: &AnalyzeOptions,
        on_done: &(dyn Fn(&PackageOutcome) + Sync),
    ) -> Result<AnalysisReport> {
        let packages = self.select_packages(&opts.packages)?;
        let jobs: Vec<(QualifiedName, ExportTier)> = packages
            .iter()
            .flat_map(|&p| opts.tiers.iter().map(move |&t| (p, t)))
            .collect();

        tracing::info!("Analyzing {} packages ({} jobs)", packages.len(), jobs.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.jobs.max(1))
            .build()
            .context("failed to start analysis thread pool")?;

        let mut outcomes: Vec<PackageOutcome> = pool.install(|| {
            jobs.par_iter()
                .map(|&(package, tier)| {
                    let outcome = self.analyze_package(package, tier);
                    on_done(&outcome);
                    outcome
                })
                .collect()
        });
        outcomes.sort_by_key(|o| (o.package(), o.tier()));

        let mut report = AnalysisReport {
            unresolved: self.graph.unresolved().len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                PackageOutcome::Interface(mut interface) => {
                    // The test-only report lists only what the test tier adds.
                    if interface.artifact.tier == ExportTier::TestOnly {
                        if let Some(public) = report.interfaces.last().filter(|p| {
                            p.artifact.package == interface.artifact.package
                                && p.artifact.tier == ExportTier::Public
                        }) {
                            interface.violations.retain(|v| !public.violations.contains(v));
                        }
                    }
                    report.interfaces.push(interface)
                }
                PackageOutcome::Withheld {
                    package,
                    tier,
                    error,
                } => report.withheld.push((package, tier, error)),
            }
        }

        Ok(report)
    }
}
