//! High-level operations.
//!
//! This module contains the implementation of Bulkhead commands.

pub mod analyze;
pub mod inspect;
pub mod write;

pub use analyze::{Analysis, AnalysisReport, AnalyzeOptions, PackageInterface, PackageOutcome};
pub use inspect::{closure_entries, explain_symbol, package_summaries, ClosureEntry, ExplainStep, PackageSummary};
pub use write::{
    artifact_path, check_artifacts, remove_artifacts, render, write_artifacts, ArtifactState, OutputFormat,
    WriteStatus,
};
