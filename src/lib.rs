//! Bulkhead - minimal public interfaces for modular Ruby codebases
//!
//! This crate computes, for every package of a project, the smallest
//! interface other packages can see: the closure of its exports over the
//! reference graph. It validates that closure against the package privacy
//! rules and emits it as a reproducible stub file.

pub mod core;
pub mod graph;
pub mod interface;
pub mod ops;
pub mod util;

/// Fixtures shared by the unit tests.
#[cfg(test)]
pub mod test_support;

pub use core::{ExportTier, Manifest, Package, Packages, SymbolTable};
pub use graph::ReferenceGraph;
pub use interface::{Closure, InterfaceArtifact, Violation};
pub use ops::Analysis;
pub use util::context::GlobalContext;
