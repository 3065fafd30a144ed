//! Test utilities for Bulkhead unit tests.
//!
//! Provides the packager fixtures (symbol tables and manifests modeled on a
//! real `rbi_gen` package) and helpers for laying a project out on disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::core::ExportTier;
//! use crate::test_support::rbi_gen;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = rbi_gen();
//!     let closure = fixture.closure("RBIGen", ExportTier::Public);
//!     assert!(closure.contains(fixture.id("RBIGen::Public")));
//! }
//! ```

pub mod fixtures;

use std::path::Path;

use anyhow::Result;

use crate::interface::{Violation, ViolationKind};
use crate::util::config::{Config, CONFIG_FILE};
use crate::util::GlobalContext;

// Re-export fixtures for convenience
pub use fixtures::*;

/// Write `project` beneath `dir` and build a context rooted there.
///
/// Only the project's own `Bulkhead.toml` is read, never the user's global
/// config.
pub fn project_context(project: &ProjectFixture, dir: &Path) -> Result<GlobalContext> {
    project.write_to(dir)?;

    let config_path = dir.join(CONFIG_FILE);
    let config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    Ok(GlobalContext::with_config(
        dir.to_path_buf(),
        dir.to_path_buf(),
        config,
    ))
}

/// The kinds of a list of violations, in order.
pub fn violation_kinds<'a>(violations: impl IntoIterator<Item = &'a Violation>) -> Vec<ViolationKind> {
    violations.into_iter().map(|v| v.kind()).collect()
}
