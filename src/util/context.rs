//! Global context for Bulkhead operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::discover_manifests;
use crate::util::config::{find_project_config, global_config_path, load_config, Config};
use crate::util::fs::{glob_files, normalize_path};

/// Default output directory, relative to the project root.
pub const DEFAULT_OUT_DIR: &str = "interfaces";

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Directory containing `Bulkhead.toml`, or the cwd when there is none
    project_root: PathBuf,

    /// Merged configuration
    config: Config,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext for the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a GlobalContext with a specific working directory.
    ///
    /// Loads the global config and the nearest project config.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let cwd = normalize_path(&cwd);
        let project_config = find_project_config(&cwd);
        let global = global_config_path();

        let config = load_config(global.as_deref(), project_config.as_deref())?;
        let project_root = project_config
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        tracing::debug!("project root: {}", project_root.display());
        Ok(Self::with_config(cwd, project_root, config))
    }

    /// Create a GlobalContext from already-loaded parts.
    pub fn with_config(cwd: PathBuf, project_root: PathBuf, config: Config) -> Self {
        GlobalContext {
            cwd,
            project_root,
            config,
            verbose: false,
            color: true,
        }
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the project root.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration, for CLI overrides.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// The configured symbol table, if any.
    pub fn symbols_path(&self) -> Option<PathBuf> {
        self.config.input.symbols.as_deref().map(|p| self.resolve(p))
    }

    /// Directory searched for package manifests.
    pub fn manifest_root(&self) -> PathBuf {
        match &self.config.input.root {
            Some(root) => self.resolve(root),
            None => self.project_root.clone(),
        }
    }

    /// Output directory for generated interfaces.
    pub fn out_dir(&self) -> PathBuf {
        match &self.config.output.dir {
            Some(dir) => self.resolve(dir),
            None => self.project_root.join(DEFAULT_OUT_DIR),
        }
    }

    /// Number of parallel analysis jobs.
    pub fn jobs(&self) -> usize {
        self.config
            .analysis
            .jobs
            .filter(|&j| j > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }

    /// Locate every package manifest for this project.
    ///
    /// Uses the configured globs when present, otherwise walks the manifest
    /// root (skipping the output directory).
    pub fn manifest_paths(&self) -> Result<Vec<PathBuf>> {
        let root = self.manifest_root();
        if self.config.input.manifests.is_empty() {
            let out_dir = self.out_dir();
            discover_manifests(&root, Some(&out_dir))
        } else {
            glob_files(&root, &self.config.input.manifests)
        }
    }

    /// Display a path relative to the working directory.
    pub fn display_path(&self, path: &Path) -> String {
        crate::util::fs::relative_path(&self.cwd, path)
            .display()
            .to_string()
    }
}
