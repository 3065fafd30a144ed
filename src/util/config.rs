//! Configuration file support for Bulkhead.
//!
//! Bulkhead reads two configuration files:
//! - Global: `~/.bulkhead/config.toml` - User-wide defaults
//! - Project: `Bulkhead.toml` - Found by walking up from the working directory
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::interface::ViolationKind;
use crate::ops::write::OutputFormat;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "Bulkhead.toml";

/// Bulkhead configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the symbol table and manifests come from
    pub input: InputConfig,

    /// Where and how interfaces are written
    pub output: OutputConfig,

    /// Which violations fail `bulkhead check`
    pub check: CheckConfig,

    /// Analysis settings
    pub analysis: AnalysisConfig,
}

/// Input locations. Relative paths are resolved against the project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Directory searched for `__package.toml` manifests
    pub root: Option<PathBuf>,

    /// Symbol table file (`.json` or `.toml`)
    pub symbols: Option<PathBuf>,

    /// Glob patterns selecting manifests; when empty the root is walked
    pub manifests: Vec<String>,
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory for generated interfaces
    pub dir: Option<PathBuf>,

    /// Artifact format (stub, json)
    pub format: Option<String>,

    /// Also generate the test-only tier
    pub test_tier: Option<bool>,
}

/// Check settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Violation kinds that turn into a failing exit status
    pub deny: Vec<String>,
}

/// Analysis settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of parallel jobs (None = auto-detect)
    pub jobs: Option<usize>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        // Input settings
        if other.input.root.is_some() {
            self.input.root = other.input.root;
        }
        if other.input.symbols.is_some() {
            self.input.symbols = other.input.symbols;
        }
        if !other.input.manifests.is_empty() {
            self.input.manifests = other.input.manifests;
        }

        // Output settings
        if other.output.dir.is_some() {
            self.output.dir = other.output.dir;
        }
        if other.output.format.is_some() {
            self.output.format = other.output.format;
        }
        if other.output.test_tier.is_some() {
            self.output.test_tier = other.output.test_tier;
        }

        // Deny lists accumulate
        for kind in other.check.deny {
            if !self.check.deny.contains(&kind) {
                self.check.deny.push(kind);
            }
        }

        if other.analysis.jobs.is_some() {
            self.analysis.jobs = other.analysis.jobs;
        }
    }

    /// Parse the output format, if one is configured.
    pub fn format(&self) -> Result<Option<OutputFormat>> {
        self.output
            .format
            .as_deref()
            .map(|s| {
                s.parse::<OutputFormat>()
                    .map_err(|e| anyhow::anyhow!("[output] format: {}", e))
            })
            .transpose()
    }

    /// Parse the configured deny list.
    pub fn deny(&self) -> Result<BTreeSet<ViolationKind>> {
        self.check
            .deny
            .iter()
            .map(|s| {
                s.parse::<ViolationKind>()
                    .map_err(|e| anyhow::anyhow!("[check] deny: {}", e))
            })
            .collect()
    }

    /// Whether the test-only tier is generated. Defaults to true.
    pub fn test_tier(&self) -> bool {
        self.output.test_tier.unwrap_or(true)
    }
}

/// Get the global bulkhead config directory (~/.bulkhead).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".bulkhead"))
}

/// Get the global config path (~/.bulkhead/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Find the nearest `Bulkhead.toml` at or above `start`.
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (Bulkhead.toml)
/// 2. Global config (~/.bulkhead/config.toml)
/// 3. Defaults
///
/// A broken global config is reported and skipped; a broken project config
/// is an error.
pub fn load_config(global_path: Option<&Path>, project_path: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    if let Some(project_path) = project_path {
        config.merge(Config::load(project_path)?);
    }

    Ok(config)
}
