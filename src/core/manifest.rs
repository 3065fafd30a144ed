//! `__package.toml` manifest parsing and schema.
//!
//! One manifest declares one package: its name, what it exports to every
//! dependent, what it exports only to test code, and which packages it
//! depends on.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::util::QualifiedName;

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "__package.toml";

/// A parsed package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Package name
    pub name: QualifiedName,

    /// Symbols visible to every dependent package
    pub export: Vec<QualifiedName>,

    /// Symbols visible only to test code
    pub export_for_test: Vec<QualifiedName>,

    /// Packages this package may reference
    pub dependencies: Vec<QualifiedName>,

    /// Where the manifest was read from, if it came from disk
    pub path: Option<PathBuf>,
}

/// Raw manifest as deserialized from TOML.
#[derive(Debug, Deserialize, Serialize)]
struct RawManifest {
    package: RawPackage,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawPackage {
    name: String,

    #[serde(default)]
    export: Vec<String>,

    #[serde(default)]
    export_for_test: Vec<String>,

    #[serde(default, alias = "import")]
    dependencies: Vec<String>,
}

impl Manifest {
    /// Create an in-memory manifest.
    pub fn new(name: impl Into<QualifiedName>) -> Self {
        Manifest {
            name: name.into(),
            export: Vec::new(),
            export_for_test: Vec::new(),
            dependencies: Vec::new(),
            path: None,
        }
    }

    pub fn with_export(mut self, name: impl Into<QualifiedName>) -> Self {
        self.export.push(name.into());
        self
    }

    pub fn with_test_export(mut self, name: impl Into<QualifiedName>) -> Self {
        self.export_for_test.push(name.into());
        self
    }

    pub fn with_dependency(mut self, name: impl Into<QualifiedName>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let to_names = |entries: Vec<String>| -> Vec<QualifiedName> {
            entries
                .iter()
                .map(|e| QualifiedName::new(e.trim()))
                .collect()
        };

        Ok(Manifest {
            name: QualifiedName::new(raw.package.name.trim()),
            export: to_names(raw.package.export),
            export_for_test: to_names(raw.package.export_for_test),
            dependencies: to_names(raw.package.dependencies),
            path: Some(path.to_path_buf()),
        })
    }

    /// Render this manifest back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        let to_strings =
            |names: &[QualifiedName]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
        let raw = RawManifest {
            package: RawPackage {
                name: self.name.to_string(),
                export: to_strings(&self.export),
                export_for_test: to_strings(&self.export_for_test),
                dependencies: to_strings(&self.dependencies),
            },
        };
        toml::to_string_pretty(&raw).context("failed to serialize manifest")
    }

    /// Human-readable location for diagnostics.
    pub fn location(&self) -> String {
        match self.path {
            Some(ref p) => p.display().to_string(),
            None => format!("<package {}>", self.name),
        }
    }
}

/// Find every `__package.toml` beneath `root`, sorted by path.
///
/// Hidden directories and the output directory of previous runs are skipped.
pub fn discover_manifests(root: &Path, skip: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| {
        let hidden = e.depth() > 0 && e.file_name().to_string_lossy().starts_with('.');
        let skipped = skip.is_some_and(|s| e.path() == s);
        !hidden && !skipped
    }) {
        let entry =
            entry.with_context(|| format!("failed to walk directory: {}", root.display()))?;
        if entry.file_type().is_file() && entry.file_name() == MANIFEST_NAME {
            found.push(entry.into_path());
        }
    }

    found.sort();
    Ok(found)
}

/// Load every manifest at the given paths.
pub fn load_all(paths: &[PathBuf]) -> Result<Vec<Manifest>> {
    paths.iter().map(|p| Manifest::load(p)).collect()
}
