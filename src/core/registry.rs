//! Package registry - the immutable set of packages in one analysis run.
//!
//! `Packages` is built once from the parsed manifests and the symbol table
//! and then passed explicitly to every component; nothing looks packages
//! up through global state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::core::manifest::Manifest;
use crate::core::package::{ExportEntry, ExportTier, Package};
use crate::core::{Symbol, SymbolId, SymbolTable};
use crate::util::diagnostic::Diagnostic;
use crate::util::QualifiedName;

static QUALIFIED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(::[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("qualified name pattern is valid")
});

/// A malformed or conflicting package declaration. Always fatal.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum ManifestError {
    #[error("package `{name}` is declared twice ({first} and {second})")]
    #[diagnostic(
        code(bulkhead::manifest::duplicate_package),
        help("every package needs exactly one manifest")
    )]
    DuplicatePackage {
        name: String,
        first: String,
        second: String,
    },

    #[error("`{name}` in {location} is not a valid qualified name")]
    #[diagnostic(code(bulkhead::manifest::invalid_name))]
    InvalidName { name: String, location: String },

    #[error("package `{package}` exports `{name}`, which is not in the symbol table")]
    #[diagnostic(code(bulkhead::manifest::unknown_export))]
    UnknownExport { package: String, name: String },

    #[error("package `{package}` exports `{name}`, which is owned by {owner}")]
    #[diagnostic(
        code(bulkhead::manifest::foreign_export),
        help("export it from its owning package, or re-export it through an alias you own")
    )]
    ForeignExport {
        package: String,
        name: String,
        owner: String,
    },

    #[error("package `{package}` exports `{name}` more than once in the same list")]
    #[diagnostic(code(bulkhead::manifest::duplicate_export))]
    DuplicateExport { package: String, name: String },

    #[error("package `{package}` depends on unknown package `{dependency}`")]
    #[diagnostic(code(bulkhead::manifest::unknown_dependency))]
    UnknownDependency { package: String, dependency: String },

    #[error("package `{package}` lists itself as a dependency")]
    #[diagnostic(code(bulkhead::manifest::self_dependency))]
    SelfDependency { package: String },
}

impl ManifestError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            ManifestError::DuplicatePackage { .. } => diag
                .with_suggestion("Rename one of the packages or merge the two manifests"),
            ManifestError::InvalidName { .. } => {
                diag.with_context("names are `::`-separated identifiers, e.g. `Project::Foo`")
            }
            ManifestError::UnknownExport { name, .. } => diag
                .with_suggestion(format!("Check the spelling of `{}`", name))
                .with_suggestion("Regenerate the symbol table if the symbol was added recently"),
            ManifestError::ForeignExport { owner, name, .. } => diag.with_suggestion(format!(
                "Add `export {}` to the manifest of {}",
                name, owner
            )),
            ManifestError::DuplicateExport { .. } => {
                diag.with_suggestion("Remove the repeated entry")
            }
            ManifestError::UnknownDependency { dependency, .. } => diag
                .with_suggestion(format!("Create a manifest for `{}`", dependency))
                .with_suggestion("Or remove the dependency"),
            ManifestError::SelfDependency { .. } => {
                diag.with_suggestion("Remove the package from its own dependency list")
            }
        }
    }
}

/// The set of all packages in a run.
#[derive(Debug, Clone, Default)]
pub struct Packages {
    packages: BTreeMap<QualifiedName, Package>,
}

/// Build the registry. See [`Packages::load`].
pub fn load_packages(manifests: &[Manifest], table: &SymbolTable) -> Result<Packages, ManifestError> {
    Packages::load(manifests, table)
}

impl Packages {
    /// Validate the manifests against each other and the symbol table.
    pub fn load(manifests: &[Manifest], table: &SymbolTable) -> Result<Self, ManifestError> {
        let mut by_name: BTreeMap<QualifiedName, &Manifest> = BTreeMap::new();

        for manifest in manifests {
            check_name(manifest.name, manifest)?;
            if let Some(previous) = by_name.insert(manifest.name, manifest) {
                return Err(ManifestError::DuplicatePackage {
                    name: manifest.name.to_string(),
                    first: previous.location(),
                    second: manifest.location(),
                });
            }
        }

        let mut packages = BTreeMap::new();
        for (&name, manifest) in &by_name {
            let mut exports = BTreeSet::new();
            for (tier, entries) in [
                (ExportTier::Public, &manifest.export),
                (ExportTier::TestOnly, &manifest.export_for_test),
            ] {
                let mut seen = BTreeSet::new();
                for &entry in entries {
                    check_name(entry, manifest)?;
                    if !seen.insert(entry) {
                        return Err(ManifestError::DuplicateExport {
                            package: name.to_string(),
                            name: entry.to_string(),
                        });
                    }
                    let symbol = resolve_export(name, entry, table)?;
                    exports.insert(ExportEntry {
                        package: name,
                        symbol,
                        name: entry,
                        tier,
                    });
                }
            }

            let mut dependencies = BTreeSet::new();
            for &dep in &manifest.dependencies {
                check_name(dep, manifest)?;
                if dep == name {
                    return Err(ManifestError::SelfDependency {
                        package: name.to_string(),
                    });
                }
                if !by_name.contains_key(&dep) {
                    return Err(ManifestError::UnknownDependency {
                        package: name.to_string(),
                        dependency: dep.to_string(),
                    });
                }
                dependencies.insert(dep);
            }

            tracing::debug!(
                "package {}: {} exports, {} dependencies",
                name,
                exports.len(),
                dependencies.len()
            );
            packages.insert(
                name,
                Package::new(name, exports, dependencies, manifest.path.clone()),
            );
        }

        Ok(Packages { packages })
    }

    pub fn get(&self, name: QualifiedName) -> Option<&Package> {
        self.packages.get(&name)
    }

    /// Packages in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn names(&self) -> impl Iterator<Item = QualifiedName> + '_ {
        self.packages.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Symbols exported by `package` at exactly `tier`.
    pub fn exports_of(&self, package: QualifiedName, tier: ExportTier) -> BTreeSet<SymbolId> {
        self.get(package)
            .map(|p| p.exports(tier).map(|e| e.symbol).collect())
            .unwrap_or_default()
    }

    /// Declared dependencies of `package`, in name order.
    pub fn dependencies_of(&self, package: QualifiedName) -> Vec<&Package> {
        self.get(package)
            .map(|p| {
                p.dependency_names()
                    .iter()
                    .filter_map(|d| self.get(*d))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Packages that declare a dependency on `package`.
    pub fn dependents_of(&self, package: QualifiedName) -> Vec<&Package> {
        self.iter().filter(|p| p.depends_on(package)).collect()
    }

    /// The package owning `symbol`, if it belongs to a known package.
    pub fn owner_of(&self, symbol: &Symbol) -> Option<&Package> {
        symbol.package.and_then(|p| self.get(p))
    }

    /// Whether `symbol`'s owning package exports it to consumers at `tier`.
    pub fn is_exported(&self, symbol: &Symbol, tier: ExportTier) -> bool {
        self.owner_of(symbol)
            .is_some_and(|p| p.exports_name(symbol.name, tier))
    }
}

fn check_name(name: QualifiedName, manifest: &Manifest) -> Result<(), ManifestError> {
    if QUALIFIED_NAME.is_match(name.as_str()) {
        Ok(())
    } else {
        Err(ManifestError::InvalidName {
            name: name.to_string(),
            location: manifest.location(),
        })
    }
}

fn resolve_export(
    package: QualifiedName,
    entry: QualifiedName,
    table: &SymbolTable,
) -> Result<SymbolId, ManifestError> {
    let symbol = table
        .symbol(entry)
        .ok_or_else(|| ManifestError::UnknownExport {
            package: package.to_string(),
            name: entry.to_string(),
        })?;

    // Aliases the package owns count as its own symbols even when they point
    // into another package; that is how re-exports are declared.
    if symbol.package != Some(package) {
        return Err(ManifestError::ForeignExport {
            package: package.to_string(),
            name: entry.to_string(),
            owner: match symbol.package {
                Some(owner) => format!("package `{}`", owner),
                None => "no package".to_string(),
            },
        });
    }

    Ok(symbol.id)
}
