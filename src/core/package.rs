//! Package - a named partition of the symbol table with an export policy.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::SymbolId;
use crate::util::QualifiedName;

/// Who may see an exported symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportTier {
    /// Every dependent package
    Public,
    /// Test code only
    TestOnly,
}

impl ExportTier {
    pub const ALL: [ExportTier; 2] = [ExportTier::Public, ExportTier::TestOnly];

    pub fn as_str(self) -> &'static str {
        match self {
            ExportTier::Public => "public",
            ExportTier::TestOnly => "test-only",
        }
    }

    /// Whether a consumer at tier `self` may see something exported at `tier`.
    pub fn admits(self, tier: ExportTier) -> bool {
        match self {
            ExportTier::Public => tier == ExportTier::Public,
            ExportTier::TestOnly => true,
        }
    }
}

impl fmt::Display for ExportTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single export declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExportEntry {
    pub package: QualifiedName,
    pub symbol: SymbolId,
    pub name: QualifiedName,
    pub tier: ExportTier,
}

/// A loaded package.
///
/// Packages are created by [`Packages::load`](super::Packages::load) and
/// never change afterwards.
#[derive(Debug, Clone)]
pub struct Package {
    name: QualifiedName,
    exports: BTreeSet<ExportEntry>,
    dependencies: BTreeSet<QualifiedName>,
    manifest_path: Option<PathBuf>,
}

impl Package {
    pub(crate) fn new(
        name: QualifiedName,
        exports: BTreeSet<ExportEntry>,
        dependencies: BTreeSet<QualifiedName>,
        manifest_path: Option<PathBuf>,
    ) -> Self {
        Package {
            name,
            exports,
            dependencies,
            manifest_path,
        }
    }

    pub fn name(&self) -> QualifiedName {
        self.name
    }

    /// Export entries of exactly `tier`.
    pub fn exports(&self, tier: ExportTier) -> impl Iterator<Item = &ExportEntry> {
        self.exports.iter().filter(move |e| e.tier == tier)
    }

    pub fn all_exports(&self) -> impl Iterator<Item = &ExportEntry> {
        self.exports.iter()
    }

    pub fn dependency_names(&self) -> &BTreeSet<QualifiedName> {
        &self.dependencies
    }

    pub fn depends_on(&self, other: QualifiedName) -> bool {
        self.dependencies.contains(&other)
    }

    pub fn manifest_path(&self) -> Option<&PathBuf> {
        self.manifest_path.as_ref()
    }

    /// Whether `name` is covered by one of this package's exports visible at
    /// `tier`. Exporting a namespace exports everything nested in it.
    pub fn exports_name(&self, name: QualifiedName, tier: ExportTier) -> bool {
        self.exports
            .iter()
            .any(|e| tier.admits(e.tier) && name.is_within(e.name))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, id: u32, tier: ExportTier) -> ExportEntry {
        ExportEntry {
            package: QualifiedName::new("RBIGen"),
            symbol: SymbolId(id),
            name: QualifiedName::new(name),
            tier,
        }
    }

    #[test]
    fn test_tier_admission() {
        assert!(ExportTier::Public.admits(ExportTier::Public));
        assert!(!ExportTier::Public.admits(ExportTier::TestOnly));
        assert!(ExportTier::TestOnly.admits(ExportTier::Public));
        assert!(ExportTier::TestOnly.admits(ExportTier::TestOnly));
    }

    #[test]
    fn test_exports_name_covers_nested_symbols() {
        let exports = [
            entry("RBIGen::Public", 0, ExportTier::Public),
            entry("RBIGen::Private::PrivateClassForTests", 1, ExportTier::TestOnly),
        ]
        .into_iter()
        .collect();
        let pkg = Package::new(QualifiedName::new("RBIGen"), exports, BTreeSet::new(), None);

        let nested = QualifiedName::new("RBIGen::Public::FinalClass#final_method");
        assert!(pkg.exports_name(nested, ExportTier::Public));

        let for_tests = QualifiedName::new("RBIGen::Private::PrivateClassForTests");
        assert!(!pkg.exports_name(for_tests, ExportTier::Public));
        assert!(pkg.exports_name(for_tests, ExportTier::TestOnly));

        let private = QualifiedName::new("RBIGen::Private::PrivateClass");
        assert!(!pkg.exports_name(private, ExportTier::TestOnly));
    }
}
