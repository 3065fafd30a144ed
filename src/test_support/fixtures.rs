//! Test fixtures for common test scenarios.
//!
//! The central fixture mirrors the packager's `rbi_gen` test package: one
//! package `RBIGen` exporting `RBIGen::Public` and `Test::RBIGen`, with a
//! private `RBIGen::Private` namespace whose classes are pulled in through
//! a signature, an alias and a fixed type parameter binding.
//!
//! [`split_packages`] carries the same shapes across two packages so that
//! cross-package privacy and sealing can be exercised.

use std::path::{Path, PathBuf};

use crate::core::{load_packages, ExportTier, Manifest, Packages, SymbolId, SymbolTable};
use crate::graph::{build_graph, ReferenceGraph};
use crate::interface::{Closure, ClosureComputer};
use crate::util::QualifiedName;

/// Symbol table of the `rbi_gen` fixture, as the front end would export it.
pub const RBI_GEN_SYMBOLS: &str = r#"{
  "symbols": [
    {"name": "RBIGen", "kind": "module", "package": "RBIGen"},

    {"name": "RBIGen::Private", "kind": "module"},
    {"name": "RBIGen::Private::PrivateClass", "kind": "class"},
    {"name": "RBIGen::Private::PrivateClassPulledInByClassAlias", "kind": "class"},
    {"name": "RBIGen::Private::PrivateClassPulledInByTypeTemplate", "kind": "class"},
    {"name": "RBIGen::Private::PrivateClassNotReferenced", "kind": "class"},
    {"name": "RBIGen::Private::PrivateClassForTests", "kind": "class"},

    {"name": "RBIGen::Public", "kind": "module"},

    {"name": "RBIGen::Public::RefersToPrivateTypes", "kind": "class"},
    {"name": "RBIGen::Public::RefersToPrivateTypes#method", "kind": "method",
     "params": [{"name": "a", "type": "RBIGen::Private::PrivateClass"}]},
    {"name": "RBIGen::Public::RefersToPrivateTypes::ClassAlias", "kind": "constant",
     "alias_of": "RBIGen::Private::PrivateClassPulledInByClassAlias"},

    {"name": "RBIGen::Public::FinalClass", "kind": "class", "modifiers": ["final"]},
    {"name": "RBIGen::Public::FinalClass#final_method", "kind": "method", "modifiers": ["final"]},

    {"name": "RBIGen::Public::SealedClass", "kind": "class", "modifiers": ["sealed"]},

    {"name": "RBIGen::Public::AbstractClass", "kind": "class", "modifiers": ["abstract"]},
    {"name": "RBIGen::Public::AbstractClass#abstract_method", "kind": "method",
     "modifiers": ["abstract"], "returns": "String"},

    {"name": "RBIGen::Public::InterfaceModule", "kind": "module", "modifiers": ["interface"]},
    {"name": "RBIGen::Public::InterfaceModule#interface_method", "kind": "method",
     "modifiers": ["abstract"], "returns": "String"},

    {"name": "RBIGen::Public::AbstractAndInterfaceImplementor", "kind": "class",
     "superclass": "RBIGen::Public::AbstractClass",
     "includes": ["RBIGen::Public::InterfaceModule"]},
    {"name": "RBIGen::Public::AbstractAndInterfaceImplementor#abstract_method", "kind": "method",
     "modifiers": ["override"], "returns": "String"},
    {"name": "RBIGen::Public::AbstractAndInterfaceImplementor#interface_method", "kind": "method",
     "modifiers": ["override"], "returns": "String"},

    {"name": "RBIGen::Public::MyEnum", "kind": "class", "superclass": "T::Enum"},
    {"name": "RBIGen::Public::MyEnum::Spades", "kind": "constant",
     "type": "RBIGen::Public::MyEnum", "value": {"literal": "new", "structural": true}},
    {"name": "RBIGen::Public::MyEnum::Hearts", "kind": "constant",
     "type": "RBIGen::Public::MyEnum", "value": {"literal": "new", "structural": true}},
    {"name": "RBIGen::Public::MyEnum::Clubs", "kind": "constant",
     "type": "RBIGen::Public::MyEnum", "value": {"literal": "new", "structural": true}},
    {"name": "RBIGen::Public::MyEnum::Diamonds", "kind": "constant",
     "type": "RBIGen::Public::MyEnum", "value": {"literal": "new", "structural": true}},
    {"name": "RBIGen::Public::MyEnum#to_string", "kind": "method", "returns": "String"},

    {"name": "RBIGen::Public::MyStruct", "kind": "class", "superclass": "T::Struct"},
    {"name": "RBIGen::Public::MyStruct#initialize", "kind": "method",
     "params": [
       {"name": "foo", "type": "Integer", "kind": "keyword"},
       {"name": "bar", "type": {"kind": "nilable", "of": "String"}, "kind": "optional_keyword"},
       {"name": "quz", "type": "Float", "kind": "optional_keyword"}
     ]},
    {"name": "RBIGen::Public::MyStruct#foo", "kind": "method", "returns": "Integer"},
    {"name": "RBIGen::Public::MyStruct#foo=", "kind": "method",
     "params": [{"name": "foo", "type": "Integer"}], "returns": "Integer"},
    {"name": "RBIGen::Public::MyStruct#bar", "kind": "method",
     "returns": {"kind": "nilable", "of": "String"}},
    {"name": "RBIGen::Public::MyStruct#quz", "kind": "method", "returns": "Float"},
    {"name": "RBIGen::Public::MyStruct#extra_method", "kind": "method", "returns": "Integer"},

    {"name": "RBIGen::Public::FieldCheck", "kind": "class"},
    {"name": "RBIGen::Public::FieldCheck::Alias", "kind": "constant",
     "alias_of": "RBIGen::Public::FieldCheck"},
    {"name": "RBIGen::Public::FieldCheck::Constant", "kind": "constant",
     "type": "Integer", "value": {"literal": "0"}},
    {"name": "RBIGen::Public::FieldCheck::AliasConstant", "kind": "constant",
     "type": {"kind": "class_of", "of": "RBIGen::Public::FieldCheck"},
     "value": {"literal": "RBIGen::Public::FieldCheck"}},
    {"name": "RBIGen::Public::FieldCheck#initialize", "kind": "method"},

    {"name": "RBIGen::Public::AliasMethod", "kind": "class"},
    {"name": "RBIGen::Public::AliasMethod#==", "kind": "method",
     "params": [{"name": "other", "type": "BasicObject"}], "returns": "T::Boolean"},
    {"name": "RBIGen::Public::AliasMethod#eql?", "kind": "method",
     "params": [{"name": "other", "type": "BasicObject"}], "returns": "T::Boolean"},

    {"name": "RBIGen::Public::ClassWithTypeParams", "kind": "class",
     "type_params": [
       {"name": "A", "template": true,
        "fixed": "RBIGen::Private::PrivateClassPulledInByTypeTemplate"},
       {"name": "B", "template": true},
       {"name": "C"}
     ]},

    {"name": "RBIGen::Public::ModuleWithTypeParams", "kind": "module",
     "type_params": [
       {"name": "A", "variance": "in"},
       {"name": "B", "variance": "out"}
     ]},

    {"name": "Test::RBIGen", "kind": "module", "package": "RBIGen"}
  ]
}"#;

/// The `RBIGen` package manifest.
pub fn rbi_gen_manifest() -> Manifest {
    Manifest::new("RBIGen")
        .with_export("RBIGen::Public")
        .with_export("Test::RBIGen")
        .with_test_export("RBIGen::Private::PrivateClassForTests")
}

/// The same file as it would appear on disk.
pub const RBI_GEN_MANIFEST: &str = r#"[package]
name = "RBIGen"
export = ["RBIGen::Public", "Test::RBIGen"]
export_for_test = ["RBIGen::Private::PrivateClassForTests"]
"#;

/// Symbols split over a `Public` and a `Private` package.
///
/// `Public` depends on `Private`. `Private` exports only its sanctioned
/// alias and its sealed base class; `Public` subclasses that sealed class.
pub const SPLIT_SYMBOLS: &str = r#"{
  "symbols": [
    {"name": "Private", "kind": "module", "package": "Private"},
    {"name": "Private::PrivateClass", "kind": "class"},
    {"name": "Private::PrivateClassForTests", "kind": "class"},
    {"name": "Private::PrivateClassNotReferenced", "kind": "class"},
    {"name": "Private::Bound", "kind": "class"},
    {"name": "Private::Hidden", "kind": "class"},
    {"name": "Private::Sanctioned", "kind": "constant", "alias_of": "Private::Hidden"},
    {"name": "Private::SealedBase", "kind": "class", "modifiers": ["sealed"]},
    {"name": "Private::SealedBase#describe", "kind": "method", "returns": "String"},
    {"name": "Private::InsideSubclass", "kind": "class", "superclass": "Private::SealedBase"},

    {"name": "Public", "kind": "module", "package": "Public"},
    {"name": "Public::RefersToPrivateTypes", "kind": "class"},
    {"name": "Public::RefersToPrivateTypes#method", "kind": "method",
     "params": [{"name": "a", "type": "Private::PrivateClass"}]},
    {"name": "Public::UsesSanctionedAlias", "kind": "class"},
    {"name": "Public::UsesSanctionedAlias#hidden", "kind": "method", "returns": "Private::Sanctioned"},
    {"name": "Public::Box", "kind": "class",
     "type_params": [{"name": "Elem", "fixed": "Private::Bound"}]},
    {"name": "Public::OutsideSubclass", "kind": "class", "superclass": "Private::SealedBase"},

    {"name": "Consumer", "kind": "module", "package": "Consumer"},
    {"name": "Consumer::Uses", "kind": "class"},
    {"name": "Consumer::Uses#run", "kind": "method", "returns": "Private::PrivateClass"}
  ]
}"#;

/// Manifests for [`SPLIT_SYMBOLS`].
pub fn split_manifests() -> Vec<Manifest> {
    vec![
        Manifest::new("Private")
            .with_export("Private::Sanctioned")
            .with_export("Private::SealedBase")
            .with_export("Private::InsideSubclass")
            .with_test_export("Private::PrivateClassForTests"),
        Manifest::new("Public")
            .with_export("Public")
            .with_dependency("Private"),
        // Refers to `Private` without declaring the dependency
        Manifest::new("Consumer").with_export("Consumer::Uses"),
    ]
}

/// Shared analysis state for unit tests.
pub struct Fixture {
    pub table: SymbolTable,
    pub packages: Packages,
    pub graph: ReferenceGraph,
}

impl Fixture {
    /// Build a fixture from a JSON symbol table and manifests.
    pub fn new(symbols: &str, manifests: &[Manifest]) -> Self {
        let table = SymbolTable::from_json(symbols).expect("fixture symbol table is valid");
        let packages = load_packages(manifests, &table).expect("fixture manifests are valid");
        let graph = build_graph(&table);
        Fixture {
            table,
            packages,
            graph,
        }
    }

    pub fn computer(&self) -> ClosureComputer<'_> {
        ClosureComputer::new(&self.packages, &self.table, &self.graph)
    }

    /// Closure of `package` at `tier`; panics on alias cycles.
    pub fn closure(&self, package: &str, tier: ExportTier) -> Closure {
        self.computer()
            .closure_for(QualifiedName::new(package), tier)
            .expect("fixture closure has no alias cycles")
    }

    /// Id of a symbol that must exist.
    pub fn id(&self, name: &str) -> SymbolId {
        self.table
            .lookup(name)
            .unwrap_or_else(|| panic!("fixture has no symbol `{}`", name))
    }
}

/// The `rbi_gen` fixture.
pub fn rbi_gen() -> Fixture {
    Fixture::new(RBI_GEN_SYMBOLS, &[rbi_gen_manifest()])
}

/// The two-package fixture.
pub fn split_packages() -> Fixture {
    Fixture::new(SPLIT_SYMBOLS, &split_manifests())
}

/// A project directory layout: symbol table, manifests and configuration.
#[derive(Debug, Clone)]
pub struct ProjectFixture {
    /// Symbol table JSON
    pub symbols: String,
    /// Manifests (path relative to project root -> content)
    pub manifests: Vec<(PathBuf, String)>,
    /// `Bulkhead.toml` content
    pub config: Option<String>,
}

impl ProjectFixture {
    /// The `rbi_gen` package laid out on disk.
    pub fn rbi_gen() -> Self {
        ProjectFixture {
            symbols: RBI_GEN_SYMBOLS.to_string(),
            manifests: vec![(
                PathBuf::from("rbi_gen").join(crate::core::MANIFEST_NAME),
                RBI_GEN_MANIFEST.to_string(),
            )],
            config: Some("[input]\nsymbols = \"symbols.json\"\n".to_string()),
        }
    }

    /// Write the project beneath `base_path`.
    pub fn write_to(&self, base_path: &Path) -> std::io::Result<()> {
        std::fs::write(base_path.join("symbols.json"), &self.symbols)?;
        for (path, content) in &self.manifests {
            let full = base_path.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full, content)?;
        }
        if let Some(ref config) = self.config {
            std::fs::write(base_path.join("Bulkhead.toml"), config)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rbi_gen_fixture_loads() {
        let fx = rbi_gen();
        assert_eq!(fx.packages.len(), 1);
        assert_eq!(
            fx.table.get(fx.id("RBIGen::Private::PrivateClass")).package,
            Some(QualifiedName::new("RBIGen"))
        );
        assert!(fx.graph.alias_cycles().is_empty());
    }

    #[test]
    fn test_split_fixture_loads() {
        let fx = split_packages();
        assert_eq!(fx.packages.len(), 3);
        assert_eq!(
            fx.table.get(fx.id("Public::Box::Elem")).package,
            Some(QualifiedName::new("Public"))
        );
    }

    #[test]
    fn test_manifest_text_matches_builder() {
        let parsed = Manifest::parse(RBI_GEN_MANIFEST, Path::new("__package.toml")).unwrap();
        let built = rbi_gen_manifest();
        assert_eq!(parsed.export, built.export);
        assert_eq!(parsed.export_for_test, built.export_for_test);
    }

    #[test]
    fn test_project_fixture_write_to() {
        let tmp = tempfile::TempDir::new().unwrap();
        ProjectFixture::rbi_gen().write_to(tmp.path()).unwrap();
        assert!(tmp.path().join("symbols.json").exists());
        assert!(tmp.path().join("Bulkhead.toml").exists());
        assert!(tmp.path().join("rbi_gen/__package.toml").exists());
    }
}
