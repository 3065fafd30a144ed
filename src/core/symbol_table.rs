//! The resolved symbol table.
//!
//! Symbol tables are produced by the type-checking front end and handed to
//! us as JSON or TOML documents. Loading normalizes them into dense ids,
//! links every symbol to its enclosing namespace and fills in package
//! ownership for symbols that inherit it from their namespace.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::symbol::{
    ConstValue, ConstantDef, Definition, Modifier, Modifiers, NamespaceDef, Param, Signature,
    Symbol, SymbolId, SymbolKind, TypeParamDef, TypeRef, Variance,
};
use crate::util::QualifiedName;

/// Structural problems in a symbol table document.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum SymbolTableError {
    #[error("symbol `{name}` is defined more than once")]
    #[diagnostic(code(bulkhead::symbols::duplicate))]
    DuplicateSymbol { name: String },

    #[error("method `{name}` must be written `Owner#name` or `Owner.name`")]
    #[diagnostic(code(bulkhead::symbols::method_name))]
    MalformedMethodName { name: String },

    #[error("constant alias `{name}` must alias a plain name")]
    #[diagnostic(code(bulkhead::symbols::alias))]
    InvalidAlias { name: String },

    #[error("type alias `{name}` has no aliased type")]
    #[diagnostic(code(bulkhead::symbols::type_alias))]
    MissingAliasBody { name: String },

    #[error("type parameter `{name}` is not nested in a class or module")]
    #[diagnostic(code(bulkhead::symbols::type_param))]
    TypeParamOutsideNamespace { name: String },
}

/// Serialized symbol table document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSymbolTable {
    #[serde(default)]
    pub symbols: Vec<RawSymbol>,
}

/// One symbol as written by the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSymbol {
    pub name: QualifiedName,
    pub kind: SymbolKind,
    #[serde(default)]
    pub package: Option<QualifiedName>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,

    // Class / module
    #[serde(default)]
    pub superclass: Option<QualifiedName>,
    #[serde(default)]
    pub includes: Vec<QualifiedName>,
    #[serde(default)]
    pub type_params: Vec<RawTypeParam>,

    // Method
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub returns: Option<TypeRef>,

    // Constant / type alias
    #[serde(default, rename = "type")]
    pub declared_type: Option<TypeRef>,
    #[serde(default)]
    pub value: Option<ConstValue>,
    #[serde(default)]
    pub alias_of: Option<TypeRef>,

    // Standalone type parameter
    #[serde(flatten)]
    pub param: RawTypeParamShape,
}

/// Type parameter declared inline on its class or module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTypeParam {
    pub name: String,
    #[serde(flatten)]
    pub shape: RawTypeParamShape,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTypeParamShape {
    #[serde(default)]
    pub variance: Variance,
    #[serde(default)]
    pub template: bool,
    #[serde(default)]
    pub fixed: Option<TypeRef>,
    #[serde(default)]
    pub upper: Option<TypeRef>,
    #[serde(default)]
    pub lower: Option<TypeRef>,
}

impl From<RawTypeParamShape> for TypeParamDef {
    fn from(raw: RawTypeParamShape) -> Self {
        TypeParamDef {
            variance: raw.variance,
            template: raw.template,
            fixed: raw.fixed,
            upper: raw.upper,
            lower: raw.lower,
        }
    }
}

/// Immutable, indexed symbol table.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_name: HashMap<QualifiedName, SymbolId>,
    members: Vec<Vec<SymbolId>>,
}

impl SymbolTable {
    /// Load a symbol table from disk. `.toml` files are read as TOML,
    /// everything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read symbol table: {}", path.display()))?;

        let raw: RawSymbolTable = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)
                .with_context(|| format!("failed to parse symbol table: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse symbol table: {}", path.display()))?
        };

        let table = Self::from_raw(raw)?;
        tracing::debug!("loaded {} symbols from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse a JSON symbol table document.
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawSymbolTable =
            serde_json::from_str(content).context("failed to parse symbol table")?;
        Ok(Self::from_raw(raw)?)
    }

    /// Normalize a raw document.
    pub fn from_raw(raw: RawSymbolTable) -> Result<Self, SymbolTableError> {
        let mut symbols: Vec<Symbol> = Vec::with_capacity(raw.symbols.len());
        let mut by_name: HashMap<QualifiedName, SymbolId> = HashMap::new();
        let mut explicit_packages: Vec<Option<QualifiedName>> = Vec::new();

        let mut push = |symbol: Symbol,
                        package: Option<QualifiedName>,
                        symbols: &mut Vec<Symbol>|
         -> Result<(), SymbolTableError> {
            if by_name.insert(symbol.name, symbol.id).is_some() {
                return Err(SymbolTableError::DuplicateSymbol {
                    name: symbol.name.to_string(),
                });
            }
            explicit_packages.push(package);
            symbols.push(symbol);
            Ok(())
        };

        for raw_symbol in raw.symbols {
            let name = raw_symbol.name;
            let modifiers: Modifiers = raw_symbol.modifiers.iter().copied().collect();
            let id = SymbolId(symbols.len() as u32);

            let definition = match raw_symbol.kind {
                SymbolKind::Class | SymbolKind::Module => Definition::Namespace(NamespaceDef {
                    superclass: raw_symbol.superclass,
                    includes: raw_symbol.includes,
                    type_params: Vec::new(),
                }),
                SymbolKind::Method => {
                    if name.split_method().is_none() {
                        return Err(SymbolTableError::MalformedMethodName {
                            name: name.to_string(),
                        });
                    }
                    Definition::Method(Signature {
                        params: raw_symbol.params,
                        returns: raw_symbol.returns,
                    })
                }
                SymbolKind::Constant => {
                    let alias_of = match raw_symbol.alias_of {
                        None => None,
                        Some(TypeRef::Named(target)) => Some(target),
                        Some(TypeRef::Compound(_)) => {
                            return Err(SymbolTableError::InvalidAlias {
                                name: name.to_string(),
                            })
                        }
                    };
                    Definition::Constant(ConstantDef {
                        declared_type: raw_symbol.declared_type,
                        value: raw_symbol.value,
                        alias_of,
                    })
                }
                SymbolKind::TypeAlias => match raw_symbol.alias_of {
                    Some(body) => Definition::TypeAlias(body),
                    None => {
                        return Err(SymbolTableError::MissingAliasBody {
                            name: name.to_string(),
                        })
                    }
                },
                SymbolKind::TypeParam => Definition::TypeParam(raw_symbol.param.into()),
            };

            let symbol = Symbol {
                id,
                name,
                kind: raw_symbol.kind,
                package: None,
                owner: None,
                modifiers,
                definition,
            };
            push(symbol, raw_symbol.package, &mut symbols)?;

            // Inline type parameters become symbols of their own, right after
            // the namespace that declares them.
            for param in raw_symbol.type_params {
                let param_symbol = Symbol {
                    id: SymbolId(symbols.len() as u32),
                    name: name.join(&param.name),
                    kind: SymbolKind::TypeParam,
                    package: None,
                    owner: None,
                    modifiers: Modifiers::new(),
                    definition: Definition::TypeParam(param.shape.into()),
                };
                push(param_symbol, None, &mut symbols)?;
            }
        }

        let mut members = vec![Vec::new(); symbols.len()];
        for i in 0..symbols.len() {
            let owner = symbols[i].name.parent().and_then(|p| by_name.get(&p).copied());
            symbols[i].owner = owner;
            if let Some(owner) = owner {
                members[owner.index()].push(symbols[i].id);
            }
        }

        for i in 0..symbols.len() {
            let symbol = &symbols[i];
            if symbol.kind == SymbolKind::TypeParam {
                let owner = symbol
                    .owner
                    .filter(|o| symbols[o.index()].is_namespace())
                    .ok_or_else(|| SymbolTableError::TypeParamOutsideNamespace {
                        name: symbol.name.to_string(),
                    })?;
                let id = symbol.id;
                if let Definition::Namespace(ref mut ns) = symbols[owner.index()].definition {
                    ns.type_params.push(id);
                }
            }
        }

        // Ownership is explicit, or inherited from the nearest enclosing
        // namespace that has it.
        for i in 0..symbols.len() {
            let mut current = Some(SymbolId(i as u32));
            let mut package = None;
            while let Some(id) = current {
                if let Some(explicit) = explicit_packages[id.index()] {
                    package = Some(explicit);
                    break;
                }
                current = symbols[id.index()].owner;
            }
            symbols[i].package = package;
        }

        Ok(SymbolTable {
            symbols,
            by_name,
            members,
        })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Get a symbol by id.
    ///
    /// Ids are only ever minted by this table, so indexing cannot fail for
    /// ids that came from it.
    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn lookup(&self, name: impl Into<QualifiedName>) -> Option<SymbolId> {
        self.by_name.get(&name.into()).copied()
    }

    pub fn symbol(&self, name: impl Into<QualifiedName>) -> Option<&Symbol> {
        self.lookup(name).map(|id| self.get(id))
    }

    /// Symbols nested directly inside `id`, in declaration order.
    pub fn members(&self, id: SymbolId) -> &[SymbolId] {
        &self.members[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// All symbols owned by `package`.
    pub fn owned_by(&self, package: QualifiedName) -> impl Iterator<Item = &Symbol> {
        self.symbols
            .iter()
            .filter(move |s| s.package == Some(package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "symbols": [
            {"name": "Shop", "kind": "module", "package": "Shop"},
            {"name": "Shop::Cart", "kind": "class", "modifiers": ["final"],
             "type_params": [{"name": "Item", "variance": "out"}]},
            {"name": "Shop::Cart#add", "kind": "method",
             "params": [{"name": "item", "type": "Shop::Cart::Item"}]},
            {"name": "Shop::Cart::Alias", "kind": "constant", "alias_of": "Shop::Cart"},
            {"name": "Vendor::Thing", "kind": "class", "package": "Vendor"}
        ]
    }"#;

    #[test]
    fn test_load_links_owners_and_members() {
        let table = SymbolTable::from_json(TABLE).unwrap();
        assert_eq!(table.len(), 6);

        let cart = table.lookup("Shop::Cart").unwrap();
        let members: Vec<_> = table
            .members(cart)
            .iter()
            .map(|id| table.get(*id).name.as_str())
            .collect();
        assert_eq!(
            members,
            vec!["Shop::Cart::Item", "Shop::Cart#add", "Shop::Cart::Alias"]
        );

        let method = table.symbol("Shop::Cart#add").unwrap();
        assert_eq!(method.owner, Some(cart));
    }

    #[test]
    fn test_package_inherited_from_namespace() {
        let table = SymbolTable::from_json(TABLE).unwrap();
        let shop = QualifiedName::new("Shop");

        assert_eq!(table.symbol("Shop::Cart#add").unwrap().package, Some(shop));
        assert_eq!(table.symbol("Shop::Cart::Item").unwrap().package, Some(shop));
        assert_eq!(
            table.symbol("Vendor::Thing").unwrap().package,
            Some(QualifiedName::new("Vendor"))
        );
        assert_eq!(table.owned_by(shop).count(), 5);
    }

    #[test]
    fn test_inline_type_params_registered_on_namespace() {
        let table = SymbolTable::from_json(TABLE).unwrap();
        let cart = table.symbol("Shop::Cart").unwrap();
        let ns = cart.namespace().unwrap();
        assert_eq!(ns.type_params.len(), 1);

        let param = table.get(ns.type_params[0]);
        match param.definition {
            Definition::TypeParam(ref def) => assert_eq!(def.variance, Variance::Out),
            _ => panic!("expected a type parameter"),
        }
    }

    #[test]
    fn test_duplicate_symbol_rejected() {
        let err = SymbolTable::from_json(
            r#"{"symbols": [
                {"name": "A", "kind": "class"},
                {"name": "A", "kind": "module"}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("defined more than once"));
    }

    #[test]
    fn test_method_needs_receiver() {
        let err = SymbolTable::from_json(r#"{"symbols": [{"name": "A::run", "kind": "method"}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Owner#name"));
    }

    #[test]
    fn test_load_toml_by_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("symbols.toml");
        std::fs::write(
            &path,
            r#"
[[symbols]]
name = "Geo"
kind = "module"
package = "Geo"

[[symbols]]
name = "Geo::Point"
kind = "class"
"#,
        )
        .unwrap();

        let table = SymbolTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.symbol("Geo::Point").unwrap().package,
            Some(QualifiedName::new("Geo"))
        );
    }
}
