//! Resolved symbols - the read-only input of every analysis.
//!
//! A symbol is a class, module, method, constant, type alias or type
//! parameter as resolved by the type-checking front end. The front end
//! decides ownership, signatures and modifiers; this crate only reads them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::QualifiedName;

/// Dense index of a symbol inside its [`SymbolTable`](super::SymbolTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

impl SymbolId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of entity a symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    Module,
    Method,
    Constant,
    TypeAlias,
    TypeParam,
}

impl SymbolKind {
    /// Classes and modules can own other symbols.
    pub fn is_namespace(self) -> bool {
        matches!(self, SymbolKind::Class | SymbolKind::Module)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Module => "module",
            SymbolKind::Method => "method",
            SymbolKind::Constant => "constant",
            SymbolKind::TypeAlias => "type_alias",
            SymbolKind::TypeParam => "type_param",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural modifier declared on a namespace or method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    /// Subclasses/includers must live in the owning package.
    Sealed,
    /// No subclass, includer or override may exist.
    Final,
    /// Class may declare abstract methods and cannot be instantiated.
    Abstract,
    /// Module made only of abstract methods.
    Interface,
    /// Method overrides an ancestor method.
    Override,
}

impl Modifier {
    pub fn as_str(self) -> &'static str {
        match self {
            Modifier::Sealed => "sealed",
            Modifier::Final => "final",
            Modifier::Abstract => "abstract",
            Modifier::Interface => "interface",
            Modifier::Override => "override",
        }
    }
}

/// The set of modifiers attached to a symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(BTreeSet<Modifier>);

impl Modifiers {
    pub fn new() -> Self {
        Modifiers(BTreeSet::new())
    }

    pub fn with(mut self, modifier: Modifier) -> Self {
        self.0.insert(modifier);
        self
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        self.0.contains(&modifier)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.0.iter().copied()
    }

    /// Abstract classes and interface modules cannot be instantiated.
    pub fn is_abstract(&self) -> bool {
        self.contains(Modifier::Abstract) || self.contains(Modifier::Interface)
    }
}

impl FromIterator<Modifier> for Modifiers {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        Modifiers(iter.into_iter().collect())
    }
}

/// Variance of a generic type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variance {
    #[default]
    Invariant,
    In,
    Out,
}

/// A reference to a type inside a signature.
///
/// Plain strings deserialize as [`TypeRef::Named`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    Named(QualifiedName),
    Compound(CompoundType),
}

/// Type expressions built out of other types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompoundType {
    Nilable { of: Box<TypeRef> },
    Union { of: Vec<TypeRef> },
    Applied { base: Box<TypeRef>, args: Vec<TypeRef> },
    ClassOf { of: Box<TypeRef> },
    /// A singleton literal type, e.g. the type of exactly `:red`.
    Literal { value: String, of: Box<TypeRef> },
    Untyped,
}

impl TypeRef {
    pub fn named(name: impl Into<QualifiedName>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn nilable(of: TypeRef) -> Self {
        TypeRef::Compound(CompoundType::Nilable { of: Box::new(of) })
    }

    pub fn class_of(of: TypeRef) -> Self {
        TypeRef::Compound(CompoundType::ClassOf { of: Box::new(of) })
    }

    /// Every symbol name mentioned anywhere in this type, in source order.
    pub fn referenced_names(&self) -> Vec<QualifiedName> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names(&self, out: &mut Vec<QualifiedName>) {
        match self {
            TypeRef::Named(name) => out.push(*name),
            TypeRef::Compound(compound) => match compound {
                CompoundType::Nilable { of }
                | CompoundType::ClassOf { of }
                | CompoundType::Literal { of, .. } => of.collect_names(out),
                CompoundType::Union { of } => of.iter().for_each(|t| t.collect_names(out)),
                CompoundType::Applied { base, args } => {
                    base.collect_names(out);
                    args.iter().for_each(|t| t.collect_names(out));
                }
                CompoundType::Untyped => {}
            },
        }
    }

    /// Rewrite every named reference through `f`.
    pub fn map_names(&self, f: &impl Fn(QualifiedName) -> QualifiedName) -> TypeRef {
        match self {
            TypeRef::Named(name) => TypeRef::Named(f(*name)),
            TypeRef::Compound(compound) => TypeRef::Compound(match compound {
                CompoundType::Nilable { of } => CompoundType::Nilable {
                    of: Box::new(of.map_names(f)),
                },
                CompoundType::ClassOf { of } => CompoundType::ClassOf {
                    of: Box::new(of.map_names(f)),
                },
                CompoundType::Literal { value, of } => CompoundType::Literal {
                    value: value.clone(),
                    of: Box::new(of.map_names(f)),
                },
                CompoundType::Union { of } => CompoundType::Union {
                    of: of.iter().map(|t| t.map_names(f)).collect(),
                },
                CompoundType::Applied { base, args } => CompoundType::Applied {
                    base: Box::new(base.map_names(f)),
                    args: args.iter().map(|t| t.map_names(f)).collect(),
                },
                CompoundType::Untyped => CompoundType::Untyped,
            }),
        }
    }

    /// Singleton literal types must keep their value in emitted interfaces.
    pub fn is_literal(&self) -> bool {
        matches!(self, TypeRef::Compound(CompoundType::Literal { .. }))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::Compound(CompoundType::Nilable { of }) => write!(f, "T.nilable({})", of),
            TypeRef::Compound(CompoundType::ClassOf { of }) => write!(f, "T.class_of({})", of),
            TypeRef::Compound(CompoundType::Literal { value, .. }) => write!(f, "{}", value),
            TypeRef::Compound(CompoundType::Untyped) => f.write_str("T.untyped"),
            TypeRef::Compound(CompoundType::Union { of }) => {
                f.write_str("T.any(")?;
                write_list(f, of)?;
                f.write_str(")")
            }
            TypeRef::Compound(CompoundType::Applied { base, args }) => {
                write!(f, "{}[", base)?;
                write_list(f, args)?;
                f.write_str("]")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeRef]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// How an argument is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    #[default]
    Required,
    Optional,
    Rest,
    Keyword,
    OptionalKeyword,
    KeywordRest,
    Block,
}

/// A single method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub kind: ParamKind,
}

/// An ordered method signature. A missing return type means `void`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub returns: Option<TypeRef>,
}

impl Signature {
    pub fn referenced_names(&self) -> Vec<QualifiedName> {
        let mut out = Vec::new();
        for param in &self.params {
            out.extend(param.type_ref.referenced_names());
        }
        if let Some(ref returns) = self.returns {
            out.extend(returns.referenced_names());
        }
        out
    }
}

/// A constant's bound value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstValue {
    /// Source text of the value
    pub literal: String,
    /// Dependents cannot type-check without the value (enum singletons etc.)
    #[serde(default)]
    pub structural: bool,
}

/// Class/module-level shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceDef {
    pub superclass: Option<QualifiedName>,
    pub includes: Vec<QualifiedName>,
    pub type_params: Vec<SymbolId>,
}

/// Constant definition, possibly an alias of another constant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantDef {
    pub declared_type: Option<TypeRef>,
    pub value: Option<ConstValue>,
    pub alias_of: Option<QualifiedName>,
}

/// Generic type parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeParamDef {
    pub variance: Variance,
    /// Class-level (`type_template`) rather than instance-level (`type_member`)
    pub template: bool,
    pub fixed: Option<TypeRef>,
    pub upper: Option<TypeRef>,
    pub lower: Option<TypeRef>,
}

/// The kind-specific part of a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Namespace(NamespaceDef),
    Method(Signature),
    Constant(ConstantDef),
    TypeAlias(TypeRef),
    TypeParam(TypeParamDef),
}

/// A resolved symbol.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: QualifiedName,
    pub kind: SymbolKind,
    /// Owning package; `None` for root/external symbols.
    pub package: Option<QualifiedName>,
    /// Enclosing namespace in the table, if present there.
    pub owner: Option<SymbolId>,
    pub modifiers: Modifiers,
    pub definition: Definition,
}

impl Symbol {
    pub fn is_namespace(&self) -> bool {
        self.kind.is_namespace()
    }

    pub fn namespace(&self) -> Option<&NamespaceDef> {
        match self.definition {
            Definition::Namespace(ref ns) => Some(ns),
            _ => None,
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self.definition {
            Definition::Method(ref sig) => Some(sig),
            _ => None,
        }
    }

    /// The name this symbol aliases, when it is a plain alias.
    ///
    /// Constant aliases always qualify; a type alias only when its body is a
    /// bare name.
    pub fn alias_target(&self) -> Option<QualifiedName> {
        match self.definition {
            Definition::Constant(ConstantDef {
                alias_of: Some(target),
                ..
            }) => Some(target),
            Definition::TypeAlias(TypeRef::Named(target)) => Some(target),
            _ => None,
        }
    }

    pub fn is_alias(&self) -> bool {
        self.alias_target().is_some()
    }

    /// `(method name, singleton)` for method symbols.
    pub fn method_key(&self) -> Option<(&'static str, bool)> {
        if self.kind != SymbolKind::Method {
            return None;
        }
        self.name
            .split_method()
            .map(|(_, name, singleton)| (name, singleton))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_from_plain_string() {
        let t: TypeRef = serde_json::from_str(r#""RBIGen::Private::PrivateClass""#).unwrap();
        assert_eq!(t, TypeRef::named("RBIGen::Private::PrivateClass"));
    }

    #[test]
    fn test_compound_type_names_and_display() {
        let t: TypeRef = serde_json::from_str(
            r#"{"kind": "applied", "base": "T::Array", "args": [{"kind": "nilable", "of": "String"}]}"#,
        )
        .unwrap();

        let names: Vec<_> = t.referenced_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["T::Array", "String"]);
        assert_eq!(t.to_string(), "T::Array[T.nilable(String)]");
    }

    #[test]
    fn test_map_names_rewrites_nested_references() {
        let t = TypeRef::nilable(TypeRef::named("Old"));
        let mapped = t.map_names(&|n| {
            if n.as_str() == "Old" {
                QualifiedName::new("New")
            } else {
                n
            }
        });
        assert_eq!(mapped.to_string(), "T.nilable(New)");
    }

    #[test]
    fn test_modifiers_abstract() {
        let m = Modifiers::new().with(Modifier::Interface);
        assert!(m.is_abstract());
        assert!(!Modifiers::new().with(Modifier::Sealed).is_abstract());
    }
}
