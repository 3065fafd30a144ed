//! Interface emission.
//!
//! Turns a closure into an [`InterfaceArtifact`]: declarations and
//! signatures with every body elided, ordered by qualified name so that
//! output only changes when the interface does.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::core::{
    Definition, ExportTier, Modifier, Param, ParamKind, Symbol, SymbolId, SymbolKind, SymbolTable,
    TypeRef, Variance,
};
use crate::graph::{AliasResolution, ReferenceGraph};
use crate::interface::Closure;
use crate::util::hash::sha256_str;
use crate::util::QualifiedName;

/// The emitted interface of one package at one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceArtifact {
    pub package: QualifiedName,
    pub tier: ExportTier,
    /// SHA-256 of [`render_stub`](Self::render_stub)
    pub digest: String,
    pub declarations: Vec<NamespaceDecl>,
    /// Methods and constants with no enclosing namespace
    pub top_level: Vec<MemberDecl>,
}

/// A class or module declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceDecl {
    pub name: QualifiedName,
    pub kind: SymbolKind,
    /// Only present to enclose other declarations
    pub shell: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<Modifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superclass: Option<QualifiedName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<QualifiedName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<TypeParamDecl>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeParamDecl {
    pub name: String,
    pub variance: Variance,
    pub template: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<TypeRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<TypeRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<TypeRef>,
}

/// A declaration nested in a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberDecl {
    Method {
        name: QualifiedName,
        method: String,
        singleton: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        modifiers: Vec<Modifier>,
        params: Vec<Param>,
        returns: Option<TypeRef>,
    },
    Constant {
        name: QualifiedName,
        #[serde(rename = "type")]
        declared_type: Option<TypeRef>,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Alias {
        name: QualifiedName,
        target: QualifiedName,
    },
    TypeAlias {
        name: QualifiedName,
        body: TypeRef,
    },
}

impl MemberDecl {
    pub fn name(&self) -> QualifiedName {
        match self {
            MemberDecl::Method { name, .. }
            | MemberDecl::Constant { name, .. }
            | MemberDecl::Alias { name, .. }
            | MemberDecl::TypeAlias { name, .. } => *name,
        }
    }
}

/// Emit the interface described by `closure`.
///
/// The public artifact holds every member of the public closure. The
/// test-only artifact holds only what the test-only exports add on top, so
/// loading both never declares anything twice.
pub fn emit(table: &SymbolTable, graph: &ReferenceGraph, closure: &Closure) -> InterfaceArtifact {
    let emitter = Emitter {
        table,
        graph,
        closure,
    };
    let mut namespaces: BTreeMap<QualifiedName, NamespaceDecl> = BTreeMap::new();
    let mut top_level = Vec::new();

    for (id, membership) in closure.iter() {
        if membership.tier != closure.tier() {
            continue;
        }
        let symbol = table.get(id);

        match symbol.kind {
            SymbolKind::Class | SymbolKind::Module => {
                let decl = emitter.namespace(symbol);
                match namespaces.get_mut(&symbol.name) {
                    Some(existing) => {
                        let members = std::mem::take(&mut existing.members);
                        let type_params = std::mem::take(&mut existing.type_params);
                        *existing = NamespaceDecl {
                            members,
                            type_params,
                            ..decl
                        };
                    }
                    None => {
                        namespaces.insert(symbol.name, decl);
                    }
                }
            }
            SymbolKind::TypeParam => {
                if let Some(owner) = symbol.owner {
                    emitter
                        .enclosing(&mut namespaces, owner)
                        .type_params
                        .push(emitter.type_param(symbol));
                }
            }
            _ => {
                let Some(member) = emitter.member(symbol) else {
                    continue;
                };
                match symbol.owner {
                    Some(owner) => emitter.enclosing(&mut namespaces, owner).members.push(member),
                    None => top_level.push(member),
                }
            }
        }
    }

    // Every enclosing namespace of an emitted declaration exists as a shell.
    let names: Vec<QualifiedName> = namespaces.keys().copied().collect();
    for name in names {
        for ancestor in name.ancestors() {
            namespaces
                .entry(ancestor)
                .or_insert_with(|| emitter.shell(ancestor));
        }
    }

    let mut declarations: Vec<NamespaceDecl> = namespaces.into_values().collect();
    for decl in &mut declarations {
        decl.members.sort_by_key(|m| m.name());
        decl.type_params.sort_by(|a, b| a.name.cmp(&b.name));
    }
    top_level.sort_by_key(|m| m.name());

    let mut artifact = InterfaceArtifact {
        package: closure.package(),
        tier: closure.tier(),
        digest: String::new(),
        declarations,
        top_level,
    };
    artifact.digest = sha256_str(&artifact.render_stub());

    tracing::debug!(
        "emitted {} ({}): {} declarations, digest {}",
        artifact.package,
        artifact.tier,
        artifact.declarations.len(),
        crate::util::hash::short(&artifact.digest)
    );
    artifact
}

struct Emitter<'a> {
    table: &'a SymbolTable,
    graph: &'a ReferenceGraph,
    closure: &'a Closure,
}

impl Emitter<'_> {
    fn namespace(&self, symbol: &Symbol) -> NamespaceDecl {
        let mut decl = self.shell(symbol.name);
        decl.kind = symbol.kind;
        decl.shell = false;
        decl.modifiers = symbol.modifiers.iter().collect();

        if let Some(ns) = symbol.namespace() {
            decl.superclass = ns.superclass.and_then(|s| self.parent_ref(s));
            decl.includes = ns
                .includes
                .iter()
                .filter_map(|&i| self.parent_ref(i))
                .collect();
        }
        decl
    }

    fn shell(&self, name: QualifiedName) -> NamespaceDecl {
        let kind = self
            .table
            .symbol(name)
            .map(|s| s.kind)
            .filter(|k| k.is_namespace())
            .unwrap_or(SymbolKind::Module);
        NamespaceDecl {
            name,
            kind,
            shell: true,
            modifiers: Vec::new(),
            superclass: None,
            includes: Vec::new(),
            type_params: Vec::new(),
            members: Vec::new(),
        }
    }

    /// The namespace declaration `owner` contributes to, created as a shell
    /// when `owner` itself is not being emitted.
    fn enclosing<'m>(
        &self,
        namespaces: &'m mut BTreeMap<QualifiedName, NamespaceDecl>,
        owner: SymbolId,
    ) -> &'m mut NamespaceDecl {
        let name = self.table.get(owner).name;
        namespaces.entry(name).or_insert_with(|| self.shell(name))
    }

    /// Superclass/include names survive when they point into the closure or
    /// outside every package.
    fn parent_ref(&self, name: QualifiedName) -> Option<QualifiedName> {
        let terminal = self.graph.terminal_name(self.table, name);
        match self.table.lookup(terminal) {
            None => Some(terminal),
            Some(id) if self.closure.contains(id) => Some(terminal),
            Some(id) if self.table.get(id).package.is_none() => Some(terminal),
            Some(_) => None,
        }
    }

    fn type_param(&self, symbol: &Symbol) -> TypeParamDecl {
        let resolve = |t: &Option<TypeRef>| t.as_ref().map(|t| self.graph.resolve_type(self.table, t));
        let (variance, template, fixed, upper, lower) = match symbol.definition {
            Definition::TypeParam(ref p) => (
                p.variance,
                p.template,
                resolve(&p.fixed),
                resolve(&p.upper),
                resolve(&p.lower),
            ),
            _ => (Variance::Invariant, false, None, None, None),
        };
        TypeParamDecl {
            name: symbol.name.last_segment().to_string(),
            variance,
            template,
            fixed,
            upper,
            lower,
        }
    }

    fn member(&self, symbol: &Symbol) -> Option<MemberDecl> {
        if symbol.kind == SymbolKind::Constant && symbol.is_alias() {
            let target = match self.graph.alias_resolution(symbol.id)? {
                AliasResolution::Terminal(id) => self.table.get(*id).name,
                AliasResolution::External(name) => *name,
                AliasResolution::Cycle(_) => return None,
            };
            return Some(MemberDecl::Alias {
                name: symbol.name,
                target,
            });
        }

        match symbol.definition {
            Definition::Method(ref sig) => {
                let (method, singleton) = symbol.method_key()?;
                Some(MemberDecl::Method {
                    name: symbol.name,
                    method: method.to_string(),
                    singleton,
                    modifiers: symbol.modifiers.iter().collect(),
                    params: sig
                        .params
                        .iter()
                        .map(|p| Param {
                            type_ref: self.graph.resolve_type(self.table, &p.type_ref),
                            ..p.clone()
                        })
                        .collect(),
                    returns: sig
                        .returns
                        .as_ref()
                        .map(|t| self.graph.resolve_type(self.table, t)),
                })
            }
            Definition::Constant(ref constant) => {
                let declared_type = constant
                    .declared_type
                    .as_ref()
                    .map(|t| self.graph.resolve_type(self.table, t));
                let literal_type = declared_type.as_ref().is_some_and(TypeRef::is_literal);
                let value = constant
                    .value
                    .as_ref()
                    .filter(|v| v.structural || literal_type)
                    .map(|v| v.literal.clone());
                Some(MemberDecl::Constant {
                    name: symbol.name,
                    declared_type,
                    value,
                })
            }
            Definition::TypeAlias(ref body) => Some(MemberDecl::TypeAlias {
                name: symbol.name,
                body: self.graph.resolve_type(self.table, body),
            }),
            Definition::Namespace(_) | Definition::TypeParam(_) => None,
        }
    }
}

impl InterfaceArtifact {
    /// Render the artifact as an RBI-style stub file.
    pub fn render_stub(&self) -> String {
        let mut out = String::new();
        out.push_str("# typed: strict\n");
        let _ = writeln!(
            out,
            "# Interface of package {} ({}). Generated by bulkhead; do not edit.",
            self.package, self.tier
        );

        for decl in &self.declarations {
            out.push('\n');
            render_namespace(&mut out, decl);
        }
        if !self.top_level.is_empty() {
            out.push('\n');
            for member in &self.top_level {
                render_member(&mut out, member, "");
            }
        }
        out
    }

    /// Render the artifact as pretty-printed JSON.
    pub fn render_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Number of non-shell declarations and members.
    pub fn symbol_count(&self) -> usize {
        self.declarations
            .iter()
            .map(|d| usize::from(!d.shell) + d.members.len() + d.type_params.len())
            .sum::<usize>()
            + self.top_level.len()
    }
}

fn render_namespace(out: &mut String, decl: &NamespaceDecl) {
    let keyword = if decl.kind == SymbolKind::Class {
        "class"
    } else {
        "module"
    };
    let _ = write!(out, "{} {}", keyword, decl.name);
    if let Some(superclass) = decl.superclass {
        let _ = write!(out, " < {}", superclass);
    }
    out.push('\n');

    let indent = "  ";
    let mut body = false;
    for include in &decl.includes {
        let _ = writeln!(out, "{}include {}", indent, include);
        body = true;
    }
    for modifier in &decl.modifiers {
        let _ = writeln!(out, "{}{}!", indent, modifier.as_str());
        body = true;
    }
    for param in &decl.type_params {
        render_type_param(out, param, indent);
        body = true;
    }
    for member in &decl.members {
        if body {
            out.push('\n');
        }
        render_member(out, member, indent);
        body = true;
    }
    out.push_str("end\n");
}

fn render_type_param(out: &mut String, param: &TypeParamDecl, indent: &str) {
    let call = if param.template {
        "type_template"
    } else {
        "type_member"
    };
    let _ = write!(out, "{}{} = {}", indent, param.name, call);
    match param.variance {
        Variance::Invariant => {}
        Variance::In => out.push_str("(:in)"),
        Variance::Out => out.push_str("(:out)"),
    }

    let bounds: Vec<String> = [("fixed", &param.fixed), ("upper", &param.upper), ("lower", &param.lower)]
        .into_iter()
        .filter_map(|(key, t)| t.as_ref().map(|t| format!("{}: {}", key, t)))
        .collect();
    if !bounds.is_empty() {
        let _ = write!(out, " {{ {{{}}} }}", bounds.join(", "));
    }
    out.push('\n');
}

fn render_member(out: &mut String, member: &MemberDecl, indent: &str) {
    match member {
        MemberDecl::Method {
            method,
            singleton,
            modifiers,
            params,
            returns,
            ..
        } => {
            let mut sig = String::new();
            for modifier in modifiers {
                match modifier {
                    Modifier::Abstract => sig.push_str("abstract."),
                    Modifier::Override => sig.push_str("override."),
                    _ => {}
                }
            }
            if !params.is_empty() {
                let list: Vec<String> = params
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.type_ref))
                    .collect();
                let _ = write!(sig, "params({}).", list.join(", "));
            }
            match returns {
                Some(t) => {
                    let _ = write!(sig, "returns({})", t);
                }
                None => sig.push_str("void"),
            }

            let final_sig = if modifiers.contains(&Modifier::Final) {
                "sig(:final)"
            } else {
                "sig"
            };
            let _ = writeln!(out, "{}{} {{ {} }}", indent, final_sig, sig);

            let receiver = if *singleton { "self." } else { "" };
            let args: Vec<String> = params.iter().map(render_param).collect();
            if args.is_empty() {
                let _ = writeln!(out, "{}def {}{}; end", indent, receiver, method);
            } else {
                let _ = writeln!(
                    out,
                    "{}def {}{}({}); end",
                    indent,
                    receiver,
                    method,
                    args.join(", ")
                );
            }
        }
        MemberDecl::Constant {
            name,
            declared_type,
            value,
        } => {
            let value = value.as_deref().unwrap_or("T.unsafe(nil)");
            let declared = declared_type
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "T.untyped".to_string());
            let _ = writeln!(
                out,
                "{}{} = T.let({}, {})",
                indent,
                name.last_segment(),
                value,
                declared
            );
        }
        MemberDecl::Alias { name, target } => {
            let _ = writeln!(out, "{}{} = {}", indent, name.last_segment(), target);
        }
        MemberDecl::TypeAlias { name, body } => {
            let _ = writeln!(
                out,
                "{}{} = T.type_alias {{ {} }}",
                indent,
                name.last_segment(),
                body
            );
        }
    }
}

fn render_param(param: &Param) -> String {
    match param.kind {
        ParamKind::Required => param.name.clone(),
        ParamKind::Optional => format!("{} = T.unsafe(nil)", param.name),
        ParamKind::Rest => format!("*{}", param.name),
        ParamKind::Keyword => format!("{}:", param.name),
        ParamKind::OptionalKeyword => format!("{}: T.unsafe(nil)", param.name),
        ParamKind::KeywordRest => format!("**{}", param.name),
        ParamKind::Block => format!("&{}", param.name),
    }
}
