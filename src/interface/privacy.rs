//! Privacy and modifier validation of a computed closure.
//!
//! Nothing here is fatal. Every finding is collected into a sorted set and
//! returned with the interface, so a package with violations still gets an
//! artifact that type-checks downstream.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{ExportTier, Modifier, Packages, SymbolId, SymbolKind, SymbolTable};
use crate::graph::{EdgeKind, ReferenceGraph};
use crate::interface::{Closure, Reach};
use crate::util::diagnostic::Diagnostic;
use crate::util::QualifiedName;

/// A rule broken by a package's interface.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Error)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Violation {
    #[error("`{symbol}` is private to `{owner}` but is part of the {tier} interface of `{package}`")]
    LeakedPrivateSymbol {
        package: QualifiedName,
        symbol: QualifiedName,
        owner: QualifiedName,
        tier: ExportTier,
        via: Option<QualifiedName>,
    },

    #[error("`{package}` refers to `{symbol}` from `{owner}` without depending on `{owner}`")]
    MissingDependency {
        package: QualifiedName,
        symbol: QualifiedName,
        owner: QualifiedName,
        referenced_from: QualifiedName,
    },

    #[error("`{subclass}` extends sealed `{sealed}` from outside its package")]
    SealedSubclass {
        package: QualifiedName,
        subclass: QualifiedName,
        sealed: QualifiedName,
        subclass_owner: Option<QualifiedName>,
        sealed_owner: Option<QualifiedName>,
    },

    #[error("`{subclass}` extends final `{final_class}`")]
    FinalSubclass {
        package: QualifiedName,
        subclass: QualifiedName,
        final_class: QualifiedName,
    },

    #[error("`{method}` overrides final method `{overridden}`")]
    FinalMethodOverride {
        package: QualifiedName,
        method: QualifiedName,
        overridden: QualifiedName,
    },

    #[error("`{class}` does not implement abstract method `{method}` declared in `{declared_in}`")]
    UnimplementedAbstractMethod {
        package: QualifiedName,
        class: QualifiedName,
        method: String,
        declared_in: QualifiedName,
    },
}

/// The kind of a [`Violation`], as named in configuration and `--deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    LeakedPrivateSymbol,
    MissingDependency,
    SealedSubclass,
    FinalSubclass,
    FinalMethodOverride,
    UnimplementedAbstractMethod,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 6] = [
        ViolationKind::LeakedPrivateSymbol,
        ViolationKind::MissingDependency,
        ViolationKind::SealedSubclass,
        ViolationKind::FinalSubclass,
        ViolationKind::FinalMethodOverride,
        ViolationKind::UnimplementedAbstractMethod,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::LeakedPrivateSymbol => "leaked-private-symbol",
            ViolationKind::MissingDependency => "missing-dependency",
            ViolationKind::SealedSubclass => "sealed-subclass",
            ViolationKind::FinalSubclass => "final-subclass",
            ViolationKind::FinalMethodOverride => "final-method-override",
            ViolationKind::UnimplementedAbstractMethod => "unimplemented-abstract-method",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViolationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = ViolationKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown violation kind `{}` (expected one of: {})", s, known.join(", "))
            })
    }
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::LeakedPrivateSymbol { .. } => ViolationKind::LeakedPrivateSymbol,
            Violation::MissingDependency { .. } => ViolationKind::MissingDependency,
            Violation::SealedSubclass { .. } => ViolationKind::SealedSubclass,
            Violation::FinalSubclass { .. } => ViolationKind::FinalSubclass,
            Violation::FinalMethodOverride { .. } => ViolationKind::FinalMethodOverride,
            Violation::UnimplementedAbstractMethod { .. } => {
                ViolationKind::UnimplementedAbstractMethod
            }
        }
    }

    /// The package whose interface the violation was found in.
    pub fn package(&self) -> QualifiedName {
        match self {
            Violation::LeakedPrivateSymbol { package, .. }
            | Violation::MissingDependency { package, .. }
            | Violation::SealedSubclass { package, .. }
            | Violation::FinalSubclass { package, .. }
            | Violation::FinalMethodOverride { package, .. }
            | Violation::UnimplementedAbstractMethod { package, .. } => *package,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::warning(self.to_string())
            .with_context(format!("{} in package `{}`", self.kind(), self.package()));
        match self {
            Violation::LeakedPrivateSymbol {
                symbol, owner, via, ..
            } => {
                let diag = match via {
                    Some(via) => diag.with_context(format!("referenced from `{}`", via)),
                    None => diag,
                };
                diag.with_suggestion(format!("Export `{}` from `{}`", symbol, owner))
                    .with_suggestion(format!(
                        "Or have `{}` export an alias of it, or bind it as a fixed type parameter",
                        owner
                    ))
                    .with_suggestion("Or stop referring to it from an exported signature")
            }
            Violation::MissingDependency {
                owner,
                referenced_from,
                ..
            } => diag
                .with_context(format!("referenced from `{}`", referenced_from))
                .with_suggestion(format!("Add `{}` to the package's dependencies", owner)),
            Violation::SealedSubclass {
                subclass_owner,
                sealed_owner,
                ..
            } => diag
                .with_context(format!(
                    "subclass is in {}, sealed class is in {}",
                    describe_owner(*subclass_owner),
                    describe_owner(*sealed_owner)
                ))
                .with_suggestion("Move the subclass into the sealed class's package")
                .with_suggestion("Or remove `sealed!` from the parent"),
            Violation::FinalSubclass { final_class, .. } => diag
                .with_suggestion(format!("Remove `final!` from `{}`", final_class))
                .with_suggestion("Or compose instead of inheriting"),
            Violation::FinalMethodOverride { overridden, .. } => diag.with_suggestion(format!(
                "Rename the method, or drop `sig(:final)` from `{}`",
                overridden
            )),
            Violation::UnimplementedAbstractMethod { method, class, .. } => diag
                .with_suggestion(format!("Implement `{}` in `{}`", method, class))
                .with_suggestion(format!("Or mark `{}` abstract", class)),
        }
    }
}

fn describe_owner(owner: Option<QualifiedName>) -> String {
    match owner {
        Some(owner) => format!("`{}`", owner),
        None => "no package".to_string(),
    }
}

/// Validate `closure` against the export rules of every package it touches.
pub fn validate(
    packages: &Packages,
    table: &SymbolTable,
    graph: &ReferenceGraph,
    closure: &Closure,
) -> BTreeSet<Violation> {
    let validator = Validator {
        packages,
        table,
        graph,
        closure,
        package: closure.package(),
    };

    let mut violations = BTreeSet::new();
    validator.check_leaks(&mut violations);
    validator.check_dependencies(&mut violations);
    validator.check_subclass_edges(&mut violations);
    validator.check_methods(&mut violations);

    tracing::debug!(
        "validated {} ({}): {} violations",
        closure.package(),
        closure.tier(),
        violations.len()
    );
    violations
}

struct Validator<'a> {
    packages: &'a Packages,
    table: &'a SymbolTable,
    graph: &'a ReferenceGraph,
    closure: &'a Closure,
    package: QualifiedName,
}

impl Validator<'_> {
    /// Closure members owned by some other known package.
    fn foreign_members(&self) -> impl Iterator<Item = (SymbolId, QualifiedName, ExportTier)> + '_ {
        self.closure.iter().filter_map(|(id, membership)| {
            let owner = self.table.get(id).package?;
            if owner == self.package || self.packages.get(owner).is_none() {
                return None;
            }
            Some((id, owner, membership.tier))
        })
    }

    fn check_leaks(&self, out: &mut BTreeSet<Violation>) {
        for (id, owner, tier) in self.foreign_members() {
            let symbol = self.table.get(id);
            if self.closure.is_seed(id) || self.packages.is_exported(symbol, tier) {
                continue;
            }
            if self.is_sanctioned(id, owner, tier) {
                continue;
            }

            let via = self
                .closure
                .get(id)
                .and_then(|m| m.via)
                .map(|(from, _)| self.table.get(from).name);
            out.insert(Violation::LeakedPrivateSymbol {
                package: self.package,
                symbol: symbol.name,
                owner,
                tier,
                via,
            });
        }
    }

    /// Whether some edge from inside the closure makes reaching `id`
    /// legitimate even though `owner` does not export it.
    fn is_sanctioned(&self, id: SymbolId, owner: QualifiedName, tier: ExportTier) -> bool {
        self.graph
            .incoming(id)
            .into_iter()
            .filter(|(from, _)| self.closure.contains(*from))
            .any(|(from, kind)| match kind {
                EdgeKind::FixedBinding => true,
                // The enclosing namespace carries the report, but a nested
                // namespace is only covered when its parent exposes its
                // contents.
                EdgeKind::Member => {
                    !self.table.get(id).is_namespace()
                        || self
                            .closure
                            .get(from)
                            .is_some_and(|parent| parent.reach == Reach::Full)
                }
                EdgeKind::AliasTarget => {
                    let alias = self.table.get(from);
                    alias.package == Some(owner) && self.packages.is_exported(alias, tier)
                }
                _ => false,
            })
    }

    fn check_dependencies(&self, out: &mut BTreeSet<Violation>) {
        let Some(package) = self.packages.get(self.package) else {
            return;
        };
        for (id, owner, _) in self.foreign_members() {
            if package.depends_on(owner) {
                continue;
            }
            let referrer = self
                .graph
                .incoming(id)
                .into_iter()
                .filter(|(from, kind)| *kind != EdgeKind::Member && self.closure.contains(*from))
                .map(|(from, _)| self.table.get(from))
                .find(|from| from.package == Some(self.package));

            if let Some(referrer) = referrer {
                out.insert(Violation::MissingDependency {
                    package: self.package,
                    symbol: self.table.get(id).name,
                    owner,
                    referenced_from: referrer.name,
                });
            }
        }
    }

    /// Symbols whose own declarations this package answers for.
    fn sources(&self) -> BTreeSet<SymbolId> {
        let mut sources: BTreeSet<SymbolId> = self.closure.ids().collect();
        sources.extend(self.table.owned_by(self.package).map(|s| s.id));
        sources
    }

    /// Superclass/include edges touching the closure, with alias targets
    /// resolved to the class or module they stand for.
    fn subclass_edges(&self) -> BTreeSet<(SymbolId, SymbolId, EdgeKind)> {
        let mut edges = BTreeSet::new();

        for source in self.sources() {
            for (target, kind) in self.graph.outgoing(source) {
                if kind.is_subclass() {
                    edges.insert((source, self.graph.terminal(target), kind));
                }
            }
        }

        for target in self.closure.ids() {
            let terminal = self.graph.terminal(target);
            for (source, kind) in self.graph.incoming(target) {
                if kind.is_subclass() {
                    edges.insert((source, terminal, kind));
                } else if kind == EdgeKind::AliasTarget {
                    for (via_alias, kind) in self.graph.incoming(source) {
                        if kind.is_subclass() {
                            edges.insert((via_alias, terminal, kind));
                        }
                    }
                }
            }
        }

        edges
    }

    fn check_subclass_edges(&self, out: &mut BTreeSet<Violation>) {
        for (source, target, _) in self.subclass_edges() {
            let subclass = self.table.get(source);
            let parent = self.table.get(target);

            if parent.modifiers.contains(Modifier::Final) {
                out.insert(Violation::FinalSubclass {
                    package: self.package,
                    subclass: subclass.name,
                    final_class: parent.name,
                });
            }
            if parent.modifiers.contains(Modifier::Sealed) && subclass.package != parent.package {
                out.insert(Violation::SealedSubclass {
                    package: self.package,
                    subclass: subclass.name,
                    sealed: parent.name,
                    subclass_owner: subclass.package,
                    sealed_owner: parent.package,
                });
            }
        }
    }

    /// Method-level checks over every class's ancestor chain.
    fn check_methods(&self, out: &mut BTreeSet<Violation>) {
        for id in self.sources() {
            let class = self.table.get(id);
            if !class.is_namespace() {
                continue;
            }

            let ancestors = self.graph.ancestors(self.table, id);
            if ancestors.is_empty() {
                continue;
            }
            let own = self.methods_of(id);

            for &ancestor in &ancestors {
                for (key, &method) in &self.methods_of(ancestor) {
                    let inherited = self.table.get(method);
                    if !inherited.modifiers.contains(Modifier::Final) {
                        continue;
                    }
                    if let Some(&overriding) = own.get(key) {
                        out.insert(Violation::FinalMethodOverride {
                            package: self.package,
                            method: self.table.get(overriding).name,
                            overridden: inherited.name,
                        });
                    }
                }
            }

            let concrete_class = class.kind == SymbolKind::Class
                && !class.modifiers.is_abstract()
                && self.closure.contains(id);
            if concrete_class {
                self.check_abstract(id, &ancestors, out);
            }
        }
    }

    fn check_abstract(&self, id: SymbolId, ancestors: &[SymbolId], out: &mut BTreeSet<Violation>) {
        let mut implemented: BTreeSet<(&'static str, bool)> = BTreeSet::new();
        let mut required: BTreeMap<(&'static str, bool), SymbolId> = BTreeMap::new();

        for &namespace in std::iter::once(&id).chain(ancestors) {
            for (key, method) in self.methods_of(namespace) {
                if self.table.get(method).modifiers.contains(Modifier::Abstract) {
                    required.entry(key).or_insert(namespace);
                } else {
                    implemented.insert(key);
                }
            }
        }

        for ((name, singleton), declared_in) in required {
            if implemented.contains(&(name, singleton)) {
                continue;
            }
            out.insert(Violation::UnimplementedAbstractMethod {
                package: self.package,
                class: self.table.get(id).name,
                method: if singleton {
                    format!("self.{}", name)
                } else {
                    name.to_string()
                },
                declared_in: self.table.get(declared_in).name,
            });
        }
    }

    fn methods_of(&self, namespace: SymbolId) -> BTreeMap<(&'static str, bool), SymbolId> {
        self.table
            .members(namespace)
            .iter()
            .filter_map(|&m| self.table.get(m).method_key().map(|key| (key, m)))
            .collect()
    }
}
