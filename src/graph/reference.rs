//! The symbol reference graph.
//!
//! Built once per run, before any per-package work starts, and shared
//! read-only by every worker afterwards.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use crate::core::{Definition, SymbolId, SymbolTable, TypeRef};
use crate::graph::alias::{resolve_alias, AliasCycleError, AliasResolution};
use crate::util::QualifiedName;

/// Why one symbol refers to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Namespace to a symbol nested directly inside it
    Member,
    /// Method parameter/return types, constant types, type alias bodies
    Signature,
    Superclass,
    Include,
    /// Alias to its terminal target
    AliasTarget,
    /// Type parameter to its upper/lower bound
    TypeBound,
    /// Type parameter to its fixed binding
    FixedBinding,
}

impl EdgeKind {
    /// Edges that make the source a subclass or includer of the target.
    pub fn is_subclass(self) -> bool {
        matches!(self, EdgeKind::Superclass | EdgeKind::Include)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Member => "member",
            EdgeKind::Signature => "signature",
            EdgeKind::Superclass => "superclass",
            EdgeKind::Include => "include",
            EdgeKind::AliasTarget => "alias",
            EdgeKind::TypeBound => "type bound",
            EdgeKind::FixedBinding => "fixed binding",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to a name the symbol table does not contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRef {
    pub from: SymbolId,
    pub name: QualifiedName,
    pub kind: EdgeKind,
}

/// Directed, edge-labelled graph over every symbol in the table.
///
/// Node `i` always holds `SymbolId(i)`.
#[derive(Debug, Clone)]
pub struct ReferenceGraph {
    graph: DiGraph<SymbolId, EdgeKind>,
    aliases: HashMap<SymbolId, AliasResolution>,
    unresolved: Vec<UnresolvedRef>,
}

/// Build the reference graph. See [`ReferenceGraph::build`].
pub fn build_graph(table: &SymbolTable) -> ReferenceGraph {
    ReferenceGraph::build(table)
}

impl ReferenceGraph {
    /// Walk every symbol and record an edge to everything it references.
    pub fn build(table: &SymbolTable) -> Self {
        let mut builder = GraphBuilder {
            table,
            graph: DiGraph::with_capacity(table.len(), table.len() * 2),
            seen: HashSet::new(),
            unresolved: Vec::new(),
        };

        for symbol in table.iter() {
            let node = builder.graph.add_node(symbol.id);
            debug_assert_eq!(node.index(), symbol.id.index());
        }

        let mut aliases = HashMap::new();

        for symbol in table.iter() {
            let id = symbol.id;

            if let Some(owner) = symbol.owner {
                builder.edge(owner, id, EdgeKind::Member);
            }

            // An alias gets exactly one outgoing reference: its terminal.
            if symbol.is_alias() {
                let resolution = resolve_alias(table, id);
                match resolution {
                    AliasResolution::Terminal(target) => {
                        builder.edge(id, target, EdgeKind::AliasTarget)
                    }
                    AliasResolution::External(name) => {
                        builder.unresolved(id, name, EdgeKind::AliasTarget)
                    }
                    AliasResolution::Cycle(ref err) => {
                        tracing::warn!("{}", err);
                    }
                }
                aliases.insert(id, resolution);
                continue;
            }

            match symbol.definition {
                Definition::Namespace(ref ns) => {
                    if let Some(superclass) = ns.superclass {
                        builder.name(id, superclass, EdgeKind::Superclass);
                    }
                    for &include in &ns.includes {
                        builder.name(id, include, EdgeKind::Include);
                    }
                }
                Definition::Method(ref sig) => {
                    for name in sig.referenced_names() {
                        builder.name(id, name, EdgeKind::Signature);
                    }
                }
                Definition::Constant(ref constant) => {
                    if let Some(ref declared) = constant.declared_type {
                        builder.type_ref(id, declared, EdgeKind::Signature);
                    }
                }
                Definition::TypeAlias(ref body) => {
                    builder.type_ref(id, body, EdgeKind::Signature);
                }
                Definition::TypeParam(ref param) => {
                    if let Some(ref fixed) = param.fixed {
                        builder.type_ref(id, fixed, EdgeKind::FixedBinding);
                    }
                    for bound in [&param.upper, &param.lower].into_iter().flatten() {
                        builder.type_ref(id, bound, EdgeKind::TypeBound);
                    }
                }
            }
        }

        let graph = ReferenceGraph {
            graph: builder.graph,
            aliases,
            unresolved: builder.unresolved,
        };

        tracing::debug!(
            "reference graph: {} symbols, {} edges, {} aliases, {} unresolved references",
            graph.graph.node_count(),
            graph.graph.edge_count(),
            graph.aliases.len(),
            graph.unresolved.len()
        );

        graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing references of `id`, ordered by target then kind.
    pub fn outgoing(&self, id: SymbolId) -> Vec<(SymbolId, EdgeKind)> {
        self.edges(id, Direction::Outgoing)
    }

    /// Symbols referring to `id`, ordered by source then kind.
    pub fn incoming(&self, id: SymbolId) -> Vec<(SymbolId, EdgeKind)> {
        self.edges(id, Direction::Incoming)
    }

    fn edges(&self, id: SymbolId, direction: Direction) -> Vec<(SymbolId, EdgeKind)> {
        let node = NodeIndex::new(id.index());
        if node.index() >= self.graph.node_count() {
            return Vec::new();
        }
        let mut out: Vec<_> = self
            .graph
            .edges_directed(node, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (self.graph[other], *e.weight())
            })
            .collect();
        out.sort();
        out
    }

    /// How the alias `id` resolved, if it is an alias.
    pub fn alias_resolution(&self, id: SymbolId) -> Option<&AliasResolution> {
        self.aliases.get(&id)
    }

    /// The cycle error for `id`, if `id` is an alias that never resolves.
    pub fn alias_cycle(&self, id: SymbolId) -> Option<&AliasCycleError> {
        match self.aliases.get(&id) {
            Some(AliasResolution::Cycle(err)) => Some(err),
            _ => None,
        }
    }

    /// Every cyclic alias in the table, in id order.
    pub fn alias_cycles(&self) -> Vec<(SymbolId, &AliasCycleError)> {
        let mut out: Vec<_> = self
            .aliases
            .iter()
            .filter_map(|(id, r)| match r {
                AliasResolution::Cycle(err) => Some((*id, err)),
                _ => None,
            })
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// The symbol `id` stands for once aliases are looked through.
    pub fn terminal(&self, id: SymbolId) -> SymbolId {
        match self.aliases.get(&id) {
            Some(AliasResolution::Terminal(target)) => *target,
            _ => id,
        }
    }

    /// The name `name` stands for once aliases are looked through.
    pub fn terminal_name(&self, table: &SymbolTable, name: QualifiedName) -> QualifiedName {
        let Some(id) = table.lookup(name) else {
            return name;
        };
        match self.aliases.get(&id) {
            Some(AliasResolution::Terminal(target)) => table.get(*target).name,
            Some(AliasResolution::External(external)) => *external,
            _ => name,
        }
    }

    /// Rewrite a type so that every alias name is replaced by its terminal.
    pub fn resolve_type(&self, table: &SymbolTable, type_ref: &TypeRef) -> TypeRef {
        type_ref.map_names(&|name| self.terminal_name(table, name))
    }

    /// Transitive superclasses and included modules of `id`, nearest first.
    ///
    /// Aliases along the way are looked through and not reported.
    pub fn ancestors(&self, table: &SymbolTable, id: SymbolId) -> Vec<SymbolId> {
        let mut visited = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            for (target, kind) in self.outgoing(current) {
                let follow = kind.is_subclass()
                    || (kind == EdgeKind::AliasTarget && table.get(current).is_alias());
                if !follow || !visited.insert(target) {
                    continue;
                }
                if table.get(target).is_namespace() {
                    out.push(target);
                }
                queue.push_back(target);
            }
        }

        out
    }

    /// References to names missing from the symbol table.
    pub fn unresolved(&self) -> &[UnresolvedRef] {
        &self.unresolved
    }
}

struct GraphBuilder<'a> {
    table: &'a SymbolTable,
    graph: DiGraph<SymbolId, EdgeKind>,
    seen: HashSet<(SymbolId, SymbolId, EdgeKind)>,
    unresolved: Vec<UnresolvedRef>,
}

impl GraphBuilder<'_> {
    fn edge(&mut self, from: SymbolId, to: SymbolId, kind: EdgeKind) {
        if self.seen.insert((from, to, kind)) {
            self.graph.add_edge(
                NodeIndex::new(from.index()),
                NodeIndex::new(to.index()),
                kind,
            );
        }
    }

    fn name(&mut self, from: SymbolId, name: QualifiedName, kind: EdgeKind) {
        match self.table.lookup(name) {
            Some(to) => self.edge(from, to, kind),
            None => self.unresolved(from, name, kind),
        }
    }

    fn type_ref(&mut self, from: SymbolId, type_ref: &TypeRef, kind: EdgeKind) {
        for name in type_ref.referenced_names() {
            self.name(from, name, kind);
        }
    }

    fn unresolved(&mut self, from: SymbolId, name: QualifiedName, kind: EdgeKind) {
        tracing::debug!(
            "{} reference from `{}` to unknown `{}`",
            kind,
            self.table.get(from).name,
            name
        );
        self.unresolved.push(UnresolvedRef { from, name, kind });
    }
}
