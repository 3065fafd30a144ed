//! Export closure computation.
//!
//! Starting from a package's export entries, collect every symbol another
//! package needs in order to type-check against those exports. The walk is
//! breadth-first over the reference graph with a visited map, so reference
//! cycles between classes terminate naturally.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;

use serde::Serialize;

use crate::core::{ExportTier, Packages, SymbolId, SymbolTable};
use crate::graph::{AliasCycleError, EdgeKind, ReferenceGraph};
use crate::util::QualifiedName;

/// How much of a symbol the interface must expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reach {
    /// Only what is needed to refer to the symbol: its declaration, its
    /// methods, constants and type parameters. Nested namespaces stay out.
    Shape,
    /// Everything nested inside the symbol.
    Full,
}

impl fmt::Display for Reach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reach::Shape => f.write_str("shape"),
            Reach::Full => f.write_str("full"),
        }
    }
}

/// Why a symbol is part of a closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    /// Public when reachable from the public exports at all
    pub tier: ExportTier,
    pub reach: Reach,
    /// The edge that last widened this membership; `None` for seeds.
    pub via: Option<(SymbolId, EdgeKind)>,
}

/// The set of symbols that make up one package's interface at one tier.
#[derive(Debug, Clone)]
pub struct Closure {
    package: QualifiedName,
    tier: ExportTier,
    members: BTreeMap<SymbolId, Membership>,
    seeds: BTreeSet<SymbolId>,
}

impl Closure {
    pub fn package(&self) -> QualifiedName {
        self.package
    }

    pub fn tier(&self) -> ExportTier {
        self.tier
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn get(&self, id: SymbolId) -> Option<&Membership> {
        self.members.get(&id)
    }

    /// Members in id order.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Membership)> {
        self.members.iter().map(|(id, m)| (*id, m))
    }

    pub fn ids(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.members.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The export entries the walk started from.
    pub fn seeds(&self) -> &BTreeSet<SymbolId> {
        &self.seeds
    }

    pub fn is_seed(&self, id: SymbolId) -> bool {
        self.seeds.contains(&id)
    }

    /// Member names, sorted.
    pub fn names(&self, table: &SymbolTable) -> Vec<QualifiedName> {
        let mut names: Vec<_> = self.ids().map(|id| table.get(id).name).collect();
        names.sort();
        names
    }

    /// The chain of edges from a seed to `id`, seed first.
    ///
    /// Each step is `(symbol, edge that reached it)`; the seed has no edge.
    pub fn path_to(&self, id: SymbolId) -> Vec<(SymbolId, Option<EdgeKind>)> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut node = id;

        while let Some(membership) = self.members.get(&node) {
            if !seen.insert(node) {
                break;
            }
            path.push((node, membership.via.map(|(_, kind)| kind)));
            match membership.via {
                Some((from, _)) => node = from,
                None => break,
            }
        }

        path.reverse();
        path
    }
}

/// Computes closures against one shared, read-only analysis state.
#[derive(Clone, Copy)]
pub struct ClosureComputer<'a> {
    packages: &'a Packages,
    table: &'a SymbolTable,
    graph: &'a ReferenceGraph,
}

impl<'a> ClosureComputer<'a> {
    pub fn new(packages: &'a Packages, table: &'a SymbolTable, graph: &'a ReferenceGraph) -> Self {
        ClosureComputer {
            packages,
            table,
            graph,
        }
    }

    /// Compute the closure of `package` for consumers at `tier`.
    ///
    /// For the test-only tier the public exports are walked first, so
    /// anything they reach stays public; only symbols first reached from the
    /// test-only exports are classified test-only.
    pub fn closure_for(
        &self,
        package: QualifiedName,
        tier: ExportTier,
    ) -> Result<Closure, AliasCycleError> {
        let passes: &[ExportTier] = match tier {
            ExportTier::Public => &[ExportTier::Public],
            ExportTier::TestOnly => &[ExportTier::Public, ExportTier::TestOnly],
        };

        let mut walk = Walk {
            members: BTreeMap::new(),
            queue: VecDeque::new(),
        };
        let mut seeds = BTreeSet::new();

        for &pass in passes {
            for id in self.packages.exports_of(package, pass) {
                seeds.insert(id);
                walk.visit(id, pass, Reach::Full, None);
            }

            while let Some(id) = walk.queue.pop_front() {
                if let Some(err) = self.graph.alias_cycle(id) {
                    return Err(err.clone());
                }

                let reach = walk.members[&id].reach;
                for (target, kind) in self.graph.outgoing(id) {
                    let target_reach = match kind {
                        EdgeKind::Member if self.table.get(target).is_namespace() => {
                            if reach < Reach::Full {
                                continue;
                            }
                            Reach::Full
                        }
                        EdgeKind::Member | EdgeKind::AliasTarget => reach,
                        _ => Reach::Shape,
                    };
                    walk.visit(target, pass, target_reach, Some((id, kind)));
                }
            }
        }

        tracing::debug!(
            "closure of {} ({}): {} symbols from {} seeds",
            package,
            tier,
            walk.members.len(),
            seeds.len()
        );

        Ok(Closure {
            package,
            tier,
            members: walk.members,
            seeds,
        })
    }
}

struct Walk {
    members: BTreeMap<SymbolId, Membership>,
    queue: VecDeque<SymbolId>,
}

impl Walk {
    fn visit(
        &mut self,
        id: SymbolId,
        tier: ExportTier,
        reach: Reach,
        via: Option<(SymbolId, EdgeKind)>,
    ) {
        match self.members.get_mut(&id) {
            None => {
                self.members.insert(id, Membership { tier, reach, via });
                self.queue.push_back(id);
            }
            // Upgrading from shape to full exposes nested namespaces that
            // were skipped the first time.
            Some(existing) if reach > existing.reach => {
                existing.reach = reach;
                existing.via = via;
                self.queue.push_back(id);
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{load_packages, Manifest};
    use crate::graph::build_graph;
    use crate::test_support::fixtures;

    fn names(closure: &Closure, table: &SymbolTable) -> Vec<String> {
        closure
            .names(table)
            .iter()
            .map(|n| n.to_string())
            .collect()
    }

    #[test]
    fn test_rbigen_public_closure() {
        let fx = fixtures::rbi_gen();
        let closure = fx.closure("RBIGen", ExportTier::Public);
        let names = names(&closure, &fx.table);

        for expected in [
            "RBIGen::Public",
            "RBIGen::Public::RefersToPrivateTypes#method",
            "RBIGen::Public::FinalClass#final_method",
            "RBIGen::Public::MyEnum::Spades",
            "RBIGen::Public::ClassWithTypeParams::A",
            "Test::RBIGen",
            // referenced from an exported signature
            "RBIGen::Private::PrivateClass",
            // through an exported alias
            "RBIGen::Private::PrivateClassPulledInByClassAlias",
            // through a fixed type parameter binding
            "RBIGen::Private::PrivateClassPulledInByTypeTemplate",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }

        for absent in [
            "RBIGen::Private",
            "RBIGen::Private::PrivateClassNotReferenced",
            "RBIGen::Private::PrivateClassForTests",
        ] {
            assert!(!names.contains(&absent.to_string()), "unexpected {}", absent);
        }
    }

    #[test]
    fn test_test_only_export_gated_by_tier() {
        let fx = fixtures::rbi_gen();
        let for_tests = fx.id("RBIGen::Private::PrivateClassForTests");

        let public = fx.closure("RBIGen", ExportTier::Public);
        assert!(!public.contains(for_tests));

        let test = fx.closure("RBIGen", ExportTier::TestOnly);
        assert_eq!(test.get(for_tests).map(|m| m.tier), Some(ExportTier::TestOnly));
    }

    #[test]
    fn test_public_tier_takes_precedence() {
        let fx = fixtures::rbi_gen();
        let test = fx.closure("RBIGen", ExportTier::TestOnly);
        let private_class = fx.id("RBIGen::Private::PrivateClass");
        assert_eq!(test.get(private_class).map(|m| m.tier), Some(ExportTier::Public));
        assert!(test
            .iter()
            .filter(|(_, m)| m.tier == ExportTier::TestOnly)
            .all(|(id, _)| fx.table.get(id).name.is_within(QualifiedName::new(
                "RBIGen::Private::PrivateClassForTests"
            ))));
    }

    #[test]
    fn test_closure_is_idempotent() {
        let fx = fixtures::rbi_gen();
        let a = fx.closure("RBIGen", ExportTier::TestOnly);
        let b = fx.closure("RBIGen", ExportTier::TestOnly);
        assert_eq!(names(&a, &fx.table), names(&b, &fx.table));
        assert_eq!(a.seeds(), b.seeds());
    }

    #[test]
    fn test_adding_an_export_only_grows_the_closure() {
        let fx = fixtures::rbi_gen();
        let before = fx.closure("RBIGen", ExportTier::Public);

        let mut manifest = fixtures::rbi_gen_manifest();
        manifest = manifest.with_export("RBIGen::Private::PrivateClassNotReferenced");
        let packages = load_packages(&[manifest], &fx.table).unwrap();
        let after = ClosureComputer::new(&packages, &fx.table, &fx.graph)
            .closure_for(QualifiedName::new("RBIGen"), ExportTier::Public)
            .unwrap();

        assert!(before.ids().all(|id| after.contains(id)));
        assert!(after.contains(fx.id("RBIGen::Private::PrivateClassNotReferenced")));
        assert!(after.len() > before.len());
    }

    #[test]
    fn test_signature_references_are_closed() {
        let fx = fixtures::rbi_gen();
        let closure = fx.closure("RBIGen", ExportTier::TestOnly);
        for id in closure.ids() {
            for (target, kind) in fx.graph.outgoing(id) {
                if kind != EdgeKind::Member {
                    assert!(
                        closure.contains(target),
                        "{} references {} which is missing",
                        fx.table.get(id).name,
                        fx.table.get(target).name
                    );
                }
            }
        }
    }

    #[test]
    fn test_shape_does_not_pull_sibling_namespaces() {
        let table = SymbolTable::from_json(
            r#"{"symbols": [
                {"name": "Lib", "kind": "module", "package": "Lib"},
                {"name": "Lib::Api", "kind": "class"},
                {"name": "Lib::Api#run", "kind": "method", "returns": "Lib::Impl"},
                {"name": "Lib::Impl", "kind": "class"},
                {"name": "Lib::Impl#call", "kind": "method"},
                {"name": "Lib::Impl::Helper", "kind": "class"}
            ]}"#,
        )
        .unwrap();
        let packages = load_packages(&[Manifest::new("Lib").with_export("Lib::Api")], &table).unwrap();
        let graph = build_graph(&table);
        let closure = ClosureComputer::new(&packages, &table, &graph)
            .closure_for(QualifiedName::new("Lib"), ExportTier::Public)
            .unwrap();

        let impl_id = table.lookup("Lib::Impl").unwrap();
        assert_eq!(closure.get(impl_id).map(|m| m.reach), Some(Reach::Shape));
        assert!(closure.contains(table.lookup("Lib::Impl#call").unwrap()));
        assert!(!closure.contains(table.lookup("Lib::Impl::Helper").unwrap()));
    }

    #[test]
    fn test_reference_cycles_terminate() {
        let table = SymbolTable::from_json(
            r#"{"symbols": [
                {"name": "Graph", "kind": "module", "package": "Graph"},
                {"name": "Graph::Node", "kind": "class"},
                {"name": "Graph::Node#edge", "kind": "method", "returns": "Graph::Edge"},
                {"name": "Graph::Edge", "kind": "class"},
                {"name": "Graph::Edge#node", "kind": "method", "returns": "Graph::Node"}
            ]}"#,
        )
        .unwrap();
        let packages =
            load_packages(&[Manifest::new("Graph").with_export("Graph::Node")], &table).unwrap();
        let graph = build_graph(&table);
        let closure = ClosureComputer::new(&packages, &table, &graph)
            .closure_for(QualifiedName::new("Graph"), ExportTier::Public)
            .unwrap();
        assert_eq!(closure.len(), 4);
    }

    #[test]
    fn test_cyclic_alias_fails_only_when_reached() {
        let table = SymbolTable::from_json(
            r#"{"symbols": [
                {"name": "A", "kind": "module", "package": "A"},
                {"name": "A::Api", "kind": "class"},
                {"name": "A::Loop", "kind": "constant", "alias_of": "A::Loop2"},
                {"name": "A::Loop2", "kind": "constant", "alias_of": "A::Loop"},
                {"name": "B", "kind": "module", "package": "B"},
                {"name": "B::Api", "kind": "class"},
                {"name": "B::Api#run", "kind": "method", "returns": "A::Loop"}
            ]}"#,
        )
        .unwrap();
        let manifests = vec![
            Manifest::new("A").with_export("A::Api"),
            Manifest::new("B").with_export("B::Api"),
        ];
        let packages = load_packages(&manifests, &table).unwrap();
        let graph = build_graph(&table);
        let computer = ClosureComputer::new(&packages, &table, &graph);

        assert!(computer
            .closure_for(QualifiedName::new("A"), ExportTier::Public)
            .is_ok());
        let err = computer
            .closure_for(QualifiedName::new("B"), ExportTier::Public)
            .unwrap_err();
        assert_eq!(err.alias, "A::Loop");
    }

    #[test]
    fn test_path_to_explains_membership() {
        let fx = fixtures::rbi_gen();
        let closure = fx.closure("RBIGen", ExportTier::Public);
        let path = closure.path_to(fx.id("RBIGen::Private::PrivateClass"));
        let rendered: Vec<_> = path
            .iter()
            .map(|(id, edge)| (fx.table.get(*id).name.as_str(), *edge))
            .collect();

        assert_eq!(rendered.first(), Some(&("RBIGen::Public", None)));
        assert_eq!(
            rendered.last(),
            Some(&("RBIGen::Private::PrivateClass", Some(EdgeKind::Signature)))
        );
    }
}
