//! Symbol reference graph and alias resolution.

pub mod alias;
pub mod reference;

pub use alias::{resolve_alias, AliasCycleError, AliasResolution};
pub use reference::{build_graph, EdgeKind, ReferenceGraph, UnresolvedRef};
