//! Per-package interface computation: closure, validation and emission.

pub mod closure;
pub mod emit;
pub mod privacy;

pub use closure::{Closure, ClosureComputer, Membership, Reach};
pub use emit::{emit, InterfaceArtifact, MemberDecl, NamespaceDecl, TypeParamDecl};
pub use privacy::{validate, Violation, ViolationKind};
