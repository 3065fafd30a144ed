//! Alias chain resolution.
//!
//! A constant may be bound to another constant, which may itself be an
//! alias. Chains are dereferenced once, eagerly, while the reference graph
//! is built; every later query reads the stored result.

use thiserror::Error;

use crate::core::{SymbolId, SymbolTable};
use crate::util::diagnostic::Diagnostic;
use crate::util::QualifiedName;

/// An alias whose chain never reaches a non-alias symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error, miette::Diagnostic)]
#[error("alias `{alias}` never resolves: {}", chain.join(" -> "))]
#[diagnostic(
    code(bulkhead::graph::alias_cycle),
    help("point one of the aliases at a class, module or value")
)]
pub struct AliasCycleError {
    /// The alias whose resolution was requested
    pub alias: String,
    /// The repeating part of the chain, first element repeated at the end
    pub chain: Vec<String>,
}

impl AliasCycleError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self, package: QualifiedName) -> Diagnostic {
        Diagnostic::error(format!(
            "interface for `{}` withheld: alias `{}` is cyclic",
            package, self.alias
        ))
        .with_context(format!("cycle: {}", self.chain.join(" -> ")))
        .with_suggestion("Point one of the aliases at a class, module or value")
    }
}

/// Where an alias ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasResolution {
    /// A symbol in the table that is not itself an alias
    Terminal(SymbolId),
    /// A name the symbol table does not know (standard library, external code)
    External(QualifiedName),
    /// The chain loops
    Cycle(AliasCycleError),
}

/// Follow the alias chain starting at `start`.
///
/// A chain longer than the number of symbols must revisit one of them, so
/// the walk is bounded by the table size.
pub fn resolve_alias(table: &SymbolTable, start: SymbolId) -> AliasResolution {
    let limit = table.len();
    let mut chain = vec![start];
    let mut current = start;

    for _ in 0..=limit {
        let symbol = table.get(current);
        let Some(target) = symbol.alias_target() else {
            return AliasResolution::Terminal(current);
        };
        match table.lookup(target) {
            Some(next) => {
                chain.push(next);
                current = next;
            }
            None => return AliasResolution::External(target),
        }
    }

    AliasResolution::Cycle(cycle_error(table, start, &chain))
}

fn cycle_error(table: &SymbolTable, start: SymbolId, chain: &[SymbolId]) -> AliasCycleError {
    let mut first_seen = std::collections::HashMap::new();
    let mut cycle: &[SymbolId] = chain;
    for (i, id) in chain.iter().enumerate() {
        if let Some(&first) = first_seen.get(id) {
            cycle = &chain[first..=i];
            break;
        }
        first_seen.insert(*id, i);
    }

    AliasCycleError {
        alias: table.get(start).name.to_string(),
        chain: cycle
            .iter()
            .map(|id| table.get(*id).name.to_string())
            .collect(),
    }
}
