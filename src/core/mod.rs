//! Core data structures for Bulkhead.
//!
//! This module contains the foundational types used throughout Bulkhead:
//! - Resolved symbols and the symbol table they live in
//! - Package manifests and the package registry built from them

pub mod manifest;
pub mod package;
pub mod registry;
pub mod symbol;
pub mod symbol_table;

pub use manifest::{discover_manifests, Manifest, MANIFEST_NAME};
pub use package::{ExportEntry, ExportTier, Package};
pub use registry::{load_packages, ManifestError, Packages};
pub use symbol::{
    CompoundType, ConstValue, ConstantDef, Definition, Modifier, Modifiers, NamespaceDef, Param,
    ParamKind, Signature, Symbol, SymbolId, SymbolKind, TypeParamDef, TypeRef, Variance,
};
pub use symbol_table::{RawSymbol, RawSymbolTable, SymbolTable, SymbolTableError};
