//! Hierarchical symbol registry: packages declare symbols into
//! insertion-ordered tables, and scopes chain tables for lexical lookup.

pub mod scope;
pub mod symbol;

pub use scope::{Scope, Table};
pub use symbol::{Symbol, SymbolKind};
