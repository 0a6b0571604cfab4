//! Semantic analysis passes.
//!
//! - Name resolution across the separate namespaces (symbol_table)
//! - Relation dependency order and cycle detection (dependencies)

pub mod dependencies;
pub mod symbol_table;

#[cfg(test)]
mod dependencies_tests;

pub use dependencies::{DependencyAnalysis, analyze_dependencies};
pub use symbol_table::{FunctionEntry, RelationEntry, SymbolTable, TypeEntry, resolve_names};
