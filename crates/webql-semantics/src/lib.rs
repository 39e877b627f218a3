//! Scoped semantic analysis for WebQL queries.
//!
//! Binds every reference, classifies every operator into its category,
//! validates operand types, and resolves a type for every AST node into a
//! write-once [`SemanticContext`] the expression synthesizer consumes.

pub mod analyzer;
pub mod context;
pub mod scope;

pub use analyzer::{
    reset_semantic_metrics, semantic_metrics_snapshot, SemanticAnalyzer, SemanticMetricsSnapshot,
};
pub use context::{ResolvedSemantic, SemanticContext};
pub use scope::{Scope, ScopeStack, SymbolTableEntry};
