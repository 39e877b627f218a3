//! Expression synthesis for WebQL.
//!
//! Lowers an analyzed [`webql_ast::WebqlQuery`] into a backend-neutral
//! [`BackendExpression`] tree, dispatching element-wise collection
//! operations through the pluggable [`QueryProvider`] abstraction.

pub mod expr;
pub mod provider;
pub mod synthesizer;

pub use expr::{BackendExpression, BinaryOperator, ConstantValue, UnaryOperator};
pub use provider::{ElementOperation, ProviderOperation, QueryProvider, StandardProvider};
pub use synthesizer::{ExpressionSynthesizer, SynthesizedQuery};
