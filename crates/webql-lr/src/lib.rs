//! Canonical LR(1) table construction and the shift-reduce parser engine.
//!
//! `Lr1TableBuilder` turns a prepared grammar from `webql-grammar` into an
//! immutable action/goto table; `Lr1Parser` drives the table over a token
//! stream from `webql-lexer`, producing a [`CstNode`] tree; [`cst::reduce`]
//! strips grammatical scaffolding down to the nodes the AST builder cares
//! about.

pub mod cst;
pub mod item;
pub mod parser;
pub mod table;

pub use cst::{reduce, CstNode};
pub use item::{FirstSets, ItemSet, Lr1Item};
pub use parser::Lr1Parser;
pub use table::{
    reset_table_metrics, table_metrics_snapshot, Action, Lr1Table, Lr1TableBuilder, Production,
    TableMetricsSnapshot,
};
