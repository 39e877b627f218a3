//! The WebQL query AST.
//!
//! A small, strongly-typed tree of five node variants. Nodes own their
//! children and carry no parent pointers; upward or positional relationships
//! live in the separate [`NodePaths`] index the builder produces alongside
//! the tree. Every node has a builder-assigned [`NodeId`] that later stages
//! use to key per-node semantic results.

pub mod builder;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use builder::AstBuilder;

/// The reserved identifier bound to the root queryable source.
///
/// Collection operators written at the top level of a query document
/// (`{"$limit": 10}`) apply to this binding.
pub const SOURCE_BINDING: &str = "$source";

// ---------------------------------------------------------------------------
// Node identity & paths
// ---------------------------------------------------------------------------

/// Identity of one AST node within one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Derived index: node id → JSON-pointer-like path into the query document
/// (`$.age.$greater`). Built once by the AST builder; read by the semantic
/// analyzer and synthesizer for error display.
#[derive(Debug, Clone, Default)]
pub struct NodePaths {
    paths: HashMap<NodeId, String>,
}

impl NodePaths {
    /// Record the path for a node.
    pub fn insert(&mut self, id: NodeId, path: impl Into<String>) {
        self.paths.insert(id, path.into());
    }

    /// The path for a node; `$` if the node was never recorded.
    #[must_use]
    pub fn get(&self, id: NodeId) -> &str {
        self.paths.get(&id).map_or("$", String::as_str)
    }

    /// Number of recorded paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Operator categories, each with its own typing rule in the semantic
/// analyzer. Member access and type coercion (the `Semantic` category)
/// surface as [`ScopeAccessExpression`] nodes rather than operator keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorCategory {
    Arithmetic,
    Relational,
    StringRelational,
    Logical,
    Semantic,
    CollectionManipulation,
    CollectionAggregation,
}

impl fmt::Display for OperatorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Arithmetic => "arithmetic",
            Self::Relational => "relational",
            Self::StringRelational => "string-relational",
            Self::Logical => "logical",
            Self::Semantic => "semantic",
            Self::CollectionManipulation => "collection-manipulation",
            Self::CollectionAggregation => "collection-aggregation",
        };
        f.write_str(name)
    }
}

/// A WebQL operator, parsed from a `$`-prefixed document key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebqlOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    // Relational
    Equals,
    NotEquals,
    Greater,
    GreaterOrEquals,
    Less,
    LessOrEquals,
    // String-relational
    Like,
    // Logical
    And,
    Or,
    Not,
    // Collection manipulation
    Filter,
    Select,
    Limit,
    Skip,
    Contains,
    // Collection aggregation
    Count,
    Any,
    All,
    Min,
    Max,
    Sum,
    Average,
}

impl WebqlOperator {
    /// Parse a document operator key (`$greater` → `Greater`).
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "$add" => Self::Add,
            "$subtract" => Self::Subtract,
            "$multiply" => Self::Multiply,
            "$divide" => Self::Divide,
            "$equals" => Self::Equals,
            "$notEquals" => Self::NotEquals,
            "$greater" => Self::Greater,
            "$greaterOrEquals" => Self::GreaterOrEquals,
            "$less" => Self::Less,
            "$lessOrEquals" => Self::LessOrEquals,
            "$like" => Self::Like,
            "$and" => Self::And,
            "$or" => Self::Or,
            "$not" => Self::Not,
            "$filter" => Self::Filter,
            "$select" => Self::Select,
            "$limit" => Self::Limit,
            "$skip" => Self::Skip,
            "$contains" => Self::Contains,
            "$count" => Self::Count,
            "$any" => Self::Any,
            "$all" => Self::All,
            "$min" => Self::Min,
            "$max" => Self::Max,
            "$sum" => Self::Sum,
            "$average" => Self::Average,
            _ => return None,
        })
    }

    /// The document key for this operator.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Add => "$add",
            Self::Subtract => "$subtract",
            Self::Multiply => "$multiply",
            Self::Divide => "$divide",
            Self::Equals => "$equals",
            Self::NotEquals => "$notEquals",
            Self::Greater => "$greater",
            Self::GreaterOrEquals => "$greaterOrEquals",
            Self::Less => "$less",
            Self::LessOrEquals => "$lessOrEquals",
            Self::Like => "$like",
            Self::And => "$and",
            Self::Or => "$or",
            Self::Not => "$not",
            Self::Filter => "$filter",
            Self::Select => "$select",
            Self::Limit => "$limit",
            Self::Skip => "$skip",
            Self::Contains => "$contains",
            Self::Count => "$count",
            Self::Any => "$any",
            Self::All => "$all",
            Self::Min => "$min",
            Self::Max => "$max",
            Self::Sum => "$sum",
            Self::Average => "$average",
        }
    }

    /// Which typing rule governs this operator.
    #[must_use]
    pub const fn category(&self) -> OperatorCategory {
        match self {
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide => {
                OperatorCategory::Arithmetic
            }
            Self::Equals
            | Self::NotEquals
            | Self::Greater
            | Self::GreaterOrEquals
            | Self::Less
            | Self::LessOrEquals => OperatorCategory::Relational,
            Self::Like => OperatorCategory::StringRelational,
            Self::And | Self::Or | Self::Not => OperatorCategory::Logical,
            Self::Filter | Self::Select | Self::Limit | Self::Skip | Self::Contains => {
                OperatorCategory::CollectionManipulation
            }
            Self::Count
            | Self::Any
            | Self::All
            | Self::Min
            | Self::Max
            | Self::Sum
            | Self::Average => OperatorCategory::CollectionAggregation,
        }
    }
}

impl fmt::Display for WebqlOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Expression nodes
// ---------------------------------------------------------------------------

/// Lexical kind of a literal, inferred from the token that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralKind {
    String,
    Integer,
    Float,
    Boolean,
    Null,
}

/// A literal value, kept as its raw lexeme until synthesis materializes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralExpression {
    pub id: NodeId,
    pub kind: LiteralKind,
    /// The raw lexeme, delimiters included for strings.
    pub raw: String,
}

/// A reference to an identifier: a member of the current element, a declared
/// binding, or the reserved [`SOURCE_BINDING`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceExpression {
    pub id: NodeId,
    pub identifier: String,
}

/// Member access on a base expression (`address.city`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeAccessExpression {
    pub id: NodeId,
    pub base: Box<WebqlExpression>,
    pub field: String,
}

/// An ordered sequence of expressions. In predicate position the members
/// combine by logical AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockExpression {
    pub id: NodeId,
    pub expressions: Vec<WebqlExpression>,
}

/// An operator applied to its operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationExpression {
    pub id: NodeId,
    pub operator: WebqlOperator,
    pub operands: Vec<WebqlExpression>,
}

/// A WebQL expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebqlExpression {
    Literal(LiteralExpression),
    Reference(ReferenceExpression),
    ScopeAccess(ScopeAccessExpression),
    Block(BlockExpression),
    Operation(OperationExpression),
}

impl WebqlExpression {
    /// The node's identity.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        match self {
            Self::Literal(e) => e.id,
            Self::Reference(e) => e.id,
            Self::ScopeAccess(e) => e.id,
            Self::Block(e) => e.id,
            Self::Operation(e) => e.id,
        }
    }

    /// Child expressions in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<&Self> {
        match self {
            Self::Literal(_) | Self::Reference(_) => Vec::new(),
            Self::ScopeAccess(e) => vec![&e.base],
            Self::Block(e) => e.expressions.iter().collect(),
            Self::Operation(e) => e.operands.iter().collect(),
        }
    }
}

/// A complete parsed query: a block of top-level member expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebqlQuery {
    pub root: WebqlExpression,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_key_round_trip() {
        for op in [
            WebqlOperator::Equals,
            WebqlOperator::NotEquals,
            WebqlOperator::Greater,
            WebqlOperator::Like,
            WebqlOperator::And,
            WebqlOperator::Filter,
            WebqlOperator::Average,
        ] {
            assert_eq!(WebqlOperator::from_key(op.key()), Some(op));
        }
        assert_eq!(WebqlOperator::from_key("$regex"), None);
        assert_eq!(WebqlOperator::from_key("age"), None);
    }

    #[test]
    fn operator_categories() {
        assert_eq!(
            WebqlOperator::Add.category(),
            OperatorCategory::Arithmetic
        );
        assert_eq!(
            WebqlOperator::Greater.category(),
            OperatorCategory::Relational
        );
        assert_eq!(
            WebqlOperator::Like.category(),
            OperatorCategory::StringRelational
        );
        assert_eq!(WebqlOperator::Not.category(), OperatorCategory::Logical);
        assert_eq!(
            WebqlOperator::Limit.category(),
            OperatorCategory::CollectionManipulation
        );
        assert_eq!(
            WebqlOperator::Sum.category(),
            OperatorCategory::CollectionAggregation
        );
    }

    #[test]
    fn node_paths_default_to_root() {
        let mut paths = NodePaths::default();
        paths.insert(NodeId(1), "$.age");
        assert_eq!(paths.get(NodeId(1)), "$.age");
        assert_eq!(paths.get(NodeId(99)), "$");
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn expression_ids_and_children() {
        let lit = WebqlExpression::Literal(LiteralExpression {
            id: NodeId(2),
            kind: LiteralKind::Integer,
            raw: "18".to_owned(),
        });
        let reference = WebqlExpression::Reference(ReferenceExpression {
            id: NodeId(1),
            identifier: "age".to_owned(),
        });
        let op = WebqlExpression::Operation(OperationExpression {
            id: NodeId(3),
            operator: WebqlOperator::Greater,
            operands: vec![reference, lit],
        });
        assert_eq!(op.id(), NodeId(3));
        assert_eq!(op.children().len(), 2);
    }
}
