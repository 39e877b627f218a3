//! Backend expression trees.
//!
//! The synthesizer lowers a validated query into this backend-neutral
//! representation. A consumer (an in-memory evaluator, a document-store
//! translator, an ORM adapter) walks the tree; the provider operations
//! embedded in [`BackendExpression::ProviderCall`] nodes tell it which
//! element-wise method to invoke for the source's queryable flavor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderOperation;

/// A materialized literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "\"{v}\""),
        }
    }
}

/// Unary backend operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
}

/// Binary backend operators. The semantic pass fixed the operand types, so
/// a single operator per symbol suffices - numeric add and string equality
/// never collide here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    And,
    Or,
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Case-insensitive substring match, the lowering of `$like`.
    ContainsIgnoreCase,
}

impl BinaryOperator {
    /// Display form; symbolic where conventional.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::ContainsIgnoreCase => "contains_ci",
        }
    }
}

/// A backend predicate/projection expression.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendExpression {
    /// The root queryable source.
    Source,
    /// A literal constant.
    Constant(ConstantValue),
    /// A lambda parameter by name.
    Parameter(String),
    /// Member access on a base expression.
    Member {
        base: Box<BackendExpression>,
        name: String,
    },
    /// A unary operation.
    Unary {
        op: UnaryOperator,
        operand: Box<BackendExpression>,
    },
    /// A binary operation.
    Binary {
        op: BinaryOperator,
        left: Box<BackendExpression>,
        right: Box<BackendExpression>,
    },
    /// An element-binding lambda.
    Lambda {
        parameter: String,
        body: Box<BackendExpression>,
    },
    /// An element-wise operation dispatched through the provider.
    ProviderCall {
        operation: ProviderOperation,
        source: Box<BackendExpression>,
        arguments: Vec<BackendExpression>,
    },
}

impl BackendExpression {
    /// Shorthand for a binary node.
    #[must_use]
    pub fn binary(op: BinaryOperator, left: Self, right: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Shorthand for a member access.
    #[must_use]
    pub fn member(base: Self, name: impl Into<String>) -> Self {
        Self::Member {
            base: Box::new(base),
            name: name.into(),
        }
    }
}

impl fmt::Display for BackendExpression {
    /// Render in a lambda-like notation: `source.filter(it => (it.age > 18))`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Constant(value) => write!(f, "{value}"),
            Self::Parameter(name) => f.write_str(name),
            Self::Member { base, name } => write!(f, "{base}.{name}"),
            Self::Unary {
                op: UnaryOperator::Not,
                operand,
            } => write!(f, "!({operand})"),
            Self::Binary { op, left, right } => match op {
                BinaryOperator::ContainsIgnoreCase => {
                    write!(f, "contains_ci({left}, {right})")
                }
                _ => write!(f, "({left} {} {right})", op.symbol()),
            },
            Self::Lambda { parameter, body } => write!(f, "{parameter} => {body}"),
            Self::ProviderCall {
                operation,
                source,
                arguments,
            } => {
                write!(f, "{source}.{}(", operation.name)?;
                for (index, argument) in arguments.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderOperation;
    use webql_types::QueryableFlavor;

    #[test]
    fn display_reads_like_a_lambda() {
        let predicate = BackendExpression::binary(
            BinaryOperator::Greater,
            BackendExpression::member(BackendExpression::Parameter("it".to_owned()), "age"),
            BackendExpression::Constant(ConstantValue::Integer(18)),
        );
        let call = BackendExpression::ProviderCall {
            operation: ProviderOperation {
                name: "filter".to_owned(),
                flavor: QueryableFlavor::Sync,
            },
            source: Box::new(BackendExpression::Source),
            arguments: vec![BackendExpression::Lambda {
                parameter: "it".to_owned(),
                body: Box::new(predicate),
            }],
        };
        assert_eq!(call.to_string(), "source.filter(it => (it.age > 18))");
    }

    #[test]
    fn display_contains_ci() {
        let expr = BackendExpression::binary(
            BinaryOperator::ContainsIgnoreCase,
            BackendExpression::member(BackendExpression::Parameter("it".to_owned()), "name"),
            BackendExpression::Constant(ConstantValue::String("john".to_owned())),
        );
        assert_eq!(expr.to_string(), "contains_ci(it.name, \"john\")");
    }

    #[test]
    fn constant_display() {
        assert_eq!(ConstantValue::Null.to_string(), "null");
        assert_eq!(ConstantValue::Boolean(true).to_string(), "true");
        assert_eq!(ConstantValue::Integer(-3).to_string(), "-3");
        assert_eq!(ConstantValue::String("x".to_owned()).to_string(), "\"x\"");
    }
}
