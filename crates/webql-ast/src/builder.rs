//! CST → AST construction.
//!
//! Maps each significant CST node to exactly one AST variant by name-based
//! dispatch and desugars the WebQL document surface:
//!
//! - an object is a block of member expressions (combined as logical AND by
//!   the consumer);
//! - a plain field key with a scalar value is an implicit equals; an array
//!   value is an OR of equals over its elements; an object value nests
//!   predicates over the field (plain keys inside chain into scope access);
//! - a `$`-prefixed key is an operation; comparison and arithmetic keys
//!   apply to the enclosing field, collection keys to the enclosing field
//!   or, at the top level, to the reserved source binding.
//!
//! Any node whose shape does not fit its named production fails fast with a
//! structural [`SyntaxError`]; no partial tree is returned.

use webql_error::SyntaxError;
use webql_lexer::{decode_string, TokenKind};
use webql_lr::CstNode;

use crate::{
    BlockExpression, LiteralExpression, LiteralKind, NodeId, NodePaths, OperationExpression,
    ReferenceExpression, ScopeAccessExpression, WebqlExpression, WebqlOperator, WebqlQuery,
    SOURCE_BINDING,
};

/// Builds a [`WebqlQuery`] and its [`NodePaths`] index from a reduced CST.
#[derive(Debug, Default)]
pub struct AstBuilder {
    next: u32,
    paths: NodePaths,
}

impl AstBuilder {
    /// Build the AST. The CST must be reduced with the WebQL significant
    /// names (`object`, `pair`, `array`, `scalar`).
    pub fn build(cst: &CstNode) -> Result<(WebqlQuery, NodePaths), SyntaxError> {
        let mut builder = Self::default();

        let children = cst.children();
        let [document] = children else {
            return Err(shape("root", "expected exactly one document object"));
        };
        if document.name() != Some("object") {
            return Err(shape("root", "document must be an object"));
        }

        let expressions = builder.object_members(document, "$", &[])?;
        let id = builder.fresh("$");
        let root = WebqlExpression::Block(BlockExpression { id, expressions });
        Ok((WebqlQuery { root }, builder.paths))
    }

    fn fresh(&mut self, path: &str) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        self.paths.insert(id, path);
        id
    }

    /// Build one expression per member pair of an object node.
    fn object_members(
        &mut self,
        object: &CstNode,
        path: &str,
        subject: &[String],
    ) -> Result<Vec<WebqlExpression>, SyntaxError> {
        let mut expressions = Vec::new();
        for child in significant_children(object) {
            if child.name() != Some("pair") {
                return Err(shape("object", "members must be pairs"));
            }
            expressions.push(self.member(child, path, subject)?);
        }
        Ok(expressions)
    }

    /// An object value in expression position: one member stays bare, more
    /// become a block.
    fn object_expression(
        &mut self,
        object: &CstNode,
        path: &str,
        subject: &[String],
    ) -> Result<WebqlExpression, SyntaxError> {
        let mut expressions = self.object_members(object, path, subject)?;
        if expressions.is_empty() {
            return Err(shape("object", "predicate object has no members"));
        }
        if expressions.len() == 1 {
            return Ok(expressions.remove(0));
        }
        let id = self.fresh(path);
        Ok(WebqlExpression::Block(BlockExpression { id, expressions }))
    }

    fn member(
        &mut self,
        pair: &CstNode,
        base_path: &str,
        subject: &[String],
    ) -> Result<WebqlExpression, SyntaxError> {
        let children = significant_children(pair);
        let [key_node, value] = children.as_slice() else {
            return Err(shape("pair", "expected a key and a value"));
        };
        let key = key_node
            .token()
            .filter(|t| t.kind == TokenKind::StringLiteral)
            .and_then(|t| decode_string(&t.text))
            .ok_or_else(|| shape("pair", "key must be a string literal"))?;

        if key.starts_with('$') {
            self.operator_member(&key, value, base_path, subject)
        } else {
            self.field_member(&key, value, base_path, subject)
        }
    }

    /// A plain field key: implicit equals, or-of-equals, or nested
    /// predicates over the field.
    fn field_member(
        &mut self,
        key: &str,
        value: &CstNode,
        base_path: &str,
        subject: &[String],
    ) -> Result<WebqlExpression, SyntaxError> {
        let path = format!("{base_path}.{key}");
        let mut chain = subject.to_vec();
        chain.push(key.to_owned());

        match value.name() {
            Some("scalar") => {
                let lhs = self.subject_expression(&chain, &path);
                let rhs = self.literal(value, &path)?;
                Ok(self.operation(WebqlOperator::Equals, vec![lhs, rhs], &path))
            }
            Some("array") => {
                let elements = significant_children(value);
                if elements.is_empty() {
                    return Err(shape("array", "implicit equals over an empty array"));
                }
                let mut operands = Vec::with_capacity(elements.len());
                for (index, element) in elements.iter().enumerate() {
                    if element.name() != Some("scalar") {
                        return Err(shape("array", "implicit equals elements must be scalars"));
                    }
                    let element_path = format!("{path}[{index}]");
                    let lhs = self.subject_expression(&chain, &element_path);
                    let rhs = self.literal(element, &element_path)?;
                    operands.push(self.operation(
                        WebqlOperator::Equals,
                        vec![lhs, rhs],
                        &element_path,
                    ));
                }
                if operands.len() == 1 {
                    return Ok(operands.remove(0));
                }
                Ok(self.operation(WebqlOperator::Or, operands, &path))
            }
            Some("object") => self.object_expression(value, &path, &chain),
            _ => Err(shape("pair", "unexpected value node")),
        }
    }

    /// A `$`-prefixed operator key.
    fn operator_member(
        &mut self,
        key: &str,
        value: &CstNode,
        base_path: &str,
        subject: &[String],
    ) -> Result<WebqlExpression, SyntaxError> {
        let Some(operator) = WebqlOperator::from_key(key) else {
            return Err(shape("pair", &format!("unknown operator key '{key}'")));
        };
        let path = format!("{base_path}.{key}");

        use WebqlOperator::*;
        match operator {
            And | Or => {
                if value.name() != Some("array") {
                    return Err(shape("pair", &format!("'{key}' expects an array value")));
                }
                let elements = significant_children(value);
                if elements.is_empty() {
                    return Err(shape("array", &format!("'{key}' over an empty array")));
                }
                let mut operands = Vec::with_capacity(elements.len());
                for (index, element) in elements.iter().enumerate() {
                    if element.name() != Some("object") {
                        return Err(shape("array", &format!("'{key}' elements must be objects")));
                    }
                    let element_path = format!("{path}[{index}]");
                    operands.push(self.object_expression(element, &element_path, subject)?);
                }
                Ok(self.operation(operator, operands, &path))
            }
            Not => {
                if value.name() != Some("object") {
                    return Err(shape("pair", "'$not' expects an object value"));
                }
                let operand = self.object_expression(value, &path, subject)?;
                Ok(self.operation(operator, vec![operand], &path))
            }
            Add | Subtract | Multiply | Divide | Equals | NotEquals | Greater
            | GreaterOrEquals | Less | LessOrEquals | Like => {
                if subject.is_empty() {
                    return Err(shape(
                        "pair",
                        &format!("'{key}' requires an enclosing field"),
                    ));
                }
                if value.name() != Some("scalar") {
                    return Err(shape("pair", &format!("'{key}' expects a scalar value")));
                }
                let lhs = self.subject_expression(subject, base_path);
                let rhs = self.literal(value, &path)?;
                Ok(self.operation(operator, vec![lhs, rhs], &path))
            }
            Filter => {
                let source = self.source_expression(subject, base_path);
                if value.name() != Some("object") {
                    return Err(shape("pair", "'$filter' expects an object value"));
                }
                // The predicate runs over the source's elements, so the
                // enclosing field context does not apply inside.
                let predicate = self.object_expression(value, &path, &[])?;
                Ok(self.operation(operator, vec![source, predicate], &path))
            }
            Select | Min | Max | Sum | Average => {
                let source = self.source_expression(subject, base_path);
                let Some(member) = scalar_string(value) else {
                    return Err(shape(
                        "pair",
                        &format!("'{key}' expects a member-name string"),
                    ));
                };
                let id = self.fresh(&path);
                let member = WebqlExpression::Reference(ReferenceExpression {
                    id,
                    identifier: member,
                });
                Ok(self.operation(operator, vec![source, member], &path))
            }
            Limit | Skip | Contains => {
                let source = self.source_expression(subject, base_path);
                if value.name() != Some("scalar") {
                    return Err(shape("pair", &format!("'{key}' expects a scalar value")));
                }
                let argument = self.literal(value, &path)?;
                Ok(self.operation(operator, vec![source, argument], &path))
            }
            Count | Any | All => {
                let source = self.source_expression(subject, base_path);
                match value.name() {
                    Some("object") => {
                        let predicate = self.object_expression(value, &path, &[])?;
                        Ok(self.operation(operator, vec![source, predicate], &path))
                    }
                    Some("scalar") if operator != All => {
                        // A bare marker value (`true`, `null`) means "no
                        // predicate"; `$all` without one is vacuous.
                        Ok(self.operation(operator, vec![source], &path))
                    }
                    _ => Err(shape("pair", &format!("'{key}' expects an object value"))),
                }
            }
        }
    }

    /// The expression a field chain denotes: a reference for one segment,
    /// scope accesses for deeper chains.
    fn subject_expression(&mut self, chain: &[String], path: &str) -> WebqlExpression {
        let id = self.fresh(path);
        let mut expr = WebqlExpression::Reference(ReferenceExpression {
            id,
            identifier: chain[0].clone(),
        });
        for field in &chain[1..] {
            let id = self.fresh(path);
            expr = WebqlExpression::ScopeAccess(ScopeAccessExpression {
                id,
                base: Box::new(expr),
                field: field.clone(),
            });
        }
        expr
    }

    /// The source of a collection operator: the enclosing field, or the
    /// reserved root binding at the top level.
    fn source_expression(&mut self, subject: &[String], base_path: &str) -> WebqlExpression {
        if subject.is_empty() {
            let id = self.fresh(base_path);
            WebqlExpression::Reference(ReferenceExpression {
                id,
                identifier: SOURCE_BINDING.to_owned(),
            })
        } else {
            self.subject_expression(subject, base_path)
        }
    }

    fn operation(
        &mut self,
        operator: WebqlOperator,
        operands: Vec<WebqlExpression>,
        path: &str,
    ) -> WebqlExpression {
        let id = self.fresh(path);
        WebqlExpression::Operation(OperationExpression {
            id,
            operator,
            operands,
        })
    }

    fn literal(&mut self, scalar: &CstNode, path: &str) -> Result<WebqlExpression, SyntaxError> {
        let children = significant_children(scalar);
        let [leaf] = children.as_slice() else {
            return Err(shape("scalar", "expected exactly one literal token"));
        };
        let token = leaf
            .token()
            .ok_or_else(|| shape("scalar", "expected a literal token"))?;
        let kind = match token.kind {
            TokenKind::StringLiteral => LiteralKind::String,
            TokenKind::IntegerLiteral => LiteralKind::Integer,
            TokenKind::FloatLiteral => LiteralKind::Float,
            TokenKind::BooleanLiteral => LiteralKind::Boolean,
            TokenKind::NullLiteral => LiteralKind::Null,
            other => {
                return Err(shape(
                    "scalar",
                    &format!("token kind '{other}' is not a literal"),
                ));
            }
        };
        let id = self.fresh(path);
        Ok(WebqlExpression::Literal(LiteralExpression {
            id,
            kind,
            raw: token.text.clone(),
        }))
    }
}

/// Children that carry content: everything except punctuation leaves.
fn significant_children(node: &CstNode) -> Vec<&CstNode> {
    node.children()
        .iter()
        .filter(|child| {
            child
                .token()
                .is_none_or(|t| t.kind != TokenKind::Punctuation)
        })
        .collect()
}

/// The string value of a scalar node, if it holds a string literal.
fn scalar_string(node: &CstNode) -> Option<String> {
    if node.name() != Some("scalar") {
        return None;
    }
    let children = significant_children(node);
    let [leaf] = children.as_slice() else {
        return None;
    };
    leaf.token()
        .filter(|t| t.kind == TokenKind::StringLiteral)
        .and_then(|t| decode_string(&t.text))
}

fn shape(production: &str, detail: &str) -> SyntaxError {
    SyntaxError::UnexpectedShape {
        production: production.to_owned(),
        detail: detail.to_owned(),
    }
}
