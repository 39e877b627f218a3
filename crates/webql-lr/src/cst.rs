//! Concrete syntax tree nodes and the whitelist-driven reducer.

use std::collections::HashSet;
use std::fmt;

use webql_lexer::Token;

/// A concrete syntax tree node, built bottom-up by the parser and immutable
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CstNode {
    /// The accepted sentence.
    Root(Vec<CstNode>),
    /// A reduced non-terminal with its recognized children.
    Internal(String, Vec<CstNode>),
    /// A shifted token.
    Leaf(Token),
}

impl CstNode {
    /// The production name, for internal nodes.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Internal(name, _) => Some(name),
            Self::Root(_) | Self::Leaf(_) => None,
        }
    }

    /// Child nodes (empty for leaves).
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Root(children) | Self::Internal(_, children) => children,
            Self::Leaf(_) => &[],
        }
    }

    /// The token, for leaves.
    #[must_use]
    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::Leaf(token) => Some(token),
            Self::Root(_) | Self::Internal(_, _) => None,
        }
    }
}

impl fmt::Display for CstNode {
    /// Compact s-expression rendering, used in tests and diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(token) => f.write_str(&token.text),
            Self::Internal(name, children) => {
                write!(f, "({name}")?;
                for child in children {
                    write!(f, " {child}")?;
                }
                f.write_str(")")
            }
            Self::Root(children) => {
                f.write_str("(root")?;
                for child in children {
                    write!(f, " {child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Strip pure grammatical scaffolding from a CST.
///
/// Internal nodes whose name is not in `significant` are replaced by the
/// flattened sequence of their (already reduced) children; whitelisted
/// nodes stay but have their children reduced in place. The root itself is
/// collapsed while it has exactly one non-significant internal child.
#[must_use]
pub fn reduce(root: CstNode, significant: &HashSet<String>) -> CstNode {
    let children = match root {
        CstNode::Root(children) => children,
        other => vec![other],
    };
    let mut reduced: Vec<CstNode> = children
        .into_iter()
        .flat_map(|child| reduce_node(child, significant))
        .collect();

    // Collapse trivial single-child layers at the top.
    while reduced.len() == 1 {
        match reduced.pop() {
            Some(CstNode::Internal(name, inner)) if !significant.contains(&name) => {
                reduced = inner;
            }
            Some(node) => {
                reduced.push(node);
                break;
            }
            None => break,
        }
    }

    CstNode::Root(reduced)
}

fn reduce_node(node: CstNode, significant: &HashSet<String>) -> Vec<CstNode> {
    match node {
        CstNode::Leaf(_) => vec![node],
        CstNode::Root(children) => children
            .into_iter()
            .flat_map(|child| reduce_node(child, significant))
            .collect(),
        CstNode::Internal(name, children) => {
            let reduced: Vec<CstNode> = children
                .into_iter()
                .flat_map(|child| reduce_node(child, significant))
                .collect();
            if significant.contains(&name) {
                vec![CstNode::Internal(name, reduced)]
            } else {
                reduced
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webql_error::SourcePosition;
    use webql_lexer::TokenKind;

    fn leaf(text: &str) -> CstNode {
        CstNode::Leaf(Token::new(
            TokenKind::Punctuation,
            text,
            SourcePosition::START,
        ))
    }

    fn internal(name: &str, children: Vec<CstNode>) -> CstNode {
        CstNode::Internal(name.to_owned(), children)
    }

    fn names(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn splices_non_significant_nodes() {
        let tree = CstNode::Root(vec![internal(
            "object",
            vec![
                leaf("{"),
                internal(
                    "members",
                    vec![internal("pair", vec![leaf("\"a\""), leaf(":"), leaf("1")])],
                ),
                leaf("}"),
            ],
        )]);
        let reduced = reduce(tree, &names(&["object", "pair"]));
        // `members` vanishes; its `pair` child is spliced into `object`.
        assert_eq!(
            reduced.to_string(),
            "(root (object { (pair \"a\" : 1) }))"
        );
    }

    #[test]
    fn keeps_significant_children_reduced_in_place() {
        let tree = CstNode::Root(vec![internal(
            "a",
            vec![internal("b", vec![internal("c", vec![leaf("x")])])],
        )]);
        let reduced = reduce(tree, &names(&["a", "c"]));
        assert_eq!(reduced.to_string(), "(root (a (c x)))");
    }

    #[test]
    fn collapses_single_child_root_layers() {
        let tree = CstNode::Root(vec![internal(
            "wrapper",
            vec![internal("inner", vec![internal("object", vec![leaf("{")])])],
        )]);
        let reduced = reduce(tree, &names(&["object"]));
        assert_eq!(reduced.to_string(), "(root (object {))");
        assert_eq!(reduced.children().len(), 1);
        assert_eq!(reduced.children()[0].name(), Some("object"));
    }

    #[test]
    fn root_with_significant_single_child_stays() {
        let tree = CstNode::Root(vec![internal("object", vec![leaf("{"), leaf("}")])]);
        let reduced = reduce(tree, &names(&["object"]));
        assert_eq!(reduced.children().len(), 1);
        assert_eq!(reduced.children()[0].name(), Some("object"));
    }
}
