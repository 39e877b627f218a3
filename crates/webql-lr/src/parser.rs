//! The LR(1) parser engine.
//!
//! A shift-reduce stack machine driven entirely by a prebuilt [`Lr1Table`].
//! The engine owns no grammar knowledge of its own: a missing table entry is
//! a [`SyntaxError`] carrying the parser state and the offending token's
//! position, never a silent skip.

use tracing::trace;
use webql_error::{SourcePosition, SyntaxError};
use webql_lexer::Token;

use crate::cst::CstNode;
use crate::table::{Action, Lr1Table};

/// The parser engine. Stateless; all per-parse state lives on the stack
/// inside [`parse`](Self::parse), so one table can serve concurrent parses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lr1Parser;

impl Lr1Parser {
    /// Parse a token stream into a CST.
    pub fn parse(table: &Lr1Table, tokens: &[Token]) -> Result<CstNode, SyntaxError> {
        let mut states: Vec<usize> = vec![0];
        let mut nodes: Vec<CstNode> = Vec::new();
        let mut cursor = 0usize;

        loop {
            let state = states.last().copied().unwrap_or(0);
            let lookahead = tokens.get(cursor);

            let Some(action) = table.action_for(state, lookahead) else {
                return Err(match lookahead {
                    Some(token) => SyntaxError::UnexpectedToken {
                        token: token.text.clone(),
                        state,
                        position: token.position,
                    },
                    None => SyntaxError::UnexpectedEndOfInput {
                        state,
                        position: end_position(tokens),
                    },
                });
            };

            match action {
                Action::Shift(next) => {
                    let token = lookahead.cloned().unwrap_or_else(|| {
                        unreachable!("shift actions are only keyed by real terminals")
                    });
                    trace!(target: "webql.parse", state, next, token = %token.text, "shift");
                    nodes.push(CstNode::Leaf(token));
                    states.push(next);
                    cursor += 1;
                }
                Action::Reduce(index) => {
                    let production = table.production(index);
                    let arity = production.body.len();
                    let children = nodes.split_off(nodes.len() - arity);
                    states.truncate(states.len() - arity);
                    let base = states.last().copied().unwrap_or(0);
                    let Some(target) = table.goto(base, &production.head) else {
                        // The builder emits a goto for every reduce it
                        // emits; a miss would be a table-construction bug.
                        unreachable!("missing goto for <{}> from state {base}", production.head);
                    };
                    trace!(
                        target: "webql.parse",
                        state,
                        head = %production.head,
                        arity,
                        target,
                        "reduce"
                    );
                    nodes.push(CstNode::Internal(production.head.clone(), children));
                    states.push(target);
                }
                Action::Accept => {
                    trace!(target: "webql.parse", tokens = tokens.len(), "accept");
                    return Ok(CstNode::Root(nodes));
                }
            }
        }
    }
}

/// Position just past the last token, for end-of-input errors.
fn end_position(tokens: &[Token]) -> SourcePosition {
    tokens.last().map_or(SourcePosition::START, |token| {
        let len = token.text.len();
        SourcePosition::new(
            token.position.offset + len,
            token.position.line,
            token.position.col + len as u32,
        )
    })
}
