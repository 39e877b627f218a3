//! Finite-state tokenizer for WebQL query documents.
//!
//! Produces a stream of [`Token`]s with position metadata from raw query
//! text. The machine is generic over the query language: keywords are
//! configuration, and the downstream parser matches tokens either by exact
//! lexeme or by [`TokenKind`].

pub mod lexer;
pub mod token;

pub use lexer::{Tokenizer, TokenizerConfig, Tokens};
pub use token::{decode_string, Token, TokenKind};
