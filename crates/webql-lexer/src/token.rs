//! Token types produced by the tokenizer.
//!
//! A [`Token`] carries its lexical kind, the exact source lexeme, and the
//! position it started at. Tokens are produced once and never mutated;
//! concatenating the lexemes of a token stream (plus the whitespace the
//! tokenizer skipped) reconstructs the original source text.

use std::fmt;

use serde::{Deserialize, Serialize};
use webql_error::SourcePosition;

/// A single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The lexical kind.
    pub kind: TokenKind,
    /// The exact lexeme as it appeared in the source, delimiters included.
    pub text: String,
    /// Position of the first character.
    pub position: SourcePosition,
}

impl Token {
    /// Create a token.
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    /// Whether this token has the given kind.
    #[must_use]
    pub fn is_kind(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Token discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Unquoted name: `age`, `_tmp`, `$filter`.
    Identifier,
    /// An identifier that matched the configured keyword set.
    Keyword,
    /// Double-quoted string literal; `text` keeps the quotes and escapes.
    StringLiteral,
    /// Integer literal, optionally sign-prefixed: `42`, `-7`.
    IntegerLiteral,
    /// Float literal: `3.14`, `1e10`, `-2.5e-3`.
    FloatLiteral,
    /// `true` or `false`.
    BooleanLiteral,
    /// `null`.
    NullLiteral,
    /// Single structural character: `{` `}` `[` `]` `(` `)` `,` `:`.
    Punctuation,
    /// Maximal run of operator characters: `=` `<=` `&&` ….
    Operator,
}

impl TokenKind {
    /// Resolve a GDEF `@kind` compiler-generation marker to a token kind.
    ///
    /// Returns `None` for names the tokenizer does not produce.
    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "identifier" => Some(Self::Identifier),
            "keyword" => Some(Self::Keyword),
            "string" => Some(Self::StringLiteral),
            "integer" => Some(Self::IntegerLiteral),
            "float" => Some(Self::FloatLiteral),
            "boolean" => Some(Self::BooleanLiteral),
            "null" => Some(Self::NullLiteral),
            "punctuation" => Some(Self::Punctuation),
            "operator" => Some(Self::Operator),
            _ => None,
        }
    }

    /// The marker name for this kind, the inverse of
    /// [`from_marker`](Self::from_marker).
    #[must_use]
    pub const fn marker(&self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Keyword => "keyword",
            Self::StringLiteral => "string",
            Self::IntegerLiteral => "integer",
            Self::FloatLiteral => "float",
            Self::BooleanLiteral => "boolean",
            Self::NullLiteral => "null",
            Self::Punctuation => "punctuation",
            Self::Operator => "operator",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Decode the body of a string-literal lexeme (quotes and escapes included)
/// into its textual value.
///
/// Returns `None` if the lexeme is not a well-formed string literal. The
/// tokenizer validates escapes, so `None` here indicates a caller handing in
/// a non-string lexeme.
#[must_use]
pub fn decode_string(raw: &str) -> Option<String> {
    let body = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '/' => out.push('/'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'u' => {
                let mut code = 0u32;
                for _ in 0..4 {
                    code = code * 16 + chars.next()?.to_digit(16)?;
                }
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}
