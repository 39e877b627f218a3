//! Grammar symbols.
//!
//! A finalized LR(1) grammar contains only terminals, non-terminals, and
//! (at most, on the start symbol) an explicit epsilon. The macro variants -
//! option, repetition, grouping - exist so the GDEF reader can represent
//! patterns structurally; the transformer expands them into plain
//! alternatives before table construction.

use webql_lexer::TokenKind;

/// How a terminal symbol matches an input token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TerminalMatch {
    /// Match by exact lexeme, e.g. `"{"`.
    Literal(String),
    /// Match by lexical kind, written `@kind` in GDEF (the
    /// compiler-generation marker).
    Kind(TokenKind),
    /// The virtual end-of-input terminal. Never written in GDEF; used as
    /// the accept lookahead.
    EndOfInput,
}

/// A sequence of symbols forming one alternative of a pattern.
pub type Sentence = Vec<Symbol>;

/// One symbol in a production body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    /// A terminal.
    Terminal(TerminalMatch),
    /// A reference to a non-terminal by name.
    NonTerminal(String),
    /// The empty string.
    Epsilon,
    /// `[ a | b ]` - zero or one occurrence of one alternative.
    Optional(Vec<Sentence>),
    /// `{ a | b }` - zero or more occurrences, each picking an alternative.
    Repetition(Vec<Sentence>),
    /// `( a | b )` - exactly one of the alternatives, grouped so
    /// alternation does not split the enclosing pattern.
    Group(Vec<Sentence>),
}

impl Symbol {
    /// Shorthand for a literal-matching terminal.
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Terminal(TerminalMatch::Literal(text.into()))
    }

    /// Shorthand for a kind-matching terminal.
    #[must_use]
    pub const fn kind(kind: TokenKind) -> Self {
        Self::Terminal(TerminalMatch::Kind(kind))
    }

    /// Shorthand for a non-terminal reference.
    #[must_use]
    pub fn nonterminal(name: impl Into<String>) -> Self {
        Self::NonTerminal(name.into())
    }

    /// Whether this is one of the macro variants the transformer must
    /// expand before table construction.
    #[must_use]
    pub const fn is_macro(&self) -> bool {
        matches!(
            self,
            Self::Optional(_) | Self::Repetition(_) | Self::Group(_)
        )
    }
}
