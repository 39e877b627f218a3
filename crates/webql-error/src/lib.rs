//! Error taxonomy for the WebQL compilation pipeline.
//!
//! Every stage of the pipeline fails closed: a stage either returns its full
//! result or one of the error types below, never a partial tree. The types
//! here are values only - the pipeline performs no logging and no retries;
//! surfacing, masking, and logging decisions belong to the outermost caller.

use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Source positions
// ---------------------------------------------------------------------------

/// Position of a lexical element in the original source text.
///
/// `offset` is a byte offset; `line` and `col` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    /// Byte offset from the start of the input.
    pub offset: usize,
    /// Line number (1-based).
    pub line: u32,
    /// Column number (1-based).
    pub col: u32,
}

impl SourcePosition {
    /// Position of the first character of an input.
    pub const START: Self = Self {
        offset: 0,
        line: 1,
        col: 1,
    };

    /// Create a position.
    #[must_use]
    pub const fn new(offset: usize, line: u32, col: u32) -> Self {
        Self { offset, line, col }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {} (offset {})", self.line, self.col, self.offset)
    }
}

// ---------------------------------------------------------------------------
// Lexical errors
// ---------------------------------------------------------------------------

/// Tokenization failure. Aborts the whole tokenize call; no recovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexicalError {
    /// A character that no tokenizer state accepts.
    #[error("unrecognized character '{ch}' at {position}")]
    UnrecognizedCharacter { ch: char, position: SourcePosition },

    /// A string literal whose closing delimiter never appears unescaped.
    #[error("unterminated string literal starting at {position}")]
    UnterminatedString { position: SourcePosition },

    /// An escape sequence the string state does not recognize.
    #[error("invalid escape sequence '\\{ch}' at {position}")]
    InvalidEscape { ch: char, position: SourcePosition },

    /// A number literal that ends in a shape no numeric state accepts.
    #[error("malformed number literal '{text}' at {position}")]
    MalformedNumber {
        text: String,
        position: SourcePosition,
    },
}

impl LexicalError {
    /// The offending position, for user display.
    #[must_use]
    pub const fn position(&self) -> SourcePosition {
        match self {
            Self::UnrecognizedCharacter { position, .. }
            | Self::UnterminatedString { position }
            | Self::InvalidEscape { position, .. }
            | Self::MalformedNumber { position, .. } => *position,
        }
    }
}

// ---------------------------------------------------------------------------
// Grammar errors
// ---------------------------------------------------------------------------

/// Malformed GDEF text or an ambiguous grammar, detected before any parsing
/// can occur.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// A line that is not `name ::= pattern`, a comment, or blank.
    #[error("malformed production on line {line}: {detail}")]
    MalformedProduction { line: usize, detail: String },

    /// A quoted terminal literal with no closing quote.
    #[error("unterminated terminal literal on line {line}")]
    UnterminatedTerminal { line: usize },

    /// A repetition/option/group region opened but never closed, or closed
    /// without being open.
    #[error("unbalanced '{delimiter}' region on line {line}")]
    UnbalancedRegion { line: usize, delimiter: char },

    /// An `@kind` marker naming a lexical kind the tokenizer does not produce.
    #[error("unknown kind marker '@{marker}' on line {line}")]
    UnknownKindMarker { line: usize, marker: String },

    /// A non-terminal referenced in a body but defined by no production.
    #[error("non-terminal <{name}> is referenced but never defined")]
    UndefinedNonTerminal { name: String },

    /// GDEF text containing no productions at all.
    #[error("grammar text contains no productions")]
    EmptyGrammar,

    /// A macro symbol survived into a grammar handed to the table builder.
    /// The transformer must run first.
    #[error("production for <{head}> still contains macro symbols; run the transformer first")]
    UntransformedGrammar { head: String },

    /// A `(state, terminal)` cell that would hold both a shift and a reduce.
    #[error("shift/reduce conflict in state {state} on terminal {terminal}")]
    ShiftReduceConflict { state: usize, terminal: String },

    /// A `(state, terminal)` cell that would hold two different reduces.
    #[error("reduce/reduce conflict in state {state} on terminal {terminal}")]
    ReduceReduceConflict { state: usize, terminal: String },
}

// ---------------------------------------------------------------------------
// Syntax errors
// ---------------------------------------------------------------------------

/// Parse failure: the action table has no entry for the current
/// `(state, lookahead)` pair, or a reduced CST node has a shape its named
/// production cannot have.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    /// No table action for the lookahead token in the current state.
    #[error("unexpected token '{token}' at {position} (parser state {state})")]
    UnexpectedToken {
        token: String,
        state: usize,
        position: SourcePosition,
    },

    /// Input ended while the parser still expected more.
    #[error("unexpected end of input at {position} (parser state {state})")]
    UnexpectedEndOfInput {
        state: usize,
        position: SourcePosition,
    },

    /// A significant CST node had the wrong child count or child kinds for
    /// its named production. Raised by the AST builder.
    #[error("node '{production}' has an unexpected shape: {detail}")]
    UnexpectedShape { production: String, detail: String },
}

// ---------------------------------------------------------------------------
// Semantic errors
// ---------------------------------------------------------------------------

/// Semantic analysis failure. `path` is a JSON-pointer-like locator into the
/// query document (e.g. `$.age.$greater`) for user display.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    /// A reference that resolves neither in the symbol table chain nor as a
    /// member of any enclosing element type.
    #[error("identifier not declared: '{name}' at {path}")]
    IdentifierNotDeclared { name: String, path: String },

    /// A member access naming no member of the base type.
    #[error("type '{on}' has no member '{member}' at {path}")]
    UnknownMember {
        member: String,
        on: String,
        path: String,
    },

    /// A member access matching more than one member case-insensitively.
    #[error("member '{member}' is ambiguous on type '{on}' at {path}")]
    AmbiguousMember {
        member: String,
        on: String,
        path: String,
    },

    /// Operand type incompatible with the operator's category rule.
    #[error("type mismatch at {path}: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: String,
        actual: String,
        path: String,
    },

    /// A collection operator applied to a non-queryable source.
    #[error("operator '{operator}' requires a queryable source, found {actual} at {path}")]
    NotQueryable {
        operator: String,
        actual: String,
        path: String,
    },

    /// An operator given the wrong number of operands.
    #[error("operator '{operator}' expects {expected} operand(s), found {actual} at {path}")]
    OperandCount {
        operator: String,
        expected: usize,
        actual: usize,
        path: String,
    },

    /// A node was resolved twice in one compilation. This is a traversal
    /// bug in the analyzer itself, surfaced loudly instead of overwritten.
    #[error("internal consistency: node at {path} was resolved twice")]
    AlreadyResolved { path: String },
}

impl SemanticError {
    /// The JSON-pointer-like path of the offending node.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::IdentifierNotDeclared { path, .. }
            | Self::UnknownMember { path, .. }
            | Self::AmbiguousMember { path, .. }
            | Self::TypeMismatch { path, .. }
            | Self::NotQueryable { path, .. }
            | Self::OperandCount { path, .. }
            | Self::AlreadyResolved { path } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// Translation errors
// ---------------------------------------------------------------------------

/// Expression synthesis failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// The provider supplies no implementation for the requested
    /// element-wise operation on the given queryable flavor.
    #[error("no provider mapping for '{operation}' on a {flavor} source of {element}")]
    MissingProviderMapping {
        operation: String,
        flavor: String,
        element: String,
    },

    /// A node the semantic pass resolved is missing from the context.
    #[error("missing semantic resolution for node at {path}")]
    MissingSymbol { path: String },

    /// A binding destination with no source expression to bind.
    #[error("dangling destination binding at {path}: no source expression")]
    DanglingDestination { path: String },

    /// A literal whose raw text cannot be converted to a backend constant.
    #[error("cannot materialize literal '{raw}' as {ty} at {path}")]
    BadConstant {
        raw: String,
        ty: String,
        path: String,
    },
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Any failure of the compilation pipeline, tagged by stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Lexical(#[from] LexicalError),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Translation(#[from] TranslationError),
}

/// The pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileStage {
    Tokenization,
    GrammarConstruction,
    Parsing,
    SemanticAnalysis,
    Synthesis,
}

impl fmt::Display for CompileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tokenization => "tokenization",
            Self::GrammarConstruction => "grammar construction",
            Self::Parsing => "parsing",
            Self::SemanticAnalysis => "semantic analysis",
            Self::Synthesis => "synthesis",
        };
        f.write_str(name)
    }
}

impl CompileError {
    /// Which stage produced this error.
    #[must_use]
    pub const fn stage(&self) -> CompileStage {
        match self {
            Self::Lexical(_) => CompileStage::Tokenization,
            Self::Grammar(_) => CompileStage::GrammarConstruction,
            Self::Syntax(_) => CompileStage::Parsing,
            Self::Semantic(_) => CompileStage::SemanticAnalysis,
            Self::Translation(_) => CompileStage::Synthesis,
        }
    }

    /// Whether the input text (as opposed to the grammar, the catalog, or
    /// the provider wiring) is at fault.
    #[must_use]
    pub const fn is_input_fault(&self) -> bool {
        matches!(
            self,
            Self::Lexical(_) | Self::Syntax(_) | Self::Semantic(_)
        )
    }
}

/// Result type alias using [`CompileError`].
pub type Result<T, E = CompileError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_error_display() {
        let err = LexicalError::UnrecognizedCharacter {
            ch: '^',
            position: SourcePosition::new(3, 1, 4),
        };
        assert_eq!(
            err.to_string(),
            "unrecognized character '^' at line 1, column 4 (offset 3)"
        );
    }

    #[test]
    fn lexical_error_position() {
        let pos = SourcePosition::new(10, 2, 5);
        assert_eq!(
            LexicalError::UnterminatedString { position: pos }.position(),
            pos
        );
    }

    #[test]
    fn grammar_conflict_display() {
        let err = GrammarError::ShiftReduceConflict {
            state: 7,
            terminal: "\",\"".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "shift/reduce conflict in state 7 on terminal \",\""
        );
    }

    #[test]
    fn syntax_error_display() {
        let err = SyntaxError::UnexpectedToken {
            token: "}".to_owned(),
            state: 4,
            position: SourcePosition::new(12, 1, 13),
        };
        assert_eq!(
            err.to_string(),
            "unexpected token '}' at line 1, column 13 (offset 12) (parser state 4)"
        );
    }

    #[test]
    fn semantic_error_path() {
        let err = SemanticError::TypeMismatch {
            expected: "Int64".to_owned(),
            actual: "String".to_owned(),
            path: "$.age.$greater".to_owned(),
        };
        assert_eq!(err.path(), "$.age.$greater");
        assert_eq!(
            err.to_string(),
            "type mismatch at $.age.$greater: expected Int64, found String"
        );
    }

    #[test]
    fn stage_classification() {
        let err: CompileError = LexicalError::UnterminatedString {
            position: SourcePosition::START,
        }
        .into();
        assert_eq!(err.stage(), CompileStage::Tokenization);
        assert!(err.is_input_fault());

        let err: CompileError = GrammarError::EmptyGrammar.into();
        assert_eq!(err.stage(), CompileStage::GrammarConstruction);
        assert!(!err.is_input_fault());

        let err: CompileError = TranslationError::DanglingDestination {
            path: "$".to_owned(),
        }
        .into();
        assert_eq!(err.stage(), CompileStage::Synthesis);
    }

    #[test]
    fn stage_display() {
        assert_eq!(CompileStage::SemanticAnalysis.to_string(), "semantic analysis");
    }
}
