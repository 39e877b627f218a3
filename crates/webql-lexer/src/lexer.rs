//! The finite-state tokenizer.
//!
//! An explicit state machine keyed by the class of the current character.
//! Each state, given the next character (or end of input), either keeps
//! reading, emits a token and returns to the initial state, skips
//! (whitespace), or fails the whole tokenize call. There is no recovery:
//! the first lexical fault aborts tokenization with a [`LexicalError`]
//! carrying the offending position.

use std::collections::HashSet;

use memchr::memchr2;
use webql_error::{LexicalError, SourcePosition};

use crate::token::{Token, TokenKind};

/// Tokenizer states, one per character-class family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Initial,
    IntegerNumber,
    FloatNumber,
    IdentifierOrKeyword,
    StringLiteral,
    Operator,
    Punctuation,
}

/// Tokenizer configuration.
///
/// The keyword set is consulted only at the token-completion boundary;
/// `true`, `false`, and `null` always map to their dedicated literal kinds
/// regardless of the set's contents.
#[derive(Debug, Clone)]
pub struct TokenizerConfig {
    /// Identifiers that lex as [`TokenKind::Keyword`].
    pub keywords: HashSet<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            keywords: ["true", "false", "null"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// The tokenizer. Cheap to construct; reusable across inputs.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    config: TokenizerConfig,
}

impl Tokenizer {
    /// Create a tokenizer with the given configuration.
    #[must_use]
    pub fn new(config: TokenizerConfig) -> Self {
        Self { config }
    }

    /// Tokenize the entire input eagerly.
    pub fn tokenize(&self, text: &str) -> Result<Vec<Token>, LexicalError> {
        self.tokens(text).collect()
    }

    /// Lazily tokenize the input. The stream is finite and restartable only
    /// by calling this method again from the start of the text.
    #[must_use]
    pub fn tokens<'a>(&'a self, text: &'a str) -> Tokens<'a> {
        Tokens {
            src: text.as_bytes(),
            text,
            keywords: &self.config.keywords,
            pos: 0,
            line: 1,
            col: 1,
            failed: false,
        }
    }
}

/// Lazy token stream over one input text.
pub struct Tokens<'a> {
    src: &'a [u8],
    text: &'a str,
    keywords: &'a HashSet<String>,
    pos: usize,
    line: u32,
    col: u32,
    failed: bool,
}

const PUNCTUATION: &[u8] = b"{}[](),:";
const OPERATOR_CHARS: &[u8] = b"=<>!&|+-*/%.";

fn is_identifier_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_' || ch == b'$'
}

fn is_identifier_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'$'
}

impl<'a> Tokens<'a> {
    fn position(&self) -> SourcePosition {
        SourcePosition::new(self.pos, self.line, self.col)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> u8 {
        let ch = self.src[self.pos];
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    /// The character at the cursor, decoded for error display.
    fn current_char(&self) -> char {
        self.text[self.pos..].chars().next().unwrap_or('\u{FFFD}')
    }

    fn lexeme(&self, start: usize) -> &'a str {
        &self.text[start..self.pos]
    }

    /// Run the state machine until one token is complete.
    fn next_token(&mut self) -> Result<Option<Token>, LexicalError> {
        // Initial state: whitespace is skipped, everything else selects the
        // state for the token that starts here.
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.advance();
        }
        let Some(first) = self.peek() else {
            return Ok(None);
        };

        let start = self.pos;
        let start_position = Self::position(self);

        let mut state = match first {
            b'"' => LexState::StringLiteral,
            b'0'..=b'9' => LexState::IntegerNumber,
            b'-' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => LexState::IntegerNumber,
            c if is_identifier_start(c) => LexState::IdentifierOrKeyword,
            c if PUNCTUATION.contains(&c) => LexState::Punctuation,
            c if OPERATOR_CHARS.contains(&c) => LexState::Operator,
            _ => {
                return Err(LexicalError::UnrecognizedCharacter {
                    ch: self.current_char(),
                    position: start_position,
                });
            }
        };

        let kind = loop {
            match state {
                LexState::Initial => unreachable!("Initial never re-entered mid-token"),

                LexState::Punctuation => {
                    self.advance();
                    break TokenKind::Punctuation;
                }

                LexState::Operator => {
                    self.advance();
                    if !self.peek().is_some_and(|c| OPERATOR_CHARS.contains(&c)) {
                        break TokenKind::Operator;
                    }
                }

                LexState::IdentifierOrKeyword => {
                    self.advance();
                    if !self.peek().is_some_and(is_identifier_continue) {
                        // Keyword/identifier disambiguation happens only
                        // here, at the completion boundary.
                        break match self.lexeme(start) {
                            "true" | "false" => TokenKind::BooleanLiteral,
                            "null" => TokenKind::NullLiteral,
                            word if self.keywords.contains(word) => TokenKind::Keyword,
                            _ => TokenKind::Identifier,
                        };
                    }
                }

                LexState::IntegerNumber => {
                    self.advance();
                    match self.peek() {
                        Some(c) if c.is_ascii_digit() => {}
                        Some(b'.') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                            self.advance();
                            state = LexState::FloatNumber;
                        }
                        Some(b'e' | b'E') => {
                            self.lex_exponent(start, start_position)?;
                            break TokenKind::FloatLiteral;
                        }
                        _ => break TokenKind::IntegerLiteral,
                    }
                }

                LexState::FloatNumber => {
                    self.advance();
                    match self.peek() {
                        Some(c) if c.is_ascii_digit() => {}
                        Some(b'e' | b'E') => {
                            self.lex_exponent(start, start_position)?;
                            break TokenKind::FloatLiteral;
                        }
                        _ => break TokenKind::FloatLiteral,
                    }
                }

                LexState::StringLiteral => {
                    self.lex_string(start_position)?;
                    break TokenKind::StringLiteral;
                }
            }
        };

        Ok(Some(Token::new(kind, self.lexeme(start), start_position)))
    }

    /// Consume `e`/`E`, an optional sign, and at least one digit.
    fn lex_exponent(
        &mut self,
        start: usize,
        start_position: SourcePosition,
    ) -> Result<(), LexicalError> {
        self.advance(); // e / E
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.advance();
        }
        if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
            return Err(LexicalError::MalformedNumber {
                text: self.lexeme(start).to_owned(),
                position: start_position,
            });
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        Ok(())
    }

    /// Consume a string literal body, validating escapes. The closing
    /// delimiter must be unescaped.
    fn lex_string(&mut self, start_position: SourcePosition) -> Result<(), LexicalError> {
        self.advance(); // opening quote
        loop {
            // Jump to the next delimiter or escape in one scan.
            let Some(offset) = memchr2(b'"', b'\\', &self.src[self.pos..]) else {
                return Err(LexicalError::UnterminatedString {
                    position: start_position,
                });
            };
            for _ in 0..offset {
                self.advance();
            }
            if self.advance() == b'"' {
                return Ok(());
            }
            // Escape state: the next character decides validity.
            let escape_position = Self::position(self);
            match self.peek() {
                Some(b'"' | b'\\' | b'/' | b'n' | b'r' | b't' | b'b' | b'f') => {
                    self.advance();
                }
                Some(b'u') => {
                    self.advance();
                    for _ in 0..4 {
                        if !self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                            return Err(LexicalError::InvalidEscape {
                                ch: 'u',
                                position: escape_position,
                            });
                        }
                        self.advance();
                    }
                }
                Some(_) => {
                    return Err(LexicalError::InvalidEscape {
                        ch: self.current_char(),
                        position: escape_position,
                    });
                }
                None => {
                    return Err(LexicalError::UnterminatedString {
                        position: start_position,
                    });
                }
            }
        }
    }
}

impl Iterator for Tokens<'_> {
    type Item = Result<Token, LexicalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
