//! The GDEF grammar-definition reader.
//!
//! GDEF is a line-oriented EBNF-like format: `name ::= pattern` per
//! production, `#` comment lines, blank lines ignored. Pattern fragments:
//!
//! - `"lit"` - terminal matched by exact lexeme (backslash escapes for
//!   `"` and `\`)
//! - `<name>` or a bare identifier - non-terminal reference
//! - `@kind` - terminal matched by lexical kind (compiler-generation
//!   marker), e.g. `@string`, `@integer`
//! - `|` - alternation
//! - `~` - epsilon
//! - `{ … }` / `[ … ]` / `( … )` - repetition, option, and grouping
//!   regions; alternation inside a region does not split the enclosing
//!   pattern
//!
//! Multiple productions for one head may be written as `|`-joined
//! alternatives or as separate lines with the same head. The head of the
//! first production is the grammar's start symbol.

use webql_error::GrammarError;
use webql_lexer::TokenKind;

use crate::rule::{Grammar, ProductionRule};
use crate::symbol::{Sentence, Symbol};

/// One lexed element of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternFragment {
    Terminal(String),
    NonTerminal(String),
    KindMarker(TokenKind),
    Alternation,
    Epsilon,
    OptionOpen,
    OptionClose,
    RepeatOpen,
    RepeatClose,
    GroupOpen,
    GroupClose,
}

/// Reads GDEF text into a validated [`Grammar`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GrammarReader;

impl GrammarReader {
    /// Parse the grammar text.
    pub fn read(text: &str) -> Result<Grammar, GrammarError> {
        let mut rules: Vec<ProductionRule> = Vec::new();
        let mut start: Option<String> = None;

        for (index, raw_line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((head_part, pattern_part)) = line.split_once("::=") else {
                return Err(GrammarError::MalformedProduction {
                    line: line_no,
                    detail: "expected 'name ::= pattern'".to_owned(),
                });
            };

            let head = parse_head(head_part.trim(), line_no)?;
            let fragments = lex_pattern(pattern_part, line_no)?;
            let mut cursor = 0;
            let alternatives = parse_alternatives(&fragments, &mut cursor, line_no, None)?;

            start.get_or_insert_with(|| head.clone());
            for sentence in alternatives {
                rules.push(ProductionRule::new(head.clone(), sentence));
            }
        }

        let Some(start) = start else {
            return Err(GrammarError::EmptyGrammar);
        };
        Grammar::new(start, rules)
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn parse_head(head: &str, line: usize) -> Result<String, GrammarError> {
    let name = head
        .strip_prefix('<')
        .and_then(|h| h.strip_suffix('>'))
        .unwrap_or(head);
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(GrammarError::MalformedProduction {
            line,
            detail: format!("invalid production head '{head}'"),
        });
    }
    Ok(name.to_owned())
}

/// Lex a pattern into fragments.
fn lex_pattern(pattern: &str, line: usize) -> Result<Vec<PatternFragment>, GrammarError> {
    let mut fragments = Vec::new();
    let mut chars = pattern.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {}
            '|' => fragments.push(PatternFragment::Alternation),
            '~' => fragments.push(PatternFragment::Epsilon),
            '{' => fragments.push(PatternFragment::RepeatOpen),
            '}' => fragments.push(PatternFragment::RepeatClose),
            '[' => fragments.push(PatternFragment::OptionOpen),
            ']' => fragments.push(PatternFragment::OptionClose),
            '(' => fragments.push(PatternFragment::GroupOpen),
            ')' => fragments.push(PatternFragment::GroupClose),
            '"' => {
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(esc @ ('"' | '\\')) => text.push(esc),
                            _ => return Err(GrammarError::UnterminatedTerminal { line }),
                        },
                        Some(c) => text.push(c),
                        None => return Err(GrammarError::UnterminatedTerminal { line }),
                    }
                }
                fragments.push(PatternFragment::Terminal(text));
            }
            '<' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('>') => break,
                        Some(c) if is_name_char(c) => name.push(c),
                        _ => {
                            return Err(GrammarError::MalformedProduction {
                                line,
                                detail: "unterminated non-terminal reference".to_owned(),
                            });
                        }
                    }
                }
                if name.is_empty() {
                    return Err(GrammarError::MalformedProduction {
                        line,
                        detail: "empty non-terminal reference".to_owned(),
                    });
                }
                fragments.push(PatternFragment::NonTerminal(name));
            }
            '@' => {
                let mut marker = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_name_char(c) {
                        break;
                    }
                    marker.push(c);
                    chars.next();
                }
                let Some(kind) = TokenKind::from_marker(&marker) else {
                    return Err(GrammarError::UnknownKindMarker { line, marker });
                };
                fragments.push(PatternFragment::KindMarker(kind));
            }
            c if is_name_char(c) => {
                let mut name = String::from(c);
                while let Some(&c) = chars.peek() {
                    if !is_name_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                fragments.push(PatternFragment::NonTerminal(name));
            }
            other => {
                return Err(GrammarError::MalformedProduction {
                    line,
                    detail: format!("unexpected character '{other}' in pattern"),
                });
            }
        }
    }

    if fragments.is_empty() {
        return Err(GrammarError::MalformedProduction {
            line,
            detail: "empty pattern".to_owned(),
        });
    }
    Ok(fragments)
}

/// The closing fragment that ends a region, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionEnd {
    Option,
    Repeat,
    Group,
}

impl RegionEnd {
    const fn delimiter(self) -> char {
        match self {
            Self::Option => ']',
            Self::Repeat => '}',
            Self::Group => ')',
        }
    }
}

/// Group fragments into alternatives, honoring region nesting.
fn parse_alternatives(
    fragments: &[PatternFragment],
    cursor: &mut usize,
    line: usize,
    until: Option<RegionEnd>,
) -> Result<Vec<Sentence>, GrammarError> {
    let mut alternatives: Vec<Sentence> = Vec::new();
    let mut current: Sentence = Vec::new();

    let mut finish =
        |current: &mut Sentence, alternatives: &mut Vec<Sentence>| -> Result<(), GrammarError> {
            if current.is_empty() {
                return Err(GrammarError::MalformedProduction {
                    line,
                    detail: "empty alternative".to_owned(),
                });
            }
            alternatives.push(std::mem::take(current));
            Ok(())
        };

    loop {
        let fragment = fragments.get(*cursor);
        *cursor += 1;
        match fragment {
            None => {
                if let Some(end) = until {
                    return Err(GrammarError::UnbalancedRegion {
                        line,
                        delimiter: end.delimiter(),
                    });
                }
                finish(&mut current, &mut alternatives)?;
                return Ok(alternatives);
            }
            Some(PatternFragment::Alternation) => finish(&mut current, &mut alternatives)?,
            Some(PatternFragment::Terminal(text)) => current.push(Symbol::literal(text.clone())),
            Some(PatternFragment::NonTerminal(name)) => {
                current.push(Symbol::nonterminal(name.clone()));
            }
            Some(PatternFragment::KindMarker(kind)) => current.push(Symbol::kind(*kind)),
            Some(PatternFragment::Epsilon) => current.push(Symbol::Epsilon),
            Some(PatternFragment::OptionOpen) => {
                let inner = parse_alternatives(fragments, cursor, line, Some(RegionEnd::Option))?;
                current.push(Symbol::Optional(inner));
            }
            Some(PatternFragment::RepeatOpen) => {
                let inner = parse_alternatives(fragments, cursor, line, Some(RegionEnd::Repeat))?;
                current.push(Symbol::Repetition(inner));
            }
            Some(PatternFragment::GroupOpen) => {
                let inner = parse_alternatives(fragments, cursor, line, Some(RegionEnd::Group))?;
                current.push(Symbol::Group(inner));
            }
            Some(
                close @ (PatternFragment::OptionClose
                | PatternFragment::RepeatClose
                | PatternFragment::GroupClose),
            ) => {
                let end = match close {
                    PatternFragment::OptionClose => RegionEnd::Option,
                    PatternFragment::RepeatClose => RegionEnd::Repeat,
                    _ => RegionEnd::Group,
                };
                if until == Some(end) {
                    finish(&mut current, &mut alternatives)?;
                    return Ok(alternatives);
                }
                return Err(GrammarError::UnbalancedRegion {
                    line,
                    delimiter: end.delimiter(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::TerminalMatch;

    #[test]
    fn reads_single_production() {
        let grammar = GrammarReader::read("s ::= \"a\" <s> | \"a\"").unwrap();
        assert_eq!(grammar.start(), "s");
        assert_eq!(grammar.rules().len(), 2);
        assert_eq!(
            grammar.rules()[0].body,
            vec![Symbol::literal("a"), Symbol::nonterminal("s")]
        );
        assert_eq!(grammar.rules()[1].body, vec![Symbol::literal("a")]);
    }

    #[test]
    fn bare_identifiers_are_nonterminals() {
        let grammar = GrammarReader::read("s ::= t\nt ::= \"x\"").unwrap();
        assert_eq!(grammar.rules()[0].body, vec![Symbol::nonterminal("t")]);
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let text = "# grammar\n\ns ::= \"a\"\n# trailing\n";
        let grammar = GrammarReader::read(text).unwrap();
        assert_eq!(grammar.rules().len(), 1);
    }

    #[test]
    fn kind_markers() {
        let grammar = GrammarReader::read("s ::= @string \":\" @integer").unwrap();
        assert_eq!(
            grammar.rules()[0].body,
            vec![
                Symbol::kind(TokenKind::StringLiteral),
                Symbol::literal(":"),
                Symbol::kind(TokenKind::IntegerLiteral),
            ]
        );
    }

    #[test]
    fn unknown_kind_marker() {
        assert!(matches!(
            GrammarReader::read("s ::= @blob"),
            Err(GrammarError::UnknownKindMarker { line: 1, marker }) if marker == "blob"
        ));
    }

    #[test]
    fn repetition_region_keeps_outer_pattern_whole() {
        // Alternation inside the repetition must not split the outer
        // alternative into two productions.
        let grammar = GrammarReader::read("s ::= \"x\" { \"a\" | \"b\" } \"y\"").unwrap();
        assert_eq!(grammar.rules().len(), 1);
        let body = &grammar.rules()[0].body;
        assert_eq!(body.len(), 3);
        assert_eq!(
            body[1],
            Symbol::Repetition(vec![
                vec![Symbol::literal("a")],
                vec![Symbol::literal("b")],
            ])
        );
    }

    #[test]
    fn nested_regions() {
        let grammar = GrammarReader::read("s ::= [ \"a\" ( \"b\" | \"c\" ) ]").unwrap();
        assert_eq!(
            grammar.rules()[0].body,
            vec![Symbol::Optional(vec![vec![
                Symbol::literal("a"),
                Symbol::Group(vec![vec![Symbol::literal("b")], vec![Symbol::literal("c")]]),
            ]])]
        );
    }

    #[test]
    fn epsilon_alternative() {
        let grammar = GrammarReader::read("s ::= \"a\" | ~").unwrap();
        assert_eq!(grammar.rules()[1].body, vec![Symbol::Epsilon]);
    }

    #[test]
    fn multiline_heads_merge() {
        let text = "s ::= \"a\"\ns ::= \"b\"";
        let grammar = GrammarReader::read(text).unwrap();
        assert_eq!(grammar.rules_for("s").count(), 2);
    }

    #[test]
    fn quoted_terminal_escapes() {
        let grammar = GrammarReader::read(r#"s ::= "\"" | "\\""#).unwrap();
        assert_eq!(grammar.rules()[0].body, vec![Symbol::literal("\"")]);
        assert_eq!(grammar.rules()[1].body, vec![Symbol::literal("\\")]);
    }

    #[test]
    fn error_on_missing_separator() {
        assert!(matches!(
            GrammarReader::read("s = \"a\""),
            Err(GrammarError::MalformedProduction { line: 1, .. })
        ));
    }

    #[test]
    fn error_on_unterminated_terminal() {
        assert!(matches!(
            GrammarReader::read("s ::= \"a"),
            Err(GrammarError::UnterminatedTerminal { line: 1 })
        ));
    }

    #[test]
    fn error_on_unbalanced_region() {
        assert!(matches!(
            GrammarReader::read("s ::= { \"a\""),
            Err(GrammarError::UnbalancedRegion { line: 1, delimiter: '}' })
        ));
        assert!(matches!(
            GrammarReader::read("s ::= \"a\" ]"),
            Err(GrammarError::UnbalancedRegion { line: 1, delimiter: ']' })
        ));
    }

    #[test]
    fn error_on_empty_alternative() {
        assert!(matches!(
            GrammarReader::read("s ::= \"a\" | | \"b\""),
            Err(GrammarError::MalformedProduction { line: 1, .. })
        ));
    }

    #[test]
    fn error_on_empty_text() {
        assert!(matches!(
            GrammarReader::read("# only comments\n"),
            Err(GrammarError::EmptyGrammar)
        ));
    }
}
