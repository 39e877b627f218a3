//! GDEF pretty-printing.
//!
//! `Display for Grammar` emits text the reader accepts back; re-reading the
//! output yields an equivalent production set with the same start symbol.

use std::fmt;

use crate::rule::{Grammar, ProductionRule};
use crate::symbol::{Sentence, Symbol, TerminalMatch};

impl fmt::Display for TerminalMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => {
                write!(
                    f,
                    "\"{}\"",
                    text.replace('\\', "\\\\").replace('"', "\\\"")
                )
            }
            Self::Kind(kind) => write!(f, "@{}", kind.marker()),
            Self::EndOfInput => f.write_str("<end-of-input>"),
        }
    }
}

fn write_alternatives(f: &mut fmt::Formatter<'_>, alternatives: &[Sentence]) -> fmt::Result {
    for (index, sentence) in alternatives.iter().enumerate() {
        if index > 0 {
            f.write_str(" | ")?;
        }
        write_sentence(f, sentence)?;
    }
    Ok(())
}

fn write_sentence(f: &mut fmt::Formatter<'_>, sentence: &[Symbol]) -> fmt::Result {
    for (index, symbol) in sentence.iter().enumerate() {
        if index > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{symbol}")?;
    }
    Ok(())
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal(t) => write!(f, "{t}"),
            Self::NonTerminal(name) => write!(f, "<{name}>"),
            Self::Epsilon => f.write_str("~"),
            Self::Optional(alts) => {
                f.write_str("[ ")?;
                write_alternatives(f, alts)?;
                f.write_str(" ]")
            }
            Self::Repetition(alts) => {
                f.write_str("{ ")?;
                write_alternatives(f, alts)?;
                f.write_str(" }")
            }
            Self::Group(alts) => {
                f.write_str("( ")?;
                write_alternatives(f, alts)?;
                f.write_str(" )")
            }
        }
    }
}

impl fmt::Display for ProductionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ::= ", self.head)?;
        write_sentence(f, &self.body)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // One line per head, alternatives joined by `|`. The start symbol is
        // printed first so the reader recovers it as the start again.
        let mut heads: Vec<&str> = vec![self.start()];
        for rule in self.rules() {
            if !heads.contains(&rule.head.as_str()) {
                heads.push(&rule.head);
            }
        }

        for head in heads {
            write!(f, "{head} ::= ")?;
            for (index, rule) in self.rules_for(head).enumerate() {
                if index > 0 {
                    f.write_str(" | ")?;
                }
                write_sentence(f, &rule.body)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
