//! LR(1) items and FIRST-set computation.

use std::collections::{BTreeSet, HashMap};

use webql_grammar::{Grammar, Symbol, TerminalMatch};

/// An LR(1) item: a production, a dot position into its body, and a single
/// lookahead terminal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lr1Item {
    /// Index into the builder's flattened production list.
    pub production: usize,
    /// Number of body symbols already recognized.
    pub dot: usize,
    /// The terminal expected after this production completes.
    pub lookahead: TerminalMatch,
}

/// A canonical set of items. `BTreeSet` gives the deterministic ordering
/// state identity relies on.
pub type ItemSet = BTreeSet<Lr1Item>;

/// FIRST sets and the nullable set for a macro-free grammar.
#[derive(Debug)]
pub struct FirstSets {
    first: HashMap<String, BTreeSet<TerminalMatch>>,
    nullable: BTreeSet<String>,
}

impl FirstSets {
    /// Compute FIRST sets by fixpoint iteration.
    #[must_use]
    pub fn compute(grammar: &Grammar) -> Self {
        let mut first: HashMap<String, BTreeSet<TerminalMatch>> = grammar
            .nonterminals()
            .into_iter()
            .map(|n| (n.to_owned(), BTreeSet::new()))
            .collect();
        let mut nullable: BTreeSet<String> = BTreeSet::new();

        loop {
            let mut changed = false;
            for rule in grammar.rules() {
                let mut all_nullable = true;
                for symbol in &rule.body {
                    match symbol {
                        Symbol::Terminal(t) => {
                            if first
                                .entry(rule.head.clone())
                                .or_default()
                                .insert(t.clone())
                            {
                                changed = true;
                            }
                            all_nullable = false;
                        }
                        Symbol::NonTerminal(n) => {
                            let from = first.get(n).cloned().unwrap_or_default();
                            let into = first.entry(rule.head.clone()).or_default();
                            for t in from {
                                if into.insert(t) {
                                    changed = true;
                                }
                            }
                            if !nullable.contains(n) {
                                all_nullable = false;
                            }
                        }
                        Symbol::Epsilon => {}
                        _ => all_nullable = false,
                    }
                    if !all_nullable {
                        break;
                    }
                }
                if all_nullable && nullable.insert(rule.head.clone()) {
                    changed = true;
                }
            }
            if !changed {
                return Self { first, nullable };
            }
        }
    }

    /// Whether the non-terminal can derive the empty string.
    #[must_use]
    pub fn is_nullable(&self, name: &str) -> bool {
        self.nullable.contains(name)
    }

    /// FIRST of a symbol sequence followed by `fallback` - the lookahead
    /// set for closure items over `βa`.
    #[must_use]
    pub fn first_of(&self, symbols: &[Symbol], fallback: &TerminalMatch) -> BTreeSet<TerminalMatch> {
        let mut out = BTreeSet::new();
        for symbol in symbols {
            match symbol {
                Symbol::Terminal(t) => {
                    out.insert(t.clone());
                    return out;
                }
                Symbol::NonTerminal(n) => {
                    if let Some(set) = self.first.get(n) {
                        out.extend(set.iter().cloned());
                    }
                    if !self.nullable.contains(n) {
                        return out;
                    }
                }
                Symbol::Epsilon => {}
                _ => return out,
            }
        }
        out.insert(fallback.clone());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webql_grammar::GrammarReader;
    use webql_lexer::TokenKind;

    fn read(text: &str) -> Grammar {
        GrammarReader::read(text).expect("grammar should read")
    }

    #[test]
    fn first_of_terminals() {
        let grammar = read("s ::= \"a\" <t>\nt ::= \"b\" | @integer");
        let firsts = FirstSets::compute(&grammar);
        assert_eq!(
            firsts.first_of(&[Symbol::nonterminal("t")], &TerminalMatch::EndOfInput),
            BTreeSet::from([
                TerminalMatch::Literal("b".to_owned()),
                TerminalMatch::Kind(TokenKind::IntegerLiteral),
            ])
        );
    }

    #[test]
    fn first_through_nullable() {
        let grammar = read("s ::= <t> \"z\"\nt ::= \"a\" | ~");
        let firsts = FirstSets::compute(&grammar);
        assert!(firsts.is_nullable("t"));
        // FIRST(t "z") includes both "a" and, through nullable t, "z".
        assert_eq!(
            firsts.first_of(
                &[Symbol::nonterminal("t"), Symbol::literal("z")],
                &TerminalMatch::EndOfInput
            ),
            BTreeSet::from([
                TerminalMatch::Literal("a".to_owned()),
                TerminalMatch::Literal("z".to_owned()),
            ])
        );
    }

    #[test]
    fn first_of_empty_sequence_is_fallback() {
        let grammar = read("s ::= \"a\"");
        let firsts = FirstSets::compute(&grammar);
        assert_eq!(
            firsts.first_of(&[], &TerminalMatch::EndOfInput),
            BTreeSet::from([TerminalMatch::EndOfInput])
        );
    }
}
