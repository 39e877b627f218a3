//! Production rules and the grammar container.

use std::collections::BTreeSet;

use webql_error::GrammarError;

use crate::symbol::Symbol;

/// A single production: `head ::= body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionRule {
    /// The defined non-terminal.
    pub head: String,
    /// Ordered body symbols. A body of exactly `[Epsilon]` derives the
    /// empty string.
    pub body: Vec<Symbol>,
}

impl ProductionRule {
    /// Create a production rule.
    #[must_use]
    pub fn new(head: impl Into<String>, body: Vec<Symbol>) -> Self {
        Self {
            head: head.into(),
            body,
        }
    }

    /// Whether the body derives the empty string directly.
    #[must_use]
    pub fn is_epsilon(&self) -> bool {
        self.body.is_empty() || self.body == [Symbol::Epsilon]
    }
}

/// A set of production rules with a distinguished start symbol.
///
/// Constructed once per grammar text and immutable afterwards; safe to share
/// by reference across concurrent parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    start: String,
    rules: Vec<ProductionRule>,
}

impl Grammar {
    /// Build a grammar, validating its invariants: at least one production,
    /// a defined start symbol, and no non-terminal referenced without a
    /// defining production.
    pub fn new(
        start: impl Into<String>,
        rules: Vec<ProductionRule>,
    ) -> Result<Self, GrammarError> {
        let start = start.into();
        if rules.is_empty() {
            return Err(GrammarError::EmptyGrammar);
        }

        let defined: BTreeSet<&str> = rules.iter().map(|r| r.head.as_str()).collect();
        if !defined.contains(start.as_str()) {
            return Err(GrammarError::UndefinedNonTerminal { name: start });
        }
        for rule in &rules {
            for name in referenced_nonterminals(&rule.body) {
                if !defined.contains(name) {
                    return Err(GrammarError::UndefinedNonTerminal {
                        name: name.to_owned(),
                    });
                }
            }
        }

        Ok(Self { start, rules })
    }

    /// The start symbol.
    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    /// All rules in definition order.
    #[must_use]
    pub fn rules(&self) -> &[ProductionRule] {
        &self.rules
    }

    /// Rules defining the given non-terminal.
    pub fn rules_for<'a>(&'a self, head: &'a str) -> impl Iterator<Item = &'a ProductionRule> {
        self.rules.iter().filter(move |r| r.head == head)
    }

    /// The set of defined non-terminal names.
    #[must_use]
    pub fn nonterminals(&self) -> BTreeSet<&str> {
        self.rules.iter().map(|r| r.head.as_str()).collect()
    }

    /// Whether every rule body is free of macro symbols (the table builder's
    /// precondition).
    #[must_use]
    pub fn is_macro_free(&self) -> bool {
        self.rules
            .iter()
            .all(|r| r.body.iter().all(|s| !s.is_macro()))
    }

    /// Rules as `(head, body)` pairs, sorted. Used to compare grammars for
    /// production-set equivalence regardless of definition order.
    #[must_use]
    pub fn normalized_rules(&self) -> Vec<(&str, &[Symbol])> {
        let mut rules: Vec<_> = self
            .rules
            .iter()
            .map(|r| (r.head.as_str(), r.body.as_slice()))
            .collect();
        rules.sort();
        rules.dedup();
        rules
    }
}

/// Every non-terminal name referenced in a body, macros included.
fn referenced_nonterminals(body: &[Symbol]) -> Vec<&str> {
    let mut names = Vec::new();
    collect_nonterminals(body, &mut names);
    names
}

fn collect_nonterminals<'a>(body: &'a [Symbol], into: &mut Vec<&'a str>) {
    for symbol in body {
        match symbol {
            Symbol::NonTerminal(name) => into.push(name),
            Symbol::Optional(alts) | Symbol::Repetition(alts) | Symbol::Group(alts) => {
                for alt in alts {
                    collect_nonterminals(alt, into);
                }
            }
            Symbol::Terminal(_) | Symbol::Epsilon => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_grammar() {
        assert_eq!(
            Grammar::new("s", vec![]).unwrap_err(),
            GrammarError::EmptyGrammar
        );
    }

    #[test]
    fn rejects_undefined_start() {
        let rules = vec![ProductionRule::new("a", vec![Symbol::literal("x")])];
        assert!(matches!(
            Grammar::new("s", rules),
            Err(GrammarError::UndefinedNonTerminal { name }) if name == "s"
        ));
    }

    #[test]
    fn rejects_undefined_reference() {
        let rules = vec![ProductionRule::new("s", vec![Symbol::nonterminal("ghost")])];
        assert!(matches!(
            Grammar::new("s", rules),
            Err(GrammarError::UndefinedNonTerminal { name }) if name == "ghost"
        ));
    }

    #[test]
    fn finds_references_inside_macros() {
        let rules = vec![ProductionRule::new(
            "s",
            vec![Symbol::Repetition(vec![vec![Symbol::nonterminal("missing")]])],
        )];
        assert!(matches!(
            Grammar::new("s", rules),
            Err(GrammarError::UndefinedNonTerminal { name }) if name == "missing"
        ));
    }

    #[test]
    fn epsilon_detection() {
        assert!(ProductionRule::new("s", vec![Symbol::Epsilon]).is_epsilon());
        assert!(ProductionRule::new("s", vec![]).is_epsilon());
        assert!(!ProductionRule::new("s", vec![Symbol::literal("a")]).is_epsilon());
    }

    #[test]
    fn accepts_valid_grammar() {
        let rules = vec![
            ProductionRule::new("s", vec![Symbol::literal("a"), Symbol::nonterminal("s")]),
            ProductionRule::new("s", vec![Symbol::literal("a")]),
        ];
        let grammar = Grammar::new("s", rules).unwrap();
        assert_eq!(grammar.start(), "s");
        assert_eq!(grammar.rules_for("s").count(), 2);
        assert!(grammar.is_macro_free());
    }
}
