//! Grammar preparation passes.
//!
//! [`prepare`] turns a freshly read grammar into an LR(1)-ready one:
//!
//! 1. macro expansion - every option/repetition/group symbol is rewritten
//!    into plain alternatives over synthetic non-terminals
//!    (`{X}` becomes `r ::= X r | ~`, `[X]` becomes `X | ~`);
//! 2. epsilon elimination - non-terminals deriving only the empty string
//!    are substituted out, nullable occurrences are expanded into
//!    present/absent variants, and epsilon productions are dropped (the
//!    start symbol keeps one explicit epsilon alternative when the whole
//!    language contains the empty string);
//! 3. augmentation - a synthetic start symbol `S' ::= S` guarantees a
//!    single unambiguous accept item.

use std::collections::{BTreeSet, VecDeque};

use tracing::debug;
use webql_error::GrammarError;

use crate::rule::{Grammar, ProductionRule};
use crate::symbol::Symbol;

/// Run all three passes. The result is macro-free and epsilon-free except
/// for an optional single epsilon alternative on the start symbol.
pub fn prepare(grammar: &Grammar) -> Result<Grammar, GrammarError> {
    let expanded = expand_macros(grammar)?;
    let contracted = eliminate_epsilon(&expanded)?;
    let augmented = augment(&contracted)?;
    debug!(
        target: "webql.grammar",
        rules_in = grammar.rules().len(),
        rules_out = augmented.rules().len(),
        start = augmented.start(),
        "grammar prepared"
    );
    Ok(augmented)
}

/// Pick a non-terminal name not yet in `taken`.
fn fresh_name(taken: &mut BTreeSet<String>, base: &str) -> String {
    let mut candidate = base.to_owned();
    let mut counter = 1;
    while taken.contains(&candidate) {
        counter += 1;
        candidate = format!("{base}_{counter}");
    }
    taken.insert(candidate.clone());
    candidate
}

/// Expand every macro symbol into plain alternatives.
pub fn expand_macros(grammar: &Grammar) -> Result<Grammar, GrammarError> {
    let mut taken: BTreeSet<String> = grammar
        .nonterminals()
        .into_iter()
        .map(str::to_owned)
        .collect();

    let mut queue: VecDeque<ProductionRule> = grammar.rules().to_vec().into();
    let mut done: Vec<ProductionRule> = Vec::new();

    while let Some(rule) = queue.pop_front() {
        let Some(index) = rule.body.iter().position(Symbol::is_macro) else {
            done.push(rule);
            continue;
        };

        let mut body = rule.body;
        let replaced = body.remove(index);
        let (base_suffix, alternatives, repeats, optional) = match replaced {
            Symbol::Optional(alts) => ("opt", alts, false, true),
            Symbol::Repetition(alts) => ("rep", alts, true, true),
            Symbol::Group(alts) => ("grp", alts, false, false),
            _ => unreachable!("position() found a macro symbol"),
        };

        let name = fresh_name(&mut taken, &format!("{}_{base_suffix}", rule.head));
        body.insert(index, Symbol::nonterminal(name.clone()));
        queue.push_back(ProductionRule::new(rule.head, body));

        for mut alt in alternatives {
            if repeats {
                alt.push(Symbol::nonterminal(name.clone()));
            }
            queue.push_back(ProductionRule::new(name.clone(), alt));
        }
        if optional {
            queue.push_back(ProductionRule::new(name.clone(), vec![Symbol::Epsilon]));
        }
    }

    Grammar::new(grammar.start(), done)
}

/// Whether every symbol of a body is in the nullable set.
fn body_nullable(body: &[Symbol], nullable: &BTreeSet<String>) -> bool {
    body.iter().all(|s| match s {
        Symbol::Epsilon => true,
        Symbol::NonTerminal(n) => nullable.contains(n),
        _ => false,
    })
}

/// Compute the set of non-terminals that can derive the empty string.
fn nullable_set(rules: &[ProductionRule]) -> BTreeSet<String> {
    let mut nullable = BTreeSet::new();
    loop {
        let before = nullable.len();
        for rule in rules {
            if !nullable.contains(&rule.head) && body_nullable(&rule.body, &nullable) {
                nullable.insert(rule.head.clone());
            }
        }
        if nullable.len() == before {
            return nullable;
        }
    }
}

/// Compute the set of non-terminals that derive *only* the empty string.
fn vanishing_set(rules: &[ProductionRule]) -> BTreeSet<String> {
    // Start from "every non-terminal vanishes" and strike out any with a
    // production that can produce something.
    let mut vanishing: BTreeSet<String> = rules.iter().map(|r| r.head.clone()).collect();
    loop {
        let before = vanishing.len();
        for rule in rules {
            let can_produce = rule.body.iter().any(|s| match s {
                Symbol::Terminal(_) => true,
                Symbol::NonTerminal(n) => !vanishing.contains(n),
                Symbol::Epsilon => false,
                macro_sym => macro_sym.is_macro(),
            });
            if can_produce {
                vanishing.remove(&rule.head);
            }
        }
        if vanishing.len() == before {
            return vanishing;
        }
    }
}

/// All present/absent variants of `body` over its nullable occurrences.
fn nullable_variants(body: &[Symbol], nullable: &BTreeSet<String>) -> Vec<Vec<Symbol>> {
    let mut variants: Vec<Vec<Symbol>> = vec![Vec::new()];
    for symbol in body {
        let optional_here = matches!(symbol, Symbol::NonTerminal(n) if nullable.contains(n));
        let mut next = Vec::with_capacity(variants.len() * if optional_here { 2 } else { 1 });
        for variant in &variants {
            let mut kept = variant.clone();
            kept.push(symbol.clone());
            next.push(kept);
            if optional_here {
                next.push(variant.clone());
            }
        }
        variants = next;
    }
    variants
}

/// Rules reachable from the start symbol.
fn reachable_rules(start: &str, rules: &[ProductionRule]) -> Vec<ProductionRule> {
    let mut reachable: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<String> = VecDeque::from([start.to_owned()]);
    while let Some(name) = queue.pop_front() {
        if !reachable.insert(name.clone()) {
            continue;
        }
        for rule in rules.iter().filter(|r| r.head == name) {
            for symbol in &rule.body {
                if let Symbol::NonTerminal(n) = symbol {
                    if !reachable.contains(n) {
                        queue.push_back(n.clone());
                    }
                }
            }
        }
    }
    rules
        .iter()
        .filter(|r| reachable.contains(&r.head))
        .cloned()
        .collect()
}

/// Eliminate epsilon productions from a macro-free grammar.
pub fn eliminate_epsilon(grammar: &Grammar) -> Result<Grammar, GrammarError> {
    if !grammar.is_macro_free() {
        let head = grammar
            .rules()
            .iter()
            .find(|r| r.body.iter().any(Symbol::is_macro))
            .map_or_else(String::new, |r| r.head.clone());
        return Err(GrammarError::UntransformedGrammar { head });
    }

    // Normalize: strip stray epsilon symbols out of multi-symbol bodies.
    let rules: Vec<ProductionRule> = grammar
        .rules()
        .iter()
        .map(|rule| {
            if rule.is_epsilon() {
                ProductionRule::new(rule.head.clone(), vec![Symbol::Epsilon])
            } else {
                let body = rule
                    .body
                    .iter()
                    .filter(|s| !matches!(s, Symbol::Epsilon))
                    .cloned()
                    .collect();
                ProductionRule::new(rule.head.clone(), body)
            }
        })
        .collect();

    let nullable = nullable_set(&rules);
    let vanishing = vanishing_set(&rules);
    let start_nullable = nullable.contains(grammar.start());

    let mut out: Vec<ProductionRule> = Vec::new();
    for rule in &rules {
        if rule.is_epsilon() {
            continue;
        }
        // Occurrences of only-epsilon non-terminals are substituted out
        // entirely; other nullable occurrences fork into variants.
        let body: Vec<Symbol> = rule
            .body
            .iter()
            .filter(|s| !matches!(s, Symbol::NonTerminal(n) if vanishing.contains(n)))
            .cloned()
            .collect();
        for variant in nullable_variants(&body, &nullable) {
            if !variant.is_empty() {
                out.push(ProductionRule::new(rule.head.clone(), variant));
            }
        }
    }

    // Deduplicate while keeping first-appearance order.
    let mut seen = BTreeSet::new();
    out.retain(|rule| seen.insert((rule.head.clone(), rule.body.clone())));

    if start_nullable {
        out.push(ProductionRule::new(
            grammar.start(),
            vec![Symbol::Epsilon],
        ));
    }

    let out = reachable_rules(grammar.start(), &out);
    Grammar::new(grammar.start(), out)
}

/// Augment with a synthetic start symbol `S' ::= S`.
pub fn augment(grammar: &Grammar) -> Result<Grammar, GrammarError> {
    let mut taken: BTreeSet<String> = grammar
        .nonterminals()
        .into_iter()
        .map(str::to_owned)
        .collect();
    let new_start = fresh_name(&mut taken, &format!("{}_start", grammar.start()));

    let mut rules = Vec::with_capacity(grammar.rules().len() + 1);
    rules.push(ProductionRule::new(
        new_start.clone(),
        vec![Symbol::nonterminal(grammar.start())],
    ));
    rules.extend(grammar.rules().iter().cloned());
    Grammar::new(new_start, rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::GrammarReader;

    fn read(text: &str) -> Grammar {
        GrammarReader::read(text).expect("grammar should read")
    }

    #[test]
    fn expands_repetition() {
        let grammar = read("members ::= pair { \",\" pair }\npair ::= @string");
        let expanded = expand_macros(&grammar).unwrap();
        assert!(expanded.is_macro_free());
        // members ::= pair members_rep
        // members_rep ::= "," pair members_rep | ~
        let rep_rules: Vec<_> = expanded.rules_for("members_rep").collect();
        assert_eq!(rep_rules.len(), 2);
        assert_eq!(
            rep_rules[0].body,
            vec![
                Symbol::literal(","),
                Symbol::nonterminal("pair"),
                Symbol::nonterminal("members_rep"),
            ]
        );
        assert!(rep_rules[1].is_epsilon());
    }

    #[test]
    fn expands_option_and_group() {
        let grammar = read("s ::= [ \"a\" ] ( \"b\" | \"c\" )");
        let expanded = expand_macros(&grammar).unwrap();
        assert!(expanded.is_macro_free());
        let opt: Vec<_> = expanded.rules_for("s_opt").collect();
        assert_eq!(opt.len(), 2);
        assert!(opt[1].is_epsilon());
        let grp: Vec<_> = expanded.rules_for("s_grp").collect();
        assert_eq!(grp.len(), 2);
        assert!(grp.iter().all(|r| !r.is_epsilon()));
    }

    #[test]
    fn synthetic_names_avoid_collisions() {
        let grammar = read("s ::= { \"a\" } <s_rep>\ns_rep ::= \"x\"");
        let expanded = expand_macros(&grammar).unwrap();
        // The synthetic repetition non-terminal must not capture the
        // user-defined s_rep.
        assert!(expanded.rules_for("s_rep_2").count() > 0);
        assert_eq!(expanded.rules_for("s_rep").count(), 1);
    }

    #[test]
    fn eliminates_optional_occurrences() {
        let grammar = read("object ::= \"{\" [ members ] \"}\"\nmembers ::= @string");
        let prepared = eliminate_epsilon(&expand_macros(&grammar).unwrap()).unwrap();
        // The synthetic option non-terminal vanishes into present/absent
        // variants of the object production.
        let object_rules: Vec<_> = prepared.rules_for("object").collect();
        assert_eq!(object_rules.len(), 2);
        assert!(prepared.rules().iter().all(|r| !r.is_epsilon()));
    }

    #[test]
    fn vanishing_nonterminals_are_substituted_out() {
        let grammar = read("s ::= \"a\" gap \"b\"\ngap ::= ~");
        let prepared = eliminate_epsilon(&grammar).unwrap();
        assert_eq!(prepared.rules().len(), 1);
        assert_eq!(
            prepared.rules()[0].body,
            vec![Symbol::literal("a"), Symbol::literal("b")]
        );
    }

    #[test]
    fn nullable_start_keeps_explicit_epsilon() {
        let grammar = read("s ::= \"a\" | ~");
        let prepared = eliminate_epsilon(&grammar).unwrap();
        let eps: Vec<_> = prepared
            .rules()
            .iter()
            .filter(|r| r.is_epsilon())
            .collect();
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].head, "s");
    }

    #[test]
    fn rejects_untransformed_grammar() {
        let grammar = read("s ::= { \"a\" }");
        assert!(matches!(
            eliminate_epsilon(&grammar),
            Err(GrammarError::UntransformedGrammar { head }) if head == "s"
        ));
    }

    #[test]
    fn augment_adds_synthetic_start() {
        let grammar = read("s ::= \"a\"");
        let augmented = augment(&grammar).unwrap();
        assert_eq!(augmented.start(), "s_start");
        assert_eq!(
            augmented.rules()[0].body,
            vec![Symbol::nonterminal("s")]
        );
    }

    #[test]
    fn prepare_end_to_end() {
        let text = "\
object ::= \"{\" [ members ] \"}\"
members ::= pair { \",\" pair }
pair ::= @string \":\" @integer
";
        let prepared = prepare(&read(text)).unwrap();
        assert!(prepared.is_macro_free());
        assert!(prepared.rules().iter().all(|r| !r.is_epsilon()));
        assert_eq!(prepared.start(), "object_start");
    }
}
