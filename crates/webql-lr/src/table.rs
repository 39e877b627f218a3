//! Canonical LR(1) table construction.
//!
//! Builds the full canonical collection of LR(1) item sets and derives the
//! action and goto tables. Construction is a one-time cost per grammar; the
//! resulting [`Lr1Table`] is immutable and safe to share across threads.
//! Any `(state, terminal)` cell that would receive two different actions is
//! a fatal [`GrammarError`] at build time - conflicts are never resolved by
//! precedence.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use webql_error::GrammarError;
use webql_grammar::{transform, Grammar, Symbol, TerminalMatch};
use webql_lexer::Token;

use crate::item::{FirstSets, ItemSet, Lr1Item};

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Monotonic counter of successfully built tables.
static WEBQL_TABLES_BUILT_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Point-in-time snapshot of table-builder metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableMetricsSnapshot {
    pub webql_tables_built_total: u64,
}

/// Take a point-in-time snapshot of table-builder metrics.
#[must_use]
pub fn table_metrics_snapshot() -> TableMetricsSnapshot {
    TableMetricsSnapshot {
        webql_tables_built_total: WEBQL_TABLES_BUILT_TOTAL.load(Ordering::Relaxed),
    }
}

/// Reset table-builder metrics.
pub fn reset_table_metrics() {
    WEBQL_TABLES_BUILT_TOTAL.store(0, Ordering::Relaxed);
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A parser action for one `(state, terminal)` cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Consume the lookahead and move to the state.
    Shift(usize),
    /// Pop the production's body and emit a CST node for its head.
    Reduce(usize),
    /// The input is a complete sentence of the grammar.
    Accept,
}

/// A flattened production, body normalized (an epsilon production has an
/// empty body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    /// The defined non-terminal.
    pub head: String,
    /// Body symbols; empty for an epsilon production.
    pub body: Vec<Symbol>,
}

/// The deterministic LR(1) action/goto table.
#[derive(Debug, Clone)]
pub struct Lr1Table {
    productions: Vec<Production>,
    actions: Vec<HashMap<TerminalMatch, Action>>,
    gotos: Vec<HashMap<String, usize>>,
}

impl Lr1Table {
    /// Number of parser states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.actions.len()
    }

    /// The production with the given index.
    #[must_use]
    pub fn production(&self, index: usize) -> &Production {
        &self.productions[index]
    }

    /// Look up the action for a state and lookahead token (`None` at end of
    /// input). A literal entry is more specific than a kind entry and wins
    /// when both could match the same token.
    #[must_use]
    pub fn action_for(&self, state: usize, lookahead: Option<&Token>) -> Option<Action> {
        let cells = self.actions.get(state)?;
        match lookahead {
            None => cells.get(&TerminalMatch::EndOfInput).copied(),
            Some(token) => cells
                .get(&TerminalMatch::Literal(token.text.clone()))
                .or_else(|| cells.get(&TerminalMatch::Kind(token.kind)))
                .copied(),
        }
    }

    /// Look up the goto state for a non-terminal.
    #[must_use]
    pub fn goto(&self, state: usize, head: &str) -> Option<usize> {
        self.gotos.get(state)?.get(head).copied()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds an [`Lr1Table`] from a prepared (macro-free) grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lr1TableBuilder;

impl Lr1TableBuilder {
    /// Build the table.
    ///
    /// The grammar must be macro-free (run `transform::prepare` or at least
    /// `transform::expand_macros` + `transform::eliminate_epsilon` first).
    /// If the start symbol is referenced in any body or has several
    /// productions, the builder augments the grammar itself so that exactly
    /// one accept item exists.
    pub fn build(grammar: &Grammar) -> Result<Lr1Table, GrammarError> {
        if !grammar.is_macro_free() {
            let head = grammar
                .rules()
                .iter()
                .find(|r| r.body.iter().any(Symbol::is_macro))
                .map_or_else(String::new, |r| r.head.clone());
            return Err(GrammarError::UntransformedGrammar { head });
        }

        let augmented;
        let grammar = if needs_augmentation(grammar) {
            augmented = transform::augment(grammar)?;
            &augmented
        } else {
            grammar
        };

        let productions: Vec<Production> = grammar
            .rules()
            .iter()
            .map(|rule| Production {
                head: rule.head.clone(),
                body: if rule.is_epsilon() {
                    Vec::new()
                } else {
                    rule.body.clone()
                },
            })
            .collect();
        let by_head: HashMap<&str, Vec<usize>> = {
            let mut map: HashMap<&str, Vec<usize>> = HashMap::new();
            for (index, production) in productions.iter().enumerate() {
                map.entry(production.head.as_str()).or_default().push(index);
            }
            map
        };
        let firsts = FirstSets::compute(grammar);

        // Initial state: every start production with end-of-input lookahead.
        let start_items: ItemSet = by_head
            .get(grammar.start())
            .into_iter()
            .flatten()
            .map(|&production| Lr1Item {
                production,
                dot: 0,
                lookahead: TerminalMatch::EndOfInput,
            })
            .collect();

        let mut states: Vec<ItemSet> = vec![closure(&start_items, &productions, &by_head, &firsts)];
        let mut ids: HashMap<ItemSet, usize> = HashMap::from([(states[0].clone(), 0)]);
        let mut actions: Vec<HashMap<TerminalMatch, Action>> = vec![HashMap::new()];
        let mut gotos: Vec<HashMap<String, usize>> = vec![HashMap::new()];

        let mut cursor = 0;
        while cursor < states.len() {
            let state = states[cursor].clone();

            // Group the items by the symbol after the dot.
            let mut transitions: BTreeMap<Symbol, ItemSet> = BTreeMap::new();
            for item in &state {
                let body = &productions[item.production].body;
                if let Some(symbol) = body.get(item.dot) {
                    transitions.entry(symbol.clone()).or_default().insert(Lr1Item {
                        production: item.production,
                        dot: item.dot + 1,
                        lookahead: item.lookahead.clone(),
                    });
                }
            }

            for (symbol, kernel) in transitions {
                let closed = closure(&kernel, &productions, &by_head, &firsts);
                let target = match ids.get(&closed).copied() {
                    Some(id) => id,
                    None => {
                        let id = states.len();
                        ids.insert(closed.clone(), id);
                        states.push(closed);
                        actions.push(HashMap::new());
                        gotos.push(HashMap::new());
                        id
                    }
                };
                match symbol {
                    Symbol::Terminal(terminal) => {
                        insert_action(
                            &mut actions[cursor],
                            cursor,
                            terminal,
                            Action::Shift(target),
                        )?;
                    }
                    Symbol::NonTerminal(head) => {
                        gotos[cursor].insert(head, target);
                    }
                    // Macro-free grammars put epsilon only in lone bodies,
                    // which normalize to empty and never reach here.
                    _ => {}
                }
            }

            // Reductions and accept.
            for item in &state {
                let production = &productions[item.production];
                if item.dot < production.body.len() {
                    continue;
                }
                let action = if production.head == grammar.start()
                    && item.lookahead == TerminalMatch::EndOfInput
                {
                    Action::Accept
                } else {
                    Action::Reduce(item.production)
                };
                insert_action(
                    &mut actions[cursor],
                    cursor,
                    item.lookahead.clone(),
                    action,
                )?;
            }

            cursor += 1;
        }

        WEBQL_TABLES_BUILT_TOTAL.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "webql.grammar",
            states = states.len(),
            productions = productions.len(),
            "LR(1) table built"
        );

        Ok(Lr1Table {
            productions,
            actions,
            gotos,
        })
    }
}

/// Whether the grammar still needs a synthetic start symbol.
fn needs_augmentation(grammar: &Grammar) -> bool {
    let start = grammar.start();
    let multiple = grammar.rules_for(start).count() > 1;
    let referenced = grammar.rules().iter().any(|rule| {
        rule.body
            .iter()
            .any(|s| matches!(s, Symbol::NonTerminal(n) if n == start))
    });
    multiple || referenced
}

/// Insert an action, failing on a conflicting existing entry.
fn insert_action(
    cells: &mut HashMap<TerminalMatch, Action>,
    state: usize,
    terminal: TerminalMatch,
    action: Action,
) -> Result<(), GrammarError> {
    match cells.entry(terminal) {
        Entry::Vacant(slot) => {
            slot.insert(action);
            Ok(())
        }
        Entry::Occupied(slot) if *slot.get() == action => Ok(()),
        Entry::Occupied(slot) => {
            let shift_involved =
                matches!(slot.get(), Action::Shift(_)) || matches!(action, Action::Shift(_));
            let terminal = slot.key().to_string();
            Err(if shift_involved {
                GrammarError::ShiftReduceConflict { state, terminal }
            } else {
                GrammarError::ReduceReduceConflict { state, terminal }
            })
        }
    }
}

/// LR(1) closure of an item set.
fn closure(
    kernel: &ItemSet,
    productions: &[Production],
    by_head: &HashMap<&str, Vec<usize>>,
    firsts: &FirstSets,
) -> ItemSet {
    let mut closed: ItemSet = kernel.clone();
    let mut queue: Vec<Lr1Item> = kernel.iter().cloned().collect();

    while let Some(item) = queue.pop() {
        let body = &productions[item.production].body;
        let Some(Symbol::NonTerminal(next)) = body.get(item.dot) else {
            continue;
        };
        let beta = &body[item.dot + 1..];
        let lookaheads = firsts.first_of(beta, &item.lookahead);
        for &production in by_head.get(next.as_str()).into_iter().flatten() {
            for lookahead in &lookaheads {
                let new_item = Lr1Item {
                    production,
                    dot: 0,
                    lookahead: lookahead.clone(),
                };
                if closed.insert(new_item.clone()) {
                    queue.push(new_item);
                }
            }
        }
    }
    closed
}
