//! Scope chain and symbol table.
//!
//! Scopes nest wherever an operation rebinds the current element (the
//! lambda operands of collection operators). An entry declared in a scope is
//! visible there and in nested scopes, never to siblings or outer scopes.

use std::collections::HashMap;

use webql_ast::NodeId;
use webql_types::WebqlType;

/// One symbol table entry: a declared binding and where it was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableEntry {
    /// The binding's declared type.
    pub ty: WebqlType,
    /// The AST node that introduced the binding.
    pub declared_by: NodeId,
}

/// A single lexical scope.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    symbols: HashMap<String, SymbolTableEntry>,
    element: Option<WebqlType>,
}

impl Scope {
    /// A scope whose bare references resolve as members of `element`.
    #[must_use]
    pub fn with_element(element: Option<WebqlType>) -> Self {
        Self {
            symbols: HashMap::new(),
            element,
        }
    }

    /// A locally declared symbol.
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<&SymbolTableEntry> {
        self.symbols.get(name)
    }

    /// The current element type of this scope, if it introduces one.
    #[must_use]
    pub fn element(&self) -> Option<&WebqlType> {
        self.element.as_ref()
    }
}

/// A stack of scopes with strict push/pop discipline.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a scope, optionally rebinding the current element.
    pub fn push(&mut self, element: Option<WebqlType>) {
        self.scopes.push(Scope::with_element(element));
    }

    /// Leave the innermost scope.
    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Declare a symbol in the innermost scope.
    pub fn declare(&mut self, name: impl Into<String>, entry: SymbolTableEntry) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.symbols.insert(name.into(), entry);
        }
    }

    /// Scopes from innermost to outermost.
    pub fn iter_outward(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter().rev()
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}
