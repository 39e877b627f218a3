//! WebQL: a grammar-driven compiler from JSON-shaped query documents to
//! backend expression trees.
//!
//! The pipeline has two flows. Grammar compilation - GDEF text → grammar →
//! LR(1) table - runs once per grammar and produces an immutable
//! [`WebqlPipeline`] that is safe to share across threads. Query
//! compilation - tokenize → parse → reduce → AST → semantic analysis →
//! synthesis - runs per query text against a shared pipeline and either
//! returns a complete [`CompiledQuery`] or the first error; no stage ever
//! yields a partial result.
//!
//! ```
//! use webql::{StandardProvider, StaticTypeCatalog, WebqlPipeline, WebqlType};
//!
//! let pipeline = WebqlPipeline::with_default_grammar().expect("default grammar builds");
//! let catalog = StaticTypeCatalog::new().with("User", [("age", WebqlType::Int32)]);
//! let source = WebqlType::queryable(WebqlType::object("User"));
//!
//! let compiled = pipeline
//!     .compile(r#"{"age": {"$greater": 18}}"#, &source, &catalog, &StandardProvider::new())
//!     .expect("query compiles");
//! assert_eq!(compiled.expression.to_string(), "source.filter(it => (it.age > 18))");
//! ```

use std::collections::HashSet;

use tracing::debug;

pub use webql_ast::{
    AstBuilder, LiteralKind, NodeId, NodePaths, OperatorCategory, WebqlExpression, WebqlOperator,
    WebqlQuery, SOURCE_BINDING,
};
pub use webql_error::{
    CompileError, CompileStage, GrammarError, LexicalError, SemanticError, SourcePosition,
    SyntaxError, TranslationError,
};
pub use webql_grammar::{transform, Grammar, GrammarReader, ProductionRule, Symbol, TerminalMatch};
pub use webql_lexer::{Token, TokenKind, Tokenizer, TokenizerConfig};
pub use webql_lr::{reduce, CstNode, Lr1Parser, Lr1Table, Lr1TableBuilder};
pub use webql_semantics::{SemanticAnalyzer, SemanticContext};
pub use webql_synth::{
    BackendExpression, BinaryOperator, ConstantValue, ElementOperation, ExpressionSynthesizer,
    ProviderOperation, QueryProvider, StandardProvider, SynthesizedQuery, UnaryOperator,
};
pub use webql_types::{
    widen_numeric, MemberLookup, QueryableFlavor, StaticTypeCatalog, TypeCatalog, WebqlType,
};

/// The default WebQL document grammar in GDEF.
///
/// The grammar is an input, not a fixed language: embedders can compile a
/// different GDEF text through [`WebqlPipeline::from_grammar_text`].
pub const DEFAULT_GRAMMAR: &str = "\
# WebQL query document grammar.
document ::= <object>
object ::= \"{\" \"}\" | \"{\" <members> \"}\"
members ::= <pair> { \",\" <pair> }
pair ::= @string \":\" <value>
value ::= <object> | <array> | <scalar>
array ::= \"[\" \"]\" | \"[\" <elements> \"]\"
elements ::= <value> { \",\" <value> }
scalar ::= @string | @integer | @float | @boolean | @null
";

/// CST node names the reducer keeps; everything else is grammatical
/// scaffolding.
pub const SIGNIFICANT: [&str; 4] = ["object", "pair", "array", "scalar"];

/// A fully compiled query.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// The backend expression tree, ready for a queryable backend.
    pub expression: BackendExpression,
    /// The statically-resolved result type.
    pub result_type: WebqlType,
}

/// A reusable compilation pipeline for one grammar.
///
/// Construction performs the expensive, one-time grammar compilation
/// (read, transform, LR(1) table build). The value is immutable afterwards
/// and `Send + Sync`: share it by reference across compilation threads.
#[derive(Debug, Clone)]
pub struct WebqlPipeline {
    tokenizer: Tokenizer,
    table: Lr1Table,
    significant: HashSet<String>,
}

impl WebqlPipeline {
    /// Build the pipeline for [`DEFAULT_GRAMMAR`].
    pub fn with_default_grammar() -> Result<Self, CompileError> {
        Self::from_grammar_text(DEFAULT_GRAMMAR)
    }

    /// Build a pipeline for a custom GDEF grammar text, keeping the default
    /// significant names.
    pub fn from_grammar_text(text: &str) -> Result<Self, CompileError> {
        let grammar = GrammarReader::read(text)?;
        let prepared = transform::prepare(&grammar)?;
        let table = Lr1TableBuilder::build(&prepared)?;
        debug!(
            target: "webql.grammar",
            states = table.state_count(),
            "pipeline constructed"
        );
        Ok(Self {
            tokenizer: Tokenizer::default(),
            table,
            significant: SIGNIFICANT.iter().map(|s| (*s).to_owned()).collect(),
        })
    }

    /// Replace the significant-name whitelist (for custom grammars).
    #[must_use]
    pub fn with_significant_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.significant = names.into_iter().map(Into::into).collect();
        self
    }

    /// The LR(1) table, for inspection.
    #[must_use]
    pub fn table(&self) -> &Lr1Table {
        &self.table
    }

    /// Front half of the pipeline: tokenize, parse, reduce, build the AST.
    pub fn parse(&self, query_text: &str) -> Result<(WebqlQuery, NodePaths), CompileError> {
        let tokens = self.tokenizer.tokenize(query_text)?;
        let cst = Lr1Parser::parse(&self.table, &tokens)?;
        let reduced = reduce(cst, &self.significant);
        Ok(AstBuilder::build(&reduced)?)
    }

    /// Compile a query document against a queryable source type.
    ///
    /// Compile-or-fail: any stage error aborts the whole compilation and
    /// nothing partial is returned.
    pub fn compile(
        &self,
        query_text: &str,
        source: &WebqlType,
        catalog: &dyn TypeCatalog,
        provider: &dyn QueryProvider,
    ) -> Result<CompiledQuery, CompileError> {
        let (query, paths) = self.parse(query_text)?;
        let context = SemanticAnalyzer::analyze(&query, &paths, source, catalog)?;
        let synthesized =
            ExpressionSynthesizer::synthesize(&query, &context, &paths, source, provider)?;
        Ok(CompiledQuery {
            expression: synthesized.expression,
            result_type: synthesized.result_type,
        })
    }
}
