//! End-to-end pipeline tests: query text in, backend expression out.

use webql::{
    CompileError, GrammarError, LexicalError, Lr1Parser, Lr1TableBuilder, SemanticError,
    SourcePosition, StandardProvider, StaticTypeCatalog, SyntaxError, Token, TokenKind,
    WebqlPipeline, WebqlType,
};

fn pipeline() -> WebqlPipeline {
    WebqlPipeline::with_default_grammar().expect("default grammar builds")
}

fn catalog() -> StaticTypeCatalog {
    StaticTypeCatalog::new()
        .with(
            "User",
            [
                ("age", WebqlType::Int32),
                ("name", WebqlType::String),
                ("email", WebqlType::String.nullable()),
                ("orders", WebqlType::queryable(WebqlType::object("Order"))),
                ("address", WebqlType::object("Address")),
            ],
        )
        .with(
            "Order",
            [("total", WebqlType::Float64), ("open", WebqlType::Boolean)],
        )
        .with("Address", [("city", WebqlType::String)])
}

fn users() -> WebqlType {
    WebqlType::queryable(WebqlType::object("User"))
}

fn compile(query: &str) -> Result<webql::CompiledQuery, CompileError> {
    pipeline().compile(query, &users(), &catalog(), &StandardProvider::new())
}

fn lowered(query: &str) -> String {
    compile(query).expect("query compiles").expression.to_string()
}

// ---------------------------------------------------------------------------
// Grammar-level scenarios
// ---------------------------------------------------------------------------

#[test]
fn right_recursive_grammar_accepts_aaa() {
    // Grammar `S ::= "a" S | "a"`, token stream a a a - accepted.
    let grammar = webql::GrammarReader::read("s ::= \"a\" <s> | \"a\"").unwrap();
    let prepared = webql::transform::prepare(&grammar).unwrap();
    let table = Lr1TableBuilder::build(&prepared).unwrap();

    let tokens: Vec<Token> = (0..3)
        .map(|i| {
            Token::new(
                TokenKind::Identifier,
                "a",
                SourcePosition::new(i, 1, i as u32 + 1),
            )
        })
        .collect();
    let cst = Lr1Parser::parse(&table, &tokens).expect("aaa accepted");
    assert_eq!(cst.to_string(), "(root (s a (s a (s a))))");
}

#[test]
fn ambiguous_grammar_fails_at_build_time() {
    let err = WebqlPipeline::from_grammar_text("e ::= <e> \"+\" <e> | \"n\"").unwrap_err();
    assert!(matches!(
        err,
        CompileError::Grammar(
            GrammarError::ShiftReduceConflict { .. } | GrammarError::ReduceReduceConflict { .. }
        )
    ));
}

// ---------------------------------------------------------------------------
// Compilation scenarios
// ---------------------------------------------------------------------------

#[test]
fn greater_than_compiles_to_filter_predicate() {
    assert_eq!(
        lowered(r#"{"age": {"$greater": 18}}"#),
        "source.filter(it => (it.age > 18))"
    );
}

#[test]
fn like_compiles_to_case_insensitive_substring_match() {
    assert_eq!(
        lowered(r#"{"name": {"$like": "john"}}"#),
        "source.filter(it => contains_ci(it.name, \"john\"))"
    );
}

#[test]
fn implicit_equals_and_sibling_and() {
    assert_eq!(
        lowered(r#"{"age": 30, "name": "jo"}"#),
        "source.filter(it => ((it.age == 30) && (it.name == \"jo\")))"
    );
}

#[test]
fn array_sugars_to_or_of_equals() {
    assert_eq!(
        lowered(r#"{"age": [20, 30]}"#),
        "source.filter(it => ((it.age == 20) || (it.age == 30)))"
    );
}

#[test]
fn logical_operators_nest() {
    assert_eq!(
        lowered(r#"{"$or": [{"age": 1}, {"$not": {"name": "x"}}]}"#),
        "source.filter(it => ((it.age == 1) || !((it.name == \"x\"))))"
    );
}

#[test]
fn nested_fields_compile_to_member_chains() {
    assert_eq!(
        lowered(r#"{"address": {"city": "york"}}"#),
        "source.filter(it => (it.address.city == \"york\"))"
    );
}

#[test]
fn collection_operators_chain_on_the_source() {
    assert_eq!(
        lowered(r#"{"age": {"$greater": 18}, "$skip": 5, "$limit": 10}"#),
        "source.filter(it => (it.age > 18)).skip(5).take(10)"
    );
}

#[test]
fn aggregation_terminates_the_pipeline() {
    let compiled = compile(r#"{"age": {"$greater": 18}, "$count": true}"#).unwrap();
    assert_eq!(
        compiled.expression.to_string(),
        "source.filter(it => (it.age > 18)).count()"
    );
    assert_eq!(compiled.result_type, WebqlType::Int64);
}

#[test]
fn member_collection_predicates_rebind_the_element() {
    assert_eq!(
        lowered(r#"{"orders": {"$any": {"total": {"$greater": 100.0}}}}"#),
        "source.filter(it => it.orders.any(it2 => (it2.total > 100)))"
    );
}

#[test]
fn nullable_member_compares_against_null() {
    assert_eq!(
        lowered(r#"{"email": null}"#),
        "source.filter(it => (it.email == null))"
    );
}

#[test]
fn async_source_routes_through_async_provider_methods() {
    let source = WebqlType::async_queryable(WebqlType::object("User"));
    let compiled = pipeline()
        .compile(
            r#"{"age": {"$greater": 18}, "$limit": 3}"#,
            &source,
            &catalog(),
            &StandardProvider::new(),
        )
        .unwrap();
    assert_eq!(
        compiled.expression.to_string(),
        "source.filter_async(it => (it.age > 18)).take_async(3)"
    );
}

#[test]
fn empty_document_is_the_identity_query() {
    let compiled = compile("{}").unwrap();
    assert_eq!(compiled.expression, webql::BackendExpression::Source);
    assert_eq!(compiled.result_type, users());
}

#[test]
fn serde_json_documents_compile_unchanged() {
    let doc = serde_json::json!({"age": {"$greater": 18}});
    assert_eq!(
        lowered(&doc.to_string()),
        "source.filter(it => (it.age > 18))"
    );
}

// ---------------------------------------------------------------------------
// Failure scenarios
// ---------------------------------------------------------------------------

#[test]
fn type_mismatch_reports_json_pointer_path() {
    let err = compile(r#"{"age": {"$greater": "eighteen"}}"#).unwrap_err();
    let CompileError::Semantic(SemanticError::TypeMismatch {
        expected,
        actual,
        path,
    }) = err
    else {
        panic!("expected a semantic type mismatch, got {err:?}");
    };
    assert_eq!(path, "$.age.$greater");
    assert_eq!(expected, "Int32");
    assert_eq!(actual, "String");
}

#[test]
fn undeclared_identifier_fails_semantic_analysis() {
    let err = compile(r#"{"height": 180}"#).unwrap_err();
    assert!(matches!(
        err,
        CompileError::Semantic(SemanticError::IdentifierNotDeclared { ref name, .. })
            if name == "height"
    ));
}

#[test]
fn malformed_document_cites_first_invalid_position() {
    // Missing value after the colon: the parser stops at `}`.
    let err = compile(r#"{"age": }"#).unwrap_err();
    let CompileError::Syntax(SyntaxError::UnexpectedToken {
        token, position, ..
    }) = err
    else {
        panic!("expected a syntax error, got {err:?}");
    };
    assert_eq!(token, "}");
    assert_eq!(position.offset, 8);
}

#[test]
fn unterminated_string_is_a_lexical_error() {
    let err = compile(r#"{"age: 1}"#).unwrap_err();
    assert!(matches!(
        err,
        CompileError::Lexical(LexicalError::UnterminatedString { .. })
    ));
}

#[test]
fn unknown_operator_key_is_a_syntax_error() {
    let err = compile(r#"{"age": {"$between": 1}}"#).unwrap_err();
    assert!(matches!(
        err,
        CompileError::Syntax(SyntaxError::UnexpectedShape { .. })
    ));
}

#[test]
fn collection_operator_on_scalar_member_fails() {
    let err = compile(r#"{"age": {"$any": {"total": 1}}}"#).unwrap_err();
    assert!(matches!(
        err,
        CompileError::Semantic(SemanticError::NotQueryable { ref operator, .. })
            if operator == "$any"
    ));
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[test]
fn parsing_twice_yields_identical_asts() {
    let pipeline = pipeline();
    let text = r#"{"age": {"$greater": 18}, "$or": [{"name": "a"}, {"name": "b"}]}"#;
    let (first, _) = pipeline.parse(text).unwrap();
    let (second, _) = pipeline.parse(text).unwrap();
    assert_eq!(first, second);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn field() -> impl Strategy<Value = String> {
        prop_oneof![Just("age".to_owned()), Just("name".to_owned())]
    }

    fn document() -> impl Strategy<Value = String> {
        (field(), any::<i32>(), "[a-z]{0,8}").prop_map(|(field, number, text)| {
            if field == "age" {
                format!("{{\"{field}\": {number}}}")
            } else {
                format!("{{\"{field}\": \"{text}\"}}")
            }
        })
    }

    proptest! {
        #[test]
        fn compilation_is_deterministic(doc in document()) {
            let pipeline = pipeline();
            let a = pipeline
                .compile(&doc, &users(), &catalog(), &StandardProvider::new())
                .expect("document compiles");
            let b = pipeline
                .compile(&doc, &users(), &catalog(), &StandardProvider::new())
                .expect("document compiles");
            prop_assert_eq!(a, b);
        }
    }
}
