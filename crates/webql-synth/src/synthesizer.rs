//! The expression synthesizer.
//!
//! A second, synthesis-only traversal that mirrors the semantic one. Types
//! were fixed by the analyzer, so every operator lowers to exactly one
//! backend form; collection operators resolve their backend method through
//! the [`QueryProvider`](crate::provider::QueryProvider) for the source's
//! statically-known queryable flavor.
//!
//! The top-level block lowers to a pipeline: boolean members fold into one
//! filter lambda over the source, and source-rooted collection operations
//! chain onto it in document order.

use tracing::debug;
use webql_ast::{
    LiteralExpression, LiteralKind, NodePaths, OperationExpression, OperatorCategory,
    WebqlExpression, WebqlOperator, WebqlQuery, SOURCE_BINDING,
};
use webql_error::TranslationError;
use webql_lexer::decode_string;
use webql_semantics::SemanticContext;
use webql_types::WebqlType;

use crate::expr::{BackendExpression, BinaryOperator, ConstantValue, UnaryOperator};
use crate::provider::{ElementOperation, QueryProvider};

/// The result of lowering one query.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedQuery {
    /// The backend expression tree.
    pub expression: BackendExpression,
    /// The statically-resolved type of the whole expression.
    pub result_type: WebqlType,
}

/// The synthesizer. One instance per compilation.
pub struct ExpressionSynthesizer<'a> {
    context: &'a SemanticContext,
    paths: &'a NodePaths,
    provider: &'a dyn QueryProvider,
    bindings: Vec<String>,
}

impl<'a> ExpressionSynthesizer<'a> {
    /// Lower an analyzed query into a backend expression.
    pub fn synthesize(
        query: &WebqlQuery,
        context: &SemanticContext,
        paths: &NodePaths,
        source: &WebqlType,
        provider: &dyn QueryProvider,
    ) -> Result<SynthesizedQuery, TranslationError> {
        let Some((element, flavor)) = source.queryable_parts() else {
            return Err(TranslationError::MissingSymbol {
                path: "$".to_owned(),
            });
        };

        let mut synthesizer = Self {
            context,
            paths,
            provider,
            bindings: Vec::new(),
        };

        let members: Vec<&WebqlExpression> = match &query.root {
            WebqlExpression::Block(block) => block.expressions.iter().collect(),
            other => vec![other],
        };
        let (stages, predicates): (Vec<_>, Vec<_>) =
            members.into_iter().partition(|m| is_pipeline_stage(m));

        let mut expression = BackendExpression::Source;
        let mut result_type = source.clone();

        if !predicates.is_empty() {
            let parameter = synthesizer.push_binding();
            let mut folded: Option<BackendExpression> = None;
            for predicate in &predicates {
                let lowered = synthesizer.expression(predicate)?;
                folded = Some(match folded {
                    None => lowered,
                    Some(acc) => BackendExpression::binary(BinaryOperator::And, acc, lowered),
                });
            }
            synthesizer.pop_binding();

            if let Some(body) = folded {
                let operation =
                    provider.element_operation(ElementOperation::Filter, flavor, element)?;
                expression = BackendExpression::ProviderCall {
                    operation,
                    source: Box::new(expression),
                    arguments: vec![BackendExpression::Lambda {
                        parameter,
                        body: Box::new(body),
                    }],
                };
            }
        }

        for stage in &stages {
            let WebqlExpression::Operation(operation) = stage else {
                unreachable!("pipeline stages are operations by construction");
            };
            expression = synthesizer.collection_call(operation, expression)?;
            result_type = context
                .type_of(operation.id)
                .cloned()
                .ok_or_else(|| TranslationError::MissingSymbol {
                    path: paths.get(operation.id).to_owned(),
                })?;
        }

        debug!(
            target: "webql.synth",
            predicates = predicates.len(),
            stages = stages.len(),
            result_type = %result_type,
            "query synthesized"
        );
        debug_assert!(synthesizer.bindings.is_empty());

        Ok(SynthesizedQuery {
            expression,
            result_type,
        })
    }

    fn push_binding(&mut self) -> String {
        let depth = self.bindings.len();
        let name = if depth == 0 {
            "it".to_owned()
        } else {
            format!("it{}", depth + 1)
        };
        self.bindings.push(name.clone());
        name
    }

    fn pop_binding(&mut self) {
        self.bindings.pop();
    }

    fn path_of(&self, expr: &WebqlExpression) -> String {
        self.paths.get(expr.id()).to_owned()
    }

    /// Lower one expression node.
    fn expression(
        &mut self,
        expr: &WebqlExpression,
    ) -> Result<BackendExpression, TranslationError> {
        match expr {
            WebqlExpression::Literal(literal) => {
                Ok(BackendExpression::Constant(self.constant(literal)?))
            }
            WebqlExpression::Reference(reference) => {
                if reference.identifier == SOURCE_BINDING {
                    return Ok(BackendExpression::Source);
                }
                let Some(parameter) = self.bindings.last() else {
                    return Err(TranslationError::DanglingDestination {
                        path: self.paths.get(reference.id).to_owned(),
                    });
                };
                Ok(BackendExpression::member(
                    BackendExpression::Parameter(parameter.clone()),
                    reference.identifier.clone(),
                ))
            }
            WebqlExpression::ScopeAccess(access) => {
                let base = self.expression(&access.base)?;
                Ok(BackendExpression::member(base, access.field.clone()))
            }
            WebqlExpression::Block(block) => {
                let mut folded: Option<BackendExpression> = None;
                for member in &block.expressions {
                    let lowered = self.expression(member)?;
                    folded = Some(match folded {
                        None => lowered,
                        Some(acc) => {
                            BackendExpression::binary(BinaryOperator::And, acc, lowered)
                        }
                    });
                }
                Ok(folded.unwrap_or(BackendExpression::Constant(ConstantValue::Boolean(true))))
            }
            WebqlExpression::Operation(operation) => self.operation(operation),
        }
    }

    fn operation(
        &mut self,
        operation: &OperationExpression,
    ) -> Result<BackendExpression, TranslationError> {
        match operation.operator.category() {
            OperatorCategory::Logical => self.logical(operation),
            OperatorCategory::Relational
            | OperatorCategory::StringRelational
            | OperatorCategory::Arithmetic => self.binary(operation),
            OperatorCategory::CollectionManipulation
            | OperatorCategory::CollectionAggregation => {
                let Some(source_node) = operation.operands.first() else {
                    unreachable!("collection arity validated by semantic analysis");
                };
                let source = self.expression(source_node)?;
                self.collection_call(operation, source)
            }
            OperatorCategory::Semantic => {
                unreachable!("no operator key maps to the semantic category")
            }
        }
    }

    fn logical(
        &mut self,
        operation: &OperationExpression,
    ) -> Result<BackendExpression, TranslationError> {
        if operation.operator == WebqlOperator::Not {
            let [operand] = operation.operands.as_slice() else {
                unreachable!("'$not' arity validated by semantic analysis");
            };
            let lowered = self.expression(operand)?;
            return Ok(BackendExpression::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(lowered),
            });
        }

        let op = if operation.operator == WebqlOperator::And {
            BinaryOperator::And
        } else {
            BinaryOperator::Or
        };
        let mut folded: Option<BackendExpression> = None;
        for operand in &operation.operands {
            let lowered = self.expression(operand)?;
            folded = Some(match folded {
                None => lowered,
                Some(acc) => BackendExpression::binary(op, acc, lowered),
            });
        }
        match folded {
            Some(expr) => Ok(expr),
            None => unreachable!("logical arity validated by semantic analysis"),
        }
    }

    fn binary(
        &mut self,
        operation: &OperationExpression,
    ) -> Result<BackendExpression, TranslationError> {
        let [left, right] = operation.operands.as_slice() else {
            unreachable!("binary arity validated by semantic analysis");
        };
        let op = match operation.operator {
            WebqlOperator::Equals => BinaryOperator::Equal,
            WebqlOperator::NotEquals => BinaryOperator::NotEqual,
            WebqlOperator::Greater => BinaryOperator::Greater,
            WebqlOperator::GreaterOrEquals => BinaryOperator::GreaterOrEqual,
            WebqlOperator::Less => BinaryOperator::Less,
            WebqlOperator::LessOrEquals => BinaryOperator::LessOrEqual,
            WebqlOperator::Like => BinaryOperator::ContainsIgnoreCase,
            WebqlOperator::Add => BinaryOperator::Add,
            WebqlOperator::Subtract => BinaryOperator::Subtract,
            WebqlOperator::Multiply => BinaryOperator::Multiply,
            WebqlOperator::Divide => BinaryOperator::Divide,
            other => unreachable!("operator {other} is not a binary lowering"),
        };
        let left = self.expression(left)?;
        let right = self.expression(right)?;
        Ok(BackendExpression::binary(op, left, right))
    }

    /// Lower a collection operation onto an already-lowered source.
    fn collection_call(
        &mut self,
        operation: &OperationExpression,
        source: BackendExpression,
    ) -> Result<BackendExpression, TranslationError> {
        let Some(source_node) = operation.operands.first() else {
            unreachable!("collection arity validated by semantic analysis");
        };
        let source_type = self.context.type_of(source_node.id()).ok_or_else(|| {
            TranslationError::MissingSymbol {
                path: self.path_of(source_node),
            }
        })?;
        let Some((element, flavor)) = source_type.queryable_parts() else {
            return Err(TranslationError::MissingSymbol {
                path: self.path_of(source_node),
            });
        };

        let element_operation = element_operation_for(operation.operator);
        let provider_operation =
            self.provider
                .element_operation(element_operation, flavor, element)?;

        use WebqlOperator::*;
        let arguments = match operation.operator {
            Filter | Any | All | Count => match operation.operands.get(1) {
                Some(predicate) => vec![self.lambda(predicate)?],
                None => Vec::new(),
            },
            Select | Min | Max | Sum | Average => {
                let Some(selector) = operation.operands.get(1) else {
                    unreachable!("selector arity validated by semantic analysis");
                };
                vec![self.lambda(selector)?]
            }
            Limit | Skip | Contains => {
                let Some(argument) = operation.operands.get(1) else {
                    unreachable!("argument arity validated by semantic analysis");
                };
                vec![self.expression(argument)?]
            }
            other => unreachable!("operator {other} is not a collection lowering"),
        };

        Ok(BackendExpression::ProviderCall {
            operation: provider_operation,
            source: Box::new(source),
            arguments,
        })
    }

    /// Lower an element-scoped operand into a lambda.
    fn lambda(&mut self, body: &WebqlExpression) -> Result<BackendExpression, TranslationError> {
        let parameter = self.push_binding();
        let result = self.expression(body);
        self.pop_binding();
        Ok(BackendExpression::Lambda {
            parameter,
            body: Box::new(result?),
        })
    }

    /// Materialize a literal using the type its lexical kind implies.
    fn constant(&self, literal: &LiteralExpression) -> Result<ConstantValue, TranslationError> {
        let bad = |ty: &str| TranslationError::BadConstant {
            raw: literal.raw.clone(),
            ty: ty.to_owned(),
            path: self.paths.get(literal.id).to_owned(),
        };
        Ok(match literal.kind {
            LiteralKind::Null => ConstantValue::Null,
            LiteralKind::Boolean => ConstantValue::Boolean(literal.raw == "true"),
            LiteralKind::Integer => {
                ConstantValue::Integer(literal.raw.parse().map_err(|_| bad("Int64"))?)
            }
            LiteralKind::Float => {
                ConstantValue::Float(literal.raw.parse().map_err(|_| bad("Float64"))?)
            }
            LiteralKind::String => {
                ConstantValue::String(decode_string(&literal.raw).ok_or_else(|| bad("String"))?)
            }
        })
    }
}

/// Whether a top-level member chains onto the source pipeline.
fn is_pipeline_stage(expr: &WebqlExpression) -> bool {
    let WebqlExpression::Operation(operation) = expr else {
        return false;
    };
    let collection = matches!(
        operation.operator.category(),
        OperatorCategory::CollectionManipulation | OperatorCategory::CollectionAggregation
    );
    collection
        && matches!(
            operation.operands.first(),
            Some(WebqlExpression::Reference(r)) if r.identifier == SOURCE_BINDING
        )
}

/// The element-wise operation a collection operator maps onto.
fn element_operation_for(operator: WebqlOperator) -> ElementOperation {
    use WebqlOperator::*;
    match operator {
        Filter => ElementOperation::Filter,
        Select => ElementOperation::Project,
        Limit => ElementOperation::Take,
        Skip => ElementOperation::Skip,
        Contains => ElementOperation::Contains,
        Count => ElementOperation::Count,
        Any => ElementOperation::Any,
        All => ElementOperation::All,
        Min => ElementOperation::Min,
        Max => ElementOperation::Max,
        Sum => ElementOperation::Sum,
        Average => ElementOperation::Average,
        other => unreachable!("operator {other} is not element-wise"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StandardProvider;
    use webql_ast::{BlockExpression, NodeId, ReferenceExpression};
    use webql_semantics::SemanticAnalyzer;
    use webql_types::StaticTypeCatalog;

    struct Factory {
        next: u32,
        paths: NodePaths,
    }

    impl Factory {
        fn new() -> Self {
            Self {
                next: 0,
                paths: NodePaths::default(),
            }
        }

        fn id(&mut self, path: &str) -> NodeId {
            let id = NodeId(self.next);
            self.next += 1;
            self.paths.insert(id, path);
            id
        }

        fn literal(&mut self, kind: LiteralKind, raw: &str, path: &str) -> WebqlExpression {
            WebqlExpression::Literal(LiteralExpression {
                id: self.id(path),
                kind,
                raw: raw.to_owned(),
            })
        }

        fn reference(&mut self, name: &str, path: &str) -> WebqlExpression {
            WebqlExpression::Reference(ReferenceExpression {
                id: self.id(path),
                identifier: name.to_owned(),
            })
        }

        fn operation(
            &mut self,
            operator: WebqlOperator,
            operands: Vec<WebqlExpression>,
            path: &str,
        ) -> WebqlExpression {
            WebqlExpression::Operation(OperationExpression {
                id: self.id(path),
                operator,
                operands,
            })
        }

        fn query(&mut self, members: Vec<WebqlExpression>) -> WebqlQuery {
            WebqlQuery {
                root: WebqlExpression::Block(BlockExpression {
                    id: self.id("$"),
                    expressions: members,
                }),
            }
        }
    }

    fn catalog() -> StaticTypeCatalog {
        StaticTypeCatalog::new()
            .with(
                "User",
                [
                    ("age", WebqlType::Int32),
                    ("name", WebqlType::String),
                    ("orders", WebqlType::queryable(WebqlType::object("Order"))),
                ],
            )
            .with("Order", [("total", WebqlType::Float64)])
    }

    fn lower(f: &Factory, query: &WebqlQuery, source: &WebqlType) -> SynthesizedQuery {
        let context =
            SemanticAnalyzer::analyze(query, &f.paths, source, &catalog()).expect("analysis");
        ExpressionSynthesizer::synthesize(
            query,
            &context,
            &f.paths,
            source,
            &StandardProvider::new(),
        )
        .expect("synthesis")
    }

    #[test]
    fn filter_predicate_from_comparison() {
        let mut f = Factory::new();
        let lhs = f.reference("age", "$.age");
        let rhs = f.literal(LiteralKind::Integer, "18", "$.age.$greater");
        let op = f.operation(WebqlOperator::Greater, vec![lhs, rhs], "$.age.$greater");
        let query = f.query(vec![op]);

        let source = WebqlType::queryable(WebqlType::object("User"));
        let lowered = lower(&f, &query, &source);
        assert_eq!(
            lowered.expression.to_string(),
            "source.filter(it => (it.age > 18))"
        );
        assert_eq!(lowered.result_type, source);
    }

    #[test]
    fn like_lowers_to_case_insensitive_contains() {
        let mut f = Factory::new();
        let lhs = f.reference("name", "$.name");
        let rhs = f.literal(LiteralKind::String, "\"john\"", "$.name.$like");
        let op = f.operation(WebqlOperator::Like, vec![lhs, rhs], "$.name.$like");
        let query = f.query(vec![op]);

        let lowered = lower(&f, &query, &WebqlType::queryable(WebqlType::object("User")));
        assert_eq!(
            lowered.expression.to_string(),
            "source.filter(it => contains_ci(it.name, \"john\"))"
        );
    }

    #[test]
    fn multiple_predicates_fold_with_and() {
        let mut f = Factory::new();
        let a_lhs = f.reference("age", "$.age");
        let a_rhs = f.literal(LiteralKind::Integer, "18", "$.age");
        let a = f.operation(WebqlOperator::Greater, vec![a_lhs, a_rhs], "$.age");
        let b_lhs = f.reference("name", "$.name");
        let b_rhs = f.literal(LiteralKind::String, "\"jo\"", "$.name");
        let b = f.operation(WebqlOperator::Equals, vec![b_lhs, b_rhs], "$.name");
        let query = f.query(vec![a, b]);

        let lowered = lower(&f, &query, &WebqlType::queryable(WebqlType::object("User")));
        assert_eq!(
            lowered.expression.to_string(),
            "source.filter(it => ((it.age > 18) && (it.name == \"jo\")))"
        );
    }

    #[test]
    fn pipeline_stage_chains_after_filter() {
        let mut f = Factory::new();
        let lhs = f.reference("age", "$.age");
        let rhs = f.literal(LiteralKind::Integer, "18", "$.age");
        let predicate = f.operation(WebqlOperator::Greater, vec![lhs, rhs], "$.age");
        let source_ref = f.reference(SOURCE_BINDING, "$.$limit");
        let amount = f.literal(LiteralKind::Integer, "10", "$.$limit");
        let limit = f.operation(WebqlOperator::Limit, vec![source_ref, amount], "$.$limit");
        let query = f.query(vec![predicate, limit]);

        let source = WebqlType::queryable(WebqlType::object("User"));
        let lowered = lower(&f, &query, &source);
        assert_eq!(
            lowered.expression.to_string(),
            "source.filter(it => (it.age > 18)).take(10)"
        );
        assert_eq!(lowered.result_type, source);
    }

    #[test]
    fn nested_any_uses_fresh_binding() {
        let mut f = Factory::new();
        let orders = f.reference("orders", "$.orders");
        let total = f.reference("total", "$.orders.$any.total");
        let hundred = f.literal(LiteralKind::Integer, "100", "$.orders.$any.total");
        let inner = f.operation(
            WebqlOperator::Greater,
            vec![total, hundred],
            "$.orders.$any.total",
        );
        let any = f.operation(WebqlOperator::Any, vec![orders, inner], "$.orders.$any");
        let query = f.query(vec![any]);

        let lowered = lower(&f, &query, &WebqlType::queryable(WebqlType::object("User")));
        assert_eq!(
            lowered.expression.to_string(),
            "source.filter(it => it.orders.any(it2 => (it2.total > 100)))"
        );
    }

    #[test]
    fn async_source_selects_async_provider_methods() {
        let mut f = Factory::new();
        let source_ref = f.reference(SOURCE_BINDING, "$.$count");
        let count = f.operation(WebqlOperator::Count, vec![source_ref], "$.$count");
        let query = f.query(vec![count]);

        let source = WebqlType::async_queryable(WebqlType::object("User"));
        let lowered = lower(&f, &query, &source);
        assert_eq!(lowered.expression.to_string(), "source.count_async()");
        assert_eq!(lowered.result_type, WebqlType::Int64);
    }

    #[test]
    fn missing_provider_mapping_is_a_translation_error() {
        let mut f = Factory::new();
        let source_ref = f.reference(SOURCE_BINDING, "$.$count");
        let count = f.operation(WebqlOperator::Count, vec![source_ref], "$.$count");
        let query = f.query(vec![count]);

        let source = WebqlType::async_queryable(WebqlType::object("User"));
        let context =
            SemanticAnalyzer::analyze(&query, &f.paths, &source, &catalog()).expect("analysis");
        let err = ExpressionSynthesizer::synthesize(
            &query,
            &context,
            &f.paths,
            &source,
            &StandardProvider::sync_only(),
        )
        .unwrap_err();
        assert!(matches!(err, TranslationError::MissingProviderMapping { .. }));
    }

    #[test]
    fn member_reference_without_binding_is_dangling() {
        // `$limit` with a member-reference amount passes analysis (the
        // member is an integer) but has no element binding at lowering
        // time: the destination dangles.
        let mut f = Factory::new();
        let source_ref = f.reference(SOURCE_BINDING, "$.$limit");
        let amount = f.reference("age", "$.$limit");
        let limit = f.operation(WebqlOperator::Limit, vec![source_ref, amount], "$.$limit");
        let query = f.query(vec![limit]);

        let source = WebqlType::queryable(WebqlType::object("User"));
        let context =
            SemanticAnalyzer::analyze(&query, &f.paths, &source, &catalog()).expect("analysis");
        let err = ExpressionSynthesizer::synthesize(
            &query,
            &context,
            &f.paths,
            &source,
            &StandardProvider::new(),
        )
        .unwrap_err();
        assert!(matches!(err, TranslationError::DanglingDestination { .. }));
    }

    #[test]
    fn empty_query_is_the_identity_pipeline() {
        let mut f = Factory::new();
        let query = f.query(vec![]);
        let source = WebqlType::queryable(WebqlType::object("User"));
        let lowered = lower(&f, &query, &source);
        assert_eq!(lowered.expression, BackendExpression::Source);
        assert_eq!(lowered.result_type, source);
    }
}
