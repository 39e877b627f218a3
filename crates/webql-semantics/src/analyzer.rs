//! The scoped semantic analyzer.
//!
//! Walks the AST once, maintaining the scope chain, binding every
//! reference, classifying every operator, and resolving a type for every
//! node into the write-once [`SemanticContext`]. The analyzer fails closed:
//! the first violation aborts the whole analysis.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug_span;
use webql_ast::{
    BlockExpression, NodePaths, OperationExpression, OperatorCategory, ReferenceExpression,
    ScopeAccessExpression, WebqlExpression, WebqlOperator, WebqlQuery, SOURCE_BINDING,
};
use webql_error::SemanticError;
use webql_types::{widen_numeric, MemberLookup, TypeCatalog, WebqlType};

use crate::context::{ResolvedSemantic, SemanticContext};
use crate::scope::{ScopeStack, SymbolTableEntry};

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Monotonic counter of failed semantic analyses.
static WEBQL_SEMANTIC_ERRORS_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Point-in-time snapshot of semantic-analysis metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SemanticMetricsSnapshot {
    pub webql_semantic_errors_total: u64,
}

/// Take a point-in-time snapshot of semantic metrics.
#[must_use]
pub fn semantic_metrics_snapshot() -> SemanticMetricsSnapshot {
    SemanticMetricsSnapshot {
        webql_semantic_errors_total: WEBQL_SEMANTIC_ERRORS_TOTAL.load(Ordering::Relaxed),
    }
}

/// Reset semantic metrics.
pub fn reset_semantic_metrics() {
    WEBQL_SEMANTIC_ERRORS_TOTAL.store(0, Ordering::Relaxed);
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// The semantic analyzer. One instance per compilation.
pub struct SemanticAnalyzer<'a> {
    catalog: &'a dyn TypeCatalog,
    paths: &'a NodePaths,
    scopes: ScopeStack,
    context: SemanticContext,
}

impl<'a> SemanticAnalyzer<'a> {
    /// Analyze a query against a queryable source type.
    ///
    /// The root scope binds [`SOURCE_BINDING`] to `source` and resolves bare
    /// references as members of the source's element type. Each top-level
    /// member must be a boolean predicate or a collection operation applied
    /// to the source binding.
    pub fn analyze(
        query: &WebqlQuery,
        paths: &NodePaths,
        source: &WebqlType,
        catalog: &dyn TypeCatalog,
    ) -> Result<SemanticContext, SemanticError> {
        let span = debug_span!(
            target: "webql.semantic",
            "semantic_analysis",
            nodes = tracing::field::Empty,
        );
        let _guard = span.enter();

        let Some((element, _)) = source.queryable_parts() else {
            return Err(SemanticError::NotQueryable {
                operator: SOURCE_BINDING.to_owned(),
                actual: source.to_string(),
                path: "$".to_owned(),
            });
        };

        let mut analyzer = Self {
            catalog,
            paths,
            scopes: ScopeStack::new(),
            context: SemanticContext::default(),
        };
        analyzer.scopes.push(Some(element.clone()));
        analyzer.scopes.declare(
            SOURCE_BINDING,
            SymbolTableEntry {
                ty: source.clone(),
                declared_by: query.root.id(),
            },
        );

        let result = analyzer.root(&query.root);
        analyzer.scopes.pop();
        debug_assert_eq!(analyzer.scopes.depth(), 0);

        match result {
            Ok(()) => {
                span.record("nodes", analyzer.context.resolved_count() as u64);
                Ok(analyzer.context)
            }
            Err(err) => {
                WEBQL_SEMANTIC_ERRORS_TOTAL.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// The root block: predicates and source-rooted collection operations.
    fn root(&mut self, root: &WebqlExpression) -> Result<(), SemanticError> {
        let WebqlExpression::Block(block) = root else {
            // A non-block root is a single predicate.
            let ty = self.expression(root)?;
            return self.require_boolean(&ty, root);
        };

        for member in &block.expressions {
            let ty = self.expression(member)?;
            if ty.unwrap_nullable().0 == &WebqlType::Boolean {
                continue;
            }
            if is_source_rooted_collection_op(member) {
                continue;
            }
            return Err(SemanticError::TypeMismatch {
                expected: WebqlType::Boolean.to_string(),
                actual: ty.to_string(),
                path: self.path(member),
            });
        }
        self.record(block.id, WebqlType::Boolean, None, root)
    }

    fn path(&self, expr: &WebqlExpression) -> String {
        self.paths.get(expr.id()).to_owned()
    }

    fn record(
        &mut self,
        id: webql_ast::NodeId,
        ty: WebqlType,
        category: Option<OperatorCategory>,
        expr: &WebqlExpression,
    ) -> Result<(), SemanticError> {
        let path = self.paths.get(expr.id()).to_owned();
        self.context.record(id, ResolvedSemantic { ty, category }, &path)
    }

    /// Resolve one expression node, caching its type exactly once.
    fn expression(&mut self, expr: &WebqlExpression) -> Result<WebqlType, SemanticError> {
        let (ty, category) = match expr {
            WebqlExpression::Literal(literal) => (literal_type(literal.kind), None),
            WebqlExpression::Reference(reference) => (self.reference(reference)?, None),
            WebqlExpression::ScopeAccess(access) => {
                (self.scope_access(access)?, Some(OperatorCategory::Semantic))
            }
            WebqlExpression::Block(block) => (self.predicate_block(block)?, None),
            WebqlExpression::Operation(operation) => (
                self.operation(operation)?,
                Some(operation.operator.category()),
            ),
        };
        self.record(expr.id(), ty.clone(), category, expr)?;
        Ok(ty)
    }

    /// A nested block is always predicate position: every member boolean.
    fn predicate_block(&mut self, block: &BlockExpression) -> Result<WebqlType, SemanticError> {
        for member in &block.expressions {
            let ty = self.expression(member)?;
            if ty.unwrap_nullable().0 != &WebqlType::Boolean {
                return Err(SemanticError::TypeMismatch {
                    expected: WebqlType::Boolean.to_string(),
                    actual: ty.to_string(),
                    path: self.path(member),
                });
            }
        }
        Ok(WebqlType::Boolean)
    }

    /// Resolve a reference through the scope chain: declared symbols first,
    /// then case-insensitive member lookup on the nearest element type.
    fn reference(&mut self, reference: &ReferenceExpression) -> Result<WebqlType, SemanticError> {
        let path = || self.paths.get(reference.id).to_owned();

        for scope in self.scopes.iter_outward() {
            if let Some(entry) = scope.symbol(&reference.identifier) {
                return Ok(entry.ty.clone());
            }
            if let Some(element) = scope.element() {
                let base = element.unwrap_nullable().0;
                match self.catalog.member(base, &reference.identifier) {
                    MemberLookup::Found(ty) => return Ok(ty),
                    MemberLookup::Ambiguous(_) => {
                        return Err(SemanticError::AmbiguousMember {
                            member: reference.identifier.clone(),
                            on: base.to_string(),
                            path: path(),
                        });
                    }
                    MemberLookup::NotFound => {}
                }
            }
        }

        Err(SemanticError::IdentifierNotDeclared {
            name: reference.identifier.clone(),
            path: path(),
        })
    }

    /// Resolve a member access on an already-typed base.
    fn scope_access(&mut self, access: &ScopeAccessExpression) -> Result<WebqlType, SemanticError> {
        let base_ty = self.expression(&access.base)?;
        let base = base_ty.unwrap_nullable().0;
        match self.catalog.member(base, &access.field) {
            MemberLookup::Found(ty) => Ok(ty),
            MemberLookup::Ambiguous(_) => Err(SemanticError::AmbiguousMember {
                member: access.field.clone(),
                on: base.to_string(),
                path: self.paths.get(access.id).to_owned(),
            }),
            MemberLookup::NotFound => Err(SemanticError::UnknownMember {
                member: access.field.clone(),
                on: base.to_string(),
                path: self.paths.get(access.id).to_owned(),
            }),
        }
    }

    /// Dispatch an operation to its category rule.
    fn operation(&mut self, operation: &OperationExpression) -> Result<WebqlType, SemanticError> {
        match operation.operator.category() {
            OperatorCategory::Arithmetic => self.arithmetic(operation),
            OperatorCategory::Relational => self.relational(operation),
            OperatorCategory::StringRelational => self.string_relational(operation),
            OperatorCategory::Logical => self.logical(operation),
            OperatorCategory::CollectionManipulation
            | OperatorCategory::CollectionAggregation => self.collection(operation),
            // Member access and coercion surface as scope-access nodes, so
            // no operator key carries the semantic category.
            OperatorCategory::Semantic => {
                unreachable!("no operator key maps to the semantic category")
            }
        }
    }

    fn operands<'e, const N: usize>(
        &self,
        operation: &'e OperationExpression,
    ) -> Result<[&'e WebqlExpression; N], SemanticError> {
        let operands: Vec<&WebqlExpression> = operation.operands.iter().collect();
        operands
            .try_into()
            .map_err(|_| SemanticError::OperandCount {
                operator: operation.operator.key().to_owned(),
                expected: N,
                actual: operation.operands.len(),
                path: self.paths.get(operation.id).to_owned(),
            })
    }

    /// Both operands numeric; the result follows standard numeric widening.
    fn arithmetic(&mut self, operation: &OperationExpression) -> Result<WebqlType, SemanticError> {
        let [left, right] = self.operands(operation)?;
        let left_ty = self.expression(left)?;
        let right_ty = self.expression(right)?;
        widen_numeric(&left_ty, &right_ty).ok_or_else(|| SemanticError::TypeMismatch {
            expected: "numeric operands".to_owned(),
            actual: format!("{left_ty} and {right_ty}"),
            path: self.paths.get(operation.id).to_owned(),
        })
    }

    /// Matching (post-nullable-unwrap) operand types; numeric operands are
    /// compatible through widening; `null` compares against nullable types.
    fn relational(&mut self, operation: &OperationExpression) -> Result<WebqlType, SemanticError> {
        let [left, right] = self.operands(operation)?;
        let left_ty = self.expression(left)?;
        let right_ty = self.expression(right)?;
        if !relational_compatible(&left_ty, &right_ty) {
            return Err(SemanticError::TypeMismatch {
                expected: left_ty.unwrap_nullable().0.to_string(),
                actual: right_ty.unwrap_nullable().0.to_string(),
                path: self.paths.get(operation.id).to_owned(),
            });
        }
        Ok(WebqlType::Boolean)
    }

    /// Both operands strings.
    fn string_relational(
        &mut self,
        operation: &OperationExpression,
    ) -> Result<WebqlType, SemanticError> {
        let [left, right] = self.operands(operation)?;
        for operand in [left, right] {
            let ty = self.expression(operand)?;
            if ty.unwrap_nullable().0 != &WebqlType::String {
                return Err(SemanticError::TypeMismatch {
                    expected: WebqlType::String.to_string(),
                    actual: ty.to_string(),
                    path: self.paths.get(operation.id).to_owned(),
                });
            }
        }
        Ok(WebqlType::Boolean)
    }

    /// All operands boolean.
    fn logical(&mut self, operation: &OperationExpression) -> Result<WebqlType, SemanticError> {
        if operation.operator == WebqlOperator::Not && operation.operands.len() != 1 {
            return Err(SemanticError::OperandCount {
                operator: operation.operator.key().to_owned(),
                expected: 1,
                actual: operation.operands.len(),
                path: self.paths.get(operation.id).to_owned(),
            });
        }
        for operand in &operation.operands {
            let ty = self.expression(operand)?;
            if ty.unwrap_nullable().0 != &WebqlType::Boolean {
                return Err(SemanticError::TypeMismatch {
                    expected: WebqlType::Boolean.to_string(),
                    actual: ty.to_string(),
                    path: self.path(operand),
                });
            }
        }
        Ok(WebqlType::Boolean)
    }

    /// Collection operators: the source operand must be queryable; lambda
    /// operands are analyzed in a fresh scope whose element is the source's
    /// element type.
    fn collection(&mut self, operation: &OperationExpression) -> Result<WebqlType, SemanticError> {
        let path = self.paths.get(operation.id).to_owned();
        let Some(source) = operation.operands.first() else {
            return Err(SemanticError::OperandCount {
                operator: operation.operator.key().to_owned(),
                expected: 1,
                actual: 0,
                path,
            });
        };
        let source_ty = self.expression(source)?;
        let Some((element, flavor)) = source_ty.queryable_parts() else {
            return Err(SemanticError::NotQueryable {
                operator: operation.operator.key().to_owned(),
                actual: source_ty.to_string(),
                path,
            });
        };
        let element = element.clone();

        use WebqlOperator::*;
        match operation.operator {
            Filter => {
                let [_, predicate] = self.operands(operation)?;
                let ty = self.in_element_scope(element, predicate)?;
                self.require_boolean(&ty, predicate)?;
                Ok(source_ty)
            }
            Limit | Skip => {
                let [_, amount] = self.operands(operation)?;
                let ty = self.expression(amount)?;
                if !ty.unwrap_nullable().0.is_integer() {
                    return Err(SemanticError::TypeMismatch {
                        expected: WebqlType::Int64.to_string(),
                        actual: ty.to_string(),
                        path: self.path(amount),
                    });
                }
                Ok(source_ty)
            }
            Select => {
                let [_, projection] = self.operands(operation)?;
                let projected = self.in_element_scope(element, projection)?;
                Ok(WebqlType::Queryable {
                    element: Box::new(projected),
                    flavor,
                })
            }
            Contains => {
                let [_, needle] = self.operands(operation)?;
                let needle_ty = self.expression(needle)?;
                if !relational_compatible(&needle_ty, &element) {
                    return Err(SemanticError::TypeMismatch {
                        expected: element.to_string(),
                        actual: needle_ty.to_string(),
                        path: self.path(needle),
                    });
                }
                Ok(WebqlType::Boolean)
            }
            Count | Any | All => {
                if let Some(predicate) = operation.operands.get(1) {
                    let ty = self.in_element_scope(element, predicate)?;
                    self.require_boolean(&ty, predicate)?;
                }
                Ok(if operation.operator == Count {
                    WebqlType::Int64
                } else {
                    WebqlType::Boolean
                })
            }
            Min | Max => {
                let [_, selector] = self.operands(operation)?;
                self.in_element_scope(element, selector)
            }
            Sum => {
                let [_, selector] = self.operands(operation)?;
                let ty = self.in_element_scope(element, selector)?;
                let underlying = ty.unwrap_nullable().0;
                if underlying.is_integer() {
                    Ok(WebqlType::Int64)
                } else if underlying.is_float() {
                    Ok(WebqlType::Float64)
                } else {
                    Err(SemanticError::TypeMismatch {
                        expected: "numeric member".to_owned(),
                        actual: ty.to_string(),
                        path: self.path(selector),
                    })
                }
            }
            Average => {
                let [_, selector] = self.operands(operation)?;
                let ty = self.in_element_scope(element, selector)?;
                if !ty.unwrap_nullable().0.is_numeric() {
                    return Err(SemanticError::TypeMismatch {
                        expected: "numeric member".to_owned(),
                        actual: ty.to_string(),
                        path: self.path(selector),
                    });
                }
                Ok(WebqlType::Float64)
            }
            _ => unreachable!("non-collection operator dispatched to collection rule"),
        }
    }

    /// Analyze an expression in a fresh scope whose current element is
    /// `element`, restoring the previous scope on exit.
    fn in_element_scope(
        &mut self,
        element: WebqlType,
        expr: &WebqlExpression,
    ) -> Result<WebqlType, SemanticError> {
        self.scopes.push(Some(element));
        let result = self.expression(expr);
        self.scopes.pop();
        result
    }

    fn require_boolean(
        &self,
        ty: &WebqlType,
        expr: &WebqlExpression,
    ) -> Result<(), SemanticError> {
        if ty.unwrap_nullable().0 == &WebqlType::Boolean {
            Ok(())
        } else {
            Err(SemanticError::TypeMismatch {
                expected: WebqlType::Boolean.to_string(),
                actual: ty.to_string(),
                path: self.path(expr),
            })
        }
    }
}

/// The primitive type of a literal, inferred from its lexical kind.
fn literal_type(kind: webql_ast::LiteralKind) -> WebqlType {
    match kind {
        webql_ast::LiteralKind::String => WebqlType::String,
        webql_ast::LiteralKind::Integer => WebqlType::Int64,
        webql_ast::LiteralKind::Float => WebqlType::Float64,
        webql_ast::LiteralKind::Boolean => WebqlType::Boolean,
        webql_ast::LiteralKind::Null => WebqlType::Null,
    }
}

/// Relational compatibility: same underlying type, both numeric (widening
/// applies), or `null` against a nullable type.
fn relational_compatible(left: &WebqlType, right: &WebqlType) -> bool {
    let (l, l_wrapped) = left.unwrap_nullable();
    let (r, r_wrapped) = right.unwrap_nullable();
    if l == r {
        return true;
    }
    if widen_numeric(l, r).is_some() {
        return true;
    }
    // `null` compares against nullable types (and against itself, covered
    // by the equality case above).
    (*l == WebqlType::Null && r_wrapped) || (*r == WebqlType::Null && l_wrapped)
}

/// Whether a top-level member is a collection operation applied directly to
/// the reserved source binding.
fn is_source_rooted_collection_op(expr: &WebqlExpression) -> bool {
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
