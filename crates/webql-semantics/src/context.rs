//! The per-compilation semantic context.
//!
//! A write-once cache from node identity to resolved semantics. Writing a
//! node twice raises an internal-consistency error instead of silently
//! overwriting - a double write means the traversal visited a node twice,
//! which is a bug worth hearing about.

use std::collections::HashMap;

use webql_ast::{NodeId, OperatorCategory};
use webql_error::SemanticError;
use webql_types::WebqlType;

/// The semantics resolved for one AST node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSemantic {
    /// The node's resolved type.
    pub ty: WebqlType,
    /// The operator category, for operation and scope-access nodes.
    pub category: Option<OperatorCategory>,
}

/// Resolved semantics for every node of one compilation.
#[derive(Debug, Clone, Default)]
pub struct SemanticContext {
    resolutions: HashMap<NodeId, ResolvedSemantic>,
}

impl SemanticContext {
    /// Record a node's resolution exactly once.
    pub(crate) fn record(
        &mut self,
        id: NodeId,
        resolved: ResolvedSemantic,
        path: &str,
    ) -> Result<(), SemanticError> {
        if self.resolutions.contains_key(&id) {
            return Err(SemanticError::AlreadyResolved {
                path: path.to_owned(),
            });
        }
        self.resolutions.insert(id, resolved);
        Ok(())
    }

    /// The resolved type of a node.
    #[must_use]
    pub fn type_of(&self, id: NodeId) -> Option<&WebqlType> {
        self.resolutions.get(&id).map(|r| &r.ty)
    }

    /// The resolved operator category of a node.
    #[must_use]
    pub fn category_of(&self, id: NodeId) -> Option<OperatorCategory> {
        self.resolutions.get(&id).and_then(|r| r.category)
    }

    /// Number of resolved nodes.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolutions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_once_and_reads_back() {
        let mut context = SemanticContext::default();
        context
            .record(
                NodeId(1),
                ResolvedSemantic {
                    ty: WebqlType::Boolean,
                    category: Some(OperatorCategory::Relational),
                },
                "$.age.$greater",
            )
            .unwrap();
        assert_eq!(context.type_of(NodeId(1)), Some(&WebqlType::Boolean));
        assert_eq!(
            context.category_of(NodeId(1)),
            Some(OperatorCategory::Relational)
        );
        assert_eq!(context.resolved_count(), 1);
    }

    #[test]
    fn double_write_is_loud() {
        let mut context = SemanticContext::default();
        let resolved = ResolvedSemantic {
            ty: WebqlType::Int64,
            category: None,
        };
        context.record(NodeId(7), resolved.clone(), "$.age").unwrap();
        let err = context.record(NodeId(7), resolved, "$.age").unwrap_err();
        assert!(matches!(
            err,
            SemanticError::AlreadyResolved { path } if path == "$.age"
        ));
    }
}
