//! The pluggable query-provider abstraction.
//!
//! The synthesizer never hardcodes backend method names. For every
//! collection operator it asks the provider for the element-wise operation
//! matching the source's statically-resolved queryable flavor; this
//! indirection is what lets one compiled query run against an in-memory
//! sequence, a document store, or an asynchronous stream.

use std::collections::HashMap;
use std::fmt;

use webql_error::TranslationError;
use webql_types::{QueryableFlavor, WebqlType};

/// The element-wise operations a queryable source exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementOperation {
    Filter,
    Project,
    Take,
    Skip,
    Contains,
    Count,
    Any,
    All,
    Min,
    Max,
    Sum,
    Average,
}

impl ElementOperation {
    /// All operations, for building complete provider tables.
    pub const ALL: [Self; 12] = [
        Self::Filter,
        Self::Project,
        Self::Take,
        Self::Skip,
        Self::Contains,
        Self::Count,
        Self::Any,
        Self::All,
        Self::Min,
        Self::Max,
        Self::Sum,
        Self::Average,
    ];

    /// Canonical lower-case name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Project => "project",
            Self::Take => "take",
            Self::Skip => "skip",
            Self::Contains => "contains",
            Self::Count => "count",
            Self::Any => "any",
            Self::All => "all",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Average => "average",
        }
    }
}

impl fmt::Display for ElementOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The backend method a provider resolved for one call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOperation {
    /// Backend method name to invoke.
    pub name: String,
    /// The flavor the method belongs to.
    pub flavor: QueryableFlavor,
}

/// Maps element-wise operations onto backend methods per queryable flavor.
pub trait QueryProvider {
    /// Resolve the backend operation for `operation` on a source of the
    /// given flavor and element type.
    fn element_operation(
        &self,
        operation: ElementOperation,
        flavor: QueryableFlavor,
        element: &WebqlType,
    ) -> Result<ProviderOperation, TranslationError>;
}

/// The default provider: a complete method table per flavor, with
/// `_async`-suffixed names for the asynchronous one.
#[derive(Debug, Clone)]
pub struct StandardProvider {
    sync_methods: HashMap<ElementOperation, String>,
    async_methods: HashMap<ElementOperation, String>,
}

impl StandardProvider {
    /// A provider with full sync and async method tables.
    #[must_use]
    pub fn new() -> Self {
        let sync_methods = ElementOperation::ALL
            .into_iter()
            .map(|op| (op, op.name().to_owned()))
            .collect();
        let async_methods = ElementOperation::ALL
            .into_iter()
            .map(|op| (op, format!("{}_async", op.name())))
            .collect();
        Self {
            sync_methods,
            async_methods,
        }
    }

    /// A provider that only understands synchronous sources. Requests for
    /// asynchronous operations fail with a missing-mapping error.
    #[must_use]
    pub fn sync_only() -> Self {
        Self {
            async_methods: HashMap::new(),
            ..Self::new()
        }
    }
}

impl Default for StandardProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryProvider for StandardProvider {
    fn element_operation(
        &self,
        operation: ElementOperation,
        flavor: QueryableFlavor,
        element: &WebqlType,
    ) -> Result<ProviderOperation, TranslationError> {
        let table = match flavor {
            QueryableFlavor::Sync => &self.sync_methods,
            QueryableFlavor::Async => &self.async_methods,
        };
        let name = table.get(&operation).ok_or_else(|| {
            TranslationError::MissingProviderMapping {
                operation: operation.to_string(),
                flavor: flavor.to_string(),
                element: element.to_string(),
            }
        })?;
        Ok(ProviderOperation {
            name: name.clone(),
            flavor,
        })
    }
}
