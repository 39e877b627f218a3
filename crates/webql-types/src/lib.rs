//! Type model for the WebQL compiler.
//!
//! [`WebqlType`] describes every type the semantic analyzer can resolve:
//! primitives, nullable wrappers, queryable collections (sync or async),
//! and named object types whose members live in an external
//! [`TypeCatalog`]. The catalog is injected - the compiler never reflects
//! over a host runtime directly.

mod catalog;

pub use catalog::{MemberLookup, StaticTypeCatalog, TypeCatalog};

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Queryable flavor
// ---------------------------------------------------------------------------

/// The two recognized kinds of queryable source.
///
/// The expression synthesizer picks the provider operation for the flavor
/// the semantic pass statically resolved; a compiled query therefore never
/// guesses at runtime whether its source streams asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryableFlavor {
    /// Ordinary synchronous enumeration.
    Sync,
    /// Asynchronous streaming enumeration.
    Async,
}

impl fmt::Display for QueryableFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => f.write_str("synchronous"),
            Self::Async => f.write_str("asynchronous"),
        }
    }
}

// ---------------------------------------------------------------------------
// WebqlType
// ---------------------------------------------------------------------------

/// A resolved WebQL type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebqlType {
    /// `true` / `false`.
    Boolean,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit IEEE 754 float.
    Float32,
    /// 64-bit IEEE 754 float.
    Float64,
    /// UTF-8 text.
    String,
    /// The type of the `null` literal before it is bound to a member type.
    Null,
    /// A value that may be absent.
    Nullable(Box<WebqlType>),
    /// An enumerable of `element`, sync or async.
    Queryable {
        element: Box<WebqlType>,
        flavor: QueryableFlavor,
    },
    /// A named object type; members are resolved through the [`TypeCatalog`].
    Object(String),
}

impl WebqlType {
    /// Construct a synchronous queryable of `element`.
    #[must_use]
    pub fn queryable(element: Self) -> Self {
        Self::Queryable {
            element: Box::new(element),
            flavor: QueryableFlavor::Sync,
        }
    }

    /// Construct an asynchronous queryable of `element`.
    #[must_use]
    pub fn async_queryable(element: Self) -> Self {
        Self::Queryable {
            element: Box::new(element),
            flavor: QueryableFlavor::Async,
        }
    }

    /// Construct a named object type.
    #[must_use]
    pub fn object(name: impl Into<String>) -> Self {
        Self::Object(name.into())
    }

    /// Wrap in `Nullable` unless already nullable (or `Null` itself).
    #[must_use]
    pub fn nullable(self) -> Self {
        match self {
            Self::Nullable(_) | Self::Null => self,
            other => Self::Nullable(Box::new(other)),
        }
    }

    /// Strip one `Nullable` wrapper if present. Returns the inner type and
    /// whether a wrapper was removed.
    #[must_use]
    pub fn unwrap_nullable(&self) -> (&Self, bool) {
        match self {
            Self::Nullable(inner) => (inner, true),
            other => (other, false),
        }
    }

    /// Whether this is one of the integer types.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Int32 | Self::Int64)
    }

    /// Whether this is one of the floating types.
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Whether this is a numeric type (nullable wrappers do not count;
    /// unwrap first).
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Whether this is a queryable collection type.
    #[must_use]
    pub const fn is_queryable(&self) -> bool {
        matches!(self, Self::Queryable { .. })
    }

    /// The element type and flavor, if this is a queryable.
    #[must_use]
    pub fn queryable_parts(&self) -> Option<(&Self, QueryableFlavor)> {
        match self {
            Self::Queryable { element, flavor } => Some((element, *flavor)),
            _ => None,
        }
    }

    /// Whether two types are equal after stripping nullable wrappers.
    #[must_use]
    pub fn same_underlying(&self, other: &Self) -> bool {
        self.unwrap_nullable().0 == other.unwrap_nullable().0
    }
}

impl fmt::Display for WebqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("Boolean"),
            Self::Int32 => f.write_str("Int32"),
            Self::Int64 => f.write_str("Int64"),
            Self::Float32 => f.write_str("Float32"),
            Self::Float64 => f.write_str("Float64"),
            Self::String => f.write_str("String"),
            Self::Null => f.write_str("Null"),
            Self::Nullable(inner) => write!(f, "{inner}?"),
            Self::Queryable { element, flavor } => match flavor {
                QueryableFlavor::Sync => write!(f, "Queryable<{element}>"),
                QueryableFlavor::Async => write!(f, "AsyncQueryable<{element}>"),
            },
            Self::Object(name) => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Numeric widening
// ---------------------------------------------------------------------------

/// Widen two numeric operand types to the type of their arithmetic result.
///
/// Rules: the integer family widens toward the widest integer width present;
/// any floating operand promotes the whole expression to the widest floating
/// type present. Nullable wrappers are stripped before widening and the
/// result is non-nullable unless *both* operands were nullable.
///
/// Returns `None` if either underlying type is not numeric.
#[must_use]
pub fn widen_numeric(left: &WebqlType, right: &WebqlType) -> Option<WebqlType> {
    let (l, l_nullable) = left.unwrap_nullable();
    let (r, r_nullable) = right.unwrap_nullable();
    if !l.is_numeric() || !r.is_numeric() {
        return None;
    }

    let widened = if l.is_float() || r.is_float() {
        let rank = |t: &WebqlType| match t {
            WebqlType::Float64 => 2,
            WebqlType::Float32 => 1,
            _ => 0,
        };
        if rank(l).max(rank(r)) == 2 {
            WebqlType::Float64
        } else {
            WebqlType::Float32
        }
    } else if *l == WebqlType::Int64 || *r == WebqlType::Int64 {
        WebqlType::Int64
    } else {
        WebqlType::Int32
    };

    Some(if l_nullable && r_nullable {
        widened.nullable()
    } else {
        widened
    })
}
