//! The injectable type catalog.
//!
//! Member lookup on object types goes through [`TypeCatalog`] so the
//! compiler stays decoupled from any particular runtime reflection
//! mechanism. Lookups are case-insensitive; a name matching more than one
//! member is reported as ambiguous, not silently picked.

use std::collections::HashMap;

use crate::WebqlType;

/// Outcome of a member lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberLookup {
    /// Exactly one member matched; its declared type.
    Found(WebqlType),
    /// No member of that name.
    NotFound,
    /// More than one member matched case-insensitively; the candidate
    /// member names in their declared casing.
    Ambiguous(Vec<String>),
}

/// Case-insensitive member lookup on a type.
pub trait TypeCatalog {
    /// Resolve `name` as a member of `base`.
    ///
    /// `base` is always an underlying type - callers strip `Nullable`
    /// wrappers before asking. Non-object bases have no members.
    fn member(&self, base: &WebqlType, name: &str) -> MemberLookup;
}

/// A map-backed [`TypeCatalog`] for tests and embedders with static shapes.
#[derive(Debug, Clone, Default)]
pub struct StaticTypeCatalog {
    /// Object name (lowercase) → members in declaration order.
    shapes: HashMap<String, Vec<(String, WebqlType)>>,
}

impl StaticTypeCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) an object shape.
    pub fn define<N, M>(&mut self, name: N, members: M)
    where
        N: Into<String>,
        M: IntoIterator<Item = (&'static str, WebqlType)>,
    {
        let members = members
            .into_iter()
            .map(|(n, t)| (n.to_owned(), t))
            .collect();
        self.shapes.insert(name.into().to_ascii_lowercase(), members);
    }

    /// Builder-style [`define`](Self::define).
    #[must_use]
    pub fn with<N, M>(mut self, name: N, members: M) -> Self
    where
        N: Into<String>,
        M: IntoIterator<Item = (&'static str, WebqlType)>,
    {
        self.define(name, members);
        self
    }

    /// Number of defined shapes.
    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }
}

impl TypeCatalog for StaticTypeCatalog {
    fn member(&self, base: &WebqlType, name: &str) -> MemberLookup {
        let WebqlType::Object(object_name) = base else {
            return MemberLookup::NotFound;
        };
        let Some(members) = self.shapes.get(&object_name.to_ascii_lowercase()) else {
            return MemberLookup::NotFound;
        };

        let matches: Vec<&(String, WebqlType)> = members
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .collect();

        match matches.as_slice() {
            [] => MemberLookup::NotFound,
            [(_, ty)] => MemberLookup::Found(ty.clone()),
            many => MemberLookup::Ambiguous(many.iter().map(|(n, _)| n.clone()).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_catalog() -> StaticTypeCatalog {
        StaticTypeCatalog::new().with(
            "User",
            [
                ("age", WebqlType::Int32),
                ("name", WebqlType::String),
                ("Email", WebqlType::String.nullable()),
            ],
        )
    }

    #[test]
    fn member_lookup_case_insensitive() {
        let catalog = user_catalog();
        let user = WebqlType::object("User");
        assert_eq!(
            catalog.member(&user, "AGE"),
            MemberLookup::Found(WebqlType::Int32)
        );
        assert_eq!(
            catalog.member(&user, "email"),
            MemberLookup::Found(WebqlType::String.nullable())
        );
    }

    #[test]
    fn member_lookup_not_found() {
        let catalog = user_catalog();
        assert_eq!(
            catalog.member(&WebqlType::object("User"), "height"),
            MemberLookup::NotFound
        );
        assert_eq!(
            catalog.member(&WebqlType::object("Ghost"), "age"),
            MemberLookup::NotFound
        );
    }

    #[test]
    fn member_lookup_on_non_object() {
        let catalog = user_catalog();
        assert_eq!(catalog.member(&WebqlType::Int64, "age"), MemberLookup::NotFound);
    }

    #[test]
    fn member_lookup_ambiguous() {
        let catalog = StaticTypeCatalog::new().with(
            "Odd",
            [("Value", WebqlType::Int32), ("value", WebqlType::String)],
        );
        match catalog.member(&WebqlType::object("Odd"), "VALUE") {
            MemberLookup::Ambiguous(names) => {
                assert_eq!(names, vec!["Value".to_owned(), "value".to_owned()]);
            }
            other => panic!("expected ambiguous lookup, got {other:?}"),
        }
    }

    #[test]
    fn redefinition_replaces_shape() {
        let mut catalog = user_catalog();
        catalog.define("User", [("age", WebqlType::Int64)]);
        assert_eq!(
            catalog.member(&WebqlType::object("user"), "age"),
            MemberLookup::Found(WebqlType::Int64)
        );
        assert_eq!(catalog.shape_count(), 1);
    }
}
