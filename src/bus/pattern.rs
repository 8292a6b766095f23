//! Pattern - Field map used to route bus messages

use std::collections::BTreeMap;

use crate::constants::{
    PATTERN_FIELD_CMD, PATTERN_FIELD_ROLE, PATTERN_FIELD_STORE, PATTERN_FIELD_TYPE, ROLE_STORE,
};

/// A routing pattern such as `{role:'store', cmd:'get', type:'video'}`.
///
/// A registered pattern matches a request when every registered field is
/// present in the request with the same value. Extra request fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pattern {
    fields: BTreeMap<String, String>,
}

impl Pattern {
    /// Empty pattern.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `{role:'store', cmd}`.
    #[must_use]
    pub fn store(cmd: &str) -> Self {
        Self::new()
            .with(PATTERN_FIELD_ROLE, ROLE_STORE)
            .with(PATTERN_FIELD_CMD, cmd)
    }

    /// Add or replace a field.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Add the `type` field.
    #[must_use]
    pub fn with_type(self, entity_type: impl Into<String>) -> Self {
        self.with(PATTERN_FIELD_TYPE, entity_type)
    }

    /// Add the `store` field.
    #[must_use]
    pub fn with_store(self, store: impl Into<String>) -> Self {
        self.with(PATTERN_FIELD_STORE, store)
    }

    /// Field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// The `cmd` field.
    #[must_use]
    pub fn cmd(&self) -> Option<&str> {
        self.get(PATTERN_FIELD_CMD)
    }

    /// The `type` field.
    #[must_use]
    pub fn entity_type(&self) -> Option<&str> {
        self.get(PATTERN_FIELD_TYPE)
    }

    /// Does this (registered) pattern accept `request`?
    #[must_use]
    pub fn matches(&self, request: &Pattern) -> bool {
        self.fields
            .iter()
            .all(|(field, value)| request.get(field) == Some(value.as_str()))
    }

    /// Number of fields; more fields means a more specific registration.
    #[must_use]
    pub fn specificity(&self) -> usize {
        self.fields.len()
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, (field, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}:{value}")?;
        }
        f.write_str("}")
    }
}
