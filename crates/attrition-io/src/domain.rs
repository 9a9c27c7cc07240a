//! Domain types for attrition-io.

use std::fmt;

use attrition_codec::StudentAttributes;
use serde::{Deserialize, Serialize};

/// A student identifier.
///
/// Taken from the `id` column of the input CSV, or the one-based row number
/// when the column is absent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    /// Create a student ID from a non-empty string.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        debug_assert!(!id.is_empty(), "student ID must not be empty");
        Self(id)
    }

    /// Return the student ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One validated input row: identity, attributes and outcome label.
#[derive(Debug, Clone)]
pub struct StudentRecord {
    /// Student identifier.
    pub id: StudentId,
    /// Human-readable attributes, validated against the schema.
    pub attributes: StudentAttributes,
    /// Outcome label, for example `Graduate`.
    pub target: String,
}
