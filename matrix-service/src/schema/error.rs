// Schema error types
// Rejections raised while validating a dimension schema or building its tree

use std::fmt;

/// Error raised when a dimension schema cannot produce a well-formed tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub message: String,
    pub kind: SchemaErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Schema declares no dimensions at all
    NoDimensions,
    /// Dimension name is empty or whitespace
    BlankName,
    /// Two dimensions share a name
    DuplicateName,
    /// Dimension key is empty or whitespace
    BlankKey,
    /// Two dimensions share a key
    DuplicateKey,
    /// Dimension has no values
    EmptyValues,
    /// A value is empty or whitespace
    BlankValue,
    /// A value appears twice within one dimension
    DuplicateValue,
    /// A value contains the node id separator
    SeparatorInValue,
    /// Two nodes derive the same id
    IdCollision,
    /// Result dimension has an empty name or key
    BlankResultDimension,
    /// Two result dimensions share a key
    DuplicateResultDimension,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema error: {}", self.message)
    }
}

impl std::error::Error for SchemaError {}

impl SchemaError {
    pub fn new(kind: SchemaErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    pub fn no_dimensions() -> Self {
        Self::new(
            SchemaErrorKind::NoDimensions,
            "at least one dimension is required",
        )
    }

    pub fn blank_name(index: usize) -> Self {
        Self::new(
            SchemaErrorKind::BlankName,
            format!("dimension #{} has a blank name", index + 1),
        )
    }

    pub fn duplicate_name(name: &str) -> Self {
        Self::new(
            SchemaErrorKind::DuplicateName,
            format!("dimension name '{}' is used more than once", name),
        )
    }

    pub fn blank_key(name: &str) -> Self {
        Self::new(
            SchemaErrorKind::BlankKey,
            format!("dimension '{}' has a blank key", name),
        )
    }

    pub fn duplicate_key(key: &str) -> Self {
        Self::new(
            SchemaErrorKind::DuplicateKey,
            format!("dimension key '{}' is used more than once", key),
        )
    }

    pub fn empty_values(key: &str) -> Self {
        Self::new(
            SchemaErrorKind::EmptyValues,
            format!("dimension '{}' has no values", key),
        )
    }

    pub fn blank_value(key: &str) -> Self {
        Self::new(
            SchemaErrorKind::BlankValue,
            format!("dimension '{}' contains a blank value", key),
        )
    }

    pub fn duplicate_value(key: &str, value: &str) -> Self {
        Self::new(
            SchemaErrorKind::DuplicateValue,
            format!("dimension '{}' lists value '{}' more than once", key, value),
        )
    }

    pub fn separator_in_value(key: &str, value: &str, separator: char) -> Self {
        Self::new(
            SchemaErrorKind::SeparatorInValue,
            format!(
                "value '{}' of dimension '{}' contains the id separator '{}'",
                value, key, separator
            ),
        )
    }

    pub fn id_collision(id: &str) -> Self {
        Self::new(
            SchemaErrorKind::IdCollision,
            format!("two nodes resolve to the same id '{}'", id),
        )
    }

    pub fn blank_result_dimension(index: usize) -> Self {
        Self::new(
            SchemaErrorKind::BlankResultDimension,
            format!("result dimension #{} has a blank name or key", index + 1),
        )
    }

    pub fn duplicate_result_dimension(key: &str) -> Self {
        Self::new(
            SchemaErrorKind::DuplicateResultDimension,
            format!("result dimension key '{}' is used more than once", key),
        )
    }
}
