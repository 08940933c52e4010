// Dimension Schema Module
// Ordered dimensions, result dimensions and schema validation

pub mod error;
pub mod parser;

pub use error::{SchemaError, SchemaErrorKind};
pub use parser::{ConfigError, MatrixConfig, MatrixConfigParser, RunnerConfig};

use serde::{Deserialize, Serialize};

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Separator used to join path values into node ids
pub const ID_SEPARATOR: char = '.';

/// Key used for the single implicit result when no result dimensions are declared
pub const DEFAULT_RESULT_KEY: &str = "result";

/// A named axis with an ordered list of distinct values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Display name
    pub name: String,
    /// Stable identifier, unique within the schema
    pub key: String,
    /// Ordered values; order defines child order in the tree
    pub values: Vec<String>,
}

impl Dimension {
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Position of a value within this dimension
    pub fn position(&self, value: &str) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }
}

/// Validated identifier of a result dimension
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResultKey(String);

impl ResultKey {
    pub fn new(key: impl Into<String>) -> Result<Self, SchemaError> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(SchemaError::new(
                SchemaErrorKind::BlankResultDimension,
                "result key must not be blank",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The implicit key used by single-result leaves
    pub fn default_key() -> Self {
        Self(DEFAULT_RESULT_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResultKey {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ResultKey {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResultKey> for String {
    fn from(key: ResultKey) -> Self {
        key.0
    }
}

impl Borrow<str> for ResultKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ResultKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An independently tracked status axis on every leaf (e.g. Backend / Frontend)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDimension {
    pub name: String,
    pub key: ResultKey,
}

impl ResultDimension {
    pub fn new(name: impl Into<String>, key: &str) -> Result<Self, SchemaError> {
        Ok(Self {
            name: name.into(),
            key: ResultKey::new(key)?,
        })
    }
}

/// Ordered dimensions plus optional result dimensions
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DimensionSchema {
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub result_dimensions: Vec<ResultDimension>,
}

impl DimensionSchema {
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self {
            dimensions,
            result_dimensions: Vec::new(),
        }
    }

    pub fn with_result_dimensions(mut self, result_dimensions: Vec<ResultDimension>) -> Self {
        self.result_dimensions = result_dimensions;
        self
    }

    /// Number of dimensions, which is also the depth of every leaf
    pub fn depth(&self) -> usize {
        self.dimensions.len()
    }

    /// Product of every dimension's value count
    pub fn leaf_count(&self) -> usize {
        self.dimensions.iter().map(|d| d.values.len()).product()
    }

    /// Look up a dimension by key
    pub fn dimension(&self, key: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.key == key)
    }

    /// Result keys every leaf carries, in declaration order
    pub fn result_keys(&self) -> Vec<ResultKey> {
        if self.result_dimensions.is_empty() {
            vec![ResultKey::default_key()]
        } else {
            self.result_dimensions.iter().map(|r| r.key.clone()).collect()
        }
    }

    /// Whether two schemas produce the same tree shape
    pub fn same_structure(&self, other: &DimensionSchema) -> bool {
        self.dimensions == other.dimensions
    }

    /// Validate dimensions and result dimensions
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.dimensions.is_empty() {
            return Err(SchemaError::no_dimensions());
        }

        let mut names = HashSet::new();
        let mut keys = HashSet::new();

        for (index, dimension) in self.dimensions.iter().enumerate() {
            if dimension.name.trim().is_empty() {
                return Err(SchemaError::blank_name(index));
            }
            if !names.insert(dimension.name.as_str()) {
                return Err(SchemaError::duplicate_name(&dimension.name));
            }
            if dimension.key.trim().is_empty() {
                return Err(SchemaError::blank_key(&dimension.name));
            }
            if !keys.insert(dimension.key.as_str()) {
                return Err(SchemaError::duplicate_key(&dimension.key));
            }
            validate_values(dimension)?;
        }

        validate_result_dimensions(&self.result_dimensions)
    }
}

fn validate_values(dimension: &Dimension) -> Result<(), SchemaError> {
    if dimension.values.is_empty() {
        return Err(SchemaError::empty_values(&dimension.key));
    }

    let mut seen = HashSet::new();
    for value in &dimension.values {
        if value.trim().is_empty() {
            return Err(SchemaError::blank_value(&dimension.key));
        }
        if value.contains(ID_SEPARATOR) {
            return Err(SchemaError::separator_in_value(
                &dimension.key,
                value,
                ID_SEPARATOR,
            ));
        }
        if !seen.insert(value.as_str()) {
            return Err(SchemaError::duplicate_value(&dimension.key, value));
        }
    }

    Ok(())
}

/// Validate a list of result dimensions on its own (used when reshaping)
pub fn validate_result_dimensions(result_dimensions: &[ResultDimension]) -> Result<(), SchemaError> {
    let mut keys = HashSet::new();
    for (index, result) in result_dimensions.iter().enumerate() {
        if result.name.trim().is_empty() {
            return Err(SchemaError::blank_result_dimension(index));
        }
        if !keys.insert(result.key.as_str()) {
            return Err(SchemaError::duplicate_result_dimension(result.key.as_str()));
        }
    }
    Ok(())
}
