// Visibility Filter
// Per-dimension allow-sets and node visibility derived from them

use crate::schema::DimensionSchema;
use crate::tree::{Node, Tree};

use std::collections::BTreeSet;

use thiserror::Error;

/// Errors raised by allow-set edits
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unknown dimension '{0}'")]
    UnknownDimension(String),

    #[error("dimension '{dimension}' has no value '{value}'")]
    UnknownValue { dimension: String, value: String },

    #[error("cannot deselect '{value}': it is the last selected value of '{dimension}'")]
    LastValue { dimension: String, value: String },
}

#[derive(Debug, Clone)]
struct AllowSet {
    key: String,
    values: Vec<String>,
    allowed: BTreeSet<String>,
}

/// Which dimension values are currently selected
#[derive(Debug, Clone)]
pub struct VisibilityFilter {
    // One entry per dimension, in depth order
    sets: Vec<AllowSet>,
}

impl VisibilityFilter {
    /// A filter with every value of every dimension selected
    pub fn new(schema: &DimensionSchema) -> Self {
        let sets = schema
            .dimensions
            .iter()
            .map(|dimension| AllowSet {
                key: dimension.key.clone(),
                values: dimension.values.clone(),
                allowed: dimension.values.iter().cloned().collect(),
            })
            .collect();
        Self { sets }
    }

    /// Select every value again
    pub fn reset(&mut self) {
        for set in &mut self.sets {
            set.allowed = set.values.iter().cloned().collect();
        }
    }

    /// Include or exclude one value.
    ///
    /// Returns whether the allow-set changed. Removing the only remaining
    /// value of a dimension is refused with [`FilterError::LastValue`] and
    /// leaves the filter untouched.
    pub fn set_value(
        &mut self,
        dimension: &str,
        value: &str,
        included: bool,
    ) -> Result<bool, FilterError> {
        let set = self
            .sets
            .iter_mut()
            .find(|set| set.key == dimension)
            .ok_or_else(|| FilterError::UnknownDimension(dimension.to_string()))?;

        if !set.values.iter().any(|v| v == value) {
            return Err(FilterError::UnknownValue {
                dimension: dimension.to_string(),
                value: value.to_string(),
            });
        }

        if included {
            return Ok(set.allowed.insert(value.to_string()));
        }

        if !set.allowed.contains(value) {
            return Ok(false);
        }
        if set.allowed.len() == 1 {
            return Err(FilterError::LastValue {
                dimension: dimension.to_string(),
                value: value.to_string(),
            });
        }
        Ok(set.allowed.remove(value))
    }

    /// Selected values of a dimension, in schema order
    pub fn allowed(&self, dimension: &str) -> Option<Vec<&str>> {
        let set = self.sets.iter().find(|set| set.key == dimension)?;
        Some(
            set.values
                .iter()
                .filter(|v| set.allowed.contains(*v))
                .map(String::as_str)
                .collect(),
        )
    }

    pub fn is_active(&self, dimension: &str, value: &str) -> bool {
        self.sets
            .iter()
            .find(|set| set.key == dimension)
            .map(|set| set.allowed.contains(value))
            .unwrap_or(false)
    }

    /// Whether any dimension has a value deselected
    pub fn is_filtering(&self) -> bool {
        self.sets.iter().any(|set| set.allowed.len() < set.values.len())
    }

    /// A leaf is visible when every path value is in its dimension's allow-set
    pub fn is_leaf_visible(&self, path: &[String]) -> bool {
        self.sets
            .iter()
            .zip(path)
            .all(|(set, value)| set.allowed.contains(value))
    }

    /// Visibility of any node: the root always, a leaf per allow-sets, an
    /// internal node when at least one of its leaves is visible
    pub fn is_visible(&self, tree: &Tree, id: &str) -> bool {
        match tree.node(id) {
            None => false,
            Some(node) if node.id().is_root() => true,
            Some(Node::Leaf(leaf)) => self.is_leaf_visible(&leaf.path),
            Some(Node::Internal(_)) => tree
                .leaves_under(id)
                .map(|leaves| leaves.iter().any(|leaf| self.is_leaf_visible(&leaf.path)))
                .unwrap_or(false),
        }
    }

    pub fn visible_leaf_count(&self, tree: &Tree) -> usize {
        tree.leaves()
            .filter(|leaf| self.is_leaf_visible(&leaf.path))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Dimension;
    use crate::tree::{TreeBuilder, ROOT_ID};

    fn setup() -> (Tree, VisibilityFilter) {
        let schema = DimensionSchema::new(vec![
            Dimension::new("Env", "env", ["local", "remote"]),
            Dimension::new("Platform", "platform", ["native", "docker"]),
        ]);
        let tree = TreeBuilder::build(&schema).unwrap();
        (tree, VisibilityFilter::new(&schema))
    }

    #[test]
    fn test_all_visible_by_default() {
        let (tree, filter) = setup();
        assert!(!filter.is_filtering());
        assert_eq!(filter.visible_leaf_count(&tree), 4);
        for node in tree.nodes() {
            assert!(filter.is_visible(&tree, node.id().as_str()));
        }
    }

    #[test]
    fn test_platform_native_only() {
        let (tree, mut filter) = setup();

        assert_eq!(filter.set_value("platform", "docker", false), Ok(true));

        assert!(filter.is_visible(&tree, "local.native"));
        assert!(!filter.is_visible(&tree, "local.docker"));
        assert!(!filter.is_visible(&tree, "remote.docker"));
        assert!(filter.is_visible(&tree, "local"));
        assert!(filter.is_visible(&tree, "remote"));
        assert_eq!(filter.visible_leaf_count(&tree), 2);
    }

    #[test]
    fn test_last_value_cannot_be_removed() {
        let (tree, mut filter) = setup();

        assert_eq!(filter.set_value("platform", "docker", false), Ok(true));
        let err = filter.set_value("platform", "native", false).unwrap_err();
        assert!(matches!(err, FilterError::LastValue { .. }));

        assert_eq!(filter.allowed("platform"), Some(vec!["native"]));
        assert_eq!(filter.visible_leaf_count(&tree), 2);
    }

    #[test]
    fn test_emptied_branch_is_hidden() {
        let (tree, mut filter) = setup();

        filter.set_value("env", "remote", false).unwrap();

        assert!(!filter.is_visible(&tree, "remote"));
        assert!(!filter.is_visible(&tree, "remote.native"));
        assert!(filter.is_visible(&tree, ROOT_ID));
    }

    #[test]
    fn test_root_visible_even_when_nothing_matches() {
        let (tree, filter) = setup();
        assert!(filter.is_visible(&tree, ROOT_ID));
        assert!(!filter.is_visible(&tree, "missing"));
    }

    #[test]
    fn test_reinclude_and_idempotent_edits() {
        let (_, mut filter) = setup();

        assert_eq!(filter.set_value("env", "local", true), Ok(false));
        assert_eq!(filter.set_value("env", "local", false), Ok(true));
        assert_eq!(filter.set_value("env", "local", false), Ok(false));
        assert!(!filter.is_active("env", "local"));
        assert_eq!(filter.set_value("env", "local", true), Ok(true));
        assert!(filter.is_active("env", "local"));
    }

    #[test]
    fn test_unknown_dimension_and_value() {
        let (_, mut filter) = setup();

        assert_eq!(
            filter.set_value("os", "linux", false),
            Err(FilterError::UnknownDimension("os".to_string()))
        );
        assert!(matches!(
            filter.set_value("env", "cloud", true),
            Err(FilterError::UnknownValue { .. })
        ));
    }

    #[test]
    fn test_reset() {
        let (tree, mut filter) = setup();
        filter.set_value("env", "local", false).unwrap();
        filter.set_value("platform", "native", false).unwrap();
        assert_eq!(filter.visible_leaf_count(&tree), 1);

        filter.reset();
        assert_eq!(filter.visible_leaf_count(&tree), 4);
        assert_eq!(filter.allowed("env"), Some(vec!["local", "remote"]));
    }
}
