// Combination Tree Builder
// Expands a dimension schema into the full cartesian-product tree

use crate::schema::{DimensionSchema, ResultKey, SchemaError};
use crate::tree::node::{InternalNode, Leaf, Node, NodeId, ROOT_LABEL};
use crate::tree::Tree;

use std::collections::HashMap;

use tracing::debug;

/// Builds a [`Tree`] from a validated schema
pub struct TreeBuilder<'a> {
    schema: &'a DimensionSchema,
    result_keys: Vec<ResultKey>,
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    leaves: Vec<usize>,
}

impl<'a> TreeBuilder<'a> {
    /// Validate the schema and expand every path depth-first, in dimension
    /// and value order
    pub fn build(schema: &'a DimensionSchema) -> Result<Tree, SchemaError> {
        schema.validate()?;

        let mut builder = Self {
            schema,
            result_keys: schema.result_keys(),
            nodes: Vec::with_capacity(Self::node_count(schema)),
            index: HashMap::new(),
            leaves: Vec::with_capacity(schema.leaf_count()),
        };

        let root = builder.expand(Vec::new())?;

        debug!(
            nodes = builder.nodes.len(),
            leaves = builder.leaves.len(),
            depth = schema.depth(),
            "built combination tree"
        );

        Ok(Tree {
            nodes: builder.nodes,
            index: builder.index,
            leaves: builder.leaves,
            root,
            depth: schema.depth(),
            result_keys: builder.result_keys,
        })
    }

    /// Total nodes across all levels (1 + n1 + n1*n2 + ...)
    fn node_count(schema: &DimensionSchema) -> usize {
        let mut level = 1usize;
        let mut total = 1usize;
        for dimension in &schema.dimensions {
            level = level.saturating_mul(dimension.values.len());
            total = total.saturating_add(level);
        }
        total
    }

    fn expand(&mut self, path: Vec<String>) -> Result<usize, SchemaError> {
        let depth = path.len();

        if depth == self.schema.depth() {
            let leaf = Leaf::new(path, &self.result_keys);
            let slot = self.insert(Node::Leaf(leaf))?;
            self.leaves.push(slot);
            return Ok(slot);
        }

        let label = path.last().cloned().unwrap_or_else(|| ROOT_LABEL.to_string());
        let slot = self.insert(Node::Internal(InternalNode {
            id: NodeId::from_path(&path),
            path: path.clone(),
            depth,
            label,
            children: Vec::new(),
        }))?;

        let schema = self.schema;
        let values = &schema.dimensions[depth].values;
        let mut children = Vec::with_capacity(values.len());
        for value in values {
            let mut child_path = path.clone();
            child_path.push(value.clone());
            children.push(self.expand(child_path)?);
        }

        if let Node::Internal(node) = &mut self.nodes[slot] {
            node.children = children;
        }

        Ok(slot)
    }

    fn insert(&mut self, node: Node) -> Result<usize, SchemaError> {
        let slot = self.nodes.len();
        let id = node.id().clone();
        if self.index.contains_key(&id) {
            return Err(SchemaError::id_collision(id.as_str()));
        }
        self.index.insert(id, slot);
        self.nodes.push(node);
        Ok(slot)
    }
}
