// Combination Tree Module
// Arena-backed tree of dimension-value prefixes with O(1) id lookup

pub mod builder;
pub mod node;
pub mod status;

pub use builder::TreeBuilder;
pub use node::{InternalNode, Leaf, Node, NodeId, ResultMap, ROOT_ID, ROOT_LABEL};
pub use status::{
    aggregate, aggregate_one_result, aggregate_status, derived_leaf_status, NodeCounts, Status,
    SummaryCounts,
};

use crate::schema::ResultKey;

use std::collections::HashMap;

/// The combination tree for one schema.
///
/// Nodes live in a flat arena owned by the tree; internal nodes reference
/// their children by arena index and the id index maps ids to slots. The
/// shape is fixed once built: any dimension change requires a new tree.
#[derive(Debug, Clone)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) index: HashMap<NodeId, usize>,
    pub(crate) leaves: Vec<usize>,
    pub(crate) root: usize,
    pub(crate) depth: usize,
    pub(crate) result_keys: Vec<ResultKey>,
}

impl Tree {
    pub fn root(&self) -> &Node {
        &self.nodes[self.root]
    }

    pub fn root_id(&self) -> &NodeId {
        self.root().id()
    }

    /// Number of dimensions (depth of every leaf)
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Result keys carried by every leaf
    pub fn result_keys(&self) -> &[ResultKey] {
        &self.result_keys
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&slot| &self.nodes[slot])
    }

    pub fn leaf(&self, id: &str) -> Option<&Leaf> {
        self.node(id).and_then(Node::as_leaf)
    }

    pub fn leaf_mut(&mut self, id: &str) -> Option<&mut Leaf> {
        let slot = *self.index.get(id)?;
        self.nodes[slot].as_leaf_mut()
    }

    /// All nodes in construction (pre-order) order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// All leaves in construction (lexicographic-by-path) order
    pub fn leaves(&self) -> impl Iterator<Item = &Leaf> {
        self.leaves
            .iter()
            .filter_map(move |&slot| self.nodes[slot].as_leaf())
    }

    pub(crate) fn leaves_mut(&mut self) -> impl Iterator<Item = &mut Leaf> {
        self.nodes.iter_mut().filter_map(Node::as_leaf_mut)
    }

    /// Direct children of a node in value order (empty for leaves and unknown ids)
    pub fn children(&self, id: &str) -> impl Iterator<Item = &Node> {
        let slots: &[usize] = match self.node(id) {
            Some(Node::Internal(node)) => &node.children,
            _ => &[],
        };
        slots.iter().map(move |&slot| &self.nodes[slot])
    }

    /// Every leaf below (or equal to) a node, found by a full subtree walk
    pub fn leaves_under(&self, id: &str) -> Option<Vec<&Leaf>> {
        let start = *self.index.get(id)?;
        Some(
            self.leaf_slots_under(start)
                .into_iter()
                .filter_map(|slot| self.nodes[slot].as_leaf())
                .collect(),
        )
    }

    /// Ids of every leaf below (or equal to) a node
    pub fn leaf_ids_under(&self, id: &str) -> Option<Vec<NodeId>> {
        self.leaves_under(id)
            .map(|leaves| leaves.into_iter().map(|leaf| leaf.id.clone()).collect())
    }

    /// Ids of a node's ancestors from depth 1 downwards, followed by the root
    pub fn ancestors_of(&self, id: &str) -> Option<Vec<NodeId>> {
        let node = self.node(id)?;
        let path = node.path();
        let mut ancestors: Vec<NodeId> = (1..path.len())
            .map(|depth| NodeId::from_path(&path[..depth]))
            .collect();
        if !node.id().is_root() {
            ancestors.push(self.root_id().clone());
        }
        Some(ancestors)
    }

    /// Match every leaf's result map to a new key set
    pub(crate) fn reshape(&mut self, keys: Vec<ResultKey>) {
        for leaf in self.leaves_mut() {
            leaf.reshape(&keys);
        }
        self.result_keys = keys;
    }

    // Explicit-stack pre-order walk; yields leaf slots in path order.
    fn leaf_slots_under(&self, start: usize) -> Vec<usize> {
        let mut found = Vec::new();
        let mut stack = vec![start];
        while let Some(slot) = stack.pop() {
            match &self.nodes[slot] {
                Node::Leaf(_) => found.push(slot),
                Node::Internal(node) => stack.extend(node.children.iter().rev()),
            }
        }
        found
    }
}
