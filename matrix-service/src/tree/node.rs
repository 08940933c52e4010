// Tree Nodes
// Node ids, internal nodes and leaves of the combination tree

use crate::schema::{ResultKey, ID_SEPARATOR};
use crate::tree::status::{derived_leaf_status, Status};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Id of the synthetic root node
pub const ROOT_ID: &str = "__root__";

/// Label shown for the synthetic root node
pub const ROOT_LABEL: &str = "root";

/// Per-leaf status of every result dimension
pub type ResultMap = BTreeMap<ResultKey, Status>;

/// Identifier derived from a node's value path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Build the id for a value path: the root sentinel for an empty path,
    /// otherwise the values joined by the separator
    pub fn from_path<S: AsRef<str>>(path: &[S]) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        let mut id = String::new();
        for (i, segment) in path.iter().enumerate() {
            if i > 0 {
                id.push(ID_SEPARATOR);
            }
            id.push_str(segment.as_ref());
        }
        Self(id)
    }

    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A node above leaf depth; its status is always derived from its leaves
#[derive(Debug, Clone)]
pub struct InternalNode {
    pub id: NodeId,
    pub path: Vec<String>,
    pub depth: usize,
    pub label: String,
    /// Arena indices of the children, in the dimension's value order
    pub(crate) children: Vec<usize>,
}

/// One concrete combination of dimension values
#[derive(Debug, Clone)]
pub struct Leaf {
    pub id: NodeId,
    pub path: Vec<String>,
    pub depth: usize,
    pub label: String,
    pub results: ResultMap,
    pub remark: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub log: Vec<String>,
}

impl Leaf {
    pub(crate) fn new(path: Vec<String>, keys: &[ResultKey]) -> Self {
        let label = path.last().cloned().unwrap_or_else(|| ROOT_LABEL.to_string());
        Self {
            id: NodeId::from_path(&path),
            depth: path.len(),
            path,
            label,
            results: keys.iter().map(|k| (k.clone(), Status::Untested)).collect(),
            remark: String::new(),
            started_at: None,
            finished_at: None,
            log: Vec::new(),
        }
    }

    /// Status derived from every result key
    pub fn status(&self) -> Status {
        derived_leaf_status(self)
    }

    /// Status of one result key
    pub fn result(&self, key: &str) -> Option<Status> {
        self.results.get(key).copied()
    }

    /// Set every result key to `status`
    pub fn set_all(&mut self, status: Status) {
        for value in self.results.values_mut() {
            *value = status;
        }
    }

    /// Set one result key; returns false if the key is not carried by this leaf
    pub fn set_result(&mut self, key: &str, status: Status) -> bool {
        match self.results.get_mut(key) {
            Some(value) => {
                *value = status;
                true
            }
            None => false,
        }
    }

    /// Clear run bookkeeping (timestamps and captured log)
    pub fn clear_run_state(&mut self) {
        self.started_at = None;
        self.finished_at = None;
        self.log.clear();
    }

    /// Match the result map to a new key set: stale keys are dropped,
    /// new keys start untested, retained keys keep their status
    pub fn reshape(&mut self, keys: &[ResultKey]) {
        let mut reshaped = ResultMap::new();
        for key in keys {
            let status = self.results.get(key).copied().unwrap_or_default();
            reshaped.insert(key.clone(), status);
        }
        self.results = reshaped;
    }
}

/// A node of the combination tree
#[derive(Debug, Clone)]
pub enum Node {
    Internal(InternalNode),
    Leaf(Leaf),
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::Internal(node) => &node.id,
            Node::Leaf(leaf) => &leaf.id,
        }
    }

    pub fn path(&self) -> &[String] {
        match self {
            Node::Internal(node) => &node.path,
            Node::Leaf(leaf) => &leaf.path,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Node::Internal(node) => node.depth,
            Node::Leaf(leaf) => leaf.depth,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Node::Internal(node) => &node.label,
            Node::Leaf(leaf) => &leaf.label,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Internal(_) => None,
        }
    }

    pub(crate) fn as_leaf_mut(&mut self) -> Option<&mut Leaf> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Internal(_) => None,
        }
    }
}
