// Runners Module
// Pluggable leaf tasks executed by the scheduler

pub mod simulated;

pub use simulated::SimulatedRunner;

use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::schema::ResultKey;
use crate::tree::{Leaf, NodeId, Status};

/// What a run updates on each leaf
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunScope {
    /// Every result key of the leaf
    #[default]
    WholeLeaf,
    /// A single result dimension
    Result(ResultKey),
}

impl RunScope {
    /// Current status of a leaf as seen by this scope
    pub fn status_of(&self, leaf: &Leaf) -> Status {
        match self {
            RunScope::WholeLeaf => leaf.status(),
            RunScope::Result(key) => leaf.result(key.as_str()).unwrap_or_default(),
        }
    }

    /// Apply a status to a leaf within this scope
    pub fn apply(&self, leaf: &mut Leaf, status: Status) {
        match self {
            RunScope::WholeLeaf => leaf.set_all(status),
            RunScope::Result(key) => {
                leaf.set_result(key.as_str(), status);
            }
        }
    }
}

/// A leaf queued for execution
#[derive(Debug, Clone)]
pub struct LeafJob {
    pub id: NodeId,
    pub path: Vec<String>,
    pub scope: RunScope,
    /// Status within the scope when the job was queued
    pub status: Status,
}

impl LeafJob {
    pub fn from_leaf(leaf: &Leaf, scope: RunScope) -> Self {
        Self {
            id: leaf.id.clone(),
            path: leaf.path.clone(),
            status: scope.status_of(leaf),
            scope,
        }
    }
}

/// Log line sink handed to a task while it runs
#[derive(Debug, Clone)]
pub struct LeafOutput {
    leaf_id: NodeId,
    progress: Option<ProgressSender>,
}

impl LeafOutput {
    pub fn new(leaf_id: NodeId, progress: Option<ProgressSender>) -> Self {
        Self { leaf_id, progress }
    }

    pub fn leaf_id(&self) -> &NodeId {
        &self.leaf_id
    }

    /// Stream one log line for this leaf
    pub fn line(&self, text: impl Into<String>) {
        self.progress
            .send_event(ExecutionEvent::leaf_output(&self.leaf_id, text));
    }
}

/// Executes one leaf and reports its terminal status.
///
/// Implementations must resolve to [`Status::Pass`] or [`Status::Fail`];
/// any underlying fault is mapped to `Fail` by the task itself. Other
/// statuses are recorded as `Fail` by the scheduler.
#[async_trait::async_trait]
pub trait LeafTask: Send + Sync {
    async fn run(&self, job: &LeafJob, output: &LeafOutput) -> Status;
}
