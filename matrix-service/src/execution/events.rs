// Execution Events
// Progress reporting and event types for scheduler runs

use crate::execution::scheduler::RunReport;
use crate::tree::{NodeId, Status};

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted during a scheduler run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Run accepted and workers about to start
    RunStarted { total_leaves: usize, workers: usize },

    /// A worker dequeued a leaf and is about to invoke the task
    LeafStarted {
        leaf_id: NodeId,
        worker: usize,
        started_at: DateTime<Utc>,
    },

    /// Log line streamed by a leaf task
    LeafOutput { leaf_id: NodeId, line: String },

    /// Leaf task finished with a terminal status
    LeafCompleted {
        leaf_id: NodeId,
        status: Status,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        duration: Duration,
    },

    /// Leaf was dequeued but not executed
    LeafSkipped { leaf_id: NodeId, reason: String },

    /// All workers exited
    RunCompleted { report: RunReport },
}

impl ExecutionEvent {
    pub fn run_started(total_leaves: usize, workers: usize) -> Self {
        Self::RunStarted {
            total_leaves,
            workers,
        }
    }

    pub fn leaf_started(leaf_id: &NodeId, worker: usize, started_at: DateTime<Utc>) -> Self {
        Self::LeafStarted {
            leaf_id: leaf_id.clone(),
            worker,
            started_at,
        }
    }

    pub fn leaf_output(leaf_id: &NodeId, line: impl Into<String>) -> Self {
        Self::LeafOutput {
            leaf_id: leaf_id.clone(),
            line: line.into(),
        }
    }

    pub fn leaf_completed(
        leaf_id: &NodeId,
        status: Status,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self::LeafCompleted {
            leaf_id: leaf_id.clone(),
            status,
            started_at,
            finished_at,
            duration,
        }
    }

    pub fn leaf_skipped(leaf_id: &NodeId, reason: impl Into<String>) -> Self {
        Self::LeafSkipped {
            leaf_id: leaf_id.clone(),
            reason: reason.into(),
        }
    }

    pub fn run_completed(report: RunReport) -> Self {
        Self::RunCompleted { report }
    }

    /// Leaf this event concerns, if any
    pub fn leaf_id(&self) -> Option<&NodeId> {
        match self {
            Self::LeafStarted { leaf_id, .. }
            | Self::LeafOutput { leaf_id, .. }
            | Self::LeafCompleted { leaf_id, .. }
            | Self::LeafSkipped { leaf_id, .. } => Some(leaf_id),
            Self::RunStarted { .. } | Self::RunCompleted { .. } => None,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}
