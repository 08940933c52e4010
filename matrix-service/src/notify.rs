// Change Notifications
// Sink interface the presentation layer implements to re-render after mutations

use crate::tree::NodeId;

/// Receives change notifications from a [`Session`](crate::Session).
///
/// Every method defaults to a no-op so a sink only implements what it
/// renders. Calls happen on the thread that mutated the session.
pub trait ChangeSink: Send + Sync {
    /// A node's own status or remark changed
    fn render_node(&self, _id: &NodeId) {}

    /// Aggregates above a node may have changed
    fn render_ancestors_of(&self, _id: &NodeId) {}

    /// Summary counts may have changed
    fn update_summary(&self) {}

    /// The detail view of a node may be stale
    fn update_detail(&self, _id: &NodeId) {}

    /// The tree shape, result keys or visibility changed; re-render everything
    fn render_tree(&self) {}
}

/// Sink that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ChangeSink for NullSink {}


#[cfg(test)]
mod tests {
    use super::recording::{Notification, RecordingSink};
    use super::*;

    #[test]
    fn test_null_sink_accepts_everything() {
        let sink = NullSink;
        let id = NodeId::from("a.b");
        sink.render_node(&id);
        sink.render_ancestors_of(&id);
        sink.update_summary();
        sink.update_detail(&id);
        sink.render_tree();
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::default();
        sink.render_node(&NodeId::from("a"));
        sink.update_summary();

        assert_eq!(
            sink.take(),
            vec![Notification::Node("a".to_string()), Notification::Summary]
        );
        assert!(sink.take().is_empty());
    }
}
