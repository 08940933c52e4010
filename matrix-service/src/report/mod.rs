// Report Module
// Export model of a session and the formats it is rendered to

pub mod reporter;

pub use reporter::{ReportFormat, Reporter};

use crate::schema::{Dimension, ResultDimension};
use crate::session::Session;
use crate::tree::{NodeId, ResultMap, Status, SummaryCounts};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time export of a whole matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSnapshot {
    pub name: String,
    pub generated_at: DateTime<Utc>,
    pub dimensions: Vec<Dimension>,
    pub result_dimensions: Vec<ResultDimension>,
    pub summary: SummaryCounts,
    pub leaves: Vec<LeafSnapshot>,
}

/// Exported state of one leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafSnapshot {
    pub id: NodeId,
    pub path: Vec<String>,
    pub status: Status,
    pub results: ResultMap,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remark: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl MatrixSnapshot {
    pub fn capture(session: &Session) -> Self {
        let leaves = session
            .tree()
            .leaves()
            .map(|leaf| LeafSnapshot {
                id: leaf.id.clone(),
                path: leaf.path.clone(),
                status: leaf.status(),
                results: leaf.results.clone(),
                remark: leaf.remark.clone(),
                started_at: leaf.started_at,
                finished_at: leaf.finished_at,
            })
            .collect();

        Self {
            name: session.name().to_string(),
            generated_at: Utc::now(),
            dimensions: session.schema().dimensions.clone(),
            result_dimensions: session.schema().result_dimensions.clone(),
            summary: session.summary(),
            leaves,
        }
    }
}

impl LeafSnapshot {
    /// Wall time between start and finish, when both are recorded
    pub fn duration_secs(&self) -> f64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as f64 / 1000.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DimensionSchema;

    fn session() -> Session {
        let schema = DimensionSchema::new(vec![
            Dimension::new("Env", "env", ["local", "remote"]),
            Dimension::new("Platform", "platform", ["native", "docker"]),
        ]);
        Session::new(schema).unwrap().with_name("api")
    }

    #[test]
    fn test_capture() {
        let mut session = session();
        session.mark_status("local.docker", Status::Fail).unwrap();
        session.set_remark("local.docker", "timeout").unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.name, "api");
        assert_eq!(snapshot.leaves.len(), 4);
        assert_eq!(snapshot.summary.fail, 1);

        let leaf = &snapshot.leaves[1];
        assert_eq!(leaf.id.as_str(), "local.docker");
        assert_eq!(leaf.status, Status::Fail);
        assert_eq!(leaf.remark, "timeout");
        assert_eq!(leaf.duration_secs(), 0.0);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = session().snapshot();
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["name"], "api");
        assert_eq!(value["leaves"][0]["id"], "local.native");
        assert_eq!(value["leaves"][0]["results"]["result"], "untested");
        assert!(value["leaves"][0].get("remark").is_none());
        assert_eq!(value["summary"]["total"], 4);

        let back: MatrixSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
    }
}
