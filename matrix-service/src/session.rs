// Matrix Session
// Owns the schema, tree, filter and scheduler; the single writer of leaf state

use crate::error::{ServiceError, ServiceResult};
use crate::execution::{progress_channel, EventSender, ExecutionEvent, ProgressSender, RunReport, Scheduler};
use crate::filter::{FilterError, VisibilityFilter};
use crate::notify::{ChangeSink, NullSink};
use crate::report::MatrixSnapshot;
use crate::runners::{LeafJob, LeafTask, RunScope};
use crate::schema::{validate_result_dimensions, DimensionSchema, MatrixConfig, ResultDimension, ResultKey};
use crate::tree::{
    aggregate_one_result, aggregate_status, Leaf, Node, NodeCounts, NodeId, ResultMap, Status,
    SummaryCounts, Tree, TreeBuilder,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

const DEFAULT_NAME: &str = "matrix";

/// Everything the detail view shows for one leaf
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafDetail {
    pub id: NodeId,
    /// Path labels joined with ` › `
    pub breadcrumb: String,
    /// (dimension name, value) pairs in depth order
    pub meta: Vec<(String, String)>,
    pub status: Status,
    pub results: ResultMap,
    pub remark: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub log: Vec<String>,
}

/// Context object for one matrix.
///
/// All leaf mutations go through the session. During a run, workers only
/// emit events; the session applies them to the tree in arrival order and
/// forwards them to the optional progress sender.
pub struct Session {
    name: String,
    schema: DimensionSchema,
    tree: Tree,
    filter: VisibilityFilter,
    scheduler: Scheduler,
    sink: Arc<dyn ChangeSink>,
    progress: Option<ProgressSender>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("leaves", &self.tree.leaf_count())
            .field("running", &self.scheduler.is_running())
            .finish()
    }
}

impl Session {
    pub fn new(schema: DimensionSchema) -> ServiceResult<Self> {
        let tree = TreeBuilder::build(&schema)?;
        let filter = VisibilityFilter::new(&schema);
        Ok(Self {
            name: DEFAULT_NAME.to_string(),
            schema,
            tree,
            filter,
            scheduler: Scheduler::new(),
            sink: Arc::new(NullSink),
            progress: None,
        })
    }

    pub fn from_config(config: &MatrixConfig) -> ServiceResult<Self> {
        let session = Self::new(config.schema.clone())?;
        Ok(match &config.name {
            Some(name) => session.with_name(name.clone()),
            None => session,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Forward every execution event to `progress` after it is applied
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &DimensionSchema {
        &self.schema
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn filter(&self) -> &VisibilityFilter {
        &self.filter
    }

    /// Stop/busy handle; clone it before a run to stop that run from elsewhere
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn request_stop(&self) {
        self.scheduler.request_stop();
    }

    /// Replace the schema.
    ///
    /// Changing dimensions rebuilds the tree from scratch, discarding
    /// results and resetting the filter. Changing only result dimensions
    /// reshapes the existing leaves. On error nothing changes.
    #[instrument(skip_all, fields(matrix = %self.name))]
    pub fn rebuild(&mut self, schema: DimensionSchema) -> ServiceResult<()> {
        if self.schema.same_structure(&schema) {
            validate_result_dimensions(&schema.result_dimensions)?;
            self.tree.reshape(schema.result_keys());
            self.schema = schema;
            debug!(keys = self.tree.result_keys().len(), "result dimensions reshaped");
        } else {
            let tree = TreeBuilder::build(&schema)?;
            self.filter = VisibilityFilter::new(&schema);
            self.tree = tree;
            self.schema = schema;
            info!(leaves = self.tree.leaf_count(), "tree rebuilt");
        }

        self.sink.render_tree();
        self.sink.update_summary();
        Ok(())
    }

    /// Replace the result dimensions, keeping statuses of retained keys
    pub fn set_result_dimensions(&mut self, result_dimensions: Vec<ResultDimension>) -> ServiceResult<()> {
        let schema = self.schema.clone().with_result_dimensions(result_dimensions);
        self.rebuild(schema)
    }

    /// Set every result of every leaf under `node_id` to `status`
    pub fn mark_status(&mut self, node_id: &str, status: Status) -> ServiceResult<()> {
        ensure_manual(status)?;
        let id = self.edit_subtree(node_id, |leaf| leaf.set_all(status))?;
        debug!(node = %id, %status, "subtree marked");
        self.notify_changed(&id);
        Ok(())
    }

    /// Set one result key of one leaf
    pub fn mark_one_result(&mut self, leaf_id: &str, key: &str, status: Status) -> ServiceResult<()> {
        ensure_manual(status)?;
        let key = self.result_key(key)?;
        let leaf = self.leaf_mut(leaf_id)?;
        leaf.set_result(key.as_str(), status);
        let id = leaf.id.clone();
        self.notify_changed(&id);
        Ok(())
    }

    pub fn skip_subtree(&mut self, node_id: &str) -> ServiceResult<()> {
        self.mark_status(node_id, Status::Skipped)
    }

    /// Return a subtree to untested, clearing timestamps and captured logs
    pub fn reset_subtree(&mut self, node_id: &str) -> ServiceResult<()> {
        let id = self.edit_subtree(node_id, |leaf| {
            leaf.set_all(Status::Untested);
            leaf.clear_run_state();
        })?;
        self.notify_changed(&id);
        Ok(())
    }

    pub fn set_remark(&mut self, leaf_id: &str, text: impl Into<String>) -> ServiceResult<()> {
        let leaf = self.leaf_mut(leaf_id)?;
        leaf.remark = text.into();
        let id = leaf.id.clone();
        self.sink.render_node(&id);
        self.sink.update_detail(&id);
        Ok(())
    }

    /// Include or exclude one dimension value.
    ///
    /// Returns whether visibility changed. Deselecting the last selected
    /// value of a dimension is ignored.
    pub fn set_filter_value(&mut self, dimension: &str, value: &str, included: bool) -> ServiceResult<bool> {
        match self.filter.set_value(dimension, value, included) {
            Ok(true) => {
                self.sink.render_tree();
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(FilterError::LastValue { dimension, value }) => {
                debug!(%dimension, %value, "refusing to deselect last value");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.filter.is_visible(&self.tree, id)
    }

    /// Run every non-skipped leaf under `node_id`, all result keys
    pub async fn run_subtree(
        &mut self,
        node_id: &str,
        limit: usize,
        task: Arc<dyn LeafTask>,
    ) -> ServiceResult<Option<RunReport>> {
        let leaves = self
            .tree
            .leaves_under(node_id)
            .ok_or_else(|| ServiceError::UnknownNode(node_id.to_string()))?;
        let jobs = queue_jobs(leaves, RunScope::WholeLeaf);
        self.run_jobs(jobs, limit, task).await
    }

    /// Run an explicit list of leaves, in the given order
    pub async fn run_selected<I, S>(
        &mut self,
        leaf_ids: I,
        limit: usize,
        task: Arc<dyn LeafTask>,
    ) -> ServiceResult<Option<RunReport>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut leaves = Vec::new();
        for id in leaf_ids {
            let leaf = self.leaf(id.as_ref())?;
            if seen.insert(leaf.id.clone()) {
                leaves.push(leaf);
            }
        }
        let jobs = queue_jobs(leaves, RunScope::WholeLeaf);
        self.run_jobs(jobs, limit, task).await
    }

    /// Run one result key for every leaf under `node_id` where it is not skipped
    pub async fn run_result(
        &mut self,
        node_id: &str,
        key: &str,
        limit: usize,
        task: Arc<dyn LeafTask>,
    ) -> ServiceResult<Option<RunReport>> {
        let key = self.result_key(key)?;
        let leaves = self
            .tree
            .leaves_under(node_id)
            .ok_or_else(|| ServiceError::UnknownNode(node_id.to_string()))?;
        let jobs = queue_jobs(leaves, RunScope::Result(key));
        self.run_jobs(jobs, limit, task).await
    }

    #[instrument(skip_all, fields(matrix = %self.name, jobs = jobs.len()))]
    async fn run_jobs(
        &mut self,
        jobs: Vec<LeafJob>,
        limit: usize,
        task: Arc<dyn LeafTask>,
    ) -> ServiceResult<Option<RunReport>> {
        let scopes: HashMap<NodeId, RunScope> = jobs
            .iter()
            .map(|job| (job.id.clone(), job.scope.clone()))
            .collect();

        let (tx, mut rx) = progress_channel();
        let handle = match self.scheduler.start(jobs, limit, task, Some(tx)) {
            Ok(handle) => handle,
            Err(ServiceError::SchedulerBusy) => {
                debug!("run ignored: another run is active");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        // Ends once the supervisor and every worker dropped their senders.
        while let Some(event) = rx.recv().await {
            self.apply_event(&scopes, &event);
            self.progress.send_event(event);
        }

        let report = handle.wait().await;
        self.sink.update_summary();
        Ok(Some(report))
    }

    fn apply_event(&mut self, scopes: &HashMap<NodeId, RunScope>, event: &ExecutionEvent) {
        let Some(id) = event.leaf_id() else {
            return;
        };
        let (Some(scope), Some(leaf)) = (scopes.get(id), self.tree.leaf_mut(id.as_str())) else {
            warn!(leaf = %id, "event for a leaf outside the current run");
            return;
        };

        match event {
            ExecutionEvent::LeafStarted { started_at, .. } => {
                scope.apply(leaf, Status::Running);
                leaf.started_at = Some(*started_at);
                leaf.finished_at = None;
                leaf.log.clear();
            }
            ExecutionEvent::LeafOutput { line, .. } => {
                leaf.log.push(line.clone());
                self.sink.update_detail(id);
                return;
            }
            ExecutionEvent::LeafCompleted {
                status,
                finished_at,
                ..
            } => {
                scope.apply(leaf, *status);
                leaf.finished_at = Some(*finished_at);
            }
            ExecutionEvent::LeafSkipped { .. }
            | ExecutionEvent::RunStarted { .. }
            | ExecutionEvent::RunCompleted { .. } => return,
        }

        self.notify_changed(id);
    }

    pub fn aggregate_status(&self, id: &str) -> Option<Status> {
        aggregate_status(&self.tree, id)
    }

    pub fn aggregate_one_result(&self, id: &str, key: &str) -> Option<Status> {
        aggregate_one_result(&self.tree, id, key)
    }

    pub fn summary(&self) -> SummaryCounts {
        SummaryCounts::from_leaves(self.tree.leaves())
    }

    pub fn node_counts(&self, id: &str) -> Option<NodeCounts> {
        self.tree.leaves_under(id).map(NodeCounts::from_leaves)
    }

    pub fn detail(&self, leaf_id: &str) -> ServiceResult<LeafDetail> {
        let leaf = self.leaf(leaf_id)?;
        let meta = self
            .schema
            .dimensions
            .iter()
            .zip(&leaf.path)
            .map(|(dimension, value)| (dimension.name.clone(), value.clone()))
            .collect();

        Ok(LeafDetail {
            id: leaf.id.clone(),
            breadcrumb: leaf.path.join(" › "),
            meta,
            status: leaf.status(),
            results: leaf.results.clone(),
            remark: leaf.remark.clone(),
            started_at: leaf.started_at,
            finished_at: leaf.finished_at,
            log: leaf.log.clone(),
        })
    }

    pub fn snapshot(&self) -> MatrixSnapshot {
        MatrixSnapshot::capture(self)
    }

    fn leaf(&self, id: &str) -> ServiceResult<&Leaf> {
        match self.tree.node(id) {
            Some(Node::Leaf(leaf)) => Ok(leaf),
            Some(Node::Internal(_)) => Err(ServiceError::NotALeaf(id.to_string())),
            None => Err(ServiceError::UnknownNode(id.to_string())),
        }
    }

    fn leaf_mut(&mut self, id: &str) -> ServiceResult<&mut Leaf> {
        self.leaf(id)?;
        self.tree
            .leaf_mut(id)
            .ok_or_else(|| ServiceError::UnknownNode(id.to_string()))
    }

    fn result_key(&self, key: &str) -> ServiceResult<ResultKey> {
        self.tree
            .result_keys()
            .iter()
            .find(|k| k.as_str() == key)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownResultKey(key.to_string()))
    }

    fn edit_subtree(&mut self, node_id: &str, mut edit: impl FnMut(&mut Leaf)) -> ServiceResult<NodeId> {
        let ids = self
            .tree
            .leaf_ids_under(node_id)
            .ok_or_else(|| ServiceError::UnknownNode(node_id.to_string()))?;
        for id in &ids {
            if let Some(leaf) = self.tree.leaf_mut(id.as_str()) {
                edit(leaf);
            }
        }
        Ok(NodeId::from(node_id))
    }

    fn notify_changed(&self, id: &NodeId) {
        self.sink.render_node(id);
        self.sink.render_ancestors_of(id);
        self.sink.update_detail(id);
        self.sink.update_summary();
    }
}

fn ensure_manual(status: Status) -> ServiceResult<()> {
    if status.is_manual() {
        Ok(())
    } else {
        Err(ServiceError::InvalidManualStatus(status))
    }
}

fn queue_jobs<'a>(leaves: impl IntoIterator<Item = &'a Leaf>, scope: RunScope) -> Vec<LeafJob> {
    leaves
        .into_iter()
        .map(|leaf| LeafJob::from_leaf(leaf, scope.clone()))
        .filter(|job| job.status != Status::Skipped)
        .collect()
}
