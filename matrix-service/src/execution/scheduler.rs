// Execution Scheduler
// Bounded worker pool draining a FIFO leaf queue with cooperative stop

use crate::error::{ServiceError, ServiceResult};
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::runners::{LeafJob, LeafOutput, LeafTask};
use crate::tree::Status;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Outcome of one scheduler run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Jobs handed to the run
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Jobs dequeued but not executed because they were already skipped
    pub skipped: usize,
    /// Jobs still queued when the workers exited
    pub not_dispatched: usize,
    /// Whether a stop was requested during the run
    pub stopped: bool,
    pub duration: Duration,
}

impl RunReport {
    pub fn executed(&self) -> usize {
        self.passed + self.failed
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Process-wide gate; at most one run is active across every scheduler
static RUN_ACTIVE: AtomicBool = AtomicBool::new(false);

type StopFlag = Arc<AtomicBool>;

#[derive(Debug, Default)]
struct SchedulerShared {
    // Stop flag of the run this scheduler owns, if one is active
    current: StdMutex<Option<StopFlag>>,
}

impl SchedulerShared {
    fn current(&self) -> MutexGuard<'_, Option<StopFlag>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self) {
        *self.current() = None;
        RUN_ACTIVE.store(false, Ordering::Release);
    }
}

/// Cloneable handle to a worker pool.
///
/// Clones share the stop signal of the run they started, so a clone can
/// request a stop while another task awaits the run. Only one run may be
/// active in the process at a time, whichever scheduler started it.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this scheduler has a run in progress
    pub fn is_running(&self) -> bool {
        self.shared.current().is_some()
    }

    /// Whether any scheduler in the process has a run in progress
    pub fn any_running() -> bool {
        RUN_ACTIVE.load(Ordering::Acquire)
    }

    /// Stop dispatching new leaves; tasks already in flight run to completion
    pub fn request_stop(&self) {
        if let Some(stop) = self.shared.current().as_ref() {
            stop.store(true, Ordering::SeqCst);
            info!("stop requested; in-flight leaves will finish");
        }
    }

    /// Start a run over `jobs` in order, with at most `limit` leaves in
    /// flight (`0` = one worker per job).
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`ServiceError::SchedulerBusy`] while any run is active.
    #[instrument(skip_all, fields(jobs = jobs.len(), limit = limit))]
    pub fn start(
        &self,
        jobs: Vec<LeafJob>,
        limit: usize,
        task: Arc<dyn LeafTask>,
        progress: Option<ProgressSender>,
    ) -> ServiceResult<RunHandle> {
        let stop = {
            let mut current = self.shared.current();
            if RUN_ACTIVE
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                warn!("run rejected: another run is active");
                return Err(ServiceError::SchedulerBusy);
            }
            let stop = StopFlag::default();
            *current = Some(Arc::clone(&stop));
            stop
        };

        let total = jobs.len();
        let workers = worker_count(limit, total);
        let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
        let started = Instant::now();

        info!(total, workers, "run started");
        progress.send_event(ExecutionEvent::run_started(total, workers));

        let handles: Vec<JoinHandle<WorkerTally>> = (0..workers)
            .map(|index| {
                let worker = Worker {
                    index,
                    queue: Arc::clone(&queue),
                    task: Arc::clone(&task),
                    stop: Arc::clone(&stop),
                    progress: progress.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        let shared = Arc::clone(&self.shared);
        let supervisor = tokio::spawn(async move {
            let mut tally = WorkerTally::default();
            for handle in handles {
                match handle.await {
                    Ok(worker_tally) => tally.merge(worker_tally),
                    Err(e) => error!(error = %e, "worker exited abnormally"),
                }
            }

            let report = RunReport {
                total,
                passed: tally.passed,
                failed: tally.failed,
                skipped: tally.skipped,
                not_dispatched: queue.lock().await.len(),
                stopped: stop.load(Ordering::SeqCst),
                duration: started.elapsed(),
            };

            shared.finish();

            info!(
                passed = report.passed,
                failed = report.failed,
                not_dispatched = report.not_dispatched,
                stopped = report.stopped,
                "run completed"
            );
            progress.send_event(ExecutionEvent::run_completed(report.clone()));
            report
        });

        Ok(RunHandle {
            supervisor,
            scheduler: self.clone(),
        })
    }
}

/// Awaitable handle of an accepted run
#[derive(Debug)]
pub struct RunHandle {
    supervisor: JoinHandle<RunReport>,
    scheduler: Scheduler,
}

impl RunHandle {
    pub fn request_stop(&self) {
        self.scheduler.request_stop();
    }

    /// Resolve once every worker has exited
    pub async fn wait(self) -> RunReport {
        match self.supervisor.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "run supervisor failed");
                self.scheduler.shared.finish();
                RunReport::default()
            }
        }
    }
}

/// Serializes tests that start runs, since the run gate is process-wide
#[cfg(test)]
pub(crate) async fn exclusive_runs() -> tokio::sync::MutexGuard<'static, ()> {
    static RUNS: Mutex<()> = Mutex::const_new(());
    RUNS.lock().await
}

fn worker_count(limit: usize, queued: usize) -> usize {
    if limit == 0 {
        queued
    } else {
        limit.min(queued)
    }
}

#[derive(Debug, Default)]
struct WorkerTally {
    passed: usize,
    failed: usize,
    skipped: usize,
}

impl WorkerTally {
    fn merge(&mut self, other: WorkerTally) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

struct Worker {
    index: usize,
    queue: Arc<Mutex<VecDeque<LeafJob>>>,
    task: Arc<dyn LeafTask>,
    stop: StopFlag,
    progress: Option<ProgressSender>,
}

impl Worker {
    async fn run(self) -> WorkerTally {
        let mut tally = WorkerTally::default();

        while let Some(job) = self.next_job().await {
            if job.status == Status::Skipped {
                tally.skipped += 1;
                self.progress
                    .send_event(ExecutionEvent::leaf_skipped(&job.id, "leaf is skipped"));
                continue;
            }

            let started_at = Utc::now();
            let clock = Instant::now();
            debug!(worker = self.index, leaf = %job.id, "leaf started");
            self.progress
                .send_event(ExecutionEvent::leaf_started(&job.id, self.index, started_at));

            let output = LeafOutput::new(job.id.clone(), self.progress.clone());
            let mut status = self.task.run(&job, &output).await;
            if !status.is_terminal() {
                warn!(leaf = %job.id, %status, "task returned a non-terminal status; recording fail");
                status = Status::Fail;
            }

            match status {
                Status::Pass => tally.passed += 1,
                _ => tally.failed += 1,
            }
            debug!(worker = self.index, leaf = %job.id, %status, "leaf finished");
            self.progress.send_event(ExecutionEvent::leaf_completed(
                &job.id,
                status,
                started_at,
                Utc::now(),
                clock.elapsed(),
            ));
        }

        tally
    }

    // Dequeue under the queue lock; a raised stop ends dispatch for every worker.
    async fn next_job(&self) -> Option<LeafJob> {
        let mut queue = self.queue.lock().await;
        if self.stop.load(Ordering::SeqCst) {
            debug!(worker = self.index, "stop observed");
            return None;
        }
        queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::events::progress_channel;
    use crate::runners::RunScope;
    use crate::tree::NodeId;

    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{Barrier, Notify};

    fn jobs(n: usize) -> Vec<LeafJob> {
        (0..n)
            .map(|i| LeafJob {
                id: NodeId::from(format!("leaf{}", i).as_str()),
                path: vec![format!("leaf{}", i)],
                scope: RunScope::WholeLeaf,
                status: Status::Untested,
            })
            .collect()
    }

    /// Tracks how many tasks overlap
    #[derive(Default)]
    struct CountingTask {
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl LeafTask for CountingTask {
        async fn run(&self, _job: &LeafJob, _output: &LeafOutput) -> Status {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Status::Pass
        }
    }

    /// First two leaves meet at a barrier, raise the stop, then pass
    struct StopAfterPair {
        barrier: Barrier,
        scheduler: Scheduler,
    }

    #[async_trait::async_trait]
    impl LeafTask for StopAfterPair {
        async fn run(&self, _job: &LeafJob, _output: &LeafOutput) -> Status {
            self.barrier.wait().await;
            self.scheduler.request_stop();
            Status::Pass
        }
    }

    /// Waits for one permit per leaf
    struct Gated(Arc<Notify>);

    #[async_trait::async_trait]
    impl LeafTask for Gated {
        async fn run(&self, _job: &LeafJob, _output: &LeafOutput) -> Status {
            self.0.notified().await;
            Status::Pass
        }
    }

    struct Fixed(Status);

    #[async_trait::async_trait]
    impl LeafTask for Fixed {
        async fn run(&self, _job: &LeafJob, _output: &LeafOutput) -> Status {
            self.0
        }
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(0, 6), 6);
        assert_eq!(worker_count(2, 6), 2);
        assert_eq!(worker_count(10, 3), 3);
        assert_eq!(worker_count(4, 0), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_limit_respected() {
        let _runs = exclusive_runs().await;
        let scheduler = Scheduler::new();
        let task = Arc::new(CountingTask::default());

        let report = scheduler
            .start(jobs(6), 2, task.clone(), None)
            .unwrap()
            .wait()
            .await;

        assert_eq!(report.total, 6);
        assert_eq!(report.passed, 6);
        assert_eq!(report.not_dispatched, 0);
        assert!(!report.stopped);
        assert_eq!(task.calls.load(Ordering::SeqCst), 6);
        assert!(task.peak.load(Ordering::SeqCst) <= 2);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_events_never_exceed_limit() {
        let _runs = exclusive_runs().await;
        let scheduler = Scheduler::new();
        let (tx, mut rx) = progress_channel();

        let handle = scheduler
            .start(jobs(6), 2, Arc::new(CountingTask::default()), Some(tx))
            .unwrap();

        let mut in_flight = 0usize;
        let mut peak = 0usize;
        let mut started = Vec::new();
        let mut completed = 0usize;
        while let Some(event) = rx.recv().await {
            match event {
                ExecutionEvent::LeafStarted { leaf_id, .. } => {
                    in_flight += 1;
                    peak = peak.max(in_flight);
                    started.push(leaf_id.to_string());
                }
                ExecutionEvent::LeafCompleted { status, .. } => {
                    in_flight -= 1;
                    completed += 1;
                    assert!(status.is_terminal());
                }
                _ => {}
            }
        }
        handle.wait().await;

        assert!(peak <= 2);
        assert_eq!(completed, 6);
        started.sort();
        assert_eq!(started, vec!["leaf0", "leaf1", "leaf2", "leaf3", "leaf4", "leaf5"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stop_leaves_rest_undispatched() {
        let _runs = exclusive_runs().await;
        let scheduler = Scheduler::new();
        let task = Arc::new(StopAfterPair {
            barrier: Barrier::new(2),
            scheduler: scheduler.clone(),
        });

        let report = scheduler.start(jobs(6), 2, task, None).unwrap().wait().await;

        assert!(report.stopped);
        assert_eq!(report.passed, 2);
        assert_eq!(report.not_dispatched, 4);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_busy_scheduler_rejects_second_run() {
        let _runs = exclusive_runs().await;
        let scheduler = Scheduler::new();
        let gate = Arc::new(Notify::new());

        let first = scheduler
            .start(jobs(1), 1, Arc::new(Gated(gate.clone())), None)
            .unwrap();
        assert!(scheduler.is_running());

        let second = scheduler.start(jobs(1), 1, Arc::new(Fixed(Status::Pass)), None);
        assert!(matches!(second, Err(ServiceError::SchedulerBusy)));

        gate.notify_one();
        let report = first.wait().await;
        assert_eq!(report.passed, 1);

        // accepted again once idle
        let third = scheduler
            .start(jobs(2), 0, Arc::new(Fixed(Status::Fail)), None)
            .unwrap()
            .wait()
            .await;
        assert_eq!(third.failed, 2);
    }

    #[tokio::test]
    async fn test_skipped_jobs_are_not_executed() {
        let _runs = exclusive_runs().await;
        let scheduler = Scheduler::new();
        let task = Arc::new(CountingTask::default());
        let mut queue = jobs(3);
        queue[1].status = Status::Skipped;

        let report = scheduler.start(queue, 1, task.clone(), None).unwrap().wait().await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.passed, 2);
        assert_eq!(task.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_terminal_status_recorded_as_fail() {
        let _runs = exclusive_runs().await;
        let scheduler = Scheduler::new();
        let report = scheduler
            .start(jobs(2), 1, Arc::new(Fixed(Status::Running)), None)
            .unwrap()
            .wait()
            .await;

        assert_eq!(report.failed, 2);
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_empty_run_completes() {
        let _runs = exclusive_runs().await;
        let scheduler = Scheduler::new();
        let (tx, mut rx) = progress_channel();

        let report = scheduler
            .start(Vec::new(), 3, Arc::new(Fixed(Status::Pass)), Some(tx))
            .unwrap()
            .wait()
            .await;

        assert_eq!(report, RunReport { duration: report.duration, ..Default::default() });
        assert!(matches!(rx.recv().await, Some(ExecutionEvent::RunStarted { workers: 0, .. })));
        assert!(matches!(rx.recv().await, Some(ExecutionEvent::RunCompleted { .. })));
    }

    #[tokio::test]
    async fn test_request_stop_when_idle_is_noop() {
        let _runs = exclusive_runs().await;
        let scheduler = Scheduler::new();
        scheduler.request_stop();
        assert!(!scheduler.is_running());

        // an earlier idle stop does not leak into the next run
        let report = scheduler
            .start(jobs(3), 1, Arc::new(Fixed(Status::Pass)), None)
            .unwrap()
            .wait()
            .await;
        assert!(!report.stopped);
        assert_eq!(report.passed, 3);
    }

    #[tokio::test]
    async fn test_stop_right_after_start_is_kept() {
        let _runs = exclusive_runs().await;
        let scheduler = Scheduler::new();
        let gate = Arc::new(Notify::new());

        let handle = scheduler
            .start(jobs(3), 1, Arc::new(Gated(gate.clone())), None)
            .unwrap();
        handle.request_stop();
        gate.notify_one();

        let report = handle.wait().await;
        assert!(report.stopped);
        assert!(report.passed <= 1);
        assert_eq!(report.passed + report.not_dispatched, 3);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_one_run_per_process() {
        let _runs = exclusive_runs().await;
        let first = Scheduler::new();
        let second = Scheduler::new();
        let gate = Arc::new(Notify::new());

        let handle = first
            .start(jobs(1), 1, Arc::new(Gated(gate.clone())), None)
            .unwrap();
        assert!(Scheduler::any_running());
        assert!(!second.is_running());

        let rejected = second.start(jobs(1), 1, Arc::new(Fixed(Status::Pass)), None);
        assert!(matches!(rejected, Err(ServiceError::SchedulerBusy)));

        // a stop on the idle scheduler does not reach the other run
        second.request_stop();
        gate.notify_one();
        let report = handle.wait().await;
        assert!(!report.stopped);
        assert_eq!(report.passed, 1);
        assert!(!Scheduler::any_running());

        let report = second
            .start(jobs(2), 2, Arc::new(Fixed(Status::Pass)), None)
            .unwrap()
            .wait()
            .await;
        assert_eq!(report.passed, 2);
    }
}
