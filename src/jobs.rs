//! Background job queue.
//!
//! Submissions go into a bounded channel drained by a fixed pool of tokio
//! workers. Each job is tracked in an in-memory registry so the web layer can
//! poll it by id. A dequeued job always runs to completion; a panicking run
//! marks its job failed without taking the worker down.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::QueueSection;
use crate::errors::QueueError;
use crate::results::RunResult;
use crate::selection::RunRequest;

/// Something that can execute a run request.
#[async_trait]
pub trait RunExecutor: Send + Sync {
    async fn execute(&self, request: &RunRequest) -> RunResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Failed,
    Done,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Failed => "failed",
            JobState::Done => "done",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, JobState::Failed | JobState::Done)
    }
}

/// Point-in-time view of a job, as returned by the polling endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub state: JobState,
    pub status: String,
    pub result: Option<RunResult>,
    pub request: RunRequest,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Registry {
    jobs: HashMap<Uuid, JobSnapshot>,
    finished: VecDeque<Uuid>,
    history: usize,
}

impl Registry {
    fn new(history: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            finished: VecDeque::new(),
            history: history.max(1),
        }
    }

    fn insert_pending(&mut self, id: Uuid, request: RunRequest) {
        self.jobs.insert(
            id,
            JobSnapshot {
                id,
                state: JobState::Pending,
                status: "Waiting in the queue.".to_string(),
                result: None,
                request,
                submitted_at: Utc::now(),
                started_at: None,
                finished_at: None,
            },
        );
    }

    fn mark_running(&mut self, id: Uuid) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.state = JobState::Running;
            job.status = "Running planning and development.".to_string();
            job.started_at = Some(Utc::now());
        }
    }

    fn finish(&mut self, id: Uuid, state: JobState, status: String, result: Option<RunResult>) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.state = state;
            job.status = status;
            job.result = result;
            job.finished_at = Some(Utc::now());
        }
        self.finished.push_back(id);
        while self.finished.len() > self.history {
            if let Some(old) = self.finished.pop_front() {
                self.jobs.remove(&old);
            }
        }
    }
}

type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &SharedRegistry) -> MutexGuard<'_, Registry> {
    // Registry updates never leave it half-written, so a poisoned lock is still usable.
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct QueuedJob {
    id: Uuid,
    request: RunRequest,
}

/// Handle for submitting and polling jobs. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<QueuedJob>,
    registry: SharedRegistry,
}

/// The worker tasks behind a [`JobQueue`].
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl JobQueue {
    /// Start `settings.workers` workers draining a queue of `settings.capacity` jobs.
    pub fn start(executor: Arc<dyn RunExecutor>, settings: &QueueSection) -> (Self, WorkerPool) {
        let (sender, receiver) = mpsc::channel::<QueuedJob>(settings.capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let registry: SharedRegistry = Arc::new(Mutex::new(Registry::new(settings.history)));

        let handles = (0..settings.workers.max(1))
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    receiver.clone(),
                    executor.clone(),
                    registry.clone(),
                ))
            })
            .collect();

        tracing::info!(
            workers = settings.workers.max(1),
            capacity = settings.capacity.max(1),
            "job queue started"
        );
        (Self { sender, registry }, WorkerPool { handles })
    }

    /// Submit a run; returns the job id to poll.
    pub fn enqueue(&self, request: RunRequest) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        // Registered first so a worker that dequeues immediately finds the record.
        lock(&self.registry).insert_pending(id, request.clone());

        match self.sender.try_send(QueuedJob { id, request }) {
            Ok(()) => {
                tracing::info!(job = %id, "job enqueued");
                Ok(id)
            }
            Err(err) => {
                lock(&self.registry).jobs.remove(&id);
                Err(match err {
                    mpsc::error::TrySendError::Full(_) => QueueError::Full,
                    mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
                })
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Option<JobSnapshot> {
        lock(&self.registry).jobs.get(&id).cloned()
    }

    /// Known jobs, most recently submitted first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = lock(&self.registry).jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        jobs
    }
}

impl WorkerPool {
    /// Wait for workers to drain the queue, aborting them after `grace`.
    ///
    /// Workers only exit once every `JobQueue` handle has been dropped.
    pub async fn shutdown(self, grace: Duration) {
        let mut handles = self.handles;
        let drained = tokio::time::timeout(grace, async {
            for handle in handles.iter_mut() {
                let _ = handle.await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!("workers still busy after {:?}; aborting", grace);
            for handle in &handles {
                handle.abort();
            }
        }
    }
}

async fn worker_loop(
    worker: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedJob>>>,
    executor: Arc<dyn RunExecutor>,
    registry: SharedRegistry,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(QueuedJob { id, request }) = next else {
            break;
        };

        tracing::info!(worker, job = %id, "job started");
        lock(&registry).mark_running(id);

        let exec = executor.clone();
        let outcome = tokio::spawn(async move { exec.execute(&request).await }).await;

        let (state, status, result) = match outcome {
            Ok(result) if result.is_success() => (JobState::Done, result.summary(), Some(result)),
            Ok(result) => (JobState::Failed, result.summary(), Some(result)),
            Err(err) => (JobState::Failed, format!("Run aborted: {}", err), None),
        };
        tracing::info!(worker, job = %id, state = ?state, "job finished");
        lock(&registry).finish(id, state, status, result);
    }
    tracing::debug!(worker, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Executor whose runs block until a permit is released.
    struct GatedExecutor {
        gate: Semaphore,
        runs: AtomicUsize,
    }

    impl GatedExecutor {
        fn open() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(Semaphore::MAX_PERMITS),
                runs: AtomicUsize::new(0),
            })
        }

        fn closed() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                runs: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RunExecutor for GatedExecutor {
        async fn execute(&self, request: &RunRequest) -> RunResult {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            self.runs.fetch_add(1, Ordering::SeqCst);
            match request.input.as_str() {
                "panic" => panic!("executor blew up"),
                "fail" => RunResult {
                    error: Some("Planning stage failed: nope".into()),
                    ..RunResult::default()
                },
                _ => RunResult {
                    newly_completed_items: vec![request.input.clone()],
                    ..RunResult::default()
                },
            }
        }
    }

    fn settings(workers: usize, capacity: usize, history: usize) -> QueueSection {
        QueueSection {
            workers,
            capacity,
            history,
        }
    }

    fn request(input: &str) -> RunRequest {
        RunRequest::new(input, SelectionMode::Auto)
    }

    async fn wait_for(queue: &JobQueue, id: Uuid, state: JobState) -> JobSnapshot {
        for _ in 0..500 {
            if let Some(job) = queue.get(id)
                && job.state == state
            {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {:?}: {:?}", id, state, queue.get(id));
    }

    #[tokio::test]
    async fn test_job_runs_to_done() {
        let (queue, _workers) = JobQueue::start(GatedExecutor::open(), &settings(1, 4, 10));
        let id = queue.enqueue(request("1")).unwrap();

        let job = wait_for(&queue, id, JobState::Done).await;
        assert_eq!(job.result.unwrap().newly_completed_items, vec!["1"]);
        assert!(job.status.contains("newly completed: 1"));
        assert!(job.started_at.is_some() && job.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_pending_then_running_then_done() {
        let executor = GatedExecutor::closed();
        let (queue, _workers) = JobQueue::start(executor.clone(), &settings(1, 4, 10));

        let first = queue.enqueue(request("a")).unwrap();
        let second = queue.enqueue(request("b")).unwrap();
        wait_for(&queue, first, JobState::Running).await;
        assert_eq!(queue.get(second).unwrap().state, JobState::Pending);

        executor.gate.add_permits(2);
        wait_for(&queue, first, JobState::Done).await;
        wait_for(&queue, second, JobState::Done).await;
    }

    #[tokio::test]
    async fn test_run_error_marks_job_failed() {
        let (queue, _workers) = JobQueue::start(GatedExecutor::open(), &settings(1, 4, 10));
        let id = queue.enqueue(request("fail")).unwrap();

        let job = wait_for(&queue, id, JobState::Failed).await;
        assert_eq!(job.status, "Run failed: Planning stage failed: nope");
        assert!(job.result.unwrap().error.is_some());
    }

    #[tokio::test]
    async fn test_panicking_run_fails_job_but_keeps_worker() {
        let (queue, _workers) = JobQueue::start(GatedExecutor::open(), &settings(1, 4, 10));
        let bad = queue.enqueue(request("panic")).unwrap();
        let job = wait_for(&queue, bad, JobState::Failed).await;
        assert!(job.status.starts_with("Run aborted"));
        assert!(job.result.is_none());

        let good = queue.enqueue(request("ok")).unwrap();
        wait_for(&queue, good, JobState::Done).await;
    }

    #[tokio::test]
    async fn test_full_queue_rejects_submission() {
        let executor = GatedExecutor::closed();
        let (queue, _workers) = JobQueue::start(executor.clone(), &settings(1, 1, 10));

        let running = queue.enqueue(request("a")).unwrap();
        wait_for(&queue, running, JobState::Running).await;
        queue.enqueue(request("b")).unwrap();

        assert_eq!(queue.enqueue(request("c")), Err(QueueError::Full));
        assert_eq!(queue.list().len(), 2);
        executor.gate.add_permits(2);
    }

    #[tokio::test]
    async fn test_finished_jobs_are_pruned_to_history() {
        let (queue, _workers) = JobQueue::start(GatedExecutor::open(), &settings(1, 8, 2));
        let mut ids = Vec::new();
        for n in 0..3 {
            let id = queue.enqueue(request(&n.to_string())).unwrap();
            wait_for(&queue, id, JobState::Done).await;
            ids.push(id);
        }
        assert!(queue.get(ids[0]).is_none());
        assert!(queue.get(ids[1]).is_some());
        assert!(queue.get(ids[2]).is_some());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (queue, _workers) = JobQueue::start(GatedExecutor::open(), &settings(1, 1, 1));
        assert!(queue.get(Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn test_workers_exit_once_handles_are_dropped() {
        let executor = GatedExecutor::open();
        let (queue, workers) = JobQueue::start(executor.clone(), &settings(2, 4, 10));
        queue.enqueue(request("x")).unwrap();
        drop(queue);

        tokio::time::timeout(
            Duration::from_secs(5),
            workers.shutdown(Duration::from_secs(30)),
        )
        .await
        .expect("workers should stop after the queue is dropped");
        assert_eq!(executor.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobState::Running).unwrap(), "\"running\"");
        assert!(JobState::Failed.is_finished());
        assert!(!JobState::Pending.is_finished());
    }
}
