//! Admission queue and worker pool
//!
//! A bounded FIFO of jobs drained by a fixed number of workers. Admission
//! waits at most a caller-supplied timeout for a free slot and otherwise
//! fails with [`QueueError::Busy`]; nothing is buffered beyond the capacity.
//!
//! Each worker runs one job at a time under a per-job deadline. When the
//! root token is cancelled, workers stop taking jobs and abandon the one in
//! flight. Jobs are never retried or persisted.

pub mod admission;

pub use admission::QueueAdmission;

use crate::config::QueueConfig;
use crate::orchestrator::{Orchestrator, PipelineError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sdk::errors::EngineError;
use sdk::types::{QueueStats, SiteRequest};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue_full_or_slow")]
    Busy,

    #[error("queue closed")]
    Closed,
}

impl From<QueueError> for EngineError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Busy => EngineError::QueueBusy,
            QueueError::Closed => EngineError::QueueClosed,
        }
    }
}

/// One admitted submission
#[derive(Debug, Clone)]
pub struct Job {
    id: Uuid,
    request: SiteRequest,
    admitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(request: SiteRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            admitted_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &SiteRequest {
        &self.request
    }

    pub fn admitted_at(&self) -> DateTime<Utc> {
        self.admitted_at
    }
}

/// Work a worker performs for each job
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job, cancel: &CancellationToken) -> Result<(), PipelineError>;
}

#[async_trait]
impl JobHandler for Orchestrator {
    async fn handle(&self, job: &Job, cancel: &CancellationToken) -> Result<(), PipelineError> {
        self.run(job.request(), cancel).await.map(|_| ())
    }
}

/// Bounded job queue shared by the ingress and the worker pool
pub struct JobQueue {
    sender: mpsc::Sender<Job>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    capacity: usize,
    workers: usize,
    job_deadline: Duration,
}

impl JobQueue {
    pub fn new(capacity: usize, workers: usize, job_deadline: Duration) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            capacity,
            workers: workers.max(1),
            job_deadline,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.capacity, config.workers, config.job_deadline())
    }

    /// Hand `job` to the queue, waiting at most `timeout` for a free slot
    pub async fn try_enqueue(&self, job: Job, timeout: Duration) -> Result<(), QueueError> {
        match self.sender.send_timeout(job, timeout).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendTimeoutError::Timeout(job)) => {
                tracing::warn!(job_id = %job.id, task = %job.request.task, "Queue busy, rejecting job");
                Err(QueueError::Busy)
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Take the oldest job, waiting until one arrives
    pub async fn dequeue(&self) -> Option<Job> {
        self.receiver.lock().await.recv().await
    }

    /// Jobs admitted but not yet picked up
    pub fn len(&self) -> usize {
        self.capacity.saturating_sub(self.sender.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            capacity: self.capacity,
            len: self.len(),
            workers: self.workers,
        }
    }

    /// Spawn the worker pool; workers exit once `root` is cancelled
    pub fn start(
        self: &Arc<Self>,
        root: CancellationToken,
        handler: Arc<dyn JobHandler>,
    ) -> Vec<JoinHandle<()>> {
        tracing::info!(
            workers = self.workers,
            capacity = self.capacity,
            deadline_secs = self.job_deadline.as_secs(),
            "Starting worker pool"
        );

        (0..self.workers)
            .map(|worker| {
                let queue = Arc::clone(self);
                let root = root.clone();
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { queue.work(worker, root, handler).await })
            })
            .collect()
    }

    async fn work(&self, worker: usize, root: CancellationToken, handler: Arc<dyn JobHandler>) {
        loop {
            let job = tokio::select! {
                biased;
                _ = root.cancelled() => break,
                job = self.dequeue() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let span = tracing::info_span!(
                "job",
                job_id = %job.id,
                task = %job.request.task,
                round = %job.request.round,
                nonce = %job.request.nonce,
                worker
            );
            self.process(&job, &root, handler.as_ref())
                .instrument(span)
                .await;
        }

        tracing::debug!(worker, "Worker stopped");
    }

    async fn process(&self, job: &Job, root: &CancellationToken, handler: &dyn JobHandler) {
        let started = tokio::time::Instant::now();
        tracing::info!(
            queued_ms = (Utc::now() - job.admitted_at).num_milliseconds(),
            "Job started"
        );

        let job_cancel = root.child_token();
        let result = tokio::select! {
            biased;
            _ = root.cancelled() => Err(PipelineError::Cancelled),
            outcome = tokio::time::timeout(self.job_deadline, handler.handle(job, &job_cancel)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::DeadlineExceeded(self.job_deadline)),
                }
            }
        };
        job_cancel.cancel();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(()) => tracing::info!(elapsed_ms, "Job completed"),
            Err(PipelineError::Cancelled) => {
                tracing::warn!(elapsed_ms, "Job abandoned on shutdown")
            }
            Err(e) => tracing::error!(elapsed_ms, error = %e, "Job failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::types::Round;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job(task: &str) -> Job {
        Job::new(SiteRequest {
            email: "dev@example.com".to_string(),
            secret: "s".to_string(),
            task: task.to_string(),
            round: Round::Bootstrap,
            nonce: "n".to_string(),
            brief: "b".to_string(),
            checks: vec![],
            evaluation_url: "https://eval.example.com".to_string(),
            attachments: vec![],
        })
    }

    struct Counting {
        handled: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for Counting {
        async fn handle(&self, _job: &Job, _cancel: &CancellationToken) -> Result<(), PipelineError> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Stuck;

    #[async_trait]
    impl JobHandler for Stuck {
        async fn handle(&self, _job: &Job, _cancel: &CancellationToken) -> Result<(), PipelineError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = JobQueue::new(4, 1, Duration::from_secs(1));
        for task in ["a", "b", "c"] {
            queue.try_enqueue(job(task), Duration::from_millis(10)).await.unwrap();
        }
        assert_eq!(queue.len(), 3);

        let order: Vec<String> = vec![
            queue.dequeue().await.unwrap().request().task.clone(),
            queue.dequeue().await.unwrap().request().task.clone(),
            queue.dequeue().await.unwrap().request().task.clone(),
        ];
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_after_capacity_then_recovers() {
        let queue = JobQueue::new(2, 1, Duration::from_secs(1));
        let timeout = Duration::from_millis(200);

        queue.try_enqueue(job("a"), timeout).await.unwrap();
        queue.try_enqueue(job("b"), timeout).await.unwrap();

        let start = tokio::time::Instant::now();
        assert_eq!(
            queue.try_enqueue(job("c"), timeout).await,
            Err(QueueError::Busy)
        );
        assert_eq!(start.elapsed(), timeout);

        queue.dequeue().await.unwrap();
        queue.try_enqueue(job("d"), timeout).await.unwrap();
        assert_eq!(queue.stats().len, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_enqueues_within_capacity_are_immediate() {
        let capacity = 8;
        let queue = JobQueue::new(capacity, 1, Duration::from_secs(1));
        let timeout = Duration::from_millis(200);

        let start = tokio::time::Instant::now();
        let tasks: Vec<String> = (0..capacity).map(|i| format!("t{}", i)).collect();
        let results = futures::future::join_all(
            tasks.iter().map(|task| queue.try_enqueue(job(task), timeout)),
        )
        .await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(queue.len(), capacity);
    }

    #[tokio::test]
    async fn test_workers_drain_queue() {
        let queue = Arc::new(JobQueue::new(10, 3, Duration::from_secs(5)));
        let handler = Arc::new(Counting {
            handled: AtomicUsize::new(0),
        });
        let root = CancellationToken::new();
        let workers = queue.start(root.clone(), handler.clone());
        assert_eq!(workers.len(), 3);

        for i in 0..6 {
            queue
                .try_enqueue(job(&format!("t{}", i)), Duration::from_millis(50))
                .await
                .unwrap();
        }

        tokio::time::timeout(Duration::from_secs(2), async {
            while handler.handled.load(Ordering::SeqCst) < 6 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        root.cancel();
        for worker in workers {
            worker.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_frees_worker() {
        let queue = Arc::new(JobQueue::new(4, 1, Duration::from_secs(300)));
        let root = CancellationToken::new();
        let workers = queue.start(root.clone(), Arc::new(Stuck));

        queue.try_enqueue(job("slow"), Duration::from_millis(10)).await.unwrap();
        queue.try_enqueue(job("next"), Duration::from_millis(10)).await.unwrap();

        // the stuck job times out, then the worker takes the next one
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(queue.is_empty());

        root.cancel();
        for worker in workers {
            worker.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_cancel_abandons_in_flight_job() {
        let queue = Arc::new(JobQueue::new(4, 1, Duration::from_secs(300)));
        let root = CancellationToken::new();
        let workers = queue.start(root.clone(), Arc::new(Stuck));

        queue.try_enqueue(job("stuck"), Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        root.cancel();
        tokio::time::timeout(Duration::from_secs(1), async {
            for worker in workers {
                worker.await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(EngineError::from(QueueError::Busy), EngineError::QueueBusy));
        assert!(matches!(EngineError::from(QueueError::Closed), EngineError::QueueClosed));
        assert_eq!(QueueError::Busy.to_string(), "queue_full_or_slow");
    }
}
