//! Bounded worker pool for extraction jobs
//!
//! Jobs enter through a bounded channel and are drained by a fixed number of
//! workers. Each job runs in its own task; a job that panics is handed back
//! to the runner so its file can be settled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ProcessingConfig;
use crate::types::FileId;

use super::job::ExtractionJob;

/// Work executed for each dispatched job
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    /// Process the job to completion, settling its terminal state
    async fn run(&self, job: &ExtractionJob);

    /// Called when `run` did not finish because its task panicked
    async fn abandon(&self, job: &ExtractionJob, reason: &str);
}

/// Why a job could not be handed to the pool
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("Job queue is full")]
    QueueFull,

    #[error("Dispatcher is shut down")]
    ShutDown,

    #[error("File {0} already has a job in flight")]
    AlreadyInFlight(FileId),
}

/// Fixed-size pool of extraction workers
pub struct Dispatcher {
    sender: Mutex<Option<mpsc::Sender<ExtractionJob>>>,
    in_flight: Arc<DashMap<FileId, DateTime<Utc>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start a pool sized from processing config
    pub fn start(runner: Arc<dyn JobRunner>, config: &ProcessingConfig) -> Self {
        Self::with_limits(runner, config.workers, config.queue_capacity)
    }

    /// Start `workers` workers behind a queue holding `capacity` jobs
    pub fn with_limits(runner: Arc<dyn JobRunner>, workers: usize, capacity: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let in_flight = Arc::new(DashMap::new());

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    runner.clone(),
                    receiver.clone(),
                    in_flight.clone(),
                ))
            })
            .collect();

        tracing::info!(workers, capacity, "Extraction dispatcher started");

        Self {
            sender: Mutex::new(Some(sender)),
            in_flight,
            workers: Mutex::new(handles),
        }
    }

    /// Hand a job to the pool without waiting
    pub fn submit(&self, job: ExtractionJob) -> Result<(), SubmissionError> {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(SubmissionError::ShutDown)?;

        let file_id = job.file_id;
        match self.in_flight.entry(file_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(SubmissionError::AlreadyInFlight(file_id));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(job.submitted_at);
            }
        }

        match sender.try_send(job) {
            Ok(()) => {
                tracing::debug!(file_id, "Job submitted");
                Ok(())
            }
            Err(e) => {
                self.in_flight.remove(&file_id);
                Err(match e {
                    mpsc::error::TrySendError::Full(_) => SubmissionError::QueueFull,
                    mpsc::error::TrySendError::Closed(_) => SubmissionError::ShutDown,
                })
            }
        }
    }

    /// Number of jobs queued or running
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, file_id: FileId) -> bool {
        self.in_flight.contains_key(&file_id)
    }

    /// Stop accepting jobs and wait for queued ones to finish
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock());
        tracing::info!(pending = self.in_flight(), "Draining extraction dispatcher");

        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker exited abnormally");
            }
        }
        tracing::info!("Extraction dispatcher stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    runner: Arc<dyn JobRunner>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<ExtractionJob>>>,
    in_flight: Arc<DashMap<FileId, DateTime<Utc>>>,
) {
    loop {
        let job = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };
        let Some(job) = job else { break };

        let file_id = job.file_id;
        let waited_ms = (Utc::now() - job.submitted_at).num_milliseconds();
        tracing::info!(worker_id, file_id, filename = %job.filename, waited_ms, "Worker picked up job");

        let task = {
            let runner = runner.clone();
            let job = job.clone();
            tokio::spawn(async move { runner.run(&job).await })
        };

        if let Err(e) = task.await {
            tracing::error!(worker_id, file_id, error = %e, "Job task panicked");
            job.cancel.cancel();
            runner.abandon(&job, "job task panicked").await;
        }

        in_flight.remove(&file_id);
    }

    tracing::debug!(worker_id, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{Notify, Semaphore};

    /// Runner that records calls and blocks until the gate opens
    struct GatedRunner {
        gate: Semaphore,
        started: Notify,
        ran: parking_lot::Mutex<Vec<FileId>>,
        abandoned: parking_lot::Mutex<Vec<(FileId, String, bool)>>,
    }

    impl GatedRunner {
        fn new(open: bool) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(if open { Semaphore::MAX_PERMITS } else { 0 }),
                started: Notify::new(),
                ran: parking_lot::Mutex::new(Vec::new()),
                abandoned: parking_lot::Mutex::new(Vec::new()),
            })
        }

        fn open(&self) {
            self.gate.add_permits(1000);
        }
    }

    #[async_trait]
    impl JobRunner for GatedRunner {
        async fn run(&self, job: &ExtractionJob) {
            if job.filename.starts_with("corrupt") {
                panic!("decoder crashed on {}", job.filename);
            }
            self.started.notify_one();
            let permit = self.gate.acquire().await.unwrap();
            permit.forget();
            self.ran.lock().push(job.file_id);
        }

        async fn abandon(&self, job: &ExtractionJob, reason: &str) {
            self.abandoned
                .lock()
                .push((job.file_id, reason.to_string(), job.cancel.is_cancelled()));
        }
    }

    fn job(file_id: FileId) -> ExtractionJob {
        ExtractionJob::new(file_id, format!("file-{}.png", file_id), vec![1u8, 2, 3])
    }

    #[tokio::test]
    async fn test_jobs_run_and_drain_on_shutdown() {
        let runner = GatedRunner::new(true);
        let dispatcher = Dispatcher::with_limits(runner.clone(), 4, 16);

        for id in 1..=6 {
            dispatcher.submit(job(id)).unwrap();
        }
        dispatcher.shutdown().await;

        let mut ran = runner.ran.lock().clone();
        ran.sort();
        assert_eq!(ran, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let runner = GatedRunner::new(false);
        let dispatcher = Dispatcher::with_limits(runner.clone(), 1, 1);

        dispatcher.submit(job(1)).unwrap();
        runner.started.notified().await;

        // Worker is busy with 1; the single queue slot takes 2
        dispatcher.submit(job(2)).unwrap();
        assert_eq!(dispatcher.submit(job(3)), Err(SubmissionError::QueueFull));
        assert!(!dispatcher.is_in_flight(3));
        assert_eq!(dispatcher.in_flight(), 2);

        runner.open();
        dispatcher.shutdown().await;
        assert_eq!(runner.ran.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_file_rejected() {
        let runner = GatedRunner::new(false);
        let dispatcher = Dispatcher::with_limits(runner.clone(), 2, 4);

        dispatcher.submit(job(7)).unwrap();
        assert_eq!(dispatcher.submit(job(7)), Err(SubmissionError::AlreadyInFlight(7)));

        runner.open();
        dispatcher.shutdown().await;
        assert_eq!(runner.ran.lock().clone(), vec![7]);
    }

    #[tokio::test]
    async fn test_panicking_job_is_abandoned() {
        let runner = GatedRunner::new(true);
        let dispatcher = Dispatcher::with_limits(runner.clone(), 1, 4);

        dispatcher
            .submit(ExtractionJob::new(9, "corrupt.png", vec![0u8]))
            .unwrap();
        dispatcher.submit(job(10)).unwrap();
        dispatcher.shutdown().await;

        assert_eq!(runner.ran.lock().clone(), vec![10]);
        let abandoned = runner.abandoned.lock().clone();
        assert_eq!(abandoned, vec![(9, "job task panicked".to_string(), true)]);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown() {
        let runner = GatedRunner::new(true);
        let dispatcher = Dispatcher::with_limits(runner, 2, 4);

        dispatcher.shutdown().await;
        assert_eq!(dispatcher.submit(job(1)), Err(SubmissionError::ShutDown));
        // Second shutdown is a no-op
        dispatcher.shutdown().await;
    }
}
