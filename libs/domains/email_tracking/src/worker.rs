//! In-process webhook executor.
//!
//! The HTTP handler pushes [`WebhookJob`]s onto a bounded queue and returns at
//! once. [`WebhookWorker`] drains the queue with bounded concurrency and
//! re-runs jobs that failed with a transient error after a fixed delay, up to
//! a fixed number of retries. Jobs it gives up on go to the processor's
//! dead-letter store with their raw payload.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WebhookWorkerConfig;
use crate::error::{EmailError, EmailResult};
use crate::ingestion::EventIngestor;
use crate::metrics::WebhookMetrics;
use crate::models::{DeadLetterReason, NewDeadLetter};
use crate::repository::EmailRecordStore;

/// One webhook event waiting for ingestion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookJob {
    pub id: Uuid,
    pub provider: String,
    /// Raw JSON text of a single provider event
    pub payload: String,
    /// 1-based attempt number
    pub attempt: u32,
    pub received_at: DateTime<Utc>,
}

impl WebhookJob {
    pub fn new(provider: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            provider: provider.into(),
            payload: payload.into(),
            attempt: 1,
            received_at: Utc::now(),
        }
    }

    /// The same job, one attempt later
    pub fn with_retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// Dead-letter record for this job.
    ///
    /// A job stopped by shutdown has not run its current attempt yet.
    pub fn into_dead_letter(self, reason: DeadLetterReason, error: String) -> NewDeadLetter {
        let attempts = match reason {
            DeadLetterReason::Shutdown => self.attempt.saturating_sub(1),
            _ => self.attempt,
        };

        NewDeadLetter {
            job_id: self.id,
            provider: self.provider,
            payload: self.payload,
            error,
            reason,
            attempts,
            received_at: self.received_at,
        }
    }
}

/// Processes webhook jobs for the worker
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &WebhookJob) -> EmailResult<()>;

    /// Keep a job the worker gave up on
    async fn dead_letter(&self, entry: NewDeadLetter) -> EmailResult<()>;

    /// Processor name for logging
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<S: EmailRecordStore + 'static> JobProcessor for EventIngestor<S> {
    async fn process(&self, job: &WebhookJob) -> EmailResult<()> {
        let raw: Value = serde_json::from_str(&job.payload)?;
        self.handle_webhook(&job.provider, &raw).await.map(|_| ())
    }

    async fn dead_letter(&self, entry: NewDeadLetter) -> EmailResult<()> {
        self.store_dead_letter(entry).await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        "event_ingestor"
    }
}

/// Sender half of the webhook queue, shared with the HTTP layer
#[derive(Clone, Debug)]
pub struct WebhookQueue {
    sender: mpsc::Sender<WebhookJob>,
}

impl WebhookQueue {
    /// Schedule a job without waiting for queue space
    pub fn enqueue(&self, job: WebhookJob) -> EmailResult<()> {
        self.sender.try_send(job).map_err(|err| match err {
            TrySendError::Full(job) => {
                EmailError::QueueUnavailable(format!("queue full, rejecting job {}", job.id))
            }
            TrySendError::Closed(job) => {
                EmailError::QueueUnavailable(format!("worker stopped, rejecting job {}", job.id))
            }
        })
    }

    /// Jobs waiting in the queue
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

/// Queue consumer with bounded concurrency and fixed-delay retries.
///
/// A job is only taken off the queue once a concurrency permit is free, so a
/// saturated worker lets the queue fill up and the HTTP layer answer 503.
pub struct WebhookWorker<P: JobProcessor> {
    processor: Arc<P>,
    config: WebhookWorkerConfig,
    receiver: mpsc::Receiver<WebhookJob>,
    semaphore: Arc<Semaphore>,
    metrics: WebhookMetrics,
}

impl<P: JobProcessor + 'static> WebhookWorker<P> {
    /// Create a worker and the queue feeding it
    pub fn new(processor: P, config: WebhookWorkerConfig) -> (Self, WebhookQueue) {
        Self::with_arc_processor(Arc::new(processor), config)
    }

    pub fn with_arc_processor(
        processor: Arc<P>,
        config: WebhookWorkerConfig,
    ) -> (Self, WebhookQueue) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let metrics = WebhookMetrics::new(processor.name());

        let worker = Self {
            processor,
            config,
            receiver,
            semaphore,
            metrics,
        };
        (worker, WebhookQueue { sender })
    }

    /// Run until shutdown is signalled, or until every queue handle is
    /// dropped and no work is left.
    ///
    /// On shutdown the queue is closed and in-flight jobs are awaited. Jobs
    /// still queued or waiting for a retry are moved to the dead-letter store.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            processor = %self.processor.name(),
            max_retries = self.config.max_retries,
            retry_delay_secs = self.config.retry_delay.as_secs(),
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "Starting webhook worker"
        );

        let mut in_flight: JoinSet<Option<WebhookJob>> = JoinSet::new();
        // Retries waiting out their delay; a fixed delay keeps them in due order
        let mut delayed: VecDeque<(Instant, WebhookJob)> = VecDeque::new();
        // Jobs due to run as soon as a permit frees up
        let mut ready: VecDeque<WebhookJob> = VecDeque::new();
        let mut queue_open = true;

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping webhook worker");
                break;
            }

            while let Some(job) = ready.pop_front() {
                match Arc::clone(&self.semaphore).try_acquire_owned() {
                    Ok(permit) => self.spawn_job(&mut in_flight, job, permit),
                    Err(_) => {
                        ready.push_front(job);
                        break;
                    }
                }
            }
            self.metrics.in_flight(in_flight.len());
            self.metrics.queue_depth(self.receiver.len());

            if !queue_open && in_flight.is_empty() && delayed.is_empty() && ready.is_empty() {
                info!("Webhook queue closed and drained");
                break;
            }

            let can_take = ready.is_empty() && self.semaphore.available_permits() > 0;
            let next_due = delayed.front().map(|(due, _)| *due);

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown sender dropped, stopping webhook worker");
                        break;
                    }
                }
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    match result {
                        Ok(Some(retry)) => {
                            delayed.push_back((Instant::now() + self.config.retry_delay, retry));
                        }
                        Ok(None) => {}
                        Err(e) => error!(error = %e, "Webhook job task panicked"),
                    }
                }
                _ = tokio::time::sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                    let now = Instant::now();
                    while let Some((due, _)) = delayed.front() {
                        if *due > now {
                            break;
                        }
                        if let Some((_, job)) = delayed.pop_front() {
                            ready.push_back(job);
                        }
                    }
                }
                job = self.receiver.recv(), if queue_open && can_take => {
                    match job {
                        Some(job) => {
                            self.metrics.job_received(&job.provider);
                            ready.push_back(job);
                        }
                        None => queue_open = false,
                    }
                }
            }
        }

        self.stop(in_flight, delayed, ready).await;
    }

    /// Close the queue, finish in-flight jobs and dead-letter everything left.
    async fn stop(
        mut self,
        mut in_flight: JoinSet<Option<WebhookJob>>,
        delayed: VecDeque<(Instant, WebhookJob)>,
        ready: VecDeque<WebhookJob>,
    ) {
        self.receiver.close();

        let mut unfinished: Vec<WebhookJob> = ready
            .into_iter()
            .chain(delayed.into_iter().map(|(_, job)| job))
            .collect();

        while let Some(result) = in_flight.join_next().await {
            match result {
                Ok(Some(retry)) => unfinished.push(retry),
                Ok(None) => {}
                Err(e) => error!(error = %e, "Webhook job task panicked"),
            }
        }

        while let Ok(job) = self.receiver.try_recv() {
            unfinished.push(job);
        }

        if !unfinished.is_empty() {
            warn!(
                count = unfinished.len(),
                "Webhook worker stopping with unfinished jobs"
            );
        }
        for job in unfinished {
            Self::dead_letter(
                self.processor.as_ref(),
                &self.metrics,
                job,
                DeadLetterReason::Shutdown,
                "worker stopped before the job could run".to_string(),
            )
            .await;
        }

        self.metrics.in_flight(0);
        self.metrics.queue_depth(0);
        info!("Webhook worker stopped");
    }

    fn spawn_job(
        &self,
        in_flight: &mut JoinSet<Option<WebhookJob>>,
        job: WebhookJob,
        permit: OwnedSemaphorePermit,
    ) {
        let processor = Arc::clone(&self.processor);
        let metrics = self.metrics.clone();
        let max_retries = self.config.max_retries;

        in_flight.spawn(async move {
            let _permit = permit;
            Self::process_job(processor.as_ref(), &metrics, max_retries, job).await
        });
    }

    /// Run one attempt; returns the follow-up job when a retry is due.
    async fn process_job(
        processor: &P,
        metrics: &WebhookMetrics,
        max_retries: u32,
        job: WebhookJob,
    ) -> Option<WebhookJob> {
        debug!(job_id = %job.id, provider = %job.provider, attempt = job.attempt, "Processing webhook job");
        let started = Instant::now();

        match processor.process(&job).await {
            Ok(()) => {
                metrics.job_processed(started.elapsed());
                None
            }
            // attempt counts the first run, so retries so far are attempt - 1
            Err(e) if e.is_retryable() && job.attempt <= max_retries => {
                metrics.job_retried();
                warn!(
                    job_id = %job.id,
                    provider = %job.provider,
                    attempt = job.attempt,
                    max_retries,
                    error = %e,
                    "Webhook job failed, will retry"
                );
                Some(job.with_retry())
            }
            Err(e) => {
                metrics.job_failed();
                let reason = if e.is_retryable() {
                    DeadLetterReason::RetriesExhausted
                } else {
                    DeadLetterReason::PermanentError
                };
                Self::dead_letter(processor, metrics, job, reason, e.to_string()).await;
                None
            }
        }
    }

    async fn dead_letter(
        processor: &P,
        metrics: &WebhookMetrics,
        job: WebhookJob,
        reason: DeadLetterReason,
        error: String,
    ) {
        error!(
            job_id = %job.id,
            provider = %job.provider,
            attempt = job.attempt,
            reason = %reason,
            error = %error,
            payload = %job.payload,
            "Moving webhook job to dead-letter store"
        );
        metrics.job_dead_lettered(reason);

        let job_id = job.id;
        if let Err(e) = processor.dead_letter(job.into_dead_letter(reason, error)).await {
            error!(job_id = %job_id, error = %e, "Failed to store dead webhook job");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::{Mutex, Notify};

    /// Fails with the given error until `failures` attempts have been made
    struct FlakyProcessor {
        failures: u32,
        permanent: bool,
        calls: AtomicU32,
        succeeded: AtomicU32,
        seen: Mutex<Vec<(u32, Instant)>>,
        dead: Mutex<Vec<NewDeadLetter>>,
    }

    impl FlakyProcessor {
        fn transient(failures: u32) -> Self {
            Self {
                failures,
                permanent: false,
                calls: AtomicU32::new(0),
                succeeded: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
                dead: Mutex::new(Vec::new()),
            }
        }

        fn permanent() -> Self {
            Self {
                failures: u32::MAX,
                permanent: true,
                ..Self::transient(0)
            }
        }

        fn succeeded(&self) -> u32 {
            self.succeeded.load(Ordering::SeqCst)
        }

        async fn dead(&self) -> Vec<NewDeadLetter> {
            self.dead.lock().await.clone()
        }
    }

    #[async_trait]
    impl JobProcessor for FlakyProcessor {
        async fn process(&self, job: &WebhookJob) -> EmailResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen.lock().await.push((job.attempt, Instant::now()));

            if call > self.failures {
                self.succeeded.fetch_add(1, Ordering::SeqCst);
                Ok(())
            } else if self.permanent {
                Err(EmailError::UnknownEventType("unsub".into()))
            } else {
                Err(EmailError::TrackerNotFound("42".into()))
            }
        }

        async fn dead_letter(&self, entry: NewDeadLetter) -> EmailResult<()> {
            self.dead.lock().await.push(entry);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    /// Holds every job until released
    #[derive(Default)]
    struct BlockingProcessor {
        started: AtomicU32,
        release: Notify,
    }

    #[async_trait]
    impl JobProcessor for BlockingProcessor {
        async fn process(&self, _job: &WebhookJob) -> EmailResult<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(())
        }

        async fn dead_letter(&self, _entry: NewDeadLetter) -> EmailResult<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "blocking"
        }
    }

    fn config() -> WebhookWorkerConfig {
        WebhookWorkerConfig::default()
            .with_max_retries(5)
            .with_retry_delay(Duration::from_secs(60))
            .with_max_concurrent_jobs(2)
            .with_queue_capacity(16)
    }

    async fn wait_until(done: impl Fn() -> bool) {
        for _ in 0..10_000 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("worker did not reach expected state");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried_after_delay() {
        let processor = Arc::new(FlakyProcessor::transient(2));
        let (worker, queue) = WebhookWorker::with_arc_processor(Arc::clone(&processor), config());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        queue.enqueue(WebhookJob::new("mailjet", "{}")).unwrap();
        wait_until(|| processor.succeeded() == 1).await;

        let seen = processor.seen.lock().await.clone();
        let attempts: Vec<u32> = seen.iter().map(|(attempt, _)| *attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
        assert!(seen[1].1 - seen[0].1 >= Duration::from_secs(60));
        assert!(seen[2].1 - seen[1].1 >= Duration::from_secs(60));
        assert!(processor.dead().await.is_empty());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_after_max_retries() {
        let processor = Arc::new(FlakyProcessor::transient(u32::MAX));
        let (worker, queue) = WebhookWorker::with_arc_processor(Arc::clone(&processor), config());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        let job = WebhookJob::new("mailjet", r#"{"MessageID": 42}"#);
        queue.enqueue(job.clone()).unwrap();
        wait_until(|| processor.dead.try_lock().is_ok_and(|dead| dead.len() == 1)).await;

        // First run plus five retries
        assert_eq!(processor.calls.load(Ordering::SeqCst), 6);
        assert_eq!(processor.succeeded(), 0);

        let dead = processor.dead().await.remove(0);
        assert_eq!(dead.job_id, job.id);
        assert_eq!(dead.reason, DeadLetterReason::RetriesExhausted);
        assert_eq!(dead.attempts, 6);
        assert_eq!(dead.payload, job.payload);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_runs_once() {
        let processor = Arc::new(FlakyProcessor::transient(u32::MAX));
        let (worker, queue) = WebhookWorker::with_arc_processor(
            Arc::clone(&processor),
            config().with_max_retries(0),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        queue.enqueue(WebhookJob::new("mailjet", "{}")).unwrap();
        wait_until(|| processor.dead.try_lock().is_ok_and(|dead| dead.len() == 1)).await;
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_dead_lettered_without_retry() {
        let processor = Arc::new(FlakyProcessor::permanent());
        let (worker, queue) = WebhookWorker::with_arc_processor(Arc::clone(&processor), config());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        queue.enqueue(WebhookJob::new("mailjet", r#"{"event": "unsub"}"#)).unwrap();
        wait_until(|| processor.dead.try_lock().is_ok_and(|dead| dead.len() == 1)).await;

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);

        let dead = processor.dead().await.remove(0);
        assert_eq!(dead.reason, DeadLetterReason::PermanentError);
        assert_eq!(dead.attempts, 1);
        assert!(dead.error.contains("unsub"));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_busy_worker_leaves_jobs_queued() {
        let processor = Arc::new(BlockingProcessor::default());
        let (worker, queue) = WebhookWorker::with_arc_processor(
            Arc::clone(&processor),
            config().with_max_concurrent_jobs(1).with_queue_capacity(2),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        queue.enqueue(WebhookJob::new("mailjet", "{}")).unwrap();
        while processor.started.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let mut accepted = 0;
        let mut rejected = 0;
        for _ in 0..50 {
            match queue.enqueue(WebhookJob::new("mailjet", "{}")) {
                Ok(()) => accepted += 1,
                Err(EmailError::QueueUnavailable(_)) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(accepted, 2);
        assert_eq!(rejected, 48);
        assert_eq!(processor.started.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending(), 2);

        processor.release.notify_one();
        while processor.started.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(queue.pending(), 1);

        shutdown_tx.send(true).unwrap();
        processor.release.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_dead_letters_queued_and_delayed_jobs() {
        let processor = Arc::new(FlakyProcessor::transient(1));
        let (worker, queue) = WebhookWorker::with_arc_processor(Arc::clone(&processor), config());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        // First job fails once and waits out its retry delay
        let retried = WebhookJob::new("mailjet", r#"{"MessageID": 1}"#);
        queue.enqueue(retried.clone()).unwrap();
        wait_until(|| processor.calls.load(Ordering::SeqCst) == 1).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let dead = processor.dead().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].job_id, retried.id);
        assert_eq!(dead[0].reason, DeadLetterReason::Shutdown);
        assert_eq!(dead[0].attempts, 1);

        assert!(matches!(
            queue.enqueue(WebhookJob::new("mailjet", "{}")),
            Err(EmailError::QueueUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_jobs_queued_at_shutdown_are_not_dropped() {
        let processor = Arc::new(FlakyProcessor::transient(0));
        let (worker, queue) = WebhookWorker::with_arc_processor(Arc::clone(&processor), config());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();

        let jobs: Vec<WebhookJob> = (0..5)
            .map(|n| WebhookJob::new("mailjet", format!(r#"{{"MessageID": {n}}}"#)))
            .collect();
        for job in &jobs {
            queue.enqueue(job.clone()).unwrap();
        }

        worker.run(shutdown_rx).await;

        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
        let dead = processor.dead().await;
        let ids: Vec<Uuid> = dead.iter().map(|d| d.job_id).collect();
        assert_eq!(ids, jobs.iter().map(|j| j.id).collect::<Vec<_>>());
        assert!(dead
            .iter()
            .all(|d| d.reason == DeadLetterReason::Shutdown && d.attempts == 0));
    }

    #[tokio::test]
    async fn test_full_queue_is_reported() {
        let (_worker, queue) = WebhookWorker::new(
            FlakyProcessor::transient(0),
            config().with_queue_capacity(1),
        );

        queue.enqueue(WebhookJob::new("mailjet", "{}")).unwrap();
        assert_eq!(queue.pending(), 1);

        let err = queue.enqueue(WebhookJob::new("mailjet", "{}")).unwrap_err();
        assert!(matches!(err, EmailError::QueueUnavailable(_)));
    }

    #[tokio::test]
    async fn test_stopped_worker_rejects_jobs() {
        let (worker, queue) = WebhookWorker::new(FlakyProcessor::transient(0), config());
        drop(worker);

        let err = queue.enqueue(WebhookJob::new("mailjet", "{}")).unwrap_err();
        assert!(matches!(err, EmailError::QueueUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_exits_when_queue_dropped() {
        let processor = Arc::new(FlakyProcessor::transient(0));
        let (worker, queue) = WebhookWorker::with_arc_processor(Arc::clone(&processor), config());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        queue.enqueue(WebhookJob::new("mailjet", "{}")).unwrap();
        drop(queue);

        worker.run(shutdown_rx).await;
        assert_eq!(processor.succeeded(), 1);
        assert!(processor.dead().await.is_empty());
    }

    #[test]
    fn test_job_retry_keeps_identity() {
        let job = WebhookJob::new("mailjet", r#"{"event":"open"}"#);
        let retry = job.with_retry();

        assert_eq!(retry.id, job.id);
        assert_eq!(retry.attempt, 2);
        assert_eq!(retry.payload, job.payload);
    }

    #[test]
    fn test_dead_letter_counts_attempts_made() {
        let job = WebhookJob::new("mailjet", "{}").with_retry().with_retry();

        let exhausted = job
            .clone()
            .into_dead_letter(DeadLetterReason::RetriesExhausted, "gone".into());
        assert_eq!(exhausted.attempts, 3);

        let interrupted = job.into_dead_letter(DeadLetterReason::Shutdown, "stopped".into());
        assert_eq!(interrupted.attempts, 2);
    }
}
