//! Queue runner: claims jobs for one queue partition and settles them.
//!
//! A [`QueueWorker`] polls its partition, runs up to `concurrency` jobs at
//! once behind a semaphore, and optionally caps how many jobs it starts
//! per time window. The handler's result decides what happens to the job:
//!
//! - `Ok(JobOutcome::Done)` completes it.
//! - `Ok(JobOutcome::Continue(payload))` puts it back in the queue under
//!   the same id with a new payload.
//! - `Err(_)` reschedules it with exponential backoff, or fails it
//!   permanently once attempts are exhausted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use marketsync_core::retry::RetryPolicy;
use marketsync_db::models::job::{JobState, QueuedJob};
use marketsync_db::{Store, StoreError};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;
use crate::rate_limit::{RateLimit, RateLimiter};

/// Default polling interval when the partition is empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What to do with a job after a successful attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Done,
    /// Re-queue immediately with this payload.
    Continue(serde_json::Value),
}

/// Processes one claimed job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &QueuedJob) -> Result<JobOutcome, ProcessError>;
}

/// Per-worker tuning.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub concurrency: usize,
    pub rate_limit: Option<RateLimit>,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl WorkerOptions {
    pub fn new(concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            concurrency: concurrency.max(1),
            rate_limit: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry,
        }
    }

    pub fn with_rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Serves one `(queue, name)` partition.
pub struct QueueWorker {
    queue: &'static str,
    name: &'static str,
    store: Arc<dyn Store>,
    handler: Arc<dyn JobHandler>,
    options: WorkerOptions,
    limiter: Option<RateLimiter>,
    permits: Arc<Semaphore>,
}

impl QueueWorker {
    pub fn new(
        queue: &'static str,
        name: &'static str,
        store: Arc<dyn Store>,
        handler: Arc<dyn JobHandler>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            queue,
            name,
            store,
            handler,
            limiter: options.rate_limit.map(RateLimiter::new),
            permits: Arc::new(Semaphore::new(options.concurrency)),
            options,
        }
    }

    /// Claim and process at most one due job. Returns whether a job ran.
    pub async fn run_once(&self) -> Result<bool, StoreError> {
        let Some(job) = self.store.claim(self.queue, self.name).await? else {
            return Ok(false);
        };
        self.execute(job).await?;
        Ok(true)
    }

    /// Poll and process jobs until `cancel` fires, then wait for the jobs
    /// already running to finish.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            queue = self.queue,
            name = self.name,
            concurrency = self.options.concurrency,
            rate_limit = ?self.options.rate_limit,
            "Queue worker started",
        );

        loop {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            if let Some(limiter) = &self.limiter {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = limiter.acquire() => {}
                }
            }

            match self.store.claim(self.queue, self.name).await {
                Ok(Some(job)) => {
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move {
                        let job_id = job.id;
                        if let Err(e) = worker.execute(job).await {
                            tracing::error!(
                                queue = worker.queue,
                                job_id,
                                error = %e,
                                "Failed to record job result",
                            );
                        }
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.options.poll_interval) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(queue = self.queue, name = self.name, error = %e, "Claim failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.options.poll_interval) => {}
                    }
                }
            }
        }

        tracing::info!(queue = self.queue, name = self.name, "Queue worker draining");
        let total = u32::try_from(self.options.concurrency).unwrap_or(u32::MAX);
        let _drained = self.permits.acquire_many(total).await;
        tracing::info!(queue = self.queue, name = self.name, "Queue worker stopped");
    }

    async fn execute(&self, job: QueuedJob) -> Result<(), StoreError> {
        tracing::debug!(
            queue = self.queue,
            name = self.name,
            job_id = job.id,
            attempt = job.attempts,
            "Job claimed",
        );

        match self.handler.handle(&job).await {
            Ok(JobOutcome::Done) => {
                self.store.complete_job(job.id).await?;
                tracing::debug!(queue = self.queue, job_id = job.id, "Job completed");
            }
            Ok(JobOutcome::Continue(payload)) => {
                self.store.continue_job(job.id, &payload).await?;
                tracing::debug!(queue = self.queue, job_id = job.id, "Job continued");
            }
            Err(e) => self.settle_failure(&job, &e).await?,
        }
        Ok(())
    }

    async fn settle_failure(&self, job: &QueuedJob, error: &ProcessError) -> Result<(), StoreError> {
        let policy = RetryPolicy {
            max_attempts: u32::try_from(job.max_attempts).unwrap_or(0),
            ..self.options.retry
        };
        let attempts = u32::try_from(job.attempts).unwrap_or(0);
        let retry_at = if error.is_retryable() {
            policy
                .delay_after(attempts)
                .and_then(|delay| chrono::Duration::from_std(delay).ok())
                .map(|delay| Utc::now() + delay)
        } else {
            None
        };

        let message = error.to_string();
        match self.store.fail_job(job.id, &message, retry_at).await? {
            JobState::Retrying { run_at } => tracing::error!(
                queue = self.queue,
                name = self.name,
                job_id = job.id,
                attempt = job.attempts,
                max_attempts = job.max_attempts,
                retry_at = %run_at,
                error = %message,
                "Job attempt failed, retry scheduled",
            ),
            JobState::Failed => tracing::error!(
                queue = self.queue,
                name = self.name,
                job_id = job.id,
                attempt = job.attempts,
                error = %message,
                "Job failed permanently",
            ),
        }
        Ok(())
    }
}
