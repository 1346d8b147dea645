//! Repository for the `queued_jobs` table.
//!
//! A job's `unique_key` is reserved only while the job is waiting or
//! active (partial unique index `uq_queued_jobs_active_key`). Once the job
//! completes or fails permanently the key is free again.

use marketsync_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::job::{JobState, NewJob, QueuedJob};
use crate::models::status::JobStatus;

/// Column list for `queued_jobs` queries.
const COLUMNS: &str = "\
    id, queue, name, unique_key, payload, status_id, attempts, max_attempts, \
    run_at, last_error, locked_at, created_at, updated_at, finished_at";

/// Maximum page size for failed-job listing.
const MAX_LIMIT: i64 = 100;

pub struct JobRepo;

impl JobRepo {
    /// Add a job unless another job with the same key is still waiting or
    /// active. Returns `None` for a duplicate.
    pub async fn enqueue(pool: &PgPool, input: &NewJob) -> Result<Option<QueuedJob>, sqlx::Error> {
        let query = format!(
            "INSERT INTO queued_jobs (queue, name, unique_key, payload, status_id, max_attempts) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (unique_key) WHERE unique_key IS NOT NULL AND status_id IN (1, 2) \
             DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueuedJob>(&query)
            .bind(&input.queue)
            .bind(&input.name)
            .bind(&input.unique_key)
            .bind(&input.payload)
            .bind(JobStatus::Waiting.id())
            .bind(input.max_attempts)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the oldest due job of one partition.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// receive the same job. The claim counts as an attempt.
    pub async fn claim(
        pool: &PgPool,
        queue: &str,
        name: &str,
    ) -> Result<Option<QueuedJob>, sqlx::Error> {
        let query = format!(
            "UPDATE queued_jobs \
             SET status_id = $3, attempts = attempts + 1, locked_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM queued_jobs \
                 WHERE queue = $1 AND name = $2 AND status_id = $4 AND run_at <= NOW() \
                 ORDER BY run_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueuedJob>(&query)
            .bind(queue)
            .bind(name)
            .bind(JobStatus::Active.id())
            .bind(JobStatus::Waiting.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark an active job completed, releasing its key.
    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queued_jobs \
             SET status_id = $2, locked_at = NULL, finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(JobStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt.
    ///
    /// With `retry_at` the job goes back to waiting and keeps its key;
    /// without it the job is failed permanently and retained.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error: &str,
        retry_at: Option<Timestamp>,
    ) -> Result<JobState, sqlx::Error> {
        match retry_at {
            Some(run_at) => {
                sqlx::query(
                    "UPDATE queued_jobs \
                     SET status_id = $2, last_error = $3, run_at = $4, locked_at = NULL, \
                         updated_at = NOW() \
                     WHERE id = $1",
                )
                .bind(id)
                .bind(JobStatus::Waiting.id())
                .bind(error)
                .bind(run_at)
                .execute(pool)
                .await?;
                Ok(JobState::Retrying { run_at })
            }
            None => {
                sqlx::query(
                    "UPDATE queued_jobs \
                     SET status_id = $2, last_error = $3, locked_at = NULL, \
                         finished_at = NOW(), updated_at = NOW() \
                     WHERE id = $1",
                )
                .bind(id)
                .bind(JobStatus::Failed.id())
                .bind(error)
                .execute(pool)
                .await?;
                Ok(JobState::Failed)
            }
        }
    }

    /// Re-queue an active job under the same id and key with a new
    /// payload and a fresh attempt budget.
    pub async fn continue_with(
        pool: &PgPool,
        id: DbId,
        payload: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queued_jobs \
             SET status_id = $2, payload = $3, attempts = 0, last_error = NULL, \
                 run_at = NOW(), locked_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(JobStatus::Waiting.id())
        .bind(payload)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// The waiting or active job holding `unique_key`, if any.
    pub async fn find_pending_by_key(
        pool: &PgPool,
        unique_key: &str,
    ) -> Result<Option<QueuedJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM queued_jobs \
             WHERE unique_key = $1 AND status_id IN ($2, $3)"
        );
        sqlx::query_as::<_, QueuedJob>(&query)
            .bind(unique_key)
            .bind(JobStatus::Waiting.id())
            .bind(JobStatus::Active.id())
            .fetch_optional(pool)
            .await
    }

    /// Permanently failed jobs, most recent first.
    pub async fn list_failed(
        pool: &PgPool,
        queue: Option<&str>,
        limit: i64,
    ) -> Result<Vec<QueuedJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM queued_jobs \
             WHERE status_id = $1 AND ($2::TEXT IS NULL OR queue = $2) \
             ORDER BY finished_at DESC, id DESC \
             LIMIT $3"
        );
        sqlx::query_as::<_, QueuedJob>(&query)
            .bind(JobStatus::Failed.id())
            .bind(queue)
            .bind(limit.clamp(1, MAX_LIMIT))
            .fetch_all(pool)
            .await
    }

    /// Return jobs whose worker vanished to the waiting state.
    ///
    /// A job locked before `locked_before` is considered stalled. Jobs that
    /// already used their last attempt are failed instead.
    pub async fn recover_stalled(pool: &PgPool, locked_before: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE queued_jobs \
             SET status_id = CASE WHEN attempts >= max_attempts THEN $3 ELSE $4 END, \
                 finished_at = CASE WHEN attempts >= max_attempts THEN NOW() ELSE NULL END, \
                 last_error = COALESCE(last_error, 'job stalled'), \
                 run_at = NOW(), locked_at = NULL, updated_at = NOW() \
             WHERE status_id = $1 AND locked_at < $2",
        )
        .bind(JobStatus::Active.id())
        .bind(locked_before)
        .bind(JobStatus::Failed.id())
        .bind(JobStatus::Waiting.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete completed jobs that finished before `finished_before`.
    pub async fn purge_completed(
        pool: &PgPool,
        finished_before: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM queued_jobs WHERE status_id = $1 AND finished_at < $2",
        )
        .bind(JobStatus::Completed.id())
        .bind(finished_before)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
