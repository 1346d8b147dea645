//! Postgres tests for the durable job queue.

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use marketsync_core::queue::{
    webhook_job_key, WebhookJobPayload, CATALOG_IMPORT_QUEUE, INVENTORY_JOB, ORDER_JOB,
    WEBHOOK_QUEUE,
};
use marketsync_db::models::job::{JobState, NewJob};
use marketsync_db::models::status::JobStatus;
use marketsync_db::repositories::JobRepo;
use serde_json::json;
use sqlx::PgPool;

fn webhook_job(name: &str, webhook_id: i64) -> NewJob {
    NewJob::webhook(
        name,
        &WebhookJobPayload {
            webhook_id,
            tenant_id: 1,
            platform: "shopee".into(),
            event_type: "order.created".into(),
        },
    )
    .unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn enqueue_coalesces_while_waiting_or_active(pool: PgPool) {
    let job = webhook_job(ORDER_JOB, 7);

    let first = JobRepo::enqueue(&pool, &job).await.unwrap().unwrap();
    assert_eq!(first.status(), Some(JobStatus::Waiting));
    assert_eq!(first.attempts, 0);
    assert!(JobRepo::enqueue(&pool, &job).await.unwrap().is_none());

    let claimed = JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, first.id);
    assert!(JobRepo::enqueue(&pool, &job).await.unwrap().is_none());

    JobRepo::complete(&pool, claimed.id).await.unwrap();
    let again = JobRepo::enqueue(&pool, &job).await.unwrap().unwrap();
    assert_ne!(again.id, first.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn permanent_failure_releases_key_and_is_listed(pool: PgPool) {
    let job = webhook_job(ORDER_JOB, 8);
    JobRepo::enqueue(&pool, &job).await.unwrap().unwrap();
    let claimed = JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB)
        .await
        .unwrap()
        .unwrap();

    let state = JobRepo::fail(&pool, claimed.id, "boom", None).await.unwrap();
    assert_eq!(state, JobState::Failed);
    assert!(JobRepo::find_pending_by_key(&pool, &webhook_job_key(ORDER_JOB, 8))
        .await
        .unwrap()
        .is_none());
    assert!(JobRepo::enqueue(&pool, &job).await.unwrap().is_some());

    let failed = JobRepo::list_failed(&pool, None, 10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].last_error.as_deref(), Some("boom"));
    assert!(failed[0].finished_at.is_some());
    assert_eq!(
        JobRepo::list_failed(&pool, Some(WEBHOOK_QUEUE), 10)
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(JobRepo::list_failed(&pool, Some(CATALOG_IMPORT_QUEUE), 10)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_is_partitioned_by_name(pool: PgPool) {
    let order = JobRepo::enqueue(&pool, &webhook_job(ORDER_JOB, 1))
        .await
        .unwrap()
        .unwrap();
    let inventory = JobRepo::enqueue(&pool, &webhook_job(INVENTORY_JOB, 2))
        .await
        .unwrap()
        .unwrap();

    let claimed = JobRepo::claim(&pool, WEBHOOK_QUEUE, INVENTORY_JOB)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, inventory.id);
    assert_eq!(claimed.attempts, 1);
    assert_eq!(claimed.status(), Some(JobStatus::Active));
    assert!(claimed.locked_at.is_some());
    assert!(JobRepo::claim(&pool, WEBHOOK_QUEUE, INVENTORY_JOB)
        .await
        .unwrap()
        .is_none());

    let claimed = JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, order.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_claims_never_share_a_job(pool: PgPool) {
    JobRepo::enqueue(&pool, &webhook_job(ORDER_JOB, 1))
        .await
        .unwrap()
        .unwrap();

    let (a, b) = tokio::join!(
        JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB),
        JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB),
    );
    let claimed: Vec<_> = [a.unwrap(), b.unwrap()].into_iter().flatten().collect();
    assert_eq!(claimed.len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn retry_is_not_claimable_before_run_at(pool: PgPool) {
    JobRepo::enqueue(&pool, &webhook_job(ORDER_JOB, 1))
        .await
        .unwrap()
        .unwrap();
    let claimed = JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB)
        .await
        .unwrap()
        .unwrap();

    let run_at = Utc::now() + Duration::minutes(5);
    let state = JobRepo::fail(&pool, claimed.id, "later", Some(run_at))
        .await
        .unwrap();
    assert_matches!(state, JobState::Retrying { .. });
    assert!(JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB)
        .await
        .unwrap()
        .is_none());

    let pending = JobRepo::find_pending_by_key(&pool, &webhook_job_key(ORDER_JOB, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.status(), Some(JobStatus::Waiting));
    assert_eq!(pending.attempts, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn continue_keeps_id_and_resets_attempts(pool: PgPool) {
    let job = webhook_job(ORDER_JOB, 1);
    JobRepo::enqueue(&pool, &job).await.unwrap().unwrap();
    let claimed = JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB)
        .await
        .unwrap()
        .unwrap();

    JobRepo::continue_with(&pool, claimed.id, &json!({"step": 2}))
        .await
        .unwrap();
    assert!(JobRepo::enqueue(&pool, &job).await.unwrap().is_none());

    let next = JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.id, claimed.id);
    assert_eq!(next.attempts, 1);
    assert_eq!(next.payload, json!({"step": 2}));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stalled_jobs_return_to_waiting(pool: PgPool) {
    JobRepo::enqueue(&pool, &webhook_job(ORDER_JOB, 1))
        .await
        .unwrap()
        .unwrap();
    JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB)
        .await
        .unwrap()
        .unwrap();
    sqlx::query("UPDATE queued_jobs SET locked_at = NOW() - INTERVAL '1 hour'")
        .execute(&pool)
        .await
        .unwrap();

    let recovered = JobRepo::recover_stalled(&pool, Utc::now() - Duration::minutes(10))
        .await
        .unwrap();
    assert_eq!(recovered, 1);

    let job = JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.attempts, 2);
    assert_eq!(job.last_error.as_deref(), Some("job stalled"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn purge_keeps_recent_and_unfinished_jobs(pool: PgPool) {
    JobRepo::enqueue(&pool, &webhook_job(ORDER_JOB, 1))
        .await
        .unwrap()
        .unwrap();
    let done = JobRepo::claim(&pool, WEBHOOK_QUEUE, ORDER_JOB)
        .await
        .unwrap()
        .unwrap();
    JobRepo::complete(&pool, done.id).await.unwrap();
    JobRepo::enqueue(&pool, &webhook_job(ORDER_JOB, 2))
        .await
        .unwrap()
        .unwrap();

    let purged = JobRepo::purge_completed(&pool, Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(purged, 0);

    let purged = JobRepo::purge_completed(&pool, Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(purged, 1);
    assert!(JobRepo::find_pending_by_key(&pool, &webhook_job_key(ORDER_JOB, 2))
        .await
        .unwrap()
        .is_some());
}
