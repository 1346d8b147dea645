//! Repository for the `webhook_records` table.

use marketsync_core::types::DbId;
use sqlx::PgPool;

use crate::models::status::WebhookStatus;
use crate::models::webhook::{NewWebhookRecord, WebhookRecord};

/// Column list for `webhook_records` queries.
const COLUMNS: &str = "\
    id, tenant_id, platform, event_type, raw_body, payload, signature, \
    status_id, retry_count, error_message, received_at, processed_at";

/// Persistence for received webhooks.
pub struct WebhookRepo;

impl WebhookRepo {
    /// Insert a new record in `PENDING` status.
    pub async fn create(
        pool: &PgPool,
        input: &NewWebhookRecord,
    ) -> Result<WebhookRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhook_records \
                 (tenant_id, platform, event_type, raw_body, payload, signature, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookRecord>(&query)
            .bind(input.tenant_id)
            .bind(input.platform.as_str())
            .bind(&input.event_type)
            .bind(&input.raw_body)
            .bind(&input.payload)
            .bind(&input.signature)
            .bind(WebhookStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<WebhookRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM webhook_records WHERE id = $1");
        sqlx::query_as::<_, WebhookRecord>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Move a record to `PROCESSING` at the start of an attempt.
    pub async fn mark_processing(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE webhook_records SET status_id = $2 WHERE id = $1")
            .bind(id)
            .bind(WebhookStatus::Processing.id())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record a successful attempt. Clears any earlier error.
    pub async fn mark_completed(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhook_records \
             SET status_id = $2, processed_at = NOW(), error_message = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(WebhookStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt and bump `retry_count`.
    pub async fn mark_failed(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhook_records \
             SET status_id = $2, error_message = $3, retry_count = retry_count + 1 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(WebhookStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Reset a record to `PENDING` before an operator replay.
    pub async fn reset_for_replay(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhook_records \
             SET status_id = $2, retry_count = 0, error_message = NULL, processed_at = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(WebhookStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(())
    }
}
