//! Operator routes: replay stored webhooks, inspect exhausted jobs, and
//! start catalog imports. Intended for an internal interface only.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use marketsync_core::error::CoreError;
use marketsync_core::events::EventFamily;
use marketsync_core::queue::{webhook_job_key, WebhookJobPayload};
use marketsync_core::types::{DbId, Platform};
use marketsync_db::models::job::NewJob;
use marketsync_worker::catalog_import;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Default page size for the failed-jobs listing.
const DEFAULT_FAILED_LIMIT: i64 = 50;

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// POST /api/v1/webhooks/{id}/replay
///
/// Resets the record to `PENDING` and queues it again. The stored payload
/// is never modified. Returns 202 with the new job.
pub async fn replay_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let record = state
        .store
        .find_webhook(webhook_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "WebhookRecord",
            id: webhook_id,
        }))?;

    let job_name = EventFamily::of(&record.event_type)
        .job_name()
        .ok_or_else(|| CoreError::NoProcessor(record.event_type.clone()))?;

    let already_queued = || AppError::Core(CoreError::AlreadyQueued(webhook_id));
    if state
        .store
        .find_pending_job(&webhook_job_key(job_name, webhook_id))
        .await?
        .is_some()
    {
        return Err(already_queued());
    }

    state.store.reset_webhook_for_replay(webhook_id).await?;
    let job = NewJob::webhook(
        job_name,
        &WebhookJobPayload {
            webhook_id,
            tenant_id: record.tenant_id,
            platform: record.platform.clone(),
            event_type: record.event_type.clone(),
        },
    )
    .map_err(marketsync_db::StoreError::from)?;
    let job = state.store.enqueue(&job).await?.ok_or_else(already_queued)?;

    tracing::info!(
        webhook_id,
        job_id = job.id,
        previous_status = ?record.status(),
        "Webhook replay queued",
    );

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// Failed jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FailedJobsQuery {
    pub queue: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/v1/jobs/failed?queue=&limit=
///
/// Jobs that exhausted their attempts, newest first. `limit` is clamped
/// to 1..=100.
pub async fn list_failed_jobs(
    State(state): State<AppState>,
    Query(params): Query<FailedJobsQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_FAILED_LIMIT);
    let jobs = state
        .store
        .list_failed_jobs(params.queue.as_deref(), limit)
        .await?;
    Ok(Json(DataResponse { data: jobs }))
}

// ---------------------------------------------------------------------------
// Catalog import
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ImportScheduled {
    pub tenant_id: DbId,
    pub queued: bool,
}

/// POST /api/v1/tenants/{id}/catalog-import
///
/// Queues a full catalog import for the tenant's Shopee shop. Returns 202
/// when queued, or 200 with `queued: false` when an import is already in
/// flight. 404 when the tenant has no active integration.
pub async fn start_catalog_import(
    State(state): State<AppState>,
    Path(tenant_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let active = state
        .store
        .find_integration_for_tenant(tenant_id, Platform::Shopee)
        .await?
        .is_some_and(|i| i.is_active());
    if !active {
        return Err(AppError::NotFound(format!(
            "Tenant {tenant_id} has no active Shopee integration"
        )));
    }

    let queued = catalog_import::schedule(&*state.store, tenant_id).await?;
    tracing::info!(tenant_id, queued, "Catalog import requested");

    let status = if queued {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(DataResponse {
            data: ImportScheduled { tenant_id, queued },
        }),
    ))
}
