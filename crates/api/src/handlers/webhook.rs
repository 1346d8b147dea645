//! Inbound marketplace webhooks.
//!
//! The receiver checks freshness and the signature over the raw bytes,
//! resolves the shop to a tenant, persists the payload verbatim, and
//! queues it for the processor of its event family. Once a request has
//! passed verification it is acknowledged with 200 unless its shop is
//! unknown. Store faults during lookup, persistence, or enqueue are
//! logged and never surfaced to the sender.

use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, Uri};
use axum::Json;
use marketsync_core::events::{event_type_of, shop_id_of, EventFamily};
use marketsync_core::queue::WebhookJobPayload;
use marketsync_core::signature::SignatureError;
use marketsync_core::types::Platform;
use marketsync_db::models::job::NewJob;
use marketsync_db::models::webhook::{NewWebhookRecord, WebhookRecord};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::response::Ack;
use crate::state::AppState;

/// POST /webhooks/{platform}
///
/// Responses: 200 once accepted, 401 for a stale timestamp or bad
/// signature, 400 for a body that is not JSON, 404 for an unknown
/// platform or a shop with no active integration.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Ack>> {
    let platform = Platform::parse(&platform)
        .ok_or_else(|| AppError::NotFound(format!("Unknown platform '{platform}'")))?;

    let authorization = header_str(&headers, "authorization");
    let signature = header_str(&headers, platform.signature_header());
    let timestamp = query_param(&uri, "timestamp").unwrap_or_default();
    let url = signed_url(&state.config.public_base_url, &uri);

    if let Err(e) = state.verifier.check(
        authorization,
        &url,
        timestamp,
        &body,
        signature,
        chrono::Utc::now().timestamp(),
    ) {
        tracing::warn!(%platform, timestamp, reason = %e, "Webhook rejected");
        return Err(AppError::Unauthorized(
            match e {
                SignatureError::StaleTimestamp => "Invalid timestamp",
                SignatureError::InvalidSignature => "Invalid signature",
            }
            .to_string(),
        ));
    }

    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(%platform, error = %e, "Webhook body is not valid JSON");
        AppError::BadRequest("Invalid JSON payload".to_string())
    })?;

    let event_type = event_type_of(&payload);
    let Some(shop_id) = shop_id_of(&event_type, &payload) else {
        tracing::warn!(%platform, %event_type, "Webhook carries no shop id");
        return Err(AppError::NotFound("Shop not found".to_string()));
    };

    let integration = match state
        .store
        .find_active_integration_by_shop(platform, &shop_id)
        .await
    {
        Ok(Some(integration)) => integration,
        Ok(None) => {
            tracing::warn!(%platform, %event_type, %shop_id, "No active integration for shop");
            return Err(AppError::NotFound("Shop not found".to_string()));
        }
        Err(e) => {
            tracing::error!(
                %platform,
                %event_type,
                %shop_id,
                error = %e,
                "Tenant lookup failed, webhook dropped",
            );
            return Ok(Json(Ack::ok()));
        }
    };

    let input = NewWebhookRecord {
        tenant_id: integration.tenant_id,
        platform,
        event_type,
        raw_body: String::from_utf8_lossy(&body).into_owned(),
        payload,
        signature: signature.to_string(),
    };
    match state.store.create_webhook(&input).await {
        Ok(record) => {
            tracing::info!(
                webhook_id = record.id,
                tenant_id = record.tenant_id,
                %platform,
                event_type = %record.event_type,
                "Webhook received",
            );
            enqueue_processing(&state, &record).await;
        }
        Err(e) => tracing::error!(
            tenant_id = input.tenant_id,
            %platform,
            event_type = %input.event_type,
            error = %e,
            "Failed to persist webhook",
        ),
    }

    Ok(Json(Ack::ok()))
}

/// Queue the record for its family's processor. Failures are logged only.
async fn enqueue_processing(state: &AppState, record: &WebhookRecord) {
    let Some(job_name) = EventFamily::of(&record.event_type).job_name() else {
        tracing::debug!(
            webhook_id = record.id,
            event_type = %record.event_type,
            "No processor for event family, stored only",
        );
        return;
    };

    let job = NewJob::webhook(
        job_name,
        &WebhookJobPayload {
            webhook_id: record.id,
            tenant_id: record.tenant_id,
            platform: record.platform.clone(),
            event_type: record.event_type.clone(),
        },
    );
    let result = match job {
        Ok(job) => state.store.enqueue(&job).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(Some(job)) => {
            tracing::debug!(webhook_id = record.id, job_id = job.id, job_name, "Webhook queued")
        }
        Ok(None) => tracing::debug!(webhook_id = record.id, job_name, "Webhook already queued"),
        Err(e) => tracing::error!(
            webhook_id = record.id,
            job_name,
            error = %e,
            "Failed to queue webhook",
        ),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Raw value of a query parameter, as it appears on the wire.
fn query_param<'a>(uri: &'a Uri, name: &str) -> Option<&'a str> {
    uri.query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// The URL the marketplace signed: public origin plus path and query as received.
fn signed_url(public_base_url: &str, uri: &Uri) -> String {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{public_base_url}{path_and_query}")
}
