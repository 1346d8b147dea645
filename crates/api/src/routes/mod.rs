pub mod health;
pub mod webhooks;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::operator;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /webhooks/{id}/replay                 re-queue a stored webhook (POST)
/// /jobs/failed                          exhausted jobs (GET)
/// /tenants/{id}/catalog-import          start a catalog import (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks/{id}/replay", post(operator::replay_webhook))
        .route("/jobs/failed", get(operator::list_failed_jobs))
        .route(
            "/tenants/{id}/catalog-import",
            post(operator::start_catalog_import),
        )
}
