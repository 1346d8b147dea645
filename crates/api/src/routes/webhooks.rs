use axum::routing::post;
use axum::Router;

use crate::handlers::webhook;
use crate::state::AppState;

/// Mount the marketplace-facing receiver (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/{platform}", post(webhook::receive_webhook))
}
