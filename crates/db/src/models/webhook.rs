//! Received marketplace notifications.

use marketsync_core::types::{DbId, Platform, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{StatusId, WebhookStatus};

/// A row from the `webhook_records` table.
///
/// `raw_body` holds the request body exactly as signed; `payload` is the
/// same document parsed for querying. Neither is ever updated.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookRecord {
    pub id: DbId,
    pub tenant_id: DbId,
    pub platform: String,
    pub event_type: String,
    pub raw_body: String,
    pub payload: serde_json::Value,
    pub signature: String,
    pub status_id: StatusId,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub received_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}

impl WebhookRecord {
    pub fn status(&self) -> Option<WebhookStatus> {
        WebhookStatus::from_id(self.status_id)
    }
}

/// DTO for persisting a verified webhook.
#[derive(Debug, Clone)]
pub struct NewWebhookRecord {
    pub tenant_id: DbId,
    pub platform: Platform,
    pub event_type: String,
    pub raw_body: String,
    pub payload: serde_json::Value,
    pub signature: String,
}
