//! Queue names, job payloads, and uniqueness keys shared by the receiver
//! and the workers.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Physical queue shared by order and inventory processing, partitioned
/// by job name.
pub const WEBHOOK_QUEUE: &str = "marketplace-webhooks";

/// Job name for order-family webhooks.
pub const ORDER_JOB: &str = "order";

/// Job name for product/inventory-family webhooks.
pub const INVENTORY_JOB: &str = "inventory";

/// Queue for paginated catalog imports.
pub const CATALOG_IMPORT_QUEUE: &str = "catalog-import";

/// Job name for catalog import pages.
pub const CATALOG_IMPORT_JOB: &str = "import";

/// Attempt ceiling for webhook processing jobs. Also the point at which
/// processors stop touching a webhook record.
pub const WEBHOOK_MAX_ATTEMPTS: u32 = 5;

/// Attempt ceiling for catalog import jobs.
pub const CATALOG_IMPORT_MAX_ATTEMPTS: u32 = 3;

/// Payload of a webhook processing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookJobPayload {
    pub webhook_id: DbId,
    pub tenant_id: DbId,
    pub platform: String,
    pub event_type: String,
}

/// Payload of a catalog import job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogImportPayload {
    pub tenant_id: DbId,
    #[serde(default)]
    pub offset: i64,
}

/// `event-family:webhookRecordId`
pub fn webhook_job_key(job_name: &str, webhook_id: DbId) -> String {
    format!("{job_name}:{webhook_id}")
}

/// One import in flight per tenant.
pub fn catalog_import_key(tenant_id: DbId) -> String {
    format!("{CATALOG_IMPORT_QUEUE}:{tenant_id}")
}
