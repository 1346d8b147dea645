//! Applies product and inventory webhooks to the `products` table.
//!
//! Deletions remove the row. Everything else is a single atomic upsert:
//! an unseen item is created from whatever the payload carries, and an
//! existing item only receives the fields its event type may touch.

use std::sync::Arc;

use async_trait::async_trait;
use marketsync_core::events::{EventFamily, InventoryAction};
use marketsync_core::payload::InventoryEvent;
use marketsync_db::models::job::QueuedJob;
use marketsync_db::models::webhook::WebhookRecord;
use marketsync_db::Store;

use crate::error::ProcessError;
use crate::runner::{JobHandler, JobOutcome};

pub struct InventoryProcessor {
    store: Arc<dyn Store>,
}

impl InventoryProcessor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn apply(&self, record: &WebhookRecord) -> Result<(), ProcessError> {
        let event = InventoryEvent::decode(&record.event_type, &record.payload)?;

        if event.action == InventoryAction::Deleted {
            let deleted = self
                .store
                .delete_product(record.tenant_id, &event.item_id)
                .await?;
            tracing::debug!(
                webhook_id = record.id,
                item_id = %event.item_id,
                deleted,
                "Product delete applied",
            );
            return Ok(());
        }

        let update = event.fields.restricted_to(event.action);
        let upserted = self
            .store
            .upsert_product(record.tenant_id, &event.item_id, &event.fields, &update)
            .await?;
        tracing::debug!(
            webhook_id = record.id,
            product_id = upserted.product.id,
            item_id = %event.item_id,
            action = ?event.action,
            inserted = upserted.inserted,
            "Product upserted",
        );
        Ok(())
    }
}

#[async_trait]
impl JobHandler for InventoryProcessor {
    async fn handle(&self, job: &QueuedJob) -> Result<JobOutcome, ProcessError> {
        let Some(record) = super::begin(&*self.store, job, EventFamily::Inventory).await? else {
            return Ok(JobOutcome::Done);
        };
        let result = self.apply(&record).await;
        super::finish(&*self.store, &record, result).await
    }
}
