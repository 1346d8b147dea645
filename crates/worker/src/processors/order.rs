//! Applies order-family webhooks to the `orders` table.

use std::sync::Arc;

use async_trait::async_trait;
use marketsync_core::events::EventFamily;
use marketsync_core::payload::OrderEvent;
use marketsync_core::types::DbId;
use marketsync_db::models::job::QueuedJob;
use marketsync_db::models::order::UpsertOrder;
use marketsync_db::models::webhook::WebhookRecord;
use marketsync_db::Store;

use crate::error::ProcessError;
use crate::runner::{JobHandler, JobOutcome};

/// Upserts the order named by the webhook, keyed by
/// `(tenant_id, marketplace_order_id)`.
pub struct OrderProcessor {
    store: Arc<dyn Store>,
}

impl OrderProcessor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn apply(&self, record: &WebhookRecord) -> Result<(), ProcessError> {
        let event = OrderEvent::decode(&record.payload)?;
        let order = self
            .store
            .upsert_order(&upsert_from_event(record.tenant_id, event))
            .await?;
        tracing::debug!(
            webhook_id = record.id,
            order_id = order.id,
            marketplace_order_id = %order.marketplace_order_id,
            status = %order.status,
            "Order upserted",
        );
        Ok(())
    }
}

#[async_trait]
impl JobHandler for OrderProcessor {
    async fn handle(&self, job: &QueuedJob) -> Result<JobOutcome, ProcessError> {
        let Some(record) = super::begin(&*self.store, job, EventFamily::Order).await? else {
            return Ok(JobOutcome::Done);
        };
        let result = self.apply(&record).await;
        super::finish(&*self.store, &record, result).await
    }
}

fn upsert_from_event(tenant_id: DbId, event: OrderEvent) -> UpsertOrder {
    UpsertOrder {
        tenant_id,
        marketplace_order_id: event.order_id,
        order_number: event.order_number,
        status: event.status,
        total_amount: event.total_amount,
        customer_name: event.customer.name,
        customer_email: event.customer.email,
        customer_phone: event.customer.phone,
        shipping_address: event.customer.address,
        items: event.items,
        ordered_at: event.ordered_at,
    }
}
