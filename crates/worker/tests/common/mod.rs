#![allow(dead_code)]

use std::sync::Arc;

use marketsync_core::events::{event_type_of, EventFamily};
use marketsync_core::queue::{WebhookJobPayload, INVENTORY_JOB, ORDER_JOB, WEBHOOK_QUEUE};
use marketsync_core::retry::RetryPolicy;
use marketsync_core::types::{DbId, Platform};
use marketsync_db::models::integration::NewIntegration;
use marketsync_db::models::job::NewJob;
use marketsync_db::models::webhook::{NewWebhookRecord, WebhookRecord};
use marketsync_db::{IntegrationStore, JobQueue, MemoryStore, Store, WebhookStore};
use marketsync_worker::processors::{InventoryProcessor, OrderProcessor};
use marketsync_worker::{QueueWorker, WorkerOptions};
use serde_json::Value;

pub const SHOP_ID: &str = "1001";

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub tenant_id: DbId,
    pub orders: QueueWorker,
    pub inventory: QueueWorker,
}

/// A tenant with an active Shopee integration and both webhook workers.
pub async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let tenant_id = store.add_tenant("Acme").await;
    store
        .connect_integration(&NewIntegration {
            tenant_id,
            platform: Platform::Shopee,
            shop_id: SHOP_ID.into(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            token_expires_at: None,
        })
        .await
        .unwrap();

    let dyn_store: Arc<dyn Store> = store.clone();
    let orders = QueueWorker::new(
        WEBHOOK_QUEUE,
        ORDER_JOB,
        Arc::clone(&dyn_store),
        Arc::new(OrderProcessor::new(Arc::clone(&dyn_store))),
        WorkerOptions::new(1, RetryPolicy::webhook()),
    );
    let inventory = QueueWorker::new(
        WEBHOOK_QUEUE,
        INVENTORY_JOB,
        Arc::clone(&dyn_store),
        Arc::new(InventoryProcessor::new(Arc::clone(&dyn_store))),
        WorkerOptions::new(1, RetryPolicy::webhook()),
    );

    Fixture {
        store,
        tenant_id,
        orders,
        inventory,
    }
}

/// Persist a webhook record and queue it, the way the receiver does.
pub async fn deliver(store: &MemoryStore, tenant_id: DbId, payload: Value) -> WebhookRecord {
    let event_type = event_type_of(&payload);
    let record = store
        .create_webhook(&NewWebhookRecord {
            tenant_id,
            platform: Platform::Shopee,
            event_type: event_type.clone(),
            raw_body: payload.to_string(),
            payload,
            signature: "sig".into(),
        })
        .await
        .unwrap();

    if let Some(job_name) = EventFamily::of(&event_type).job_name() {
        let job = NewJob::webhook(
            job_name,
            &WebhookJobPayload {
                webhook_id: record.id,
                tenant_id,
                platform: "shopee".into(),
                event_type,
            },
        )
        .unwrap();
        store.enqueue(&job).await.unwrap();
    }
    record
}

pub async fn webhook(store: &MemoryStore, id: DbId) -> WebhookRecord {
    store.find_webhook(id).await.unwrap().unwrap()
}
