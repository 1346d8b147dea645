//! In-memory implementation of every store trait.
//!
//! Mirrors the Postgres semantics closely enough for the receiver and
//! workers to be tested without a database: upserts are atomic under a
//! single lock, job keys are only reserved while a job is waiting or
//! active, and claims skip jobs that are not yet due. Data is lost when
//! the store is dropped.
//!
//! Tests can make the next N writes of a given kind fail to exercise the
//! retry paths.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use marketsync_core::payload::ProductFields;
use marketsync_core::types::{DbId, Platform, Timestamp};
use rust_decimal::Decimal;
use sqlx::types::Json;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::integration::{Integration, NewIntegration, TokenGrant};
use crate::models::job::{JobState, NewJob, QueuedJob};
use crate::models::order::{Order, UpsertOrder, UNKNOWN_CUSTOMER_NAME, UNKNOWN_ORDER_STATUS};
use crate::models::product::{Product, ProductUpsert, PLACEHOLDER_PRODUCT_NAME};
use crate::models::status::{ConnectionState, IntegrationHealth, JobStatus, WebhookStatus};
use crate::models::webhook::{NewWebhookRecord, WebhookRecord};
use crate::store::{
    IntegrationStore, JobQueue, OrderStore, ProductStore, StoreResult, WebhookStore,
};

/// Writes that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fault {
    IntegrationLookup,
    WebhookInsert,
    Enqueue,
    OrderUpsert,
    ProductWrite,
}

#[derive(Default)]
struct Inner {
    next_id: DbId,
    tenants: BTreeMap<DbId, String>,
    webhooks: BTreeMap<DbId, WebhookRecord>,
    orders: BTreeMap<(DbId, String), Order>,
    products: BTreeMap<(DbId, String), Product>,
    integrations: BTreeMap<DbId, Integration>,
    jobs: BTreeMap<DbId, QueuedJob>,
    faults: BTreeMap<Fault, u32>,
}

impl Inner {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn trip(&mut self, fault: Fault) -> StoreResult<()> {
        match self.faults.get_mut(&fault) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Unavailable(format!("injected {fault:?} failure")))
            }
            _ => Ok(()),
        }
    }

    fn webhook_mut(&mut self, id: DbId) -> StoreResult<&mut WebhookRecord> {
        self.webhooks.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "WebhookRecord",
            id,
        })
    }

    fn integration_mut(&mut self, id: DbId) -> StoreResult<&mut Integration> {
        self.integrations.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "Integration",
            id,
        })
    }

    fn job_mut(&mut self, id: DbId) -> StoreResult<&mut QueuedJob> {
        self.jobs.get_mut(&id).ok_or(StoreError::NotFound { entity: "QueuedJob", id })
    }
}

fn is_pending(job: &QueuedJob) -> bool {
    matches!(job.status(), Some(JobStatus::Waiting | JobStatus::Active))
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tenant and return its id.
    pub async fn add_tenant(&self, name: &str) -> DbId {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        inner.tenants.insert(id, name.to_string());
        id
    }

    /// Make the next `count` writes of the given kind fail.
    pub async fn inject_failures(&self, fault: Fault, count: u32) {
        self.inner.lock().await.faults.insert(fault, count);
    }

    /// Make every waiting job due now, skipping retry backoff.
    pub async fn expedite_jobs(&self) {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        for job in inner.jobs.values_mut() {
            if job.status() == Some(JobStatus::Waiting) {
                job.run_at = now;
            }
        }
    }

    /// Pretend every active job was locked at `locked_at`.
    pub async fn backdate_locks(&self, locked_at: Timestamp) {
        let mut inner = self.inner.lock().await;
        for job in inner.jobs.values_mut() {
            if job.locked_at.is_some() {
                job.locked_at = Some(locked_at);
            }
        }
    }

    pub async fn webhooks(&self) -> Vec<WebhookRecord> {
        self.inner.lock().await.webhooks.values().cloned().collect()
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.inner.lock().await.orders.values().cloned().collect()
    }

    pub async fn products(&self) -> Vec<Product> {
        self.inner.lock().await.products.values().cloned().collect()
    }

    pub async fn integrations(&self) -> Vec<Integration> {
        self.inner.lock().await.integrations.values().cloned().collect()
    }

    pub async fn jobs(&self) -> Vec<QueuedJob> {
        self.inner.lock().await.jobs.values().cloned().collect()
    }
}

#[async_trait]
impl WebhookStore for MemoryStore {
    async fn create_webhook(&self, input: &NewWebhookRecord) -> StoreResult<WebhookRecord> {
        let mut inner = self.inner.lock().await;
        inner.trip(Fault::WebhookInsert)?;
        let id = inner.next_id();
        let record = WebhookRecord {
            id,
            tenant_id: input.tenant_id,
            platform: input.platform.as_str().to_string(),
            event_type: input.event_type.clone(),
            raw_body: input.raw_body.clone(),
            payload: input.payload.clone(),
            signature: input.signature.clone(),
            status_id: WebhookStatus::Pending.id(),
            retry_count: 0,
            error_message: None,
            received_at: Utc::now(),
            processed_at: None,
        };
        inner.webhooks.insert(id, record.clone());
        Ok(record)
    }

    async fn find_webhook(&self, id: DbId) -> StoreResult<Option<WebhookRecord>> {
        Ok(self.inner.lock().await.webhooks.get(&id).cloned())
    }

    async fn mark_webhook_processing(&self, id: DbId) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.webhook_mut(id)?.status_id = WebhookStatus::Processing.id();
        Ok(())
    }

    async fn mark_webhook_completed(&self, id: DbId) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let record = inner.webhook_mut(id)?;
        record.status_id = WebhookStatus::Completed.id();
        record.processed_at = Some(Utc::now());
        record.error_message = None;
        Ok(())
    }

    async fn mark_webhook_failed(&self, id: DbId, error: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let record = inner.webhook_mut(id)?;
        record.status_id = WebhookStatus::Failed.id();
        record.error_message = Some(error.to_string());
        record.retry_count += 1;
        Ok(())
    }

    async fn reset_webhook_for_replay(&self, id: DbId) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let record = inner.webhook_mut(id)?;
        record.status_id = WebhookStatus::Pending.id();
        record.retry_count = 0;
        record.error_message = None;
        record.processed_at = None;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn upsert_order(&self, input: &UpsertOrder) -> StoreResult<Order> {
        let mut inner = self.inner.lock().await;
        inner.trip(Fault::OrderUpsert)?;
        let now = Utc::now();
        let key = (input.tenant_id, input.marketplace_order_id.clone());

        if let Some(existing) = inner.orders.get_mut(&key) {
            if let Some(status) = &input.status {
                existing.status = status.clone();
            }
            if let Some(total) = input.total_amount {
                existing.total_amount = total;
            }
            if let Some(items) = &input.items {
                existing.items = Json(items.clone());
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let id = inner.next_id();
        let order = Order {
            id,
            tenant_id: input.tenant_id,
            marketplace_order_id: input.marketplace_order_id.clone(),
            order_number: input.order_number.clone(),
            status: input
                .status
                .clone()
                .unwrap_or_else(|| UNKNOWN_ORDER_STATUS.to_string()),
            total_amount: input.total_amount.unwrap_or(Decimal::ZERO),
            customer_name: input
                .customer_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_CUSTOMER_NAME.to_string()),
            customer_email: input.customer_email.clone(),
            customer_phone: input.customer_phone.clone(),
            shipping_address: input.shipping_address.clone(),
            items: Json(input.items.clone().unwrap_or_default()),
            ordered_at: input.ordered_at,
            created_at: now,
            updated_at: now,
        };
        inner.orders.insert(key, order.clone());
        Ok(order)
    }

    async fn find_order(
        &self,
        tenant_id: DbId,
        marketplace_order_id: &str,
    ) -> StoreResult<Option<Order>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .get(&(tenant_id, marketplace_order_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn upsert_product(
        &self,
        tenant_id: DbId,
        marketplace_item_id: &str,
        create: &ProductFields,
        update: &ProductFields,
    ) -> StoreResult<ProductUpsert> {
        let mut inner = self.inner.lock().await;
        inner.trip(Fault::ProductWrite)?;
        let now = Utc::now();
        let key = (tenant_id, marketplace_item_id.to_string());

        if let Some(existing) = inner.products.get_mut(&key) {
            if let Some(name) = &update.name {
                existing.name = name.clone();
            }
            if update.sku.is_some() {
                existing.sku = update.sku.clone();
            }
            if let Some(stock) = update.stock {
                existing.stock = stock;
            }
            if let Some(price) = update.price {
                existing.price = price;
            }
            if update.image_url.is_some() {
                existing.image_url = update.image_url.clone();
            }
            existing.updated_at = now;
            return Ok(ProductUpsert {
                product: existing.clone(),
                inserted: false,
            });
        }

        let id = inner.next_id();
        let product = Product {
            id,
            tenant_id,
            marketplace_item_id: marketplace_item_id.to_string(),
            name: create
                .name
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_PRODUCT_NAME.to_string()),
            sku: create.sku.clone(),
            stock: create.stock.unwrap_or(0),
            price: create.price.unwrap_or(Decimal::ZERO),
            image_url: create.image_url.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.products.insert(key, product.clone());
        Ok(ProductUpsert {
            product,
            inserted: true,
        })
    }

    async fn delete_product(&self, tenant_id: DbId, marketplace_item_id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.trip(Fault::ProductWrite)?;
        Ok(inner
            .products
            .remove(&(tenant_id, marketplace_item_id.to_string()))
            .is_some())
    }

    async fn find_product(
        &self,
        tenant_id: DbId,
        marketplace_item_id: &str,
    ) -> StoreResult<Option<Product>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .products
            .get(&(tenant_id, marketplace_item_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl IntegrationStore for MemoryStore {
    async fn connect_integration(&self, input: &NewIntegration) -> StoreResult<Integration> {
        let mut inner = self.inner.lock().await;
        if !inner.tenants.contains_key(&input.tenant_id) {
            return Err(StoreError::NotFound {
                entity: "Tenant",
                id: input.tenant_id,
            });
        }
        let platform = input.platform.as_str();
        let shop_taken = inner.integrations.values().any(|i| {
            i.platform == platform
                && i.shop_id == input.shop_id
                && i.tenant_id != input.tenant_id
                && i.is_active()
        });
        if shop_taken {
            return Err(StoreError::Conflict(format!(
                "shop {} is already connected to another tenant",
                input.shop_id
            )));
        }

        let now = Utc::now();
        let existing = inner
            .integrations
            .values()
            .find(|i| i.tenant_id == input.tenant_id && i.platform == platform)
            .map(|i| {
                (
                    i.id,
                    i.created_at,
                    i.catalog_import_offset,
                    i.catalog_imported_items,
                    i.last_synced_at,
                )
            });
        let (id, created_at, offset, imported, last_synced_at) = match existing {
            Some(found) => found,
            None => (inner.next_id(), now, 0, 0, None),
        };

        let integration = Integration {
            id,
            tenant_id: input.tenant_id,
            platform: platform.to_string(),
            shop_id: input.shop_id.clone(),
            access_token: input.access_token.clone(),
            refresh_token: input.refresh_token.clone(),
            token_expires_at: input.token_expires_at,
            health_id: IntegrationHealth::Healthy.id(),
            connection_state_id: ConnectionState::Active.id(),
            failure_count: 0,
            last_error: None,
            catalog_import_offset: offset,
            catalog_imported_items: imported,
            last_synced_at,
            created_at,
            updated_at: now,
        };
        inner.integrations.insert(id, integration.clone());
        Ok(integration)
    }

    async fn find_active_integration_by_shop(
        &self,
        platform: Platform,
        shop_id: &str,
    ) -> StoreResult<Option<Integration>> {
        let mut inner = self.inner.lock().await;
        inner.trip(Fault::IntegrationLookup)?;
        Ok(inner
            .integrations
            .values()
            .find(|i| i.platform == platform.as_str() && i.shop_id == shop_id && i.is_active())
            .cloned())
    }

    async fn find_integration_for_tenant(
        &self,
        tenant_id: DbId,
        platform: Platform,
    ) -> StoreResult<Option<Integration>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .integrations
            .values()
            .find(|i| i.tenant_id == tenant_id && i.platform == platform.as_str())
            .cloned())
    }

    async fn update_integration_tokens(&self, id: DbId, grant: &TokenGrant) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let integration = inner.integration_mut(id)?;
        integration.access_token = grant.access_token.clone();
        integration.refresh_token = grant.refresh_token.clone();
        integration.token_expires_at = grant.expires_at;
        integration.health_id = IntegrationHealth::Healthy.id();
        integration.updated_at = Utc::now();
        Ok(())
    }

    async fn record_import_progress(
        &self,
        id: DbId,
        next_offset: i64,
        imported: i64,
        finished: bool,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let integration = inner.integration_mut(id)?;
        let now = Utc::now();
        integration.catalog_import_offset = next_offset;
        integration.catalog_imported_items += imported;
        if finished {
            integration.last_synced_at = Some(now);
        }
        integration.failure_count = 0;
        integration.last_error = None;
        integration.health_id = IntegrationHealth::Healthy.id();
        integration.updated_at = now;
        Ok(())
    }

    async fn record_integration_failure(&self, id: DbId, error: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let integration = inner.integration_mut(id)?;
        integration.failure_count += 1;
        integration.last_error = Some(error.to_string());
        integration.health_id = IntegrationHealth::Unhealthy.id();
        integration.updated_at = Utc::now();
        Ok(())
    }

    async fn disconnect_integration(&self, id: DbId, reason: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let integration = inner.integration_mut(id)?;
        integration.connection_state_id = ConnectionState::Disconnected.id();
        integration.health_id = IntegrationHealth::Disconnected.id();
        integration.last_error = Some(reason.to_string());
        integration.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemoryStore {
    async fn enqueue(&self, job: &NewJob) -> StoreResult<Option<QueuedJob>> {
        let mut inner = self.inner.lock().await;
        inner.trip(Fault::Enqueue)?;
        if let Some(key) = &job.unique_key {
            let taken = inner
                .jobs
                .values()
                .any(|j| j.unique_key.as_ref() == Some(key) && is_pending(j));
            if taken {
                return Ok(None);
            }
        }

        let now = Utc::now();
        let id = inner.next_id();
        let queued = QueuedJob {
            id,
            queue: job.queue.clone(),
            name: job.name.clone(),
            unique_key: job.unique_key.clone(),
            payload: job.payload.clone(),
            status_id: JobStatus::Waiting.id(),
            attempts: 0,
            max_attempts: job.max_attempts,
            run_at: now,
            last_error: None,
            locked_at: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        };
        inner.jobs.insert(id, queued.clone());
        Ok(Some(queued))
    }

    async fn claim(&self, queue: &str, name: &str) -> StoreResult<Option<QueuedJob>> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let next = inner
            .jobs
            .values()
            .filter(|j| {
                j.queue == queue
                    && j.name == name
                    && j.status() == Some(JobStatus::Waiting)
                    && j.run_at <= now
            })
            .min_by_key(|j| (j.run_at, j.id))
            .map(|j| j.id);

        let Some(id) = next else {
            return Ok(None);
        };
        let job = inner.job_mut(id)?;
        job.status_id = JobStatus::Active.id();
        job.attempts += 1;
        job.locked_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn complete_job(&self, id: DbId) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let job = inner.job_mut(id)?;
        let now = Utc::now();
        job.status_id = JobStatus::Completed.id();
        job.locked_at = None;
        job.finished_at = Some(now);
        job.updated_at = now;
        Ok(())
    }

    async fn fail_job(
        &self,
        id: DbId,
        error: &str,
        retry_at: Option<Timestamp>,
    ) -> StoreResult<JobState> {
        let mut inner = self.inner.lock().await;
        let job = inner.job_mut(id)?;
        let now = Utc::now();
        job.last_error = Some(error.to_string());
        job.locked_at = None;
        job.updated_at = now;
        match retry_at {
            Some(run_at) => {
                job.status_id = JobStatus::Waiting.id();
                job.run_at = run_at;
                Ok(JobState::Retrying { run_at })
            }
            None => {
                job.status_id = JobStatus::Failed.id();
                job.finished_at = Some(now);
                Ok(JobState::Failed)
            }
        }
    }

    async fn continue_job(&self, id: DbId, payload: &serde_json::Value) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let job = inner.job_mut(id)?;
        let now = Utc::now();
        job.status_id = JobStatus::Waiting.id();
        job.payload = payload.clone();
        job.attempts = 0;
        job.last_error = None;
        job.run_at = now;
        job.locked_at = None;
        job.updated_at = now;
        Ok(())
    }

    async fn find_pending_job(&self, unique_key: &str) -> StoreResult<Option<QueuedJob>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .jobs
            .values()
            .find(|j| j.unique_key.as_deref() == Some(unique_key) && is_pending(j))
            .cloned())
    }

    async fn list_failed_jobs(
        &self,
        queue: Option<&str>,
        limit: i64,
    ) -> StoreResult<Vec<QueuedJob>> {
        let inner = self.inner.lock().await;
        let mut failed: Vec<QueuedJob> = inner
            .jobs
            .values()
            .filter(|j| j.status() == Some(JobStatus::Failed))
            .filter(|j| queue.is_none_or(|q| j.queue == q))
            .cloned()
            .collect();
        failed.sort_by(|a, b| (b.finished_at, b.id).cmp(&(a.finished_at, a.id)));
        failed.truncate(usize::try_from(limit.clamp(1, 100)).unwrap_or(100));
        Ok(failed)
    }

    async fn recover_stalled_jobs(&self, locked_before: Timestamp) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut recovered = 0;
        for job in inner.jobs.values_mut() {
            let stalled = job.status() == Some(JobStatus::Active)
                && job.locked_at.is_some_and(|at| at < locked_before);
            if !stalled {
                continue;
            }
            if job.attempts >= job.max_attempts {
                job.status_id = JobStatus::Failed.id();
                job.finished_at = Some(now);
            } else {
                job.status_id = JobStatus::Waiting.id();
            }
            job.last_error.get_or_insert_with(|| "job stalled".to_string());
            job.run_at = now;
            job.locked_at = None;
            job.updated_at = now;
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn purge_completed_jobs(&self, finished_before: Timestamp) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let before = inner.jobs.len();
        inner.jobs.retain(|_, j| {
            !(j.status() == Some(JobStatus::Completed)
                && j.finished_at.is_some_and(|at| at < finished_before))
        });
        Ok((before - inner.jobs.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use marketsync_core::queue::{CatalogImportPayload, WebhookJobPayload, ORDER_JOB, WEBHOOK_QUEUE};

    fn webhook_job(webhook_id: DbId) -> NewJob {
        NewJob::webhook(
            ORDER_JOB,
            &WebhookJobPayload {
                webhook_id,
                tenant_id: 1,
                platform: "shopee".into(),
                event_type: "order.created".into(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected_while_pending() {
        let store = MemoryStore::new();
        let first = store.enqueue(&webhook_job(7)).await.unwrap();
        assert!(first.is_some());
        assert!(store.enqueue(&webhook_job(7)).await.unwrap().is_none());

        let claimed = store.claim(WEBHOOK_QUEUE, ORDER_JOB).await.unwrap().unwrap();
        assert!(store.enqueue(&webhook_job(7)).await.unwrap().is_none());

        store.complete_job(claimed.id).await.unwrap();
        assert!(store.enqueue(&webhook_job(7)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn claim_is_partitioned_by_name_and_counts_attempts() {
        let store = MemoryStore::new();
        store.enqueue(&webhook_job(1)).await.unwrap();

        assert!(store.claim(WEBHOOK_QUEUE, "inventory").await.unwrap().is_none());
        let job = store.claim(WEBHOOK_QUEUE, ORDER_JOB).await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);
        assert_eq!(job.status(), Some(JobStatus::Active));
        assert!(store.claim(WEBHOOK_QUEUE, ORDER_JOB).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retry_waits_until_run_at() {
        let store = MemoryStore::new();
        store.enqueue(&webhook_job(1)).await.unwrap();
        let job = store.claim(WEBHOOK_QUEUE, ORDER_JOB).await.unwrap().unwrap();

        let later = Utc::now() + Duration::seconds(60);
        let state = store.fail_job(job.id, "boom", Some(later)).await.unwrap();
        assert_eq!(state, JobState::Retrying { run_at: later });
        assert!(store.claim(WEBHOOK_QUEUE, ORDER_JOB).await.unwrap().is_none());

        store.expedite_jobs().await;
        let again = store.claim(WEBHOOK_QUEUE, ORDER_JOB).await.unwrap().unwrap();
        assert_eq!(again.id, job.id);
        assert_eq!(again.attempts, 2);
        assert_eq!(again.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn permanent_failure_is_retained_and_listed() {
        let store = MemoryStore::new();
        store.enqueue(&webhook_job(1)).await.unwrap();
        let job = store.claim(WEBHOOK_QUEUE, ORDER_JOB).await.unwrap().unwrap();
        assert_eq!(store.fail_job(job.id, "fatal", None).await.unwrap(), JobState::Failed);

        let failed = store.list_failed_jobs(Some(WEBHOOK_QUEUE), 10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].last_error.as_deref(), Some("fatal"));
        assert!(store.list_failed_jobs(Some("catalog-import"), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn continue_keeps_id_and_key() {
        let store = MemoryStore::new();
        let payload = CatalogImportPayload { tenant_id: 3, offset: 0 };
        let job = store
            .enqueue(&NewJob::catalog_import(&payload).unwrap())
            .await
            .unwrap()
            .unwrap();
        let claimed = store.claim("catalog-import", "import").await.unwrap().unwrap();

        let next = serde_json::json!({"tenant_id": 3, "offset": 50});
        store.continue_job(claimed.id, &next).await.unwrap();

        let pending = store.find_pending_job("catalog-import:3").await.unwrap().unwrap();
        assert_eq!(pending.id, job.id);
        assert_eq!(pending.attempts, 0);
        assert_eq!(pending.payload_as::<CatalogImportPayload>().unwrap().offset, 50);
    }

    #[tokio::test]
    async fn stalled_jobs_are_recovered() {
        let store = MemoryStore::new();
        store.enqueue(&webhook_job(1)).await.unwrap();
        store.claim(WEBHOOK_QUEUE, ORDER_JOB).await.unwrap().unwrap();
        store.backdate_locks(Utc::now() - Duration::minutes(10)).await;

        let recovered = store
            .recover_stalled_jobs(Utc::now() - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(recovered, 1);
        assert!(store.claim(WEBHOOK_QUEUE, ORDER_JOB).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn purge_removes_only_old_completed_jobs() {
        let store = MemoryStore::new();
        store.enqueue(&webhook_job(1)).await.unwrap();
        store.enqueue(&webhook_job(2)).await.unwrap();
        let job = store.claim(WEBHOOK_QUEUE, ORDER_JOB).await.unwrap().unwrap();
        store.complete_job(job.id).await.unwrap();

        let purged = store
            .purge_completed_jobs(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn product_upsert_inserts_then_merges() {
        let store = MemoryStore::new();
        let create = ProductFields {
            stock: Some(4),
            ..Default::default()
        };
        let first = store.upsert_product(1, "A", &create, &create).await.unwrap();
        assert!(first.inserted);
        assert_eq!(first.product.name, PLACEHOLDER_PRODUCT_NAME);
        assert_eq!(first.product.price, Decimal::ZERO);

        let update = ProductFields {
            name: Some("Widget".into()),
            ..Default::default()
        };
        let second = store.upsert_product(1, "A", &update, &update).await.unwrap();
        assert!(!second.inserted);
        assert_eq!(second.product.id, first.product.id);
        assert_eq!(second.product.name, "Widget");
        assert_eq!(second.product.stock, 4);
    }

    #[tokio::test]
    async fn injected_faults_fail_then_clear() {
        let store = MemoryStore::new();
        store.inject_failures(Fault::Enqueue, 1).await;
        assert_matches!(
            store.enqueue(&webhook_job(1)).await,
            Err(StoreError::Unavailable(_))
        );
        assert!(store.enqueue(&webhook_job(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn shop_can_only_belong_to_one_active_tenant() {
        let store = MemoryStore::new();
        let a = store.add_tenant("a").await;
        let b = store.add_tenant("b").await;
        let input = |tenant_id| NewIntegration {
            tenant_id,
            platform: Platform::Shopee,
            shop_id: "55".into(),
            access_token: "at".into(),
            refresh_token: "rt".into(),
            token_expires_at: None,
        };

        let first = store.connect_integration(&input(a)).await.unwrap();
        assert_matches!(
            store.connect_integration(&input(b)).await,
            Err(StoreError::Conflict(_))
        );

        store.disconnect_integration(first.id, "revoked").await.unwrap();
        assert!(store
            .find_active_integration_by_shop(Platform::Shopee, "55")
            .await
            .unwrap()
            .is_none());
        let second = store.connect_integration(&input(b)).await.unwrap();
        assert_eq!(
            store
                .find_active_integration_by_shop(Platform::Shopee, "55")
                .await
                .unwrap()
                .map(|i| i.tenant_id),
            Some(second.tenant_id)
        );
    }

    #[tokio::test]
    async fn reconnect_keeps_last_sync_time() {
        let store = MemoryStore::new();
        let tenant = store.add_tenant("t").await;
        let input = NewIntegration {
            tenant_id: tenant,
            platform: Platform::Shopee,
            shop_id: "55".into(),
            access_token: "at".into(),
            refresh_token: "rt".into(),
            token_expires_at: None,
        };
        let first = store.connect_integration(&input).await.unwrap();
        store.record_import_progress(first.id, 10, 10, true).await.unwrap();
        let synced = store.integrations().await[0].last_synced_at;
        assert!(synced.is_some());

        let again = store.connect_integration(&input).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.last_synced_at, synced);
    }

    #[tokio::test]
    async fn integration_lookup_fault_trips_once() {
        let store = MemoryStore::new();
        store.inject_failures(Fault::IntegrationLookup, 1).await;
        assert_matches!(
            store.find_active_integration_by_shop(Platform::Shopee, "1").await,
            Err(StoreError::Unavailable(_))
        );
        assert!(store
            .find_active_integration_by_shop(Platform::Shopee, "1")
            .await
            .unwrap()
            .is_none());
    }
}
