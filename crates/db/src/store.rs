//! Storage seams used by the receiver and the workers.
//!
//! Each trait covers one aggregate. [`Store`] bundles them so a single
//! `Arc<dyn Store>` can be shared through application state. [`PgStore`]
//! delegates to the repositories; the in-memory implementation lives in
//! [`crate::memory`].

use async_trait::async_trait;
use marketsync_core::payload::ProductFields;
use marketsync_core::types::{DbId, Platform, Timestamp};

use crate::error::StoreError;
use crate::models::integration::{Integration, NewIntegration, TokenGrant};
use crate::models::job::{JobState, NewJob, QueuedJob};
use crate::models::order::{Order, UpsertOrder};
use crate::models::product::{Product, ProductUpsert};
use crate::models::webhook::{NewWebhookRecord, WebhookRecord};
use crate::repositories::{IntegrationRepo, JobRepo, OrderRepo, ProductRepo, WebhookRepo};
use crate::DbPool;

pub type StoreResult<T> = Result<T, StoreError>;

/// Received webhook records.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn create_webhook(&self, input: &NewWebhookRecord) -> StoreResult<WebhookRecord>;
    async fn find_webhook(&self, id: DbId) -> StoreResult<Option<WebhookRecord>>;
    async fn mark_webhook_processing(&self, id: DbId) -> StoreResult<()>;
    async fn mark_webhook_completed(&self, id: DbId) -> StoreResult<()>;
    /// Records the error and increments `retry_count`.
    async fn mark_webhook_failed(&self, id: DbId, error: &str) -> StoreResult<()>;
    async fn reset_webhook_for_replay(&self, id: DbId) -> StoreResult<()>;
}

/// Tenant-scoped orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn upsert_order(&self, input: &UpsertOrder) -> StoreResult<Order>;
    async fn find_order(&self, tenant_id: DbId, marketplace_order_id: &str)
        -> StoreResult<Option<Order>>;
}

/// Tenant-scoped products.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Insert with `create` or update existing columns from `update`,
    /// atomically with respect to concurrent callers.
    async fn upsert_product(
        &self,
        tenant_id: DbId,
        marketplace_item_id: &str,
        create: &ProductFields,
        update: &ProductFields,
    ) -> StoreResult<ProductUpsert>;
    async fn delete_product(&self, tenant_id: DbId, marketplace_item_id: &str) -> StoreResult<bool>;
    async fn find_product(&self, tenant_id: DbId, marketplace_item_id: &str)
        -> StoreResult<Option<Product>>;
}

/// Marketplace credentials and sync bookkeeping.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn connect_integration(&self, input: &NewIntegration) -> StoreResult<Integration>;
    async fn find_active_integration_by_shop(
        &self,
        platform: Platform,
        shop_id: &str,
    ) -> StoreResult<Option<Integration>>;
    async fn find_integration_for_tenant(
        &self,
        tenant_id: DbId,
        platform: Platform,
    ) -> StoreResult<Option<Integration>>;
    async fn update_integration_tokens(&self, id: DbId, grant: &TokenGrant) -> StoreResult<()>;
    async fn record_import_progress(
        &self,
        id: DbId,
        next_offset: i64,
        imported: i64,
        finished: bool,
    ) -> StoreResult<()>;
    async fn record_integration_failure(&self, id: DbId, error: &str) -> StoreResult<()>;
    async fn disconnect_integration(&self, id: DbId, reason: &str) -> StoreResult<()>;
}

/// Durable at-least-once job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// `None` when a job with the same key is already waiting or active.
    async fn enqueue(&self, job: &NewJob) -> StoreResult<Option<QueuedJob>>;
    async fn claim(&self, queue: &str, name: &str) -> StoreResult<Option<QueuedJob>>;
    async fn complete_job(&self, id: DbId) -> StoreResult<()>;
    async fn fail_job(&self, id: DbId, error: &str, retry_at: Option<Timestamp>)
        -> StoreResult<JobState>;
    async fn continue_job(&self, id: DbId, payload: &serde_json::Value) -> StoreResult<()>;
    async fn find_pending_job(&self, unique_key: &str) -> StoreResult<Option<QueuedJob>>;
    async fn list_failed_jobs(&self, queue: Option<&str>, limit: i64) -> StoreResult<Vec<QueuedJob>>;
    async fn recover_stalled_jobs(&self, locked_before: Timestamp) -> StoreResult<u64>;
    async fn purge_completed_jobs(&self, finished_before: Timestamp) -> StoreResult<u64>;
}

/// Everything the pipeline persists.
pub trait Store: WebhookStore + OrderStore + ProductStore + IntegrationStore + JobQueue {}

impl<T> Store for T where T: WebhookStore + OrderStore + ProductStore + IntegrationStore + JobQueue {}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookStore for PgStore {
    async fn create_webhook(&self, input: &NewWebhookRecord) -> StoreResult<WebhookRecord> {
        Ok(WebhookRepo::create(&self.pool, input).await?)
    }

    async fn find_webhook(&self, id: DbId) -> StoreResult<Option<WebhookRecord>> {
        Ok(WebhookRepo::find_by_id(&self.pool, id).await?)
    }

    async fn mark_webhook_processing(&self, id: DbId) -> StoreResult<()> {
        Ok(WebhookRepo::mark_processing(&self.pool, id).await?)
    }

    async fn mark_webhook_completed(&self, id: DbId) -> StoreResult<()> {
        Ok(WebhookRepo::mark_completed(&self.pool, id).await?)
    }

    async fn mark_webhook_failed(&self, id: DbId, error: &str) -> StoreResult<()> {
        Ok(WebhookRepo::mark_failed(&self.pool, id, error).await?)
    }

    async fn reset_webhook_for_replay(&self, id: DbId) -> StoreResult<()> {
        Ok(WebhookRepo::reset_for_replay(&self.pool, id).await?)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn upsert_order(&self, input: &UpsertOrder) -> StoreResult<Order> {
        Ok(OrderRepo::upsert(&self.pool, input).await?)
    }

    async fn find_order(
        &self,
        tenant_id: DbId,
        marketplace_order_id: &str,
    ) -> StoreResult<Option<Order>> {
        Ok(OrderRepo::find_by_marketplace_id(&self.pool, tenant_id, marketplace_order_id).await?)
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn upsert_product(
        &self,
        tenant_id: DbId,
        marketplace_item_id: &str,
        create: &ProductFields,
        update: &ProductFields,
    ) -> StoreResult<ProductUpsert> {
        Ok(ProductRepo::upsert(&self.pool, tenant_id, marketplace_item_id, create, update).await?)
    }

    async fn delete_product(&self, tenant_id: DbId, marketplace_item_id: &str) -> StoreResult<bool> {
        Ok(ProductRepo::delete(&self.pool, tenant_id, marketplace_item_id).await?)
    }

    async fn find_product(
        &self,
        tenant_id: DbId,
        marketplace_item_id: &str,
    ) -> StoreResult<Option<Product>> {
        Ok(ProductRepo::find_by_marketplace_id(&self.pool, tenant_id, marketplace_item_id).await?)
    }
}

#[async_trait]
impl IntegrationStore for PgStore {
    async fn connect_integration(&self, input: &NewIntegration) -> StoreResult<Integration> {
        Ok(IntegrationRepo::connect(&self.pool, input).await?)
    }

    async fn find_active_integration_by_shop(
        &self,
        platform: Platform,
        shop_id: &str,
    ) -> StoreResult<Option<Integration>> {
        Ok(IntegrationRepo::find_active_by_shop(&self.pool, platform, shop_id).await?)
    }

    async fn find_integration_for_tenant(
        &self,
        tenant_id: DbId,
        platform: Platform,
    ) -> StoreResult<Option<Integration>> {
        Ok(IntegrationRepo::find_for_tenant(&self.pool, tenant_id, platform).await?)
    }

    async fn update_integration_tokens(&self, id: DbId, grant: &TokenGrant) -> StoreResult<()> {
        Ok(IntegrationRepo::update_tokens(&self.pool, id, grant).await?)
    }

    async fn record_import_progress(
        &self,
        id: DbId,
        next_offset: i64,
        imported: i64,
        finished: bool,
    ) -> StoreResult<()> {
        Ok(
            IntegrationRepo::record_import_progress(&self.pool, id, next_offset, imported, finished)
                .await?,
        )
    }

    async fn record_integration_failure(&self, id: DbId, error: &str) -> StoreResult<()> {
        Ok(IntegrationRepo::record_failure(&self.pool, id, error).await?)
    }

    async fn disconnect_integration(&self, id: DbId, reason: &str) -> StoreResult<()> {
        Ok(IntegrationRepo::disconnect(&self.pool, id, reason).await?)
    }
}

#[async_trait]
impl JobQueue for PgStore {
    async fn enqueue(&self, job: &NewJob) -> StoreResult<Option<QueuedJob>> {
        Ok(JobRepo::enqueue(&self.pool, job).await?)
    }

    async fn claim(&self, queue: &str, name: &str) -> StoreResult<Option<QueuedJob>> {
        Ok(JobRepo::claim(&self.pool, queue, name).await?)
    }

    async fn complete_job(&self, id: DbId) -> StoreResult<()> {
        Ok(JobRepo::complete(&self.pool, id).await?)
    }

    async fn fail_job(
        &self,
        id: DbId,
        error: &str,
        retry_at: Option<Timestamp>,
    ) -> StoreResult<JobState> {
        Ok(JobRepo::fail(&self.pool, id, error, retry_at).await?)
    }

    async fn continue_job(&self, id: DbId, payload: &serde_json::Value) -> StoreResult<()> {
        Ok(JobRepo::continue_with(&self.pool, id, payload).await?)
    }

    async fn find_pending_job(&self, unique_key: &str) -> StoreResult<Option<QueuedJob>> {
        Ok(JobRepo::find_pending_by_key(&self.pool, unique_key).await?)
    }

    async fn list_failed_jobs(
        &self,
        queue: Option<&str>,
        limit: i64,
    ) -> StoreResult<Vec<QueuedJob>> {
        Ok(JobRepo::list_failed(&self.pool, queue, limit).await?)
    }

    async fn recover_stalled_jobs(&self, locked_before: Timestamp) -> StoreResult<u64> {
        Ok(JobRepo::recover_stalled(&self.pool, locked_before).await?)
    }

    async fn purge_completed_jobs(&self, finished_before: Timestamp) -> StoreResult<u64> {
        Ok(JobRepo::purge_completed(&self.pool, finished_before).await?)
    }
}
