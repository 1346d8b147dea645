//! Paginated import of a tenant's marketplace catalog.
//!
//! One job imports one page and then continues itself with the next
//! offset under the same job id, so at most one import runs per tenant.
//! A page that claims more results without advancing the offset ends the
//! import.
//! An expired access token gets exactly one refresh per attempt; a failed
//! refresh marks the integration unhealthy and the error goes back to the
//! queue.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use marketsync_core::queue::CatalogImportPayload;
use marketsync_core::types::{DbId, Platform};
use marketsync_db::models::integration::{Integration, TokenGrant};
use marketsync_db::models::job::{NewJob, QueuedJob};
use marketsync_db::{Store, StoreError};
use marketsync_shopee::{CatalogPage, MarketplaceClient, ShopCredentials, ShopeeError};

use crate::error::ProcessError;
use crate::runner::{JobHandler, JobOutcome};

/// Items requested per page.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Queue an import for `tenant_id` starting at the first page.
///
/// Returns `false` when an import for the tenant is already queued or
/// running.
pub async fn schedule(store: &dyn Store, tenant_id: DbId) -> Result<bool, StoreError> {
    let job = NewJob::catalog_import(&CatalogImportPayload {
        tenant_id,
        offset: 0,
    })?;
    Ok(store.enqueue(&job).await?.is_some())
}

pub struct CatalogImportWorker {
    store: Arc<dyn Store>,
    marketplace: Arc<dyn MarketplaceClient>,
    page_size: i64,
}

impl CatalogImportWorker {
    pub fn new(store: Arc<dyn Store>, marketplace: Arc<dyn MarketplaceClient>) -> Self {
        Self {
            store,
            marketplace,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn fetch_page(
        &self,
        integration: &Integration,
        offset: i64,
    ) -> Result<CatalogPage, ProcessError> {
        let credentials = ShopCredentials {
            shop_id: integration.shop_id.clone(),
            access_token: integration.access_token.clone(),
        };
        match self
            .marketplace
            .fetch_catalog_page(&credentials, offset, self.page_size)
            .await
        {
            Ok(page) => Ok(page),
            Err(e) if e.is_auth_error() => {
                tracing::warn!(
                    tenant_id = integration.tenant_id,
                    shop_id = %integration.shop_id,
                    error = %e,
                    "Access token rejected, refreshing",
                );
                let access_token = self.refresh(integration).await?;
                let refreshed = ShopCredentials {
                    access_token,
                    ..credentials
                };
                Ok(self
                    .marketplace
                    .fetch_catalog_page(&refreshed, offset, self.page_size)
                    .await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Refresh and persist the token pair, returning the new access token.
    async fn refresh(&self, integration: &Integration) -> Result<String, ProcessError> {
        let token = match self
            .marketplace
            .refresh_access_token(&integration.shop_id, &integration.refresh_token)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                self.mark_unhealthy(integration, &e).await;
                return Err(e.into());
            }
        };

        let grant = TokenGrant {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token,
            expires_at: (token.expires_in > 0)
                .then(|| Utc::now() + chrono::Duration::seconds(token.expires_in)),
        };
        self.store
            .update_integration_tokens(integration.id, &grant)
            .await?;
        tracing::info!(tenant_id = integration.tenant_id, "Access token refreshed");
        Ok(token.access_token)
    }

    async fn mark_unhealthy(&self, integration: &Integration, error: &ShopeeError) {
        tracing::error!(
            tenant_id = integration.tenant_id,
            integration_id = integration.id,
            error = %error,
            "Token refresh failed, marking integration unhealthy",
        );
        if let Err(e) = self
            .store
            .record_integration_failure(integration.id, &error.to_string())
            .await
        {
            tracing::error!(integration_id = integration.id, error = %e, "Failed to record integration failure");
        }
    }
}

#[async_trait]
impl JobHandler for CatalogImportWorker {
    async fn handle(&self, job: &QueuedJob) -> Result<JobOutcome, ProcessError> {
        let payload: CatalogImportPayload = job.payload_as()?;

        let integration = self
            .store
            .find_integration_for_tenant(payload.tenant_id, Platform::Shopee)
            .await?;
        let Some(integration) = integration.filter(Integration::is_active) else {
            tracing::warn!(
                tenant_id = payload.tenant_id,
                "No active integration, nothing to import",
            );
            return Ok(JobOutcome::Done);
        };

        let page = self.fetch_page(&integration, payload.offset).await?;

        let mut imported = 0_i64;
        for item in &page.items {
            self.store
                .upsert_product(payload.tenant_id, &item.item_id, &item.fields, &item.fields)
                .await?;
            imported += 1;
        }

        let stalled = page.has_next_page && page.next_offset <= payload.offset;
        if stalled {
            tracing::warn!(
                tenant_id = payload.tenant_id,
                offset = payload.offset,
                next_offset = page.next_offset,
                "Marketplace reported another page without advancing, ending import",
            );
        }
        let finished = !page.has_next_page || stalled;
        self.store
            .record_import_progress(integration.id, page.next_offset, imported, finished)
            .await?;

        tracing::info!(
            tenant_id = payload.tenant_id,
            offset = payload.offset,
            imported,
            next_offset = page.next_offset,
            finished,
            "Catalog page imported",
        );

        if finished {
            return Ok(JobOutcome::Done);
        }
        let next = CatalogImportPayload {
            tenant_id: payload.tenant_id,
            offset: page.next_offset,
        };
        Ok(JobOutcome::Continue(serde_json::to_value(next)?))
    }
}
