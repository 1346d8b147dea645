mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use marketsync_core::payload::ProductFields;
use marketsync_core::queue::{CatalogImportPayload, CATALOG_IMPORT_JOB, CATALOG_IMPORT_QUEUE};
use marketsync_core::retry::RetryPolicy;
use marketsync_core::types::Platform;
use marketsync_db::models::status::{IntegrationHealth, JobStatus};
use marketsync_db::{IntegrationStore, ProductStore, Store};
use marketsync_shopee::{
    CatalogItem, CatalogPage, MarketplaceClient, RefreshedToken, ShopCredentials, ShopeeError,
};
use marketsync_worker::catalog_import::{self, CatalogImportWorker};
use marketsync_worker::{QueueWorker, WorkerOptions};

use common::{fixture, Fixture};

/// Serves scripted pages keyed by offset and only accepts `valid_token`.
struct FakeShop {
    pages: HashMap<i64, CatalogPage>,
    valid_token: Mutex<String>,
    refresh: Mutex<Option<RefreshedToken>>,
    tokens_seen: Mutex<Vec<String>>,
    refreshes: Mutex<u32>,
}

impl FakeShop {
    fn new(pages: Vec<(i64, CatalogPage)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            valid_token: Mutex::new("access".into()),
            refresh: Mutex::new(None),
            tokens_seen: Mutex::new(Vec::new()),
            refreshes: Mutex::new(0),
        }
    }

    /// Reject the current token; a refresh hands out `new_token`.
    fn expire_token(self, new_token: Option<&str>) -> Self {
        *self.valid_token.lock().unwrap() = new_token.unwrap_or("never").to_string();
        *self.refresh.lock().unwrap() = new_token.map(|token| RefreshedToken {
            access_token: token.to_string(),
            refresh_token: format!("{token}-refresh"),
            expires_in: 14_400,
        });
        self
    }
}

#[async_trait]
impl MarketplaceClient for FakeShop {
    async fn fetch_catalog_page(
        &self,
        credentials: &ShopCredentials,
        offset: i64,
        _page_size: i64,
    ) -> Result<CatalogPage, ShopeeError> {
        self.tokens_seen
            .lock()
            .unwrap()
            .push(credentials.access_token.clone());
        if credentials.access_token != *self.valid_token.lock().unwrap() {
            return Err(ShopeeError::Api {
                status: 403,
                error: "invalid_acceess_token".into(),
                message: "expired".into(),
            });
        }
        self.pages
            .get(&offset)
            .cloned()
            .ok_or_else(|| ShopeeError::Decode(format!("no page at {offset}")))
    }

    async fn refresh_access_token(
        &self,
        _shop_id: &str,
        _refresh_token: &str,
    ) -> Result<RefreshedToken, ShopeeError> {
        *self.refreshes.lock().unwrap() += 1;
        self.refresh.lock().unwrap().clone().ok_or(ShopeeError::Api {
            status: 400,
            error: "error_param".into(),
            message: "refresh token revoked".into(),
        })
    }
}

fn item(id: &str, stock: i32) -> CatalogItem {
    CatalogItem {
        item_id: id.into(),
        fields: ProductFields {
            name: Some(format!("Item {id}")),
            stock: Some(stock),
            ..Default::default()
        },
    }
}

fn page(items: Vec<CatalogItem>, next_offset: i64, has_next_page: bool) -> CatalogPage {
    CatalogPage {
        items,
        has_next_page,
        next_offset,
    }
}

fn two_pages() -> Vec<(i64, CatalogPage)> {
    vec![
        (0, page(vec![item("1", 5), item("2", 6)], 2, true)),
        (2, page(vec![item("3", 7)], 3, false)),
    ]
}

fn worker(f: &Fixture, shop: Arc<FakeShop>) -> QueueWorker {
    let store: Arc<dyn Store> = f.store.clone();
    QueueWorker::new(
        CATALOG_IMPORT_QUEUE,
        CATALOG_IMPORT_JOB,
        Arc::clone(&store),
        Arc::new(CatalogImportWorker::new(store, shop).with_page_size(2)),
        WorkerOptions::new(1, RetryPolicy::catalog_import()),
    )
}

#[tokio::test]
async fn only_one_import_is_queued_per_tenant() {
    let f = fixture().await;
    assert!(catalog_import::schedule(&*f.store, f.tenant_id).await.unwrap());
    assert!(!catalog_import::schedule(&*f.store, f.tenant_id).await.unwrap());
    assert_eq!(f.store.jobs().await.len(), 1);
}

#[tokio::test]
async fn pages_continue_under_the_same_job() {
    let f = fixture().await;
    let shop = Arc::new(FakeShop::new(two_pages()));
    let worker = worker(&f, shop);
    catalog_import::schedule(&*f.store, f.tenant_id).await.unwrap();
    let job_id = f.store.jobs().await[0].id;

    assert!(worker.run_once().await.unwrap());
    let job = f.store.jobs().await.remove(0);
    assert_eq!(job.id, job_id);
    assert_eq!(job.status(), Some(JobStatus::Waiting));
    let next: CatalogImportPayload = job.payload_as().unwrap();
    assert_eq!(next.offset, 2);
    assert_eq!(f.store.products().await.len(), 2);

    // A second schedule while the import is in flight is a no-op.
    assert!(!catalog_import::schedule(&*f.store, f.tenant_id).await.unwrap());

    assert!(worker.run_once().await.unwrap());
    let jobs = f.store.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status(), Some(JobStatus::Completed));

    let integration = f.store.integrations().await.remove(0);
    assert_eq!(integration.catalog_import_offset, 3);
    assert_eq!(integration.catalog_imported_items, 3);
    assert!(integration.last_synced_at.is_some());
    let product = f.store.find_product(f.tenant_id, "3").await.unwrap().unwrap();
    assert_eq!(product.name, "Item 3");
    assert_eq!(product.stock, 7);
}

#[tokio::test]
async fn expired_token_is_refreshed_and_persisted() {
    let f = fixture().await;
    let shop = Arc::new(FakeShop::new(two_pages()).expire_token(Some("fresh")));
    let worker = worker(&f, Arc::clone(&shop));
    catalog_import::schedule(&*f.store, f.tenant_id).await.unwrap();

    assert!(worker.run_once().await.unwrap());

    assert_eq!(*shop.refreshes.lock().unwrap(), 1);
    assert_eq!(*shop.tokens_seen.lock().unwrap(), vec!["access", "fresh"]);
    let integration = f
        .store
        .find_integration_for_tenant(f.tenant_id, Platform::Shopee)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(integration.access_token, "fresh");
    assert_eq!(integration.refresh_token, "fresh-refresh");
    assert!(integration.token_expires_at.is_some());
    assert_eq!(integration.health(), Some(IntegrationHealth::Healthy));

    // The next page uses the stored token without another refresh.
    assert!(worker.run_once().await.unwrap());
    assert_eq!(*shop.refreshes.lock().unwrap(), 1);
    assert_eq!(f.store.products().await.len(), 3);
}

#[tokio::test]
async fn failed_refresh_marks_integration_unhealthy() {
    let f = fixture().await;
    let shop = Arc::new(FakeShop::new(two_pages()).expire_token(None));
    let worker = worker(&f, Arc::clone(&shop));
    catalog_import::schedule(&*f.store, f.tenant_id).await.unwrap();

    assert!(worker.run_once().await.unwrap());

    let integration = f.store.integrations().await.remove(0);
    assert_eq!(integration.health(), Some(IntegrationHealth::Unhealthy));
    assert_eq!(integration.failure_count, 1);
    assert!(integration.last_error.unwrap().contains("refresh token revoked"));
    assert!(f.store.products().await.is_empty());

    let job = f.store.jobs().await.remove(0);
    assert_eq!(job.status(), Some(JobStatus::Waiting));
    assert_matches!(job.last_error.as_deref(), Some(e) if e.contains("Marketplace error"));
}

#[tokio::test]
async fn non_auth_errors_do_not_touch_integration_health() {
    let f = fixture().await;
    let shop = Arc::new(FakeShop::new(Vec::new()));
    let worker = worker(&f, Arc::clone(&shop));
    catalog_import::schedule(&*f.store, f.tenant_id).await.unwrap();

    assert!(worker.run_once().await.unwrap());

    assert_eq!(*shop.refreshes.lock().unwrap(), 0);
    let integration = f.store.integrations().await.remove(0);
    assert_eq!(integration.health(), Some(IntegrationHealth::Healthy));
    assert_eq!(integration.failure_count, 0);
    assert_eq!(f.store.jobs().await[0].status(), Some(JobStatus::Waiting));
}

#[tokio::test]
async fn tenant_without_active_integration_finishes_quietly() {
    let f = fixture().await;
    let integration = f.store.integrations().await.remove(0);
    f.store
        .disconnect_integration(integration.id, "shop unlinked")
        .await
        .unwrap();
    let shop = Arc::new(FakeShop::new(two_pages()));
    let worker = worker(&f, Arc::clone(&shop));
    catalog_import::schedule(&*f.store, f.tenant_id).await.unwrap();

    assert!(worker.run_once().await.unwrap());

    assert!(shop.tokens_seen.lock().unwrap().is_empty());
    assert_eq!(f.store.jobs().await[0].status(), Some(JobStatus::Completed));
}

#[tokio::test]
async fn page_that_does_not_advance_ends_the_import() {
    let f = fixture().await;
    let shop = Arc::new(FakeShop::new(vec![
        (0, page(vec![item("1", 5), item("2", 6)], 2, true)),
        (2, page(Vec::new(), 2, true)),
    ]));
    let worker = worker(&f, Arc::clone(&shop));
    catalog_import::schedule(&*f.store, f.tenant_id).await.unwrap();

    assert!(worker.run_once().await.unwrap());
    assert!(worker.run_once().await.unwrap());
    assert!(!worker.run_once().await.unwrap());

    assert_eq!(shop.tokens_seen.lock().unwrap().len(), 2);
    let jobs = f.store.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status(), Some(JobStatus::Completed));
    let integration = f.store.integrations().await.remove(0);
    assert_eq!(integration.catalog_imported_items, 2);
    assert!(integration.last_synced_at.is_some());
}
