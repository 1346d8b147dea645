#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use marketsync_api::config::ServerConfig;
use marketsync_api::router::build_app_router;
use marketsync_api::state::AppState;
use marketsync_core::queue::{INVENTORY_JOB, ORDER_JOB, WEBHOOK_QUEUE};
use marketsync_core::retry::RetryPolicy;
use marketsync_core::signature::SignatureVerifier;
use marketsync_core::types::{DbId, Platform};
use marketsync_db::models::integration::NewIntegration;
use marketsync_db::{IntegrationStore, MemoryStore, Store};
use marketsync_worker::processors::{InventoryProcessor, OrderProcessor};
use marketsync_worker::{QueueWorker, WorkerOptions};
use serde_json::Value;
use tower::ServiceExt;

pub const PARTNER_KEY: &str = "test-partner-key";
pub const PUBLIC_BASE_URL: &str = "https://hooks.example.com";
pub const AUTHORIZATION: &str = "partner-auth";
pub const SHOP_ID: &str = "1001";

/// Build a test `ServerConfig` with the test partner key.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        public_base_url: PUBLIC_BASE_URL.to_string(),
        shopee_partner_key: Some(PARTNER_KEY.to_string()),
        webhook_timestamp_tolerance_secs: 300,
    }
}

/// The full router over an in-memory store holding one tenant with an
/// active Shopee integration for [`SHOP_ID`].
pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub tenant_id: DbId,
}

pub async fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let tenant_id = store.add_tenant("Acme").await;
    store
        .connect_integration(&NewIntegration {
            tenant_id,
            platform: Platform::Shopee,
            shop_id: SHOP_ID.to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_expires_at: None,
        })
        .await
        .unwrap();

    let config = test_config();
    let state = AppState::new(store.clone(), config.clone());
    TestApp {
        app: build_app_router(state, &config),
        store,
        tenant_id,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// POST `body` to the Shopee receiver, signed for `timestamp`.
    pub async fn deliver_at(&self, body: &str, timestamp: i64) -> Response<Body> {
        self.send(signed_request(body, body, timestamp)).await
    }

    /// POST a freshly signed JSON payload to the Shopee receiver.
    pub async fn deliver(&self, payload: &Value) -> Response<Body> {
        self.deliver_at(&payload.to_string(), now()).await
    }

    pub fn worker(&self, job_name: &'static str) -> QueueWorker {
        let store: Arc<dyn Store> = self.store.clone();
        let handler: Arc<dyn marketsync_worker::JobHandler> = if job_name == ORDER_JOB {
            Arc::new(OrderProcessor::new(Arc::clone(&store)))
        } else {
            Arc::new(InventoryProcessor::new(Arc::clone(&store)))
        };
        QueueWorker::new(
            WEBHOOK_QUEUE,
            job_name,
            store,
            handler,
            WorkerOptions::new(1, RetryPolicy::webhook()),
        )
    }

    pub fn order_worker(&self) -> QueueWorker {
        self.worker(ORDER_JOB)
    }

    pub fn inventory_worker(&self) -> QueueWorker {
        self.worker(INVENTORY_JOB)
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A receiver request whose signature covers `signed_body` while the
/// request actually carries `sent_body`.
pub fn signed_request(signed_body: &str, sent_body: &str, timestamp: i64) -> Request<Body> {
    let path = format!("/webhooks/shopee?timestamp={timestamp}");
    let signature = SignatureVerifier::new(Some(PARTNER_KEY.to_string()))
        .sign(
            AUTHORIZATION,
            &format!("{PUBLIC_BASE_URL}{path}"),
            &timestamp.to_string(),
            signed_body.as_bytes(),
        )
        .unwrap();

    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("content-type", "application/json")
        .header("authorization", AUTHORIZATION)
        .header("x-shopee-signature", signature)
        .body(Body::from(sent_body.to_string()))
        .unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
