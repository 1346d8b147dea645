use std::sync::Arc;

use marketsync_core::signature::SignatureVerifier;
use marketsync_db::Store;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Webhook records, integrations, and the job queue.
    pub store: Arc<dyn Store>,
    /// Checks webhook freshness and signatures.
    pub verifier: Arc<SignatureVerifier>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: ServerConfig) -> Self {
        let verifier = SignatureVerifier::new(config.shopee_partner_key.clone())
            .with_tolerance(config.webhook_timestamp_tolerance_secs);
        Self {
            store,
            verifier: Arc::new(verifier),
            config: Arc::new(config),
        }
    }
}
