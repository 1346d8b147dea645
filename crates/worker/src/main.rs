use std::sync::Arc;
use std::time::Duration;

use marketsync_core::queue::{
    CATALOG_IMPORT_JOB, CATALOG_IMPORT_QUEUE, INVENTORY_JOB, ORDER_JOB, WEBHOOK_QUEUE,
};
use marketsync_core::retry::RetryPolicy;
use marketsync_db::{PgStore, Store};
use marketsync_shopee::{MarketplaceClient, ShopeeClient};
use marketsync_worker::background::{self, MaintenanceSettings};
use marketsync_worker::catalog_import::CatalogImportWorker;
use marketsync_worker::config::WorkerConfig;
use marketsync_worker::processors::{InventoryProcessor, OrderProcessor};
use marketsync_worker::{QueueWorker, WorkerOptions};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long in-flight jobs get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketsync_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        order_concurrency = config.order_concurrency,
        inventory_concurrency = config.inventory_concurrency,
        catalog_concurrency = config.catalog_concurrency,
        "Loaded worker configuration",
    );

    // --- Database ---
    let pool = marketsync_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    marketsync_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    marketsync_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let marketplace: Arc<dyn MarketplaceClient> = Arc::new(ShopeeClient::new(config.shopee.clone()));

    // --- Queue workers ---
    let workers = vec![
        QueueWorker::new(
            WEBHOOK_QUEUE,
            ORDER_JOB,
            Arc::clone(&store),
            Arc::new(OrderProcessor::new(Arc::clone(&store))),
            WorkerOptions::new(config.order_concurrency, RetryPolicy::webhook())
                .with_rate_limit(config.order_rate_limit)
                .with_poll_interval(config.poll_interval),
        ),
        QueueWorker::new(
            WEBHOOK_QUEUE,
            INVENTORY_JOB,
            Arc::clone(&store),
            Arc::new(InventoryProcessor::new(Arc::clone(&store))),
            WorkerOptions::new(config.inventory_concurrency, RetryPolicy::webhook())
                .with_rate_limit(config.inventory_rate_limit)
                .with_poll_interval(config.poll_interval),
        ),
        QueueWorker::new(
            CATALOG_IMPORT_QUEUE,
            CATALOG_IMPORT_JOB,
            Arc::clone(&store),
            Arc::new(
                CatalogImportWorker::new(Arc::clone(&store), marketplace)
                    .with_page_size(config.catalog_page_size),
            ),
            WorkerOptions::new(config.catalog_concurrency, RetryPolicy::catalog_import())
                .with_poll_interval(config.poll_interval),
        ),
    ];

    let cancel = CancellationToken::new();
    let mut handles: Vec<_> = workers
        .into_iter()
        .map(|worker| tokio::spawn(Arc::new(worker).run(cancel.clone())))
        .collect();

    // --- Maintenance ---
    handles.push(tokio::spawn(background::run(
        Arc::clone(&store),
        MaintenanceSettings {
            stalled_after: config.stalled_job_timeout,
            retain_completed: config.job_retention,
        },
        cancel.clone(),
    )));

    tracing::info!("Worker started");
    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    for handle in handles {
        if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
            tracing::warn!("Worker task did not stop within the drain timeout");
        }
    }
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
