//! Persistence for webhook records, orders, products, integrations, and
//! the durable job queue.
//!
//! Repositories are zero-sized structs with async methods taking `&PgPool`.
//! The traits in [`store`] are the seam the API server and workers depend
//! on; [`PgStore`] implements them over Postgres and [`MemoryStore`] in
//! memory for tests.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{
    IntegrationStore, JobQueue, OrderStore, PgStore, ProductStore, Store, StoreResult, WebhookStore,
};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
