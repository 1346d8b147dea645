#![allow(dead_code)]

use marketsync_core::types::DbId;
use sqlx::PgPool;

/// Insert a tenant row and return its id.
pub async fn create_tenant(pool: &PgPool, name: &str) -> DbId {
    sqlx::query_scalar("INSERT INTO tenants (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}
