//! Marketplace products keyed by `(tenant_id, marketplace_item_id)`.

use marketsync_core::types::{DbId, Timestamp};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Name used when a product is first seen without one.
pub const PLACEHOLDER_PRODUCT_NAME: &str = "Unnamed Product";

/// A row from the `products` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: DbId,
    pub tenant_id: DbId,
    pub marketplace_item_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub stock: i32,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Result of an atomic product upsert.
#[derive(Debug, Clone, FromRow)]
pub struct ProductUpsert {
    #[sqlx(flatten)]
    pub product: Product,
    /// `true` when the row did not exist before this statement.
    pub inserted: bool,
}
