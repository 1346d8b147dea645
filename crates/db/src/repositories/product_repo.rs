//! Repository for the `products` table.

use marketsync_core::payload::ProductFields;
use marketsync_core::types::DbId;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::models::product::{Product, ProductUpsert, PLACEHOLDER_PRODUCT_NAME};

/// Column list for `products` queries.
const COLUMNS: &str = "\
    id, tenant_id, marketplace_item_id, name, sku, stock, price, image_url, \
    created_at, updated_at";

pub struct ProductRepo;

impl ProductRepo {
    /// Create-or-update in one statement.
    ///
    /// `create` supplies the values for a brand new row (placeholders fill
    /// the gaps). `update` supplies the values applied to an existing row;
    /// any `None` keeps the stored column. Concurrent first deliveries for
    /// the same item therefore converge on a single row.
    pub async fn upsert(
        pool: &PgPool,
        tenant_id: DbId,
        marketplace_item_id: &str,
        create: &ProductFields,
        update: &ProductFields,
    ) -> Result<ProductUpsert, sqlx::Error> {
        let query = format!(
            "INSERT INTO products \
                 (tenant_id, marketplace_item_id, name, sku, stock, price, image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (tenant_id, marketplace_item_id) DO UPDATE SET \
                 name = COALESCE($8, products.name), \
                 sku = COALESCE($9, products.sku), \
                 stock = COALESCE($10, products.stock), \
                 price = COALESCE($11, products.price), \
                 image_url = COALESCE($12, products.image_url), \
                 updated_at = NOW() \
             RETURNING {COLUMNS}, (xmax = 0) AS inserted"
        );
        sqlx::query_as::<_, ProductUpsert>(&query)
            .bind(tenant_id)
            .bind(marketplace_item_id)
            .bind(create.name.as_deref().unwrap_or(PLACEHOLDER_PRODUCT_NAME))
            .bind(&create.sku)
            .bind(create.stock.unwrap_or(0))
            .bind(create.price.unwrap_or(Decimal::ZERO))
            .bind(&create.image_url)
            .bind(&update.name)
            .bind(&update.sku)
            .bind(update.stock)
            .bind(update.price)
            .bind(&update.image_url)
            .fetch_one(pool)
            .await
    }

    /// Remove the product if present. Returns `true` when a row was deleted.
    pub async fn delete(
        pool: &PgPool,
        tenant_id: DbId,
        marketplace_item_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM products WHERE tenant_id = $1 AND marketplace_item_id = $2",
        )
        .bind(tenant_id)
        .bind(marketplace_item_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_marketplace_id(
        pool: &PgPool,
        tenant_id: DbId,
        marketplace_item_id: &str,
    ) -> Result<Option<Product>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM products WHERE tenant_id = $1 AND marketplace_item_id = $2"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(tenant_id)
            .bind(marketplace_item_id)
            .fetch_optional(pool)
            .await
    }
}
