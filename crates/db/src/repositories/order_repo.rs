//! Repository for the `orders` table.

use marketsync_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::order::{Order, UpsertOrder, UNKNOWN_CUSTOMER_NAME, UNKNOWN_ORDER_STATUS};

/// Column list for `orders` queries.
const COLUMNS: &str = "\
    id, tenant_id, marketplace_order_id, order_number, status, total_amount, \
    customer_name, customer_email, customer_phone, shipping_address, items, \
    ordered_at, created_at, updated_at";

pub struct OrderRepo;

impl OrderRepo {
    /// Insert or refresh an order in a single statement.
    ///
    /// The conflict branch only touches status, total, and items, and
    /// keeps the stored value for any of them the event did not carry.
    /// Replaying the same event leaves the row unchanged apart from
    /// `updated_at`.
    pub async fn upsert(pool: &PgPool, input: &UpsertOrder) -> Result<Order, sqlx::Error> {
        let query = format!(
            "INSERT INTO orders \
                 (tenant_id, marketplace_order_id, order_number, status, total_amount, \
                  customer_name, customer_email, customer_phone, shipping_address, items, ordered_at) \
             VALUES ($1, $2, $3, COALESCE($4, $12), COALESCE($5, 0), COALESCE($6, $13), \
                     $7, $8, $9, COALESCE($10, '[]'::jsonb), $11) \
             ON CONFLICT (tenant_id, marketplace_order_id) DO UPDATE SET \
                 status = COALESCE($4, orders.status), \
                 total_amount = COALESCE($5, orders.total_amount), \
                 items = COALESCE($10, orders.items), \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(input.tenant_id)
            .bind(&input.marketplace_order_id)
            .bind(&input.order_number)
            .bind(&input.status)
            .bind(input.total_amount)
            .bind(&input.customer_name)
            .bind(&input.customer_email)
            .bind(&input.customer_phone)
            .bind(&input.shipping_address)
            .bind(input.items.as_ref().map(Json))
            .bind(input.ordered_at)
            .bind(UNKNOWN_ORDER_STATUS)
            .bind(UNKNOWN_CUSTOMER_NAME)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_marketplace_id(
        pool: &PgPool,
        tenant_id: DbId,
        marketplace_order_id: &str,
    ) -> Result<Option<Order>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM orders WHERE tenant_id = $1 AND marketplace_order_id = $2"
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(tenant_id)
            .bind(marketplace_order_id)
            .fetch_optional(pool)
            .await
    }
}
