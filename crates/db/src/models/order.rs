//! Marketplace orders keyed by `(tenant_id, marketplace_order_id)`.

use marketsync_core::payload::LineItem;
use marketsync_core::types::{DbId, Timestamp};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `orders` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: DbId,
    pub tenant_id: DbId,
    pub marketplace_order_id: String,
    pub order_number: Option<String>,
    /// Marketplace-native status text.
    pub status: String,
    pub total_amount: Decimal,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub items: Json<Vec<LineItem>>,
    pub ordered_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Status stored when the first event for an order carries none.
pub const UNKNOWN_ORDER_STATUS: &str = "UNKNOWN";

/// Buyer name stored when the first event for an order carries none.
pub const UNKNOWN_CUSTOMER_NAME: &str = "Unknown customer";

/// DTO for the order upsert.
///
/// On insert every field is written, with defaults for missing status,
/// total, and items. On conflict only `status`, `total_amount`, `items`,
/// and `updated_at` change, each only when present; buyer identity keeps
/// its first-seen value.
#[derive(Debug, Clone)]
pub struct UpsertOrder {
    pub tenant_id: DbId,
    pub marketplace_order_id: String,
    pub order_number: Option<String>,
    pub status: Option<String>,
    pub total_amount: Option<Decimal>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub items: Option<Vec<LineItem>>,
    pub ordered_at: Option<Timestamp>,
}
