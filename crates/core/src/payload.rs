//! Typed decoding of webhook payloads, one variant per event-type family.
//!
//! Decoding is permissive: only the native id is required, every other
//! field is optional and type mismatches are ignored rather than fatal.
//! The raw document itself is never modified; unknown fields survive in
//! the stored webhook record.

use chrono::TimeZone;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{id_string, integer_from_json, EventFamily, InventoryAction};
use crate::money::fixed_point_from_json;
use crate::types::Timestamp;

/// Errors from decoding a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Payload is missing required field `{0}`")]
    MissingField(&'static str),
}

/// A decoded webhook, tagged by event-type family.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Order(OrderEvent),
    Inventory(InventoryEvent),
    Unknown { event_type: String },
}

impl WebhookEvent {
    /// Decode `payload` according to the family of `event_type`.
    pub fn decode(event_type: &str, payload: &Value) -> Result<Self, PayloadError> {
        match EventFamily::of(event_type) {
            EventFamily::Order => OrderEvent::decode(payload).map(WebhookEvent::Order),
            EventFamily::Inventory => {
                InventoryEvent::decode(event_type, payload).map(WebhookEvent::Inventory)
            }
            EventFamily::Unknown => Ok(WebhookEvent::Unknown {
                event_type: event_type.to_string(),
            }),
        }
    }
}

/// Buyer identity as sent by the marketplace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Customer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// One ordered line, stored as part of the order's JSON item list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Fields of an order-family webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub order_id: String,
    pub order_number: Option<String>,
    pub status: Option<String>,
    pub total_amount: Option<Decimal>,
    pub customer: Customer,
    /// `None` when the payload carries no `items` array at all.
    pub items: Option<Vec<LineItem>>,
    pub ordered_at: Option<Timestamp>,
}

impl OrderEvent {
    pub fn decode(payload: &Value) -> Result<Self, PayloadError> {
        let body = order_body_of(payload)?;
        let order_id = body
            .get("order_id")
            .and_then(id_string)
            .ok_or(PayloadError::MissingField("order_id"))?;

        let address = body.get("recipient_address");
        let customer = Customer {
            name: first_str(body, &["buyer_username", "buyer_name"])
                .or_else(|| address.and_then(|a| str_field(a, "name"))),
            email: str_field(body, "buyer_email"),
            phone: address
                .and_then(|a| str_field(a, "phone"))
                .or_else(|| str_field(body, "buyer_phone")),
            address: address
                .and_then(|a| str_field(a, "full_address"))
                .or_else(|| str_field(body, "shipping_address")),
        };

        let items = body
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(LineItem::decode).collect());

        Ok(Self {
            order_id,
            order_number: str_field(body, "order_sn"),
            status: first_str(body, &["order_status", "status"]),
            total_amount: body.get("total_amount").and_then(fixed_point_from_json),
            customer,
            items,
            ordered_at: body
                .get("create_time")
                .and_then(integer_from_json)
                .and_then(|secs| chrono::Utc.timestamp_opt(secs, 0).single()),
        })
    }
}

impl LineItem {
    /// Decode one entry of `items[]`. Entries without an `item_id` are skipped.
    fn decode(value: &Value) -> Option<Self> {
        let item_id = value.get("item_id").and_then(id_string)?;
        Some(Self {
            item_id,
            name: first_str(value, &["item_name", "name"]).unwrap_or_default(),
            sku: first_str(value, &["item_sku", "sku"]),
            quantity: first_i64(value, &["quantity", "model_quantity_purchased"])
                .and_then(|q| i32::try_from(q).ok())
                .unwrap_or(1),
            unit_price: value
                .get("item_price")
                .and_then(fixed_point_from_json)
                .unwrap_or(Decimal::ZERO),
        })
    }
}

/// Product fields that an inventory-family webhook may carry. Every field
/// is optional; `None` means "not present", never "clear this value".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFields {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub stock: Option<i32>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
}

impl ProductFields {
    /// Keep only the fields the given action is allowed to touch on an
    /// existing product.
    pub fn restricted_to(&self, action: InventoryAction) -> ProductFields {
        match action {
            InventoryAction::StockUpdated => ProductFields {
                stock: self.stock,
                ..Default::default()
            },
            InventoryAction::PriceUpdated => ProductFields {
                price: self.price,
                ..Default::default()
            },
            InventoryAction::Updated | InventoryAction::Created => self.clone(),
            InventoryAction::Deleted => ProductFields::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ProductFields::default()
    }
}

/// Fields of an inventory-family webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryEvent {
    pub action: InventoryAction,
    pub item_id: String,
    pub fields: ProductFields,
}

impl InventoryEvent {
    pub fn decode(event_type: &str, payload: &Value) -> Result<Self, PayloadError> {
        let body = body_of(payload)?;
        let item_id = body
            .get("item_id")
            .and_then(id_string)
            .ok_or(PayloadError::MissingField("item_id"))?;

        let image_url = str_field(body, "image_url").or_else(|| {
            body.get("images")
                .and_then(Value::as_array)
                .and_then(|images| images.first())
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        Ok(Self {
            action: InventoryAction::of(event_type),
            item_id,
            fields: ProductFields {
                name: first_str(body, &["item_name", "name"]),
                sku: first_str(body, &["item_sku", "sku"]),
                stock: body
                    .get("stock")
                    .and_then(integer_from_json)
                    .and_then(|s| i32::try_from(s).ok()),
                price: body.get("price").and_then(fixed_point_from_json),
                image_url,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Fields live under `data` when the envelope has one.
fn body_of(payload: &Value) -> Result<&Value, PayloadError> {
    if !payload.is_object() {
        return Err(PayloadError::NotAnObject);
    }
    Ok(payload.get("data").filter(|d| d.is_object()).unwrap_or(payload))
}

/// Order fields sit on the body, or on an embedded `order` object either
/// under `data` or at the top level.
fn order_body_of(payload: &Value) -> Result<&Value, PayloadError> {
    let body = body_of(payload)?;
    let has_order_id = |v: &&Value| v.get("order_id").and_then(id_string).is_some();
    Ok([Some(body), body.get("order"), payload.get("order")]
        .into_iter()
        .flatten()
        .find(has_order_id)
        .unwrap_or(body))
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| str_field(value, k))
}

fn first_i64(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| value.get(*k).and_then(integer_from_json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn decodes_order_created() {
        let payload = json!({
            "event_type": "order.created",
            "shop_id": 1,
            "order_id": "991",
            "order_sn": "SN-1",
            "order_status": "READY_TO_SHIP",
            "total_amount": 500000,
            "buyer_username": "alice",
            "create_time": 1700000000,
            "items": [{"item_id": "A", "item_name": "Widget", "quantity": 2, "item_price": 250000}]
        });

        let event = WebhookEvent::decode("order.created", &payload).unwrap();
        let order = assert_matches!(event, WebhookEvent::Order(o) => o);
        assert_eq!(order.order_id, "991");
        assert_eq!(order.order_number.as_deref(), Some("SN-1"));
        assert_eq!(order.status.as_deref(), Some("READY_TO_SHIP"));
        assert_eq!(order.total_amount, Some(dec("5.00")));
        assert_eq!(order.customer.name.as_deref(), Some("alice"));
        let items = order.items.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].unit_price, dec("2.5"));
        assert_eq!(order.ordered_at.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn order_fields_are_read_from_data_envelope() {
        let payload = json!({
            "event_type": "order.status_updated",
            "data": {
                "order_id": 42,
                "status": "SHIPPED",
                "recipient_address": {"name": "Bob", "phone": "555", "full_address": "1 Main St"}
            }
        });
        let order = OrderEvent::decode(&payload).unwrap();
        assert_eq!(order.order_id, "42");
        assert_eq!(order.status.as_deref(), Some("SHIPPED"));
        assert_eq!(order.customer.name.as_deref(), Some("Bob"));
        assert_eq!(order.customer.phone.as_deref(), Some("555"));
        assert_eq!(order.customer.address.as_deref(), Some("1 Main St"));
        assert!(order.total_amount.is_none());
        assert!(order.items.is_none());
    }

    #[test]
    fn order_without_id_is_rejected() {
        let err = OrderEvent::decode(&json!({"order_sn": "SN"})).unwrap_err();
        assert_eq!(err, PayloadError::MissingField("order_id"));
        assert_eq!(OrderEvent::decode(&json!([1, 2])).unwrap_err(), PayloadError::NotAnObject);
    }

    #[test]
    fn order_fields_may_sit_on_an_embedded_order() {
        let top = json!({
            "event_type": "order.created",
            "order": {"shop_id": 1001, "order_id": "7", "order_status": "UNPAID"}
        });
        let order = OrderEvent::decode(&top).unwrap();
        assert_eq!(order.order_id, "7");
        assert_eq!(order.status.as_deref(), Some("UNPAID"));

        let nested = json!({"data": {"order": {"order_id": 8, "total_amount": "100000"}}});
        let order = OrderEvent::decode(&nested).unwrap();
        assert_eq!(order.order_id, "8");
        assert_eq!(order.total_amount, Some(dec("1")));
    }

    #[test]
    fn body_level_order_id_wins_over_embedded_order() {
        let order = OrderEvent::decode(&json!({
            "data": {"order_id": "1", "order": {"order_id": "2"}}
        }))
        .unwrap();
        assert_eq!(order.order_id, "1");
    }

    #[test]
    fn numeric_strings_decode_like_numbers() {
        let order = OrderEvent::decode(&json!({
            "order_id": "1",
            "create_time": "1700000000",
            "items": [{"item_id": "A", "quantity": "3"}]
        }))
        .unwrap();
        assert_eq!(order.ordered_at.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(order.items.unwrap()[0].quantity, 3);

        let event =
            InventoryEvent::decode("inventory.stock_updated", &json!({"item_id": 1, "stock": "12"}))
                .unwrap();
        assert_eq!(event.fields.stock, Some(12));
    }

    #[test]
    fn line_items_without_id_are_skipped() {
        let order = OrderEvent::decode(&json!({
            "order_id": "1",
            "items": [{"item_name": "ghost"}, {"item_id": 5}]
        }))
        .unwrap();
        let items = order.items.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "5");
        assert_eq!(items[0].quantity, 1);
        assert_eq!(items[0].unit_price, Decimal::ZERO);
    }

    #[test]
    fn decodes_sparse_inventory_event() {
        let event =
            InventoryEvent::decode("inventory.stock_updated", &json!({"item_id": 77, "stock": 12}))
                .unwrap();
        assert_eq!(event.action, InventoryAction::StockUpdated);
        assert_eq!(event.item_id, "77");
        assert_eq!(event.fields.stock, Some(12));
        assert!(event.fields.name.is_none());
        assert!(event.fields.price.is_none());
    }

    #[test]
    fn inventory_image_falls_back_to_first_image() {
        let event = InventoryEvent::decode(
            "product.updated",
            &json!({"item_id": "9", "images": ["a.jpg", "b.jpg"], "price": 12345000}),
        )
        .unwrap();
        assert_eq!(event.fields.image_url.as_deref(), Some("a.jpg"));
        assert_eq!(event.fields.price, Some(dec("123.45")));
    }

    #[test]
    fn restricted_fields_follow_action() {
        let fields = ProductFields {
            name: Some("n".into()),
            sku: Some("s".into()),
            stock: Some(1),
            price: Some(dec("2")),
            image_url: Some("i".into()),
        };
        let stock_only = fields.restricted_to(InventoryAction::StockUpdated);
        assert_eq!(stock_only.stock, Some(1));
        assert!(stock_only.name.is_none() && stock_only.price.is_none());

        let price_only = fields.restricted_to(InventoryAction::PriceUpdated);
        assert_eq!(price_only.price, Some(dec("2")));
        assert!(price_only.stock.is_none());

        assert_eq!(fields.restricted_to(InventoryAction::Updated), fields);
        assert!(fields.restricted_to(InventoryAction::Deleted).is_empty());
    }

    #[test]
    fn unknown_family_decodes_without_fields() {
        let event = WebhookEvent::decode("shop.updated", &json!({})).unwrap();
        assert_eq!(
            event,
            WebhookEvent::Unknown {
                event_type: "shop.updated".to_string()
            }
        );
    }
}
