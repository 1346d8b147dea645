//! Event-type families and routing-field extraction.
//!
//! Routing happens on the raw JSON document before any typed decoding so
//! that a payload missing optional fields can still be persisted and
//! queued. Nothing here fails: absent fields become defaults or `None`.

use serde_json::Value;

/// Marker stored when a payload carries no `event_type`.
pub const UNKNOWN_EVENT_TYPE: &str = "unknown";

/// Coarse category used to route a webhook to a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFamily {
    /// `order.*`
    Order,
    /// `product.*` and `inventory.*`
    Inventory,
    /// Anything else. Persisted for audit, never processed.
    Unknown,
}

impl EventFamily {
    /// Classify an event type by the text before its first `.`.
    pub fn of(event_type: &str) -> Self {
        let prefix = event_type.split('.').next().unwrap_or_default();
        match prefix.to_ascii_lowercase().as_str() {
            "order" => EventFamily::Order,
            "product" | "inventory" => EventFamily::Inventory,
            _ => EventFamily::Unknown,
        }
    }

    /// Queue partition (job name) for this family.
    pub fn job_name(self) -> Option<&'static str> {
        match self {
            EventFamily::Order => Some(crate::queue::ORDER_JOB),
            EventFamily::Inventory => Some(crate::queue::INVENTORY_JOB),
            EventFamily::Unknown => None,
        }
    }
}

/// What an inventory-family event asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryAction {
    Created,
    Updated,
    StockUpdated,
    PriceUpdated,
    Deleted,
}

impl InventoryAction {
    /// Classify by the text after the first `.`. Unrecognised actions are
    /// treated as `Created`, which applies every field present.
    pub fn of(event_type: &str) -> Self {
        let action = event_type
            .split_once('.')
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        match action.to_ascii_lowercase().as_str() {
            "deleted" | "removed" => InventoryAction::Deleted,
            "stock_updated" => InventoryAction::StockUpdated,
            "price_updated" => InventoryAction::PriceUpdated,
            "updated" => InventoryAction::Updated,
            _ => InventoryAction::Created,
        }
    }
}

/// Extract the event type, defaulting to [`UNKNOWN_EVENT_TYPE`].
pub fn event_type_of(payload: &Value) -> String {
    payload
        .get("event_type")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_EVENT_TYPE)
        .to_string()
}

/// Locate the marketplace shop id for tenant resolution.
///
/// Looks at the top-level `shop_id`, then `data.shop_id`; order events
/// also carry it on the embedded order object.
pub fn shop_id_of(event_type: &str, payload: &Value) -> Option<String> {
    let mut candidates = vec![payload.get("shop_id"), payload.pointer("/data/shop_id")];
    if EventFamily::of(event_type) == EventFamily::Order {
        candidates.push(payload.pointer("/order/shop_id"));
        candidates.push(payload.pointer("/data/order/shop_id"));
    }
    candidates.into_iter().flatten().find_map(id_string)
}

/// Normalise a native id that may arrive as a JSON string or number.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read an integer that may arrive as a JSON number or a numeric string.
/// Fractional numbers are rounded.
pub fn integer_from_json(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.round() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
