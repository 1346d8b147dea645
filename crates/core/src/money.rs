//! Conversion from the marketplace's fixed-point integer amounts.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::events::integer_from_json;

/// The marketplace multiplies decimal currency amounts by this factor.
pub const FIXED_POINT_SCALE: i64 = 100_000;

/// Number of decimal places implied by [`FIXED_POINT_SCALE`].
const FIXED_POINT_DIGITS: u32 = 5;

/// Convert a raw fixed-point integer into a decimal amount.
///
/// `12_345_000` becomes `123.45`.
pub fn from_fixed_point(raw: i64) -> Decimal {
    Decimal::new(raw, FIXED_POINT_DIGITS).normalize()
}

/// Read a fixed-point amount from a JSON value.
///
/// Accepts whatever [`integer_from_json`] does. Anything else yields `None`.
pub fn fixed_point_from_json(value: &Value) -> Option<Decimal> {
    integer_from_json(value).map(from_fixed_point)
}
