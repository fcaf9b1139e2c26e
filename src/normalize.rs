//! # Order Normalizer Module
//!
//! Flattens raw API orders into fixed-column [`OrderRecord`]s. Normalization
//! is total: every missing or malformed field falls back to a declared
//! sentinel instead of failing the record.
//!
//! | field | sentinel |
//! |---|---|
//! | item name, restaurant name, restaurant location | `"Unknown"` |
//! | date, time, status | `""` |
//! | price | `0` (negative prices clamp to `0`) |

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::orders::RawOrder;

/// Placeholder for absent text fields
pub const UNKNOWN: &str = "Unknown";

/// Separator between date and time in `orderDate`
pub const DATE_TIME_SEPARATOR: &str = " / ";

/// A flat order row, serialized with the CSV export headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    #[serde(rename = "Item Name")]
    pub item_name: String,
    #[serde(rename = "Restaurant Name")]
    pub restaurant_name: String,
    #[serde(rename = "Restaurant Location")]
    pub restaurant_location: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Price (TL)", with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(rename = "Status")]
    pub status: String,
}

/// Normalize a page of raw orders, preserving API order
pub fn normalize(raw_orders: &[RawOrder]) -> Vec<OrderRecord> {
    raw_orders.iter().map(normalize_order).collect()
}

/// Normalize a single raw order
pub fn normalize_order(order: &RawOrder) -> OrderRecord {
    let (restaurant_name, restaurant_location) =
        split_restaurant(order.store_name().unwrap_or(UNKNOWN));
    let (date, time) = split_order_date(order.order_date().unwrap_or(""));

    OrderRecord {
        item_name: order.product_name().unwrap_or(UNKNOWN).to_string(),
        restaurant_name,
        restaurant_location,
        date,
        time,
        price: order.total_price().map(parse_price).unwrap_or(Decimal::ZERO),
        status: order.status_text().unwrap_or("").to_string(),
    }
}

/// Split `"Name (Location)"` into name and location
///
/// Uses the first `(` and the first `)`. When they are absent or out of
/// order the name is returned unchanged with an `"Unknown"` location.
pub fn split_restaurant(raw_name: &str) -> (String, String) {
    if let (Some(open), Some(close)) = (raw_name.find('('), raw_name.find(')')) {
        if open < close {
            let location = raw_name[open + 1..close].trim().to_string();
            let name = raw_name[..open].trim().to_string();
            return (name, location);
        }
    }
    (raw_name.to_string(), UNKNOWN.to_string())
}

/// Split `"date / time"`; missing parts become empty strings
pub fn split_order_date(raw: &str) -> (String, String) {
    let mut parts = raw.split(DATE_TIME_SEPARATOR);
    let date = parts.next().unwrap_or("").to_string();
    let time = parts.next().unwrap_or("").to_string();
    (date, time)
}

/// Parse a price from a JSON number or string, never returning a negative
pub fn parse_price(value: &Value) -> Decimal {
    let parsed = match value {
        Value::Number(n) => decimal_from_str(&n.to_string()).or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => {
            decimal_from_str(&clean_price_text(s))
        }
        _ => None,
    };

    parsed
        .filter(|d| d.is_sign_positive())
        .map(|d| d.normalize())
        .unwrap_or(Decimal::ZERO)
}

/// Strip the currency suffix and digit grouping, leaving a `.` decimal point
///
/// With both separators present the last one is the decimal mark, so
/// `"1.234,50"` and `"1,234.50"` both read as 1234.50.
fn clean_price_text(raw: &str) -> String {
    let text = raw.trim().trim_end_matches("TL").trim();
    match (text.rfind(','), text.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => text.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => text.replace(',', ""),
        (Some(_), None) => text.replace(',', "."),
        _ => text.to_string(),
    }
}

fn decimal_from_str(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}
