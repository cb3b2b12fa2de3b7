//! Wire/domain types for the Kalshi adapter — spec §4.1, §6.
//!
//! Grounded on `brokers/kalshi.py`'s order/position dataclasses.

use anyhow::{anyhow, Result};
use serde_json::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KalshiSide {
    Yes,
    No,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KalshiAction {
    Buy,
    Sell,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitKalshiOrder {
    pub ticker: String,
    pub side: KalshiSide,
    pub action: KalshiAction,
    pub count: i64,
    pub price_cents: i64,
    pub client_order_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KalshiOrderSnapshot {
    pub client_order_id: String,
    pub order_id: String,
    pub ticker: String,
    pub status: String,
    pub filled_count: i64,
    pub remaining_count: i64,
}

impl KalshiOrderSnapshot {
    /// Parse the `{"order": {...}}` envelope returned by `POST
    /// /portfolio/orders` (and the bare order object returned by `GET
    /// /portfolio/orders/{id}`) into a broker-agnostic snapshot.
    pub fn from_order_json(client_order_id: &str, body: &Value) -> Result<Self> {
        let order = body.get("order").unwrap_or(body);
        let order_id = order
            .get("order_id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Kalshi order response missing order_id"))?
            .to_string();
        let ticker = order
            .get("ticker")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let status = order
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let filled_count = order.get("filled_count").and_then(Value::as_i64).unwrap_or(0);
        let remaining_count = order
            .get("remaining_count")
            .and_then(Value::as_i64)
            .unwrap_or(0);

        Ok(Self {
            client_order_id: client_order_id.to_string(),
            order_id,
            ticker,
            status,
            filled_count,
            remaining_count,
        })
    }
}
