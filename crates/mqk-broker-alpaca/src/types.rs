//! Wire/domain types for the Alpaca adapter — spec §4.1, §6.

use anyhow::{anyhow, Result};
use serde_json::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlpacaSide {
    Buy,
    Sell,
}

impl AlpacaSide {
    pub fn as_str(self) -> &'static str {
        match self {
            AlpacaSide::Buy => "buy",
            AlpacaSide::Sell => "sell",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlpacaOrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    TrailingStop,
}

impl AlpacaOrderType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlpacaOrderType::Market => "market",
            AlpacaOrderType::Limit => "limit",
            AlpacaOrderType::Stop => "stop",
            AlpacaOrderType::StopLimit => "stop_limit",
            AlpacaOrderType::TrailingStop => "trailing_stop",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitAlpacaOrder {
    pub symbol: String,
    pub side: AlpacaSide,
    pub qty: i64,
    pub order_type: AlpacaOrderType,
    pub time_in_force: String,
    pub limit_price: Option<String>,
    pub stop_price: Option<String>,
    pub client_order_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlpacaOrderSnapshot {
    pub client_order_id: String,
    pub broker_order_id: String,
    pub symbol: String,
    pub status: String,
    pub filled_qty: i64,
}

impl AlpacaOrderSnapshot {
    pub fn from_order_json(value: &Value) -> Result<Self> {
        let broker_order_id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Alpaca order response missing id"))?
            .to_string();
        let client_order_id = value
            .get("client_order_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let symbol = value
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let filled_qty = value
            .get("filled_qty")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0) as i64;

        Ok(Self {
            client_order_id,
            broker_order_id,
            symbol,
            status,
            filled_qty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_order_response() {
        let body = json!({
            "id": "b-1",
            "client_order_id": "c-1",
            "symbol": "AAPL",
            "status": "accepted",
            "filled_qty": "0",
        });
        let snap = AlpacaOrderSnapshot::from_order_json(&body).unwrap();
        assert_eq!(snap.broker_order_id, "b-1");
        assert_eq!(snap.filled_qty, 0);
    }

    #[test]
    fn missing_id_is_an_error() {
        let body = json!({"symbol": "AAPL"});
        assert!(AlpacaOrderSnapshot::from_order_json(&body).is_err());
    }
}
