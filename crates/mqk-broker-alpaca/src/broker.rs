//! `AlpacaBroker`: the submit/cancel/replace surface used by execution
//! wiring, in the bespoke-API idiom `mqk-broker-paper` and
//! `mqk-broker-kalshi::broker::KalshiBroker` use (spec §4.1's idempotent
//! REST operations, generalized across both venues).

use anyhow::{Context, Result};
use serde_json::json;

use crate::client::AlpacaClient;
use crate::types::{AlpacaOrderSnapshot, SubmitAlpacaOrder};

pub struct AlpacaBroker {
    client: AlpacaClient,
}

impl AlpacaBroker {
    pub fn new(client: AlpacaClient) -> Self {
        Self { client }
    }

    pub fn submit(&self, req: SubmitAlpacaOrder) -> Result<AlpacaOrderSnapshot> {
        let mut body = json!({
            "symbol": req.symbol,
            "qty": req.qty.to_string(),
            "side": req.side.as_str(),
            "type": req.order_type.as_str(),
            "time_in_force": req.time_in_force,
            "client_order_id": req.client_order_id,
        });
        if let Some(limit_price) = &req.limit_price {
            body["limit_price"] = json!(limit_price);
        }
        if let Some(stop_price) = &req.stop_price {
            body["stop_price"] = json!(stop_price);
        }

        let result = self
            .client
            .submit_order(body, &req.client_order_id)
            .context("Alpaca submit_order")?;
        AlpacaOrderSnapshot::from_order_json(&result)
    }

    pub fn cancel(&self, broker_order_id: &str) -> Result<()> {
        self.client
            .cancel_order(broker_order_id)
            .context("Alpaca cancel_order")
    }

    pub fn replace(
        &self,
        broker_order_id: &str,
        qty: Option<i64>,
        limit_price: Option<String>,
        time_in_force: Option<String>,
    ) -> Result<AlpacaOrderSnapshot> {
        let mut body = json!({});
        if let Some(qty) = qty {
            body["qty"] = json!(qty.to_string());
        }
        if let Some(price) = limit_price {
            body["limit_price"] = json!(price);
        }
        if let Some(tif) = time_in_force {
            body["time_in_force"] = json!(tif);
        }
        let result = self
            .client
            .replace_order(broker_order_id, body)
            .context("Alpaca replace_order")?;
        AlpacaOrderSnapshot::from_order_json(&result)
    }

    pub fn list_orders(&self, status: Option<&str>) -> Result<serde_json::Value> {
        self.client.list_orders(status, 500)
    }

    pub fn positions(&self) -> Result<serde_json::Value> {
        self.client.get_positions()
    }

    pub fn account(&self) -> Result<serde_json::Value> {
        self.client.get_account()
    }
}
