//! `KalshiBroker`: the submit/cancel/replace surface used by execution
//! wiring, in the bespoke-API idiom `mqk-broker-paper` uses (the crate's
//! `order_router::BrokerAdapter` trait is currently a patch generation
//! ahead of what's wired into `mqk-execution`'s `lib.rs` — see that crate's
//! note — so this adapter doesn't implement it yet, matching
//! `mqk-broker-paper`'s own outstanding TODO to do the same).

use anyhow::{Context, Result};

use crate::client::KalshiClient;
use crate::types::{
    KalshiAction, KalshiOrderSnapshot, KalshiSide, SubmitKalshiOrder,
};

pub struct KalshiBroker {
    client: KalshiClient,
}

impl KalshiBroker {
    pub fn new(client: KalshiClient) -> Self {
        Self { client }
    }

    pub fn submit(&self, req: SubmitKalshiOrder) -> Result<KalshiOrderSnapshot> {
        let side = match req.side {
            KalshiSide::Yes => "yes",
            KalshiSide::No => "no",
        };
        let action = match req.action {
            KalshiAction::Buy => "buy",
            KalshiAction::Sell => "sell",
        };
        let (yes_price, no_price) = match req.side {
            KalshiSide::Yes => (Some(req.price_cents), None),
            KalshiSide::No => (None, Some(req.price_cents)),
        };

        let result = self
            .client
            .submit_order(
                &req.ticker,
                side,
                action,
                req.count,
                yes_price,
                no_price,
                &req.client_order_id,
            )
            .context("Kalshi submit_order")?;

        KalshiOrderSnapshot::from_order_json(&req.client_order_id, &result)
    }

    pub fn cancel(&self, order_id: &str) -> Result<()> {
        self.client.cancel_order(order_id).context("Kalshi cancel_order")?;
        Ok(())
    }

    pub fn amend(&self, order_id: &str, count: Option<i64>, price_cents: Option<i64>, side: KalshiSide) -> Result<()> {
        let (yes_price, no_price) = match side {
            KalshiSide::Yes => (price_cents, None),
            KalshiSide::No => (None, price_cents),
        };
        self.client
            .amend_order(order_id, count, yes_price, no_price)
            .context("Kalshi amend_order")?;
        Ok(())
    }

    pub fn list_orders(&self, ticker: Option<&str>) -> Result<serde_json::Value> {
        self.client.get_orders(ticker, None, 100)
    }

    pub fn positions(&self) -> Result<serde_json::Value> {
        self.client.get_positions(100, None)
    }

    pub fn balance(&self) -> Result<serde_json::Value> {
        self.client.get_balance()
    }
}
