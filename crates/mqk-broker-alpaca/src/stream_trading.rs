//! Alpaca trading-events WebSocket stream — spec §4.1, §6.
//!
//! Grounded on `brokers/alpaca.py::AlpacaStream` (trading-events flavor).
//! Auth frame `{action:"auth", key, secret}`; once authenticated, a single
//! `{action:"listen", data:{streams:["trade_updates"]}}` frame is sent
//! (there is nothing to diff/replay here — the one subscription is
//! re-sent on every reconnect). Messages carry
//! `{stream:"trade_updates", data:{...}}`. Same 1s->60s backoff as the
//! market-data stream, independent reconnect loop and stop flag.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use crate::config::AlpacaConfig;

pub type TradeUpdateCallback = Arc<dyn Fn(Value) + Send + Sync>;

pub struct TradingStream {
    config: AlpacaConfig,
    on_trade_update: Option<TradeUpdateCallback>,
    stop: Mutex<bool>,
}

impl TradingStream {
    pub fn new(config: AlpacaConfig, on_trade_update: Option<TradeUpdateCallback>) -> Self {
        Self {
            config,
            on_trade_update,
            stop: Mutex::new(false),
        }
    }

    pub async fn disconnect(&self) {
        *self.stop.lock().await = true;
    }

    pub async fn run(&self) {
        let mut reconnect_delay = Duration::from_secs(1);

        loop {
            if *self.stop.lock().await {
                return;
            }

            match self.connect_once().await {
                Ok(()) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "Alpaca trading-events stream connection error");
                }
            }

            if *self.stop.lock().await {
                return;
            }

            tokio::time::sleep(reconnect_delay).await;
            reconnect_delay = (reconnect_delay * 2).min(Duration::from_secs(60));
        }
    }

    async fn connect_once(&self) -> anyhow::Result<()> {
        let (ws, _) = tokio_tungstenite::connect_async(self.config.trading_stream_url()).await?;
        let (mut write, mut read) = ws.split();

        write
            .send(Message::Text(
                json!({
                    "action": "auth",
                    "key": self.config.key_id,
                    "secret": self.config.secret_key,
                })
                .to_string(),
            ))
            .await?;

        let mut authenticated = false;
        while let Some(msg) = read.next().await {
            let msg = msg?;
            if let Message::Text(text) = msg {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    if value.get("data").and_then(|d| d.get("status")).and_then(Value::as_str)
                        == Some("authorized")
                    {
                        authenticated = true;
                        break;
                    }
                }
            }
        }
        if !authenticated {
            anyhow::bail!("Alpaca trading-events stream closed before authentication succeeded");
        }

        write
            .send(Message::Text(
                json!({"action": "listen", "data": {"streams": ["trade_updates"]}}).to_string(),
            ))
            .await?;

        while let Some(msg) = read.next().await {
            let msg = msg?;
            if let Message::Text(text) = msg {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    self.handle_message(value);
                }
            }
        }

        Ok(())
    }

    fn handle_message(&self, msg: Value) {
        if msg.get("stream").and_then(Value::as_str) == Some("trade_updates") {
            if let Some(cb) = &self.on_trade_update {
                if let Some(data) = msg.get("data") {
                    cb(data.clone());
                }
            }
        }
    }
}
