//! Kalshi WebSocket streaming client — spec §4.9.
//!
//! Grounded on `brokers/kalshi.py::KalshiStream`. A single socket carries
//! per-channel subscriptions (orderbook deltas, trades, fills, order
//! updates); each channel's sequence number is tracked independently so a
//! gap on one channel doesn't false-positive against another. On a detected
//! gap the configured `on_gap` callback fires so the caller can pull a fresh
//! REST snapshot for that ticker; reconnects back off 1s -> 60s doubling,
//! reset to 1s on a clean (re)connect.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use crate::config::KalshiConfig;

pub type MessageCallback = Arc<dyn Fn(Value) + Send + Sync>;
pub type GapCallback = Arc<dyn Fn(&str, i64, i64) + Send + Sync>;

#[derive(Default)]
struct Subscriptions {
    orderbook: BTreeSet<String>,
    trade: BTreeSet<String>,
    fills_all: bool,
}

pub struct KalshiStreamHandlers {
    pub on_orderbook: Option<MessageCallback>,
    pub on_trade: Option<MessageCallback>,
    pub on_fill: Option<MessageCallback>,
    pub on_order_update: Option<MessageCallback>,
    pub on_gap: Option<GapCallback>,
}

impl Default for KalshiStreamHandlers {
    fn default() -> Self {
        Self {
            on_orderbook: None,
            on_trade: None,
            on_fill: None,
            on_order_update: None,
            on_gap: None,
        }
    }
}

pub struct KalshiStream {
    config: KalshiConfig,
    handlers: KalshiStreamHandlers,
    subscriptions: Mutex<Subscriptions>,
    seq_by_channel: Mutex<BTreeMap<String, i64>>,
}

impl KalshiStream {
    pub fn new(config: KalshiConfig, handlers: KalshiStreamHandlers) -> Self {
        Self {
            config,
            handlers,
            subscriptions: Mutex::new(Subscriptions::default()),
            seq_by_channel: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn subscribe_orderbook(&self, tickers: &[String]) {
        let mut subs = self.subscriptions.lock().await;
        subs.orderbook.extend(tickers.iter().cloned());
    }

    pub async fn subscribe_trades(&self, tickers: &[String]) {
        let mut subs = self.subscriptions.lock().await;
        subs.trade.extend(tickers.iter().cloned());
    }

    pub async fn subscribe_fills(&self) {
        let mut subs = self.subscriptions.lock().await;
        subs.fills_all = true;
    }

    /// Runs the reconnect loop forever. Intended to be spawned as a
    /// long-lived task; returns only if `token` can never authenticate.
    pub async fn run(&self, token: &str) {
        let mut reconnect_delay = Duration::from_secs(1);

        loop {
            match self.connect_once(token).await {
                Ok(()) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "Kalshi WebSocket connection error");
                }
            }

            tokio::time::sleep(reconnect_delay).await;
            reconnect_delay = (reconnect_delay * 2).min(Duration::from_secs(60));
        }
    }

    async fn connect_once(&self, token: &str) -> anyhow::Result<()> {
        use tokio_tungstenite::tungstenite::client::IntoClientRequest;

        let mut request = self.config.ws_url().into_client_request()?;
        request
            .headers_mut()
            .insert("Authorization", format!("Bearer {token}").parse()?);

        let (ws, _) = tokio_tungstenite::connect_async(request).await?;
        let (mut write, mut read) = ws.split();

        self.resubscribe(&mut write).await?;

        while let Some(msg) = read.next().await {
            let msg = msg?;
            if let Message::Text(text) = msg {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    self.handle_message(value).await;
                }
            }
        }

        Ok(())
    }

    async fn resubscribe<S>(&self, write: &mut S) -> anyhow::Result<()>
    where
        S: futures_util::Sink<Message> + Unpin,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        let subs = self.subscriptions.lock().await;
        if !subs.orderbook.is_empty() {
            let tickers: Vec<_> = subs.orderbook.iter().cloned().collect();
            write
                .send(Message::Text(
                    json!({"id": 1, "cmd": "subscribe", "params": {"channels": ["orderbook_delta"], "market_tickers": tickers}})
                        .to_string(),
                ))
                .await?;
        }
        if !subs.trade.is_empty() {
            let tickers: Vec<_> = subs.trade.iter().cloned().collect();
            write
                .send(Message::Text(
                    json!({"id": 2, "cmd": "subscribe", "params": {"channels": ["trade"], "market_tickers": tickers}})
                        .to_string(),
                ))
                .await?;
        }
        if subs.fills_all {
            write
                .send(Message::Text(
                    json!({"id": 3, "cmd": "subscribe", "params": {"channels": ["fill"]}}).to_string(),
                ))
                .await?;
        }
        Ok(())
    }

    async fn handle_message(&self, msg: Value) {
        let msg_type = msg.get("type").and_then(Value::as_str).unwrap_or("");
        let ticker = msg
            .get("market_ticker")
            .and_then(Value::as_str)
            .unwrap_or(msg_type)
            .to_string();

        if let Some(seq) = msg.get("seq").and_then(Value::as_i64) {
            let mut seqs = self.seq_by_channel.lock().await;
            let key = format!("{msg_type}:{ticker}");
            let prev = seqs.get(&key).copied();
            if let Some(prev) = prev {
                let expected = prev + 1;
                if seq != expected {
                    tracing::warn!(channel = %key, expected, received = seq, "Kalshi sequence gap detected");
                    if let Some(cb) = &self.handlers.on_gap {
                        cb(&ticker, expected, seq);
                    }
                }
            }
            seqs.insert(key, seq);
        }

        match msg_type {
            "orderbook_delta" => {
                if let Some(cb) = &self.handlers.on_orderbook {
                    cb(msg);
                }
            }
            "trade" => {
                if let Some(cb) = &self.handlers.on_trade {
                    cb(msg);
                }
            }
            "fill" => {
                if let Some(cb) = &self.handlers.on_fill {
                    cb(msg);
                }
            }
            "order" => {
                if let Some(cb) = &self.handlers.on_order_update {
                    cb(msg);
                }
            }
            "error" => {
                tracing::error!(?msg, "Kalshi WebSocket error message");
            }
            _ => {}
        }
    }
}
