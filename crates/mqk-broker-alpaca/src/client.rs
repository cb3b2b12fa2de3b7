//! Alpaca REST API client — spec §4.1, §6.
//!
//! Grounded on `brokers/alpaca.py::AlpacaClient`. Blocking (mirrors
//! `mqk-broker-kalshi::client::KalshiClient`'s rationale: the synchronous
//! surface is what a future `order_router::BrokerAdapter` impl needs).
//! Transport errors retry up to 3 times with `2^attempt` second backoff;
//! HTTP 429 consults `Retry-After` (default 60s) and does not consume a
//! retry; HTTP 422 on order submission is a venue-level rejection, decoded
//! and returned as [`OrderError`] rather than retried.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};

use crate::config::AlpacaConfig;
use crate::rate_limiter::AlpacaRateLimiter;

const MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_AFTER_SECS: f64 = 60.0;

/// A venue-level order rejection (HTTP 422), decoded per spec §7
/// ("Surfaced to the caller as a typed order error carrying the venue's
/// message and data").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderError {
    pub code: Option<i64>,
    pub message: String,
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "Alpaca order rejected ({code}): {}", self.message),
            None => write!(f, "Alpaca order rejected: {}", self.message),
        }
    }
}

impl std::error::Error for OrderError {}

enum RequestOutcome {
    Success(Value),
    OrderRejected(OrderError),
}

pub struct AlpacaClient {
    config: AlpacaConfig,
    http: reqwest::blocking::Client,
    rate_limiter: AlpacaRateLimiter,
    /// client_order_id -> broker_order_id, the idempotency map of spec §4.1.
    submitted_orders: Mutex<BTreeMap<String, String>>,
}

impl AlpacaClient {
    pub fn new(config: AlpacaConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building Alpaca HTTP client")?;
        Ok(Self {
            config,
            http,
            rate_limiter: AlpacaRateLimiter::new(200),
            submitted_orders: Mutex::new(BTreeMap::new()),
        })
    }

    fn auth_headers(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        req.header("APCA-API-KEY-ID", &self.config.key_id)
            .header("APCA-API-SECRET-KEY", &self.config.secret_key)
    }

    fn request(
        &self,
        method: reqwest::Method,
        base_url: &str,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<RequestOutcome> {
        let url = format!("{base_url}{endpoint}");
        let mut attempt = 0u32;

        loop {
            self.rate_limiter.acquire();

            let mut req = self.auth_headers(self.http.request(method.clone(), &url));
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(body) = &body {
                req = req.json(body);
            }

            let resp = match req.send() {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt + 1 >= MAX_RETRIES {
                        return Err(err).context("Alpaca request failed after max retries");
                    }
                    std::thread::sleep(Duration::from_secs(2u64.pow(attempt)));
                    attempt += 1;
                    continue;
                }
            };

            match resp.status().as_u16() {
                429 => {
                    let retry_after = resp
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<f64>().ok())
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    std::thread::sleep(Duration::from_secs_f64(retry_after));
                    // Does not consume a retry attempt.
                    continue;
                }
                422 => {
                    let body: Value = resp.json().unwrap_or_else(|_| json!({}));
                    let message = body
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("order rejected")
                        .to_string();
                    let code = body.get("code").and_then(Value::as_i64);
                    return Ok(RequestOutcome::OrderRejected(OrderError { code, message }));
                }
                status if (200..300).contains(&status) => {
                    if resp.content_length() == Some(0) {
                        return Ok(RequestOutcome::Success(json!({})));
                    }
                    let value = resp.json().context("parsing Alpaca response body")?;
                    return Ok(RequestOutcome::Success(value));
                }
                status => {
                    if attempt + 1 >= MAX_RETRIES || status < 500 {
                        let text = resp.text().unwrap_or_default();
                        bail!("Alpaca request to {endpoint} failed with status {status}: {text}");
                    }
                    std::thread::sleep(Duration::from_secs(2u64.pow(attempt)));
                    attempt += 1;
                    continue;
                }
            }
        }
    }

    fn ok(&self, outcome: RequestOutcome) -> Result<Value> {
        match outcome {
            RequestOutcome::Success(v) => Ok(v),
            RequestOutcome::OrderRejected(err) => Err(err.into()),
        }
    }

    pub fn get_account(&self) -> Result<Value> {
        let out = self.request(
            reqwest::Method::GET,
            self.config.trading_base_url(),
            "/v2/account",
            &[],
            None,
        )?;
        self.ok(out)
    }

    pub fn get_positions(&self) -> Result<Value> {
        let out = self.request(
            reqwest::Method::GET,
            self.config.trading_base_url(),
            "/v2/positions",
            &[],
            None,
        )?;
        self.ok(out)
    }

    pub fn get_position(&self, symbol: &str) -> Result<Value> {
        let out = self.request(
            reqwest::Method::GET,
            self.config.trading_base_url(),
            &format!("/v2/positions/{symbol}"),
            &[],
            None,
        )?;
        self.ok(out)
    }

    pub fn close_position(&self, symbol: &str) -> Result<Value> {
        let out = self.request(
            reqwest::Method::DELETE,
            self.config.trading_base_url(),
            &format!("/v2/positions/{symbol}"),
            &[],
            None,
        )?;
        self.ok(out)
    }

    /// Idempotent on `client_order_id`: a repeat submission with an already
    /// seen key short-circuits to `get_order` instead of resubmitting to the
    /// venue (spec §4.1 "Idempotency").
    pub fn submit_order(&self, body: Value, client_order_id: &str) -> Result<Value> {
        if let Some(broker_order_id) = self
            .submitted_orders
            .lock()
            .expect("submitted_orders mutex poisoned")
            .get(client_order_id)
            .cloned()
        {
            return self.get_order(&broker_order_id);
        }

        let out = self.request(
            reqwest::Method::POST,
            self.config.trading_base_url(),
            "/v2/orders",
            &[],
            Some(body),
        )?;

        match out {
            RequestOutcome::Success(value) => {
                if let Some(id) = value.get("id").and_then(Value::as_str) {
                    self.submitted_orders
                        .lock()
                        .expect("submitted_orders mutex poisoned")
                        .insert(client_order_id.to_string(), id.to_string());
                }
                Ok(value)
            }
            RequestOutcome::OrderRejected(err) => {
                // "already submitted" venue reply: recover the broker id by
                // client order id rather than treating it as a hard failure.
                if err.message.to_lowercase().contains("already submitted") {
                    if let Ok(existing) = self.get_order_by_client_order_id(client_order_id) {
                        if let Some(id) = existing.get("id").and_then(Value::as_str) {
                            self.submitted_orders
                                .lock()
                                .expect("submitted_orders mutex poisoned")
                                .insert(client_order_id.to_string(), id.to_string());
                        }
                        return Ok(existing);
                    }
                }
                Err(err.into())
            }
        }
    }

    pub fn get_order(&self, order_id: &str) -> Result<Value> {
        let out = self.request(
            reqwest::Method::GET,
            self.config.trading_base_url(),
            &format!("/v2/orders/{order_id}"),
            &[],
            None,
        )?;
        self.ok(out)
    }

    pub fn get_order_by_client_order_id(&self, client_order_id: &str) -> Result<Value> {
        let out = self.request(
            reqwest::Method::GET,
            self.config.trading_base_url(),
            "/v2/orders:by_client_order_id",
            &[("client_order_id", client_order_id.to_string())],
            None,
        )?;
        self.ok(out)
    }

    pub fn list_orders(&self, status: Option<&str>, limit: u32) -> Result<Value> {
        let mut q = vec![("limit", limit.to_string())];
        if let Some(s) = status {
            q.push(("status", s.to_string()));
        }
        let out = self.request(
            reqwest::Method::GET,
            self.config.trading_base_url(),
            "/v2/orders",
            &q,
            None,
        )?;
        self.ok(out)
    }

    pub fn cancel_order(&self, order_id: &str) -> Result<()> {
        self.request(
            reqwest::Method::DELETE,
            self.config.trading_base_url(),
            &format!("/v2/orders/{order_id}"),
            &[],
            None,
        )?;
        Ok(())
    }

    pub fn replace_order(&self, order_id: &str, body: Value) -> Result<Value> {
        let out = self.request(
            reqwest::Method::PATCH,
            self.config.trading_base_url(),
            &format!("/v2/orders/{order_id}"),
            &[],
            Some(body),
        )?;
        self.ok(out)
    }

    pub fn get_latest_quote(&self, symbol: &str) -> Result<Value> {
        let out = self.request(
            reqwest::Method::GET,
            self.config.data_base_url(),
            &format!("/v2/stocks/{symbol}/quotes/latest"),
            &[],
            None,
        )?;
        self.ok(out)
    }

    pub fn get_latest_trade(&self, symbol: &str) -> Result<Value> {
        let out = self.request(
            reqwest::Method::GET,
            self.config.data_base_url(),
            &format!("/v2/stocks/{symbol}/trades/latest"),
            &[],
            None,
        )?;
        self.ok(out)
    }

    pub fn get_bars(&self, symbol: &str, timeframe: &str, limit: u32) -> Result<Value> {
        let out = self.request(
            reqwest::Method::GET,
            self.config.data_base_url(),
            &format!("/v2/stocks/{symbol}/bars"),
            &[("timeframe", timeframe.to_string()), ("limit", limit.to_string())],
            None,
        )?;
        self.ok(out)
    }

    pub fn get_snapshot(&self, symbol: &str) -> Result<Value> {
        let out = self.request(
            reqwest::Method::GET,
            self.config.data_base_url(),
            &format!("/v2/stocks/{symbol}/snapshot"),
            &[],
            None,
        )?;
        self.ok(out)
    }

    pub fn get_options_contracts(&self, underlying_symbol: &str) -> Result<Value> {
        let out = self.request(
            reqwest::Method::GET,
            self.config.trading_base_url(),
            "/v2/options/contracts",
            &[("underlying_symbols", underlying_symbol.to_string())],
            None,
        )?;
        self.ok(out)
    }

    pub fn get_option_latest_quote(&self, symbol: &str) -> Result<Value> {
        let out = self.request(
            reqwest::Method::GET,
            self.config.data_base_url(),
            "/v1beta1/options/quotes/latest",
            &[("symbols", symbol.to_string())],
            None,
        )?;
        self.ok(out)
    }

    /// Test/diagnostic accessor: whether a client order id has already been
    /// mapped to a broker order id.
    pub fn cached_broker_order_id(&self, client_order_id: &str) -> Option<String> {
        self.submitted_orders
            .lock()
            .expect("submitted_orders mutex poisoned")
            .get(client_order_id)
            .cloned()
    }

    /// Used when a venue "already submitted" 422 is observed without a
    /// locally cached key: recover the mapping from a recent orders scan
    /// (spec §4.1 "If the key is not in the map ... the gateway fetches the
    /// most recent orders, locates the matching client key, and caches it").
    pub fn recover_idempotency_key(&self, client_order_id: &str) -> Result<Option<String>> {
        if let Some(existing) = self.cached_broker_order_id(client_order_id) {
            return Ok(Some(existing));
        }
        let recent = self.list_orders(None, 100)?;
        let orders = recent
            .as_array()
            .ok_or_else(|| anyhow!("unexpected /v2/orders response shape"))?;
        for order in orders {
            if order.get("client_order_id").and_then(Value::as_str) == Some(client_order_id) {
                if let Some(id) = order.get("id").and_then(Value::as_str) {
                    self.submitted_orders
                        .lock()
                        .expect("submitted_orders mutex poisoned")
                        .insert(client_order_id.to_string(), id.to_string());
                    return Ok(Some(id.to_string()));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlpacaEnvironment;

    fn test_config() -> AlpacaConfig {
        AlpacaConfig {
            key_id: "k".into(),
            secret_key: "s".into(),
            environment: AlpacaEnvironment::Paper,
        }
    }

    #[test]
    fn client_constructs_with_empty_idempotency_map() {
        let client = AlpacaClient::new(test_config()).unwrap();
        assert_eq!(client.cached_broker_order_id("x"), None);
    }

    #[test]
    fn order_error_display_includes_message() {
        let err = OrderError {
            code: Some(40310000),
            message: "insufficient buying power".into(),
        };
        assert!(err.to_string().contains("insufficient buying power"));
    }
}
