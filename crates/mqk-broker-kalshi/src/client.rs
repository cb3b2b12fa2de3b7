//! Kalshi REST API client — spec §4.9.
//!
//! Grounded on `brokers/kalshi.py::KalshiClient`. Blocking (see crate docs)
//! so it can back the synchronous `BrokerAdapter` trait; rate-limited at
//! 10 req/sec, retries 429 via `Retry-After` (default 1s) and re-authenticates
//! once on 401 before treating the failure as fatal.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};

use crate::config::KalshiConfig;
use crate::rate_limiter::KalshiRateLimiter;

const MAX_RETRIES: u32 = 3;

pub struct KalshiClient {
    config: KalshiConfig,
    http: reqwest::blocking::Client,
    rate_limiter: KalshiRateLimiter,
    token: Mutex<Option<String>>,
    member_id: Mutex<Option<String>>,
    submitted_orders: Mutex<BTreeMap<String, String>>,
}

impl KalshiClient {
    pub fn new(config: KalshiConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building Kalshi HTTP client")?;
        Ok(Self {
            config,
            http,
            rate_limiter: KalshiRateLimiter::new(10),
            token: Mutex::new(None),
            member_id: Mutex::new(None),
            submitted_orders: Mutex::new(BTreeMap::new()),
        })
    }

    fn has_token(&self) -> bool {
        self.token.lock().expect("token mutex poisoned").is_some()
    }

    pub fn authenticate(&self) -> Result<()> {
        if let Some(api_key) = &self.config.api_key {
            *self.token.lock().expect("token mutex poisoned") = Some(api_key.clone());
            return Ok(());
        }

        let resp = self
            .http
            .post(format!("{}/login", self.config.base_url()))
            .json(&json!({
                "email": self.config.email,
                "password": self.config.password,
            }))
            .send()
            .context("Kalshi login request")?
            .error_for_status()
            .context("Kalshi login rejected")?;

        let data: Value = resp.json().context("parsing Kalshi login response")?;
        let token = data
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Kalshi login response missing token"))?
            .to_string();
        let member_id = data.get("member_id").and_then(Value::as_str).map(str::to_string);

        *self.token.lock().expect("token mutex poisoned") = Some(token);
        *self.member_id.lock().expect("member_id mutex poisoned") = member_id;
        Ok(())
    }

    fn bearer(&self) -> Option<String> {
        self.token.lock().expect("token mutex poisoned").clone()
    }

    fn request(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value> {
        if !self.has_token() {
            self.authenticate()?;
        }

        let url = format!("{}{endpoint}", self.config.base_url());
        let mut reauth_attempted = false;

        for attempt in 0..MAX_RETRIES {
            self.rate_limiter.acquire();

            let mut req = self.http.request(method.clone(), &url);
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(token) = self.bearer() {
                req = req.bearer_auth(token);
            }
            if let Some(body) = &body {
                req = req.json(body);
            }

            let resp = match req.send() {
                Ok(resp) => resp,
                Err(_err) if attempt + 1 < MAX_RETRIES => {
                    std::thread::sleep(Duration::from_secs(1 << attempt));
                    continue;
                }
                Err(err) => return Err(err).context("Kalshi request failed"),
            };

            match resp.status().as_u16() {
                429 => {
                    let retry_after = resp
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<f64>().ok())
                        .unwrap_or(1.0);
                    std::thread::sleep(Duration::from_secs_f64(retry_after));
                    continue;
                }
                401 => {
                    if reauth_attempted {
                        bail!("Kalshi authentication rejected after re-auth");
                    }
                    reauth_attempted = true;
                    *self.token.lock().expect("token mutex poisoned") = None;
                    self.authenticate()?;
                    continue;
                }
                status if (200..300).contains(&status) => {
                    if resp.content_length() == Some(0) {
                        return Ok(json!({}));
                    }
                    return resp.json().context("parsing Kalshi response body");
                }
                status => {
                    let text = resp.text().unwrap_or_default();
                    bail!("Kalshi request to {endpoint} failed with status {status}: {text}");
                }
            }
        }

        bail!("Kalshi request to {endpoint} exceeded max retries")
    }

    pub fn get_balance(&self) -> Result<Value> {
        self.request(reqwest::Method::GET, "/portfolio/balance", &[], None)
    }

    pub fn get_positions(&self, limit: u32, cursor: Option<&str>) -> Result<Value> {
        let mut q = vec![("limit", limit.to_string())];
        if let Some(c) = cursor {
            q.push(("cursor", c.to_string()));
        }
        self.request(reqwest::Method::GET, "/portfolio/positions", &q, None)
    }

    pub fn get_portfolio_settlements(&self, limit: u32) -> Result<Value> {
        self.request(
            reqwest::Method::GET,
            "/portfolio/settlements",
            &[("limit", limit.to_string())],
            None,
        )
    }

    pub fn get_events(&self, limit: u32, status: Option<&str>, series_ticker: Option<&str>) -> Result<Value> {
        let mut q = vec![("limit", limit.to_string())];
        if let Some(s) = status {
            q.push(("status", s.to_string()));
        }
        if let Some(s) = series_ticker {
            q.push(("series_ticker", s.to_string()));
        }
        self.request(reqwest::Method::GET, "/events", &q, None)
    }

    pub fn get_event(&self, event_ticker: &str) -> Result<Value> {
        self.request(
            reqwest::Method::GET,
            &format!("/events/{event_ticker}"),
            &[],
            None,
        )
    }

    pub fn get_markets(&self, limit: u32, event_ticker: Option<&str>, status: Option<&str>) -> Result<Value> {
        let mut q = vec![("limit", limit.to_string())];
        if let Some(e) = event_ticker {
            q.push(("event_ticker", e.to_string()));
        }
        if let Some(s) = status {
            q.push(("status", s.to_string()));
        }
        self.request(reqwest::Method::GET, "/markets", &q, None)
    }

    pub fn get_market(&self, ticker: &str) -> Result<Value> {
        self.request(reqwest::Method::GET, &format!("/markets/{ticker}"), &[], None)
    }

    pub fn get_orderbook(&self, ticker: &str, depth: u32) -> Result<Value> {
        self.request(
            reqwest::Method::GET,
            &format!("/markets/{ticker}/orderbook"),
            &[("depth", depth.to_string())],
            None,
        )
    }

    pub fn get_trades(&self, ticker: Option<&str>, limit: u32) -> Result<Value> {
        let mut q = vec![("limit", limit.to_string())];
        if let Some(t) = ticker {
            q.push(("ticker", t.to_string()));
        }
        self.request(reqwest::Method::GET, "/markets/trades", &q, None)
    }

    /// Idempotent on `client_order_id`: a repeat submission returns the
    /// already-placed order instead of creating a duplicate.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_order(
        &self,
        ticker: &str,
        side: &str,
        action: &str,
        count: i64,
        yes_price: Option<i64>,
        no_price: Option<i64>,
        client_order_id: &str,
    ) -> Result<Value> {
        if let Some(order_id) = self
            .submitted_orders
            .lock()
            .expect("submitted_orders mutex poisoned")
            .get(client_order_id)
            .cloned()
        {
            return self.get_order(&order_id);
        }

        let mut body = json!({
            "ticker": ticker,
            "side": side,
            "action": action,
            "count": count,
            "type": "limit",
            "client_order_id": client_order_id,
        });
        if let Some(p) = yes_price {
            body["yes_price"] = json!(p);
        }
        if let Some(p) = no_price {
            body["no_price"] = json!(p);
        }

        let result = self.request(reqwest::Method::POST, "/portfolio/orders", &[], Some(body))?;
        if let Some(order_id) = result.pointer("/order/order_id").and_then(Value::as_str) {
            self.submitted_orders
                .lock()
                .expect("submitted_orders mutex poisoned")
                .insert(client_order_id.to_string(), order_id.to_string());
        }
        Ok(result)
    }

    pub fn get_order(&self, order_id: &str) -> Result<Value> {
        self.request(
            reqwest::Method::GET,
            &format!("/portfolio/orders/{order_id}"),
            &[],
            None,
        )
    }

    pub fn get_orders(&self, ticker: Option<&str>, status: Option<&str>, limit: u32) -> Result<Value> {
        let mut q = vec![("limit", limit.to_string())];
        if let Some(t) = ticker {
            q.push(("ticker", t.to_string()));
        }
        if let Some(s) = status {
            q.push(("status", s.to_string()));
        }
        self.request(reqwest::Method::GET, "/portfolio/orders", &q, None)
    }

    pub fn cancel_order(&self, order_id: &str) -> Result<Value> {
        self.request(
            reqwest::Method::DELETE,
            &format!("/portfolio/orders/{order_id}"),
            &[],
            None,
        )
    }

    pub fn batch_cancel_orders(&self, order_ids: &[String]) -> Result<Value> {
        self.request(
            reqwest::Method::DELETE,
            "/portfolio/orders",
            &[],
            Some(json!({ "order_ids": order_ids })),
        )
    }

    pub fn amend_order(
        &self,
        order_id: &str,
        count: Option<i64>,
        yes_price: Option<i64>,
        no_price: Option<i64>,
    ) -> Result<Value> {
        let mut body = json!({});
        if let Some(c) = count {
            body["count"] = json!(c);
        }
        if let Some(p) = yes_price {
            body["yes_price"] = json!(p);
        }
        if let Some(p) = no_price {
            body["no_price"] = json!(p);
        }
        self.request(
            reqwest::Method::POST,
            &format!("/portfolio/orders/{order_id}/amend"),
            &[],
            Some(body),
        )
    }

    pub fn get_fills(&self, ticker: Option<&str>, order_id: Option<&str>, limit: u32) -> Result<Value> {
        let mut q = vec![("limit", limit.to_string())];
        if let Some(t) = ticker {
            q.push(("ticker", t.to_string()));
        }
        if let Some(o) = order_id {
            q.push(("order_id", o.to_string()));
        }
        self.request(reqwest::Method::GET, "/portfolio/fills", &q, None)
    }
}
