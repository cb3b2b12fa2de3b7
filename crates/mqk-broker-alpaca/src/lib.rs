//! mqk-broker-alpaca
//!
//! U.S. equities venue adapter (spec §4.1, §6): blocking REST client with
//! token-bucket rate limiting, idempotent order submission, and 429/422
//! handling, plus two independent WebSocket streams (market data; order
//! events), each with its own auto-reconnect loop and subscription replay.
//!
//! Authored from scratch for this workspace (the upstream crate carried no
//! `.rs` files); grounded throughout on `brokers/alpaca.py` and written in
//! the idiom `mqk-broker-kalshi` already establishes for the prediction-
//! market venue.

pub mod broker;
pub mod client;
pub mod config;
pub mod rate_limiter;
pub mod stream_market_data;
pub mod stream_trading;
pub mod types;

pub use broker::AlpacaBroker;
pub use client::{AlpacaClient, OrderError};
pub use config::{AlpacaConfig, AlpacaEnvironment};
pub use rate_limiter::AlpacaRateLimiter;
pub use stream_market_data::{MarketDataHandlers, MarketDataStream};
pub use stream_trading::TradingStream;
pub use types::{AlpacaOrderSnapshot, AlpacaOrderType, AlpacaSide, SubmitAlpacaOrder};
