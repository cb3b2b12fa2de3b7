//! mqk-broker-kalshi
//!
//! Prediction-market venue adapter (spec §4.1, §6): blocking REST client
//! with token-bucket rate limiting and 401/429 handling, plus a single
//! sequence-numbered WebSocket stream with per-channel gap detection.
//!
//! The REST surface is synchronous (`reqwest::blocking`) so it can sit
//! behind a future `order_router::BrokerAdapter` the way `mqk-broker-paper`
//! does; the stream is async and intended to be spawned as a long-lived
//! Tokio task by the composition root.

pub mod broker;
pub mod client;
pub mod config;
pub mod rate_limiter;
pub mod stream;
pub mod types;

pub use broker::KalshiBroker;
pub use client::KalshiClient;
pub use config::{KalshiConfig, KalshiEnvironment};
pub use rate_limiter::KalshiRateLimiter;
pub use stream::{GapCallback, KalshiStream, KalshiStreamHandlers, MessageCallback};
pub use types::{KalshiAction, KalshiOrderSnapshot, KalshiSide, SubmitKalshiOrder};
