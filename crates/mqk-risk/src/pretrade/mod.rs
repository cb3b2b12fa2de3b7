//! Pre-trade order checking: the deterministic gate between a strategy's
//! order intent and the broker gateway (spec §4.2–§4.3).
//!
//! Complementary to the crate's existing halt-oriented `engine`/`pdt`
//! modules, which model portfolio-level protective state transitions;
//! `pretrade` models the per-order check sequence that runs ahead of
//! submission.

pub mod circuit_breaker;
pub mod kalshi_controls;
pub mod loss;
pub mod pipeline;
pub mod spend;
pub mod types;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use kalshi_controls::{KalshiControls, KalshiControlsConfig, KalshiDecision};
pub use loss::LossTracker;
pub use pipeline::{PeriodIds, RiskEngine};
pub use spend::SpendTracker;
pub use types::{
    PretradeAction, PretradeDecision, PretradeIntent, PretradePosition, PretradeSide, ReasonCode,
    RiskLimits,
};
