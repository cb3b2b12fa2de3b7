//! mqk-sizing
//!
//! Kelly-based position sizing and fee-aware prediction-market pricing
//! (spec §4.5, §4.10). Pure, deterministic, no I/O.

pub mod kelly;
pub mod pricing;
pub mod sizer;

pub use kelly::{size_fraction, KellyMethod, KellyResult, TradeStats, DEFAULT_MIN_SAMPLE_TRADES};
pub use pricing::{
    best_direction, breakeven_price_cents_yes, expected_value_cents, fee_adjusted_edge,
    recommend_trade, Direction, EdgeResult, FeeSchedule, DEFAULT_MIN_EDGE,
};
pub use sizer::{size_position, SizerConfig, SizingRequest, SizingResult, DEFAULT_STOP_PCT};
