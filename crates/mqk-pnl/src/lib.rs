//! mqk-pnl
//!
//! Real-time unrealized/realized P&L tracking, win/loss streaks, velocity,
//! and threshold/streak alerting with per-(type,scope) cooldown suppression
//! (spec §4.8).

mod tracker;
mod types;

pub use tracker::PnlTracker;
pub use types::{
    portfolio_scope, Alert, AlertConfig, AlertPriority, AlertType, PositionPnl, Scope,
};
