//! mqk-runtime
//!
//! The composition root (spec §2, §5): wires `mqk-portfolio`'s drawdown
//! protector and correlation manager, `mqk-sizing`'s Kelly sizer,
//! `mqk-risk`'s pre-trade pipeline, `mqk-pnl`'s tracker, `mqk-approval`'s
//! human-in-the-loop queue, and `mqk-thesis`'s calibration tracker into one
//! `IntegratedRiskManager`, plus the cooperative event loop around it: a
//! periodic broadcaster, an approval-expiry sweeper, and a health-check
//! monitor, all publishing onto a single typed event bus.
//!
//! Broker stream-reader tasks and the REST submit/cancel/replace paths stay
//! in their own crates (`mqk-broker-alpaca`, `mqk-broker-kalshi`,
//! `mqk-broker-paper`); this crate owns scheduling and risk composition, not
//! transport.

pub mod broadcaster;
pub mod events;
pub mod health;
pub mod manager;
pub mod sweeper;

pub use broadcaster::spawn_broadcaster;
pub use events::RuntimeEvent;
pub use health::{ComponentCheck, HealthMonitor, ServiceHealth};
pub use manager::{IntegratedRiskManager, IntegratedRiskManagerConfig, TradeDecision, TradeRequest};
pub use sweeper::spawn_approval_sweeper;
