//! Typed event bus emitted by the composition root — spec §6 "Emitted events".
//!
//! Mirrors `mqk-daemon::state::BusMsg`'s role (a single broadcast payload
//! enum feeding SSE) but carries the risk-domain events the spec names:
//! alerts, approval lifecycle, drawdown escalation, liquidation requests.

use mqk_approval::ApprovalRequest;
use mqk_pnl::Alert;
use mqk_portfolio::{DrawdownLevel, LiquidationOrder};

#[derive(Clone, Debug)]
pub enum RuntimeEvent {
    Alert(Alert),
    ApprovalNeeded(ApprovalRequest),
    ApprovalResolved(ApprovalRequest),
    DrawdownLevelChange {
        previous: DrawdownLevel,
        current: DrawdownLevel,
    },
    LiquidationRequired(Vec<LiquidationOrder>),
    Heartbeat {
        ts_millis: i64,
    },
}
