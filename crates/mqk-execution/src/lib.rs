//! mqk-execution
//!
//! PATCH 05: Execution Engine Contract (Target Position Model)
//! - Strategies output target positions (not orders)
//! - Engine converts (current_positions, targets) -> order intents
//! - Pure deterministic logic, no broker wiring

mod engine;
mod types;

pub use engine::targets_to_order_intents;
pub use types::{
    ExecutionDecision, OrderIntent, Side, StrategyOutput, TargetPosition,
};

// `gateway.rs` / `order_router.rs` / `id_map.rs` / `oms/` describe a broker
// choke-point (`BrokerGateway<B, IntegrityGate, RiskGate, ReconcileGate>`)
// one patch generation ahead of what's wired here: its integration tests
// (`tests/scenario_*.rs`) already reference `BrokerInvokeToken`,
// `BrokerOrderMap`, and a three-gate-trait `BrokerGateway` that the current
// `order_router.rs` doesn't implement. Left unwired (no `mod` declaration)
// pending that reconciliation, same as upstream. New broker adapters
// (`mqk-broker-paper`, `mqk-broker-alpaca`, `mqk-broker-kalshi`) expose
// their own bespoke submit/cancel/replace surface in the meantime.

use std::collections::BTreeMap;

/// Canonical type for current positions, keyed by symbol.
/// Signed quantity: +long, -short.
pub type PositionBook = BTreeMap<String, i64>;

/// Helper to build a PositionBook with minimal boilerplate in tests/callers.
pub fn position_book<I, S>(items: I) -> PositionBook
where
    I: IntoIterator<Item = (S, i64)>,
    S: Into<String>,
{
    let mut book = PositionBook::new();
    for (sym, qty) in items {
        book.insert(sym.into(), qty);
    }
    book
}
