use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Snapshot of the order intent an approval request was raised for.
/// Deliberately decoupled from `mqk-execution`'s `OrderIntent` — the
/// workflow only needs enough context to display/audit the request, not to
/// resubmit it.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderIntentSnapshot {
    pub symbol: String,
    pub side: String,
    pub qty: i64,
    pub notional_micros: i64,
}

/// Lifecycle state of an approval request (spec §3 "Approval request").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

/// A request sitting in the pending map or resolved into history.
#[derive(Clone, Debug, PartialEq)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub intent: OrderIntentSnapshot,
    /// Human-readable reason the risk engine raised this request
    /// (e.g. "notional exceeds approval threshold").
    pub risk_check_context: String,
    pub state: ApprovalState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolver: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, ApprovalState::Pending)
    }
}

/// Outcome of `wait_for_approval`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Approved,
    Rejected,
    Cancelled,
    Expired,
    /// The `timeout` elapsed before the request resolved. The request itself
    /// is untouched — the sweeper or another waiter still owns its fate.
    TimedOut,
}

/// Notification events fired on queue/resolution (spec §9: "a cleaner shape
/// is a single event bus with typed variants").
#[derive(Clone, Debug)]
pub enum ApprovalEvent {
    Queued(ApprovalRequest),
    Resolved(ApprovalRequest),
}

/// Snapshot counters for monitoring (`get_stats`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ApprovalStats {
    pub pending_count: usize,
    pub history_count: usize,
    pub total_approved: u64,
    pub total_rejected: u64,
    pub total_expired: u64,
    pub total_cancelled: u64,
}
