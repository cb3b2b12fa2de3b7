//! mqk-approval
//!
//! Human-in-the-loop order approval queue (spec §4.7): bounded pending map
//! with oldest-expires-on-overflow, bounded history ring, per-request waiter
//! signals, and notification callbacks with panic isolation.

mod types;
mod workflow;

pub use types::{
    ApprovalEvent, ApprovalRequest, ApprovalState, ApprovalStats, OrderIntentSnapshot,
    WaitOutcome,
};
pub use workflow::ApprovalWorkflow;
