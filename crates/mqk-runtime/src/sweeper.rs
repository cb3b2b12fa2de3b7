//! Approval-expiry sweeper — spec §5 "one approval-expiry sweeper".
//!
//! Mirrors `mqk-daemon::state::spawn_heartbeat`'s shape: a single
//! `tokio::spawn`ed loop ticking on an interval, with no other state beyond
//! what it's handed. Each stale request that `expire_stale` resolves is
//! republished as an `ApprovalResolved` event on the shared bus.

use std::sync::Arc;
use std::time::Duration;

use mqk_approval::ApprovalWorkflow;
use tokio::sync::broadcast;

use crate::events::RuntimeEvent;

pub fn spawn_approval_sweeper(
    workflow: Arc<ApprovalWorkflow>,
    bus: broadcast::Sender<RuntimeEvent>,
    interval: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();
            let expired_ids = workflow.expire_stale(now);
            for id in expired_ids {
                if let Some(request) = workflow.get_request(id) {
                    let _ = bus.send(RuntimeEvent::ApprovalResolved(request));
                }
            }
        }
    });
}
