//! Human-in-the-loop approval queue — spec §4.7.
//!
//! Grounded on `risk/approval.py::ApprovalWorkflow`. The pending map and
//! waiter signals are owned exclusively by this struct (spec §3
//! "Ownership"). The lock is a plain `std::sync::Mutex` and is never held
//! across an `.await` — only synchronous map/ring mutations happen under it;
//! waiting itself suspends on a per-request `tokio::sync::Notify` taken out
//! from under the lock first.

use std::collections::{BTreeMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::types::{
    ApprovalEvent, ApprovalRequest, ApprovalState, ApprovalStats, OrderIntentSnapshot,
    WaitOutcome,
};

type Callback = Arc<dyn Fn(&ApprovalEvent) + Send + Sync>;

struct PendingEntry {
    request: ApprovalRequest,
    notify: Arc<Notify>,
}

struct Inner {
    pending: BTreeMap<Uuid, PendingEntry>,
    history: VecDeque<ApprovalRequest>,
    stats: ApprovalStats,
    callbacks: Vec<Callback>,
}

/// Pending-map capacity and history-ring capacity, with the overflow policy
/// from spec §4.7: "oldest entry is expired to make room".
pub struct ApprovalWorkflow {
    inner: Mutex<Inner>,
    pending_capacity: usize,
    history_capacity: usize,
}

impl ApprovalWorkflow {
    pub fn new(pending_capacity: usize, history_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: BTreeMap::new(),
                history: VecDeque::new(),
                stats: ApprovalStats::default(),
                callbacks: Vec::new(),
            }),
            pending_capacity,
            history_capacity,
        }
    }

    /// Register a notification callback. Exceptions (panics) inside the
    /// callback are caught and logged; they never propagate into the
    /// workflow's own control flow (spec §4.7).
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&ApprovalEvent) + Send + Sync + 'static,
    {
        self.inner.lock().unwrap().callbacks.push(Arc::new(callback));
    }

    fn fire(inner: &Inner, event: ApprovalEvent) {
        for cb in &inner.callbacks {
            let cb = cb.clone();
            let event = event.clone();
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| cb(&event)));
            if result.is_err() {
                tracing::error!("approval notification callback panicked");
            }
        }
    }

    /// Queue a new approval request. If the pending map is at capacity, the
    /// single oldest pending request (by `created_at`) is force-expired to
    /// make room.
    pub fn queue_for_approval(
        &self,
        intent: OrderIntentSnapshot,
        risk_check_context: String,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Uuid {
        let mut inner = self.inner.lock().unwrap();

        if inner.pending.len() >= self.pending_capacity {
            if let Some(oldest_id) = inner
                .pending
                .values()
                .min_by_key(|e| e.request.created_at)
                .map(|e| e.request.id)
            {
                Self::resolve_locked(&mut inner, self.history_capacity, oldest_id, ApprovalState::Expired, None, now);
            }
        }

        let id = Uuid::new_v4();
        let request = ApprovalRequest {
            id,
            intent,
            risk_check_context,
            state: ApprovalState::Pending,
            created_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(0)),
            resolver: None,
            resolved_at: None,
        };
        let notify = Arc::new(Notify::new());
        inner.pending.insert(id, PendingEntry { request: request.clone(), notify });

        Self::fire(&inner, ApprovalEvent::Queued(request));
        id
    }

    /// Block on the per-request signal until resolved, expired, or
    /// `timeout` elapses. Timing out does not cancel or otherwise mutate
    /// the underlying request.
    pub async fn wait_for_approval(&self, id: Uuid, timeout: Duration) -> Option<WaitOutcome> {
        let notify = {
            let inner = self.inner.lock().unwrap();
            if let Some(entry) = inner.pending.get(&id) {
                Some(entry.notify.clone())
            } else {
                None
            }
        };

        let Some(notify) = notify else {
            // Already resolved (or never existed) — report from history.
            let inner = self.inner.lock().unwrap();
            return inner
                .history
                .iter()
                .rev()
                .find(|r| r.id == id)
                .map(|r| state_to_outcome(r.state));
        };

        match tokio::time::timeout(timeout, notify.notified()).await {
            Ok(()) => {
                let inner = self.inner.lock().unwrap();
                inner
                    .history
                    .iter()
                    .rev()
                    .find(|r| r.id == id)
                    .map(|r| state_to_outcome(r.state))
            }
            Err(_) => Some(WaitOutcome::TimedOut),
        }
    }

    pub fn approve(&self, id: Uuid, resolver: impl Into<String>, now: DateTime<Utc>) -> bool {
        self.resolve(id, ApprovalState::Approved, Some(resolver.into()), now)
    }

    pub fn reject(&self, id: Uuid, resolver: impl Into<String>, now: DateTime<Utc>) -> bool {
        self.resolve(id, ApprovalState::Rejected, Some(resolver.into()), now)
    }

    pub fn cancel(&self, id: Uuid, now: DateTime<Utc>) -> bool {
        self.resolve(id, ApprovalState::Cancelled, None, now)
    }

    fn resolve(
        &self,
        id: Uuid,
        state: ApprovalState,
        resolver: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        Self::resolve_locked(&mut inner, self.history_capacity, id, state, resolver, now)
    }

    fn resolve_locked(
        inner: &mut Inner,
        history_capacity: usize,
        id: Uuid,
        state: ApprovalState,
        resolver: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(entry) = inner.pending.remove(&id) else {
            return false;
        };
        let mut request = entry.request;
        request.state = state;
        request.resolver = resolver;
        request.resolved_at = Some(now);

        match state {
            ApprovalState::Approved => inner.stats.total_approved += 1,
            ApprovalState::Rejected => inner.stats.total_rejected += 1,
            ApprovalState::Expired => inner.stats.total_expired += 1,
            ApprovalState::Cancelled => inner.stats.total_cancelled += 1,
            ApprovalState::Pending => unreachable!("resolve always sets a terminal state"),
        }

        inner.history.push_back(request.clone());
        while inner.history.len() > history_capacity {
            inner.history.pop_front();
        }

        entry.notify.notify_waiters();
        Self::fire(inner, ApprovalEvent::Resolved(request));
        true
    }

    /// Sweep the pending map, expiring every request whose deadline has
    /// passed. Returns the ids that were expired.
    pub fn expire_stale(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let mut inner = self.inner.lock().unwrap();
        let stale: Vec<Uuid> = inner
            .pending
            .values()
            .filter(|e| e.request.expires_at <= now)
            .map(|e| e.request.id)
            .collect();

        for id in &stale {
            Self::resolve_locked(&mut inner, self.history_capacity, *id, ApprovalState::Expired, None, now);
        }
        stale
    }

    pub fn get_stats(&self) -> ApprovalStats {
        let inner = self.inner.lock().unwrap();
        ApprovalStats {
            pending_count: inner.pending.len(),
            history_count: inner.history.len(),
            ..inner.stats
        }
    }

    pub fn get_request(&self, id: Uuid) -> Option<ApprovalRequest> {
        let inner = self.inner.lock().unwrap();
        inner
            .pending
            .get(&id)
            .map(|e| e.request.clone())
            .or_else(|| inner.history.iter().rev().find(|r| r.id == id).cloned())
    }
}

fn state_to_outcome(state: ApprovalState) -> WaitOutcome {
    match state {
        ApprovalState::Approved => WaitOutcome::Approved,
        ApprovalState::Rejected => WaitOutcome::Rejected,
        ApprovalState::Cancelled => WaitOutcome::Cancelled,
        ApprovalState::Expired => WaitOutcome::Expired,
        ApprovalState::Pending => WaitOutcome::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> OrderIntentSnapshot {
        OrderIntentSnapshot {
            symbol: "AAPL".into(),
            side: "buy".into(),
            qty: 100,
            notional_micros: 15_000_000_000,
        }
    }

    #[tokio::test]
    async fn approve_resolves_a_waiting_caller() {
        let wf = ApprovalWorkflow::new(16, 64);
        let now = Utc::now();
        let id = wf.queue_for_approval(intent(), "notional exceeds threshold".into(), Duration::from_secs(60), now);

        wf.approve(id, "ops@example.com", now);

        let outcome = wf.wait_for_approval(id, Duration::from_millis(10)).await;
        assert_eq!(outcome, Some(WaitOutcome::Approved));
    }

    #[tokio::test]
    async fn timeout_does_not_mutate_request() {
        let wf = ApprovalWorkflow::new(16, 64);
        let now = Utc::now();
        let id = wf.queue_for_approval(intent(), "ctx".into(), Duration::from_secs(60), now);
        let outcome = wf.wait_for_approval(id, Duration::from_millis(5)).await;
        assert_eq!(outcome, Some(WaitOutcome::TimedOut));
        assert_eq!(wf.get_stats().pending_count, 1);
    }

    #[test]
    fn expire_stale_moves_past_deadline_requests_to_history() {
        let wf = ApprovalWorkflow::new(16, 64);
        let now = Utc::now();
        let id = wf.queue_for_approval(intent(), "ctx".into(), Duration::from_secs(1), now);
        let later = now + chrono::Duration::seconds(5);
        let expired = wf.expire_stale(later);
        assert_eq!(expired, vec![id]);
        assert_eq!(wf.get_stats().pending_count, 0);
        assert_eq!(wf.get_stats().total_expired, 1);
    }

    #[test]
    fn overflow_expires_oldest_to_make_room() {
        let wf = ApprovalWorkflow::new(1, 64);
        let now = Utc::now();
        let first = wf.queue_for_approval(intent(), "ctx".into(), Duration::from_secs(60), now);
        let _second = wf.queue_for_approval(intent(), "ctx".into(), Duration::from_secs(60), now);
        assert_eq!(wf.get_stats().pending_count, 1);
        let first_req = wf.get_request(first).unwrap();
        assert_eq!(first_req.state, ApprovalState::Expired);
    }

    #[test]
    fn callback_panic_is_isolated() {
        let wf = ApprovalWorkflow::new(16, 64);
        wf.on_event(|_event| panic!("boom"));
        let now = Utc::now();
        // Must not panic the caller.
        let _id = wf.queue_for_approval(intent(), "ctx".into(), Duration::from_secs(60), now);
    }
}
