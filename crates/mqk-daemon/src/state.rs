//! Shared runtime state for mqk-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// KillSwitch — operator-initiated global halt (spec.md Â§7 "Kill switch")
// ---------------------------------------------------------------------------

/// Sticky control-plane halt flags.
///
/// `disarmed` is the operator-toggled kill switch; `halted` is set by
/// `/v1/run/halt` and is only cleared by an explicit re-arm. Either flag
/// blocks execution.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct KillSwitch {
    pub disarmed: bool,
    pub halted: bool,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_execution_blocked(&self) -> bool {
        self.disarmed || self.halted
    }
}

// ---------------------------------------------------------------------------
// BusMsg â€” SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of daemon state, returned by GET /v1/status and
/// carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub active_run_id: Option<Uuid>,
    /// "idle" | "running" | "halted"
    pub state: String,
    pub notes: Option<String>,
    /// Reflects `IntegrityState::is_execution_blocked()` negation: true = armed.
    pub integrity_armed: bool,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    /// Mutable run/status state.
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// Kill-switch state (arm / disarm).
    pub integrity: Arc<RwLock<KillSwitch>>,
    /// Last broker account/positions/orders/fills snapshot (dev inject or live wiring).
    pub broker_snapshot: Arc<RwLock<Option<mqk_schemas::BrokerSnapshot>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            active_run_id: None,
            state: "idle".to_string(),
            notes: Some("fail-closed boot; POST /v1/integrity/arm to permit execution".to_string()),
            integrity_armed: false, // fail-closed: every boot starts disarmed
        };

        Self {
            bus,
            build: BuildInfo {
                service: "mqk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: Arc::new(RwLock::new(initial_status)),
            integrity: Arc::new(RwLock::new(KillSwitch {
                disarmed: true,
                halted: false,
            })),
            broker_snapshot: Arc::new(RwLock::new(None)),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

// ---------------------------------------------------------------------------
// Periodic reconcile tick (spec.md Â§5 background tasks)
// ---------------------------------------------------------------------------

/// Spawn the periodic broker/local snapshot reconciliation tick.
///
/// On every `interval`, builds a [`mqk_reconcile::LocalSnapshot`] from
/// `local_fn` and, if `broker_fn` yields a snapshot, runs
/// [`mqk_reconcile::reconcile_tick`]. A drift verdict halts the run and
/// sticks the kill switch disarmed until an operator re-arms; a clean
/// reconcile (or a missing broker snapshot) leaves state untouched.
pub fn spawn_reconcile_tick<L, B>(
    state: Arc<AppState>,
    local_fn: L,
    broker_fn: B,
    interval: Duration,
) where
    L: Fn() -> mqk_reconcile::LocalSnapshot + Send + 'static,
    B: Fn() -> Option<mqk_reconcile::BrokerSnapshot> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            let Some(broker) = broker_fn() else {
                continue;
            };
            let local = local_fn();

            if let mqk_reconcile::DriftAction::HaltAndDisarm { report } =
                mqk_reconcile::reconcile_tick(&local, &broker)
            {
                tracing::warn!(?report, "reconcile drift detected; halting and disarming");
                {
                    let mut ig = state.integrity.write().await;
                    ig.disarmed = true;
                }
                let mut s = state.status.write().await;
                s.state = "halted".to_string();
                s.integrity_armed = false;
                s.notes = Some("reconcile drift: disarmed pending operator re-arm".to_string());
                let snap = s.clone();
                drop(s);
                let _ = state.bus.send(BusMsg::Status(snap));
            }
        }
    });
}
