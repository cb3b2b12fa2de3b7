//! Periodic broadcaster — spec §5 "one periodic broadcaster (every 5 s)".
//!
//! Same shape as `mqk-daemon::state::spawn_heartbeat`; this one carries a
//! runtime-domain `Heartbeat` event instead of a daemon SSE heartbeat, over
//! the same broadcast channel the rest of the composition root's events
//! flow through.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::events::RuntimeEvent;

pub fn spawn_broadcaster(bus: broadcast::Sender<RuntimeEvent>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts_millis = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(RuntimeEvent::Heartbeat { ts_millis });
        }
    });
}
