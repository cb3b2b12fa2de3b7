//! Health-check monitor — spec §5 "one health-check monitor (every 60 s)".
//!
//! Grounded on `monitoring/status.py::StatusMonitor`. The runtime has no
//! async HTTP-probe access here (that lives in the broker adapters); this
//! module tracks the *reported* health of each named component (broker
//! REST reachability, each stream's connection state) and rolls it up into
//! a single overall status, the way `StatusMonitor.get_summary` does.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ServiceHealth {
    Operational,
    Degraded,
    PartialOutage,
    MajorOutage,
    Unknown,
}

impl ServiceHealth {
    pub fn is_healthy(self) -> bool {
        matches!(self, ServiceHealth::Operational)
    }

    pub fn is_degraded(self) -> bool {
        matches!(self, ServiceHealth::Degraded | ServiceHealth::PartialOutage)
    }
}

#[derive(Clone, Debug)]
pub struct ComponentCheck {
    pub status: ServiceHealth,
    pub last_check: DateTime<Utc>,
    pub response_time_ms: Option<f64>,
    pub error_message: Option<String>,
}

/// Tracks the last-reported health for each named component (e.g.
/// `"alpaca_rest"`, `"alpaca_market_data_stream"`, `"kalshi_stream"`) and
/// derives an overall status.
#[derive(Default)]
pub struct HealthMonitor {
    components: BTreeMap<String, ComponentCheck>,
    /// A component not reported within this window is treated as `Unknown`
    /// regardless of its last recorded status.
    stale_after: chrono::Duration,
}

impl HealthMonitor {
    pub fn new(stale_after: chrono::Duration) -> Self {
        Self {
            components: BTreeMap::new(),
            stale_after,
        }
    }

    pub fn report(
        &mut self,
        component: impl Into<String>,
        status: ServiceHealth,
        response_time_ms: Option<f64>,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.components.insert(
            component.into(),
            ComponentCheck {
                status,
                last_check: now,
                response_time_ms,
                error_message,
            },
        );
    }

    pub fn get(&self, component: &str, now: DateTime<Utc>) -> ServiceHealth {
        match self.components.get(component) {
            Some(check) if now.signed_duration_since(check.last_check) <= self.stale_after => check.status,
            Some(_) => ServiceHealth::Unknown,
            None => ServiceHealth::Unknown,
        }
    }

    pub fn all(&self, now: DateTime<Utc>) -> BTreeMap<String, ServiceHealth> {
        self.components
            .keys()
            .map(|name| (name.clone(), self.get(name, now)))
            .collect()
    }

    /// Worst status across all tracked components. Matches
    /// `StatusMonitor.get_summary`'s "healthy iff every component is
    /// operational" rollup, generalized to the full severity ladder.
    pub fn overall(&self, now: DateTime<Utc>) -> ServiceHealth {
        let statuses = self.all(now);
        if statuses.is_empty() {
            return ServiceHealth::Unknown;
        }
        if statuses.values().any(|s| *s == ServiceHealth::MajorOutage) {
            return ServiceHealth::MajorOutage;
        }
        if statuses.values().any(|s| *s == ServiceHealth::PartialOutage) {
            return ServiceHealth::PartialOutage;
        }
        if statuses.values().any(|s| *s == ServiceHealth::Degraded) {
            return ServiceHealth::Degraded;
        }
        if statuses.values().any(|s| *s == ServiceHealth::Unknown) {
            return ServiceHealth::Unknown;
        }
        ServiceHealth::Operational
    }

    pub fn is_all_healthy(&self, now: DateTime<Utc>) -> bool {
        self.overall(now) == ServiceHealth::Operational
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_operational_rolls_up_to_operational() {
        let mut monitor = HealthMonitor::new(chrono::Duration::seconds(120));
        let now = Utc::now();
        monitor.report("alpaca_rest", ServiceHealth::Operational, Some(45.0), None, now);
        monitor.report("kalshi_stream", ServiceHealth::Operational, None, None, now);
        assert!(monitor.is_all_healthy(now));
    }

    #[test]
    fn one_major_outage_dominates() {
        let mut monitor = HealthMonitor::new(chrono::Duration::seconds(120));
        let now = Utc::now();
        monitor.report("alpaca_rest", ServiceHealth::Operational, Some(45.0), None, now);
        monitor.report(
            "kalshi_stream",
            ServiceHealth::MajorOutage,
            None,
            Some("connection refused".into()),
            now,
        );
        assert_eq!(monitor.overall(now), ServiceHealth::MajorOutage);
    }

    #[test]
    fn stale_reports_become_unknown() {
        let mut monitor = HealthMonitor::new(chrono::Duration::seconds(60));
        let now = Utc::now();
        monitor.report("alpaca_rest", ServiceHealth::Operational, Some(45.0), None, now);
        let later = now + chrono::Duration::seconds(120);
        assert_eq!(monitor.get("alpaca_rest", later), ServiceHealth::Unknown);
    }

    #[test]
    fn no_components_reports_unknown() {
        let monitor = HealthMonitor::new(chrono::Duration::seconds(60));
        assert_eq!(monitor.overall(Utc::now()), ServiceHealth::Unknown);
    }
}
