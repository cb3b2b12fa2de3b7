//! Reject-rate / slippage circuit breaker — spec §4.3.
//!
//! Grounded on `risk/engine.py::CircuitBreaker`. States:
//! `CLOSED -> OPEN` on trip, `OPEN -> HALF_OPEN` after cooldown,
//! `HALF_OPEN -> CLOSED` on success / `-> OPEN` on failure.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Copy, Clone, Debug)]
pub struct CircuitBreakerConfig {
    pub max_reject_rate: f64,
    pub max_slippage_pct: f64,
    pub reject_window_size: usize,
    pub min_samples: usize,
    pub cooldown: chrono::Duration,
}

impl CircuitBreakerConfig {
    pub fn sane_defaults() -> Self {
        Self {
            max_reject_rate: 0.30,
            max_slippage_pct: 0.02,
            reject_window_size: 10,
            min_samples: 5,
            cooldown: chrono::Duration::minutes(5),
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Outcome {
    success: bool,
    slippage_pct: f64,
}

pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: CircuitState,
    ring: VecDeque<Outcome>,
    opened_at: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            state: CircuitState::Closed,
            ring: VecDeque::new(),
            opened_at: None,
        }
    }

    pub fn state(&self, now: DateTime<Utc>) -> CircuitState {
        if self.state == CircuitState::Open {
            if let Some(opened_at) = self.opened_at {
                if now.signed_duration_since(opened_at) >= self.cfg.cooldown {
                    return CircuitState::HalfOpen;
                }
            }
        }
        self.state
    }

    fn push_outcome(&mut self, outcome: Outcome) {
        self.ring.push_back(outcome);
        while self.ring.len() > self.cfg.reject_window_size {
            self.ring.pop_front();
        }
    }

    fn should_trip(&self) -> bool {
        if self.ring.len() < self.cfg.min_samples {
            return false;
        }
        let reject_rate =
            self.ring.iter().filter(|o| !o.success).count() as f64 / self.ring.len() as f64;
        let avg_slippage =
            self.ring.iter().map(|o| o.slippage_pct).sum::<f64>() / self.ring.len() as f64;
        reject_rate > self.cfg.max_reject_rate || avg_slippage > self.cfg.max_slippage_pct
    }

    /// Record a successful submission/fill outcome.
    pub fn record_success(&mut self, slippage_pct: f64, now: DateTime<Utc>) {
        self.push_outcome(Outcome {
            success: true,
            slippage_pct,
        });
        self.transition_after_sample(true, now);
    }

    /// Record a rejected/failed submission outcome.
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.push_outcome(Outcome {
            success: false,
            slippage_pct: 0.0,
        });
        self.transition_after_sample(false, now);
    }

    fn transition_after_sample(&mut self, success: bool, now: DateTime<Utc>) {
        match self.state(now) {
            CircuitState::HalfOpen => {
                if success {
                    self.state = CircuitState::Closed;
                    self.opened_at = None;
                } else {
                    self.state = CircuitState::Open;
                    self.opened_at = Some(now);
                }
            }
            CircuitState::Closed => {
                if self.should_trip() {
                    self.state = CircuitState::Open;
                    self.opened_at = Some(now);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Manual reset: clears state and the outcome ring.
    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.ring.clear();
        self.opened_at = None;
    }
}
