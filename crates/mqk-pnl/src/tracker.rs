//! Real-time P&L tracking and threshold/streak/velocity alerting — spec §4.8.
//!
//! Grounded on `risk/pnl_tracker.py::PnLTracker`. Explicit-clock inputs
//! throughout (no internal wall-clock reads), matching the
//! Config/State/Input → Decision idiom used by `mqk-portfolio::drawdown`.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use mqk_portfolio::Micros;

use crate::types::{Alert, AlertConfig, AlertPriority, AlertType, PositionPnl};

#[derive(Clone, Debug)]
pub struct PnlTracker {
    cfg: AlertConfig,
    positions: BTreeMap<String, PositionPnl>,
    realized_total: Micros,
    /// Signed streak counter: wins increment toward +inf, losses decrement
    /// toward -inf, sign change resets to +-1.
    streak: i32,
    equity_samples: VecDeque<(DateTime<Utc>, Micros)>,
    peak_equity: Micros,
    trough_since_peak: Micros,
    day_start_equity: Micros,
    recovered_milestones: Vec<u8>,
    cooldowns: BTreeMap<(AlertType, String), DateTime<Utc>>,
}

impl PnlTracker {
    pub fn new(cfg: AlertConfig, starting_equity: Micros, now: DateTime<Utc>) -> Self {
        Self {
            cfg,
            positions: BTreeMap::new(),
            realized_total: Micros::ZERO,
            streak: 0,
            equity_samples: VecDeque::from([(now, starting_equity)]),
            peak_equity: starting_equity,
            trough_since_peak: starting_equity,
            day_start_equity: starting_equity,
            recovered_milestones: Vec::new(),
            cooldowns: BTreeMap::new(),
        }
    }

    fn cooldown_ok(&mut self, alert_type: AlertType, scope: &str, now: DateTime<Utc>) -> bool {
        let key = (alert_type, scope.to_string());
        let ready = match self.cooldowns.get(&key) {
            Some(last) => now.signed_duration_since(*last) >= chrono::Duration::minutes(self.cfg.cooldown_minutes),
            None => true,
        };
        if ready {
            self.cooldowns.insert(key, now);
        }
        ready
    }

    fn make_alert(
        &self,
        alert_type: AlertType,
        priority: AlertPriority,
        value: f64,
        threshold: f64,
        symbol: Option<String>,
        now: DateTime<Utc>,
    ) -> Alert {
        Alert {
            alert_type,
            priority,
            value,
            threshold,
            symbol,
            acknowledged: false,
            at: now,
        }
    }

    /// Mark-to-market update for a single position. Recomputes unrealized
    /// P&L and emits position-level profit/loss alerts if thresholds are
    /// crossed and the cooldown has elapsed.
    pub fn update(
        &mut self,
        symbol: &str,
        qty: i64,
        avg_entry: Micros,
        current_price: Micros,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let unrealized = current_price
            .checked_mul_qty(qty)
            .unwrap_or(Micros::ZERO)
            .saturating_sub(avg_entry.checked_mul_qty(qty).unwrap_or(Micros::ZERO));

        let cost_basis = avg_entry.checked_mul_qty(qty.abs()).unwrap_or(Micros::MAX);
        let pct = if cost_basis.raw() != 0 {
            unrealized.raw() as f64 / cost_basis.raw() as f64
        } else {
            0.0
        };

        self.positions.insert(
            symbol.to_string(),
            PositionPnl {
                symbol: symbol.to_string(),
                qty,
                avg_entry,
                current_price,
                unrealized,
            },
        );

        if pct >= self.cfg.position_profit_pct
            && self.cooldown_ok(AlertType::PositionProfitPct, symbol, now)
        {
            alerts.push(self.make_alert(
                AlertType::PositionProfitPct,
                AlertPriority::Medium,
                pct,
                self.cfg.position_profit_pct,
                Some(symbol.to_string()),
                now,
            ));
        }
        if unrealized.raw() >= self.cfg.position_profit_abs.raw()
            && self.cooldown_ok(AlertType::PositionProfitAbs, symbol, now)
        {
            alerts.push(self.make_alert(
                AlertType::PositionProfitAbs,
                AlertPriority::Medium,
                unrealized.raw() as f64 / 1_000_000.0,
                self.cfg.position_profit_abs.raw() as f64 / 1_000_000.0,
                Some(symbol.to_string()),
                now,
            ));
        }
        if pct <= -self.cfg.position_loss_pct
            && self.cooldown_ok(AlertType::PositionLossPct, symbol, now)
        {
            alerts.push(self.make_alert(
                AlertType::PositionLossPct,
                AlertPriority::High,
                pct,
                -self.cfg.position_loss_pct,
                Some(symbol.to_string()),
                now,
            ));
        }
        if unrealized.raw() <= -self.cfg.position_loss_abs.raw()
            && self.cooldown_ok(AlertType::PositionLossAbs, symbol, now)
        {
            alerts.push(self.make_alert(
                AlertType::PositionLossAbs,
                AlertPriority::High,
                unrealized.raw() as f64 / 1_000_000.0,
                -(self.cfg.position_loss_abs.raw() as f64) / 1_000_000.0,
                Some(symbol.to_string()),
                now,
            ));
        }

        alerts
    }

    /// Record a closed trade's realized P&L, update the win/loss streak,
    /// and emit streak alerts when the threshold is crossed.
    pub fn record_trade(&mut self, realized_pnl: Micros, now: DateTime<Utc>) -> Vec<Alert> {
        self.realized_total += realized_pnl;

        if realized_pnl.raw() > 0 {
            self.streak = if self.streak > 0 { self.streak + 1 } else { 1 };
        } else if realized_pnl.raw() < 0 {
            self.streak = if self.streak < 0 { self.streak - 1 } else { -1 };
        }

        let mut alerts = Vec::new();
        if self.streak <= -self.cfg.losing_streak_threshold
            && self.cooldown_ok(AlertType::LosingStreak, "portfolio", now)
        {
            alerts.push(self.make_alert(
                AlertType::LosingStreak,
                AlertPriority::High,
                self.streak as f64,
                -(self.cfg.losing_streak_threshold as f64),
                None,
                now,
            ));
        }
        if self.streak >= self.cfg.winning_streak_threshold
            && self.cooldown_ok(AlertType::WinningStreak, "portfolio", now)
        {
            alerts.push(self.make_alert(
                AlertType::WinningStreak,
                AlertPriority::Low,
                self.streak as f64,
                self.cfg.winning_streak_threshold as f64,
                None,
                now,
            ));
        }
        alerts
    }

    pub fn unrealized_total(&self) -> Micros {
        self.positions
            .values()
            .fold(Micros::ZERO, |acc, p| acc.saturating_add(p.unrealized))
    }

    pub fn realized_total(&self) -> Micros {
        self.realized_total
    }

    pub fn streak(&self) -> i32 {
        self.streak
    }

    /// Record an account-equity sample (cash + unrealized + realized),
    /// updating peak equity, drawdown-recovery milestones, velocity, and
    /// daily profit/loss-target alerts.
    pub fn observe_equity(&mut self, equity: Micros, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = Vec::new();

        self.equity_samples.push_back((now, equity));
        let window_start = now - chrono::Duration::minutes(self.cfg.velocity_window_minutes);
        while self
            .equity_samples
            .front()
            .map(|(t, _)| *t < window_start)
            .unwrap_or(false)
            && self.equity_samples.len() > 1
        {
            self.equity_samples.pop_front();
        }

        if let Some((_, start_equity)) = self.equity_samples.front().copied() {
            if start_equity.raw() != 0 {
                let delta = (equity.raw() - start_equity.raw()).abs() as f64;
                let velocity_pct = delta / start_equity.raw().abs() as f64;
                if velocity_pct >= self.cfg.velocity_threshold_pct
                    && self.cooldown_ok(AlertType::PnlVelocity, "portfolio", now)
                {
                    alerts.push(self.make_alert(
                        AlertType::PnlVelocity,
                        AlertPriority::Medium,
                        velocity_pct,
                        self.cfg.velocity_threshold_pct,
                        None,
                        now,
                    ));
                }
            }
        }

        if equity > self.peak_equity {
            let recovering_from_drawdown = self.trough_since_peak < self.peak_equity;
            self.peak_equity = equity;
            self.trough_since_peak = equity;
            self.recovered_milestones.clear();
            if self.cooldown_ok(AlertType::NewEquityHigh, "portfolio", now) {
                alerts.push(self.make_alert(
                    AlertType::NewEquityHigh,
                    AlertPriority::Low,
                    equity.raw() as f64 / 1_000_000.0,
                    self.peak_equity.raw() as f64 / 1_000_000.0,
                    None,
                    now,
                ));
            }
            if recovering_from_drawdown
                && self.cooldown_ok(AlertType::BreakevenFromDrawdown, "portfolio", now)
            {
                alerts.push(self.make_alert(
                    AlertType::BreakevenFromDrawdown,
                    AlertPriority::Low,
                    0.0,
                    0.0,
                    None,
                    now,
                ));
            }
        } else if self.peak_equity.raw() > 0 {
            if equity < self.trough_since_peak {
                self.trough_since_peak = equity;
            }
            let drawdown = (self.peak_equity.raw() - equity.raw()) as f64 / self.peak_equity.raw() as f64;
            if drawdown >= self.cfg.drawdown_warning_pct
                && self.cooldown_ok(AlertType::DrawdownWarning, "portfolio", now)
            {
                alerts.push(self.make_alert(
                    AlertType::DrawdownWarning,
                    AlertPriority::High,
                    drawdown,
                    self.cfg.drawdown_warning_pct,
                    None,
                    now,
                ));
            }

            // Recovery milestones: 25/50/75/100% of the way back from
            // trough to peak, each fired at most once per drawdown episode.
            let span = (self.peak_equity.raw() - self.trough_since_peak.raw()).max(1) as f64;
            let recovered_pct = (equity.raw() - self.trough_since_peak.raw()) as f64 / span;
            for milestone in [25u8, 50, 75, 100] {
                if self.recovered_milestones.contains(&milestone) {
                    continue;
                }
                if recovered_pct * 100.0 >= milestone as f64 {
                    self.recovered_milestones.push(milestone);
                    if self.cooldown_ok(AlertType::RecoveryMilestone, "portfolio", now) {
                        alerts.push(self.make_alert(
                            AlertType::RecoveryMilestone,
                            AlertPriority::Low,
                            recovered_pct,
                            milestone as f64 / 100.0,
                            None,
                            now,
                        ));
                    }
                }
            }
        }

        let daily_pct = if self.day_start_equity.raw() != 0 {
            (equity.raw() - self.day_start_equity.raw()) as f64 / self.day_start_equity.raw() as f64
        } else {
            0.0
        };
        if daily_pct >= self.cfg.daily_profit_target_pct
            && self.cooldown_ok(AlertType::DailyProfitTarget, "portfolio", now)
        {
            alerts.push(self.make_alert(
                AlertType::DailyProfitTarget,
                AlertPriority::Low,
                daily_pct,
                self.cfg.daily_profit_target_pct,
                None,
                now,
            ));
        }
        if daily_pct <= -self.cfg.daily_loss_limit_pct
            && self.cooldown_ok(AlertType::DailyLossLimit, "portfolio", now)
        {
            alerts.push(self.make_alert(
                AlertType::DailyLossLimit,
                AlertPriority::Critical,
                daily_pct,
                -self.cfg.daily_loss_limit_pct,
                None,
                now,
            ));
        }

        alerts
    }

    /// Reset the daily start-of-day equity reference (called at UTC day
    /// boundary by the caller).
    pub fn reset_day(&mut self, equity: Micros) {
        self.day_start_equity = equity;
    }
}
