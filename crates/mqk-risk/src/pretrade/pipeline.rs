//! Ordered pre-trade check pipeline — spec §4.2.
//!
//! Grounded on `risk/engine.py::RiskEngine.check_order`. Deterministic and
//! pure with respect to its inputs plus the engine's internal
//! SpendTracker/LossTracker/CircuitBreaker/kill-switch state; fail-safe
//! (any check that cannot be evaluated is treated as a failure).

use chrono::{DateTime, Utc};
use mqk_portfolio::Micros;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use super::loss::LossTracker;
use super::spend::SpendTracker;
use super::types::{
    PretradeAction, PretradeDecision, PretradeIntent, PretradePosition, PretradeSide, ReasonCode,
    RiskLimits,
};

/// Calendar identifiers the caller derives from a wall clock (UTC day,
/// ISO week, and month-of-year) — see spec §9 "pick UTC day boundaries".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PeriodIds {
    pub day_id: i64,
    pub week_id: i64,
    pub month_id: i64,
}

pub struct RiskEngine {
    limits: RiskLimits,
    kill_switch: bool,
    circuit_breaker: CircuitBreaker,
    spend: SpendTracker,
    loss: LossTracker,
}

impl RiskEngine {
    pub fn new(limits: RiskLimits, starting_equity: Micros) -> Self {
        Self {
            limits,
            kill_switch: false,
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::sane_defaults()),
            spend: SpendTracker::new(),
            loss: LossTracker::new(starting_equity),
        }
    }

    pub fn set_kill_switch(&mut self, on: bool) {
        self.kill_switch = on;
    }

    pub fn circuit_breaker_mut(&mut self) -> &mut CircuitBreaker {
        &mut self.circuit_breaker
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Feed the current account equity into the loss tracker ahead of a
    /// `check_order` call (spec §4.2 "State updates").
    pub fn update_equity(&mut self, equity: Micros, period: PeriodIds) {
        self.loss.update_equity(equity, period.day_id, period.week_id);
    }

    /// A fill records notional into the spend tracker and a success sample
    /// into the circuit breaker.
    pub fn on_fill(&mut self, notional: Micros, slippage_pct: f64, period: PeriodIds, now: DateTime<Utc>) {
        self.spend
            .record_spend(notional, period.day_id, period.week_id, period.month_id);
        self.circuit_breaker.record_success(slippage_pct, now);
    }

    /// A rejection records a failure sample into the circuit breaker.
    pub fn on_reject(&mut self, now: DateTime<Utc>) {
        self.circuit_breaker.record_failure(now);
    }

    /// Run the full ordered pipeline. `positions` is the current book
    /// (excluding the proposed intent); `account_equity` is the latest
    /// snapshot.
    pub fn check_order(
        &mut self,
        intent: &PretradeIntent,
        positions: &[PretradePosition],
        market_price: Micros,
        account_equity: Micros,
        period: PeriodIds,
        now: DateTime<Utc>,
    ) -> PretradeDecision {
        let mut passed = Vec::new();
        let mut warnings = Vec::new();

        // 1. Kill switch
        if self.kill_switch {
            return reject(vec![ReasonCode::KillSwitchActive], passed, warnings);
        }
        passed.push("kill_switch");

        // 2. Circuit breaker
        match self.circuit_breaker.state(now) {
            CircuitState::Open => {
                return reject(vec![ReasonCode::CircuitBreaker], passed, warnings);
            }
            CircuitState::HalfOpen => {
                warnings.push("circuit breaker half-open: probing".to_string());
            }
            CircuitState::Closed => {}
        }
        passed.push("circuit_breaker");

        // 3. Symbol allow/blocklist
        if self.limits.symbol_blocklist.contains(&intent.symbol) {
            return reject(vec![ReasonCode::SymbolBlocked], passed, warnings);
        }
        if !self.limits.symbol_allowlist.is_empty()
            && !self.limits.symbol_allowlist.contains(&intent.symbol)
        {
            return reject(vec![ReasonCode::SymbolNotAllowed], passed, warnings);
        }
        passed.push("symbol_allow_blocklist");

        // 4. Order notional / shares
        let mut failed = Vec::new();
        if intent.order_notional > self.limits.max_order_notional {
            failed.push(ReasonCode::OrderNotionalExceeded);
        }
        if intent.qty.abs() > self.limits.max_order_shares {
            failed.push(ReasonCode::OrderNotionalExceeded);
        }
        if !failed.is_empty() {
            return reject(failed, passed, warnings);
        }
        passed.push("order_notional_shares");

        // 5. New position shares / notional
        let existing_qty = positions
            .iter()
            .find(|p| p.symbol == intent.symbol)
            .map(|p| p.qty)
            .unwrap_or(0);
        let signed_delta = match intent.side {
            PretradeSide::Buy => intent.qty,
            PretradeSide::Sell => -intent.qty,
        };
        let qty_after = existing_qty + signed_delta;
        if qty_after.abs() > self.limits.max_position_shares {
            return reject(vec![ReasonCode::PositionSharesExceeded], passed, warnings);
        }
        let position_notional = market_price
            .checked_mul_qty(qty_after.abs())
            .unwrap_or(Micros::MAX);
        if position_notional > self.limits.max_position_notional {
            return reject(vec![ReasonCode::PositionNotionalExceeded], passed, warnings);
        }
        passed.push("position_shares_notional");

        // 6. Total exposure
        let existing_exposure = positions
            .iter()
            .fold(Micros::ZERO, |acc, p| acc.saturating_add(p.market_value.abs()));
        let buy_notional = match intent.side {
            PretradeSide::Buy => intent.order_notional,
            PretradeSide::Sell => Micros::ZERO,
        };
        if existing_exposure.saturating_add(buy_notional) > self.limits.max_total_exposure {
            return reject(vec![ReasonCode::TotalExposureExceeded], passed, warnings);
        }
        passed.push("total_exposure");

        // 7. Concentration (skipped if equity <= 0). Cross-multiplied integer
        // comparison -- position_notional/equity is a ratio compared against
        // a configured limit, which spec §3/§9 forbid doing in binary float.
        if account_equity.raw() > 0 {
            let exceeds = position_notional.raw() as i128 * 10_000
                > self.limits.max_concentration_bps as i128 * account_equity.raw() as i128;
            if exceeds {
                return reject(vec![ReasonCode::ConcentrationExceeded], passed, warnings);
            }
        }
        passed.push("concentration");

        // 8. Daily/weekly loss + drawdown
        let daily_pnl = self.loss.daily_pnl(account_equity);
        let weekly_pnl = self.loss.weekly_pnl(account_equity);
        let drawdown_bps = self.loss.drawdown_bps(account_equity);
        let mut failed = Vec::new();
        if daily_pnl.is_negative() && daily_pnl.abs() > self.limits.daily_loss_limit {
            failed.push(ReasonCode::DailyLossLimit);
        }
        if weekly_pnl.is_negative() && weekly_pnl.abs() > self.limits.weekly_loss_limit {
            failed.push(ReasonCode::WeeklyLossLimit);
        }
        if drawdown_bps > self.limits.max_drawdown_bps {
            failed.push(ReasonCode::DrawdownLimit);
        }
        if !failed.is_empty() {
            return reject(failed, passed, warnings);
        }
        passed.push("loss_drawdown");

        // 9. Spend limits (buys only)
        if matches!(intent.side, PretradeSide::Buy) {
            let remaining_daily = self.spend.remaining_daily(
                self.limits.daily_spend_limit,
                period.day_id,
                period.week_id,
                period.month_id,
            );
            let remaining_weekly = self.spend.remaining_weekly(
                self.limits.weekly_spend_limit,
                period.day_id,
                period.week_id,
                period.month_id,
            );
            let remaining_monthly = self.spend.remaining_monthly(
                self.limits.monthly_spend_limit,
                period.day_id,
                period.week_id,
                period.month_id,
            );
            let mut failed = Vec::new();
            if intent.order_notional > remaining_daily {
                failed.push(ReasonCode::DailySpendLimit);
            }
            if intent.order_notional > remaining_weekly {
                failed.push(ReasonCode::WeeklySpendLimit);
            }
            if intent.order_notional > remaining_monthly {
                failed.push(ReasonCode::MonthlySpendLimit);
            }
            if !failed.is_empty() {
                return reject(failed, passed, warnings);
            }
        }
        passed.push("spend_limits");

        // Decision classification
        if self.limits.dry_run {
            return PretradeDecision {
                action: PretradeAction::DryRun,
                passed,
                failed: vec![],
                warnings,
                approval_reason: None,
            };
        }

        let needs_approval = intent.order_notional > self.limits.approval_notional_threshold
            || daily_pnl.is_negative() && daily_pnl.abs() > self.limits.approval_loss_threshold;
        if needs_approval {
            let reason = if intent.order_notional > self.limits.approval_notional_threshold {
                format!(
                    "order notional {} exceeds approval threshold {}",
                    intent.order_notional, self.limits.approval_notional_threshold
                )
            } else {
                format!(
                    "daily loss {} exceeds approval threshold {}",
                    daily_pnl.abs(),
                    self.limits.approval_loss_threshold
                )
            };
            return PretradeDecision {
                action: PretradeAction::RequireApproval,
                passed,
                failed: vec![],
                warnings,
                approval_reason: Some(reason),
            };
        }

        PretradeDecision {
            action: PretradeAction::Approve,
            passed,
            failed: vec![],
            warnings,
            approval_reason: None,
        }
    }
}

fn reject(
    failed: Vec<ReasonCode>,
    passed: Vec<&'static str>,
    warnings: Vec<String>,
) -> PretradeDecision {
    PretradeDecision {
        action: PretradeAction::Reject,
        passed,
        failed,
        warnings,
        approval_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period() -> PeriodIds {
        PeriodIds {
            day_id: 1,
            week_id: 1,
            month_id: 1,
        }
    }

    fn intent(notional: i64, qty: i64) -> PretradeIntent {
        PretradeIntent {
            symbol: "AAPL".into(),
            side: PretradeSide::Buy,
            qty,
            order_notional: Micros::new(notional),
        }
    }

    #[test]
    fn kill_switch_short_circuits() {
        let mut engine = RiskEngine::new(RiskLimits::sane_defaults(), Micros::new(1_000_000_000_000));
        engine.set_kill_switch(true);
        let decision = engine.check_order(
            &intent(1_000_000, 1),
            &[],
            Micros::new(100_000_000),
            Micros::new(1_000_000_000_000),
            period(),
            Utc::now(),
        );
        assert_eq!(decision.action, PretradeAction::Reject);
        assert_eq!(decision.failed, vec![ReasonCode::KillSwitchActive]);
    }

    #[test]
    fn order_at_exactly_max_notional_approves_epsilon_over_rejects() {
        let mut limits = RiskLimits::sane_defaults();
        limits.max_order_notional = Micros::new(50_000_000_000);
        limits.approval_notional_threshold = Micros::new(1_000_000_000_000);
        let mut engine = RiskEngine::new(limits, Micros::new(1_000_000_000_000));

        let at_limit = engine.check_order(
            &intent(50_000_000_000, 10),
            &[],
            Micros::new(100_000_000),
            Micros::new(1_000_000_000_000),
            period(),
            Utc::now(),
        );
        assert_eq!(at_limit.action, PretradeAction::Approve);

        let over_limit = engine.check_order(
            &intent(50_000_000_001, 10),
            &[],
            Micros::new(100_000_000),
            Micros::new(1_000_000_000_000),
            period(),
            Utc::now(),
        );
        assert_eq!(over_limit.action, PretradeAction::Reject);
        assert_eq!(over_limit.failed, vec![ReasonCode::OrderNotionalExceeded]);
    }

    #[test]
    fn zero_equity_skips_concentration_check() {
        let mut engine = RiskEngine::new(RiskLimits::sane_defaults(), Micros::ZERO);
        let decision = engine.check_order(
            &intent(1_000_000, 1),
            &[],
            Micros::new(100_000_000),
            Micros::ZERO,
            period(),
            Utc::now(),
        );
        assert!(!decision.failed.contains(&ReasonCode::ConcentrationExceeded));
    }

    #[test]
    fn sector_limit_example_rejects_total_exposure() {
        // Equity=1000, positions {AAPL: 250}, propose MSFT for 100.
        // This tests total-exposure at the RiskEngine layer (sector-specific
        // concentration is CorrelationManager's job) -- here we confirm the
        // aggregate exposure check independently rejects when configured tight.
        let mut limits = RiskLimits::sane_defaults();
        limits.max_total_exposure = Micros::new(300_000_000);
        let mut engine = RiskEngine::new(limits, Micros::new(1_000_000_000));
        let positions = vec![PretradePosition {
            symbol: "AAPL".into(),
            qty: 1,
            market_value: Micros::new(250_000_000),
        }];
        let decision = engine.check_order(
            &PretradeIntent {
                symbol: "MSFT".into(),
                side: PretradeSide::Buy,
                qty: 1,
                order_notional: Micros::new(100_000_000),
            },
            &positions,
            Micros::new(100_000_000),
            Micros::new(1_000_000_000),
            period(),
            Utc::now(),
        );
        assert_eq!(decision.action, PretradeAction::Reject);
        assert_eq!(decision.failed, vec![ReasonCode::TotalExposureExceeded]);
    }

    #[test]
    fn empty_allowlist_disables_allowlist_but_blocklist_still_active() {
        let mut limits = RiskLimits::sane_defaults();
        limits.symbol_blocklist.insert("BADCO".to_string());
        let mut engine = RiskEngine::new(limits, Micros::new(1_000_000_000_000));

        let ok = engine.check_order(
            &intent(1_000_000, 1),
            &[],
            Micros::new(100_000_000),
            Micros::new(1_000_000_000_000),
            period(),
            Utc::now(),
        );
        assert_ne!(ok.action, PretradeAction::Reject);

        let blocked = engine.check_order(
            &PretradeIntent {
                symbol: "BADCO".into(),
                side: PretradeSide::Buy,
                qty: 1,
                order_notional: Micros::new(1_000_000),
            },
            &[],
            Micros::new(100_000_000),
            Micros::new(1_000_000_000_000),
            period(),
            Utc::now(),
        );
        assert_eq!(blocked.action, PretradeAction::Reject);
        assert_eq!(blocked.failed, vec![ReasonCode::SymbolBlocked]);
    }

    #[test]
    fn dry_run_classification_overrides_approve() {
        let mut limits = RiskLimits::sane_defaults();
        limits.dry_run = true;
        let mut engine = RiskEngine::new(limits, Micros::new(1_000_000_000_000));
        let decision = engine.check_order(
            &intent(1_000_000, 1),
            &[],
            Micros::new(100_000_000),
            Micros::new(1_000_000_000_000),
            period(),
            Utc::now(),
        );
        assert_eq!(decision.action, PretradeAction::DryRun);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let mut limits = RiskLimits::sane_defaults();
        limits.symbol_blocklist.insert("BADCO".to_string());
        let mut engine = RiskEngine::new(limits, Micros::new(1_000_000_000_000));
        let i = PretradeIntent {
            symbol: "BADCO".into(),
            side: PretradeSide::Buy,
            qty: 1,
            order_notional: Micros::new(1_000_000),
        };
        let d1 = engine.check_order(&i, &[], Micros::new(1_000_000), Micros::new(1_000_000_000_000), period(), Utc::now());
        let d2 = engine.check_order(&i, &[], Micros::new(1_000_000), Micros::new(1_000_000_000_000), period(), Utc::now());
        assert_eq!(d1.action, PretradeAction::Reject);
        assert_eq!(d1.action, d2.action);
        assert_eq!(d1.failed, d2.failed);
    }
}
