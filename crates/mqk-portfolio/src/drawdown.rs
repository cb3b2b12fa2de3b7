//! Multi-level equity-drawdown protector.
//!
//! Mirrors the `Config`/`State`/`Input` -> `Decision` shape used by
//! `mqk-risk::engine`: level transitions are a pure function of drawdown
//! percentage plus sticky recovery-cooldown state. No IO, no wall clock —
//! callers supply `now_unix_secs` explicitly so the module stays
//! deterministic and testable.

use crate::fixedpoint::Micros;

/// Drawdown severity ladder. Ordered: higher variants are more severe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DrawdownLevel {
    Normal,
    Caution,
    Warning,
    Critical,
    Emergency,
}

impl std::fmt::Display for DrawdownLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DrawdownLevel::Normal => "NORMAL",
            DrawdownLevel::Caution => "CAUTION",
            DrawdownLevel::Warning => "WARNING",
            DrawdownLevel::Critical => "CRITICAL",
            DrawdownLevel::Emergency => "EMERGENCY",
        };
        write!(f, "{s}")
    }
}

/// Threshold/behavior configuration. `*_threshold_bps` are drawdown
/// fractions expressed in basis points of peak equity (e.g. 500 = 5%) to
/// keep comparisons integer-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawdownConfig {
    pub caution_threshold_bps: i64,
    pub warning_threshold_bps: i64,
    pub critical_threshold_bps: i64,
    pub emergency_threshold_bps: i64,

    pub daily_loss_limit: Micros,
    pub weekly_loss_limit: Micros,
    pub monthly_loss_limit: Micros,

    pub recovery_cooldown_secs: i64,
    pub reduced_sizing_bps: i64,

    pub liquidate_losers_first: bool,
    pub preserve_winners: bool,
}

impl DrawdownConfig {
    pub fn sane_defaults() -> Self {
        Self {
            caution_threshold_bps: 500,
            warning_threshold_bps: 800,
            critical_threshold_bps: 1200,
            emergency_threshold_bps: 1500,
            daily_loss_limit: Micros::new(25_000_000),
            weekly_loss_limit: Micros::new(75_000_000),
            monthly_loss_limit: Micros::new(150_000_000),
            recovery_cooldown_secs: 24 * 3600,
            reduced_sizing_bps: 5_000,
            liquidate_losers_first: true,
            preserve_winners: true,
        }
    }

    /// Scale dollar limits proportionally to account equity, matching
    /// `configure_for_account` in the original implementation.
    pub fn scaled_for_equity(equity: Micros) -> Self {
        let base = Self::sane_defaults();
        let scale = |bps: i64| -> Micros {
            Micros::new((equity.raw() as i128 * bps as i128 / 10_000) as i64)
        };
        Self {
            daily_loss_limit: scale(500),
            weekly_loss_limit: scale(1_000),
            monthly_loss_limit: scale(2_000),
            ..base
        }
    }
}

/// Drawdown state carried between `update_equity` calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawdownState {
    pub peak_equity: Micros,
    pub current_equity: Micros,
    pub level: DrawdownLevel,
    pub in_recovery: bool,
    pub recovery_deadline_unix_secs: i64,

    pub day_start_equity: Micros,
    pub week_start_equity: Micros,
    pub month_start_equity: Micros,
    pub day_id: u32,
    pub week_id: u32,
    pub month_id: u32,
}

impl DrawdownState {
    pub fn new(initial_equity: Micros, day_id: u32, week_id: u32, month_id: u32) -> Self {
        Self {
            peak_equity: initial_equity,
            current_equity: initial_equity,
            level: DrawdownLevel::Normal,
            in_recovery: false,
            recovery_deadline_unix_secs: 0,
            day_start_equity: initial_equity,
            week_start_equity: initial_equity,
            month_start_equity: initial_equity,
            day_id,
            week_id,
            month_id,
        }
    }

    /// Drawdown percentage from peak, in basis points. Zero when at or
    /// above the peak (and whenever peak is non-positive).
    pub fn drawdown_bps(&self) -> i64 {
        let peak = self.peak_equity.raw();
        if peak <= 0 {
            return 0;
        }
        let loss = peak - self.current_equity.raw();
        if loss <= 0 {
            return 0;
        }
        ((loss as i128 * 10_000) / peak as i128) as i64
    }
}

/// Effect of the current level on trading behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TradingPolicy {
    pub trading_allowed: bool,
    pub new_positions_allowed: bool,
    /// Sizing multiplier expressed in basis points of the unconstrained size
    /// (10_000 = 1.0x). Kept as an integer to avoid floats per spec.
    pub sizing_multiplier_bps: i64,
}

fn level_policy(level: DrawdownLevel) -> TradingPolicy {
    match level {
        DrawdownLevel::Normal => TradingPolicy {
            trading_allowed: true,
            new_positions_allowed: true,
            sizing_multiplier_bps: 10_000,
        },
        DrawdownLevel::Caution => TradingPolicy {
            trading_allowed: true,
            new_positions_allowed: true,
            sizing_multiplier_bps: 5_000,
        },
        DrawdownLevel::Warning => TradingPolicy {
            trading_allowed: true,
            new_positions_allowed: false,
            sizing_multiplier_bps: 5_000,
        },
        DrawdownLevel::Critical => TradingPolicy {
            trading_allowed: true,
            new_positions_allowed: false,
            sizing_multiplier_bps: 2_500,
        },
        DrawdownLevel::Emergency => TradingPolicy {
            trading_allowed: false,
            new_positions_allowed: false,
            sizing_multiplier_bps: 0,
        },
    }
}

fn determine_level(cfg: &DrawdownConfig, drawdown_bps: i64) -> DrawdownLevel {
    if drawdown_bps >= cfg.emergency_threshold_bps {
        DrawdownLevel::Emergency
    } else if drawdown_bps >= cfg.critical_threshold_bps {
        DrawdownLevel::Critical
    } else if drawdown_bps >= cfg.warning_threshold_bps {
        DrawdownLevel::Warning
    } else if drawdown_bps >= cfg.caution_threshold_bps {
        DrawdownLevel::Caution
    } else {
        DrawdownLevel::Normal
    }
}

/// Outcome of `update_equity`: the new state is applied in place; this
/// carries what a caller needs to react (level transition, liquidation need).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawdownUpdate {
    pub level: DrawdownLevel,
    pub previous_level: DrawdownLevel,
    pub policy: TradingPolicy,
    pub loss_limit_breached: bool,
}

/// Advance drawdown state with a new equity reading. `now_unix_secs` and the
/// deterministic day/week/month ids are supplied by the runtime so this
/// function has no hidden dependency on the wall clock.
pub fn update_equity(
    cfg: &DrawdownConfig,
    st: &mut DrawdownState,
    equity: Micros,
    now_unix_secs: i64,
    day_id: u32,
    week_id: u32,
    month_id: u32,
) -> DrawdownUpdate {
    if day_id != st.day_id {
        st.day_id = day_id;
        st.day_start_equity = equity;
    }
    if week_id != st.week_id {
        st.week_id = week_id;
        st.week_start_equity = equity;
    }
    if month_id != st.month_id {
        st.month_id = month_id;
        st.month_start_equity = equity;
    }

    let previous_level = st.level;
    st.current_equity = equity;

    if equity > st.peak_equity {
        st.peak_equity = equity;
        if st.in_recovery {
            st.in_recovery = false;
        }
    }

    let drawdown_bps = st.drawdown_bps();
    let mut level = determine_level(cfg, drawdown_bps);

    let daily_loss = st.day_start_equity - equity;
    let weekly_loss = st.week_start_equity - equity;
    let monthly_loss = st.month_start_equity - equity;
    let loss_limit_breached = daily_loss >= cfg.daily_loss_limit
        || weekly_loss >= cfg.weekly_loss_limit
        || monthly_loss >= cfg.monthly_loss_limit;

    if loss_limit_breached && level < DrawdownLevel::Warning {
        level = DrawdownLevel::Warning;
    }

    if matches!(level, DrawdownLevel::Critical | DrawdownLevel::Emergency) && !st.in_recovery {
        st.in_recovery = true;
        st.recovery_deadline_unix_secs = now_unix_secs + cfg.recovery_cooldown_secs;
    }
    if st.in_recovery && now_unix_secs >= st.recovery_deadline_unix_secs {
        st.in_recovery = false;
    }

    st.level = level;

    let mut policy = level_policy(level);
    if st.in_recovery {
        policy.new_positions_allowed = false;
        policy.sizing_multiplier_bps =
            (policy.sizing_multiplier_bps * cfg.reduced_sizing_bps) / 10_000;
    }

    DrawdownUpdate {
        level,
        previous_level,
        policy,
        loss_limit_breached,
    }
}

/// A single advisory liquidation instruction. Emission is advisory — the
/// protector never submits orders itself (spec.md §4.4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiquidationOrder {
    pub symbol: String,
    pub close_side: crate::types::Side,
    pub qty: i64,
    pub reason: &'static str,
    pub unrealized_pnl: Micros,
}

/// A minimal view of a position needed to plan liquidation, independent of
/// the richer `PositionState` so this module stays decoupled from ledger
/// internals.
#[derive(Clone, Debug)]
pub struct LiquidationCandidate {
    pub symbol: String,
    pub qty_signed: i64,
    pub market_value: Micros,
    pub unrealized_pnl: Micros,
}

/// Build the sorted liquidation plan for WARNING/CRITICAL/EMERGENCY levels.
/// Returns an empty plan outside those levels.
pub fn liquidation_plan(
    cfg: &DrawdownConfig,
    level: DrawdownLevel,
    positions: &[LiquidationCandidate],
) -> Vec<LiquidationOrder> {
    let target_reduction_bps: i64 = match level {
        DrawdownLevel::Emergency => 10_000,
        DrawdownLevel::Critical => 5_000,
        _ => return Vec::new(),
    };

    let mut candidates: Vec<&LiquidationCandidate> = positions
        .iter()
        .filter(|p| p.qty_signed != 0)
        .filter(|p| {
            !(cfg.preserve_winners
                && level != DrawdownLevel::Emergency
                && p.unrealized_pnl.is_non_negative())
        })
        .collect();

    if cfg.liquidate_losers_first {
        candidates.sort_by(|a, b| {
            a.unrealized_pnl
                .raw()
                .cmp(&b.unrealized_pnl.raw())
                .then_with(|| b.market_value.abs().raw().cmp(&a.market_value.abs().raw()))
        });
    }

    candidates
        .into_iter()
        .map(|p| {
            let reduce_qty = ((p.qty_signed.abs() as i128 * target_reduction_bps as i128)
                / 10_000) as i64;
            let qty = if reduce_qty == 0 {
                p.qty_signed.abs()
            } else {
                reduce_qty
            };
            let close_side = if p.qty_signed > 0 {
                crate::types::Side::Sell
            } else {
                crate::types::Side::Buy
            };
            let reason = if p.unrealized_pnl.is_negative() {
                "drawdown_liquidation_loser"
            } else {
                "drawdown_liquidation_winner"
            };
            LiquidationOrder {
                symbol: p.symbol.clone(),
                close_side,
                qty,
                reason,
                unrealized_pnl: p.unrealized_pnl,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(dollars: i64) -> Micros {
        Micros::new(dollars * 1_000_000)
    }

    #[test]
    fn escalation_sequence_matches_spec_example() {
        let cfg = DrawdownConfig::sane_defaults();
        let mut st = DrawdownState::new(m(1000), 1, 1, 1);

        let levels_and_mult: Vec<(i64, DrawdownLevel, i64)> = vec![
            (970, DrawdownLevel::Caution, 5_000),
            (920, DrawdownLevel::Warning, 5_000),
            (870, DrawdownLevel::Critical, 2_500),
            (830, DrawdownLevel::Emergency, 0),
        ];

        for (equity, expected_level, expected_mult) in levels_and_mult {
            let update = update_equity(&cfg, &mut st, m(equity), 0, 1, 1, 1);
            assert_eq!(update.level, expected_level, "equity={equity}");
            assert_eq!(update.policy.sizing_multiplier_bps, expected_mult);
        }

        assert!(!level_policy(DrawdownLevel::Emergency).trading_allowed);
    }

    #[test]
    fn emergency_blocks_trading_others_allow() {
        assert!(level_policy(DrawdownLevel::Normal).trading_allowed);
        assert!(level_policy(DrawdownLevel::Critical).trading_allowed);
        assert!(!level_policy(DrawdownLevel::Emergency).trading_allowed);
    }

    #[test]
    fn liquidation_plan_empty_below_critical() {
        let cfg = DrawdownConfig::sane_defaults();
        let positions = vec![LiquidationCandidate {
            symbol: "AAPL".into(),
            qty_signed: 10,
            market_value: m(1000),
            unrealized_pnl: m(-50),
        }];
        assert!(liquidation_plan(&cfg, DrawdownLevel::Warning, &positions).is_empty());
    }

    #[test]
    fn liquidation_plan_losers_first_at_critical() {
        let cfg = DrawdownConfig::sane_defaults();
        let positions = vec![
            LiquidationCandidate {
                symbol: "WIN".into(),
                qty_signed: 10,
                market_value: m(1000),
                unrealized_pnl: m(50),
            },
            LiquidationCandidate {
                symbol: "LOSE".into(),
                qty_signed: 10,
                market_value: m(900),
                unrealized_pnl: m(-80),
            },
        ];
        let plan = liquidation_plan(&cfg, DrawdownLevel::Critical, &positions);
        // preserve_winners is on by default and level < EMERGENCY, so the
        // winner is skipped entirely.
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].symbol, "LOSE");
        assert_eq!(plan[0].qty, 5);
    }

    #[test]
    fn liquidation_plan_emergency_includes_winners_full_reduction() {
        let cfg = DrawdownConfig::sane_defaults();
        let positions = vec![LiquidationCandidate {
            symbol: "WIN".into(),
            qty_signed: 10,
            market_value: m(1000),
            unrealized_pnl: m(50),
        }];
        let plan = liquidation_plan(&cfg, DrawdownLevel::Emergency, &positions);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].qty, 10);
    }

    #[test]
    fn loss_limit_breach_promotes_to_at_least_warning() {
        let cfg = DrawdownConfig::sane_defaults();
        let mut st = DrawdownState::new(m(1000), 1, 1, 1);
        // Small drawdown pct (2%) but daily loss of $25 hits the absolute limit.
        let update = update_equity(&cfg, &mut st, m(975), 0, 1, 1, 1);
        assert_eq!(update.level, DrawdownLevel::Warning);
        assert!(update.loss_limit_breached);
    }

    #[test]
    fn new_peak_exits_recovery() {
        let cfg = DrawdownConfig::sane_defaults();
        let mut st = DrawdownState::new(m(1000), 1, 1, 1);
        update_equity(&cfg, &mut st, m(830), 0, 1, 1, 1); // enters EMERGENCY + recovery
        assert!(st.in_recovery);
        update_equity(&cfg, &mut st, m(1050), 100, 1, 1, 1); // new peak
        assert!(!st.in_recovery);
    }
}
