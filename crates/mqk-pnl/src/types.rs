use chrono::{DateTime, Utc};
use mqk_portfolio::Micros;

/// Alert catalog, per spec §4.8.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertType {
    DailyProfitTarget,
    DailyLossLimit,
    PositionProfitPct,
    PositionProfitAbs,
    PositionLossPct,
    PositionLossAbs,
    LosingStreak,
    WinningStreak,
    PnlVelocity,
    DrawdownWarning,
    RecoveryMilestone,
    NewEquityHigh,
    BreakevenFromDrawdown,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlertPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Cooldown scope: a symbol, or the literal `"portfolio"` for account-wide
/// alerts.
pub type Scope = String;

pub fn portfolio_scope() -> Scope {
    "portfolio".to_string()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    /// Alert value, expressed as a plain `f64` ratio/percentage for pct-type
    /// alerts or as `Micros` raw dollars for abs-type alerts (callers know
    /// which from `alert_type`).
    pub value: f64,
    pub threshold: f64,
    pub symbol: Option<String>,
    pub acknowledged: bool,
    pub at: DateTime<Utc>,
}

/// Per-symbol position P&L state.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionPnl {
    pub symbol: String,
    pub qty: i64,
    pub avg_entry: Micros,
    pub current_price: Micros,
    pub unrealized: Micros,
}

impl PositionPnl {
    pub fn market_value(&self) -> Micros {
        self.current_price
            .checked_mul_qty(self.qty.abs())
            .unwrap_or(Micros::MAX)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct AlertConfig {
    pub daily_profit_target_pct: f64,
    pub daily_loss_limit_pct: f64,
    pub position_profit_pct: f64,
    pub position_profit_abs: Micros,
    pub position_loss_pct: f64,
    pub position_loss_abs: Micros,
    pub losing_streak_threshold: i32,
    pub winning_streak_threshold: i32,
    pub velocity_threshold_pct: f64,
    pub velocity_window_minutes: i64,
    pub cooldown_minutes: i64,
    pub drawdown_warning_pct: f64,
}

impl AlertConfig {
    pub fn sane_defaults() -> Self {
        Self {
            daily_profit_target_pct: 0.03,
            daily_loss_limit_pct: 0.02,
            position_profit_pct: 0.05,
            position_profit_abs: Micros::new(500_000_000),
            position_loss_pct: 0.05,
            position_loss_abs: Micros::new(500_000_000),
            losing_streak_threshold: 3,
            winning_streak_threshold: 5,
            velocity_threshold_pct: 0.02,
            velocity_window_minutes: 15,
            cooldown_minutes: 10,
            drawdown_warning_pct: 0.05,
        }
    }
}
