use std::collections::BTreeSet;

use mqk_portfolio::Micros;

/// Exact machine-readable reason codes from spec §7. Values are carried
/// verbatim so callers/tests can match the literal strings without a
/// translation layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReasonCode {
    KillSwitchActive,
    CircuitBreaker,
    OrderNotionalExceeded,
    PositionSharesExceeded,
    PositionNotionalExceeded,
    TotalExposureExceeded,
    ConcentrationExceeded,
    DailyLossLimit,
    WeeklyLossLimit,
    DrawdownLimit,
    DailySpendLimit,
    WeeklySpendLimit,
    MonthlySpendLimit,
    SymbolBlocked,
    SymbolNotAllowed,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::KillSwitchActive => "KILL_SWITCH_ACTIVE",
            ReasonCode::CircuitBreaker => "CIRCUIT_BREAKER",
            ReasonCode::OrderNotionalExceeded => "ORDER_NOTIONAL_EXCEEDED",
            ReasonCode::PositionSharesExceeded => "POSITION_SHARES_EXCEEDED",
            ReasonCode::PositionNotionalExceeded => "POSITION_NOTIONAL_EXCEEDED",
            ReasonCode::TotalExposureExceeded => "TOTAL_EXPOSURE_EXCEEDED",
            ReasonCode::ConcentrationExceeded => "CONCENTRATION_EXCEEDED",
            ReasonCode::DailyLossLimit => "DAILY_LOSS_LIMIT",
            ReasonCode::WeeklyLossLimit => "WEEKLY_LOSS_LIMIT",
            ReasonCode::DrawdownLimit => "DRAWDOWN_LIMIT",
            ReasonCode::DailySpendLimit => "DAILY_SPEND_LIMIT",
            ReasonCode::WeeklySpendLimit => "WEEKLY_SPEND_LIMIT",
            ReasonCode::MonthlySpendLimit => "MONTHLY_SPEND_LIMIT",
            ReasonCode::SymbolBlocked => "SYMBOL_BLOCKED",
            ReasonCode::SymbolNotAllowed => "SYMBOL_NOT_ALLOWED",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PretradeSide {
    Buy,
    Sell,
}

/// Immutable snapshot of all numeric ceilings (spec §3 "Risk limits").
#[derive(Clone, Debug, PartialEq)]
pub struct RiskLimits {
    pub max_order_notional: Micros,
    pub max_order_shares: i64,
    pub max_position_shares: i64,
    pub max_position_notional: Micros,
    pub max_total_exposure: Micros,
    /// Basis points of account equity (10_000 = 100%). Kept as an integer
    /// per spec §3/§9 -- a binary-float ratio compared against this limit
    /// would violate the no-float-for-money-comparisons rule, the same
    /// reason `mqk-portfolio::correlation`/`drawdown` use bps.
    pub max_concentration_bps: i64,
    pub daily_loss_limit: Micros,
    pub weekly_loss_limit: Micros,
    /// Basis points of peak equity (10_000 = 100%); see `max_concentration_bps`.
    pub max_drawdown_bps: i64,
    pub daily_spend_limit: Micros,
    pub weekly_spend_limit: Micros,
    pub monthly_spend_limit: Micros,
    pub approval_notional_threshold: Micros,
    pub approval_loss_threshold: Micros,
    pub symbol_allowlist: BTreeSet<String>,
    pub symbol_blocklist: BTreeSet<String>,
    pub dry_run: bool,
}

impl RiskLimits {
    pub fn sane_defaults() -> Self {
        Self {
            max_order_notional: Micros::new(50_000_000_000),
            max_order_shares: 10_000,
            max_position_shares: 20_000,
            max_position_notional: Micros::new(100_000_000_000),
            max_total_exposure: Micros::new(500_000_000_000),
            max_concentration_bps: 2_500,
            daily_loss_limit: Micros::new(20_000_000_000),
            weekly_loss_limit: Micros::new(50_000_000_000),
            max_drawdown_bps: 1_500,
            daily_spend_limit: Micros::new(100_000_000_000),
            weekly_spend_limit: Micros::new(300_000_000_000),
            monthly_spend_limit: Micros::new(1_000_000_000_000),
            approval_notional_threshold: Micros::new(25_000_000_000),
            approval_loss_threshold: Micros::new(15_000_000_000),
            symbol_allowlist: BTreeSet::new(),
            symbol_blocklist: BTreeSet::new(),
            dry_run: false,
        }
    }
}

/// A single position the pipeline checks an order intent against.
#[derive(Clone, Debug, PartialEq)]
pub struct PretradePosition {
    pub symbol: String,
    pub qty: i64,
    pub market_value: Micros,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PretradeIntent {
    pub symbol: String,
    pub side: PretradeSide,
    pub qty: i64,
    pub order_notional: Micros,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PretradeAction {
    Approve,
    Reject,
    RequireApproval,
    DryRun,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PretradeDecision {
    pub action: PretradeAction,
    pub passed: Vec<&'static str>,
    pub failed: Vec<ReasonCode>,
    pub warnings: Vec<String>,
    pub approval_reason: Option<String>,
}

impl PretradeDecision {
    pub fn is_approve(&self) -> bool {
        self.action == PretradeAction::Approve
    }
}
