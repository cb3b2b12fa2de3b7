//! Kalshi-specific compliance and position controls — spec §4.9.
//!
//! Grounded on `risk/kalshi_controls.py::KalshiRiskController`. Layered on
//! top of (not a replacement for) `pipeline::RiskEngine`: a Kalshi order
//! must pass both the generic pipeline and this category/compliance gate.

use std::collections::{BTreeMap, BTreeSet};

use mqk_portfolio::Micros;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MarketCategory {
    Politics,
    Economics,
    Finance,
    Crypto,
    Weather,
    Entertainment,
    Sports,
    Science,
    Other,
}

impl MarketCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketCategory::Politics => "politics",
            MarketCategory::Economics => "economics",
            MarketCategory::Finance => "finance",
            MarketCategory::Crypto => "crypto",
            MarketCategory::Weather => "weather",
            MarketCategory::Entertainment => "entertainment",
            MarketCategory::Sports => "sports",
            MarketCategory::Science => "science",
            MarketCategory::Other => "other",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KalshiSide {
    Yes,
    No,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KalshiAction {
    Buy,
    Sell,
}

/// Category/ticker/jurisdiction restrictions — spec §4.9 "compliance gate".
#[derive(Clone, Debug, Default)]
pub struct ComplianceConfig {
    pub blocked_categories: BTreeSet<MarketCategory>,
    /// `None` means all categories are allowed.
    pub allowed_categories: Option<BTreeSet<MarketCategory>>,
    pub blocked_tickers: BTreeSet<String>,
}

#[derive(Clone, Debug)]
pub struct KalshiControlsConfig {
    pub max_total_notional: Micros,
    pub max_daily_loss: Micros,
    pub max_drawdown_pct: f64,
    pub max_position_per_market: Micros,
    pub max_contracts_per_market: i64,
    pub max_order_notional: Micros,
    pub max_order_contracts: i64,
    pub max_spread_pct: f64,
    pub min_orderbook_depth: i64,
    pub max_open_positions: usize,
    pub max_category_exposure_pct: f64,
    pub approval_threshold: Micros,
    pub compliance: ComplianceConfig,
}

impl KalshiControlsConfig {
    pub fn sane_defaults() -> Self {
        Self {
            max_total_notional: Micros::new(10_000_000_000),
            max_daily_loss: Micros::new(500_000_000),
            max_drawdown_pct: 0.10,
            max_position_per_market: Micros::new(2_000_000_000),
            max_contracts_per_market: 2_000,
            max_order_notional: Micros::new(500_000_000),
            max_order_contracts: 500,
            max_spread_pct: 0.15,
            min_orderbook_depth: 100,
            max_open_positions: 20,
            max_category_exposure_pct: 0.40,
            approval_threshold: Micros::new(1_000_000_000),
            compliance: ComplianceConfig::default(),
        }
    }
}

pub struct KalshiOrder {
    pub ticker: String,
    pub side: KalshiSide,
    pub action: KalshiAction,
    pub count: i64,
    pub price_cents: i64,
    pub category: MarketCategory,
}

impl KalshiOrder {
    /// Order value in whole cents (side-adjusted, per spec §4.9).
    pub fn notional_cents(&self) -> i64 {
        match self.side {
            KalshiSide::Yes => self.count * self.price_cents,
            KalshiSide::No => self.count * (100 - self.price_cents),
        }
    }

    pub fn notional_micros(&self) -> Micros {
        Micros::new(self.notional_cents() * 10_000)
    }
}

pub struct KalshiPosition {
    pub ticker: String,
    pub side: KalshiSide,
    pub count: i64,
    pub avg_price_cents: i64,
    pub market_price_cents: i64,
    pub category: MarketCategory,
}

impl KalshiPosition {
    pub fn market_value_cents(&self) -> i64 {
        match self.side {
            KalshiSide::Yes => self.count * self.market_price_cents,
            KalshiSide::No => self.count * (100 - self.market_price_cents),
        }
    }

    pub fn market_value_micros(&self) -> Micros {
        Micros::new(self.market_value_cents() * 10_000)
    }
}

/// Best bid/ask plus size-at-touch, spec §4.9 "liquidity filter".
#[derive(Copy, Clone, Debug)]
pub struct OrderbookTouch {
    pub best_bid_cents: i64,
    pub best_bid_depth: i64,
    pub best_ask_cents: i64,
    pub best_ask_depth: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KalshiDecision {
    pub approved: bool,
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    pub warnings: Vec<String>,
    pub requires_approval: bool,
}

pub struct KalshiControls {
    cfg: KalshiControlsConfig,
    kill_switch_active: bool,
    kill_switch_reason: Option<String>,
    daily_pnl: Micros,
    peak_balance: Micros,
}

impl KalshiControls {
    pub fn new(cfg: KalshiControlsConfig) -> Self {
        Self {
            cfg,
            kill_switch_active: false,
            kill_switch_reason: None,
            daily_pnl: Micros::ZERO,
            peak_balance: Micros::ZERO,
        }
    }

    pub fn activate_kill_switch(&mut self, reason: impl Into<String>) {
        self.kill_switch_active = true;
        self.kill_switch_reason = Some(reason.into());
    }

    pub fn deactivate_kill_switch(&mut self) {
        self.kill_switch_active = false;
        self.kill_switch_reason = None;
    }

    pub fn block_category(&mut self, category: MarketCategory) {
        self.cfg.compliance.blocked_categories.insert(category);
    }

    pub fn block_ticker(&mut self, ticker: impl Into<String>) {
        self.cfg.compliance.blocked_tickers.insert(ticker.into());
    }

    pub fn record_fill(&mut self, pnl: Micros) {
        self.daily_pnl = self.daily_pnl.saturating_add(pnl);
    }

    pub fn reset_daily(&mut self) {
        self.daily_pnl = Micros::ZERO;
    }

    pub fn update_balance(&mut self, balance: Micros) {
        if balance > self.peak_balance {
            self.peak_balance = balance;
        }
    }

    fn check_compliance(&self, order: &KalshiOrder) -> (Vec<String>, Vec<String>) {
        let mut passed = Vec::new();
        let mut failed = Vec::new();

        if self.cfg.compliance.blocked_categories.contains(&order.category) {
            failed.push(format!("BLOCKED_CATEGORY: {}", order.category.as_str()));
        } else {
            passed.push("category_allowed".to_string());
        }

        if let Some(allowed) = &self.cfg.compliance.allowed_categories {
            if !allowed.contains(&order.category) {
                failed.push(format!(
                    "CATEGORY_NOT_IN_ALLOWLIST: {}",
                    order.category.as_str()
                ));
            } else {
                passed.push("category_in_allowlist".to_string());
            }
        }

        if self.cfg.compliance.blocked_tickers.contains(&order.ticker) {
            failed.push(format!("BLOCKED_TICKER: {}", order.ticker));
        } else {
            passed.push("ticker_allowed".to_string());
        }

        (passed, failed)
    }

    /// Run every Kalshi-specific check. `positions` keyed by ticker.
    pub fn check_order(
        &self,
        order: &KalshiOrder,
        positions: &BTreeMap<String, KalshiPosition>,
        account_balance: Micros,
        orderbook: Option<OrderbookTouch>,
    ) -> KalshiDecision {
        let mut warnings = Vec::new();
        let mut requires_approval = false;

        if self.kill_switch_active {
            return KalshiDecision {
                approved: false,
                passed: vec![],
                failed: vec![format!(
                    "KILL_SWITCH_ACTIVE: {}",
                    self.kill_switch_reason.as_deref().unwrap_or("")
                )],
                warnings,
                requires_approval: false,
            };
        }

        let (mut passed, mut failed) = self.check_compliance(order);
        if !failed.is_empty() {
            return KalshiDecision {
                approved: false,
                passed,
                failed,
                warnings,
                requires_approval: false,
            };
        }

        if order.count > self.cfg.max_order_contracts {
            failed.push(format!(
                "ORDER_CONTRACTS_EXCEEDED: {} > {}",
                order.count, self.cfg.max_order_contracts
            ));
        } else {
            passed.push("order_contracts_ok".to_string());
        }

        if order.notional_micros() > self.cfg.max_order_notional {
            failed.push("ORDER_NOTIONAL_EXCEEDED".to_string());
        } else {
            passed.push("order_notional_ok".to_string());
        }

        let current_count = positions.get(&order.ticker).map(|p| p.count).unwrap_or(0);
        let new_count = match order.action {
            KalshiAction::Buy => current_count + order.count,
            KalshiAction::Sell => current_count - order.count,
        };

        if new_count.abs() > self.cfg.max_contracts_per_market {
            failed.push(format!(
                "POSITION_CONTRACTS_EXCEEDED: {} > {}",
                new_count.abs(),
                self.cfg.max_contracts_per_market
            ));
        } else {
            passed.push("position_contracts_ok".to_string());
        }

        let new_position_value = Micros::new(new_count.abs() * order.price_cents * 10_000);
        if new_position_value > self.cfg.max_position_per_market {
            failed.push("POSITION_NOTIONAL_EXCEEDED".to_string());
        } else {
            passed.push("position_notional_ok".to_string());
        }

        let mut total_exposure = positions
            .values()
            .fold(Micros::ZERO, |acc, p| acc.saturating_add(p.market_value_micros()));
        if matches!(order.action, KalshiAction::Buy) {
            total_exposure = total_exposure.saturating_add(order.notional_micros());
        }
        if total_exposure > self.cfg.max_total_notional {
            failed.push("TOTAL_EXPOSURE_EXCEEDED".to_string());
        } else {
            passed.push("total_exposure_ok".to_string());
        }

        let mut position_count = positions.len();
        if !positions.contains_key(&order.ticker) && matches!(order.action, KalshiAction::Buy) {
            position_count += 1;
        }
        if position_count > self.cfg.max_open_positions {
            failed.push(format!(
                "TOO_MANY_POSITIONS: {} > {}",
                position_count, self.cfg.max_open_positions
            ));
        } else {
            passed.push("position_count_ok".to_string());
        }

        let mut category_exposure = positions
            .values()
            .filter(|p| p.category == order.category)
            .fold(Micros::ZERO, |acc, p| acc.saturating_add(p.market_value_micros()));
        if matches!(order.action, KalshiAction::Buy) {
            category_exposure = category_exposure.saturating_add(order.notional_micros());
        }
        if total_exposure.raw() > 0 {
            let concentration = category_exposure.raw() as f64 / total_exposure.raw() as f64;
            if concentration > self.cfg.max_category_exposure_pct {
                warnings.push(format!(
                    "HIGH_CATEGORY_CONCENTRATION: {:.1}% in {}",
                    concentration * 100.0,
                    order.category.as_str()
                ));
            }
        }

        if self.daily_pnl.is_negative() && self.daily_pnl.abs() > self.cfg.max_daily_loss {
            failed.push("DAILY_LOSS_LIMIT".to_string());
        } else {
            passed.push("daily_loss_ok".to_string());
        }

        if self.peak_balance.raw() > 0 {
            let drawdown = (self.peak_balance.raw() - account_balance.raw()) as f64
                / self.peak_balance.raw() as f64;
            if drawdown > self.cfg.max_drawdown_pct {
                failed.push("DRAWDOWN_LIMIT".to_string());
            } else {
                passed.push("drawdown_ok".to_string());
            }
        }

        if let Some(ob) = orderbook {
            let mid = ob.best_bid_cents + ob.best_ask_cents;
            if ob.best_ask_cents > ob.best_bid_cents && mid > 0 {
                let spread_pct =
                    2.0 * (ob.best_ask_cents - ob.best_bid_cents) as f64 / mid as f64;
                if spread_pct > self.cfg.max_spread_pct {
                    warnings.push(format!("WIDE_SPREAD: {:.1}%", spread_pct * 100.0));
                }
            }
            let depth = ob.best_bid_depth.min(ob.best_ask_depth);
            if depth < self.cfg.min_orderbook_depth {
                warnings.push(format!("LOW_LIQUIDITY: depth={}", depth));
            }
        }

        if order.notional_micros() > self.cfg.approval_threshold {
            requires_approval = true;
            warnings.push("REQUIRES_APPROVAL: order above threshold".to_string());
        }
        if self.daily_pnl.abs().raw() as f64 > self.cfg.max_daily_loss.raw() as f64 * 0.5 {
            requires_approval = true;
            warnings.push("REQUIRES_APPROVAL: significant daily loss".to_string());
        }

        KalshiDecision {
            approved: failed.is_empty(),
            passed,
            failed,
            warnings,
            requires_approval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(ticker: &str, count: i64, price: i64) -> KalshiOrder {
        KalshiOrder {
            ticker: ticker.to_string(),
            side: KalshiSide::Yes,
            action: KalshiAction::Buy,
            count,
            price_cents: price,
            category: MarketCategory::Politics,
        }
    }

    #[test]
    fn blocked_category_rejects_before_size_checks() {
        let mut cfg = KalshiControlsConfig::sane_defaults();
        cfg.compliance.blocked_categories.insert(MarketCategory::Politics);
        let controls = KalshiControls::new(cfg);
        let decision = controls.check_order(&order("PRES-2028", 1, 50), &BTreeMap::new(), Micros::new(1_000_000_000), None);
        assert!(!decision.approved);
        assert!(decision.failed.iter().any(|f| f.starts_with("BLOCKED_CATEGORY")));
    }

    #[test]
    fn kill_switch_short_circuits_all_checks() {
        let mut controls = KalshiControls::new(KalshiControlsConfig::sane_defaults());
        controls.activate_kill_switch("manual halt");
        let decision = controls.check_order(&order("PRES-2028", 1, 50), &BTreeMap::new(), Micros::new(1_000_000_000), None);
        assert!(!decision.approved);
        assert!(decision.failed[0].starts_with("KILL_SWITCH_ACTIVE"));
    }

    #[test]
    fn order_above_approval_threshold_requires_approval() {
        let controls = KalshiControls::new(KalshiControlsConfig::sane_defaults());
        let decision = controls.check_order(
            &order("PRES-2028", 2500, 50),
            &BTreeMap::new(),
            Micros::new(1_000_000_000_000),
            None,
        );
        assert!(decision.requires_approval);
    }

    #[test]
    fn low_liquidity_orderbook_warns_but_does_not_reject() {
        let controls = KalshiControls::new(KalshiControlsConfig::sane_defaults());
        let ob = OrderbookTouch {
            best_bid_cents: 45,
            best_bid_depth: 5,
            best_ask_cents: 55,
            best_ask_depth: 5,
        };
        let decision = controls.check_order(
            &order("PRES-2028", 1, 50),
            &BTreeMap::new(),
            Micros::new(1_000_000_000),
            Some(ob),
        );
        assert!(decision.approved);
        assert!(decision.warnings.iter().any(|w| w.starts_with("LOW_LIQUIDITY")));
    }
}
