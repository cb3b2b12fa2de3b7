//! `IntegratedRiskManager` — the composition root, spec §2 data flow:
//! "caller gives (symbol, side, entry_price, stop_loss) to
//! IntegratedRiskManager -> DrawdownProtector reports level -> PositionSizer
//! computes raw shares -> apply drawdown sizing multiplier ->
//! CorrelationManager clamps to exposure headroom -> RiskEngine runs the
//! pre-trade pipeline -> decision returned."
//!
//! Grounded on `risk/integrated_risk_manager.py`, wiring together
//! `mqk-portfolio::drawdown`, `mqk-portfolio::correlation`, `mqk-sizing`,
//! `mqk-risk::pretrade`, `mqk-pnl`, and `mqk-approval` the way that module
//! wires its Python counterparts. The manager owns one instance of each
//! (spec §4, "the composition root owns one instance of each").

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mqk_approval::{ApprovalWorkflow, OrderIntentSnapshot};
use mqk_execution::Side;
use mqk_pnl::{AlertConfig, PnlTracker};
use mqk_portfolio::{
    liquidation_plan, CorrelationLimits, CorrelationManager, DrawdownConfig, DrawdownState,
    DrawdownUpdate, ExposurePosition, LiquidationCandidate, Micros,
};
use mqk_risk::{
    PeriodIds, PretradeAction, PretradeDecision, PretradeIntent, PretradePosition, PretradeSide,
    RiskEngine, RiskLimits,
};
use mqk_sizing::sizer::{size_position, SizerConfig, SizingRequest};
use tokio::sync::broadcast;

use crate::events::RuntimeEvent;

fn to_pretrade_side(side: Side) -> PretradeSide {
    match side {
        Side::Buy => PretradeSide::Buy,
        Side::Sell => PretradeSide::Sell,
    }
}

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

pub struct IntegratedRiskManagerConfig {
    pub risk_limits: RiskLimits,
    pub drawdown: DrawdownConfig,
    pub correlation: CorrelationLimits,
    pub sizer: SizerConfig,
    pub alerts: AlertConfig,
    pub approval_pending_capacity: usize,
    pub approval_history_capacity: usize,
    pub approval_ttl: Duration,
}

/// A single sizing/risk request for one symbol.
#[derive(Clone, Debug)]
pub struct TradeRequest {
    pub symbol: String,
    pub side: Side,
    pub entry_price: Micros,
    pub stop_loss: Option<Micros>,
    pub realized_vol: f64,
    pub stats: Option<mqk_sizing::kelly::TradeStats>,
    pub is_new_position: bool,
}

#[derive(Clone, Debug)]
pub enum TradeDecision {
    Approved {
        shares: i64,
        decision: PretradeDecision,
    },
    PendingApproval {
        approval_id: uuid::Uuid,
        shares: i64,
        decision: PretradeDecision,
    },
    DryRun {
        shares: i64,
        decision: PretradeDecision,
    },
    Rejected {
        decision: PretradeDecision,
    },
    Blocked {
        reason: &'static str,
    },
}

pub struct IntegratedRiskManager {
    risk_engine: RiskEngine,
    drawdown_cfg: DrawdownConfig,
    drawdown_state: DrawdownState,
    last_drawdown_update: DrawdownUpdate,
    correlation: CorrelationManager,
    sizer_cfg: SizerConfig,
    pnl: PnlTracker,
    approvals: Arc<ApprovalWorkflow>,
    approval_ttl: Duration,
    bus: broadcast::Sender<RuntimeEvent>,
}

impl IntegratedRiskManager {
    pub fn new(
        cfg: IntegratedRiskManagerConfig,
        starting_equity: Micros,
        now: DateTime<Utc>,
        day_id: u32,
        week_id: u32,
        month_id: u32,
        bus: broadcast::Sender<RuntimeEvent>,
    ) -> Self {
        let mut drawdown_state = DrawdownState::new(starting_equity, day_id, week_id, month_id);
        let last_drawdown_update = mqk_portfolio::update_equity(
            &cfg.drawdown,
            &mut drawdown_state,
            starting_equity,
            now.timestamp(),
            day_id,
            week_id,
            month_id,
        );

        Self {
            risk_engine: RiskEngine::new(cfg.risk_limits, starting_equity),
            drawdown_cfg: cfg.drawdown,
            drawdown_state,
            last_drawdown_update,
            correlation: CorrelationManager::new(cfg.correlation),
            sizer_cfg: cfg.sizer,
            pnl: PnlTracker::new(cfg.alerts, starting_equity, now),
            approvals: Arc::new(ApprovalWorkflow::new(
                cfg.approval_pending_capacity,
                cfg.approval_history_capacity,
            )),
            approval_ttl: cfg.approval_ttl,
            bus,
        }
    }

    pub fn approvals(&self) -> Arc<ApprovalWorkflow> {
        self.approvals.clone()
    }

    /// Mark-to-market the account: advances drawdown state, the risk
    /// engine's loss tracker, and P&L alerting, publishing every resulting
    /// event onto the shared bus. `positions` feeds the liquidation plan if
    /// drawdown escalates into CRITICAL/EMERGENCY.
    pub fn observe_equity(
        &mut self,
        equity: Micros,
        now: DateTime<Utc>,
        day_id: u32,
        week_id: u32,
        month_id: u32,
        positions: &[LiquidationCandidate],
    ) {
        let update = mqk_portfolio::update_equity(
            &self.drawdown_cfg,
            &mut self.drawdown_state,
            equity,
            now.timestamp(),
            day_id,
            week_id,
            month_id,
        );

        if update.level != update.previous_level {
            let _ = self.bus.send(RuntimeEvent::DrawdownLevelChange {
                previous: update.previous_level,
                current: update.level,
            });
        }

        let plan = liquidation_plan(&self.drawdown_cfg, update.level, positions);
        if !plan.is_empty() {
            let _ = self.bus.send(RuntimeEvent::LiquidationRequired(plan));
        }

        self.risk_engine.update_equity(
            equity,
            PeriodIds {
                day_id: day_id as i64,
                week_id: week_id as i64,
                month_id: month_id as i64,
            },
        );

        for alert in self.pnl.observe_equity(equity, now) {
            let _ = self.bus.send(RuntimeEvent::Alert(alert));
        }

        self.last_drawdown_update = update;
    }

    /// spec §2 end-to-end trade evaluation.
    pub fn evaluate_trade(
        &mut self,
        req: &TradeRequest,
        exposure_positions: &[ExposurePosition],
        pretrade_positions: &[PretradePosition],
        account_equity: Micros,
        market_price: Micros,
        period: PeriodIds,
        now: DateTime<Utc>,
    ) -> TradeDecision {
        let policy = self.last_drawdown_update.policy;
        if !policy.trading_allowed {
            return TradeDecision::Blocked {
                reason: "drawdown protector: trading halted",
            };
        }
        if req.is_new_position && !policy.new_positions_allowed {
            return TradeDecision::Blocked {
                reason: "drawdown protector: new positions disallowed at current level",
            };
        }

        let sizing = size_position(
            &self.sizer_cfg,
            &SizingRequest {
                symbol: req.symbol.clone(),
                equity: account_equity,
                entry_price: req.entry_price,
                stop_loss: req.stop_loss,
                realized_vol: req.realized_vol,
                stats: req.stats,
            },
            Some((&self.correlation, exposure_positions)),
        );

        let shares = (sizing.shares * policy.sizing_multiplier_bps) / 10_000;
        if shares <= 0 {
            return TradeDecision::Blocked {
                reason: "sized to zero shares after drawdown/correlation clamps",
            };
        }

        let order_notional = req.entry_price.checked_mul_qty(shares).unwrap_or(Micros::MAX);
        let intent = PretradeIntent {
            symbol: req.symbol.clone(),
            side: to_pretrade_side(req.side),
            qty: shares,
            order_notional,
        };

        let decision =
            self.risk_engine
                .check_order(&intent, pretrade_positions, market_price, account_equity, period, now);

        match decision.action {
            PretradeAction::Approve => TradeDecision::Approved { shares, decision },
            PretradeAction::DryRun => TradeDecision::DryRun { shares, decision },
            PretradeAction::Reject => TradeDecision::Rejected { decision },
            PretradeAction::RequireApproval => {
                let snapshot = OrderIntentSnapshot {
                    symbol: req.symbol.clone(),
                    side: side_label(req.side).to_string(),
                    qty: shares,
                    notional_micros: order_notional.raw(),
                };
                let reason = decision.approval_reason.clone().unwrap_or_default();
                let id = self.approvals.queue_for_approval(snapshot, reason, self.approval_ttl, now);
                if let Some(request) = self.approvals.get_request(id) {
                    let _ = self.bus.send(RuntimeEvent::ApprovalNeeded(request));
                }
                TradeDecision::PendingApproval {
                    approval_id: id,
                    shares,
                    decision,
                }
            }
        }
    }

    pub fn on_fill(&mut self, notional: Micros, slippage_pct: f64, period: PeriodIds, now: DateTime<Utc>) {
        self.risk_engine.on_fill(notional, slippage_pct, period, now);
    }

    pub fn on_reject(&mut self, now: DateTime<Utc>) {
        self.risk_engine.on_reject(now);
    }

    pub fn record_trade_pnl(&mut self, realized_pnl: Micros, now: DateTime<Utc>) {
        for alert in self.pnl.record_trade(realized_pnl, now) {
            let _ = self.bus.send(RuntimeEvent::Alert(alert));
        }
    }

    pub fn risk_engine_mut(&mut self) -> &mut RiskEngine {
        &mut self.risk_engine
    }

    pub fn correlation(&self) -> &CorrelationManager {
        &self.correlation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> IntegratedRiskManagerConfig {
        IntegratedRiskManagerConfig {
            risk_limits: RiskLimits::sane_defaults(),
            drawdown: DrawdownConfig::sane_defaults(),
            correlation: CorrelationLimits::sane_defaults(),
            sizer: SizerConfig::sane_defaults(),
            alerts: AlertConfig::sane_defaults(),
            approval_pending_capacity: 16,
            approval_history_capacity: 64,
            approval_ttl: Duration::from_secs(3600),
        }
    }

    fn equity(dollars: i64) -> Micros {
        Micros::new(dollars * 1_000_000)
    }

    #[test]
    fn blocks_new_trades_in_emergency_drawdown() {
        let (bus, _rx) = broadcast::channel(64);
        let now = Utc::now();
        let mut mgr = IntegratedRiskManager::new(cfg(), equity(100_000), now, 1, 1, 1, bus);

        mgr.observe_equity(equity(82_000), now, 1, 1, 1, &[]);

        let decision = mgr.evaluate_trade(
            &TradeRequest {
                symbol: "AAPL".into(),
                side: Side::Buy,
                entry_price: Micros::new(100_000_000),
                stop_loss: Some(Micros::new(95_000_000)),
                realized_vol: 0.0,
                stats: Some(mqk_sizing::kelly::TradeStats::new(0.60, 150.0, 100.0, 100)),
                is_new_position: true,
            },
            &[],
            &[],
            equity(82_000),
            Micros::new(100_000_000),
            PeriodIds {
                day_id: 1,
                week_id: 1,
                month_id: 1,
            },
            now,
        );

        assert!(matches!(decision, TradeDecision::Blocked { .. }));
    }

    #[test]
    fn approves_a_reasonably_sized_trade_at_normal_drawdown() {
        let (bus, _rx) = broadcast::channel(64);
        let now = Utc::now();
        let mut mgr = IntegratedRiskManager::new(cfg(), equity(1_000_000), now, 1, 1, 1, bus);

        let decision = mgr.evaluate_trade(
            &TradeRequest {
                symbol: "AAPL".into(),
                side: Side::Buy,
                entry_price: Micros::new(100_000_000),
                stop_loss: Some(Micros::new(95_000_000)),
                realized_vol: 0.0,
                stats: Some(mqk_sizing::kelly::TradeStats::new(0.60, 150.0, 100.0, 100)),
                is_new_position: true,
            },
            &[],
            &[],
            equity(1_000_000),
            Micros::new(100_000_000),
            PeriodIds {
                day_id: 1,
                week_id: 1,
                month_id: 1,
            },
            now,
        );

        assert!(matches!(
            decision,
            TradeDecision::Approved { .. } | TradeDecision::PendingApproval { .. }
        ));
    }
}
