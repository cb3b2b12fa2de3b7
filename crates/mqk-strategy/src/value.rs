//! Value/mispricing evaluator — spec §4.11, the sole in-scope strategy.
//!
//! Grounded on `strategies/value.py::ValueStrategy`. Unlike the Tier A
//! bar-based [`Strategy`](crate::Strategy) trait, this evaluator reasons
//! about a single prediction-market snapshot plus a pluggable model
//! probability, so it is exposed as its own `evaluate`/`should_invalidate`
//! pair rather than wedged into `on_bar`. `mqk-runtime` calls it directly
//! per market tick.

use chrono::{DateTime, Utc};
use mqk_sizing::pricing::{best_direction, Direction, EdgeResult, FeeSchedule};
use mqk_thesis::{Direction as ThesisDirection, Thesis, ThesisTracker};

/// A point-in-time snapshot of one prediction-market contract.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub category: String,
    pub yes_price_cents: i32,
    pub best_bid_cents: i32,
    pub best_ask_cents: i32,
    pub liquidity_score: f64,
    pub spread_pct: f64,
    pub time_to_close_hours: f64,
}

impl MarketSnapshot {
    pub fn implied_prob(&self) -> f64 {
        self.yes_price_cents as f64 / 100.0
    }
}

/// Per-market trading context the caller supplies (available balance,
/// whether a position already exists, current position value).
#[derive(Clone, Debug, PartialEq)]
pub struct ValueContext {
    pub can_trade: bool,
    pub available_balance_cents: f64,
    pub max_position_per_market_cents: f64,
    pub current_position_value_cents: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ValueStrategyParams {
    pub min_edge: f64,
    pub min_confidence: f64,
    pub max_position_pct: f64,
    pub min_liquidity_score: f64,
    pub max_spread_pct: f64,
    pub min_time_to_close_hours: f64,
    pub max_kelly_fraction: f64,
    pub invalidation_edge_threshold: f64,
    pub invalidation_price_move_pct: f64,
    pub round_trip_fee_cents: f64,
}

impl ValueStrategyParams {
    pub fn sane_defaults() -> Self {
        Self {
            min_edge: 0.08,
            min_confidence: 0.6,
            max_position_pct: 0.25,
            min_liquidity_score: 0.3,
            max_spread_pct: 0.15,
            min_time_to_close_hours: 24.0,
            max_kelly_fraction: 0.15,
            invalidation_edge_threshold: 0.02,
            invalidation_price_move_pct: 0.15,
            round_trip_fee_cents: mqk_thesis::ROUND_TRIP_FEE_CENTS,
        }
    }

    fn fee(&self) -> FeeSchedule {
        FeeSchedule::new(self.round_trip_fee_cents)
    }
}

/// Why a market was skipped, for debug logging.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterReject {
    LowLiquidity(f64),
    WideSpread(f64),
    TooCloseToSettlement(f64),
    AlreadyAtMaxPosition,
    TradingHalted,
    NoPositiveEdge,
    ConfidenceTooLow(f64),
}

/// A value-strategy trade recommendation.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueSignal {
    pub direction: Direction,
    pub market_ticker: String,
    pub target_price_cents: i32,
    pub recommended_contracts: i64,
    pub max_contracts: i64,
    pub confidence: f64,
    pub edge: f64,
    pub reason: String,
    pub thesis_id: Option<uuid::Uuid>,
}

pub struct ValueStrategy {
    pub params: ValueStrategyParams,
}

impl ValueStrategy {
    pub fn new(params: ValueStrategyParams) -> Self {
        Self { params }
    }

    fn passes_filters(&self, market: &MarketSnapshot, ctx: &ValueContext) -> Result<(), FilterReject> {
        if !ctx.can_trade {
            return Err(FilterReject::TradingHalted);
        }
        if market.liquidity_score < self.params.min_liquidity_score {
            return Err(FilterReject::LowLiquidity(market.liquidity_score));
        }
        if market.spread_pct > self.params.max_spread_pct {
            return Err(FilterReject::WideSpread(market.spread_pct));
        }
        if market.time_to_close_hours < self.params.min_time_to_close_hours {
            return Err(FilterReject::TooCloseToSettlement(market.time_to_close_hours));
        }
        if let Some(position_value) = ctx.current_position_value_cents {
            let cap = ctx.max_position_per_market_cents * self.params.max_position_pct;
            if position_value.abs() >= cap {
                return Err(FilterReject::AlreadyAtMaxPosition);
            }
        }
        Ok(())
    }

    /// Evaluate a single market snapshot. `model_prob` is supplied by the
    /// caller's model provider (spec §4.11 — pluggable probability source).
    /// `existing_thesis`, when `Some` and already on the winning direction,
    /// is reused instead of opening a new one.
    pub fn evaluate(
        &self,
        market: &MarketSnapshot,
        ctx: &ValueContext,
        model_prob: f64,
        existing_thesis: Option<&Thesis>,
        thesis_tracker: Option<&mut ThesisTracker>,
        now: DateTime<Utc>,
    ) -> Result<Option<ValueSignal>, FilterReject> {
        self.passes_filters(market, ctx)?;

        let Some((direction, edge)) = best_direction(model_prob, market.yes_price_cents, self.params.fee())
        else {
            return Err(FilterReject::NoPositiveEdge);
        };

        if edge.adjusted_edge < self.params.min_edge {
            return Err(FilterReject::NoPositiveEdge);
        }

        let confidence = (edge.adjusted_edge / self.params.min_edge).min(1.0);
        if confidence < self.params.min_confidence {
            return Err(FilterReject::ConfidenceTooLow(confidence));
        }

        let target_price_cents = match direction {
            Direction::Yes => market.best_ask_cents,
            Direction::No => 100 - market.best_bid_cents,
        };

        let bankroll_cap = ctx.max_position_per_market_cents * self.params.max_position_pct;
        let budget_cents = ctx.available_balance_cents.min(bankroll_cap);
        let recommended_contracts = if target_price_cents > 0 {
            ((budget_cents / target_price_cents as f64) * self.params.max_kelly_fraction) as i64
        } else {
            0
        };
        let max_contracts = (recommended_contracts as f64 * 1.5) as i64;

        let thesis_direction = match direction {
            Direction::Yes => ThesisDirection::Yes,
            Direction::No => ThesisDirection::No,
        };

        let thesis_id = match (thesis_tracker, existing_thesis) {
            (Some(_tracker), Some(thesis)) if thesis.direction == thesis_direction => Some(thesis.id),
            (Some(tracker), _) => {
                let hypothesis = hypothesis_text(market, model_prob, edge.adjusted_edge, direction);
                let created = tracker
                    .create_thesis(
                        market.ticker.clone(),
                        hypothesis,
                        thesis_direction,
                        model_prob,
                        market.implied_prob(),
                        vec!["value".to_string(), market.category.clone()],
                        now,
                    )
                    .ok();
                created.map(|t| t.id)
            }
            (None, _) => None,
        };

        Ok(Some(ValueSignal {
            direction,
            market_ticker: market.ticker.clone(),
            target_price_cents,
            recommended_contracts,
            max_contracts,
            confidence,
            edge: edge.adjusted_edge,
            reason: format!("value edge {:.1}% on {:?}", edge.adjusted_edge * 100.0, direction),
            thesis_id,
        }))
    }

    /// Spec §4.11 invalidation triggers, checked while a thesis is active.
    pub fn should_invalidate(
        &self,
        thesis: &Thesis,
        market: &MarketSnapshot,
        model_prob: f64,
    ) -> Option<&'static str> {
        let direction = match thesis.direction {
            ThesisDirection::Yes => Direction::Yes,
            ThesisDirection::No => Direction::No,
        };
        let edge: EdgeResult = mqk_sizing::pricing::fee_adjusted_edge(
            model_prob,
            market.yes_price_cents,
            direction,
            self.params.fee(),
        );
        if edge.adjusted_edge < self.params.invalidation_edge_threshold {
            return Some("edge dropped below invalidation threshold");
        }

        if thesis.avg_fill_price_cents > 0.0 {
            let price_change = match thesis.direction {
                ThesisDirection::Yes => {
                    (market.yes_price_cents as f64 - thesis.avg_fill_price_cents) / thesis.avg_fill_price_cents
                }
                ThesisDirection::No => {
                    (thesis.avg_fill_price_cents - market.yes_price_cents as f64) / thesis.avg_fill_price_cents
                }
            };
            if price_change < -self.params.invalidation_price_move_pct {
                return Some("adverse price move past threshold");
            }
        }

        if market.time_to_close_hours < 1.0 {
            return Some("market closing soon");
        }

        None
    }
}

fn hypothesis_text(market: &MarketSnapshot, model_prob: f64, edge: f64, direction: Direction) -> String {
    let market_prob = market.implied_prob();
    let diff = (model_prob - market_prob).abs();
    match direction {
        Direction::Yes => format!(
            "market underprices YES by {:.1}pp: model {:.1}% vs market {:.1}%, fee-adjusted edge {:.1}%",
            diff * 100.0,
            model_prob * 100.0,
            market_prob * 100.0,
            edge * 100.0
        ),
        Direction::No => format!(
            "market overprices YES by {:.1}pp: model {:.1}% vs market {:.1}%, buying NO at fee-adjusted edge {:.1}%",
            diff * 100.0,
            model_prob * 100.0,
            market_prob * 100.0,
            edge * 100.0
        ),
    }
}
