//! Fee-aware pricing for prediction-market contracts — M4.5-2
//!
//! Grounded on `strategies/pricing.py::FeeCalculator` / `PricingEngine`.
//! Prices are integer cents in `[1, 99]` per spec §3 — never `Micros`, never
//! binary float. Edge/probability math stays in `f64`; it is not a direct
//! comparison against a limit, spend tally, or P&L figure.

use crate::kelly::kelly_fraction;

/// Direction of a prediction-market trade.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Yes,
    No,
}

/// Round-trip fee in whole cents charged to enter + exit one contract.
/// Per the recorded Open Question decision (see DESIGN.md): the fee is
/// treated as a single round-trip figure divided by the payout side, not
/// split in half — this is the one consistent formula the source uses in
/// two slightly different ways (spec §9 open question).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FeeSchedule {
    pub round_trip_fee_cents: f64,
}

impl FeeSchedule {
    pub fn new(round_trip_fee_cents: f64) -> Self {
        Self {
            round_trip_fee_cents,
        }
    }
}

/// Result of a fee-adjusted edge calculation for one direction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EdgeResult {
    pub raw_edge: f64,
    pub fee_impact: f64,
    pub adjusted_edge: f64,
}

/// Raw YES edge = model_prob - price/100; fee impact on YES = (F/100) / (100 - price).
///
/// `round_trip_fee_cents` is a whole-cents figure (e.g. `14.0`); the raw edge
/// it is compared against is a probability fraction in `[0, 1]`. Converting
/// the fee to a dollar fraction (`/100.0`) before dividing by the payout side
/// (left in raw cents) is the formula `pricing.py::FeeCalculator`'s own
/// docstring walks through (`0.55 - 0.45 - 0.14/55 ≈ 0.097`); dividing the
/// payout side by 100 as well would cancel back out to the unconverted,
/// order-of-magnitude-too-large ratio.
pub fn yes_edge(model_prob: f64, price_cents: i32, fee: FeeSchedule) -> EdgeResult {
    let price = price_cents as f64;
    let raw = model_prob - price / 100.0;
    let payout_side = (100.0 - price).max(1.0);
    let fee_impact = (fee.round_trip_fee_cents / 100.0) / payout_side;
    EdgeResult {
        raw_edge: raw,
        fee_impact,
        adjusted_edge: raw - fee_impact,
    }
}

/// Raw NO edge = (1 - model_prob) - (100 - price)/100; fee impact on NO = (F/100) / price.
pub fn no_edge(model_prob: f64, price_cents: i32, fee: FeeSchedule) -> EdgeResult {
    let price = price_cents as f64;
    let raw = (1.0 - model_prob) - (100.0 - price) / 100.0;
    let payout_side = price.max(1.0);
    let fee_impact = (fee.round_trip_fee_cents / 100.0) / payout_side;
    EdgeResult {
        raw_edge: raw,
        fee_impact,
        adjusted_edge: raw - fee_impact,
    }
}

/// Fee-adjusted edge for a given direction. Convenience wrapper over
/// [`yes_edge`] / [`no_edge`].
pub fn fee_adjusted_edge(
    model_prob: f64,
    price_cents: i32,
    dir: Direction,
    fee: FeeSchedule,
) -> EdgeResult {
    match dir {
        Direction::Yes => yes_edge(model_prob, price_cents, fee),
        Direction::No => no_edge(model_prob, price_cents, fee),
    }
}

/// Picks the larger positive edge between YES and NO, per spec §4.11
/// ("computes edge both directions, picks the larger positive edge").
/// Returns `None` if neither direction has positive adjusted edge.
pub fn best_direction(
    model_prob: f64,
    price_cents: i32,
    fee: FeeSchedule,
) -> Option<(Direction, EdgeResult)> {
    let yes = yes_edge(model_prob, price_cents, fee);
    let no = no_edge(model_prob, price_cents, fee);
    match (yes.adjusted_edge > 0.0, no.adjusted_edge > 0.0) {
        (true, true) => {
            if yes.adjusted_edge >= no.adjusted_edge {
                Some((Direction::Yes, yes))
            } else {
                Some((Direction::No, no))
            }
        }
        (true, false) => Some((Direction::Yes, yes)),
        (false, true) => Some((Direction::No, no)),
        (false, false) => None,
    }
}

/// Expected value per contract (YES), expressed in cents:
/// `p*(100 - price - F_exit) - (1-p)*(price + F_entry)`.
///
/// `fee_entry_cents`/`fee_exit_cents` split the round-trip fee across entry
/// and exit legs (callers typically pass half of the round-trip fee each).
pub fn expected_value_cents(
    model_prob: f64,
    price_cents: i32,
    fee_entry_cents: f64,
    fee_exit_cents: f64,
) -> f64 {
    let price = price_cents as f64;
    model_prob * (100.0 - price - fee_exit_cents) - (1.0 - model_prob) * (price + fee_entry_cents)
}

/// Breakeven fee-adjusted edge required to recommend a trade (spec §4.10).
pub const DEFAULT_MIN_EDGE: f64 = 0.05;

/// Breakeven price (cents) for a given model probability and round-trip fee,
/// direction YES: the price at which adjusted edge == 0.
pub fn breakeven_price_cents_yes(model_prob: f64, fee: FeeSchedule) -> f64 {
    // model_prob - price/100 - F/(100-price) == 0, solved numerically (bisection)
    // over the valid price domain to avoid a closed-form quadratic with
    // awkward edge handling at the domain boundary.
    let mut lo = 1.0_f64;
    let mut hi = 99.0_f64;
    for _ in 0..60 {
        let mid = (lo + hi) / 2.0;
        let edge = yes_edge(model_prob, mid.round() as i32, fee).adjusted_edge;
        if edge > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}

/// Trade recommendation gate per spec §4.10: fee-adjusted edge >= min_edge
/// and Kelly fraction > 0.
pub fn recommend_trade(adjusted_edge: f64, win_rate: f64, win_loss_ratio: f64, min_edge: f64) -> bool {
    adjusted_edge >= min_edge && kelly_fraction(win_rate, win_loss_ratio, 1.0) > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_aware_edge_matches_spec_example() {
        // model=0.55, price=45, yes, fee=14c round-trip (spec §8 scenario 6;
        // fee_impact/adjusted_edge per the FeeCalculator docstring's own
        // worked figure, 0.14/55 ≈ 0.097, not the unconverted 14/55 ≈ 0.2545).
        let fee = FeeSchedule::new(14.0);
        let e = yes_edge(0.55, 45, fee);
        assert!((e.raw_edge - 0.10).abs() < 1e-9);
        assert!((e.fee_impact - 0.14 / 55.0).abs() < 1e-3);
        assert!((e.adjusted_edge - 0.0975).abs() < 1e-2);
        assert!(e.adjusted_edge > 0.0);
    }

    #[test]
    fn best_direction_prefers_larger_positive_edge() {
        let fee = FeeSchedule::new(14.0);
        let (dir, edge) = best_direction(0.55, 45, fee).unwrap();
        assert_eq!(dir, Direction::Yes);
        assert!(edge.adjusted_edge > 0.0);
    }

    #[test]
    fn best_direction_none_when_no_positive_edge() {
        let fee = FeeSchedule::new(14.0);
        // price at model probability -> near zero raw edge both sides, fee tips both negative
        let result = best_direction(0.50, 50, fee);
        assert!(result.is_none());
    }

    #[test]
    fn recommend_trade_requires_min_edge_and_positive_kelly() {
        assert!(recommend_trade(0.075, 0.60, 1.5, DEFAULT_MIN_EDGE));
        assert!(!recommend_trade(0.02, 0.60, 1.5, DEFAULT_MIN_EDGE));
        assert!(!recommend_trade(0.10, 0.40, 0.5, DEFAULT_MIN_EDGE));
    }
}
