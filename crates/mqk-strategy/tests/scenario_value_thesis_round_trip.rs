use chrono::Utc;
use mqk_strategy::value::{MarketSnapshot, ValueContext, ValueStrategy, ValueStrategyParams};
use mqk_thesis::{Direction, ThesisState, ThesisTracker};

fn market() -> MarketSnapshot {
    MarketSnapshot {
        ticker: "INXD-24DEC31".to_string(),
        category: "economics".to_string(),
        yes_price_cents: 45,
        best_bid_cents: 44,
        best_ask_cents: 46,
        liquidity_score: 0.8,
        spread_pct: 0.02,
        time_to_close_hours: 72.0,
    }
}

fn ctx() -> ValueContext {
    ValueContext {
        can_trade: true,
        available_balance_cents: 100_000.0,
        max_position_per_market_cents: 50_000.0,
        current_position_value_cents: None,
    }
}

#[test]
fn a_mispricing_opens_a_thesis_and_reuses_it_on_the_next_tick() {
    let dir = tempfile::tempdir().unwrap();
    let mut tracker = ThesisTracker::open(dir.path()).unwrap();
    let strat = ValueStrategy::new(ValueStrategyParams::sane_defaults());
    let now = Utc::now();

    let first = strat
        .evaluate(&market(), &ctx(), 0.60, None, Some(&mut tracker), now)
        .unwrap()
        .expect("positive edge should produce a signal");
    let thesis_id = first.thesis_id.expect("tracker was supplied, expect a thesis");

    let thesis = tracker.get(thesis_id).expect("thesis should be persisted");
    assert_eq!(thesis.state, ThesisState::Draft);
    assert_eq!(thesis.direction, Direction::Yes);
    assert_eq!(thesis.market_ticker, "INXD-24DEC31");

    // Re-evaluating the same direction on the next tick reuses the thesis
    // instead of minting a duplicate.
    let second = strat
        .evaluate(&market(), &ctx(), 0.60, Some(&thesis), Some(&mut tracker), now)
        .unwrap()
        .unwrap();
    assert_eq!(second.thesis_id, Some(thesis_id));
}

#[test]
fn invalidation_fires_once_the_model_catches_up_to_the_market() {
    let dir = tempfile::tempdir().unwrap();
    let mut tracker = ThesisTracker::open(dir.path()).unwrap();
    let strat = ValueStrategy::new(ValueStrategyParams::sane_defaults());
    let now = Utc::now();

    let signal = strat
        .evaluate(&market(), &ctx(), 0.60, None, Some(&mut tracker), now)
        .unwrap()
        .unwrap();
    let thesis_id = signal.thesis_id.unwrap();
    let thesis = tracker.get(thesis_id).unwrap();

    // Model probability converges toward the market price: the edge that
    // justified the trade has collapsed.
    let reason = strat.should_invalidate(&thesis, &market(), 0.46);
    assert_eq!(reason, Some("edge dropped below invalidation threshold"));
}
