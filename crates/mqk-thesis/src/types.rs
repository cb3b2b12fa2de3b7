use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Yes,
    No,
}

/// Lifecycle state. Transitions are monotonic along
/// `DRAFT -> ACTIVE -> REALIZED` or `DRAFT/ACTIVE -> INVALIDATED/EXPIRED`
/// (spec §3 "Thesis").
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThesisState {
    Draft,
    Active,
    Invalidated,
    Realized,
    Expired,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thesis {
    pub id: Uuid,
    pub market_ticker: String,
    pub hypothesis: String,
    pub direction: Direction,
    pub entry_price_target_cents: Option<i32>,
    pub exit_price_target_cents: Option<i32>,
    pub model_prob: f64,
    pub market_implied_prob: f64,
    pub supporting_signals: Vec<String>,
    pub state: ThesisState,
    pub order_ids: Vec<String>,
    pub filled_count: i64,
    /// Volume-weighted average fill price, in cents.
    pub avg_fill_price_cents: f64,
    /// Realized P&L in whole cents (prediction markets settle in cents).
    pub realized_pnl_cents: Option<f64>,
    pub outcome_correct: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thesis {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ThesisState::Invalidated | ThesisState::Realized | ThesisState::Expired
        )
    }
}

/// Per-bucket calibration stats over REALIZED theses (spec §4.9).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CalibrationBucket {
    pub lower_pct: u8,
    pub upper_pct: u8,
    pub count: u32,
    pub accuracy: f64,
    pub mean_predicted_prob: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationReport {
    pub buckets: Vec<CalibrationBucket>,
    pub brier_score: f64,
    pub sample_size: u32,
}
