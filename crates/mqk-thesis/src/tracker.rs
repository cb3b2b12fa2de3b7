//! Persisted thesis lifecycle, order<->thesis index, calibration —
//! spec §4.9. Grounded on `strategies/thesis.py::ThesisTracker`.
//!
//! Persistence uses write-temp-then-rename (atomic replace) per the
//! recorded Open Question decision in DESIGN.md, which intentionally
//! overrides the Python original's non-atomic write: concurrent readers of
//! the store directory must observe only fully-written documents.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{CalibrationBucket, CalibrationReport, Direction, Thesis, ThesisState};

/// Flat round-trip fee per contract for prediction markets (spec §4.9).
pub const ROUND_TRIP_FEE_CENTS: f64 = 14.0;

pub struct ThesisTracker {
    store_dir: PathBuf,
    theses: BTreeMap<Uuid, Thesis>,
    by_market: BTreeMap<String, Vec<Uuid>>,
    by_order: BTreeMap<String, Uuid>,
}

impl ThesisTracker {
    /// Open (or create) a thesis store directory and rebuild indexes from
    /// whatever documents are already on disk.
    pub fn open(store_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let store_dir = store_dir.into();
        fs::create_dir_all(&store_dir)?;
        let mut tracker = Self {
            store_dir,
            theses: BTreeMap::new(),
            by_market: BTreeMap::new(),
            by_order: BTreeMap::new(),
        };
        tracker.rebuild_indexes()?;
        Ok(tracker)
    }

    fn rebuild_indexes(&mut self) -> anyhow::Result<()> {
        self.theses.clear();
        self.by_market.clear();
        self.by_order.clear();

        for entry in fs::read_dir(&self.store_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // External tooling (and our own mid-write temp files) may leave
            // partial or missing files between a directory scan and open;
            // tolerate read/parse failures by skipping the entry.
            let Ok(raw) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(thesis) = serde_json::from_str::<Thesis>(&raw) else {
                continue;
            };
            self.index_insert(&thesis);
            self.theses.insert(thesis.id, thesis);
        }
        Ok(())
    }

    fn index_insert(&mut self, thesis: &Thesis) {
        self.by_market
            .entry(thesis.market_ticker.clone())
            .or_default()
            .push(thesis.id);
        for order_id in &thesis.order_ids {
            self.by_order.insert(order_id.clone(), thesis.id);
        }
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{id}.json"))
    }

    fn persist(&self, thesis: &Thesis) -> anyhow::Result<()> {
        atomic_write_json(&self.path_for(thesis.id), thesis)
    }

    pub fn create_thesis(
        &mut self,
        market_ticker: impl Into<String>,
        hypothesis: impl Into<String>,
        direction: Direction,
        model_prob: f64,
        market_implied_prob: f64,
        supporting_signals: Vec<String>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Thesis> {
        let thesis = Thesis {
            id: Uuid::new_v4(),
            market_ticker: market_ticker.into(),
            hypothesis: hypothesis.into(),
            direction,
            entry_price_target_cents: None,
            exit_price_target_cents: None,
            model_prob,
            market_implied_prob,
            supporting_signals,
            state: ThesisState::Draft,
            order_ids: Vec::new(),
            filled_count: 0,
            avg_fill_price_cents: 0.0,
            realized_pnl_cents: None,
            outcome_correct: None,
            created_at: now,
            updated_at: now,
        };
        self.persist(&thesis)?;
        self.index_insert(&thesis);
        self.theses.insert(thesis.id, thesis.clone());
        Ok(thesis)
    }

    pub fn link_order(&mut self, id: Uuid, order_id: impl Into<String>, now: DateTime<Utc>) -> anyhow::Result<()> {
        let order_id = order_id.into();
        let thesis = self
            .theses
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown thesis {id}"))?;
        thesis.order_ids.push(order_id.clone());
        thesis.updated_at = now;
        self.by_order.insert(order_id, id);
        self.persist(self.theses.get(&id).unwrap())
    }

    /// Record a fill: updates filled count and the volume-weighted average
    /// fill price. The first fill transitions DRAFT -> ACTIVE.
    pub fn record_fill(&mut self, id: Uuid, count: i64, price_cents: f64, now: DateTime<Utc>) -> anyhow::Result<()> {
        let thesis = self
            .theses
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown thesis {id}"))?;

        let prior_notional = thesis.avg_fill_price_cents * thesis.filled_count as f64;
        let new_notional = prior_notional + price_cents * count as f64;
        thesis.filled_count += count;
        thesis.avg_fill_price_cents = if thesis.filled_count > 0 {
            new_notional / thesis.filled_count as f64
        } else {
            0.0
        };
        if thesis.state == ThesisState::Draft && thesis.filled_count > 0 {
            thesis.state = ThesisState::Active;
        }
        thesis.updated_at = now;
        self.persist(self.theses.get(&id).unwrap())
    }

    pub fn invalidate(&mut self, id: Uuid, _reason: impl Into<String>, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.transition_terminal(id, ThesisState::Invalidated, now)
    }

    pub fn expire(&mut self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.transition_terminal(id, ThesisState::Expired, now)
    }

    fn transition_terminal(&mut self, id: Uuid, state: ThesisState, now: DateTime<Utc>) -> anyhow::Result<()> {
        let thesis = self
            .theses
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown thesis {id}"))?;
        if thesis.is_terminal() {
            anyhow::bail!("thesis {id} is already in a terminal state");
        }
        thesis.state = state;
        thesis.updated_at = now;
        self.persist(self.theses.get(&id).unwrap())
    }

    /// Settle a thesis: compute realized P&L from filled count, average
    /// fill price, exit price, and the flat round-trip fee. `exit_price`
    /// is expressed on the YES-contract cents scale regardless of this
    /// thesis's direction; direction flips the payout side.
    pub fn realize(
        &mut self,
        id: Uuid,
        exit_price_cents: i32,
        outcome_correct: bool,
        now: DateTime<Utc>,
    ) -> anyhow::Result<f64> {
        let thesis = self
            .theses
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown thesis {id}"))?;
        if thesis.is_terminal() {
            anyhow::bail!("thesis {id} is already in a terminal state");
        }

        let payout_side_price = match thesis.direction {
            Direction::Yes => exit_price_cents as f64,
            Direction::No => 100.0 - exit_price_cents as f64,
        };
        let pnl_per_contract = payout_side_price - thesis.avg_fill_price_cents - ROUND_TRIP_FEE_CENTS;
        let realized = pnl_per_contract * thesis.filled_count as f64;

        thesis.state = ThesisState::Realized;
        thesis.realized_pnl_cents = Some(realized);
        thesis.outcome_correct = Some(outcome_correct);
        thesis.exit_price_target_cents = Some(exit_price_cents);
        thesis.updated_at = now;
        self.persist(self.theses.get(&id).unwrap())?;
        Ok(realized)
    }

    pub fn get(&self, id: Uuid) -> Option<&Thesis> {
        self.theses.get(&id)
    }

    pub fn by_market(&self, market_ticker: &str) -> Vec<&Thesis> {
        self.by_market
            .get(market_ticker)
            .map(|ids| ids.iter().filter_map(|id| self.theses.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn by_order_id(&self, order_id: &str) -> Option<&Thesis> {
        self.by_order.get(order_id).and_then(|id| self.theses.get(id))
    }

    /// Delete non-ACTIVE (and non-DRAFT — i.e. terminal) theses whose
    /// `updated_at` is older than `ttl`, removing both the in-memory entry
    /// and its file.
    pub fn cleanup_old_theses(&mut self, ttl: chrono::Duration, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let stale: Vec<Uuid> = self
            .theses
            .values()
            .filter(|t| t.is_terminal() && now.signed_duration_since(t.updated_at) > ttl)
            .map(|t| t.id)
            .collect();

        for id in &stale {
            let _ = fs::remove_file(self.path_for(*id));
            if let Some(thesis) = self.theses.remove(id) {
                if let Some(ids) = self.by_market.get_mut(&thesis.market_ticker) {
                    ids.retain(|x| x != id);
                }
                for order_id in &thesis.order_ids {
                    self.by_order.remove(order_id);
                }
            }
        }
        Ok(stale.len())
    }

    /// Bucket REALIZED theses into five probability bands and compute the
    /// Brier score across all of them (spec §4.9).
    pub fn calibration_report(&self) -> CalibrationReport {
        let realized: Vec<&Thesis> = self
            .theses
            .values()
            .filter(|t| t.state == ThesisState::Realized)
            .collect();

        let band_bounds = [(0u8, 20u8), (20, 40), (40, 60), (60, 80), (80, 100)];
        let mut buckets = Vec::with_capacity(5);
        for (lower, upper) in band_bounds {
            let in_band: Vec<&&Thesis> = realized
                .iter()
                .filter(|t| {
                    let p = t.model_prob * 100.0;
                    p >= lower as f64 && p < upper as f64
                })
                .collect();
            let count = in_band.len() as u32;
            let accuracy = if count > 0 {
                in_band.iter().filter(|t| t.outcome_correct == Some(true)).count() as f64
                    / count as f64
            } else {
                0.0
            };
            let mean_predicted_prob = if count > 0 {
                in_band.iter().map(|t| t.model_prob).sum::<f64>() / count as f64
            } else {
                0.0
            };
            buckets.push(CalibrationBucket {
                lower_pct: lower,
                upper_pct: upper,
                count,
                accuracy,
                mean_predicted_prob,
            });
        }

        let brier_score = if realized.is_empty() {
            0.0
        } else {
            realized
                .iter()
                .map(|t| {
                    let outcome = if t.outcome_correct == Some(true) { 1.0 } else { 0.0 };
                    (t.model_prob - outcome).powi(2)
                })
                .sum::<f64>()
                / realized.len() as f64
        };

        CalibrationReport {
            buckets,
            brier_score,
            sample_size: realized.len() as u32,
        }
    }
}

fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp_path, body)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn create_link_fill_transitions_to_active() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ThesisTracker::open(dir.path()).unwrap();
        let thesis = tracker
            .create_thesis("MARKET-X", "model says yes", Direction::Yes, 0.6, 0.5, vec![], now())
            .unwrap();
        assert_eq!(thesis.state, ThesisState::Draft);

        tracker.link_order(thesis.id, "order-1", now()).unwrap();
        tracker.record_fill(thesis.id, 10, 45.0, now()).unwrap();

        let updated = tracker.get(thesis.id).unwrap();
        assert_eq!(updated.state, ThesisState::Active);
        assert_eq!(updated.filled_count, 10);
        assert!((updated.avg_fill_price_cents - 45.0).abs() < 1e-9);
        assert_eq!(tracker.by_order_id("order-1").unwrap().id, thesis.id);
    }

    #[test]
    fn vwap_across_multiple_fills() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ThesisTracker::open(dir.path()).unwrap();
        let thesis = tracker
            .create_thesis("MARKET-Y", "h", Direction::Yes, 0.6, 0.5, vec![], now())
            .unwrap();
        tracker.record_fill(thesis.id, 10, 40.0, now()).unwrap();
        tracker.record_fill(thesis.id, 10, 50.0, now()).unwrap();
        let updated = tracker.get(thesis.id).unwrap();
        // (10*40 + 10*50) / 20 = 45
        assert!((updated.avg_fill_price_cents - 45.0).abs() < 1e-9);
    }

    #[test]
    fn restart_rebuilds_indexes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let mut tracker = ThesisTracker::open(dir.path()).unwrap();
            let thesis = tracker
                .create_thesis("MARKET-Z", "h", Direction::No, 0.4, 0.5, vec![], now())
                .unwrap();
            tracker.link_order(thesis.id, "order-9", now()).unwrap();
            thesis.id
        };
        let tracker2 = ThesisTracker::open(dir.path()).unwrap();
        assert!(tracker2.get(id).is_some());
        assert_eq!(tracker2.by_order_id("order-9").unwrap().id, id);
    }

    #[test]
    fn realize_computes_pnl_and_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ThesisTracker::open(dir.path()).unwrap();
        let thesis = tracker
            .create_thesis("MARKET-W", "h", Direction::Yes, 0.6, 0.5, vec![], now())
            .unwrap();
        tracker.record_fill(thesis.id, 10, 45.0, now()).unwrap();
        let pnl = tracker.realize(thesis.id, 100, true, now()).unwrap();
        // (100 - 45 - 14) * 10 = 410
        assert!((pnl - 410.0).abs() < 1e-9);
        assert_eq!(tracker.get(thesis.id).unwrap().state, ThesisState::Realized);
    }

    #[test]
    fn cleanup_removes_stale_terminal_theses() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ThesisTracker::open(dir.path()).unwrap();
        let old_time = now() - chrono::Duration::days(30);
        let thesis = tracker
            .create_thesis("MARKET-V", "h", Direction::Yes, 0.6, 0.5, vec![], old_time)
            .unwrap();
        tracker.expire(thesis.id, old_time).unwrap();
        let removed = tracker
            .cleanup_old_theses(chrono::Duration::days(7), now())
            .unwrap();
        assert_eq!(removed, 1);
        assert!(tracker.get(thesis.id).is_none());
    }
}
