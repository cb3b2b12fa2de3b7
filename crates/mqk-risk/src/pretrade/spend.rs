//! Rolling daily/weekly/monthly spend windows — spec §4.2 / §9.
//!
//! Boundaries are UTC day/week(Monday)/month per the recorded Open Question
//! decision (DESIGN.md); callers supply `day_id`/`week_id`/`month_id`
//! explicitly (no internal wall-clock reads), matching the
//! Config/State/Input -> Decision idiom used throughout `mqk-portfolio`.

use mqk_portfolio::Micros;

#[derive(Copy, Clone, Debug, Default)]
pub struct SpendTracker {
    day_id: i64,
    week_id: i64,
    month_id: i64,
    daily_spent: Micros,
    weekly_spent: Micros,
    monthly_spent: Micros,
}

impl SpendTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn roll(&mut self, day_id: i64, week_id: i64, month_id: i64) {
        if day_id != self.day_id {
            self.day_id = day_id;
            self.daily_spent = Micros::ZERO;
        }
        if week_id != self.week_id {
            self.week_id = week_id;
            self.weekly_spent = Micros::ZERO;
        }
        if month_id != self.month_id {
            self.month_id = month_id;
            self.monthly_spent = Micros::ZERO;
        }
    }

    pub fn record_spend(&mut self, notional: Micros, day_id: i64, week_id: i64, month_id: i64) {
        self.roll(day_id, week_id, month_id);
        self.daily_spent = self.daily_spent.saturating_add(notional);
        self.weekly_spent = self.weekly_spent.saturating_add(notional);
        self.monthly_spent = self.monthly_spent.saturating_add(notional);
    }

    pub fn remaining_daily(&mut self, limit: Micros, day_id: i64, week_id: i64, month_id: i64) -> Micros {
        self.roll(day_id, week_id, month_id);
        limit.saturating_sub(self.daily_spent)
    }

    pub fn remaining_weekly(&mut self, limit: Micros, day_id: i64, week_id: i64, month_id: i64) -> Micros {
        self.roll(day_id, week_id, month_id);
        limit.saturating_sub(self.weekly_spent)
    }

    pub fn remaining_monthly(&mut self, limit: Micros, day_id: i64, week_id: i64, month_id: i64) -> Micros {
        self.roll(day_id, week_id, month_id);
        limit.saturating_sub(self.monthly_spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_resets_on_day_boundary() {
        let mut tracker = SpendTracker::new();
        tracker.record_spend(Micros::new(10_000_000), 1, 1, 1);
        assert_eq!(
            tracker.remaining_daily(Micros::new(20_000_000), 1, 1, 1),
            Micros::new(10_000_000)
        );
        assert_eq!(
            tracker.remaining_daily(Micros::new(20_000_000), 2, 1, 1),
            Micros::new(20_000_000)
        );
    }

    #[test]
    fn weekly_and_monthly_survive_day_rollover() {
        let mut tracker = SpendTracker::new();
        tracker.record_spend(Micros::new(10_000_000), 1, 1, 1);
        tracker.record_spend(Micros::new(5_000_000), 2, 1, 1);
        assert_eq!(
            tracker.remaining_weekly(Micros::new(100_000_000), 2, 1, 1),
            Micros::new(85_000_000)
        );
    }
}
