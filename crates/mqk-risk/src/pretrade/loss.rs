//! Peak-equity high-water mark and daily/weekly P&L — spec §4.2.
//!
//! Complementary to (not a replacement for) `mqk-portfolio::drawdown`'s
//! level state machine: this tracker feeds the pre-trade pipeline's
//! `DAILY_LOSS_LIMIT` / `WEEKLY_LOSS_LIMIT` / `DRAWDOWN_LIMIT` checks, which
//! are evaluated per order rather than as a standalone level transition.

use mqk_portfolio::Micros;

#[derive(Copy, Clone, Debug)]
pub struct LossTracker {
    peak_equity: Micros,
    day_id: i64,
    week_id: i64,
    day_start_equity: Micros,
    week_start_equity: Micros,
}

impl LossTracker {
    pub fn new(starting_equity: Micros) -> Self {
        Self {
            peak_equity: starting_equity,
            day_id: 0,
            week_id: 0,
            day_start_equity: starting_equity,
            week_start_equity: starting_equity,
        }
    }

    /// Feed a fresh equity reading. Rolls the day/week start-equity
    /// reference at boundary crossings and advances the monotonic peak.
    pub fn update_equity(&mut self, equity: Micros, day_id: i64, week_id: i64) {
        if day_id != self.day_id {
            self.day_id = day_id;
            self.day_start_equity = equity;
        }
        if week_id != self.week_id {
            self.week_id = week_id;
            self.week_start_equity = equity;
        }
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
    }

    pub fn peak_equity(&self) -> Micros {
        self.peak_equity
    }

    /// Daily P&L (negative when down on the day).
    pub fn daily_pnl(&self, equity: Micros) -> Micros {
        equity.saturating_sub(self.day_start_equity)
    }

    pub fn weekly_pnl(&self, equity: Micros) -> Micros {
        equity.saturating_sub(self.week_start_equity)
    }

    /// `(peak - equity) / peak` expressed in basis points (10_000 = 100%),
    /// `0` if peak <= 0 or equity >= peak. Integer throughout -- spec §3/§9
    /// forbid comparing a binary-float ratio against a configured limit.
    pub fn drawdown_bps(&self, equity: Micros) -> i64 {
        if self.peak_equity.raw() <= 0 || equity >= self.peak_equity {
            return 0;
        }
        (((self.peak_equity.raw() - equity.raw()) as i128 * 10_000) / self.peak_equity.raw() as i128) as i64
    }
}
