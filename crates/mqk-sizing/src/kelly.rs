//! Kelly-criterion position sizing — M4.5-1
//!
//! Grounded on the source's `risk/position_sizing.py::PositionSizer`. Kelly
//! fraction math operates on plain `f64` probabilities/ratios (not `Micros`);
//! it is intermediate sizing math, not a monetary comparison against a
//! limit/spend tally/P&L figure, so the fixed-point-only rule in
//! `mqk-portfolio::Micros` does not apply here. The final share count and
//! dollar caps it feeds into do use `Micros`.

/// Historical win/loss statistics backing a Kelly calculation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TradeStats {
    /// Win rate in [0, 1].
    pub win_rate: f64,
    /// Average winning trade size (positive).
    pub avg_win: f64,
    /// Average losing trade size (positive, i.e. magnitude of the loss).
    pub avg_loss: f64,
    /// Number of trades the stats were computed over.
    pub sample_size: u32,
}

impl TradeStats {
    pub fn new(win_rate: f64, avg_win: f64, avg_loss: f64, sample_size: u32) -> Self {
        Self {
            win_rate,
            avg_win,
            avg_loss,
            sample_size,
        }
    }

    /// Win/loss ratio `b = avg_win / avg_loss`. `0.0` if `avg_loss` is zero
    /// (degenerate stats — callers should treat Kelly as zero in this case).
    pub fn win_loss_ratio(&self) -> f64 {
        if self.avg_loss <= 0.0 {
            0.0
        } else {
            self.avg_win / self.avg_loss
        }
    }
}

/// Sizing method, mirroring the source's `PositionSizeMethod` enum.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KellyMethod {
    FullKelly,
    HalfKelly,
    QuarterKelly,
    /// Half-Kelly scaled by `min(target_vol / realized_vol, 2.0)`.
    VolatilityAdjusted,
    FixedFractional,
}

/// Below this many historical trades, confidence is scaled linearly and a
/// warning is attached (spec §4.5 default).
pub const DEFAULT_MIN_SAMPLE_TRADES: u32 = 30;

/// Raw Kelly fraction `f* = (p*b - (1-p)) / b`, clamped to `[0, max_position_pct]`.
///
/// Returns `0.0` if `b <= 0` (degenerate/missing stats — no edge to size on).
pub fn kelly_fraction(win_rate: f64, win_loss_ratio: f64, max_position_pct: f64) -> f64 {
    if win_loss_ratio <= 0.0 {
        return 0.0;
    }
    let f = (win_rate * win_loss_ratio - (1.0 - win_rate)) / win_loss_ratio;
    f.clamp(0.0, max_position_pct)
}

/// Result of applying a sizing method to a set of trade stats.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct KellyResult {
    /// Raw (full) Kelly fraction before method scaling or confidence scaling.
    pub raw_kelly: f64,
    /// Final sizing fraction after method multiplier + confidence scaling,
    /// clamped to `[0, max_position_pct]`.
    pub sized_fraction: f64,
    /// `true` if the sample was below [`DEFAULT_MIN_SAMPLE_TRADES`] (or the
    /// caller-supplied threshold) and confidence scaling was applied.
    pub low_confidence: bool,
}

/// Apply a [`KellyMethod`] to [`TradeStats`], scaling for sample confidence.
///
/// `fixed_fraction` is only consulted for [`KellyMethod::FixedFractional`]
/// (it bypasses Kelly entirely and uses a caller-supplied constant fraction).
pub fn size_fraction(
    method: KellyMethod,
    stats: Option<TradeStats>,
    max_position_pct: f64,
    min_sample_trades: u32,
    fixed_fraction: f64,
    target_vol: f64,
    realized_vol: f64,
) -> KellyResult {
    if method == KellyMethod::FixedFractional {
        return KellyResult {
            raw_kelly: 0.0,
            sized_fraction: fixed_fraction.clamp(0.0, max_position_pct),
            low_confidence: false,
        };
    }

    let Some(stats) = stats else {
        return KellyResult {
            raw_kelly: 0.0,
            sized_fraction: 0.0,
            low_confidence: true,
        };
    };

    let b = stats.win_loss_ratio();
    let raw = kelly_fraction(stats.win_rate, b, 1.0);

    let method_scaled = match method {
        KellyMethod::FullKelly => raw,
        KellyMethod::HalfKelly => raw * 0.5,
        KellyMethod::QuarterKelly => raw * 0.25,
        KellyMethod::VolatilityAdjusted => {
            let vol_mult = if realized_vol > 0.0 {
                (target_vol / realized_vol).min(2.0)
            } else {
                0.0
            };
            raw * 0.5 * vol_mult
        }
        KellyMethod::FixedFractional => unreachable!(),
    };

    let low_confidence = stats.sample_size < min_sample_trades;
    let confidence = if low_confidence && min_sample_trades > 0 {
        (stats.sample_size as f64 / min_sample_trades as f64).clamp(0.0, 1.0)
    } else {
        1.0
    };

    KellyResult {
        raw_kelly: raw,
        sized_fraction: (method_scaled * confidence).clamp(0.0, max_position_pct),
        low_confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kelly_fraction_matches_spec_example() {
        // p=0.60, b=150/100=1.5 -> f* = (0.6*1.5 - 0.4)/1.5 = 0.5/1.5 = 0.3333...
        let f = kelly_fraction(0.60, 1.5, 1.0);
        assert!((f - 0.3333).abs() < 1e-3);
    }

    #[test]
    fn half_kelly_sizing_matches_spec_example() {
        let stats = TradeStats::new(0.60, 150.0, 100.0, 100);
        let result = size_fraction(
            KellyMethod::HalfKelly,
            Some(stats),
            1.0,
            DEFAULT_MIN_SAMPLE_TRADES,
            0.0,
            0.0,
            0.0,
        );
        assert!((result.raw_kelly - 0.3333).abs() < 1e-3);
        // half-Kelly of 0.3333 ~= 0.1667
        assert!((result.sized_fraction - 0.1667).abs() < 1e-3);
        assert!(!result.low_confidence);
    }

    #[test]
    fn low_sample_scales_confidence_and_warns() {
        let stats = TradeStats::new(0.60, 150.0, 100.0, 5);
        let result = size_fraction(
            KellyMethod::HalfKelly,
            Some(stats),
            1.0,
            DEFAULT_MIN_SAMPLE_TRADES,
            0.0,
            0.0,
            0.0,
        );
        assert!(result.low_confidence);
        assert!(result.sized_fraction < 0.1667);
    }

    #[test]
    fn zero_win_loss_ratio_yields_zero_kelly() {
        assert_eq!(kelly_fraction(0.6, 0.0, 1.0), 0.0);
    }

    #[test]
    fn volatility_adjusted_caps_multiplier_at_two() {
        let stats = TradeStats::new(0.60, 150.0, 100.0, 100);
        let result = size_fraction(
            KellyMethod::VolatilityAdjusted,
            Some(stats),
            1.0,
            DEFAULT_MIN_SAMPLE_TRADES,
            0.0,
            0.10,
            0.01, // target/realized = 10, capped at 2.0
        );
        // half-Kelly (0.1667) * 2.0 = 0.3333
        assert!((result.sized_fraction - 0.3333).abs() < 1e-3);
    }
}
