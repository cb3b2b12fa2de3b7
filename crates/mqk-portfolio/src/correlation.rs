//! Sector and correlation-group exposure limits.
//!
//! All percentages are expressed as basis points of account equity (10_000
//! = 100%) and computed from [`Micros`] market values, so no monetary
//! comparison in this module goes through a float.

use std::collections::BTreeMap;

use crate::fixedpoint::Micros;

/// Standard market sectors. `Unknown` covers anything not in the mapping
/// (broad-market ETFs, unlisted symbols).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sector {
    Technology,
    Healthcare,
    Financial,
    ConsumerCyclical,
    ConsumerDefensive,
    Industrials,
    Energy,
    Utilities,
    RealEstate,
    Materials,
    Communication,
    Crypto,
    Unknown,
}

impl Sector {
    pub fn name(&self) -> &'static str {
        match self {
            Sector::Technology => "technology",
            Sector::Healthcare => "healthcare",
            Sector::Financial => "financial",
            Sector::ConsumerCyclical => "consumer_cyclical",
            Sector::ConsumerDefensive => "consumer_defensive",
            Sector::Industrials => "industrials",
            Sector::Energy => "energy",
            Sector::Utilities => "utilities",
            Sector::RealEstate => "real_estate",
            Sector::Materials => "materials",
            Sector::Communication => "communication",
            Sector::Crypto => "crypto",
            Sector::Unknown => "unknown",
        }
    }
}

/// Built-in symbol-to-sector table. Covers the same representative set of
/// large-cap US equities as the reference sector mapping; callers extend it
/// with `CorrelationLimits::with_custom_sectors`.
fn builtin_sector_map() -> BTreeMap<&'static str, Sector> {
    use Sector::*;
    let mut m = BTreeMap::new();
    for s in [
        "AAPL", "MSFT", "GOOGL", "GOOG", "META", "NVDA", "AMD", "INTC", "CRM", "ORCL", "ADBE",
        "CSCO", "AVGO", "TSM", "ASML",
    ] {
        m.insert(s, Technology);
    }
    for s in ["JNJ", "UNH", "PFE", "ABBV", "MRK", "LLY", "TMO", "ABT"] {
        m.insert(s, Healthcare);
    }
    for s in [
        "JPM", "BAC", "WFC", "GS", "MS", "C", "BLK", "SCHW", "V", "MA", "AXP",
    ] {
        m.insert(s, Financial);
    }
    for s in ["AMZN", "TSLA", "HD", "NKE", "MCD", "SBUX", "TGT", "LOW"] {
        m.insert(s, ConsumerCyclical);
    }
    for s in ["WMT", "PG", "KO", "PEP", "COST", "PM"] {
        m.insert(s, ConsumerDefensive);
    }
    for s in ["XOM", "CVX", "COP", "SLB", "EOG", "OXY"] {
        m.insert(s, Energy);
    }
    for s in ["NFLX", "DIS", "CMCSA", "T", "VZ", "TMUS"] {
        m.insert(s, Communication);
    }
    for s in ["BA", "CAT", "HON", "UNP", "UPS", "RTX", "GE", "LMT"] {
        m.insert(s, Industrials);
    }
    for s in ["NEE", "DUK", "SO", "D"] {
        m.insert(s, Utilities);
    }
    for s in ["AMT", "PLD", "CCI", "EQIX", "SPG"] {
        m.insert(s, RealEstate);
    }
    m.insert("SPY", Unknown);
    m.insert("QQQ", Technology);
    m.insert("XLK", Technology);
    m.insert("XLF", Financial);
    m.insert("XLE", Energy);
    m.insert("XLV", Healthcare);
    m.insert("XLI", Industrials);
    m.insert("XLP", ConsumerDefensive);
    m.insert("XLY", ConsumerCyclical);
    m.insert("XLU", Utilities);
    m.insert("XLRE", RealEstate);
    m.insert("XLC", Communication);
    for s in ["COIN", "MSTR", "RIOT", "MARA"] {
        m.insert(s, Crypto);
    }
    m
}

/// Built-in correlation groups: symbols that tend to move together.
fn builtin_correlation_groups() -> BTreeMap<&'static str, Vec<&'static str>> {
    let mut m = BTreeMap::new();
    m.insert(
        "magnificent_7",
        vec!["AAPL", "MSFT", "GOOGL", "GOOG", "AMZN", "META", "NVDA", "TSLA"],
    );
    m.insert(
        "semiconductors",
        vec!["NVDA", "AMD", "INTC", "TSM", "ASML", "AVGO", "MU", "QCOM"],
    );
    m.insert("faang", vec!["META", "AAPL", "AMZN", "NFLX", "GOOGL", "GOOG"]);
    m.insert("banks", vec!["JPM", "BAC", "WFC", "C", "GS", "MS"]);
    m.insert("oil_majors", vec!["XOM", "CVX", "COP", "BP", "SHEL"]);
    m.insert("pharma", vec!["PFE", "JNJ", "MRK", "ABBV", "LLY"]);
    m.insert("ev_battery", vec!["TSLA", "RIVN", "LCID", "NIO", "F", "GM"]);
    m.insert("cloud", vec!["AMZN", "MSFT", "GOOGL", "CRM", "SNOW", "NET"]);
    m.insert("streaming", vec!["NFLX", "DIS", "WBD", "PARA", "CMCSA"]);
    m.insert("crypto_exposed", vec!["COIN", "MSTR", "RIOT", "MARA", "SQ"]);
    m.insert(
        "ai_plays",
        vec!["NVDA", "MSFT", "GOOGL", "AMD", "META", "CRM", "PLTR"],
    );
    m
}

/// Configuration for correlation-based limits, all in basis points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationLimits {
    pub max_sector_exposure_bps: i64,
    pub max_sector_for_unknown_bps: i64,
    pub max_correlation_group_bps: i64,
    pub max_single_stock_bps: i64,
    pub max_positions_per_sector: u32,
    pub group_warning_ratio_bps: i64,
}

impl CorrelationLimits {
    pub fn sane_defaults() -> Self {
        Self {
            max_sector_exposure_bps: 3_000,
            max_sector_for_unknown_bps: 1_000,
            max_correlation_group_bps: 2_500,
            max_single_stock_bps: 1_500,
            max_positions_per_sector: 5,
            group_warning_ratio_bps: 8_000,
        }
    }
}

/// A single position's contribution to exposure, independent of the
/// richer `PositionState` in `types.rs`.
#[derive(Clone, Debug)]
pub struct ExposurePosition {
    pub symbol: String,
    pub market_value: Micros,
}

/// Manages sector/correlation-group symbol tables and evaluates proposed
/// positions against `CorrelationLimits`.
#[derive(Clone, Debug)]
pub struct CorrelationManager {
    limits: CorrelationLimits,
    sectors: BTreeMap<String, Sector>,
    groups: BTreeMap<String, Vec<String>>,
}

impl CorrelationManager {
    pub fn new(limits: CorrelationLimits) -> Self {
        let sectors = builtin_sector_map()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let groups = builtin_correlation_groups()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
            .collect();
        Self {
            limits,
            sectors,
            groups,
        }
    }

    pub fn add_sector_mapping(&mut self, symbol: &str, sector: Sector) {
        self.sectors.insert(symbol.to_uppercase(), sector);
    }

    pub fn add_to_correlation_group(&mut self, group: &str, symbol: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .push(symbol.to_uppercase());
    }

    pub fn sector_of(&self, symbol: &str) -> Sector {
        *self
            .sectors
            .get(&symbol.to_uppercase())
            .unwrap_or(&Sector::Unknown)
    }

    pub fn groups_of(&self, symbol: &str) -> Vec<&str> {
        let symbol = symbol.to_uppercase();
        self.groups
            .iter()
            .filter(|(_, members)| members.iter().any(|m| m == &symbol))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    fn sector_limit_bps(&self, sector: Sector) -> i64 {
        if sector == Sector::Unknown {
            self.limits.max_sector_for_unknown_bps
        } else {
            self.limits.max_sector_exposure_bps
        }
    }

    /// Basis points of `equity` represented by `value` (0 when equity <= 0).
    fn bps_of(value: Micros, equity: Micros) -> i64 {
        if equity.raw() <= 0 {
            return 0;
        }
        ((value.abs().raw() as i128 * 10_000) / equity.raw() as i128) as i64
    }

    /// Breakdown of current exposure by sector, group, and single stock.
    pub fn calculate_exposure(
        &self,
        positions: &[ExposurePosition],
        equity: Micros,
    ) -> ExposureBreakdown {
        let mut sector_value: BTreeMap<Sector, Micros> = BTreeMap::new();
        let mut sector_count: BTreeMap<Sector, u32> = BTreeMap::new();
        let mut group_value: BTreeMap<String, Micros> = BTreeMap::new();
        let mut single_stock_bps: BTreeMap<String, i64> = BTreeMap::new();
        let mut total = Micros::ZERO;

        for pos in positions {
            let mv = pos.market_value.abs();
            total = total.saturating_add(mv);

            let sector = self.sector_of(&pos.symbol);
            sector_value
                .entry(sector)
                .and_modify(|v| *v = v.saturating_add(mv))
                .or_insert(mv);
            *sector_count.entry(sector).or_insert(0) += 1;

            for group in self.groups_of(&pos.symbol) {
                group_value
                    .entry(group.to_string())
                    .and_modify(|v| *v = v.saturating_add(mv))
                    .or_insert(mv);
            }

            single_stock_bps.insert(pos.symbol.clone(), Self::bps_of(mv, equity));
        }

        let sector_bps = sector_value
            .iter()
            .map(|(s, v)| (*s, Self::bps_of(*v, equity)))
            .collect();
        let group_bps = group_value
            .iter()
            .map(|(g, v)| (g.clone(), Self::bps_of(*v, equity)))
            .collect();

        ExposureBreakdown {
            total_value: total,
            sector_bps,
            group_bps,
            single_stock_bps,
            position_count_by_sector: sector_count,
        }
    }

    /// Evaluate whether a proposed position passes all correlation limits.
    pub fn check_position(
        &self,
        symbol: &str,
        proposed_value: Micros,
        current_positions: &[ExposurePosition],
        equity: Micros,
        is_new_position: bool,
    ) -> ExposureCheckResult {
        if equity.raw() <= 0 {
            return ExposureCheckResult {
                allowed: false,
                reason: Some("account equity is zero or negative".to_string()),
                warnings: vec!["cannot check exposure with zero equity".to_string()],
            };
        }

        let current = self.calculate_exposure(current_positions, equity);
        let proposed_bps = Self::bps_of(proposed_value, equity);

        let current_single = current.single_stock_bps.get(symbol).copied().unwrap_or(0);
        let new_single = current_single + proposed_bps;
        if new_single > self.limits.max_single_stock_bps {
            return ExposureCheckResult {
                allowed: false,
                reason: Some(format!(
                    "single stock limit exceeded: {new_single}bps > {}bps",
                    self.limits.max_single_stock_bps
                )),
                warnings: vec![],
            };
        }

        let sector = self.sector_of(symbol);
        let sector_limit = self.sector_limit_bps(sector);
        let current_sector = current.sector_bps.get(&sector).copied().unwrap_or(0);
        let new_sector = current_sector + proposed_bps;
        if new_sector > sector_limit {
            return ExposureCheckResult {
                allowed: false,
                reason: Some(format!(
                    "sector limit exceeded for {}: {new_sector}bps > {sector_limit}bps",
                    sector.name()
                )),
                warnings: vec![],
            };
        }

        if is_new_position {
            let count = current
                .position_count_by_sector
                .get(&sector)
                .copied()
                .unwrap_or(0);
            if count >= self.limits.max_positions_per_sector {
                return ExposureCheckResult {
                    allowed: false,
                    reason: Some(format!(
                        "max positions in {}: {count} >= {}",
                        sector.name(),
                        self.limits.max_positions_per_sector
                    )),
                    warnings: vec![],
                };
            }
        }

        let mut warnings = Vec::new();
        for group in self.groups_of(symbol) {
            let current_group = current.group_bps.get(group).copied().unwrap_or(0);
            let new_group = current_group + proposed_bps;
            if new_group > self.limits.max_correlation_group_bps {
                return ExposureCheckResult {
                    allowed: false,
                    reason: Some(format!(
                        "correlation group limit exceeded for '{group}': {new_group}bps > {}bps",
                        self.limits.max_correlation_group_bps
                    )),
                    warnings: vec![],
                };
            }
            let warn_at =
                (self.limits.max_correlation_group_bps * self.limits.group_warning_ratio_bps)
                    / 10_000;
            if new_group > warn_at {
                warnings.push(format!("approaching '{group}' group limit: {new_group}bps"));
            }
        }

        ExposureCheckResult {
            allowed: true,
            reason: None,
            warnings,
        }
    }

    /// Most restrictive remaining headroom across single-stock, sector, and
    /// correlation-group limits, as a `Micros` dollar amount.
    pub fn max_position_size(
        &self,
        symbol: &str,
        current_positions: &[ExposurePosition],
        equity: Micros,
    ) -> Micros {
        if equity.raw() <= 0 {
            return Micros::ZERO;
        }
        let current = self.calculate_exposure(current_positions, equity);

        let from_bps = |bps: i64| -> i64 {
            ((equity.raw() as i128 * bps.max(0) as i128) / 10_000) as i64
        };

        let current_single = current.single_stock_bps.get(symbol).copied().unwrap_or(0);
        let max_by_single = from_bps(self.limits.max_single_stock_bps - current_single);

        let sector = self.sector_of(symbol);
        let sector_limit = self.sector_limit_bps(sector);
        let current_sector = current.sector_bps.get(&sector).copied().unwrap_or(0);
        let max_by_sector = from_bps(sector_limit - current_sector);

        let mut max_by_group = i64::MAX;
        for group in self.groups_of(symbol) {
            let current_group = current.group_bps.get(group).copied().unwrap_or(0);
            let group_max = from_bps(self.limits.max_correlation_group_bps - current_group);
            max_by_group = max_by_group.min(group_max);
        }
        if max_by_group == i64::MAX {
            max_by_group = max_by_sector;
        }

        Micros::new(max_by_single.min(max_by_sector).min(max_by_group).max(0))
    }

    /// Diversification score (0-100, higher is better) using an
    /// integer-bps Herfindahl-Hirschman Index rather than a float HHI.
    pub fn diversification_score(
        &self,
        positions: &[ExposurePosition],
        equity: Micros,
    ) -> DiversificationScore {
        let exposure = self.calculate_exposure(positions, equity);

        let active_sectors = exposure.sector_bps.values().filter(|&&bps| bps > 100).count() as i64;

        // HHI in bps^2 units (sum of squared bps shares), scaled down so the
        // score arithmetic below stays comparable to the 0..=10_000 bps domain.
        let hhi_bps2: i128 = exposure
            .single_stock_bps
            .values()
            .map(|&bps| (bps as i128) * (bps as i128))
            .sum();
        // Normalize to the 0.0..=1.0 HHI scale used by the score formula,
        // expressed as parts-per-10_000 to stay integer.
        let hhi_pp10k = (hhi_bps2 / 10_000) as i64; // bps^2 / 10_000 ~= (fraction)^2 * 10_000

        let effective_n_x10 = if hhi_pp10k > 0 {
            (10 * 10_000) / hhi_pp10k
        } else {
            0
        };

        let mut score = 0i64;
        score += (active_sectors * 10).min(30);
        score += (40 - (hhi_pp10k * 40) / 10_000).clamp(0, 40);
        score += (effective_n_x10 / 2).min(30);

        DiversificationScore {
            score: score.clamp(0, 100),
            active_sectors,
            position_count: positions.len() as i64,
            effective_n_x10,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExposureBreakdown {
    pub total_value: Micros,
    pub sector_bps: BTreeMap<Sector, i64>,
    pub group_bps: BTreeMap<String, i64>,
    pub single_stock_bps: BTreeMap<String, i64>,
    pub position_count_by_sector: BTreeMap<Sector, u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExposureCheckResult {
    pub allowed: bool,
    pub reason: Option<String>,
    pub warnings: Vec<String>,
}

/// `effective_n_x10` is the effective-number-of-positions metric (1/HHI)
/// times 10, kept as an integer (e.g. `47` means 4.7 effective positions).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiversificationScore {
    pub score: i64,
    pub active_sectors: i64,
    pub position_count: i64,
    pub effective_n_x10: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(dollars: i64) -> Micros {
        Micros::new(dollars * 1_000_000)
    }

    fn mgr() -> CorrelationManager {
        CorrelationManager::new(CorrelationLimits::sane_defaults())
    }

    #[test]
    fn sector_lookup_known_and_unknown() {
        let mgr = mgr();
        assert_eq!(mgr.sector_of("AAPL"), Sector::Technology);
        assert_eq!(mgr.sector_of("ZZZZ"), Sector::Unknown);
    }

    #[test]
    fn single_stock_limit_blocks_over_15_pct() {
        let mgr = mgr();
        let equity = m(100_000);
        let current = vec![ExposurePosition {
            symbol: "NVDA".into(),
            market_value: m(10_000),
        }];
        let result = mgr.check_position("NVDA", m(6_000), &current, equity, false);
        assert!(!result.allowed);
        assert!(result.reason.unwrap().contains("single stock"));
    }

    #[test]
    fn sector_limit_example_from_spec() {
        // Existing tech exposure at 25%, adding another 10% tech position
        // pushes sector to 35% > 30% cap, even though each symbol is under
        // the single-stock cap.
        let mgr = mgr();
        let equity = m(100_000);
        let current = vec![ExposurePosition {
            symbol: "AAPL".into(),
            market_value: m(14_000),
        }, ExposurePosition {
            symbol: "MSFT".into(),
            market_value: m(11_000),
        }];
        let result = mgr.check_position("NVDA", m(10_000), &current, equity, true);
        assert!(!result.allowed);
        assert!(result.reason.unwrap().contains("sector limit"));
    }

    #[test]
    fn correlation_group_limit_blocks_magnificent_7_concentration() {
        let mgr = mgr();
        let equity = m(100_000);
        let current = vec![ExposurePosition {
            symbol: "AAPL".into(),
            market_value: m(12_000),
        }, ExposurePosition {
            symbol: "MSFT".into(),
            market_value: m(10_000),
        }];
        // GOOGL is also in magnificent_7; 22% + 6% = 28% > 25% cap.
        let result = mgr.check_position("GOOGL", m(6_000), &current, equity, true);
        assert!(!result.allowed);
        assert!(result.reason.unwrap().contains("correlation group"));
    }

    #[test]
    fn unrelated_symbol_passes() {
        let mgr = mgr();
        let equity = m(100_000);
        let current = vec![];
        let result = mgr.check_position("JNJ", m(5_000), &current, equity, true);
        assert!(result.allowed);
    }

    #[test]
    fn zero_equity_is_never_allowed() {
        let mgr = mgr();
        let result = mgr.check_position("AAPL", m(1_000), &[], Micros::ZERO, true);
        assert!(!result.allowed);
    }

    #[test]
    fn diversification_score_rewards_spread_positions() {
        let mgr = mgr();
        let equity = m(100_000);
        let concentrated = vec![ExposurePosition {
            symbol: "AAPL".into(),
            market_value: m(90_000),
        }];
        let spread = vec![
            ExposurePosition { symbol: "AAPL".into(), market_value: m(20_000) },
            ExposurePosition { symbol: "JPM".into(), market_value: m(20_000) },
            ExposurePosition { symbol: "XOM".into(), market_value: m(20_000) },
            ExposurePosition { symbol: "JNJ".into(), market_value: m(20_000) },
        ];
        let concentrated_score = mgr.diversification_score(&concentrated, equity);
        let spread_score = mgr.diversification_score(&spread, equity);
        assert!(spread_score.score > concentrated_score.score);
    }
}
