//! The preflight gate (§4.8, C8): computes exact data coverage
//! required per role, verifies it against a [`BarSource`], validates
//! the exec→1m close mapping, and optionally drives a bounded
//! auto-heal loop before a run is allowed to start.

use crate::bar_source::BarSource;
use crate::play_load::LoadedPlay;
use indexmap::IndexMap;
use playcore_model::{PreflightError, Timeframe};
use smol_str::SmolStr;
use tracing::{info, warn};

/// Bars of slack added on top of a role's computed warmup requirement
/// to absorb minor upstream gaps (§4.8 step 1).
const SAFETY_BUFFER_BARS: i64 = 10;

/// Maximum number of `BarSource::fill` round trips preflight will
/// attempt per `(symbol, tf)` before giving up (§4.8 step 5).
const MAX_HEAL_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequiredRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Per-`(symbol, tf)` coverage check outcome, carried in the report
/// whether or not the run as a whole passes.
#[derive(Debug, Clone)]
pub struct PairCoverage {
    pub tf: Timeframe,
    pub required: RequiredRange,
    pub available: Option<(i64, i64)>,
    pub healed_bars: u64,
}

/// Output of a preflight run: either [`Self::is_pass`] and the engine
/// may start, or a typed failure naming exactly what is missing.
#[derive(Debug, Clone)]
pub struct PreflightReport {
    pub symbol: SmolStr,
    pub warmup_by_role: IndexMap<playcore_model::TfRole, i64>,
    pub delay_by_role: IndexMap<playcore_model::TfRole, i64>,
    pub per_pair: Vec<PairCoverage>,
    pub exec_to_1m_mapping_feasible: bool,
    pub failure: Option<PreflightError>,
}

impl PreflightReport {
    pub fn is_pass(&self) -> bool {
        self.failure.is_none() && self.exec_to_1m_mapping_feasible
    }
}

/// Whether preflight may call [`BarSource::fill`] to backfill gaps it
/// finds, and how far it will go.
#[derive(Debug, Clone, Copy)]
pub struct AutoSync {
    pub enabled: bool,
    pub max_attempts: u32,
}

impl Default for AutoSync {
    fn default() -> Self {
        Self { enabled: false, max_attempts: MAX_HEAL_ATTEMPTS }
    }
}

/// `required_start_ms(role)` of §4.8 step 1: pushes the window start
/// back by warmup-plus-delay-plus-safety bars of that role's own
/// timeframe.
pub(crate) fn required_start_ms(play: &LoadedPlay, role: playcore_model::TfRole, window_start_ms: i64) -> i64 {
    let tf = play.play.tf_mapping.tf_for(role);
    let bars_back = play.total_skip_bars(role) + SAFETY_BUFFER_BARS;
    window_start_ms - bars_back * tf.duration_ms()
}

/// Checks one `(symbol, tf)` pair's coverage against `required`,
/// optionally healing via `source.fill` up to `auto_sync.max_attempts`
/// times. Returns the final coverage snapshot plus an error if it
/// still falls short afterward.
fn check_and_heal_pair(
    source: &dyn BarSource,
    symbol: &str,
    tf: Timeframe,
    required: RequiredRange,
    auto_sync: AutoSync,
) -> (PairCoverage, Option<PreflightError>) {
    let mut healed_bars = 0u64;
    let mut attempts = 0u32;
    loop {
        let available = source.coverage(symbol, tf);
        let ok = match available {
            Some((min_ts, max_ts)) => min_ts <= required.start_ms && max_ts >= required.end_ms,
            None => false,
        };
        if ok {
            return (PairCoverage { tf, required, available, healed_bars }, None);
        }
        if !auto_sync.enabled || attempts >= auto_sync.max_attempts {
            let hint = format!(
                "query BarSource::fetch/fill for ({symbol}, {tf}) covering [{}, {}]",
                required.start_ms, required.end_ms
            );
            let err = match available {
                None => PreflightError::MissingData {
                    symbol: symbol.to_string(),
                    tf: tf.to_string(),
                    required: (required.start_ms, required.end_ms),
                    available: None,
                    hint,
                },
                Some(range) => PreflightError::CoverageTooShort {
                    symbol: symbol.to_string(),
                    tf: tf.to_string(),
                    required: (required.start_ms, required.end_ms),
                    available: range,
                },
            };
            return (PairCoverage { tf, required, available, healed_bars }, Some(err));
        }
        match source.fill(symbol, tf, required.start_ms, required.end_ms) {
            Some(report) => {
                healed_bars += report.bars_written;
                attempts += 1;
                info!(symbol, %tf, bars_written = report.bars_written, attempt = attempts, "preflight auto-heal");
            }
            None => {
                warn!(symbol, %tf, "auto_sync enabled but BarSource has no fill implementation");
                attempts = auto_sync.max_attempts;
            }
        }
    }
}

/// Validates one `(symbol, tf)` pair's actual bars: non-empty, strictly
/// monotonic, no duplicates, constant gap. Distinct from the coverage
/// check above, which only asks the range question; this one fetches
/// and inspects the bars themselves (§4.8 step 3).
fn validate_pair_bars(source: &dyn BarSource, symbol: &str, tf: Timeframe, required: RequiredRange) -> Option<PreflightError> {
    let bars = source.fetch(symbol, tf, required.start_ms, required.end_ms);
    if bars.is_empty() {
        return Some(PreflightError::MissingData {
            symbol: symbol.to_string(),
            tf: tf.to_string(),
            required: (required.start_ms, required.end_ms),
            available: source.coverage(symbol, tf),
            hint: format!("source.fetch returned no bars for ({symbol}, {tf}) over the required range"),
        });
    }
    let expected_gap = tf.duration_ms();
    for pair in bars.windows(2) {
        let (a, b) = (pair[0].ts_close_ms, pair[1].ts_close_ms);
        if b == a {
            return Some(PreflightError::Duplicate { symbol: symbol.to_string(), tf: tf.to_string(), ts_ms: a });
        }
        if b < a {
            return Some(PreflightError::NonMonotonic { symbol: symbol.to_string(), tf: tf.to_string(), prev_ts_ms: a, next_ts_ms: b });
        }
        if b - a != expected_gap {
            return Some(PreflightError::Gap {
                symbol: symbol.to_string(),
                tf: tf.to_string(),
                prev_ts_ms: a,
                next_ts_ms: b,
                expected_gap_ms: expected_gap,
                hint: format!("request BarSource::fill(\"{symbol}\", {tf}, {a}, {b}) to backfill the gap"),
            });
        }
    }
    None
}

/// Validates that every exec-role close in `[window_start_ms,
/// window_end_ms]` has a corresponding 1m bar (§4.8 step 4).
fn exec_to_1m_mapping_feasible(
    source: &dyn BarSource,
    symbol: &str,
    exec_tf: Timeframe,
    window_start_ms: i64,
    window_end_ms: i64,
) -> bool {
    let minute_bars = source.fetch(symbol, Timeframe::M1, window_start_ms, window_end_ms + Timeframe::M1.duration_ms());
    let minute_closes: std::collections::HashSet<i64> = minute_bars.iter().map(|b| b.ts_close_ms).collect();
    let mut ts = exec_tf.ceil_to_tf_close(window_start_ms);
    while ts <= window_end_ms {
        let floored = Timeframe::M1.floor_to_tf_close(ts);
        if !minute_closes.contains(&floored) {
            return false;
        }
        ts += exec_tf.duration_ms();
    }
    true
}

/// Runs the full preflight gate for `play` over `[window_start_ms,
/// window_end_ms]` on `symbol`, against `source`. 1m coverage is
/// always checked regardless of the Play's own timeframes (§4.8 step
/// 2: "always mandatory").
pub fn run_preflight(
    play: &LoadedPlay,
    source: &dyn BarSource,
    symbol: &str,
    window_start_ms: i64,
    window_end_ms: i64,
    auto_sync: AutoSync,
) -> PreflightReport {
    let mut per_pair = Vec::new();
    let mut first_failure: Option<PreflightError> = None;

    let mut seen_tfs = std::collections::HashSet::new();
    for role in playcore_model::TfRole::ALL {
        let tf = play.play.tf_mapping.tf_for(role);
        if !seen_tfs.insert(tf) {
            continue;
        }
        let required = RequiredRange { start_ms: required_start_ms(play, role, window_start_ms), end_ms: window_end_ms };
        let (coverage, err) = check_and_heal_pair(source, symbol, tf, required, auto_sync);
        per_pair.push(coverage);
        if let Some(err) = err {
            first_failure.get_or_insert(err);
        } else if let Some(err) = validate_pair_bars(source, symbol, tf, required) {
            first_failure.get_or_insert(err);
        }
    }

    // 1m coverage is mandatory even if no role's own timeframe is 1m;
    // it must reach back across the widest warmup window of any role.
    if !seen_tfs.contains(&Timeframe::M1) {
        let widest_role = playcore_model::TfRole::ALL
            .into_iter()
            .max_by_key(|&r| play.total_skip_bars(r) * play.play.tf_mapping.tf_for(r).duration_ms())
            .unwrap_or(play.play.exec_role);
        let required = RequiredRange { start_ms: required_start_ms(play, widest_role, window_start_ms), end_ms: window_end_ms };
        let (coverage, err) = check_and_heal_pair(source, symbol, Timeframe::M1, required, auto_sync);
        per_pair.push(coverage);
        if let Some(err) = err {
            first_failure.get_or_insert(err);
        } else if let Some(err) = validate_pair_bars(source, symbol, Timeframe::M1, required) {
            first_failure.get_or_insert(err);
        }
    }

    let mapping_feasible = first_failure.is_none()
        && exec_to_1m_mapping_feasible(source, symbol, play.play.exec_tf(), window_start_ms, window_end_ms);

    if first_failure.is_none() && !mapping_feasible {
        first_failure = Some(PreflightError::MappingInfeasible {
            exec_close_ms: window_start_ms,
            hint: format!("1m coverage does not bracket every exec-role ({}) close in the window", play.play.exec_tf()),
        });
    }

    if first_failure.is_none() {
        info!(symbol, window_start_ms, window_end_ms, "preflight pass");
    } else {
        warn!(symbol, ?first_failure, "preflight failed");
    }

    PreflightReport {
        symbol: SmolStr::new(symbol),
        warmup_by_role: play.warmup_bars_by_role.clone(),
        delay_by_role: play.delay_bars_by_role.clone(),
        per_pair,
        exec_to_1m_mapping_feasible: mapping_feasible,
        failure: first_failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar_source::FillReport;
    use crate::play_load::load_play;
    use indexmap::indexmap;
    use playcore_model::play::{FeeModel, FundingPolicy, RiskModel, SizingModel, SizingRule, SlippageModel, TfMapping};
    use playcore_model::{Bar, Play, TfRole};
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct MemorySource {
        bars: RefCell<HashMap<(String, Timeframe), Vec<Bar>>>,
    }

    impl MemorySource {
        fn new() -> Self {
            Self { bars: RefCell::new(HashMap::new()) }
        }

        fn seed(&self, symbol: &str, tf: Timeframe, bars: Vec<Bar>) {
            self.bars.borrow_mut().insert((symbol.to_string(), tf), bars);
        }
    }

    impl BarSource for MemorySource {
        fn fetch(&self, symbol: &str, tf: Timeframe, start_ms: i64, end_ms: i64) -> Vec<Bar> {
            self.bars
                .borrow()
                .get(&(symbol.to_string(), tf))
                .map(|bars| bars.iter().filter(|b| b.ts_close_ms >= start_ms && b.ts_close_ms < end_ms).copied().collect())
                .unwrap_or_default()
        }

        fn coverage(&self, symbol: &str, tf: Timeframe) -> Option<(i64, i64)> {
            let map = self.bars.borrow();
            let bars = map.get(&(symbol.to_string(), tf))?;
            let min = bars.iter().map(|b| b.ts_close_ms).min()?;
            let max = bars.iter().map(|b| b.ts_close_ms).max()?;
            Some((min, max))
        }

        fn fill(&self, _symbol: &str, _tf: Timeframe, _start_ms: i64, _end_ms: i64) -> Option<FillReport> {
            None
        }
    }

    fn minimal_play() -> Play {
        Play {
            id: "p".into(),
            symbol_universe: vec!["BTCUSDT".into()],
            tf_mapping: TfMapping { low_tf: Timeframe::M1, med_tf: Timeframe::M15, high_tf: Timeframe::H1 },
            exec_role: TfRole::LowTf,
            feature_specs: indexmap! {},
            structure_specs: indexmap! {},
            actions: indexmap! {},
            risk_model: RiskModel {
                sizing: SizingRule { model: SizingModel::PercentEquity, value: 0.1 },
                stop_loss: None,
                take_profit: None,
                max_leverage: 1.0,
                initial_equity: 1000.0,
                fees: FeeModel { taker_bps: 0.0, maker_bps: 0.0 },
                slippage: SlippageModel { bps: 0.0 },
                funding_interval_hours: 8.0,
                funding: FundingPolicy::Disabled,
                min_trade_notional_usdt: 10.0,
                max_drawdown_stop_pct: None,
                equity_floor: None,
            },
            warmup_bars_by_role: None,
            delay_bars_by_role: None,
        }
    }

    fn one_minute_bars(n: i64, start_ms: i64) -> Vec<Bar> {
        (0..n).map(|i| Bar::new(start_ms + (i + 1) * 60_000, 1.0, 1.0, 1.0, 1.0, 1.0)).collect()
    }

    #[test]
    fn missing_1m_coverage_fails_with_missing_data() {
        let play = load_play(minimal_play()).unwrap();
        let source = MemorySource::new();
        // No bars seeded at all.
        let report = run_preflight(&play, &source, "BTCUSDT", 0, 600_000, AutoSync::default());
        assert!(!report.is_pass());
        assert!(matches!(report.failure, Some(PreflightError::MissingData { .. })));
    }

    #[test]
    fn full_coverage_with_clean_bars_passes() {
        let play = load_play(minimal_play()).unwrap();
        let source = MemorySource::new();
        source.seed("BTCUSDT", Timeframe::M1, one_minute_bars(40, -600_000));
        let report = run_preflight(&play, &source, "BTCUSDT", 0, 600_000, AutoSync::default());
        assert!(report.is_pass(), "{:?}", report.failure);
    }

    #[test]
    fn gap_in_1m_bars_is_detected() {
        let play = load_play(minimal_play()).unwrap();
        let source = MemorySource::new();
        let mut bars = one_minute_bars(40, -600_000);
        bars.remove(20);
        source.seed("BTCUSDT", Timeframe::M1, bars);
        let report = run_preflight(&play, &source, "BTCUSDT", 0, 600_000, AutoSync::default());
        assert!(!report.is_pass());
    }

    #[test]
    fn auto_sync_heals_via_fill_when_available() {
        struct HealingSource {
            inner: MemorySource,
            filled: RefCell<bool>,
        }
        impl BarSource for HealingSource {
            fn fetch(&self, symbol: &str, tf: Timeframe, start_ms: i64, end_ms: i64) -> Vec<Bar> {
                self.inner.fetch(symbol, tf, start_ms, end_ms)
            }
            fn coverage(&self, symbol: &str, tf: Timeframe) -> Option<(i64, i64)> {
                self.inner.coverage(symbol, tf)
            }
            fn fill(&self, symbol: &str, tf: Timeframe, _start_ms: i64, _end_ms: i64) -> Option<FillReport> {
                if !*self.filled.borrow() {
                    *self.filled.borrow_mut() = true;
                    self.inner.seed(symbol, tf, one_minute_bars(40, -600_000));
                    Some(FillReport { bars_written: 40 })
                } else {
                    None
                }
            }
        }
        let play = load_play(minimal_play()).unwrap();
        let source = HealingSource { inner: MemorySource::new(), filled: RefCell::new(false) };
        let report = run_preflight(&play, &source, "BTCUSDT", 0, 600_000, AutoSync { enabled: true, max_attempts: 3 });
        assert!(report.is_pass(), "{:?}", report.failure);
    }
}
