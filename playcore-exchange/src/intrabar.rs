//! The deterministic intrabar price path a 1m bar is walked along to
//! detect stop-loss/take-profit/liquidation touches (§4.9, §9).
//!
//! Real exchanges have no single canonical order in which a bar's low
//! and high occurred; the simulator codifies a reproducible rule
//! instead of guessing: a bar that closed at or above its open is
//! walked low-then-high (assumed to have dipped before rallying into
//! its close), a bar that closed below its open is walked
//! high-then-low. Identical inputs always produce the identical
//! traversal, which is what determinism (§8) requires — not that the
//! rule matches any particular real exchange's microstructure.
use playcore_model::Bar;

pub const TIE_BREAK_POLICY: &str = "low_first_or_high_first_by_bar_direction";

/// The ordered sequence of prices to evaluate stop/TP/liquidation
/// touches against for one closed 1m bar: open, then the two extremes
/// in direction-dependent order, then close.
pub fn intrabar_path(bar: &Bar) -> [f64; 4] {
    if bar.close >= bar.open {
        [bar.open, bar.low, bar.high, bar.close]
    } else {
        [bar.open, bar.high, bar.low, bar.close]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullish_bar_visits_low_before_high() {
        let bar = Bar::new(0, 10.0, 15.0, 8.0, 12.0, 1.0);
        assert_eq!(intrabar_path(&bar), [10.0, 8.0, 15.0, 12.0]);
    }

    #[test]
    fn bearish_bar_visits_high_before_low() {
        let bar = Bar::new(0, 12.0, 15.0, 8.0, 10.0, 1.0);
        assert_eq!(intrabar_path(&bar), [12.0, 15.0, 8.0, 10.0]);
    }

    #[test]
    fn doji_bar_with_equal_open_close_treated_as_bullish() {
        let bar = Bar::new(0, 10.0, 11.0, 9.0, 10.0, 1.0);
        assert_eq!(intrabar_path(&bar), [10.0, 9.0, 11.0, 10.0]);
    }
}
