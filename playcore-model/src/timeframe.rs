use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed set of candle durations the runtime understands.
///
/// All arithmetic over [`Timeframe`] is integer milliseconds; floating
/// point is never used for timestamps.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H12,
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 11] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H12,
        Timeframe::D1,
    ];

    /// Duration of this timeframe in milliseconds.
    pub const fn duration_ms(self) -> i64 {
        match self {
            Timeframe::M1 => 60_000,
            Timeframe::M3 => 3 * 60_000,
            Timeframe::M5 => 5 * 60_000,
            Timeframe::M15 => 15 * 60_000,
            Timeframe::M30 => 30 * 60_000,
            Timeframe::H1 => 60 * 60_000,
            Timeframe::H2 => 2 * 60 * 60_000,
            Timeframe::H4 => 4 * 60 * 60_000,
            Timeframe::H6 => 6 * 60 * 60_000,
            Timeframe::H12 => 12 * 60 * 60_000,
            Timeframe::D1 => 24 * 60 * 60_000,
        }
    }

    /// Number of bars of this timeframe in a 365-day year, used for
    /// annualization in risk/statistic calculations.
    pub const fn bars_per_year(self) -> f64 {
        const YEAR_MS: f64 = 365.0 * 24.0 * 60.0 * 60.0 * 1000.0;
        YEAR_MS / (self.duration_ms() as f64)
    }

    /// The nearest timeframe-close at or after `ts_ms`.
    pub const fn ceil_to_tf_close(self, ts_ms: i64) -> i64 {
        let d = self.duration_ms();
        let rem = ts_ms.rem_euclid(d);
        if rem == 0 { ts_ms } else { ts_ms - rem + d }
    }

    /// The nearest timeframe-close at or before `ts_ms`.
    pub const fn floor_to_tf_close(self, ts_ms: i64) -> i64 {
        let d = self.duration_ms();
        ts_ms - ts_ms.rem_euclid(d)
    }

    /// Whether `ts_ms` lands exactly on one of this timeframe's closes.
    pub const fn is_close(self, ts_ms: i64) -> bool {
        ts_ms.rem_euclid(self.duration_ms()) == 0
    }

    /// Number of whole bars of this timeframe between two aligned
    /// closes, `start` inclusive, `end` exclusive.
    pub const fn bars_between(self, start_ms: i64, end_ms: i64) -> i64 {
        (end_ms - start_ms) / self.duration_ms()
    }

    /// Parse the canonical short-form string (`"1m"`, `"4h"`, `"1d"`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "1m" => Timeframe::M1,
            "3m" => Timeframe::M3,
            "5m" => Timeframe::M5,
            "15m" => Timeframe::M15,
            "30m" => Timeframe::M30,
            "1h" => Timeframe::H1,
            "2h" => Timeframe::H2,
            "4h" => Timeframe::H4,
            "6h" => Timeframe::H6,
            "12h" => Timeframe::H12,
            "1d" => Timeframe::D1,
            _ => return None,
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_ms_matches_known_values() {
        assert_eq!(Timeframe::M1.duration_ms(), 60_000);
        assert_eq!(Timeframe::H1.duration_ms(), 3_600_000);
        assert_eq!(Timeframe::D1.duration_ms(), 86_400_000);
    }

    #[test]
    fn ceil_and_floor_agree_on_aligned_timestamp() {
        let ts = Timeframe::H1.duration_ms() * 7;
        assert_eq!(Timeframe::H1.ceil_to_tf_close(ts), ts);
        assert_eq!(Timeframe::H1.floor_to_tf_close(ts), ts);
    }

    #[test]
    fn ceil_rounds_up_and_floor_rounds_down() {
        let d = Timeframe::M5.duration_ms();
        let ts = d * 3 + 17;
        assert_eq!(Timeframe::M5.floor_to_tf_close(ts), d * 3);
        assert_eq!(Timeframe::M5.ceil_to_tf_close(ts), d * 4);
    }

    #[test]
    fn bars_between_counts_whole_bars() {
        let d = Timeframe::M15.duration_ms();
        assert_eq!(Timeframe::M15.bars_between(0, d * 10), 10);
    }

    #[test]
    fn parse_round_trips_through_as_str() {
        for tf in Timeframe::ALL {
            assert_eq!(Timeframe::parse(tf.as_str()), Some(tf));
        }
    }
}
