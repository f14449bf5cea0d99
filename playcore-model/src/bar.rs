use crate::error::LoadError;
use serde::{Deserialize, Serialize};

/// An immutable, closed-candle OHLCV aggregate.
///
/// `ts_close_ms` is the UTC millisecond timestamp of the bar's close,
/// aligned to an integer multiple of its timeframe's duration. A
/// [`Bar`] is only ever constructed for a candle that has already
/// closed; the core never sees a partially-formed bar.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct Bar {
    pub ts_close_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Price fields a [`Bar`] exposes; used by indicators to declare their
/// required inputs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
    /// `(high + low + close) / 3`
    Hlc3,
    /// `(open + high + low + close) / 4`
    Ohlc4,
}

impl Bar {
    pub fn new(ts_close_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self { ts_close_ms, open, high, low, close, volume }
    }

    /// Validate the single-bar invariant:
    /// `low <= min(open, close) <= max(open, close) <= high`.
    pub fn validate(&self) -> Result<(), LoadError> {
        let lo = self.open.min(self.close);
        let hi = self.open.max(self.close);
        if !(self.low <= lo && lo <= hi && hi <= self.high) {
            return Err(LoadError::InvalidBar {
                ts_close_ms: self.ts_close_ms,
                reason: format!(
                    "low={} open={} high={} close={} violate low<=min(o,c)<=max(o,c)<=high",
                    self.low, self.open, self.high, self.close
                ),
            });
        }
        if self.volume < 0.0 {
            return Err(LoadError::InvalidBar {
                ts_close_ms: self.ts_close_ms,
                reason: format!("negative volume {}", self.volume),
            });
        }
        Ok(())
    }

    pub fn field(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::Volume => self.volume,
            PriceField::Hlc3 => (self.high + self.low + self.close) / 3.0,
            PriceField::Ohlc4 => (self.open + self.high + self.low + self.close) / 4.0,
        }
    }
}

/// Validates a strictly-increasing, evenly-spaced sequence of closed
/// bars for a single `(symbol, tf)` pair: monotonic timestamps, no
/// duplicates, and a constant gap equal to the timeframe's duration.
pub fn validate_sequence(bars: &[Bar], tf_duration_ms: i64) -> Result<(), LoadError> {
    for bar in bars {
        bar.validate()?;
    }
    for pair in bars.windows(2) {
        let (a, b) = (pair[0].ts_close_ms, pair[1].ts_close_ms);
        if b <= a {
            return Err(LoadError::NonMonotonicBars { prev_ts_ms: a, next_ts_ms: b });
        }
        if b - a != tf_duration_ms {
            return Err(LoadError::BarGap {
                prev_ts_ms: a,
                next_ts_ms: b,
                expected_gap_ms: tf_duration_ms,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar::new(ts, o, h, l, c, 1.0)
    }

    #[test]
    fn valid_bar_passes() {
        assert!(bar(1000, 10.0, 12.0, 9.0, 11.0).validate().is_ok());
    }

    #[test]
    fn high_below_close_is_rejected() {
        assert!(bar(1000, 10.0, 10.5, 9.0, 11.0).validate().is_err());
    }

    #[test]
    fn low_above_open_is_rejected() {
        assert!(bar(1000, 10.0, 12.0, 10.5, 11.0).validate().is_err());
    }

    #[test]
    fn sequence_detects_gap() {
        let bars = vec![bar(0, 1.0, 1.0, 1.0, 1.0), bar(120_000, 1.0, 1.0, 1.0, 1.0)];
        assert!(validate_sequence(&bars, 60_000).is_err());
    }

    #[test]
    fn sequence_detects_non_monotonic() {
        let bars = vec![bar(60_000, 1.0, 1.0, 1.0, 1.0), bar(60_000, 1.0, 1.0, 1.0, 1.0)];
        assert!(validate_sequence(&bars, 60_000).is_err());
    }

    #[test]
    fn sequence_accepts_clean_run() {
        let bars: Vec<Bar> = (0..5).map(|i| bar(i * 60_000, 1.0, 1.0, 1.0, 1.0)).collect();
        assert!(validate_sequence(&bars, 60_000).is_ok());
    }
}
