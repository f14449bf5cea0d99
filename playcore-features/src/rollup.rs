//! Accumulates the 1m bars between two exec-role closes into one
//! bucket: OHLCV over the window plus any zone-touch interaction flags
//! raised by the engine while walking those 1m bars.

use indexmap::IndexMap;
use playcore_model::Bar;
use playcore_ta::structures::FieldValue;
use smol_str::SmolStr;

#[derive(Debug, Clone)]
pub struct ExecRollupBucket {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    bar_count: i64,
    volume: f64,
    zone_touched: IndexMap<SmolStr, bool>,
}

impl ExecRollupBucket {
    pub fn new() -> Self {
        Self { open: f64::NAN, high: f64::NAN, low: f64::NAN, close: f64::NAN, bar_count: 0, volume: 0.0, zone_touched: IndexMap::new() }
    }

    /// Starts a new accumulation window. Zone-touch keys are kept
    /// (reset to `false`) so a snapshot field path stays resolvable
    /// even on the first bar after a reset.
    pub fn reset(&mut self) {
        self.open = f64::NAN;
        self.high = f64::NAN;
        self.low = f64::NAN;
        self.close = f64::NAN;
        self.bar_count = 0;
        self.volume = 0.0;
        for touched in self.zone_touched.values_mut() {
            *touched = false;
        }
    }

    pub fn push_1m_bar(&mut self, bar: &Bar) {
        if self.bar_count == 0 {
            self.open = bar.open;
            self.high = bar.high;
            self.low = bar.low;
        } else {
            self.high = self.high.max(bar.high);
            self.low = self.low.min(bar.low);
        }
        self.close = bar.close;
        self.volume += bar.volume;
        self.bar_count += 1;
    }

    pub fn mark_zone_touched(&mut self, zone_id: impl Into<SmolStr>) {
        self.zone_touched.insert(zone_id.into(), true);
    }

    pub fn zone_touched(&self, zone_id: &str) -> bool {
        self.zone_touched.get(zone_id).copied().unwrap_or(false)
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn bar_count(&self) -> i64 {
        self.bar_count
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "open" => FieldValue::F64(self.open),
            "high" => FieldValue::F64(self.high),
            "low" => FieldValue::F64(self.low),
            "close" => FieldValue::F64(self.close),
            "bar_count" => FieldValue::I64(self.bar_count),
            "volume" => FieldValue::F64(self.volume),
            _ => {
                let zone_id = name.strip_prefix("touched_")?;
                FieldValue::Bool(self.zone_touched(zone_id))
            }
        })
    }
}

impl Default for ExecRollupBucket {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(o: f64, h: f64, l: f64, c: f64, v: f64) -> Bar {
        Bar::new(0, o, h, l, c, v)
    }

    #[test]
    fn accumulates_ohlcv_across_pushed_bars() {
        let mut bucket = ExecRollupBucket::new();
        bucket.push_1m_bar(&bar(10.0, 12.0, 9.0, 11.0, 5.0));
        bucket.push_1m_bar(&bar(11.0, 13.0, 10.5, 12.0, 3.0));
        assert_eq!(bucket.open(), 10.0);
        assert_eq!(bucket.high(), 13.0);
        assert_eq!(bucket.low(), 9.0);
        assert_eq!(bucket.close(), 12.0);
        assert_eq!(bucket.bar_count(), 2);
        assert_eq!(bucket.volume(), 8.0);
    }

    #[test]
    fn reset_clears_ohlcv_but_keeps_zone_keys() {
        let mut bucket = ExecRollupBucket::new();
        bucket.mark_zone_touched("demand_zone");
        bucket.push_1m_bar(&bar(1.0, 1.0, 1.0, 1.0, 1.0));
        bucket.reset();
        assert!(bucket.open().is_nan());
        assert_eq!(bucket.bar_count(), 0);
        assert!(!bucket.zone_touched("demand_zone"));
    }
}
