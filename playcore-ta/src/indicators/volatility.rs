use super::{Indicator, RollingStats};
use playcore_model::Bar;

/// Wilder's average true range.
#[derive(Debug, Clone)]
pub struct Atr {
    length: usize,
    prev_close: Option<f64>,
    value: f64,
    bars_seen: usize,
}

impl Atr {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), prev_close: None, value: 0.0, bars_seen: 0 }
    }

    fn true_range(&self, bar: &Bar) -> f64 {
        match self.prev_close {
            Some(prev) => (bar.high - bar.low).max((bar.high - prev).abs()).max((bar.low - prev).abs()),
            None => bar.high - bar.low,
        }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < self.length + 1 { f64::NAN } else { self.value }
    }
}

impl Indicator for Atr {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        let tr = self.true_range(bar);
        let n = self.length as f64;
        self.value = if self.bars_seen <= self.length + 1 {
            // seed with a simple average over the first `length` true ranges
            (self.value * (self.bars_seen - 1) as f64 + tr) / self.bars_seen as f64
        } else {
            (self.value * (n - 1.0) + tr) / n
        };
        self.prev_close = Some(bar.close);
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// ATR normalized by close, expressed as a percentage.
#[derive(Debug, Clone)]
pub struct Natr {
    atr: Atr,
    last_close: f64,
}

impl Natr {
    pub fn new(length: usize) -> Self {
        Self { atr: Atr::new(length), last_close: f64::NAN }
    }

    pub fn value(&self) -> f64 {
        let atr_value = self.atr.value();
        if atr_value.is_nan() || self.last_close == 0.0 {
            return f64::NAN;
        }
        atr_value / self.last_close * 100.0
    }
}

impl Indicator for Natr {
    fn update(&mut self, bar: &Bar) {
        self.atr.update(bar);
        self.last_close = bar.close;
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Bollinger bands: SMA middle band, `stddev` * standard deviations
/// for the upper/lower bands.
#[derive(Debug, Clone)]
pub struct BBands {
    length: usize,
    stddev: f64,
    stats: RollingStats,
}

impl BBands {
    pub fn new(length: usize, stddev: f64) -> Self {
        Self { length: length.max(1), stddev, stats: RollingStats::new(length.max(1)) }
    }

    pub fn middle(&self) -> f64 {
        if self.stats.is_full() { self.stats.mean() } else { f64::NAN }
    }

    pub fn upper(&self) -> f64 {
        if self.stats.is_full() { self.stats.mean() + self.stddev * self.stats.stddev() } else { f64::NAN }
    }

    pub fn lower(&self) -> f64 {
        if self.stats.is_full() { self.stats.mean() - self.stddev * self.stats.stddev() } else { f64::NAN }
    }
}

impl Indicator for BBands {
    fn update(&mut self, bar: &Bar) {
        self.stats.push(bar.close);
        let _ = self.length;
    }

    fn get(&self, output: &str) -> Option<f64> {
        match output {
            "upper" => Some(self.upper()),
            "middle" => Some(self.middle()),
            "lower" => Some(self.lower()),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["upper", "middle", "lower"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, h: f64, l: f64, c: f64) -> Bar {
        Bar::new(ts, c, h, l, c, 1.0)
    }

    #[test]
    fn atr_is_nonnegative_once_warm() {
        let mut atr = Atr::new(3);
        for i in 0..10 {
            atr.update(&bar(i, 10.0 + i as f64 * 0.1, 9.0, 9.5 + i as f64 * 0.1));
        }
        assert!(atr.value() >= 0.0);
    }

    #[test]
    fn bbands_middle_equals_mean() {
        let mut bb = BBands::new(3, 2.0);
        for (i, c) in [1.0, 2.0, 3.0].iter().enumerate() {
            bb.update(&bar(i as i64, *c, *c, *c));
        }
        assert!((bb.middle() - 2.0).abs() < 1e-9);
        assert!(bb.upper() > bb.middle());
        assert!(bb.lower() < bb.middle());
    }
}
