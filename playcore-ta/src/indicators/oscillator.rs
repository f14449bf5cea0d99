use super::{Indicator, RollingStats};
use playcore_model::Bar;
use std::collections::VecDeque;

/// Wilder's relative strength index.
#[derive(Debug, Clone)]
pub struct Rsi {
    length: usize,
    prev_close: Option<f64>,
    avg_gain: f64,
    avg_loss: f64,
    bars_seen: usize,
}

impl Rsi {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), prev_close: None, avg_gain: 0.0, avg_loss: 0.0, bars_seen: 0 }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < self.length + 1 {
            return f64::NAN;
        }
        if self.avg_loss == 0.0 {
            return 100.0;
        }
        let rs = self.avg_gain / self.avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl Indicator for Rsi {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        let Some(prev) = self.prev_close else {
            self.prev_close = Some(bar.close);
            return;
        };
        let change = bar.close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let n = self.length as f64;
        if self.bars_seen <= self.length + 1 {
            self.avg_gain += gain / n;
            self.avg_loss += loss / n;
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }
        self.prev_close = Some(bar.close);
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Commodity channel index: `(typical - sma(typical)) / (0.015 * mean_deviation)`.
#[derive(Debug, Clone)]
pub struct Cci {
    length: usize,
    stats: RollingStats,
}

impl Cci {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), stats: RollingStats::new(length.max(1)) }
    }

    pub fn value(&self) -> f64 {
        if !self.stats.is_full() {
            return f64::NAN;
        }
        let mean = self.stats.mean();
        let mean_dev = self.stats.iter().map(|v| (v - mean).abs()).sum::<f64>() / self.stats.len() as f64;
        if mean_dev == 0.0 {
            return 0.0;
        }
        let typical = *self.stats.iter().last().unwrap();
        (typical - mean) / (0.015 * mean_dev)
    }
}

impl Indicator for Cci {
    fn update(&mut self, bar: &Bar) {
        self.stats.push(bar.field(playcore_model::PriceField::Hlc3));
        let _ = self.length;
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Williams %R: `(highest_high - close) / (highest_high - lowest_low) * -100`.
#[derive(Debug, Clone)]
pub struct WillR {
    length: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    last_close: f64,
}

impl WillR {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), highs: VecDeque::new(), lows: VecDeque::new(), last_close: f64::NAN }
    }

    pub fn value(&self) -> f64 {
        if self.highs.len() < self.length {
            return f64::NAN;
        }
        let hh = self.highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ll = self.lows.iter().copied().fold(f64::INFINITY, f64::min);
        if hh == ll {
            return 0.0;
        }
        (hh - self.last_close) / (hh - ll) * -100.0
    }
}

impl Indicator for WillR {
    fn update(&mut self, bar: &Bar) {
        self.highs.push_back(bar.high);
        self.lows.push_back(bar.low);
        if self.highs.len() > self.length {
            self.highs.pop_front();
            self.lows.pop_front();
        }
        self.last_close = bar.close;
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Chande momentum oscillator: `100 * (sum_gains - sum_losses) / (sum_gains + sum_losses)`.
#[derive(Debug, Clone)]
pub struct Cmo {
    length: usize,
    prev_close: Option<f64>,
    gains: VecDeque<f64>,
    losses: VecDeque<f64>,
    bars_seen: usize,
}

impl Cmo {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), prev_close: None, gains: VecDeque::new(), losses: VecDeque::new(), bars_seen: 0 }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < self.length + 1 {
            return f64::NAN;
        }
        let sum_gain: f64 = self.gains.iter().sum();
        let sum_loss: f64 = self.losses.iter().sum();
        if sum_gain + sum_loss == 0.0 {
            return 0.0;
        }
        100.0 * (sum_gain - sum_loss) / (sum_gain + sum_loss)
    }
}

impl Indicator for Cmo {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        if let Some(prev) = self.prev_close {
            let change = bar.close - prev;
            self.gains.push_back(change.max(0.0));
            self.losses.push_back((-change).max(0.0));
            if self.gains.len() > self.length {
                self.gains.pop_front();
                self.losses.pop_front();
            }
        }
        self.prev_close = Some(bar.close);
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Momentum: `close - close[length bars ago]`.
#[derive(Debug, Clone)]
pub struct Mom {
    length: usize,
    window: VecDeque<f64>,
}

impl Mom {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), window: VecDeque::with_capacity(length + 1) }
    }

    pub fn value(&self) -> f64 {
        if self.window.len() <= self.length {
            return f64::NAN;
        }
        self.window.back().unwrap() - self.window.front().unwrap()
    }
}

impl Indicator for Mom {
    fn update(&mut self, bar: &Bar) {
        self.window.push_back(bar.close);
        if self.window.len() > self.length + 1 {
            self.window.pop_front();
        }
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Rate of change: `(close - close[length bars ago]) / close[length bars ago] * 100`.
#[derive(Debug, Clone)]
pub struct Roc {
    mom: Mom,
}

impl Roc {
    pub fn new(length: usize) -> Self {
        Self { mom: Mom::new(length) }
    }

    pub fn value(&self) -> f64 {
        let window = &self.mom.window;
        if window.len() <= self.mom.length {
            return f64::NAN;
        }
        let base = *window.front().unwrap();
        if base == 0.0 {
            return f64::NAN;
        }
        self.mom.value() / base * 100.0
    }
}

impl Indicator for Roc {
    fn update(&mut self, bar: &Bar) {
        self.mom.update(bar);
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Ultimate oscillator over three weighted periods (short, medium, long).
#[derive(Debug, Clone)]
pub struct Uo {
    short: usize,
    medium: usize,
    long: usize,
    bp: VecDeque<f64>,
    tr: VecDeque<f64>,
    prev_close: Option<f64>,
    bars_seen: usize,
}

impl Uo {
    pub fn new(short: usize, medium: usize, long: usize) -> Self {
        let long = long.max(medium).max(short).max(1);
        Self { short: short.max(1), medium: medium.max(1), long, bp: VecDeque::new(), tr: VecDeque::new(), prev_close: None, bars_seen: 0 }
    }

    fn avg(window: &VecDeque<(f64, f64)>, n: usize) -> f64 {
        let len = window.len().min(n);
        if len == 0 {
            return f64::NAN;
        }
        let (bp_sum, tr_sum): (f64, f64) =
            window.iter().rev().take(len).fold((0.0, 0.0), |(bp, tr), (b, t)| (bp + b, tr + t));
        if tr_sum == 0.0 { 0.0 } else { bp_sum / tr_sum }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < self.long + 1 {
            return f64::NAN;
        }
        let combined: VecDeque<(f64, f64)> = self.bp.iter().copied().zip(self.tr.iter().copied()).collect();
        let avg_short = Self::avg(&combined, self.short);
        let avg_medium = Self::avg(&combined, self.medium);
        let avg_long = Self::avg(&combined, self.long);
        100.0 * (4.0 * avg_short + 2.0 * avg_medium + avg_long) / 7.0
    }
}

impl Indicator for Uo {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        let prev_close = self.prev_close.unwrap_or(bar.close);
        let true_low = bar.low.min(prev_close);
        let true_high = bar.high.max(prev_close);
        let buying_pressure = bar.close - true_low;
        let true_range = true_high - true_low;
        self.bp.push_back(buying_pressure);
        self.tr.push_back(true_range);
        if self.bp.len() > self.long {
            self.bp.pop_front();
            self.tr.pop_front();
        }
        self.prev_close = Some(bar.close);
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Money flow index: RSI-like oscillator computed on volume-weighted
/// typical price flows.
#[derive(Debug, Clone)]
pub struct Mfi {
    length: usize,
    prev_typical: Option<f64>,
    pos_flow: VecDeque<f64>,
    neg_flow: VecDeque<f64>,
    bars_seen: usize,
}

impl Mfi {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), prev_typical: None, pos_flow: VecDeque::new(), neg_flow: VecDeque::new(), bars_seen: 0 }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < self.length + 1 {
            return f64::NAN;
        }
        let pos: f64 = self.pos_flow.iter().sum();
        let neg: f64 = self.neg_flow.iter().sum();
        if neg == 0.0 {
            return 100.0;
        }
        let ratio = pos / neg;
        100.0 - 100.0 / (1.0 + ratio)
    }
}

impl Indicator for Mfi {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        let typical = bar.field(playcore_model::PriceField::Hlc3);
        let raw_flow = typical * bar.volume;
        if let Some(prev) = self.prev_typical {
            if typical > prev {
                self.pos_flow.push_back(raw_flow);
                self.neg_flow.push_back(0.0);
            } else if typical < prev {
                self.pos_flow.push_back(0.0);
                self.neg_flow.push_back(raw_flow);
            } else {
                self.pos_flow.push_back(0.0);
                self.neg_flow.push_back(0.0);
            }
            if self.pos_flow.len() > self.length {
                self.pos_flow.pop_front();
                self.neg_flow.pop_front();
            }
        }
        self.prev_typical = Some(typical);
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar::new(ts, o, h, l, c, 100.0)
    }

    #[test]
    fn rsi_is_100_when_no_losses() {
        let mut rsi = Rsi::new(3);
        for i in 0..10 {
            rsi.update(&bar(i, 1.0, 1.0, 1.0, 1.0 + i as f64));
        }
        assert!((rsi.value() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn willr_is_zero_range_safe() {
        let mut willr = WillR::new(3);
        for i in 0..5 {
            willr.update(&bar(i, 5.0, 5.0, 5.0, 5.0));
        }
        assert_eq!(willr.value(), 0.0);
    }

    #[test]
    fn mom_measures_displacement_over_window() {
        let mut mom = Mom::new(2);
        for (i, c) in [10.0, 10.0, 15.0].iter().enumerate() {
            mom.update(&bar(i as i64, *c, *c, *c, *c));
        }
        assert!((mom.value() - 5.0).abs() < 1e-9);
    }
}
