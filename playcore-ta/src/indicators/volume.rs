use super::Indicator;
use playcore_model::{Bar, PriceField};
use std::collections::VecDeque;

/// On-balance volume: a running sum of signed volume.
#[derive(Debug, Clone)]
pub struct Obv {
    prev_close: Option<f64>,
    value: f64,
}

impl Obv {
    pub fn new() -> Self {
        Self { prev_close: None, value: 0.0 }
    }

    pub fn value(&self) -> f64 {
        if self.prev_close.is_none() { f64::NAN } else { self.value }
    }
}

impl Default for Obv {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Obv {
    fn update(&mut self, bar: &Bar) {
        if let Some(prev) = self.prev_close {
            if bar.close > prev {
                self.value += bar.volume;
            } else if bar.close < prev {
                self.value -= bar.volume;
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

/// Chaikin money flow: volume-weighted accumulation/distribution over
/// a rolling window.
#[derive(Debug, Clone)]
pub struct Cmf {
    length: usize,
    mfv: VecDeque<f64>,
    vol: VecDeque<f64>,
}

impl Cmf {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), mfv: VecDeque::new(), vol: VecDeque::new() }
    }

    pub fn value(&self) -> f64 {
        if self.mfv.len() < self.length {
            return f64::NAN;
        }
        let vol_sum: f64 = self.vol.iter().sum();
        if vol_sum == 0.0 {
            return 0.0;
        }
        self.mfv.iter().sum::<f64>() / vol_sum
    }
}

impl Indicator for Cmf {
    fn update(&mut self, bar: &Bar) {
        let range = bar.high - bar.low;
        let mf_multiplier = if range == 0.0 { 0.0 } else { ((bar.close - bar.low) - (bar.high - bar.close)) / range };
        self.mfv.push_back(mf_multiplier * bar.volume);
        self.vol.push_back(bar.volume);
        if self.mfv.len() > self.length {
            self.mfv.pop_front();
            self.vol.pop_front();
        }
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Volume-weighted average price, accumulated from the start of the
/// indicator's life (callers reset per session/window as needed).
#[derive(Debug, Clone, Default)]
pub struct Vwap {
    cum_pv: f64,
    cum_vol: f64,
}

impl Vwap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> f64 {
        if self.cum_vol == 0.0 { f64::NAN } else { self.cum_pv / self.cum_vol }
    }
}

impl Indicator for Vwap {
    fn update(&mut self, bar: &Bar) {
        let typical = bar.field(PriceField::Hlc3);
        self.cum_pv += typical * bar.volume;
        self.cum_vol += bar.volume;
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

    fn bar(ts: i64, h: f64, l: f64, c: f64, v: f64) -> Bar {
        Bar::new(ts, c, h, l, c, v)
    }

    #[test]
    fn obv_accumulates_signed_volume() {
        let mut obv = Obv::new();
        obv.update(&bar(0, 10.0, 9.0, 9.5, 100.0));
        obv.update(&bar(1, 11.0, 10.0, 10.5, 50.0));
        obv.update(&bar(2, 10.0, 9.0, 9.0, 30.0));
        assert!((obv.value() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn vwap_is_price_when_constant() {
        let mut vwap = Vwap::new();
        for i in 0..5 {
            vwap.update(&bar(i, 10.0, 10.0, 10.0, 25.0));
        }
        assert!((vwap.value() - 10.0).abs() < 1e-9);
    }
}
