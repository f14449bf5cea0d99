use super::Indicator;
use playcore_model::{Bar, PriceField};
use std::collections::VecDeque;

/// Linear regression value: the endpoint of a least-squares line fit
/// over the trailing window, i.e. "where the trendline currently sits".
#[derive(Debug, Clone)]
pub struct LinReg {
    length: usize,
    window: VecDeque<f64>,
}

impl LinReg {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(2), window: VecDeque::with_capacity(length.max(2)) }
    }

    pub fn value(&self) -> f64 {
        if self.window.len() < self.length {
            return f64::NAN;
        }
        let n = self.length as f64;
        let xs: Vec<f64> = (0..self.length).map(|i| i as f64).collect();
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = self.window.iter().sum::<f64>() / n;
        let mut num = 0.0;
        let mut den = 0.0;
        for (x, y) in xs.iter().zip(self.window.iter()) {
            num += (x - x_mean) * (y - y_mean);
            den += (x - x_mean).powi(2);
        }
        let slope = if den == 0.0 { 0.0 } else { num / den };
        let intercept = y_mean - slope * x_mean;
        intercept + slope * (n - 1.0)
    }
}

impl Indicator for LinReg {
    fn update(&mut self, bar: &Bar) {
        self.window.push_back(bar.close);
        if self.window.len() > self.length {
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

/// Midpoint of the trailing high/low range.
#[derive(Debug, Clone)]
pub struct MidPrice {
    length: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
}

impl MidPrice {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), highs: VecDeque::new(), lows: VecDeque::new() }
    }

    pub fn value(&self) -> f64 {
        if self.highs.len() < self.length {
            return f64::NAN;
        }
        let hh = self.highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ll = self.lows.iter().copied().fold(f64::INFINITY, f64::min);
        (hh + ll) / 2.0
    }
}

impl Indicator for MidPrice {
    fn update(&mut self, bar: &Bar) {
        self.highs.push_back(bar.high);
        self.lows.push_back(bar.low);
        if self.highs.len() > self.length {
            self.highs.pop_front();
            self.lows.pop_front();
        }
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Simple average of open/high/low/close for the current bar. No
/// warmup: ready on the first bar.
#[derive(Debug, Clone, Default)]
pub struct Ohlc4 {
    value: f64,
    ready: bool,
}

impl Ohlc4 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> f64 {
        if self.ready { self.value } else { f64::NAN }
    }
}

impl Indicator for Ohlc4 {
    fn update(&mut self, bar: &Bar) {
        self.value = bar.field(PriceField::Ohlc4);
        self.ready = true;
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
        Bar::new(ts, o, h, l, c, 1.0)
    }

    #[test]
    fn linreg_tracks_a_straight_line() {
        let mut lr = LinReg::new(5);
        for i in 0..5 {
            let c = 10.0 + i as f64;
            lr.update(&bar(i, c, c, c, c));
        }
        assert!((lr.value() - 14.0).abs() < 1e-6);
    }

    #[test]
    fn midprice_is_average_of_range_extremes() {
        let mut mp = MidPrice::new(3);
        mp.update(&bar(0, 10.0, 12.0, 8.0, 10.0));
        mp.update(&bar(1, 10.0, 11.0, 9.0, 10.0));
        mp.update(&bar(2, 10.0, 13.0, 7.0, 10.0));
        assert!((mp.value() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn ohlc4_is_ready_immediately() {
        let mut o = Ohlc4::new();
        o.update(&bar(0, 1.0, 2.0, 0.0, 1.0));
        assert!((o.value() - 1.0).abs() < 1e-9);
    }
}
