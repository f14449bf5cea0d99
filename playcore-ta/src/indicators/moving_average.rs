use super::Indicator;
use playcore_model::Bar;
use std::collections::VecDeque;

/// Simple moving average.
#[derive(Debug, Clone)]
pub struct Sma {
    length: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), window: VecDeque::with_capacity(length), sum: 0.0 }
    }

    pub fn value(&self) -> f64 {
        if self.window.len() < self.length { f64::NAN } else { self.sum / self.length as f64 }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Indicator for Sma {
    fn update(&mut self, bar: &Bar) {
        self.window.push_back(bar.close);
        self.sum += bar.close;
        if self.window.len() > self.length {
            self.sum -= self.window.pop_front().unwrap();
        }
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Exponential moving average. Exposed standalone and reused as a
/// building block for dema/tema/macd.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
    bars_seen: usize,
    warmup_bars: usize,
}

impl Ema {
    pub fn new(length: usize) -> Self {
        Self::with_warmup(length, 3 * length.max(1))
    }

    /// Used internally by dema/tema, whose warmup is chained through
    /// multiple EMA stages and must not be individually gated here.
    pub fn with_warmup(length: usize, warmup_bars: usize) -> Self {
        let length = length.max(1);
        Self { alpha: 2.0 / (length as f64 + 1.0), value: None, bars_seen: 0, warmup_bars }
    }

    pub fn update_value(&mut self, price: f64) -> f64 {
        self.bars_seen += 1;
        let next = match self.value {
            Some(prev) => prev + self.alpha * (price - prev),
            None => price,
        };
        self.value = Some(next);
        next
    }

    pub fn raw_value(&self) -> f64 {
        self.value.unwrap_or(f64::NAN)
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < self.warmup_bars { f64::NAN } else { self.raw_value() }
    }
}

impl Indicator for Ema {
    fn update(&mut self, bar: &Bar) {
        self.update_value(bar.close);
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Weighted moving average: weights `1..=length`, heaviest on the
/// most recent bar.
#[derive(Debug, Clone)]
pub struct Wma {
    length: usize,
    window: VecDeque<f64>,
}

impl Wma {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), window: VecDeque::with_capacity(length) }
    }

    pub fn value(&self) -> f64 {
        if self.window.len() < self.length {
            return f64::NAN;
        }
        let denom = (self.length * (self.length + 1) / 2) as f64;
        let numer: f64 = self.window.iter().enumerate().map(|(i, v)| v * (i + 1) as f64).sum();
        numer / denom
    }
}

impl Indicator for Wma {
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

/// Double EMA: `2*ema1 - ema2(ema1)`. Warmup is `4*length`.
#[derive(Debug, Clone)]
pub struct Dema {
    length: usize,
    ema1: Ema,
    ema2: Ema,
    bars_seen: usize,
}

impl Dema {
    pub fn new(length: usize) -> Self {
        let length = length.max(1);
        Self {
            length,
            ema1: Ema::with_warmup(length, 0),
            ema2: Ema::with_warmup(length, 0),
            bars_seen: 0,
        }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < 4 * self.length {
            return f64::NAN;
        }
        2.0 * self.ema1.raw_value() - self.ema2.raw_value()
    }
}

impl Indicator for Dema {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        let e1 = self.ema1.update_value(bar.close);
        self.ema2.update_value(e1);
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Triple EMA: `3*ema1 - 3*ema2 + ema3`. Warmup is `5*length`.
#[derive(Debug, Clone)]
pub struct Tema {
    length: usize,
    ema1: Ema,
    ema2: Ema,
    ema3: Ema,
    bars_seen: usize,
}

impl Tema {
    pub fn new(length: usize) -> Self {
        let length = length.max(1);
        Self {
            length,
            ema1: Ema::with_warmup(length, 0),
            ema2: Ema::with_warmup(length, 0),
            ema3: Ema::with_warmup(length, 0),
            bars_seen: 0,
        }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < 5 * self.length {
            return f64::NAN;
        }
        3.0 * self.ema1.raw_value() - 3.0 * self.ema2.raw_value() + self.ema3.raw_value()
    }
}

impl Indicator for Tema {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        let e1 = self.ema1.update_value(bar.close);
        let e2 = self.ema2.update_value(e1);
        self.ema3.update_value(e2);
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Triangular moving average: an SMA of an SMA.
#[derive(Debug, Clone)]
pub struct Trima {
    length: usize,
    inner: Sma,
    outer: Sma,
    bars_seen: usize,
}

impl Trima {
    pub fn new(length: usize) -> Self {
        let length = length.max(1);
        let half = length.div_ceil(2);
        Self { length, inner: Sma::new(half), outer: Sma::new(half), bars_seen: 0 }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < 3 * self.length { f64::NAN } else { self.outer.value() }
    }
}

impl Indicator for Trima {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        self.inner.update(bar);
        let inner_value = self.inner.value();
        if !inner_value.is_nan() {
            self.outer.update(&Bar { close: inner_value, ..*bar });
        }
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Kaufman's adaptive moving average: smoothing constant scales with
/// the efficiency ratio of trend vs. noise over `length` bars.
#[derive(Debug, Clone)]
pub struct Kama {
    length: usize,
    window: VecDeque<f64>,
    value: Option<f64>,
    bars_seen: usize,
    fast_sc: f64,
    slow_sc: f64,
}

impl Kama {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
            window: VecDeque::with_capacity(length + 1),
            value: None,
            bars_seen: 0,
            fast_sc: 2.0 / 3.0,
            slow_sc: 2.0 / 31.0,
        }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < 3 * self.length { f64::NAN } else { self.value.unwrap_or(f64::NAN) }
    }
}

impl Indicator for Kama {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        self.window.push_back(bar.close);
        if self.window.len() > self.length + 1 {
            self.window.pop_front();
        }

        if self.window.len() <= self.length {
            self.value = Some(bar.close);
            return;
        }

        let change = (bar.close - self.window[0]).abs();
        let volatility: f64 = self.window.iter().zip(self.window.iter().skip(1)).map(|(a, b)| (b - a).abs()).sum();
        let er = if volatility == 0.0 { 0.0 } else { change / volatility };
        let sc = (er * (self.fast_sc - self.slow_sc) + self.slow_sc).powi(2);
        let prev = self.value.unwrap_or(bar.close);
        self.value = Some(prev + sc * (bar.close - prev));
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Zero-lag EMA: an EMA of a "de-lagged" input `2*price - price[length/2 ago]`.
#[derive(Debug, Clone)]
pub struct Zlma {
    lag: usize,
    window: VecDeque<f64>,
    ema: Ema,
    bars_seen: usize,
    length: usize,
}

impl Zlma {
    pub fn new(length: usize) -> Self {
        let length = length.max(1);
        let lag = (length.saturating_sub(1)) / 2;
        Self { lag, window: VecDeque::with_capacity(lag + 1), ema: Ema::with_warmup(length, 0), bars_seen: 0, length }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < 3 * self.length { f64::NAN } else { self.ema.raw_value() }
    }
}

impl Indicator for Zlma {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        self.window.push_back(bar.close);
        if self.window.len() > self.lag + 1 {
            self.window.pop_front();
        }
        let lagged = *self.window.front().unwrap();
        let de_lagged = 2.0 * bar.close - lagged;
        self.ema.update_value(de_lagged);
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Arnaud Legoux moving average: a Gaussian-weighted window centered
/// with offset `0.85` and sharpness `6`, the library's fixed defaults.
#[derive(Debug, Clone)]
pub struct Alma {
    length: usize,
    window: VecDeque<f64>,
    weights: Vec<f64>,
}

impl Alma {
    pub fn new(length: usize) -> Self {
        let length = length.max(1);
        let offset = 0.85;
        let sigma = 6.0;
        let m = offset * (length as f64 - 1.0);
        let s = length as f64 / sigma;
        let weights: Vec<f64> = (0..length).map(|i| (-((i as f64 - m).powi(2)) / (2.0 * s * s)).exp()).collect();
        let norm: f64 = weights.iter().sum();
        let weights = weights.into_iter().map(|w| w / norm).collect();
        Self { length, window: VecDeque::with_capacity(length), weights }
    }

    pub fn value(&self) -> f64 {
        if self.window.len() < self.length {
            return f64::NAN;
        }
        self.window.iter().zip(self.weights.iter()).map(|(v, w)| v * w).sum()
    }
}

impl Indicator for Alma {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn close_bar(ts: i64, close: f64) -> Bar {
        Bar::new(ts, close, close, close, close, 1.0)
    }

    #[test]
    fn sma_warms_up_after_length_bars() {
        let mut sma = Sma::new(3);
        for (i, c) in [1.0, 2.0, 3.0].iter().enumerate() {
            sma.update(&close_bar(i as i64, *c));
        }
        assert!((sma.value() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sma_is_nan_before_warmup() {
        let mut sma = Sma::new(3);
        sma.update(&close_bar(0, 1.0));
        assert!(sma.value().is_nan());
    }

    #[test]
    fn ema_converges_towards_constant_input() {
        let mut ema = Ema::new(5);
        for i in 0..200 {
            ema.update(&close_bar(i, 10.0));
        }
        assert!((ema.value() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn wma_weights_recent_bars_more() {
        let mut wma = Wma::new(3);
        for (i, c) in [1.0, 1.0, 4.0].iter().enumerate() {
            wma.update(&close_bar(i as i64, *c));
        }
        // weights 1,2,3 over values 1,1,4 => (1+2+12)/6 = 2.5
        assert!((wma.value() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn dema_converges_to_constant_input() {
        let mut dema = Dema::new(5);
        for i in 0..400 {
            dema.update(&close_bar(i, 7.0));
        }
        assert!((dema.value() - 7.0).abs() < 1e-6);
    }
}
