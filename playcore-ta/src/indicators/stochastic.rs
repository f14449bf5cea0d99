use super::moving_average::Sma;
use super::Indicator;
use playcore_model::Bar;
use std::collections::VecDeque;

/// Stochastic oscillator: `%K` over a high/low lookback, `%D` the
/// smoothed `%K`, with an optional `%K` smoothing pass of its own.
#[derive(Debug, Clone)]
pub struct Stoch {
    k_length: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    raw_k: VecDeque<f64>,
    smooth_k: usize,
    smooth_d: Sma,
    last_k: f64,
    bars_seen: usize,
}

impl Stoch {
    pub fn new(k_length: usize, smooth_k: usize, smooth_d: usize) -> Self {
        Self {
            k_length: k_length.max(1),
            highs: VecDeque::new(),
            lows: VecDeque::new(),
            raw_k: VecDeque::new(),
            smooth_k: smooth_k.max(1),
            smooth_d: Sma::new(smooth_d.max(1)),
            last_k: f64::NAN,
            bars_seen: 0,
        }
    }

    fn warmup_bars(&self) -> usize {
        self.k_length + self.smooth_k + self.smooth_d.length()
    }

    pub fn k_value(&self) -> f64 {
        if self.bars_seen < self.warmup_bars() { f64::NAN } else { self.last_k }
    }

    pub fn d_value(&self) -> f64 {
        if self.bars_seen < self.warmup_bars() { f64::NAN } else { self.smooth_d.value() }
    }
}

impl Indicator for Stoch {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        self.highs.push_back(bar.high);
        self.lows.push_back(bar.low);
        if self.highs.len() > self.k_length {
            self.highs.pop_front();
            self.lows.pop_front();
        }
        let hh = self.highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ll = self.lows.iter().copied().fold(f64::INFINITY, f64::min);
        let raw = if hh > ll { 100.0 * (bar.close - ll) / (hh - ll) } else { 50.0 };

        self.raw_k.push_back(raw);
        if self.raw_k.len() > self.smooth_k {
            self.raw_k.pop_front();
        }
        self.last_k = self.raw_k.iter().sum::<f64>() / self.raw_k.len() as f64;
        self.smooth_d.update_value(self.last_k);
    }

    fn get(&self, output: &str) -> Option<f64> {
        match output {
            "k" => Some(self.k_value()),
            "d" => Some(self.d_value()),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["k", "d"]
    }
}

/// Stochastic RSI: the stochastic formula applied to an internal RSI
/// series rather than to price.
#[derive(Debug, Clone)]
pub struct StochRsi {
    rsi: super::oscillator::Rsi,
    rsi_length: usize,
    stoch_length: usize,
    rsi_window: VecDeque<f64>,
    smooth_k: Sma,
    smooth_d: Sma,
    bars_seen: usize,
}

impl StochRsi {
    pub fn new(rsi_length: usize, stoch_length: usize, smooth_k: usize, smooth_d: usize) -> Self {
        Self {
            rsi: super::oscillator::Rsi::new(rsi_length),
            rsi_length: rsi_length.max(1),
            stoch_length: stoch_length.max(1),
            rsi_window: VecDeque::new(),
            smooth_k: Sma::new(smooth_k.max(1)),
            smooth_d: Sma::new(smooth_d.max(1)),
            bars_seen: 0,
        }
    }

    fn warmup_bars(&self) -> usize {
        self.rsi_length + self.stoch_length + self.smooth_k.length().max(self.smooth_d.length())
    }

    pub fn k_value(&self) -> f64 {
        if self.bars_seen < self.warmup_bars() { f64::NAN } else { self.smooth_k.value() }
    }

    pub fn d_value(&self) -> f64 {
        if self.bars_seen < self.warmup_bars() { f64::NAN } else { self.smooth_d.value() }
    }
}

impl Indicator for StochRsi {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        self.rsi.update(bar);
        let rsi_value = self.rsi.value();
        if rsi_value.is_nan() {
            return;
        }
        self.rsi_window.push_back(rsi_value);
        if self.rsi_window.len() > self.stoch_length {
            self.rsi_window.pop_front();
        }
        let hh = self.rsi_window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ll = self.rsi_window.iter().copied().fold(f64::INFINITY, f64::min);
        let raw = if hh > ll { 100.0 * (rsi_value - ll) / (hh - ll) } else { 50.0 };
        self.smooth_k.update_value(raw);
        self.smooth_d.update_value(self.smooth_k.value());
    }

    fn get(&self, output: &str) -> Option<f64> {
        match output {
            "k" => Some(self.k_value()),
            "d" => Some(self.d_value()),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["k", "d"]
    }
}
