use super::moving_average::Ema;
use super::Indicator;
use playcore_model::Bar;
use std::collections::VecDeque;

/// MACD: fast EMA minus slow EMA, plus a signal EMA of that
/// difference and the histogram between them.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    slow_len: usize,
    signal_len: usize,
    bars_seen: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: Ema::with_warmup(fast, 0),
            slow: Ema::with_warmup(slow, 0),
            signal: Ema::with_warmup(signal, 0),
            slow_len: slow.max(1),
            signal_len: signal.max(1),
            bars_seen: 0,
        }
    }

    fn warmup_bars(&self) -> usize {
        3 * self.slow_len + self.signal_len
    }

    pub fn macd_value(&self) -> f64 {
        if self.bars_seen < self.warmup_bars() {
            return f64::NAN;
        }
        self.fast.raw_value() - self.slow.raw_value()
    }

    pub fn signal_value(&self) -> f64 {
        if self.bars_seen < self.warmup_bars() {
            return f64::NAN;
        }
        self.signal.raw_value()
    }

    pub fn hist_value(&self) -> f64 {
        let m = self.macd_value();
        let s = self.signal_value();
        if m.is_nan() || s.is_nan() { f64::NAN } else { m - s }
    }
}

impl Indicator for Macd {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        let fast_val = self.fast.update_value(bar.close);
        let slow_val = self.slow.update_value(bar.close);
        self.signal.update_value(fast_val - slow_val);
    }

    fn get(&self, output: &str) -> Option<f64> {
        match output {
            "macd" => Some(self.macd_value()),
            "signal" => Some(self.signal_value()),
            "hist" => Some(self.hist_value()),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["macd", "signal", "hist"]
    }
}

/// Average directional index: smoothed +DI/-DI spread.
#[derive(Debug, Clone)]
pub struct Adx {
    length: usize,
    prev: Option<Bar>,
    smoothed_tr: f64,
    smoothed_plus_dm: f64,
    smoothed_minus_dm: f64,
    adx: f64,
    bars_seen: usize,
}

impl Adx {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
            prev: None,
            smoothed_tr: 0.0,
            smoothed_plus_dm: 0.0,
            smoothed_minus_dm: 0.0,
            adx: 0.0,
            bars_seen: 0,
        }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < 2 * self.length { f64::NAN } else { self.adx }
    }

    fn dx(&self) -> f64 {
        if self.smoothed_tr == 0.0 {
            return 0.0;
        }
        let plus_di = 100.0 * self.smoothed_plus_dm / self.smoothed_tr;
        let minus_di = 100.0 * self.smoothed_minus_dm / self.smoothed_tr;
        if plus_di + minus_di == 0.0 { 0.0 } else { 100.0 * (plus_di - minus_di).abs() / (plus_di + minus_di) }
    }
}

impl Indicator for Adx {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        let Some(prev) = self.prev else {
            self.prev = Some(*bar);
            return;
        };
        let up_move = bar.high - prev.high;
        let down_move = prev.low - bar.low;
        let plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };
        let tr = (bar.high - bar.low).max((bar.high - prev.close).abs()).max((bar.low - prev.close).abs());

        let n = self.length as f64;
        self.smoothed_tr = self.smoothed_tr - self.smoothed_tr / n + tr;
        self.smoothed_plus_dm = self.smoothed_plus_dm - self.smoothed_plus_dm / n + plus_dm;
        self.smoothed_minus_dm = self.smoothed_minus_dm - self.smoothed_minus_dm / n + minus_dm;

        let dx = self.dx();
        self.adx = if self.bars_seen <= 2 * self.length {
            (self.adx * (self.bars_seen - 1) as f64 + dx) / self.bars_seen as f64
        } else {
            (self.adx * (n - 1.0) + dx) / n
        };
        self.prev = Some(*bar);
    }

    fn get(&self, output: &str) -> Option<f64> {
        (output == "value").then(|| self.value())
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }
}

/// Vortex indicator: `vi_plus` / `vi_minus` movement ratios.
#[derive(Debug, Clone)]
pub struct Vortex {
    length: usize,
    prev: Option<Bar>,
    vm_plus: VecDeque<f64>,
    vm_minus: VecDeque<f64>,
    tr: VecDeque<f64>,
    bars_seen: usize,
}

impl Vortex {
    pub fn new(length: usize) -> Self {
        Self { length: length.max(1), prev: None, vm_plus: VecDeque::new(), vm_minus: VecDeque::new(), tr: VecDeque::new(), bars_seen: 0 }
    }

    pub fn vi_plus(&self) -> f64 {
        self.ratio(&self.vm_plus)
    }

    pub fn vi_minus(&self) -> f64 {
        self.ratio(&self.vm_minus)
    }

    fn ratio(&self, series: &VecDeque<f64>) -> f64 {
        if self.bars_seen < self.length + 1 {
            return f64::NAN;
        }
        let tr_sum: f64 = self.tr.iter().sum();
        if tr_sum == 0.0 {
            return 0.0;
        }
        series.iter().sum::<f64>() / tr_sum
    }
}

impl Indicator for Vortex {
    fn update(&mut self, bar: &Bar) {
        self.bars_seen += 1;
        let Some(prev) = self.prev else {
            self.prev = Some(*bar);
            return;
        };
        self.vm_plus.push_back((bar.high - prev.low).abs());
        self.vm_minus.push_back((bar.low - prev.high).abs());
        self.tr.push_back((bar.high - bar.low).max((bar.high - prev.close).abs()).max((bar.low - prev.close).abs()));
        if self.vm_plus.len() > self.length {
            self.vm_plus.pop_front();
            self.vm_minus.pop_front();
            self.tr.pop_front();
        }
        self.prev = Some(*bar);
    }

    fn get(&self, output: &str) -> Option<f64> {
        match output {
            "vi_plus" => Some(self.vi_plus()),
            "vi_minus" => Some(self.vi_minus()),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["vi_plus", "vi_minus"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, h: f64, l: f64, c: f64) -> Bar {
        Bar::new(ts, c, h, l, c, 1.0)
    }

    #[test]
    fn macd_hist_is_difference_of_macd_and_signal() {
        let mut macd = Macd::new(3, 6, 3);
        for i in 0..100 {
            macd.update(&bar(i, 10.0 + (i % 5) as f64, 9.0, 9.5 + (i % 5) as f64));
        }
        let hist = macd.hist_value();
        assert!((hist - (macd.macd_value() - macd.signal_value())).abs() < 1e-9);
    }

    #[test]
    fn adx_stays_within_0_100() {
        let mut adx = Adx::new(5);
        for i in 0..50 {
            adx.update(&bar(i, 10.0 + i as f64 * 0.2, 9.0 + i as f64 * 0.2, 9.5 + i as f64 * 0.2));
        }
        let v = adx.value();
        assert!((0.0..=100.0).contains(&v));
    }
}
