use playcore_model::{Bar, PriceField};
use std::collections::VecDeque;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RollingMode {
    Min,
    Max,
}

/// Rolling extrema over a fixed-size window of a single price field,
/// via a monotonic deque: O(1) amortized per update regardless of
/// window size.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    size: usize,
    source: PriceField,
    mode: RollingMode,
    values: VecDeque<(i64, f64)>,
    monotonic: VecDeque<(i64, f64)>,
    bars_seen: usize,
}

impl RollingWindow {
    pub fn new(size: usize, source: PriceField, mode: RollingMode) -> Self {
        Self {
            size: size.max(1),
            source,
            mode,
            values: VecDeque::new(),
            monotonic: VecDeque::new(),
            bars_seen: 0,
        }
    }

    pub fn value(&self) -> f64 {
        if self.bars_seen < self.size {
            return f64::NAN;
        }
        self.monotonic.front().map(|(_, v)| *v).unwrap_or(f64::NAN)
    }

    fn better(&self, a: f64, b: f64) -> bool {
        match self.mode {
            RollingMode::Min => a <= b,
            RollingMode::Max => a >= b,
        }
    }

    pub fn update(&mut self, bar_idx: i64, bar: &Bar) {
        self.bars_seen += 1;
        let v = bar.field(self.source);

        self.values.push_back((bar_idx, v));
        while let Some(&(front_idx, _)) = self.values.front() {
            if bar_idx - front_idx >= self.size as i64 {
                self.values.pop_front();
            } else {
                break;
            }
        }

        while let Some(&(_, back_v)) = self.monotonic.back() {
            if self.better(v, back_v) {
                self.monotonic.pop_back();
            } else {
                break;
            }
        }
        self.monotonic.push_back((bar_idx, v));
        while let Some(&(front_idx, _)) = self.monotonic.front() {
            if bar_idx - front_idx >= self.size as i64 {
                self.monotonic.pop_front();
            } else {
                break;
            }
        }
    }
}
