use super::swing::Swing;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FibMode {
    Retracement,
    Extension,
}

/// Fibonacci levels computed from the current high/low swing levels,
/// recomputed only when the swing's version changes.
#[derive(Debug, Clone)]
pub struct Fibonacci {
    levels: Vec<f64>,
    mode: FibMode,
    last_seen_swing_version: u64,
    values: Vec<f64>,
}

impl Fibonacci {
    pub fn new(levels: Vec<f64>, mode: FibMode) -> Self {
        let len = levels.len();
        Self { levels, mode, last_seen_swing_version: 0, values: vec![f64::NAN; len] }
    }

    pub fn level(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn update(&mut self, swing: &Swing) {
        if swing.version() == self.last_seen_swing_version {
            return;
        }
        self.last_seen_swing_version = swing.version();

        let high = swing.high_level();
        let low = swing.low_level();
        if high.is_nan() || low.is_nan() {
            return;
        }
        let range = high - low;
        for (value, level) in self.values.iter_mut().zip(self.levels.iter()) {
            *value = match self.mode {
                FibMode::Retracement => high - range * level,
                FibMode::Extension => high + range * level,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playcore_model::Bar;

    fn bar(h: f64, l: f64) -> Bar {
        Bar::new(0, (h + l) / 2.0, h, l, (h + l) / 2.0, 1.0)
    }

    #[test]
    fn retracement_levels_are_between_high_and_low() {
        let mut swing = Swing::new(1, 1);
        let mut fib = Fibonacci::new(vec![0.382, 0.5, 0.618], FibMode::Retracement);
        for h in [5.0, 10.0, 5.0, 2.0, 6.0] {
            swing.update(0, &bar(h, h - 1.0));
            fib.update(&swing);
        }
        if !swing.high_level().is_nan() && !swing.low_level().is_nan() {
            for v in fib.values() {
                assert!(*v <= swing.high_level() + 1e-9);
            }
        }
    }
}
