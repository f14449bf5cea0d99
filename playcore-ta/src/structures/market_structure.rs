use super::swing::Swing;
use super::trend::{Direction, Trend};
use playcore_model::Bar;

/// Break-of-structure / change-of-character flags derived from swing
/// and trend state. Both are per-bar events, reset every update.
#[derive(Debug, Clone)]
pub struct MarketStructure {
    regime: Direction,
    bos: bool,
    choch: bool,
}

impl MarketStructure {
    pub fn new() -> Self {
        Self { regime: Direction::Undefined, bos: false, choch: false }
    }

    pub fn regime(&self) -> Direction {
        self.regime
    }

    pub fn bos(&self) -> bool {
        self.bos
    }

    pub fn choch(&self) -> bool {
        self.choch
    }

    /// `bar` is the live bar driving this update; `swing`/`trend` are
    /// assumed already updated for the same bar.
    pub fn update(&mut self, bar: &Bar, swing: &Swing, trend: &Trend) {
        self.bos = false;
        self.choch = false;
        self.regime = trend.direction();

        let high = swing.high_level();
        let low = swing.low_level();
        if high.is_nan() || low.is_nan() {
            return;
        }

        match trend.direction() {
            Direction::Up => {
                if bar.close > high {
                    self.bos = true;
                } else if bar.close < low {
                    self.choch = true;
                }
            }
            Direction::Down => {
                if bar.close < low {
                    self.bos = true;
                } else if bar.close > high {
                    self.choch = true;
                }
            }
            Direction::Range | Direction::Undefined => {}
        }
    }
}

impl Default for MarketStructure {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(c: f64) -> Bar {
        Bar::new(0, c, c, c, c, 1.0)
    }

    #[test]
    fn no_bos_or_choch_when_regime_undefined() {
        let swing = Swing::new(1, 1);
        let trend = Trend::new();
        let mut ms = MarketStructure::new();
        ms.update(&bar(10.0), &swing, &trend);
        assert!(!ms.bos());
        assert!(!ms.choch());
    }
}
