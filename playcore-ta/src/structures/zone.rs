use super::swing::Swing;
use super::PivotKind;
use playcore_model::Bar;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ZoneType {
    Demand,
    Supply,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ZoneState {
    Active,
    Touched,
    /// Terminal: a broken zone is never reactivated, even if a later
    /// bar re-enters its price range.
    Broken,
}

impl ZoneState {
    pub const fn as_str(self) -> &'static str {
        match self {
            ZoneState::Active => "active",
            ZoneState::Touched => "touched",
            ZoneState::Broken => "broken",
        }
    }
}

/// A single supply/demand zone anchored to the latest confirmed swing
/// pivot of the matching side, sized by a multiple of ATR.
#[derive(Debug, Clone)]
pub struct Zone {
    zone_type: ZoneType,
    width_atr: f64,
    last_seen_swing_version: u64,
    lower: f64,
    upper: f64,
    state: ZoneState,
    anchor_idx: i64,
    version: u64,
}

impl Zone {
    pub fn new(zone_type: ZoneType, width_atr: f64) -> Self {
        Self {
            zone_type,
            width_atr: width_atr.max(f64::EPSILON),
            last_seen_swing_version: 0,
            lower: f64::NAN,
            upper: f64::NAN,
            state: ZoneState::Broken,
            anchor_idx: -1,
            version: 0,
        }
    }

    pub fn zone_type(&self) -> ZoneType {
        self.zone_type
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn state(&self) -> ZoneState {
        self.state
    }

    pub fn anchor_idx(&self) -> i64 {
        self.anchor_idx
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn matching_pivot_kind(&self) -> PivotKind {
        match self.zone_type {
            ZoneType::Demand => PivotKind::Low,
            ZoneType::Supply => PivotKind::High,
        }
    }

    pub fn update(&mut self, bar: &Bar, swing: &Swing, atr_value: f64) {
        if swing.version() != self.last_seen_swing_version {
            self.last_seen_swing_version = swing.version();
            if let Some(pivot) = swing.last_pivot_of(self.matching_pivot_kind()) {
                if !atr_value.is_nan() {
                    let (lower, upper) = match self.zone_type {
                        ZoneType::Demand => (pivot.level - self.width_atr * atr_value, pivot.level),
                        ZoneType::Supply => (pivot.level, pivot.level + self.width_atr * atr_value),
                    };
                    self.lower = lower;
                    self.upper = upper;
                    self.anchor_idx = pivot.idx;
                    self.state = ZoneState::Active;
                    self.version += 1;
                }
            }
        }

        if self.state == ZoneState::Broken || self.lower.is_nan() {
            return;
        }

        match self.zone_type {
            ZoneType::Demand => {
                if self.state == ZoneState::Active && bar.low <= self.lower {
                    self.state = ZoneState::Touched;
                }
                if self.state == ZoneState::Touched && bar.close < self.lower {
                    self.state = ZoneState::Broken;
                }
            }
            ZoneType::Supply => {
                if self.state == ZoneState::Active && bar.high >= self.upper {
                    self.state = ZoneState::Touched;
                }
                if self.state == ZoneState::Touched && bar.close > self.upper {
                    self.state = ZoneState::Broken;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar::new(0, o, h, l, c, 1.0)
    }

    #[test]
    fn demand_zone_touches_then_breaks() {
        let mut swing = Swing::new(1, 1);
        let mut zone = Zone::new(ZoneType::Demand, 1.0);
        for h in [10.0, 5.0, 10.0] {
            let l = h - 1.0;
            swing.update(0, &bar(h, h, l, h));
            zone.update(&bar(h, h, l, h), &swing, 1.0);
        }
        assert_eq!(zone.state(), ZoneState::Active);
        zone.update(&bar(4.0, 4.0, 2.5, 3.5), &swing, 1.0);
        assert_eq!(zone.state(), ZoneState::Touched);
        zone.update(&bar(3.0, 3.0, 2.0, 2.0), &swing, 1.0);
        assert_eq!(zone.state(), ZoneState::Broken);
    }
}
