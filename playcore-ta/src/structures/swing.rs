use super::{Pivot, PivotClass, PivotKind};
use playcore_model::Bar;
use std::collections::VecDeque;

/// Keep enough pivot history for trend/market-structure to classify
/// against, and for consumers that scan "recent" pivots for context
/// rather than just the latest one.
const PIVOT_HISTORY_CAP: usize = 32;

/// Confirms a bar as a swing high/low once `right` bars have closed
/// past it, by comparing against a `left + right + 1` ring buffer.
/// `version` increments on every new confirmed pivot (of either kind),
/// the signal dependents use to know state changed.
#[derive(Debug, Clone)]
pub struct Swing {
    left: usize,
    right: usize,
    window: VecDeque<(i64, Bar)>,
    pivots: VecDeque<Pivot>,
    high_level: f64,
    high_idx: i64,
    low_level: f64,
    low_idx: i64,
    version: u64,
}

impl Swing {
    pub fn new(left: usize, right: usize) -> Self {
        let left = left.max(1);
        let right = right.max(1);
        Self {
            left,
            right,
            window: VecDeque::with_capacity(left + right + 1),
            pivots: VecDeque::with_capacity(PIVOT_HISTORY_CAP),
            high_level: f64::NAN,
            high_idx: -1,
            low_level: f64::NAN,
            low_idx: -1,
            version: 0,
        }
    }

    pub fn high_level(&self) -> f64 {
        self.high_level
    }

    pub fn high_idx(&self) -> i64 {
        self.high_idx
    }

    pub fn low_level(&self) -> f64 {
        self.low_level
    }

    pub fn low_idx(&self) -> i64 {
        self.low_idx
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Most recent pivots first, most recent last, capped history.
    pub fn pivot_history(&self) -> &VecDeque<Pivot> {
        &self.pivots
    }

    pub fn last_pivot_of(&self, kind: PivotKind) -> Option<&Pivot> {
        self.pivots.iter().rev().find(|p| p.kind == kind)
    }

    fn classify(&self, kind: PivotKind, level: f64) -> PivotClass {
        let Some(prev) = self.pivots.iter().rev().find(|p| p.kind == kind) else {
            return PivotClass::Unclassified;
        };
        match kind {
            PivotKind::High => {
                if level > prev.level { PivotClass::HigherHigh } else { PivotClass::LowerHigh }
            }
            PivotKind::Low => {
                if level > prev.level { PivotClass::HigherLow } else { PivotClass::LowerLow }
            }
        }
    }

    fn push_pivot(&mut self, pivot: Pivot) {
        self.pivots.push_back(pivot);
        if self.pivots.len() > PIVOT_HISTORY_CAP {
            self.pivots.pop_front();
        }
        self.version += 1;
    }

    pub fn update(&mut self, bar_idx: i64, bar: &Bar) {
        self.window.push_back((bar_idx, *bar));
        let cap = self.left + self.right + 1;
        if self.window.len() > cap {
            self.window.pop_front();
        }
        if self.window.len() < cap {
            return;
        }

        let candidate_pos = self.left;
        let (candidate_idx, candidate_bar) = self.window[candidate_pos];

        let is_swing_high = self
            .window
            .iter()
            .enumerate()
            .filter(|(pos, _)| *pos != candidate_pos)
            .all(|(_, (_, b))| b.high < candidate_bar.high);
        let is_swing_low = self
            .window
            .iter()
            .enumerate()
            .filter(|(pos, _)| *pos != candidate_pos)
            .all(|(_, (_, b))| b.low > candidate_bar.low);

        if is_swing_high {
            self.high_level = candidate_bar.high;
            self.high_idx = candidate_idx;
            let class = self.classify(PivotKind::High, candidate_bar.high);
            self.push_pivot(Pivot { kind: PivotKind::High, idx: candidate_idx, level: candidate_bar.high, classification: class });
        }
        if is_swing_low {
            self.low_level = candidate_bar.low;
            self.low_idx = candidate_idx;
            let class = self.classify(PivotKind::Low, candidate_bar.low);
            self.push_pivot(Pivot { kind: PivotKind::Low, idx: candidate_idx, level: candidate_bar.low, classification: class });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(h: f64, l: f64) -> Bar {
        Bar::new(0, (h + l) / 2.0, h, l, (h + l) / 2.0, 1.0)
    }

    #[test]
    fn confirms_swing_high_after_right_bars() {
        let mut swing = Swing::new(2, 2);
        let highs = [10.0, 11.0, 15.0, 11.0, 10.0, 9.0, 8.0];
        for (i, h) in highs.iter().enumerate() {
            swing.update(i as i64, &bar(*h, h - 1.0));
        }
        assert_eq!(swing.high_idx(), 2);
        assert!((swing.high_level() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn first_pivot_of_a_kind_is_unclassified() {
        let mut swing = Swing::new(1, 1);
        for h in [10.0, 15.0, 10.0] {
            swing.update(0, &bar(h, h - 1.0));
        }
        let pivot = swing.last_pivot_of(PivotKind::High).unwrap();
        assert_eq!(pivot.classification, PivotClass::Unclassified);
    }

    #[test]
    fn second_higher_high_is_classified() {
        let mut swing = Swing::new(1, 1);
        // 10 -> HH pivot(10) @1(unclassified), ... -> HH pivot(20) @ later classified HigherHigh
        let highs = [5.0, 10.0, 5.0, 8.0, 20.0, 8.0];
        for (i, h) in highs.iter().enumerate() {
            swing.update(i as i64, &bar(*h, h - 1.0));
        }
        let pivot = swing.last_pivot_of(PivotKind::High).unwrap();
        assert_eq!(pivot.classification, PivotClass::HigherHigh);
    }
}
