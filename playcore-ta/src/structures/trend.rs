use super::swing::Swing;
use super::{PivotClass, PivotKind};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    Up,
    Down,
    Range,
    Undefined,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Range => "range",
            Direction::Undefined => "undefined",
        }
    }
}

/// Trend regime derived from the classification of the two most
/// recent pivots (by time, across both kinds) in a dependency swing.
#[derive(Debug, Clone)]
pub struct Trend {
    last_seen_version: u64,
    direction: Direction,
    bars_in_trend: i64,
    consecutive_hh: i64,
    consecutive_ll: i64,
}

impl Trend {
    pub fn new() -> Self {
        Self { last_seen_version: 0, direction: Direction::Undefined, bars_in_trend: 0, consecutive_hh: 0, consecutive_ll: 0 }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn bars_in_trend(&self) -> i64 {
        self.bars_in_trend
    }

    pub fn consecutive_hh(&self) -> i64 {
        self.consecutive_hh
    }

    pub fn consecutive_ll(&self) -> i64 {
        self.consecutive_ll
    }

    fn count_trailing(history: &std::collections::VecDeque<super::Pivot>, kind: PivotKind, class: PivotClass) -> i64 {
        history.iter().rev().filter(|p| p.kind == kind).take_while(|p| p.classification == class).count() as i64
    }

    pub fn update(&mut self, swing: &Swing) {
        self.bars_in_trend += 1;

        if swing.version() == self.last_seen_version {
            return;
        }
        self.last_seen_version = swing.version();

        let history = swing.pivot_history();
        let high_count = history.iter().filter(|p| p.kind == PivotKind::High).count();
        let low_count = history.iter().filter(|p| p.kind == PivotKind::Low).count();

        let new_direction = if high_count < 2 || low_count < 2 {
            Direction::Undefined
        } else {
            let mut last_two: Vec<&super::Pivot> = history.iter().rev().take(2).collect();
            last_two.reverse();
            if last_two.len() < 2 {
                Direction::Undefined
            } else {
                let (a, b) = (last_two[0], last_two[1]);
                let has = |k: PivotKind, c: PivotClass| (a.kind == k && a.classification == c) || (b.kind == k && b.classification == c);
                if has(PivotKind::High, PivotClass::HigherHigh) && has(PivotKind::Low, PivotClass::HigherLow) {
                    Direction::Up
                } else if has(PivotKind::Low, PivotClass::LowerLow) && has(PivotKind::High, PivotClass::LowerHigh) {
                    Direction::Down
                } else {
                    Direction::Range
                }
            }
        };

        if new_direction != self.direction {
            self.bars_in_trend = 0;
        }
        self.direction = new_direction;
        self.consecutive_hh = Self::count_trailing(history, PivotKind::High, PivotClass::HigherHigh);
        self.consecutive_ll = Self::count_trailing(history, PivotKind::Low, PivotClass::LowerLow);
    }
}

impl Default for Trend {
    fn default() -> Self {
        Self::new()
    }
}
