use super::swing::Swing;
use super::{PivotKind, SENTINEL_INDEX, SENTINEL_STATE};
use playcore_model::Bar;
use std::collections::VecDeque;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DerivedZoneSource {
    High,
    Low,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DerivedZoneMode {
    Demand,
    Supply,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum SlotState {
    Active,
    Touched,
    Broken,
}

impl SlotState {
    const fn as_str(self) -> &'static str {
        match self {
            SlotState::Active => "active",
            SlotState::Touched => "touched",
            SlotState::Broken => "broken",
        }
    }
}

/// One K-slot, newest-first: `zone0` is always the most recently
/// created zone still tracked.
#[derive(Debug, Clone)]
struct Slot {
    lower: Option<f64>,
    upper: Option<f64>,
    state: Option<SlotState>,
    anchor_idx: i64,
    age_bars: i64,
    inside: bool,
    touched_this_bar: bool,
    touch_count: i64,
    instance_id: i64,
}

impl Slot {
    fn empty() -> Self {
        Self { lower: None, upper: None, state: None, anchor_idx: SENTINEL_INDEX, age_bars: 0, inside: false, touched_this_bar: false, touch_count: 0, instance_id: SENTINEL_INDEX }
    }
}

/// Regenerates up to `max_active` zones from a swing's pivots. Each
/// version change of the source swing spawns one new zone per entry in
/// `levels` (each level is a width multiplier against the swing's
/// high-low range), inserted at `zone0`, pushing older slots back and
/// evicting beyond `max_active`.
#[derive(Debug, Clone)]
pub struct DerivedZone {
    levels: Vec<f64>,
    source: DerivedZoneSource,
    mode: DerivedZoneMode,
    max_active: usize,
    last_seen_swing_version: u64,
    slots: VecDeque<Slot>,
    next_instance_id: i64,
    source_version: u64,
}

impl DerivedZone {
    pub fn new(levels: Vec<f64>, source: DerivedZoneSource, mode: DerivedZoneMode, max_active: usize) -> Self {
        let max_active = max_active.max(1);
        let slots = (0..max_active).map(|_| Slot::empty()).collect();
        Self { levels, source, mode, max_active, last_seen_swing_version: 0, slots, next_instance_id: 0, source_version: 0 }
    }

    fn matching_pivot_kind(&self) -> PivotKind {
        match self.source {
            DerivedZoneSource::High => PivotKind::High,
            DerivedZoneSource::Low => PivotKind::Low,
        }
    }

    pub fn source_version(&self) -> u64 {
        self.source_version
    }

    pub fn active_count(&self) -> i64 {
        self.slots.iter().filter(|s| matches!(s.state, Some(SlotState::Active) | Some(SlotState::Touched))).count() as i64
    }

    pub fn any_active(&self) -> bool {
        self.slots.iter().any(|s| matches!(s.state, Some(SlotState::Active)))
    }

    pub fn any_touched(&self) -> bool {
        self.slots.iter().any(|s| matches!(s.state, Some(SlotState::Touched)))
    }

    pub fn any_inside(&self) -> bool {
        self.slots.iter().any(|s| s.inside)
    }

    pub fn newest_active_idx(&self) -> i64 {
        self.slots
            .iter()
            .find(|s| matches!(s.state, Some(SlotState::Active) | Some(SlotState::Touched)))
            .map(|s| s.anchor_idx)
            .unwrap_or(SENTINEL_INDEX)
    }

    pub fn closest_active(&self, mark_price: f64) -> (Option<f64>, Option<f64>, i64) {
        self.slots
            .iter()
            .filter(|s| matches!(s.state, Some(SlotState::Active) | Some(SlotState::Touched)))
            .min_by(|a, b| {
                let da = a.lower.zip(a.upper).map(|(l, u)| midpoint_distance(mark_price, l, u)).unwrap_or(f64::INFINITY);
                let db = b.lower.zip(b.upper).map(|(l, u)| midpoint_distance(mark_price, l, u)).unwrap_or(f64::INFINITY);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|s| (s.lower, s.upper, s.anchor_idx))
            .unwrap_or((None, None, SENTINEL_INDEX))
    }

    pub fn slot_lower(&self, i: usize) -> Option<f64> {
        self.slots.get(i).and_then(|s| s.lower)
    }

    pub fn slot_upper(&self, i: usize) -> Option<f64> {
        self.slots.get(i).and_then(|s| s.upper)
    }

    pub fn slot_state(&self, i: usize) -> &'static str {
        self.slots.get(i).and_then(|s| s.state).map(SlotState::as_str).unwrap_or(SENTINEL_STATE)
    }

    pub fn slot_anchor_idx(&self, i: usize) -> i64 {
        self.slots.get(i).map(|s| s.anchor_idx).unwrap_or(SENTINEL_INDEX)
    }

    pub fn slot_age_bars(&self, i: usize) -> i64 {
        self.slots.get(i).map(|s| s.age_bars).unwrap_or(0)
    }

    pub fn slot_inside(&self, i: usize) -> bool {
        self.slots.get(i).map(|s| s.inside).unwrap_or(false)
    }

    pub fn slot_touched_this_bar(&self, i: usize) -> bool {
        self.slots.get(i).map(|s| s.touched_this_bar).unwrap_or(false)
    }

    pub fn slot_touch_count(&self, i: usize) -> i64 {
        self.slots.get(i).map(|s| s.touch_count).unwrap_or(0)
    }

    pub fn slot_instance_id(&self, i: usize) -> i64 {
        self.slots.get(i).map(|s| s.instance_id).unwrap_or(SENTINEL_INDEX)
    }

    pub fn update(&mut self, bar: &Bar, swing: &Swing) {
        for slot in self.slots.iter_mut() {
            slot.touched_this_bar = false;
        }

        if swing.version() != self.last_seen_swing_version {
            self.last_seen_swing_version = swing.version();
            if let Some(pivot) = swing.last_pivot_of(self.matching_pivot_kind()) {
                let high = swing.high_level();
                let low = swing.low_level();
                if !high.is_nan() && !low.is_nan() {
                    let range = high - low;
                    for &width in self.levels.iter().rev() {
                        let (lower, upper) = match self.mode {
                            DerivedZoneMode::Demand => (pivot.level - width * range, pivot.level),
                            DerivedZoneMode::Supply => (pivot.level, pivot.level + width * range),
                        };
                        self.slots.push_front(Slot {
                            lower: Some(lower),
                            upper: Some(upper),
                            state: Some(SlotState::Active),
                            anchor_idx: pivot.idx,
                            age_bars: 0,
                            inside: false,
                            touched_this_bar: false,
                            touch_count: 0,
                            instance_id: self.next_instance_id,
                        });
                        self.next_instance_id += 1;
                    }
                    while self.slots.len() > self.max_active {
                        self.slots.pop_back();
                    }
                    self.source_version += 1;
                }
            }
        }

        for slot in self.slots.iter_mut() {
            let (Some(lower), Some(upper)) = (slot.lower, slot.upper) else { continue };
            slot.age_bars += 1;
            let inside = bar.close >= lower && bar.close <= upper;
            if inside && !slot.inside {
                slot.touched_this_bar = true;
                slot.touch_count += 1;
                if slot.state == Some(SlotState::Active) {
                    slot.state = Some(SlotState::Touched);
                }
            }
            slot.inside = inside;

            if slot.state == Some(SlotState::Touched) {
                let broken = match self.mode {
                    DerivedZoneMode::Demand => bar.close < lower,
                    DerivedZoneMode::Supply => bar.close > upper,
                };
                if broken {
                    slot.state = Some(SlotState::Broken);
                }
            }
        }
    }
}

fn midpoint_distance(price: f64, lower: f64, upper: f64) -> f64 {
    ((lower + upper) / 2.0 - price).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(c: f64) -> Bar {
        Bar::new(0, c, c, c, c, 1.0)
    }

    #[test]
    fn newest_zone_occupies_slot_zero() {
        let mut swing = Swing::new(1, 1);
        let mut dz = DerivedZone::new(vec![0.5], DerivedZoneSource::Low, DerivedZoneMode::Demand, 3);
        for h in [10.0, 5.0, 10.0] {
            let b = Bar::new(0, h, h, h - 1.0, h, 1.0);
            swing.update(0, &b);
            dz.update(&b, &swing);
        }
        assert!(dz.slot_lower(0).is_some());
    }

    #[test]
    fn empty_slots_report_sentinels() {
        let dz = DerivedZone::new(vec![0.5], DerivedZoneSource::Low, DerivedZoneMode::Demand, 2);
        assert_eq!(dz.slot_state(0), SENTINEL_STATE);
        assert_eq!(dz.slot_anchor_idx(0), SENTINEL_INDEX);
        assert!(dz.slot_lower(0).is_none());
    }
}
