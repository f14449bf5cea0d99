//! Market-structure detectors: stateful, incrementally-updated readers
//! of swing pivots, trend regime, supply/demand zones, rolling
//! extrema, Fibonacci levels, and derived zone slots.
//!
//! Unlike [`crate::indicators::Indicator`], these don't share one
//! update signature — each kind consumes a different shape of
//! dependency (a swing reads bars directly; a zone reads a swing and
//! an ATR value; a trend reads only a swing). Callers wire the
//! per-role dependency graph explicitly rather than going through a
//! single trait object, which keeps each detector's dependency
//! contract visible in its own type signature instead of erased
//! behind `dyn`.

pub mod derived_zone;
pub mod fibonacci;
pub mod market_structure;
pub mod rolling_window;
pub mod swing;
pub mod trend;
pub mod zone;

use smol_str::SmolStr;

/// A typed field value read out of a structure instance by a dotted
/// snapshot path. Distinct from indicator output (always `f64`)
/// because structures carry mixed-type state: pivot indices, zone
/// state labels, boolean touch flags.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    F64(f64),
    I64(i64),
    Str(SmolStr),
    Bool(bool),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::F64(v) => Some(*v),
            FieldValue::I64(v) => Some(*v as f64),
            FieldValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            FieldValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Sentinel encodings for an empty derived-zone slot field, per kind.
pub const SENTINEL_INDEX: i64 = -1;
pub const SENTINEL_STATE: &str = "NONE";

/// A classified swing pivot, shared by [`swing::Swing`] and every
/// detector that consumes pivot history (trend, zone, fibonacci,
/// derived zones, market structure).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pivot {
    pub kind: PivotKind,
    pub idx: i64,
    pub level: f64,
    pub classification: PivotClass,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PivotKind {
    High,
    Low,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PivotClass {
    HigherHigh,
    LowerHigh,
    HigherLow,
    LowerLow,
    /// No prior pivot of the same kind to classify against yet.
    Unclassified,
}
