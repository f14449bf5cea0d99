use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The direction a [`Signal`] expresses.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Direction {
    Long,
    Short,
    Exit,
}

/// A tagged trading intent emitted by the rule evaluator at an
/// exec-role bar close. The engine, not the evaluator, decides whether
/// and how to turn this into an [`crate::order::Order`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Signal {
    /// Name of the originating `actions` entry in the [`crate::play::Play`].
    pub tag: SmolStr,
    pub direction: Direction,
    /// Overrides the Play's sizing rule for this signal only, if set.
    pub sizing_override: Option<f64>,
    pub metadata: IndexMap<SmolStr, f64>,
}

impl Signal {
    pub fn new(tag: impl Into<SmolStr>, direction: Direction) -> Self {
        Self { tag: tag.into(), direction, sizing_override: None, metadata: IndexMap::new() }
    }

    pub fn with_sizing_override(mut self, notional: f64) -> Self {
        self.sizing_override = Some(notional);
        self
    }
}
