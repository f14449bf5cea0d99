use crate::feature_spec::Scalar;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The closed registry of structure-detector kinds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Swing,
    Trend,
    Zone,
    RollingWindow,
    Fibonacci,
    DerivedZone,
    MarketStructure,
}

/// A structure's numeric params live in `params`; its enum-valued
/// params (`zone_type`, rolling-window `source`/`mode`, fibonacci
/// `mode`, derived-zone `price_source`) live in `str_params` so the
/// shared [`Scalar`] type used for indicator params doesn't need a
/// string variant that almost nothing else uses.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StructureSpec {
    pub id: SmolStr,
    pub kind: StructureKind,
    pub params: IndexMap<SmolStr, Scalar>,
    pub str_params: IndexMap<SmolStr, SmolStr>,
    pub depends_on: Vec<SmolStr>,
}

impl StructureSpec {
    pub fn param(&self, name: &str) -> Option<Scalar> {
        self.params.get(name).copied()
    }

    pub fn param_usize(&self, name: &str, default: usize) -> usize {
        self.param(name).and_then(Scalar::as_usize).unwrap_or(default)
    }

    pub fn param_f64(&self, name: &str, default: f64) -> f64 {
        self.param(name).map(Scalar::as_f64).unwrap_or(default)
    }

    pub fn str_param<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.str_params.get(name).map(SmolStr::as_str).unwrap_or(default)
    }
}
