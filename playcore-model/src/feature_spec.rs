use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A scalar parameter value for a [`FeatureSpec`] or structure spec.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(i) => i as f64,
            Scalar::Float(f) => f,
        }
    }

    pub fn as_usize(self) -> Option<usize> {
        match self {
            Scalar::Int(i) if i >= 0 => Some(i as usize),
            Scalar::Float(f) if f >= 0.0 && f.fract() == 0.0 => Some(f as usize),
            _ => None,
        }
    }
}

/// The closed registry of indicator kinds. The registry table itself
/// (required inputs, warmup formula, output keys) lives in
/// `playcore-ta`; this enum is the tag the Play schema and the rule
/// compiler share without depending on the math crate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Wma,
    Dema,
    Tema,
    Trima,
    Kama,
    Zlma,
    Alma,
    Rsi,
    Atr,
    Natr,
    Macd,
    BBands,
    Stoch,
    StochRsi,
    Cci,
    WillR,
    Cmo,
    Mom,
    Roc,
    Mfi,
    Uo,
    Adx,
    Vortex,
    Obv,
    Cmf,
    Vwap,
    LinReg,
    MidPrice,
    Ohlc4,
}

/// A single feature declaration within a Play's per-role feature list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeatureSpec {
    pub id: SmolStr,
    pub kind: IndicatorKind,
    pub params: IndexMap<SmolStr, Scalar>,
}

impl FeatureSpec {
    pub fn param(&self, name: &str) -> Option<Scalar> {
        self.params.get(name).copied()
    }

    pub fn param_usize(&self, name: &str, default: usize) -> usize {
        self.param(name).and_then(Scalar::as_usize).unwrap_or(default)
    }

    pub fn param_f64(&self, name: &str, default: f64) -> f64 {
        self.param(name).map(Scalar::as_f64).unwrap_or(default)
    }
}
