//! The uncompiled rule tree, deserialized straight from a Play's
//! `actions` entries (each an opaque `serde_json::Value` at the model
//! layer). A field reference is always the explicit `{"field": "..."}`
//! shape so it can never be confused with a string literal such as
//! `"buy"` in `position.side == "buy"`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Operand {
    Field { field: String },
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Num(f64),
    Bool(bool),
    Str(String),
}

/// The rule tree exactly as declared in a Play. Leaves compare
/// operands via a symbolic operator; internal nodes are boolean
/// `all | any | not`; temporal nodes look at a window of past
/// exec-role bars.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Gt(Operand, Operand),
    Gte(Operand, Operand),
    Lt(Operand, Operand),
    Lte(Operand, Operand),
    Eq(Operand, Operand),
    Neq(Operand, Operand),
    /// `(value, lower, upper)`, inclusive on both bounds.
    Between(Operand, Operand, Operand),
    In(Operand, Vec<Operand>),
    /// `(value, target, tolerance)`, `|value - target| <= tolerance`.
    ApproxEq(Operand, Operand, f64),
    /// Alias of `approx_eq` kept for rule-author readability.
    NearAbs(Operand, Operand, f64),
    /// `(value, target, pct)`, `|value - target| <= |target| * pct`.
    NearPct(Operand, Operand, f64),
    CrossAbove(Operand, Operand),
    CrossBelow(Operand, Operand),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
    HoldsFor {
        cond: Box<Condition>,
        n: i64,
        anchor_tf: Option<String>,
    },
    OccurredWithin {
        cond: Box<Condition>,
        n: i64,
        anchor_tf: Option<String>,
    },
    CountTrue {
        cond: Box<Condition>,
        n: i64,
        min_count: i64,
        anchor_tf: Option<String>,
    },
    HoldsForDuration {
        cond: Box<Condition>,
        duration: String,
        anchor_tf: Option<String>,
    },
}
