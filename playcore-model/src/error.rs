use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors raised while loading a [`crate::play::Play`], before any
/// run starts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum LoadError {
    /// A [`crate::play::Play`]'s `exec_role` did not name a declared
    /// [`crate::play::TfRole`].
    #[error("exec_role does not resolve to a declared tf_mapping role")]
    UnresolvedExecRole,

    /// A structure's `depends_on` named an id not present in the same
    /// role.
    #[error("structure `{structure_id}` depends_on unknown id `{depends_on}` in role {role}")]
    UnresolvedDependency { role: String, structure_id: String, depends_on: String },

    /// Structure `depends_on` edges formed a cycle within one role.
    #[error("cyclic structure dependency in role {role}: {cycle:?}")]
    CyclicDependency { role: String, cycle: Vec<String> },

    /// An indicator/structure `kind` string did not match a registry entry.
    #[error("unknown {0} kind `{1}`")]
    UnknownKind(&'static str, String),

    /// A declared parameter was missing, of the wrong type, or out of range.
    #[error("invalid parameter `{param}` for `{id}`: {reason}")]
    InvalidParams { id: String, param: String, reason: String },

    /// A rule referenced a snapshot field path that does not exist.
    #[error("undefined field `{0}` referenced by rule tree")]
    UndefinedField(String),

    /// A rule operator was applied to operands of a mismatched type
    /// (e.g. `between` with a non-numeric bound).
    #[error("type mismatch in rule: {0}")]
    TypeMismatch(String),

    /// A window operator's `n` exceeded the allowed look-back cap.
    #[error("window operator look-back {requested} exceeds cap {cap} for anchor role {anchor_role}")]
    WindowTooLong { anchor_role: String, requested: i64, cap: i64 },

    /// A single [`crate::bar::Bar`] failed its OHLC invariants.
    #[error("bar at ts_close_ms={ts_close_ms} invalid: {reason}")]
    InvalidBar { ts_close_ms: i64, reason: String },

    /// Two adjacent bars were not strictly increasing in time.
    #[error("non-monotonic bars: {prev_ts_ms} then {next_ts_ms}")]
    NonMonotonicBars { prev_ts_ms: i64, next_ts_ms: i64 },

    /// The gap between two adjacent bars did not equal the timeframe duration.
    #[error("gap between bars {prev_ts_ms} and {next_ts_ms} is not {expected_gap_ms}ms")]
    BarGap { prev_ts_ms: i64, next_ts_ms: i64, expected_gap_ms: i64 },
}

/// Fatal-unless-auto-healed errors raised by the preflight gate (§4.8),
/// before the hot loop starts. Each variant carries the required vs.
/// available range and an actionable hint describing what
/// `BarSource` query would resolve it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum PreflightError {
    #[error("missing data for ({symbol}, {tf}): need {required:?}, have {available:?}. {hint}")]
    MissingData {
        symbol: String,
        tf: String,
        required: (i64, i64),
        available: Option<(i64, i64)>,
        hint: String,
    },

    #[error("gap in ({symbol}, {tf}) between {prev_ts_ms} and {next_ts_ms}, expected {expected_gap_ms}ms. {hint}")]
    Gap {
        symbol: String,
        tf: String,
        prev_ts_ms: i64,
        next_ts_ms: i64,
        expected_gap_ms: i64,
        hint: String,
    },

    #[error("non-monotonic bars in ({symbol}, {tf}): {prev_ts_ms} then {next_ts_ms}")]
    NonMonotonic { symbol: String, tf: String, prev_ts_ms: i64, next_ts_ms: i64 },

    #[error("duplicate bar timestamp {ts_ms} in ({symbol}, {tf})")]
    Duplicate { symbol: String, tf: String, ts_ms: i64 },

    #[error("exec role close at {exec_close_ms}ms has no corresponding 1m bar; {hint}")]
    MappingInfeasible { exec_close_ms: i64, hint: String },

    #[error("coverage for ({symbol}, {tf}) is {available:?}, shorter than the required {required:?}")]
    CoverageTooShort { symbol: String, tf: String, required: (i64, i64), available: (i64, i64) },
}

/// Fatal errors raised mid-run. Unlike [`TerminalStopReason`], these
/// indicate an engine or configuration defect, not a normal (if
/// unhappy) trading outcome.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum RuntimeError {
    /// Risk-based sizing was asked to divide by a zero stop distance.
    #[error("risk-based sizing requires a non-zero stop distance")]
    ZeroStopDistance,

    /// Wallet balance went negative without a recorded terminal reason.
    #[error("wallet_balance went negative ({0}) without a terminal stop reason")]
    NegativeEquityWithoutTerminalReason(f64),

    /// The exchange rejected an operation that prior state should have
    /// made valid (an invariant violation, not a normal rejection).
    #[error("exchange rejection inconsistent with prior state: {0}")]
    ExchangeInconsistency(String),

    /// `BarSource` failed to respond within its configured timeout.
    #[error("bar source timed out fetching ({symbol}, {tf}) after {timeout_ms}ms")]
    BarSourceTimeout { symbol: String, tf: String, timeout_ms: u64 },
}

/// A run-ending condition that is *reported*, not raised: the run
/// completes, artifacts are written in full, but the run is marked
/// failed to outer gates.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum TerminalStopReason {
    #[error("position liquidated")]
    Liquidated,
    #[error("max drawdown stop triggered")]
    MaxDrawdownStop,
    #[error("equity floor stop triggered")]
    EquityFloorStop,
    #[error("manual stop requested")]
    ManualStop,
}

/// Recoverable errors surfaced only by the live runner; the core
/// engine itself is paused, not aborted, while these are handled.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum LiveTransientError {
    #[error("transport disconnected: {0}")]
    Disconnected(String),
    #[error("transport request timed out after {0}ms")]
    Timeout(u64),
    #[error("transient order rejection: {0}")]
    TransientRejection(String),
}
