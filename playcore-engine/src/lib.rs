#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! The runnable playcore engine: preflight, the exec-bar hot loop, the
//! live-runner state machine, deterministic artifacts, and the
//! validation harness that ties every other `playcore` crate together.
//!
//! Everything downstream of `playcore-model` composes here: Plays load
//! and validate (`play_load`), a run's data coverage is gated
//! (`preflight`) before the hot loop (`engine`) drives
//! `playcore-features`, `playcore-rules`, and `playcore-exchange`
//! together one exec bar at a time, and the result is serialized into
//! deterministic artifacts (`artifacts`). `live` bridges asynchronous
//! exchange transports into the same synchronous per-bar calls the
//! backtest path uses; `validation` is the closed set of deterministic
//! plays and synthetic generators C12 requires.

pub mod artifacts;
pub mod bar_source;
pub mod engine;
pub mod live;
pub mod play_load;
pub mod preflight;
pub mod validation;

pub use artifacts::{EquityPoint, RunArtifacts};
pub use bar_source::{BarSource, FillReport, SourceKey};
pub use engine::{CancelToken, Engine, PreflightOutcome, RunConfig, RunOutcome};
pub use live::{LiveRunner, LiveTransport, RunnerState, WalletSnapshot};
pub use play_load::{load_play, LoadedPlay};
pub use preflight::{AutoSync, PreflightReport};
