#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Core data model shared by every `playcore` crate.
//!
//! This crate is intentionally inert: it defines the entities of
//! §3 of the specification (bars, timeframes, the Play schema, orders,
//! positions, the ledger, trades, the run manifest) and the error
//! taxonomy of §7, but performs no indicator math, no rule evaluation
//! and no exchange simulation. Those live in `playcore-ta`,
//! `playcore-rules` and `playcore-exchange` respectively, all of which
//! depend on this crate for their shared vocabulary.

pub mod bar;
pub mod error;
pub mod feature_spec;
pub mod hash;
pub mod ledger;
pub mod manifest;
pub mod order;
pub mod play;
pub mod position;
pub mod signal;
pub mod structure_spec;
pub mod timeframe;
pub mod trade;

pub use bar::{Bar, PriceField};
pub use error::{LiveTransientError, LoadError, PreflightError, RuntimeError, TerminalStopReason};
pub use feature_spec::{FeatureSpec, IndicatorKind, Scalar};
pub use ledger::Ledger;
pub use manifest::RunManifest;
pub use order::{ClientOrderId, Order, OrderKind, OrderState, Side, TimeInForce};
pub use play::{Play, RiskModel, SizingRule, TfMapping, TfRole};
pub use position::Position;
pub use signal::{Direction, Signal};
pub use structure_spec::{StructureKind, StructureSpec};
pub use timeframe::Timeframe;
pub use trade::{ExitReason, Fill, FillKind, Trade};
