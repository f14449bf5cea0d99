#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! The simulated exchange: the only place in the workspace that turns
//! a [`playcore_model::Signal`] into ledger and position mutations.
//!
//! [`account::SimulatedExchange`] consumes one closed 1m bar at a time
//! regardless of a Play's `exec_tf`; the engine is responsible for
//! feeding it every 1m bar so that stop-loss, take-profit and
//! liquidation touches are detected with 1m granularity even when the
//! strategy itself only looks at the market every hour.

pub mod account;
pub mod error;
pub mod intrabar;
pub mod sizing;

pub use account::{OrderIntent, SimulatedExchange};
pub use error::ExchangeError;
