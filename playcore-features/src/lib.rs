#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Per-role feature state built from a Play's `feature_specs` and
//! `structure_specs`, multi-timeframe routing that keeps each role
//! advancing independently, and the read-only snapshot view the rule
//! evaluator reads from.
//!
//! `playcore-ta` knows how to build and run one indicator or structure
//! instance; this crate is the one that wires a whole role's worth of
//! them together from a Play, in the dependency order the Play
//! declares, and exposes the result as dotted field paths.

pub mod multi_tf_state;
pub mod rollup;
pub mod snapshot;
pub mod structure_instance;
pub mod tf_state;

pub use multi_tf_state::MultiTFState;
pub use rollup::ExecRollupBucket;
pub use snapshot::SnapshotView;
pub use tf_state::TFState;
