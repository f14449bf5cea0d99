#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Compiles a Play's declarative `actions` into an evaluable rule tree
//! and runs it against a [`playcore_features::SnapshotView`] at each
//! exec-role close.
//!
//! Three stages, matching §4.6:
//! - [`schema`]: the closed set of dotted field paths a Play's
//!   features/structures make available, used to reject an
//!   `UndefinedField` at load rather than at runtime.
//! - [`ast`]: the uncompiled condition tree, deserialized straight from
//!   a Play's opaque `actions` JSON.
//! - [`compiler`]: validates field paths and window durations, assigns
//!   node ids, and produces a [`compiler::CompiledPlay`].
//! - [`evaluator`]: the stateful per-bar evaluator that turns a
//!   `CompiledPlay` plus a snapshot into a bar's `Signal`s.

pub mod ast;
pub mod compiler;
pub mod evaluator;
pub mod schema;

pub use compiler::{compile_play, CompiledAction, CompiledPlay};
pub use evaluator::RuleEvaluator;
pub use schema::FieldSchema;
