//! Owns the three role [`TFState`]s and the exec rollup bucket, and
//! guards the "each role advances at most once per its own close"
//! invariant. Routing *which* role closes on a given bar is the
//! engine's job (it knows the wall-clock and each role's timeframe);
//! this type only refuses a non-advancing or out-of-order close.

use crate::rollup::ExecRollupBucket;
use crate::tf_state::TFState;
use indexmap::IndexMap;
use playcore_model::{Bar, LoadError, Play, RuntimeError, TfRole};

#[derive(Debug)]
pub struct MultiTFState {
    exec_role: TfRole,
    states: IndexMap<TfRole, TFState>,
    last_close_ms: IndexMap<TfRole, i64>,
    exec_bar_idx: i64,
    rollup: ExecRollupBucket,
}

impl MultiTFState {
    pub fn build(play: &Play) -> Result<Self, LoadError> {
        let mut states = IndexMap::new();
        for role in TfRole::ALL {
            states.insert(role, TFState::build(role, play)?);
        }
        Ok(Self {
            exec_role: play.exec_role,
            states,
            last_close_ms: IndexMap::new(),
            exec_bar_idx: -1,
            rollup: ExecRollupBucket::new(),
        })
    }

    pub fn exec_role(&self) -> TfRole {
        self.exec_role
    }

    pub fn exec_bar_idx(&self) -> i64 {
        self.exec_bar_idx
    }

    pub fn state(&self, role: TfRole) -> &TFState {
        &self.states[&role]
    }

    pub fn exec_state(&self) -> &TFState {
        self.state(self.exec_role)
    }

    pub fn rollup(&self) -> &ExecRollupBucket {
        &self.rollup
    }

    pub fn rollup_mut(&mut self) -> &mut ExecRollupBucket {
        &mut self.rollup
    }

    /// Advance `role` with its newly-closed `bar`. Rejects a close that
    /// isn't strictly after the role's previous close, catching an
    /// engine defect in the close-routing logic rather than silently
    /// double-counting a bar.
    pub fn update_role(&mut self, role: TfRole, bar_idx: i64, bar: &Bar) -> Result<(), RuntimeError> {
        if let Some(&prev) = self.last_close_ms.get(&role) {
            if bar.ts_close_ms <= prev {
                return Err(RuntimeError::ExchangeInconsistency(format!(
                    "role {role:?} received non-advancing close {} after {prev}",
                    bar.ts_close_ms
                )));
            }
        }
        self.last_close_ms.insert(role, bar.ts_close_ms);
        self.states.get_mut(&role).expect("every TfRole has a TFState").update(bar_idx, bar);
        if role == self.exec_role {
            self.exec_bar_idx = bar_idx;
        }
        Ok(())
    }
}
