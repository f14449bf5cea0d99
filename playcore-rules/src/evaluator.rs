//! Evaluates a [`CompiledPlay`]'s actions against a
//! [`SnapshotView`](playcore_features::SnapshotView) at each exec-role
//! close, producing the bar's [`Signal`]s.
//!
//! Two kinds of node carry state across bars: crossover nodes (need
//! the *previous* bar's operand values) and window nodes (need the
//! inner condition's truth over the last `n_bars`). Everything else is
//! pure per-bar evaluation. State is keyed by the `node_id` the
//! compiler assigned, in a flat `Vec` sized to `node_count` so lookups
//! never hash.

use crate::compiler::{CompiledAction, CompiledCondition, CompiledOperand, CompiledPlay, WindowKind};
use playcore_features::SnapshotView;
use playcore_model::Signal;
use playcore_ta::structures::FieldValue;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Default)]
struct CrossState {
    prev: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Default)]
struct WindowState {
    history: VecDeque<bool>,
}

/// Per-action-tree runtime state. Rebuilt once at play load alongside
/// the [`CompiledPlay`] it evaluates, lives for the run's duration.
#[derive(Debug)]
pub struct RuleEvaluator {
    cross_state: Vec<CrossState>,
    window_state: Vec<WindowState>,
}

impl RuleEvaluator {
    pub fn new(compiled: &CompiledPlay) -> Self {
        Self {
            cross_state: vec![CrossState::default(); compiled.node_count],
            window_state: (0..compiled.node_count).map(|_| WindowState::default()).collect(),
        }
    }

    fn operand_value(op: &CompiledOperand, snapshot: &SnapshotView<'_>) -> Option<FieldValue> {
        match op {
            CompiledOperand::Field(path) => snapshot.get(path),
            CompiledOperand::Num(n) => Some(FieldValue::F64(*n)),
            CompiledOperand::Bool(b) => Some(FieldValue::Bool(*b)),
            CompiledOperand::Str(s) => Some(FieldValue::Str(s.clone())),
        }
    }

    /// NaN (or a missing field, which can only happen transiently — a
    /// flat position's `position.*` fields — never a load-time typo)
    /// makes any comparison false, per §4.6's NaN-propagation rule.
    fn numeric_cmp(a: &CompiledOperand, b: &CompiledOperand, snapshot: &SnapshotView<'_>, f: impl Fn(f64, f64) -> bool) -> bool {
        let (Some(a), Some(b)) = (Self::operand_value(a, snapshot), Self::operand_value(b, snapshot)) else { return false };
        let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else { return false };
        if a.is_nan() || b.is_nan() {
            return false;
        }
        f(a, b)
    }

    fn equality(a: &CompiledOperand, b: &CompiledOperand, snapshot: &SnapshotView<'_>) -> Option<bool> {
        let a = Self::operand_value(a, snapshot)?;
        let b = Self::operand_value(b, snapshot)?;
        Some(match (&a, &b) {
            (FieldValue::Str(x), FieldValue::Str(y)) => x == y,
            _ => {
                let (x, y) = (a.as_f64()?, b.as_f64()?);
                if x.is_nan() || y.is_nan() {
                    return Some(false);
                }
                x == y
            }
        })
    }

    fn eval(&mut self, cond: &CompiledCondition, snapshot: &SnapshotView<'_>) -> bool {
        match cond {
            CompiledCondition::Gt(a, b) => Self::numeric_cmp(a, b, snapshot, |x, y| x > y),
            CompiledCondition::Gte(a, b) => Self::numeric_cmp(a, b, snapshot, |x, y| x >= y),
            CompiledCondition::Lt(a, b) => Self::numeric_cmp(a, b, snapshot, |x, y| x < y),
            CompiledCondition::Lte(a, b) => Self::numeric_cmp(a, b, snapshot, |x, y| x <= y),
            CompiledCondition::Eq(a, b) => Self::equality(a, b, snapshot).unwrap_or(false),
            CompiledCondition::Neq(a, b) => !Self::equality(a, b, snapshot).unwrap_or(true),
            CompiledCondition::Between(v, lo, hi) => {
                Self::numeric_cmp(v, lo, snapshot, |x, y| x >= y) && Self::numeric_cmp(v, hi, snapshot, |x, y| x <= y)
            }
            CompiledCondition::In(v, options) => options.iter().any(|opt| Self::equality(v, opt, snapshot).unwrap_or(false)),
            CompiledCondition::ApproxEq(a, b, tol) => {
                Self::numeric_cmp(a, b, snapshot, |x, y| (x - y).abs() <= *tol)
            }
            CompiledCondition::NearPct(a, b, pct) => {
                Self::numeric_cmp(a, b, snapshot, |x, y| (x - y).abs() <= y.abs() * *pct)
            }
            CompiledCondition::Cross { node_id, above, a, b } => {
                let (Some(av), Some(bv)) = (Self::operand_value(a, snapshot), Self::operand_value(b, snapshot)) else {
                    return false;
                };
                let (Some(av), Some(bv)) = (av.as_f64(), bv.as_f64()) else { return false };
                let state = &mut self.cross_state[*node_id];
                let fired = match state.prev {
                    Some((pa, pb)) if !pa.is_nan() && !pb.is_nan() && !av.is_nan() && !bv.is_nan() => {
                        if *above { pa <= pb && av > bv } else { pa >= pb && av < bv }
                    }
                    _ => false,
                };
                state.prev = Some((av, bv));
                fired
            }
            CompiledCondition::All(items) => {
                let mut all = true;
                for item in items {
                    all &= self.eval(item, snapshot);
                }
                all
            }
            CompiledCondition::Any(items) => {
                let mut any = false;
                for item in items {
                    any |= self.eval(item, snapshot);
                }
                any
            }
            CompiledCondition::Not(inner) => !self.eval(inner, snapshot),
            CompiledCondition::Window { node_id, kind, n_bars, cond } => {
                let current = self.eval(cond, snapshot);
                let state = &mut self.window_state[*node_id];
                state.history.push_back(current);
                while state.history.len() as i64 > *n_bars {
                    state.history.pop_front();
                }
                match kind {
                    WindowKind::HoldsFor => {
                        state.history.len() as i64 >= *n_bars && state.history.iter().all(|&v| v)
                    }
                    WindowKind::OccurredWithin => state.history.iter().any(|&v| v),
                    WindowKind::CountTrue { min_count } => {
                        state.history.iter().filter(|&&v| v).count() as i64 >= *min_count
                    }
                }
            }
        }
    }

    /// Evaluates every action against `snapshot`, advancing each
    /// action tree's window/crossover state exactly once. Returns one
    /// [`Signal`] per action whose `when` condition is currently true.
    pub fn evaluate(&mut self, compiled: &CompiledPlay, snapshot: &SnapshotView<'_>) -> Vec<Signal> {
        let mut signals = Vec::new();
        for action in &compiled.actions {
            if self.eval(&action.when, snapshot) {
                let mut signal = Signal::new(action.tag.clone(), action.direction);
                if let Some(sizing) = action.sizing_override {
                    signal = signal.with_sizing_override(sizing);
                }
                signals.push(signal);
            }
        }
        signals
    }
}

#[cfg(test)]
#[allow(clippy::items_after_test_module)]
mod tests {
    use super::*;
    use crate::compiler::compile_play;
    use indexmap::indexmap;
    use playcore_features::MultiTFState;
    use playcore_model::play::{FeeModel, FundingPolicy, RiskModel, SizingModel, SizingRule, SlippageModel, TfMapping};
    use playcore_model::{Bar, FeatureSpec, IndicatorKind, Ledger, Play, TfRole, Timeframe};

    fn play_with_action(action_json: serde_json::Value) -> Play {
        Play {
            id: "p".into(),
            symbol_universe: vec!["BTCUSDT".into()],
            tf_mapping: TfMapping { low_tf: Timeframe::M1, med_tf: Timeframe::M15, high_tf: Timeframe::H1 },
            exec_role: TfRole::LowTf,
            feature_specs: indexmap! { TfRole::LowTf => vec![
                FeatureSpec { id: "ema_fast".into(), kind: IndicatorKind::Ema, params: indexmap!{"length".into() => playcore_model::feature_spec::Scalar::Int(2)} },
                FeatureSpec { id: "ema_slow".into(), kind: IndicatorKind::Ema, params: indexmap!{"length".into() => playcore_model::feature_spec::Scalar::Int(4)} },
            ] },
            structure_specs: indexmap! {},
            actions: indexmap! { "enter_long".into() => action_json },
            risk_model: RiskModel {
                sizing: SizingRule { model: SizingModel::PercentEquity, value: 0.1 },
                stop_loss: None,
                take_profit: None,
                max_leverage: 1.0,
                initial_equity: 1000.0,
                fees: FeeModel { taker_bps: 0.0, maker_bps: 0.0 },
                slippage: SlippageModel { bps: 0.0 },
                funding_interval_hours: 8.0,
                funding: FundingPolicy::Disabled,
                min_trade_notional_usdt: 10.0,
                max_drawdown_stop_pct: None,
                equity_floor: None,
            },
            warmup_bars_by_role: None,
            delay_bars_by_role: None,
        }
    }

    #[test]
    fn cross_above_fires_exactly_once_on_crossing_bar() {
        let play = play_with_action(serde_json::json!({
            "when": {"cross_above": [{"field": "ema_fast.value"}, {"field": "ema_slow.value"}]},
            "direction": "Long"
        }));
        let compiled = compile_play(&play).unwrap();
        let mut evaluator = RuleEvaluator::new(&compiled);
        let mut multi_tf = MultiTFState::build(&play).unwrap();
        let ledger = Ledger::new(1000.0);

        let closes = [10.0, 9.0, 8.0, 12.0, 13.0, 14.0];
        let mut fire_count = 0;
        for (i, &c) in closes.iter().enumerate() {
            multi_tf.update_role(TfRole::LowTf, i as i64, &Bar::new((i as i64 + 1) * 60_000, c, c, c, c, 1.0)).unwrap();
            let snapshot = SnapshotView::new(&multi_tf, None, &ledger, c, c);
            let signals = evaluator.evaluate(&compiled, &snapshot);
            fire_count += signals.len();
        }
        assert_eq!(fire_count, 1);
    }

    #[test]
    fn holds_for_requires_consecutive_true_bars() {
        let play = play_with_action(serde_json::json!({
            "when": {"holds_for": {"cond": {"gt": [{"field": "ema_fast.value"}, {"field": "ema_slow.value"}]}, "n": 3}},
            "direction": "Long"
        }));
        let compiled = compile_play(&play).unwrap();
        let mut evaluator = RuleEvaluator::new(&compiled);
        let mut multi_tf = MultiTFState::build(&play).unwrap();
        let ledger = Ledger::new(1000.0);

        let closes = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0];
        let mut fired_at = None;
        for (i, &c) in closes.iter().enumerate() {
            multi_tf.update_role(TfRole::LowTf, i as i64, &Bar::new((i as i64 + 1) * 60_000, c, c, c, c, 1.0)).unwrap();
            let snapshot = SnapshotView::new(&multi_tf, None, &ledger, c, c);
            if !evaluator.evaluate(&compiled, &snapshot).is_empty() && fired_at.is_none() {
                fired_at = Some(i);
            }
        }
        assert!(fired_at.is_some());
    }
}
