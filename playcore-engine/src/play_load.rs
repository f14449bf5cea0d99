//! Play validation (§4.7, C7): wires `playcore-features`' structure/DAG
//! loading and `playcore-rules`' compiler together, then derives the
//! two per-role quantities preflight and the engine both depend on and
//! neither recomputes: `warmup_bars_by_role` and `delay_bars_by_role`.

use indexmap::IndexMap;
use playcore_features::MultiTFState;
use playcore_model::{FeatureSpec, LoadError, Play, StructureKind, StructureSpec, TfRole};
use playcore_rules::{compile_play, CompiledPlay, RuleEvaluator};

/// A Play that has passed every load-time check: structure dependency
/// DAGs resolve per role, every rule field path resolves against the
/// schema those specs imply, and warmup/delay are derived and frozen.
#[derive(Debug)]
pub struct LoadedPlay {
    pub play: Play,
    pub compiled: CompiledPlay,
    pub warmup_bars_by_role: IndexMap<TfRole, i64>,
    pub delay_bars_by_role: IndexMap<TfRole, i64>,
}

impl LoadedPlay {
    pub fn fresh_evaluator(&self) -> RuleEvaluator {
        RuleEvaluator::new(&self.compiled)
    }

    pub fn fresh_multi_tf_state(&self) -> Result<MultiTFState, LoadError> {
        MultiTFState::build(&self.play)
    }

    pub fn warmup_bars(&self, role: TfRole) -> i64 {
        self.warmup_bars_by_role.get(&role).copied().unwrap_or(0)
    }

    pub fn delay_bars(&self, role: TfRole) -> i64 {
        self.delay_bars_by_role.get(&role).copied().unwrap_or(0)
    }

    /// Total bars of a role's own timeframe that must be closed before
    /// its first bar is usable by the strategy: warmup plus any
    /// user-declared delay.
    pub fn total_skip_bars(&self, role: TfRole) -> i64 {
        self.warmup_bars(role) + self.delay_bars(role)
    }
}

/// Recursively resolves a structure's own warmup requirement plus
/// whatever its `depends_on` chain needs. Not part of the closed
/// registry in `playcore-ta` because it needs the whole per-role spec
/// list to walk dependencies, not just one spec in isolation.
fn structure_warmup_bars(spec: &StructureSpec, role_specs: &[StructureSpec], role_features: &[FeatureSpec]) -> i64 {
    let dep_warmup = |dep_id: &str| -> i64 {
        role_specs
            .iter()
            .find(|s| s.id == *dep_id)
            .map(|s| structure_warmup_bars(s, role_specs, role_features))
            .unwrap_or(0)
    };
    let feature_warmup = |feature_id: &str| -> i64 {
        role_features
            .iter()
            .find(|f| f.id == *feature_id)
            .map(|f| playcore_ta::warmup_bars(f) as i64)
            .unwrap_or(0)
    };

    match spec.kind {
        StructureKind::Swing => {
            let left = spec.param_usize("left", 5) as i64;
            let right = spec.param_usize("right", 5) as i64;
            left + right
        }
        StructureKind::RollingWindow => spec.param_usize("size", 20) as i64,
        StructureKind::Trend => {
            let swing_id = spec.str_param("swing_id", "");
            let swing_warmup = dep_warmup(swing_id);
            // A trend needs at least two pivots of each kind to leave
            // `Undefined`; conservatively budget four full pivot
            // cycles' worth of bars on top of the swing's own warmup.
            let swing = role_specs.iter().find(|s| s.id == *swing_id);
            let (left, right) = swing
                .map(|s| (s.param_usize("left", 5) as i64, s.param_usize("right", 5) as i64))
                .unwrap_or((5, 5));
            swing_warmup + 4 * (left + right)
        }
        StructureKind::Zone => {
            let swing_warmup = dep_warmup(spec.str_param("swing_id", ""));
            let atr_warmup = feature_warmup(spec.str_param("atr_id", ""));
            swing_warmup.max(atr_warmup)
        }
        StructureKind::Fibonacci | StructureKind::DerivedZone => dep_warmup(spec.str_param("swing_id", "")),
        StructureKind::MarketStructure => {
            let swing_warmup = dep_warmup(spec.str_param("swing_id", ""));
            let trend_warmup = dep_warmup(spec.str_param("trend_id", ""));
            swing_warmup.max(trend_warmup)
        }
    }
}

/// `warmup_bars_by_role[role] = max over that role's features and
/// structures of their required warmup, plus the role's declared
/// `delay_bars` (§4.7 folds delay into the same quantity the engine
/// consumes, but we keep the two separate fields so the manifest can
/// report them independently per §6.3's field inventory).
fn compute_warmup_by_role(play: &Play) -> IndexMap<TfRole, i64> {
    let mut out = IndexMap::new();
    for role in TfRole::ALL {
        let features = play.feature_specs.get(&role).map(Vec::as_slice).unwrap_or(&[]);
        let structures = play.structure_specs.get(&role).map(Vec::as_slice).unwrap_or(&[]);

        let feature_warmup = features.iter().map(|f| playcore_ta::warmup_bars(f) as i64).max().unwrap_or(0);
        let structure_warmup = structures
            .iter()
            .map(|s| structure_warmup_bars(s, structures, features))
            .max()
            .unwrap_or(0);

        out.insert(role, feature_warmup.max(structure_warmup));
    }
    out
}

fn compute_delay_by_role(play: &Play) -> IndexMap<TfRole, i64> {
    let mut out = IndexMap::new();
    for role in TfRole::ALL {
        out.insert(role, play.delay_bars(role));
    }
    out
}

/// Validates and compiles `play`, deriving `warmup_bars_by_role` and
/// `delay_bars_by_role` fresh (§4.7: "never recomputed downstream"
/// means preflight and the engine both read the frozen values carried
/// on [`LoadedPlay`], not that this one load-time computation never
/// happens at all).
pub fn load_play(play: Play) -> Result<LoadedPlay, LoadError> {
    // Structure DAGs and dependency ids are validated as a side effect
    // of building the per-role state; we don't keep this instance
    // around, just its success/failure.
    let _ = MultiTFState::build(&play)?;
    let compiled = compile_play(&play)?;

    let warmup_bars_by_role = compute_warmup_by_role(&play);
    let delay_bars_by_role = compute_delay_by_role(&play);

    Ok(LoadedPlay { play, compiled, warmup_bars_by_role, delay_bars_by_role })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;
    use playcore_model::play::{FeeModel, FundingPolicy, RiskModel, SizingModel, SizingRule, SlippageModel, TfMapping};
    use playcore_model::{FeatureSpec, IndicatorKind, StructureSpec, Timeframe};

    fn base_play() -> Play {
        Play {
            id: "p".into(),
            symbol_universe: vec!["BTCUSDT".into()],
            tf_mapping: TfMapping { low_tf: Timeframe::M1, med_tf: Timeframe::M15, high_tf: Timeframe::H1 },
            exec_role: TfRole::LowTf,
            feature_specs: indexmap! {},
            structure_specs: indexmap! {},
            actions: indexmap! {},
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
    fn warmup_is_max_of_feature_and_structure_requirements() {
        let mut play = base_play();
        play.feature_specs.insert(
            TfRole::LowTf,
            vec![FeatureSpec { id: "ema".into(), kind: IndicatorKind::Ema, params: indexmap! {"length".into() => playcore_model::feature_spec::Scalar::Int(10)} }],
        );
        play.structure_specs.insert(
            TfRole::LowTf,
            vec![StructureSpec {
                id: "swing".into(),
                kind: StructureKind::Swing,
                params: indexmap! {"left".into() => playcore_model::feature_spec::Scalar::Int(3), "right".into() => playcore_model::feature_spec::Scalar::Int(3)},
                str_params: indexmap! {},
                depends_on: vec![],
            }],
        );
        let loaded = load_play(play).unwrap();
        // ema(10) warmup = 30, swing(3,3) warmup = 6 -> max is 30.
        assert_eq!(loaded.warmup_bars(TfRole::LowTf), 30);
    }

    #[test]
    fn delay_bars_pass_through_from_play() {
        let mut play = base_play();
        play.delay_bars_by_role = Some(indexmap! { TfRole::LowTf => 50 });
        let loaded = load_play(play).unwrap();
        assert_eq!(loaded.delay_bars(TfRole::LowTf), 50);
        assert_eq!(loaded.total_skip_bars(TfRole::LowTf), 50);
    }

    #[test]
    fn cyclic_structure_dependency_fails_load() {
        let mut play = base_play();
        play.structure_specs.insert(
            TfRole::LowTf,
            vec![
                StructureSpec {
                    id: "a".into(),
                    kind: StructureKind::Trend,
                    params: indexmap! {},
                    str_params: indexmap! {"swing_id".into() => "b".into()},
                    depends_on: vec!["b".into()],
                },
                StructureSpec {
                    id: "b".into(),
                    kind: StructureKind::Trend,
                    params: indexmap! {},
                    str_params: indexmap! {"swing_id".into() => "a".into()},
                    depends_on: vec!["a".into()],
                },
            ],
        );
        assert!(load_play(play).is_err());
    }
}
