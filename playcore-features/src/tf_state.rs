//! A single role's feature/structure state: owns every indicator and
//! structure instance declared for that role, advances them in
//! dependency order on each closed bar, and answers dotted-path field
//! lookups for the snapshot view.

use crate::structure_instance::{self, StructureInstance};
use indexmap::IndexMap;
use playcore_model::{Bar, LoadError, Play, TfRole};
use playcore_ta::structures::FieldValue;
use smol_str::SmolStr;

pub struct TFState {
    role: TfRole,
    indicators: IndexMap<SmolStr, Box<dyn playcore_ta::indicators::Indicator>>,
    structures: Vec<(SmolStr, StructureInstance)>,
    bar_idx: i64,
    bars_seen: u64,
    first_close_ms: Option<i64>,
    last_close_ms: Option<i64>,
}

impl std::fmt::Debug for TFState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TFState")
            .field("role", &self.role)
            .field("bars_seen", &self.bars_seen)
            .field("indicator_ids", &self.indicators.keys().collect::<Vec<_>>())
            .field("structure_ids", &self.structures.iter().map(|(id, _)| id).collect::<Vec<_>>())
            .finish()
    }
}

/// Kahn's algorithm over `depends_on` edges within one role; returns the
/// structure ids in an order where every dependency precedes its
/// dependent, or a `CyclicDependency`/`UnresolvedDependency` error.
fn topological_order(role: &str, specs: &[playcore_model::StructureSpec]) -> Result<Vec<usize>, LoadError> {
    let index_of: std::collections::HashMap<&str, usize> =
        specs.iter().enumerate().map(|(i, s)| (s.id.as_str(), i)).collect();

    for spec in specs {
        for dep in &spec.depends_on {
            if !index_of.contains_key(dep.as_str()) {
                return Err(LoadError::UnresolvedDependency {
                    role: role.to_string(),
                    structure_id: spec.id.to_string(),
                    depends_on: dep.to_string(),
                });
            }
        }
    }

    let mut indegree = vec![0usize; specs.len()];
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];
    for (i, spec) in specs.iter().enumerate() {
        for dep in &spec.depends_on {
            let j = index_of[dep.as_str()];
            edges[j].push(i);
            indegree[i] += 1;
        }
    }

    let mut queue: std::collections::VecDeque<usize> =
        (0..specs.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(specs.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &next in &edges[i] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() != specs.len() {
        let cycle = (0..specs.len())
            .filter(|&i| indegree[i] > 0)
            .map(|i| specs[i].id.to_string())
            .collect();
        return Err(LoadError::CyclicDependency { role: role.to_string(), cycle });
    }
    Ok(order)
}

impl TFState {
    pub fn build(role: TfRole, play: &Play) -> Result<Self, LoadError> {
        let role_name = format!("{role:?}");
        let feature_specs = play.feature_specs.get(&role).map(Vec::as_slice).unwrap_or(&[]);
        let structure_specs = play.structure_specs.get(&role).map(Vec::as_slice).unwrap_or(&[]);

        let mut indicators = IndexMap::new();
        for spec in feature_specs {
            indicators.insert(spec.id.clone(), playcore_ta::build(spec));
        }

        let order = topological_order(&role_name, structure_specs)?;
        let mut structures = Vec::with_capacity(structure_specs.len());
        for idx in order {
            let spec = &structure_specs[idx];
            let instance = structure_instance::build(spec, &role_name)?;
            for dep in structure_instance::depends_on(&instance) {
                if !structures.iter().any(|(id, _): &(SmolStr, StructureInstance)| *id == dep) {
                    return Err(LoadError::UnresolvedDependency {
                        role: role_name.clone(),
                        structure_id: spec.id.to_string(),
                        depends_on: dep.to_string(),
                    });
                }
            }
            if let StructureInstance::Zone { atr_id, .. } = &instance {
                if !indicators.contains_key(atr_id) {
                    return Err(LoadError::UnresolvedDependency {
                        role: role_name.clone(),
                        structure_id: spec.id.to_string(),
                        depends_on: atr_id.to_string(),
                    });
                }
            }
            structures.push((spec.id.clone(), instance));
        }

        Ok(Self { role, indicators, structures, bar_idx: -1, bars_seen: 0, first_close_ms: None, last_close_ms: None })
    }

    pub fn role(&self) -> TfRole {
        self.role
    }

    pub fn bars_seen(&self) -> u64 {
        self.bars_seen
    }

    pub fn first_close_ms(&self) -> Option<i64> {
        self.first_close_ms
    }

    pub fn bar_idx(&self) -> i64 {
        self.bar_idx
    }

    fn find_swing<'a>(before: &'a [(SmolStr, StructureInstance)], id: &str) -> &'a playcore_ta::structures::swing::Swing {
        before
            .iter()
            .find_map(|(sid, inst)| match (sid == id, inst) {
                (true, StructureInstance::Swing(s)) => Some(s),
                _ => None,
            })
            .expect("swing dependency resolved at load time")
    }

    fn find_trend<'a>(before: &'a [(SmolStr, StructureInstance)], id: &str) -> &'a playcore_ta::structures::trend::Trend {
        before
            .iter()
            .find_map(|(sid, inst)| match (sid == id, inst) {
                (true, StructureInstance::Trend { trend, .. }) => Some(trend),
                _ => None,
            })
            .expect("trend dependency resolved at load time")
    }

    /// Advance every indicator then every structure (in dependency
    /// order) for one newly-closed bar of this role's own timeframe.
    pub fn update(&mut self, bar_idx: i64, bar: &Bar) {
        self.bar_idx = bar_idx;
        self.bars_seen += 1;
        if self.first_close_ms.is_none() {
            self.first_close_ms = Some(bar.ts_close_ms);
        }
        self.last_close_ms = Some(bar.ts_close_ms);

        for indicator in self.indicators.values_mut() {
            indicator.update(bar);
        }

        for i in 0..self.structures.len() {
            let (before, at_and_after) = self.structures.split_at_mut(i);
            let (_, instance) = &mut at_and_after[0];
            match instance {
                StructureInstance::Swing(s) => s.update(bar_idx, bar),
                StructureInstance::RollingWindow(rw) => rw.update(bar_idx, bar),
                StructureInstance::Trend { trend, swing_id } => {
                    let swing = Self::find_swing(before, swing_id);
                    trend.update(swing);
                }
                StructureInstance::Zone { zone, swing_id, atr_id } => {
                    let swing = Self::find_swing(before, swing_id);
                    let atr_value = self.indicators.get(atr_id).and_then(|ind| ind.get("value")).unwrap_or(f64::NAN);
                    zone.update(bar, swing, atr_value);
                }
                StructureInstance::Fibonacci { fib, swing_id } => {
                    let swing = Self::find_swing(before, swing_id);
                    fib.update(swing);
                }
                StructureInstance::DerivedZone { dz, swing_id } => {
                    let swing = Self::find_swing(before, swing_id);
                    dz.update(bar, swing);
                }
                StructureInstance::MarketStructure { ms, swing_id, trend_id } => {
                    let swing = Self::find_swing(before, swing_id);
                    let trend = Self::find_trend(before, trend_id);
                    ms.update(bar, swing, trend);
                }
            }
        }
    }

    /// Bars strictly prior to this role's first closed bar, or an
    /// instance id that doesn't exist, both read as "not ready":
    /// `None` for struct fields, `NaN` for indicator values. `mark_price`
    /// is only consulted by fields that rank zones by distance to the
    /// current price (derived-zone `closest_active_*`).
    pub fn field(&self, instance_id: &str, field: &str, mark_price: f64) -> Option<FieldValue> {
        if let Some(indicator) = self.indicators.get(instance_id) {
            return indicator.get(field).map(FieldValue::F64);
        }
        let (_, instance) = self.structures.iter().find(|(id, _)| id == instance_id)?;
        structure_field(instance, field, mark_price)
    }

    /// Zone structure instances declared for this role, for the
    /// engine's 1m subloop to test intrabar touches against — ahead of
    /// (and independent from) the zone's own exec-close `update` call.
    pub fn zone_instances(&self) -> impl Iterator<Item = (&SmolStr, &playcore_ta::structures::zone::Zone)> {
        self.structures.iter().filter_map(|(id, inst)| match inst {
            StructureInstance::Zone { zone, .. } => Some((id, zone)),
            _ => None,
        })
    }
}

fn structure_field(instance: &StructureInstance, field: &str, mark_price: f64) -> Option<FieldValue> {
    match instance {
        StructureInstance::Swing(s) => Some(match field {
            "high_level" => FieldValue::F64(s.high_level()),
            "high_idx" => FieldValue::I64(s.high_idx()),
            "low_level" => FieldValue::F64(s.low_level()),
            "low_idx" => FieldValue::I64(s.low_idx()),
            "version" => FieldValue::I64(s.version() as i64),
            _ => return None,
        }),
        StructureInstance::Trend { trend, .. } => Some(match field {
            "direction" => FieldValue::Str(trend.direction().as_str().into()),
            "bars_in_trend" => FieldValue::I64(trend.bars_in_trend()),
            "consecutive_hh" => FieldValue::I64(trend.consecutive_hh()),
            "consecutive_ll" => FieldValue::I64(trend.consecutive_ll()),
            _ => return None,
        }),
        StructureInstance::Zone { zone, .. } => Some(match field {
            "lower" => FieldValue::F64(zone.lower()),
            "upper" => FieldValue::F64(zone.upper()),
            "state" => FieldValue::Str(zone.state().as_str().into()),
            "anchor_idx" => FieldValue::I64(zone.anchor_idx()),
            "version" => FieldValue::I64(zone.version() as i64),
            _ => return None,
        }),
        StructureInstance::RollingWindow(rw) => match field {
            "value" => Some(FieldValue::F64(rw.value())),
            _ => None,
        },
        StructureInstance::Fibonacci { fib, .. } => {
            let idx: usize = field.strip_prefix("level_")?.parse().ok()?;
            fib.level(idx).map(FieldValue::F64)
        }
        StructureInstance::DerivedZone { dz, .. } => Some(match field {
            "active_count" => FieldValue::I64(dz.active_count()),
            "any_active" => FieldValue::Bool(dz.any_active()),
            "any_touched" => FieldValue::Bool(dz.any_touched()),
            "any_inside" => FieldValue::Bool(dz.any_inside()),
            "closest_active_lower" => {
                FieldValue::F64(dz.closest_active(mark_price).0.unwrap_or(f64::NAN))
            }
            "closest_active_upper" => {
                FieldValue::F64(dz.closest_active(mark_price).1.unwrap_or(f64::NAN))
            }
            "closest_active_idx" => FieldValue::I64(dz.closest_active(mark_price).2),
            "newest_active_idx" => FieldValue::I64(dz.newest_active_idx()),
            "source_version" => FieldValue::I64(dz.source_version() as i64),
            _ => {
                let rest = field.strip_prefix("zone")?;
                let (slot_str, suffix) = rest.split_once('_')?;
                let slot: usize = slot_str.parse().ok()?;
                match suffix {
                    "lower" => dz.slot_lower(slot).map(FieldValue::F64).unwrap_or(FieldValue::F64(f64::NAN)),
                    "upper" => dz.slot_upper(slot).map(FieldValue::F64).unwrap_or(FieldValue::F64(f64::NAN)),
                    "state" => FieldValue::Str(dz.slot_state(slot).into()),
                    "anchor_idx" => FieldValue::I64(dz.slot_anchor_idx(slot)),
                    "age_bars" => FieldValue::I64(dz.slot_age_bars(slot)),
                    "inside" => FieldValue::Bool(dz.slot_inside(slot)),
                    "touched_this_bar" => FieldValue::Bool(dz.slot_touched_this_bar(slot)),
                    "touch_count" => FieldValue::I64(dz.slot_touch_count(slot)),
                    "instance_id" => FieldValue::I64(dz.slot_instance_id(slot)),
                    _ => return None,
                }
            }
        }),
        StructureInstance::MarketStructure { ms, .. } => Some(match field {
            "regime" => FieldValue::Str(ms.regime().as_str().into()),
            "bos" => FieldValue::Bool(ms.bos()),
            "choch" => FieldValue::Bool(ms.choch()),
            _ => return None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;
    use playcore_model::play::{FeeModel, FundingPolicy, RiskModel, SizingModel, SizingRule, SlippageModel, TfMapping};
    use playcore_model::{Play, StructureKind, StructureSpec, Timeframe};

    fn bar(ts: i64, h: f64, l: f64, c: f64) -> Bar {
        Bar::new(ts, c, h, l, c, 1.0)
    }

    fn play_with_swing_and_derived_zone() -> Play {
        let swing = StructureSpec {
            id: "piv".into(),
            kind: StructureKind::Swing,
            params: indexmap! { "left".into() => playcore_model::feature_spec::Scalar::Int(1), "right".into() => playcore_model::feature_spec::Scalar::Int(1) },
            str_params: indexmap! {},
            depends_on: vec![],
        };
        let dz = StructureSpec {
            id: "dz".into(),
            kind: StructureKind::DerivedZone,
            params: indexmap! { "max_active".into() => playcore_model::feature_spec::Scalar::Int(3) },
            str_params: indexmap! {
                "swing_id".into() => "piv".into(),
                "levels".into() => "0.5".into(),
                "price_source".into() => "low".into(),
                "mode".into() => "demand".into(),
            },
            depends_on: vec!["piv".into()],
        };
        Play {
            id: "p".into(),
            symbol_universe: vec!["BTCUSDT".into()],
            tf_mapping: TfMapping { low_tf: Timeframe::M1, med_tf: Timeframe::M15, high_tf: Timeframe::H1 },
            exec_role: TfRole::LowTf,
            feature_specs: indexmap! {},
            structure_specs: indexmap! { TfRole::LowTf => vec![swing, dz] },
            actions: indexmap! {},
            risk_model: RiskModel {
                sizing: SizingRule { model: SizingModel::PercentEquity, value: 0.1 },
                stop_loss: None,
                take_profit: None,
                max_leverage: 1.0,
                initial_equity: 1000.0,
                fees: FeeModel { taker_bps: 5.0, maker_bps: 2.0 },
                slippage: SlippageModel { bps: 1.0 },
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
    fn closest_active_fields_resolve_once_a_derived_zone_exists() {
        let play = play_with_swing_and_derived_zone();
        let mut state = TFState::build(TfRole::LowTf, &play).unwrap();
        for (i, (h, l)) in [(10.0, 9.0), (11.0, 5.0), (10.0, 9.0)].iter().enumerate() {
            state.update(i as i64, &bar(i as i64 * 60_000, *h, *l, *h));
        }
        let lower = state.field("dz", "closest_active_lower", 7.0);
        let upper = state.field("dz", "closest_active_upper", 7.0);
        let idx = state.field("dz", "closest_active_idx", 7.0);
        assert!(matches!(lower, Some(FieldValue::F64(v)) if !v.is_nan()));
        assert!(matches!(upper, Some(FieldValue::F64(v)) if !v.is_nan()));
        assert!(matches!(idx, Some(FieldValue::I64(v)) if v >= 0));
    }

    #[test]
    fn closest_active_fields_are_sentinels_before_any_zone_exists() {
        let play = play_with_swing_and_derived_zone();
        let state = TFState::build(TfRole::LowTf, &play).unwrap();
        assert!(matches!(state.field("dz", "closest_active_lower", 7.0), Some(FieldValue::F64(v)) if v.is_nan()));
        assert!(matches!(state.field("dz", "closest_active_idx", 7.0), Some(FieldValue::I64(-1))));
    }
}
