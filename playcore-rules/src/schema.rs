//! Enumerates every dotted field path a compiled [`crate::ast::Condition`]
//! is allowed to reference, built once from a Play's feature/structure
//! declarations. Kept independent of any running [`playcore_features::TFState`]
//! so paths can be validated at load time, before a single bar closes.

use indexmap::IndexMap;
use playcore_model::{FeatureSpec, LoadError, Play, StructureKind, StructureSpec, TfRole};
use smol_str::SmolStr;

pub const POSITION_FIELDS: &[&str] =
    &["side", "qty_in_quote", "entry_price", "leverage", "liquidation_price", "unrealized_pnl", "margin_locked", "is_open"];

pub const LEDGER_FIELDS: &[&str] = &["wallet_balance", "margin_locked", "unrealized_pnl", "equity", "free_margin", "mark_price", "last_price"];

pub const ROLLUP_FIELDS: &[&str] = &["open", "high", "low", "close", "bar_count", "volume"];

fn levels_count(spec: &StructureSpec) -> usize {
    spec.str_param("levels", "").split(',').filter(|s| !s.trim().is_empty()).count()
}

/// The field names a structure instance of this `spec`'s kind exposes,
/// mirroring exactly what `playcore_features::tf_state::TFState::field`
/// resolves at runtime — this list and that implementation must stay in
/// lockstep, since a path accepted here but unresolvable there would
/// silently read as "not ready" forever instead of failing fast at load.
fn structure_fields(spec: &StructureSpec) -> Vec<SmolStr> {
    match spec.kind {
        StructureKind::Swing => ["high_level", "high_idx", "low_level", "low_idx", "version"].iter().map(|s| SmolStr::new(*s)).collect(),
        StructureKind::Trend => ["direction", "bars_in_trend", "consecutive_hh", "consecutive_ll"].iter().map(|s| SmolStr::new(*s)).collect(),
        StructureKind::Zone => ["lower", "upper", "state", "anchor_idx", "version"].iter().map(|s| SmolStr::new(*s)).collect(),
        StructureKind::RollingWindow => vec![SmolStr::new("value")],
        StructureKind::Fibonacci => (0..levels_count(spec)).map(|i| SmolStr::new(format!("level_{i}"))).collect(),
        StructureKind::DerivedZone => {
            let max_active = spec.param_usize("max_active", 3);
            let mut fields: Vec<SmolStr> = [
                "active_count",
                "any_active",
                "any_touched",
                "any_inside",
                "closest_active_lower",
                "closest_active_upper",
                "closest_active_idx",
                "newest_active_idx",
                "source_version",
            ]
            .iter()
            .map(|s| SmolStr::new(*s))
            .collect();
            for i in 0..max_active {
                for suffix in ["lower", "upper", "state", "anchor_idx", "age_bars", "inside", "touched_this_bar", "touch_count", "instance_id"] {
                    fields.push(SmolStr::new(format!("zone{i}_{suffix}")));
                }
            }
            fields
        }
        StructureKind::MarketStructure => ["regime", "bos", "choch"].iter().map(|s| SmolStr::new(*s)).collect(),
    }
}

#[derive(Debug)]
pub struct FieldSchema {
    roles: IndexMap<TfRole, IndexMap<SmolStr, Vec<SmolStr>>>,
    exec_role: TfRole,
}

impl FieldSchema {
    pub fn from_play(play: &Play) -> Self {
        let mut roles = IndexMap::new();
        for role in TfRole::ALL {
            let mut instances: IndexMap<SmolStr, Vec<SmolStr>> = IndexMap::new();
            if let Some(features) = play.feature_specs.get(&role) {
                for f in features {
                    instances.insert(f.id.clone(), output_keys(f));
                }
            }
            if let Some(structures) = play.structure_specs.get(&role) {
                for s in structures {
                    instances.insert(s.id.clone(), structure_fields(s));
                }
            }
            roles.insert(role, instances);
        }
        Self { roles, exec_role: play.exec_role }
    }

    fn role_for(&self, segment: &str) -> Option<TfRole> {
        match segment {
            "exec" => Some(self.exec_role),
            "low_tf" => Some(TfRole::LowTf),
            "med_tf" => Some(TfRole::MedTf),
            "high_tf" => Some(TfRole::HighTf),
            _ => None,
        }
    }

    /// Validates one dotted path against the declared schema.
    pub fn resolve(&self, path: &str) -> Result<(), LoadError> {
        let undefined = || LoadError::UndefinedField(path.to_string());
        let segments: Vec<&str> = path.split('.').collect();
        match segments.as_slice() {
            ["position", field] => POSITION_FIELDS.contains(field).then_some(()).ok_or_else(undefined),
            ["ledger", field] => LEDGER_FIELDS.contains(field).then_some(()).ok_or_else(undefined),
            ["rollup", field] => {
                if ROLLUP_FIELDS.contains(field) || field.starts_with("touched_") {
                    Ok(())
                } else {
                    Err(undefined())
                }
            }
            [role_seg, instance_id, field] => {
                let role = self.role_for(role_seg).ok_or_else(undefined)?;
                let fields = self.roles[&role].get(*instance_id).ok_or_else(undefined)?;
                fields.iter().any(|f| f == field).then_some(()).ok_or_else(undefined)
            }
            [instance_id, field] => {
                let fields = self.roles[&self.exec_role].get(*instance_id).ok_or_else(undefined)?;
                fields.iter().any(|f| f == field).then_some(()).ok_or_else(undefined)
            }
            _ => Err(undefined()),
        }
    }
}

fn output_keys(spec: &FeatureSpec) -> Vec<SmolStr> {
    playcore_ta::output_keys(spec.kind).iter().map(|s| SmolStr::new(*s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;
    use playcore_model::play::{FeeModel, FundingPolicy, RiskModel, SizingModel, SizingRule, SlippageModel, TfMapping};
    use playcore_model::{IndicatorKind, Timeframe};

    fn play_with_rsi() -> Play {
        Play {
            id: "p".into(),
            symbol_universe: vec!["BTCUSDT".into()],
            tf_mapping: TfMapping { low_tf: Timeframe::M1, med_tf: Timeframe::M15, high_tf: Timeframe::H1 },
            exec_role: TfRole::LowTf,
            feature_specs: indexmap! { TfRole::LowTf => vec![FeatureSpec { id: "rsi".into(), kind: IndicatorKind::Rsi, params: indexmap!{} }] },
            structure_specs: indexmap! {},
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
    fn resolves_implicit_exec_role_indicator_field() {
        let schema = FieldSchema::from_play(&play_with_rsi());
        assert!(schema.resolve("rsi.value").is_ok());
    }

    #[test]
    fn rejects_unknown_field() {
        let schema = FieldSchema::from_play(&play_with_rsi());
        assert!(schema.resolve("rsi.bogus").is_err());
        assert!(schema.resolve("nonexistent.value").is_err());
    }

    #[test]
    fn resolves_reserved_namespaces() {
        let schema = FieldSchema::from_play(&play_with_rsi());
        assert!(schema.resolve("ledger.equity").is_ok());
        assert!(schema.resolve("position.side").is_ok());
    }
}
