use crate::feature_spec::FeatureSpec;
use crate::structure_spec::StructureSpec;
use crate::timeframe::Timeframe;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The three roles a Play binds timeframes to. Which role drives rule
/// evaluation is selected separately via `exec_role`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TfRole {
    LowTf,
    MedTf,
    HighTf,
}

impl TfRole {
    pub const ALL: [TfRole; 3] = [TfRole::LowTf, TfRole::MedTf, TfRole::HighTf];
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct TfMapping {
    pub low_tf: Timeframe,
    pub med_tf: Timeframe,
    pub high_tf: Timeframe,
}

impl TfMapping {
    pub fn tf_for(&self, role: TfRole) -> Timeframe {
        match role {
            TfRole::LowTf => self.low_tf,
            TfRole::MedTf => self.med_tf,
            TfRole::HighTf => self.high_tf,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingModel {
    PercentEquity,
    RiskBased,
    FixedNotional,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct SizingRule {
    pub model: SizingModel,
    pub value: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct StopLossRule {
    pub pct: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct TakeProfitRule {
    pub pct: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeeModel {
    pub taker_bps: f64,
    pub maker_bps: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct SlippageModel {
    pub bps: f64,
}

/// Whether funding is simulated, and with what rate if no funding-rate
/// data source is wired up. The engine must never silently fabricate a
/// rate.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingPolicy {
    Disabled,
    ConstantRate { rate_per_interval: f64 },
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskModel {
    pub sizing: SizingRule,
    pub stop_loss: Option<StopLossRule>,
    pub take_profit: Option<TakeProfitRule>,
    pub max_leverage: f64,
    pub initial_equity: f64,
    pub fees: FeeModel,
    pub slippage: SlippageModel,
    pub funding_interval_hours: f64,
    pub funding: FundingPolicy,
    pub min_trade_notional_usdt: f64,
    pub max_drawdown_stop_pct: Option<f64>,
    pub equity_floor: Option<f64>,
}

/// Per-role feature/structure declarations and the full strategy
/// description bundle.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Play {
    pub id: SmolStr,
    pub symbol_universe: Vec<SmolStr>,
    pub tf_mapping: TfMapping,
    pub exec_role: TfRole,
    pub feature_specs: IndexMap<TfRole, Vec<FeatureSpec>>,
    pub structure_specs: IndexMap<TfRole, Vec<StructureSpec>>,
    /// Rule trees are opaque at this layer (compiled by `playcore-rules`);
    /// the Play carries them as an uninterpreted JSON value so this
    /// crate has no dependency on the rule compiler.
    pub actions: IndexMap<SmolStr, serde_json::Value>,
    pub risk_model: RiskModel,
    pub warmup_bars_by_role: Option<IndexMap<TfRole, i64>>,
    pub delay_bars_by_role: Option<IndexMap<TfRole, i64>>,
}

impl Play {
    pub fn exec_tf(&self) -> Timeframe {
        self.tf_mapping.tf_for(self.exec_role)
    }

    pub fn delay_bars(&self, role: TfRole) -> i64 {
        self.delay_bars_by_role.as_ref().and_then(|m| m.get(&role)).copied().unwrap_or(0)
    }
}
