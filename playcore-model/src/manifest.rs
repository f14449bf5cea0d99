use crate::error::TerminalStopReason;
use crate::hash::{content_hash, short_hash};
use crate::play::{Play, TfRole};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Deterministic summary of a run, sufficient to identify its inputs
/// and status.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunManifest {
    pub play_hash: String,
    pub pipeline_version: String,
    pub run_id: String,
    pub symbol: String,
    pub exec_tf: String,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    pub warmup_by_role: IndexMap<TfRole, i64>,
    pub delay_by_role: IndexMap<TfRole, i64>,
    pub fee_model: crate::play::FeeModel,
    pub slippage_bps: f64,
    pub leverage: f64,
    pub initial_equity: f64,
    pub terminal_stop_reason: Option<TerminalStopReason>,
    /// Records the engine's chosen tie-break for intrabar SL/TP
    /// collisions in the same 1m bar: always
    /// `"low_first_or_high_first_by_bar_direction"` for this
    /// implementation.
    pub intrabar_tie_break_policy: String,
}

pub const PIPELINE_VERSION: &str = "playcore/0.1.0";
pub const INTRABAR_TIE_BREAK_POLICY: &str = "low_first_or_high_first_by_bar_direction";

impl RunManifest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        play: &Play,
        symbol: &str,
        window_start_ms: i64,
        window_end_ms: i64,
        warmup_by_role: IndexMap<TfRole, i64>,
        delay_by_role: IndexMap<TfRole, i64>,
        terminal_stop_reason: Option<TerminalStopReason>,
    ) -> serde_json::Result<Self> {
        let play_hash = content_hash(play)?;
        let run_id = short_hash(&[&play_hash, &window_start_ms.to_string(), &window_end_ms.to_string(), symbol]);
        Ok(Self {
            play_hash,
            pipeline_version: PIPELINE_VERSION.to_string(),
            run_id,
            symbol: symbol.to_string(),
            exec_tf: play.exec_tf().to_string(),
            window_start_ms,
            window_end_ms,
            warmup_by_role,
            delay_by_role,
            fee_model: play.risk_model.fees,
            slippage_bps: play.risk_model.slippage.bps,
            leverage: play.risk_model.max_leverage,
            initial_equity: play.risk_model.initial_equity,
            terminal_stop_reason,
            intrabar_tie_break_policy: INTRABAR_TIE_BREAK_POLICY.to_string(),
        })
    }

    pub fn success(&self) -> bool {
        self.terminal_stop_reason.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_spec::IndicatorKind;
    use crate::play::{FeeModel, FundingPolicy, RiskModel, SizingModel, SizingRule, SlippageModel, TfMapping};
    use crate::timeframe::Timeframe;
    use crate::FeatureSpec;
    use indexmap::indexmap;

    fn sample_play() -> Play {
        Play {
            id: "p1".into(),
            symbol_universe: vec!["BTCUSDT".into()],
            tf_mapping: TfMapping { low_tf: Timeframe::M1, med_tf: Timeframe::H1, high_tf: Timeframe::D1 },
            exec_role: TfRole::LowTf,
            feature_specs: indexmap! { TfRole::LowTf => vec![FeatureSpec {
                id: "ema9".into(),
                kind: IndicatorKind::Ema,
                params: indexmap! { "length".into() => crate::feature_spec::Scalar::Int(9) },
            }] },
            structure_specs: IndexMap::new(),
            actions: IndexMap::new(),
            risk_model: RiskModel {
                sizing: SizingRule { model: SizingModel::PercentEquity, value: 0.01 },
                stop_loss: None,
                take_profit: None,
                max_leverage: 1.0,
                initial_equity: 10_000.0,
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
    fn run_id_is_deterministic_across_identical_inputs() {
        let play = sample_play();
        let m1 = RunManifest::new(&play, "BTCUSDT", 0, 1_000_000, IndexMap::new(), IndexMap::new(), None).unwrap();
        let m2 = RunManifest::new(&play, "BTCUSDT", 0, 1_000_000, IndexMap::new(), IndexMap::new(), None).unwrap();
        assert_eq!(m1.run_id, m2.run_id);
        assert_eq!(m1.play_hash, m2.play_hash);
    }

    #[test]
    fn run_id_changes_with_window() {
        let play = sample_play();
        let m1 = RunManifest::new(&play, "BTCUSDT", 0, 1_000_000, IndexMap::new(), IndexMap::new(), None).unwrap();
        let m2 = RunManifest::new(&play, "BTCUSDT", 0, 2_000_000, IndexMap::new(), IndexMap::new(), None).unwrap();
        assert_ne!(m1.run_id, m2.run_id);
    }

    #[test]
    fn terminal_stop_marks_run_unsuccessful() {
        let play = sample_play();
        let manifest = RunManifest::new(
            &play, "BTCUSDT", 0, 1_000_000, IndexMap::new(), IndexMap::new(),
            Some(TerminalStopReason::Liquidated),
        ).unwrap();
        assert!(!manifest.success());
    }

    #[test]
    fn manifest_round_trips_through_serde() {
        let play = sample_play();
        let manifest = RunManifest::new(&play, "BTCUSDT", 0, 1_000_000, IndexMap::new(), IndexMap::new(), None).unwrap();
        let json = serde_json::to_string(&manifest).unwrap();
        let back: RunManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest, back);
    }
}
