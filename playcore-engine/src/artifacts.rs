//! Deterministic run artifacts (§4.11, §6.3): trades, equity curve, run
//! manifest, and preflight report, all under a content-addressed
//! directory layout.
//!
//! This module builds the in-memory artifact values and their
//! canonical JSON encodings; it never touches the filesystem itself —
//! callers decide where `<export_root>/<play_id>/...` actually lives,
//! matching §1's "out of scope: persistent historical bar storage"
//! philosophy extended to artifact storage too.

use playcore_model::hash::canonical_json;
use playcore_model::{RunManifest, Trade};
use serde::{Deserialize, Serialize};

/// One row of the equity curve, recorded at every exec-role close
/// (§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct EquityPoint {
    pub ts_close_ms: i64,
    pub wallet_balance: f64,
    pub unrealized_pnl: f64,
    pub equity: f64,
}

/// Everything a completed (or failed-mid-run) backtest produces,
/// ready to be serialized to the deterministic directory layout of
/// §6.3.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
    pub manifest: RunManifest,
    pub preflight_report: Option<serde_json::Value>,
}

impl RunArtifacts {
    /// `<export_root>/<play_id>/<symbol>/<exec_tf>/<window_start>_<window_end>_<run_id>/`
    /// (§6.3). Callers join this onto their export root and create the
    /// directory themselves; this crate has no filesystem dependency.
    pub fn run_dir(&self, play_id: &str) -> String {
        format!(
            "{play_id}/{}/{}/{}_{}_{}",
            self.manifest.symbol, self.manifest.exec_tf, self.manifest.window_start_ms, self.manifest.window_end_ms, self.manifest.run_id
        )
    }

    pub fn trades_json(&self) -> serde_json::Result<String> {
        canonical_json(&self.trades)
    }

    pub fn equity_json(&self) -> serde_json::Result<String> {
        canonical_json(&self.equity)
    }

    pub fn manifest_json(&self) -> serde_json::Result<String> {
        canonical_json(&self.manifest)
    }

    /// Recomputes the equity curve from `trades` plus `initial_equity`
    /// alone, for the round-trip law in §8 ("reloading trades and
    /// recomputing equity from trades + initial equity yields the same
    /// equity curve ... as the emitted curve"). Since trades carry no
    /// intrabar equity samples, this reconstructs only the
    /// post-trade-close wallet balance sequence, which is what the
    /// emitted curve's values settle to at each trade's `exit_ts_ms`.
    pub fn equity_from_trades(initial_equity: f64, trades: &[Trade]) -> Vec<(i64, f64)> {
        let mut balance = initial_equity;
        let mut out = Vec::with_capacity(trades.len());
        for trade in trades {
            balance += trade.net_pnl;
            out.push((trade.exit_ts_ms, balance));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use playcore_model::play::{FeeModel, FundingPolicy, RiskModel, SizingModel, SizingRule, SlippageModel, TfMapping};
    use playcore_model::{ExitReason, Play, Side, TfRole, Timeframe};

    fn sample_play() -> Play {
        Play {
            id: "p1".into(),
            symbol_universe: vec!["BTCUSDT".into()],
            tf_mapping: TfMapping { low_tf: Timeframe::M1, med_tf: Timeframe::H1, high_tf: Timeframe::D1 },
            exec_role: TfRole::LowTf,
            feature_specs: indexmap::indexmap! {},
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

    fn trade(id: u64, ts: i64, net_pnl: f64) -> Trade {
        Trade {
            trade_id: id,
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            entry_ts_ms: ts - 1000,
            entry_price: 100.0,
            exit_ts_ms: ts,
            exit_price: 101.0,
            size_usdt: 100.0,
            leverage: 1.0,
            realized_pnl: net_pnl,
            fees_paid: 0.0,
            net_pnl,
            mae: 0.0,
            mfe: net_pnl.max(0.0),
            exit_reason: ExitReason::SignalExit,
        }
    }

    #[test]
    fn run_dir_matches_the_deterministic_layout() {
        let play = sample_play();
        let manifest = RunManifest::new(&play, "BTCUSDT", 0, 1_000_000, IndexMap::new(), IndexMap::new(), None).unwrap();
        let artifacts = RunArtifacts { trades: vec![], equity: vec![], manifest: manifest.clone(), preflight_report: None };
        let dir = artifacts.run_dir("p1");
        assert_eq!(dir, format!("p1/BTCUSDT/1m/0_1000000_{}", manifest.run_id));
    }

    #[test]
    fn equity_from_trades_accumulates_net_pnl() {
        let trades = vec![trade(0, 1000, 50.0), trade(1, 2000, -20.0)];
        let curve = RunArtifacts::equity_from_trades(10_000.0, &trades);
        assert_eq!(curve, vec![(1000, 10_050.0), (2000, 10_030.0)]);
    }

    #[test]
    fn manifest_json_is_deterministic_across_calls() {
        let play = sample_play();
        let manifest = RunManifest::new(&play, "BTCUSDT", 0, 1_000_000, IndexMap::new(), IndexMap::new(), None).unwrap();
        let artifacts = RunArtifacts { trades: vec![], equity: vec![], manifest, preflight_report: None };
        assert_eq!(artifacts.manifest_json().unwrap(), artifacts.manifest_json().unwrap());
    }
}
