//! The read-only, dotted-path view of run state a compiled rule tree
//! evaluates against. Built fresh at every exec-role close and never
//! mutated during that evaluation.
//!
//! Path grammar:
//! - `position.<field>`, `ledger.<field>`, `rollup.<field>` — reserved
//!   namespaces for exchange/accumulator state.
//! - `<role>.<instance_id>.<field>` where `role` is one of
//!   `exec | low_tf | med_tf | high_tf` — an explicit role lookup.
//! - `<instance_id>.<field>` — implicitly the exec role, so a rule
//!   written against the role driving evaluation doesn't need to spell
//!   it out.

use crate::multi_tf_state::MultiTFState;
use playcore_model::{Ledger, Position, Side, TfRole};
use playcore_ta::structures::FieldValue;

pub struct SnapshotView<'a> {
    multi_tf: &'a MultiTFState,
    position: Option<&'a Position>,
    ledger: &'a Ledger,
    mark_price: f64,
    last_price: f64,
}

impl<'a> SnapshotView<'a> {
    pub fn new(multi_tf: &'a MultiTFState, position: Option<&'a Position>, ledger: &'a Ledger, mark_price: f64, last_price: f64) -> Self {
        Self { multi_tf, position, ledger, mark_price, last_price }
    }

    pub fn exec_bar_idx(&self) -> i64 {
        self.multi_tf.exec_bar_idx()
    }

    fn role_for(segment: &str) -> Option<TfRole> {
        match segment {
            "low_tf" => Some(TfRole::LowTf),
            "med_tf" => Some(TfRole::MedTf),
            "high_tf" => Some(TfRole::HighTf),
            _ => None,
        }
    }

    fn position_field(&self, field: &str) -> Option<FieldValue> {
        let pos = self.position?;
        Some(match field {
            "side" => FieldValue::Str(match pos.side { Side::Buy => "buy", Side::Sell => "sell" }.into()),
            "qty_in_quote" => FieldValue::F64(pos.qty_in_quote),
            "entry_price" => FieldValue::F64(pos.entry_price),
            "leverage" => FieldValue::F64(pos.leverage),
            "liquidation_price" => FieldValue::F64(pos.liquidation_price),
            "unrealized_pnl" => FieldValue::F64(pos.unrealized_pnl),
            "margin_locked" => FieldValue::F64(pos.margin_locked),
            "is_open" => FieldValue::Bool(true),
            _ => return None,
        })
    }

    fn ledger_field(&self, field: &str) -> Option<FieldValue> {
        Some(match field {
            "wallet_balance" => FieldValue::F64(self.ledger.wallet_balance),
            "margin_locked" => FieldValue::F64(self.ledger.margin_locked),
            "unrealized_pnl" => FieldValue::F64(self.ledger.unrealized_pnl),
            "equity" => FieldValue::F64(self.ledger.equity()),
            "free_margin" => FieldValue::F64(self.ledger.free_margin()),
            "mark_price" => FieldValue::F64(self.mark_price),
            "last_price" => FieldValue::F64(self.last_price),
            _ => return None,
        })
    }

    /// Resolves one dotted path. Returns `None` for a path that doesn't
    /// exist in this snapshot's schema *at evaluation time* (a position
    /// field when flat); the compiler is what rejects a path that can
    /// never exist at load time.
    pub fn get(&self, path: &str) -> Option<FieldValue> {
        let segments: Vec<&str> = path.split('.').collect();
        match segments.as_slice() {
            ["position", field] => self.position_field(field),
            ["ledger", field] => self.ledger_field(field),
            ["rollup", field] => self.multi_tf.rollup().field(field),
            [role_seg, instance_id, field] => {
                let role = if *role_seg == "exec" { self.multi_tf.exec_role() } else { Self::role_for(role_seg)? };
                self.multi_tf.state(role).field(instance_id, field, self.mark_price)
            }
            [instance_id, field] => self.multi_tf.exec_state().field(instance_id, field, self.mark_price),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playcore_model::play::{FeeModel, FundingPolicy, RiskModel, SizingModel, SizingRule, SlippageModel, TfMapping};
    use playcore_model::{Bar, Play, Timeframe};

    fn minimal_play() -> Play {
        Play {
            id: "p".into(),
            symbol_universe: vec!["BTCUSDT".into()],
            tf_mapping: TfMapping { low_tf: Timeframe::M1, med_tf: Timeframe::M15, high_tf: Timeframe::H1 },
            exec_role: TfRole::LowTf,
            feature_specs: indexmap::indexmap! {},
            structure_specs: indexmap::indexmap! {},
            actions: indexmap::indexmap! {},
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
    fn ledger_equity_resolves_without_an_open_position() {
        let play = minimal_play();
        let mut multi_tf = MultiTFState::build(&play).unwrap();
        multi_tf.update_role(TfRole::LowTf, 0, &Bar::new(60_000, 1.0, 1.0, 1.0, 1.0, 1.0)).unwrap();
        let ledger = Ledger::new(1000.0);
        let view = SnapshotView::new(&multi_tf, None, &ledger, 1.0, 1.0);
        assert_eq!(view.get("ledger.equity"), Some(FieldValue::F64(1000.0)));
        assert_eq!(view.get("position.side"), None);
    }
}
