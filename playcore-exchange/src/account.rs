//! The simulated exchange account: ledger, at-most-one position,
//! resting bracket orders, and the per-1m-bar step that realizes fills
//! along the deterministic intrabar path (§4.9).

use crate::error::ExchangeError;
use crate::intrabar::intrabar_path;
use crate::sizing;
use playcore_model::play::{FeeModel, FundingPolicy};
use playcore_model::{
    Bar, ClientOrderId, Direction, ExitReason, Fill, FillKind, Ledger, Order, OrderKind, Position, RiskModel,
    RuntimeError, Side, Signal, TerminalStopReason, Trade,
};
use smol_str::SmolStr;
use tracing::{debug, warn};

/// A signal, already translated to a notional and tagged, awaiting
/// submission to the exchange. The engine builds this from a
/// [`Signal`] plus the Play's `risk_model`.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub direction: Direction,
    pub notional: f64,
    pub tag: SmolStr,
}

impl OrderIntent {
    pub fn from_signal(signal: &Signal, risk_model: &RiskModel, equity: f64) -> Result<Self, RuntimeError> {
        let stop_distance_pct = risk_model.stop_loss.map(|sl| sl.pct);
        let notional = sizing::compute_notional(&risk_model.sizing, signal, equity, risk_model.max_leverage, stop_distance_pct)?;
        Ok(Self { direction: signal.direction, notional, tag: signal.tag.clone() })
    }
}

/// A market order queued at one exec step, realized at the next 1m
/// bar's open (§4.9: "market orders fill at the next 1m open with
/// slippage applied").
#[derive(Debug, Clone)]
enum Pending {
    Entry { client_id: ClientOrderId, side: Side, notional: f64, tag: SmolStr },
    Exit { reason: ExitReason },
}

#[derive(Debug, Clone)]
struct OpenTrade {
    entry_fill: Fill,
    mae: f64,
    mfe: f64,
}

/// Deterministic order/position/ledger simulation for a single symbol
/// under isolated margin. Consumes one closed 1m bar at a time via
/// [`Self::apply_bar`]; strategy-level order intents arrive via
/// [`Self::submit`].
#[derive(Debug)]
pub struct SimulatedExchange {
    symbol: SmolStr,
    ledger: Ledger,
    position: Option<Position>,
    open_orders: Vec<Order>,
    pending: Vec<Pending>,
    open_trade: Option<OpenTrade>,
    trades: Vec<Trade>,
    mark_price: f64,
    last_price: f64,
    next_client_id: u64,
    next_trade_id: u64,
    fees: FeeModel,
    slippage_bps: f64,
    max_leverage: f64,
    min_trade_notional_usdt: f64,
    stop_loss_pct: Option<f64>,
    take_profit_pct: Option<f64>,
    funding_interval_ms: i64,
    funding_policy: FundingPolicy,
    next_funding_ts_ms: Option<i64>,
    max_drawdown_stop_pct: Option<f64>,
    equity_floor: Option<f64>,
    peak_equity: f64,
    initial_equity: f64,
}

impl SimulatedExchange {
    pub fn new(symbol: impl Into<SmolStr>, risk_model: &RiskModel) -> Self {
        Self {
            symbol: symbol.into(),
            ledger: Ledger::new(risk_model.initial_equity),
            position: None,
            open_orders: Vec::new(),
            pending: Vec::new(),
            open_trade: None,
            trades: Vec::new(),
            mark_price: f64::NAN,
            last_price: f64::NAN,
            next_client_id: 0,
            next_trade_id: 0,
            fees: risk_model.fees,
            slippage_bps: risk_model.slippage.bps,
            max_leverage: risk_model.max_leverage,
            min_trade_notional_usdt: risk_model.min_trade_notional_usdt,
            stop_loss_pct: risk_model.stop_loss.map(|sl| sl.pct),
            take_profit_pct: risk_model.take_profit.map(|tp| tp.pct),
            funding_interval_ms: (risk_model.funding_interval_hours * 3_600_000.0) as i64,
            funding_policy: risk_model.funding,
            next_funding_ts_ms: None,
            max_drawdown_stop_pct: risk_model.max_drawdown_stop_pct,
            equity_floor: risk_model.equity_floor,
            peak_equity: risk_model.initial_equity,
            initial_equity: risk_model.initial_equity,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn mark_price(&self) -> f64 {
        self.mark_price
    }

    pub fn last_price(&self) -> f64 {
        self.last_price
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    fn alloc_client_id(&mut self) -> ClientOrderId {
        let id = ClientOrderId(self.next_client_id);
        self.next_client_id += 1;
        id
    }

    fn fee_bps_for(&self, kind: OrderKind) -> f64 {
        match kind {
            OrderKind::Limit => self.fees.maker_bps,
            _ => self.fees.taker_bps,
        }
    }

    fn fee_for(&self, notional: f64, kind: OrderKind) -> f64 {
        notional * self.fee_bps_for(kind) / 10_000.0
    }

    /// Validates and queues an order intent. Entries fill on the next
    /// 1m open; [`Direction::Exit`] queues a market close the same way.
    pub fn submit(&mut self, intent: OrderIntent) -> Result<ClientOrderId, ExchangeError> {
        match intent.direction {
            Direction::Exit => {
                if self.position.is_none() {
                    return Err(ExchangeError::NoOpenPosition);
                }
                let client_id = self.alloc_client_id();
                self.pending.push(Pending::Exit { reason: ExitReason::SignalExit });
                Ok(client_id)
            }
            Direction::Long | Direction::Short => {
                if self.position.is_some() {
                    return Err(ExchangeError::PositionAlreadyOpen);
                }
                if intent.notional < self.min_trade_notional_usdt {
                    return Err(ExchangeError::BelowMinNotional { notional: intent.notional, minimum: self.min_trade_notional_usdt });
                }
                let required_margin = intent.notional / self.max_leverage;
                if required_margin > self.ledger.free_margin() + 1e-9 {
                    return Err(ExchangeError::InsufficientMargin { required: required_margin, available: self.ledger.free_margin() });
                }
                let side = if intent.direction == Direction::Long { Side::Buy } else { Side::Sell };
                let client_id = self.alloc_client_id();
                self.pending.push(Pending::Entry { client_id, side, notional: intent.notional, tag: intent.tag });
                Ok(client_id)
            }
        }
    }

    /// Cancels a resting bracket order; a no-op if the id is unknown or
    /// already filled.
    pub fn cancel(&mut self, order_id: ClientOrderId) {
        self.open_orders.retain(|o| o.client_id != order_id);
    }

    /// Queues a market close of the current position, if any.
    pub fn close_position(&mut self, reason: ExitReason) {
        if self.position.is_some() {
            self.pending.push(Pending::Exit { reason });
        }
    }

    fn slippage_adjusted(&self, side: Side, price: f64) -> f64 {
        let bps = self.slippage_bps / 10_000.0;
        match side {
            Side::Buy => price * (1.0 + bps),
            Side::Sell => price * (1.0 - bps),
        }
    }

    fn realize_entry(&mut self, side: Side, notional: f64, tag: SmolStr, open_price: f64, ts_ms: i64) {
        let fill_price = self.slippage_adjusted(side, open_price);
        let fee = self.fee_for(notional, OrderKind::Market);
        let position = Position::open(self.symbol.clone(), side, notional, fill_price, self.max_leverage);
        self.ledger.lock_margin(position.margin_locked);
        self.ledger.apply_fee(fee);

        let entry_fill = Fill { order_id: ClientOrderId(0), side, price: fill_price, qty_in_quote: notional, fee, ts_ms, kind: FillKind::Entry };
        self.open_trade = Some(OpenTrade { entry_fill, mae: 0.0, mfe: 0.0 });

        if let Some(sl_pct) = self.stop_loss_pct {
            let trigger = match side {
                Side::Buy => fill_price * (1.0 - sl_pct),
                Side::Sell => fill_price * (1.0 + sl_pct),
            };
            let sl_id = self.alloc_client_id();
            self.open_orders.push(Order::stop(sl_id, side.opposite(), notional, trigger, sl_id, format!("{tag}/sl")));
        }
        if let Some(tp_pct) = self.take_profit_pct {
            let trigger = match side {
                Side::Buy => fill_price * (1.0 + tp_pct),
                Side::Sell => fill_price * (1.0 - tp_pct),
            };
            let tp_id = self.alloc_client_id();
            self.open_orders.push(Order::take_profit(tp_id, side.opposite(), notional, trigger, tp_id, format!("{tag}/tp")));
        }
        self.position = Some(position);
        debug!(symbol = %self.symbol, %side, notional, fill_price, "entry filled");
    }

    fn close_trade_record(&mut self, exit_price: f64, ts_ms: i64, reason: ExitReason, fee: f64) {
        let Some(position) = self.position.take() else { return };
        let Some(open_trade) = self.open_trade.take() else { return };
        let mut closing = position.clone();
        closing.mark_to_market(exit_price);
        let realized_pnl = closing.unrealized_pnl;

        self.ledger.apply_realized_pnl(realized_pnl);
        self.ledger.apply_fee(fee);
        self.ledger.release_margin(position.margin_locked);
        self.ledger.unrealized_pnl = 0.0;

        let trade = Trade {
            trade_id: self.next_trade_id,
            symbol: self.symbol.to_string(),
            side: position.side,
            entry_ts_ms: open_trade.entry_fill.ts_ms,
            entry_price: open_trade.entry_fill.price,
            exit_ts_ms: ts_ms,
            exit_price,
            size_usdt: position.qty_in_quote,
            leverage: position.leverage,
            realized_pnl,
            fees_paid: open_trade.entry_fill.fee + fee,
            net_pnl: realized_pnl - open_trade.entry_fill.fee - fee,
            mae: open_trade.mae,
            mfe: open_trade.mfe,
            exit_reason: reason,
        };
        self.next_trade_id += 1;
        self.trades.push(trade);
        self.open_orders.clear();
    }

    /// Isolated margin caps loss at the posted margin: liquidation
    /// forfeits `margin_locked` outright rather than realizing whatever
    /// PnL the mark price implies, which can overshoot the actual loss
    /// once the position is closed at the liquidation price itself.
    fn close_via_liquidation(&mut self, liq_price: f64, ts_ms: i64) {
        let Some(position) = self.position.take() else { return };
        let Some(open_trade) = self.open_trade.take() else { return };
        let forfeited = position.margin_locked;
        self.ledger.forfeit_margin();
        self.ledger.unrealized_pnl = 0.0;

        let trade = Trade {
            trade_id: self.next_trade_id,
            symbol: self.symbol.to_string(),
            side: position.side,
            entry_ts_ms: open_trade.entry_fill.ts_ms,
            entry_price: open_trade.entry_fill.price,
            exit_ts_ms: ts_ms,
            exit_price: liq_price,
            size_usdt: position.qty_in_quote,
            leverage: position.leverage,
            realized_pnl: -forfeited,
            fees_paid: open_trade.entry_fill.fee,
            net_pnl: -forfeited - open_trade.entry_fill.fee,
            mae: open_trade.mae,
            mfe: open_trade.mfe,
            exit_reason: ExitReason::Liquidated,
        };
        self.next_trade_id += 1;
        self.trades.push(trade);
        self.open_orders.clear();
        warn!(symbol = %self.symbol, liq_price, "position liquidated");
    }

    fn fill_pending(&mut self, open_price: f64, ts_ms: i64) {
        let pending = std::mem::take(&mut self.pending);
        for item in pending {
            match item {
                Pending::Entry { side, notional, tag, .. } => {
                    if self.position.is_some() {
                        warn!("dropping queued entry: position already open by the time it was due to fill");
                        continue;
                    }
                    self.realize_entry(side, notional, tag, open_price, ts_ms);
                }
                Pending::Exit { reason } => {
                    let Some(position) = &self.position else { continue };
                    let side = position.side;
                    let exit_price = self.slippage_adjusted(side.opposite(), open_price);
                    let notional = position.qty_in_quote;
                    let fee = self.fee_for(notional, OrderKind::Market);
                    self.close_trade_record(exit_price, ts_ms, reason, fee);
                }
            }
        }
    }

    /// First resting bracket order (stop-loss or take-profit) touched
    /// at `price`. Stop-loss is checked before take-profit when both
    /// would trigger at the same path point — an arbitrary but fixed
    /// and documented tie-break (§9 open question).
    fn triggered_bracket(&self, price: f64) -> Option<usize> {
        let Some(position) = &self.position else { return None };
        let mut tp_idx = None;
        for (i, order) in self.open_orders.iter().enumerate() {
            let triggered = match (order.kind, position.side) {
                (OrderKind::StopMarket, Side::Buy) => price <= order.trigger_price.unwrap_or(f64::NEG_INFINITY),
                (OrderKind::StopMarket, Side::Sell) => price >= order.trigger_price.unwrap_or(f64::INFINITY),
                (OrderKind::TakeProfit, Side::Buy) => price >= order.trigger_price.unwrap_or(f64::INFINITY),
                (OrderKind::TakeProfit, Side::Sell) => price <= order.trigger_price.unwrap_or(f64::NEG_INFINITY),
                _ => false,
            };
            if !triggered {
                continue;
            }
            if order.kind == OrderKind::StopMarket {
                return Some(i);
            }
            tp_idx.get_or_insert(i);
        }
        tp_idx
    }

    /// Updates mark-to-market state and checks liquidation/bracket
    /// touches at one point of the intrabar path. Returns
    /// `Some(reason)` if the run must terminate (liquidation).
    fn step_price_point(&mut self, price: f64, ts_ms: i64) -> Option<TerminalStopReason> {
        self.mark_price = price;
        let Some(position) = &mut self.position else { return None };
        position.mark_to_market(price);
        if let Some(trade) = &mut self.open_trade {
            trade.mae = trade.mae.min(position.unrealized_pnl);
            trade.mfe = trade.mfe.max(position.unrealized_pnl);
        }

        if position.is_liquidated_at(price) {
            let liq_price = position.liquidation_price;
            self.close_via_liquidation(liq_price, ts_ms);
            return Some(TerminalStopReason::Liquidated);
        }

        if let Some(idx) = self.triggered_bracket(price) {
            let order = self.open_orders.remove(idx);
            let trigger_price = order.trigger_price.expect("bracket orders always carry a trigger price");
            let fee = self.fee_for(order.qty_in_quote, order.kind);
            let reason = if order.kind == OrderKind::StopMarket { ExitReason::StopLoss } else { ExitReason::TakeProfit };
            self.close_trade_record(trigger_price, ts_ms, reason, fee);
        }
        None
    }

    fn maybe_apply_funding(&mut self, ts_ms: i64) {
        let FundingPolicy::ConstantRate { rate_per_interval } = self.funding_policy else { return };
        if self.position.is_none() {
            return;
        }
        let interval = self.funding_interval_ms.max(1);
        let next = *self.next_funding_ts_ms.get_or_insert_with(|| {
            let rem = ts_ms.rem_euclid(interval);
            if rem == 0 { ts_ms } else { ts_ms - rem + interval }
        });
        if ts_ms < next {
            return;
        }
        let payment = self.position.as_ref().expect("checked above").qty_in_quote * rate_per_interval;
        self.ledger.apply_funding(payment);
        self.next_funding_ts_ms = Some(next + interval);
        debug!(symbol = %self.symbol, payment, "funding applied");
    }

    fn check_terminal_stops(&self) -> Option<TerminalStopReason> {
        let equity = self.ledger.equity();
        if let Some(floor) = self.equity_floor {
            if equity <= floor {
                return Some(TerminalStopReason::EquityFloorStop);
            }
        }
        if let Some(dd_pct) = self.max_drawdown_stop_pct {
            if equity < self.peak_equity * (1.0 - dd_pct) {
                return Some(TerminalStopReason::MaxDrawdownStop);
            }
        }
        None
    }

    /// Advances the exchange by one closed 1m bar: fills pending
    /// market orders at `bar.open`, walks the deterministic intrabar
    /// path realizing bracket/liquidation touches, then applies
    /// funding. Returns `Some(reason)` if a terminal stop fired.
    pub fn apply_bar(&mut self, bar: &Bar) -> Option<TerminalStopReason> {
        self.fill_pending(bar.open, bar.ts_close_ms);

        for price in intrabar_path(bar) {
            if let Some(reason) = self.step_price_point(price, bar.ts_close_ms) {
                self.last_price = price;
                return Some(reason);
            }
        }
        self.last_price = bar.close;
        self.peak_equity = self.peak_equity.max(self.ledger.equity());

        self.maybe_apply_funding(bar.ts_close_ms);
        self.check_terminal_stops()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playcore_model::play::{FeeModel as PlayFeeModel, FundingPolicy as PlayFunding, SizingModel, SizingRule, SlippageModel, StopLossRule, TakeProfitRule};

    fn risk_model() -> RiskModel {
        RiskModel {
            sizing: SizingRule { model: SizingModel::PercentEquity, value: 0.1 },
            stop_loss: Some(StopLossRule { pct: 0.01 }),
            take_profit: Some(TakeProfitRule { pct: 0.02 }),
            max_leverage: 1.0,
            initial_equity: 10_000.0,
            fees: PlayFeeModel { taker_bps: 0.0, maker_bps: 0.0 },
            slippage: SlippageModel { bps: 0.0 },
            funding_interval_hours: 8.0,
            funding: PlayFunding::Disabled,
            min_trade_notional_usdt: 10.0,
            max_drawdown_stop_pct: None,
            equity_floor: None,
        }
    }

    fn bar(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar::new(ts, o, h, l, c, 1.0)
    }

    #[test]
    fn entry_fills_at_next_bar_open_not_submit_price() {
        let risk = risk_model();
        let mut exch = SimulatedExchange::new("BTCUSDT", &risk);
        let intent = OrderIntent { direction: Direction::Long, notional: 1_000.0, tag: "enter".into() };
        exch.submit(intent).unwrap();
        assert!(exch.position().is_none());
        exch.apply_bar(&bar(60_000, 100.0, 101.0, 99.0, 100.5));
        let pos = exch.position().unwrap();
        assert_eq!(pos.entry_price, 100.0);
    }

    #[test]
    fn stop_loss_closes_position_and_records_trade() {
        let risk = risk_model();
        let mut exch = SimulatedExchange::new("BTCUSDT", &risk);
        exch.submit(OrderIntent { direction: Direction::Long, notional: 1_000.0, tag: "enter".into() }).unwrap();
        exch.apply_bar(&bar(60_000, 100.0, 101.0, 99.0, 100.5));
        assert!(exch.position().is_some());
        // Stop at 99.0 (1%); a bar that dips to 98 should trigger it.
        exch.apply_bar(&bar(120_000, 100.5, 100.6, 98.0, 99.5));
        assert!(exch.position().is_none());
        assert_eq!(exch.trades().len(), 1);
        assert_eq!(exch.trades()[0].exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn liquidation_force_closes_and_forfeits_margin() {
        let mut risk = risk_model();
        risk.max_leverage = 10.0;
        risk.stop_loss = None;
        risk.take_profit = None;
        let mut exch = SimulatedExchange::new("BTCUSDT", &risk);
        exch.submit(OrderIntent { direction: Direction::Long, notional: 5_000.0, tag: "enter".into() }).unwrap();
        exch.apply_bar(&bar(60_000, 100.0, 101.0, 99.0, 100.5));
        let liq_price = exch.position().unwrap().liquidation_price;
        let gap_low = liq_price - 5.0;
        let reason = exch.apply_bar(&bar(120_000, 100.5, 100.6, gap_low, gap_low + 0.5));
        assert_eq!(reason, Some(TerminalStopReason::Liquidated));
        assert!(exch.position().is_none());
        assert_eq!(exch.trades()[0].exit_reason, ExitReason::Liquidated);
    }

    #[test]
    fn submit_rejects_below_min_notional() {
        let risk = risk_model();
        let mut exch = SimulatedExchange::new("BTCUSDT", &risk);
        let err = exch.submit(OrderIntent { direction: Direction::Long, notional: 1.0, tag: "enter".into() });
        assert!(matches!(err, Err(ExchangeError::BelowMinNotional { .. })));
    }

    #[test]
    fn submit_rejects_second_entry_while_position_open() {
        let risk = risk_model();
        let mut exch = SimulatedExchange::new("BTCUSDT", &risk);
        exch.submit(OrderIntent { direction: Direction::Long, notional: 1_000.0, tag: "a".into() }).unwrap();
        exch.apply_bar(&bar(60_000, 100.0, 101.0, 99.0, 100.5));
        let err = exch.submit(OrderIntent { direction: Direction::Long, notional: 1_000.0, tag: "b".into() });
        assert!(matches!(err, Err(ExchangeError::PositionAlreadyOpen)));
    }
}
