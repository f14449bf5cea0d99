use crate::order::{ClientOrderId, Side};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum FillKind {
    Entry,
    StopLoss,
    TakeProfit,
    Liquidation,
    ManualClose,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Liquidated,
    Manual,
    SignalExit,
}

impl ExitReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "sl",
            ExitReason::TakeProfit => "tp",
            ExitReason::Liquidated => "liquidation",
            ExitReason::Manual => "manual_close",
            ExitReason::SignalExit => "signal_exit",
        }
    }
}

/// A realized execution of an order.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct Fill {
    pub order_id: ClientOrderId,
    pub side: Side,
    pub price: f64,
    pub qty_in_quote: f64,
    pub fee: f64,
    pub ts_ms: i64,
    pub kind: FillKind,
}

/// A closed round-trip: an entry [`Fill`] paired with the [`Fill`]
/// that closed it. Emitted to the `trades` artifact.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Trade {
    pub trade_id: u64,
    pub symbol: String,
    pub side: Side,
    pub entry_ts_ms: i64,
    pub entry_price: f64,
    pub exit_ts_ms: i64,
    pub exit_price: f64,
    pub size_usdt: f64,
    pub leverage: f64,
    pub realized_pnl: f64,
    pub fees_paid: f64,
    pub net_pnl: f64,
    /// Maximum adverse excursion: worst unrealized loss observed while open.
    pub mae: f64,
    /// Maximum favorable excursion: best unrealized profit observed while open.
    pub mfe: f64,
    pub exit_reason: ExitReason,
}
