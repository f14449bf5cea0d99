use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum OrderKind {
    Market,
    Limit,
    StopMarket,
    StopLimit,
    TakeProfit,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum TimeInForce {
    GoodTilCancel,
    ImmediateOrCancel,
    FillOrKill,
}

/// An order's lifecycle state; mirrors the simulated account's
/// internal phases without exposing a pointer-based state graph.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum OrderState {
    Open,
    Filled,
    Cancelled,
}

/// A deterministic, monotonically-assigned client order id.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
pub struct ClientOrderId(pub u64);

/// An order intent or resting order within the simulated exchange.
/// `link_id` ties bracket orders (stop-loss / take-profit) back to the
/// entry that spawned them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub client_id: ClientOrderId,
    pub side: Side,
    pub kind: OrderKind,
    pub qty_in_quote: f64,
    pub price: Option<f64>,
    pub trigger_price: Option<f64>,
    pub reduce_only: bool,
    pub tif: TimeInForce,
    pub link_id: Option<ClientOrderId>,
    pub state: OrderState,
    pub tag: SmolStr,
}

impl Order {
    pub fn market(client_id: ClientOrderId, side: Side, qty_in_quote: f64, tag: impl Into<SmolStr>) -> Self {
        Self {
            client_id,
            side,
            kind: OrderKind::Market,
            qty_in_quote,
            price: None,
            trigger_price: None,
            reduce_only: false,
            tif: TimeInForce::ImmediateOrCancel,
            link_id: None,
            state: OrderState::Open,
            tag: tag.into(),
        }
    }

    pub fn stop(
        client_id: ClientOrderId,
        side: Side,
        qty_in_quote: f64,
        trigger_price: f64,
        link_id: ClientOrderId,
        tag: impl Into<SmolStr>,
    ) -> Self {
        Self {
            client_id,
            side,
            kind: OrderKind::StopMarket,
            qty_in_quote,
            price: None,
            trigger_price: Some(trigger_price),
            reduce_only: true,
            tif: TimeInForce::GoodTilCancel,
            link_id: Some(link_id),
            state: OrderState::Open,
            tag: tag.into(),
        }
    }

    pub fn take_profit(
        client_id: ClientOrderId,
        side: Side,
        qty_in_quote: f64,
        trigger_price: f64,
        link_id: ClientOrderId,
        tag: impl Into<SmolStr>,
    ) -> Self {
        Self {
            client_id,
            side,
            kind: OrderKind::TakeProfit,
            qty_in_quote,
            price: None,
            trigger_price: Some(trigger_price),
            reduce_only: true,
            tif: TimeInForce::GoodTilCancel,
            link_id: Some(link_id),
            state: OrderState::Open,
            tag: tag.into(),
        }
    }
}
