use crate::order::Side;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// An isolated-margin position in a single symbol. At most one
/// [`Position`] exists per symbol at any time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub symbol: SmolStr,
    pub side: Side,
    pub qty_in_quote: f64,
    pub entry_price: f64,
    pub leverage: f64,
    pub liquidation_price: f64,
    pub unrealized_pnl: f64,
    pub margin_locked: f64,
}

/// Maintenance margin rate used in liquidation-price calculations; a
/// fixed constant in lieu of a tiered maintenance-margin schedule.
/// Isolated margin only.
pub const MAINTENANCE_MARGIN_RATE: f64 = 0.005;

impl Position {
    pub fn open(
        symbol: impl Into<SmolStr>,
        side: Side,
        qty_in_quote: f64,
        entry_price: f64,
        leverage: f64,
    ) -> Self {
        let margin_locked = qty_in_quote / leverage;
        let mut position = Self {
            symbol: symbol.into(),
            side,
            qty_in_quote,
            entry_price,
            leverage,
            liquidation_price: 0.0,
            unrealized_pnl: 0.0,
            margin_locked,
        };
        position.recompute_liquidation_price();
        position
    }

    /// Liquidation price for isolated margin:
    /// `entry * (1 - 1/leverage + maintenance_margin_rate)` for longs,
    /// symmetric for shorts.
    pub fn recompute_liquidation_price(&mut self) {
        let inv_lev = 1.0 / self.leverage;
        self.liquidation_price = match self.side {
            Side::Buy => self.entry_price * (1.0 - inv_lev + MAINTENANCE_MARGIN_RATE),
            Side::Sell => self.entry_price * (1.0 + inv_lev - MAINTENANCE_MARGIN_RATE),
        };
    }

    /// Recompute unrealized PnL against a mark price; never mutates
    /// `liquidation_price` since that depends only on notional-changing
    /// events, not mark movement.
    pub fn mark_to_market(&mut self, mark_price: f64) {
        let signed_qty = self.qty_in_quote / self.entry_price;
        self.unrealized_pnl = match self.side {
            Side::Buy => signed_qty * (mark_price - self.entry_price),
            Side::Sell => signed_qty * (self.entry_price - mark_price),
        };
    }

    pub fn is_liquidated_at(&self, mark_price: f64) -> bool {
        match self.side {
            Side::Buy => mark_price <= self.liquidation_price,
            Side::Sell => mark_price >= self.liquidation_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_liquidation_price_below_entry() {
        let pos = Position::open("BTCUSDT", Side::Buy, 1000.0, 100.0, 10.0);
        assert!(pos.liquidation_price < 100.0);
        assert!((pos.liquidation_price - 100.0 * (1.0 - 0.1 + 0.005)).abs() < 1e-9);
    }

    #[test]
    fn short_liquidation_price_above_entry() {
        let pos = Position::open("BTCUSDT", Side::Sell, 1000.0, 100.0, 10.0);
        assert!(pos.liquidation_price > 100.0);
    }

    #[test]
    fn mark_to_market_long_profits_on_rally() {
        let mut pos = Position::open("BTCUSDT", Side::Buy, 1000.0, 100.0, 1.0);
        pos.mark_to_market(110.0);
        assert!(pos.unrealized_pnl > 0.0);
    }

    #[test]
    fn liquidation_touch_detected_for_long() {
        let pos = Position::open("BTCUSDT", Side::Buy, 1000.0, 100.0, 10.0);
        assert!(pos.is_liquidated_at(pos.liquidation_price));
        assert!(!pos.is_liquidated_at(pos.liquidation_price + 1.0));
    }
}
