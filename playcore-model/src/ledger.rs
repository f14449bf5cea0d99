use serde::{Deserialize, Serialize};

/// Wallet balance, locked margin, and unrealized PnL for a single run.
/// `equity = wallet_balance + unrealized_pnl`.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct Ledger {
    pub wallet_balance: f64,
    pub margin_locked: f64,
    pub unrealized_pnl: f64,
}

impl Ledger {
    pub fn new(initial_equity: f64) -> Self {
        Self { wallet_balance: initial_equity, margin_locked: 0.0, unrealized_pnl: 0.0 }
    }

    pub fn equity(&self) -> f64 {
        self.wallet_balance + self.unrealized_pnl
    }

    pub fn free_margin(&self) -> f64 {
        self.wallet_balance - self.margin_locked
    }

    /// Invariant check used by the exchange after every mutating step:
    /// `margin_locked <= wallet_balance`, except mid-way through a
    /// liquidation realization, which the caller is responsible for
    /// sequencing around this check.
    pub fn margin_within_wallet(&self) -> bool {
        self.margin_locked <= self.wallet_balance + 1e-9
    }

    pub fn apply_realized_pnl(&mut self, pnl: f64) {
        self.wallet_balance += pnl;
    }

    pub fn apply_fee(&mut self, fee: f64) {
        self.wallet_balance -= fee;
    }

    pub fn apply_funding(&mut self, payment: f64) {
        self.wallet_balance -= payment;
    }

    pub fn lock_margin(&mut self, amount: f64) {
        self.margin_locked += amount;
    }

    pub fn release_margin(&mut self, amount: f64) {
        self.margin_locked = (self.margin_locked - amount).max(0.0);
    }

    /// Forfeits locked margin entirely; used only for a liquidation
    /// realization, where the wallet balance is reduced by the full
    /// locked amount.
    pub fn forfeit_margin(&mut self) {
        self.wallet_balance -= self.margin_locked;
        self.margin_locked = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equity_sums_wallet_and_unrealized() {
        let ledger = Ledger { wallet_balance: 100.0, margin_locked: 10.0, unrealized_pnl: -5.0 };
        assert_eq!(ledger.equity(), 95.0);
    }

    #[test]
    fn forfeit_margin_reduces_wallet_balance() {
        let mut ledger = Ledger::new(1000.0);
        ledger.lock_margin(100.0);
        ledger.forfeit_margin();
        assert_eq!(ledger.wallet_balance, 900.0);
        assert_eq!(ledger.margin_locked, 0.0);
    }

    #[test]
    fn margin_within_wallet_holds_after_normal_ops() {
        let mut ledger = Ledger::new(1000.0);
        ledger.lock_margin(100.0);
        assert!(ledger.margin_within_wallet());
    }
}
