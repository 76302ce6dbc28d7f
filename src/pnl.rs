// ===============================
// src/pnl.rs
// ===============================
//
// Per-strategy P&L: realized profit accumulates from closed legs, portfolio
// value marks the open position at the latest observation.
//

#[derive(Debug, Clone)]
pub struct PnlAccountant {
    initial_cash: f64,
    realized: f64,
    credits: u64,
}

impl PnlAccountant {
    pub fn new(initial_cash: f64) -> Self { Self { initial_cash, realized: 0.0, credits: 0 } }

    pub fn credit(&mut self, profit: f64) {
        self.realized += profit;
        self.credits += 1;
    }

    pub fn realized(&self) -> f64 { self.realized }

    /// Number of credits (full or partial closes) booked so far.
    pub fn credits(&self) -> u64 { self.credits }

    pub fn cash(&self) -> f64 { self.initial_cash + self.realized }

    pub fn portfolio_value(&self, unrealized: f64) -> f64 { self.cash() + unrealized }
}
