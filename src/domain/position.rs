//! Open position and trade ledger records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::cost::Side;

/// A long holding. Flat is represented by the absence of a position.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub quantity: u64,
    /// All-in cost per share: fill price plus buy commission, spread over the shares.
    pub average_cost: f64,
    pub entry_date: NaiveDate,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity as f64 * self.average_cost
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.market_value(price) - self.cost_basis()
    }
}

/// One fill in the ledger. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub action: Side,
    /// Fill price after slippage.
    pub price: f64,
    pub quantity: u64,
    /// price * quantity
    pub value: f64,
    pub commission: f64,
    pub stamp_duty: f64,
    pub slippage_cost: f64,
    pub cash_after: f64,
}

impl Trade {
    /// Cash moved by this fill: negative for buys, positive for sells.
    pub fn cash_flow(&self) -> f64 {
        match self.action {
            Side::Buy => -(self.value + self.commission + self.stamp_duty),
            Side::Sell => self.value - self.commission - self.stamp_duty,
        }
    }

    pub fn fees(&self) -> f64 {
        self.commission + self.stamp_duty
    }
}
