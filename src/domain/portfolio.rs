//! Portfolio state and equity tracking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub portfolio_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn quantity(&self) -> u64 {
        self.position.as_ref().map_or(0, |p| p.quantity)
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// cash + quantity * close
    pub fn total_equity(&self, close: f64) -> f64 {
        self.cash + self.position.as_ref().map_or(0.0, |p| p.market_value(close))
    }

    pub fn mark(&mut self, date: NaiveDate, close: f64) {
        let portfolio_value = self.total_equity(close);
        self.equity_curve.push(EquityPoint {
            date,
            portfolio_value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn new_portfolio() {
        let portfolio = Portfolio::new(100_000.0);
        assert!((portfolio.cash - 100_000.0).abs() < f64::EPSILON);
        assert!(portfolio.is_flat());
        assert_eq!(portfolio.quantity(), 0);
        assert!(portfolio.trades.is_empty());
        assert!(portfolio.equity_curve.is_empty());
    }

    #[test]
    fn total_equity_flat_is_cash() {
        let portfolio = Portfolio::new(100_000.0);
        assert!((portfolio.total_equity(42.0) - 100_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mark_uses_close_for_position() {
        let mut portfolio = Portfolio::new(50_000.0);
        portfolio.cash = 40_000.0;
        portfolio.position = Some(Position {
            quantity: 100,
            average_cost: 100.0,
            entry_date: date(2),
        });

        portfolio.mark(date(3), 150.0);
        assert_eq!(portfolio.equity_curve.len(), 1);
        assert_eq!(portfolio.equity_curve[0].date, date(3));
        assert!((portfolio.equity_curve[0].portfolio_value - 55_000.0).abs() < f64::EPSILON);
    }
}
