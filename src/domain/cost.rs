//! Transaction cost model: commission with a minimum floor, sell-side stamp
//! duty, and proportional slippage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fees {
    pub commission: f64,
    pub stamp_duty: f64,
    pub slippage: f64,
}

impl Fees {
    /// Commission plus stamp duty; slippage is already inside the fill price.
    pub fn charged(&self) -> f64 {
        self.commission + self.stamp_duty
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub commission_rate: f64,
    pub stamp_duty_rate: f64,
    pub min_commission: f64,
    pub slippage_rate: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            commission_rate: 0.0003,
            stamp_duty_rate: 0.001,
            min_commission: 5.0,
            slippage_rate: 0.001,
        }
    }
}

impl CostModel {
    /// Buys pay price * (1 + slippage_rate); sells receive price * (1 - slippage_rate).
    pub fn fill_price(&self, market_price: f64, side: Side) -> f64 {
        match side {
            Side::Buy => market_price * (1.0 + self.slippage_rate),
            Side::Sell => market_price * (1.0 - self.slippage_rate),
        }
    }

    /// max(value * commission_rate, min_commission), charged on both sides.
    pub fn commission(&self, value: f64) -> f64 {
        (value * self.commission_rate).max(self.min_commission)
    }

    /// Fees for a fill whose pre-slippage value is `notional`.
    ///
    /// Slippage moves the fill value first; commission and stamp duty are then
    /// charged on the slipped value.
    pub fn compute_fees(&self, notional: f64, side: Side) -> Fees {
        let slippage = notional * self.slippage_rate;
        let fill_value = match side {
            Side::Buy => notional + slippage,
            Side::Sell => notional - slippage,
        };
        let stamp_duty = match side {
            Side::Buy => 0.0,
            Side::Sell => fill_value * self.stamp_duty_rate,
        };
        Fees {
            commission: self.commission(fill_value),
            stamp_duty,
            slippage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn no_slippage() -> CostModel {
        CostModel {
            slippage_rate: 0.0,
            ..CostModel::default()
        }
    }

    #[test]
    fn commission_floor_applies_to_small_fills() {
        let fees = no_slippage().compute_fees(10_000.0, Side::Buy);
        // 10000 * 0.0003 = 3 < 5
        assert_relative_eq!(fees.commission, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn commission_proportional_above_floor() {
        let fees = no_slippage().compute_fees(100_000.0, Side::Buy);
        assert_relative_eq!(fees.commission, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn stamp_duty_sell_only() {
        let model = no_slippage();
        assert_relative_eq!(model.compute_fees(50_000.0, Side::Buy).stamp_duty, 0.0, epsilon = 1e-9);
        assert_relative_eq!(model.compute_fees(50_000.0, Side::Sell).stamp_duty, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn slippage_applied_before_fees() {
        let model = CostModel {
            commission_rate: 0.001,
            stamp_duty_rate: 0.001,
            min_commission: 0.0,
            slippage_rate: 0.01,
        };
        let buy = model.compute_fees(100_000.0, Side::Buy);
        assert_relative_eq!(buy.slippage, 1_000.0, epsilon = 1e-9);
        assert_relative_eq!(buy.commission, 101.0, epsilon = 1e-9);

        let sell = model.compute_fees(100_000.0, Side::Sell);
        assert_relative_eq!(sell.slippage, 1_000.0, epsilon = 1e-9);
        assert_relative_eq!(sell.commission, 99.0, epsilon = 1e-9);
        assert_relative_eq!(sell.stamp_duty, 99.0, epsilon = 1e-9);
        assert_relative_eq!(sell.charged(), 198.0, epsilon = 1e-9);
    }

    #[test]
    fn fill_price_direction() {
        let model = CostModel {
            slippage_rate: 0.001,
            ..CostModel::default()
        };
        assert_relative_eq!(model.fill_price(10.0, Side::Buy), 10.01, epsilon = 1e-9);
        assert_relative_eq!(model.fill_price(10.0, Side::Sell), 9.99, epsilon = 1e-9);
    }

    #[test]
    fn zero_rates_cost_nothing() {
        let model = CostModel {
            commission_rate: 0.0,
            stamp_duty_rate: 0.0,
            min_commission: 0.0,
            slippage_rate: 0.0,
        };
        assert_eq!(model.compute_fees(12_345.0, Side::Sell), Fees::default());
    }
}
