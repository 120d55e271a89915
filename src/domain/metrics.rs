//! Performance metrics derived from the equity curve and trade ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::backtest::BarPeriod;
use super::cost::Side;
use super::portfolio::EquityPoint;
use super::position::Trade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_value: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub annual_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub total_trades: usize,
    pub won_trades: usize,
    pub lost_trades: usize,
    pub win_rate: f64,
}

/// A buy matched with the sell that closed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTrip {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub quantity: u64,
    /// Buy value plus buy fees.
    pub cost: f64,
    /// Sell value minus sell fees.
    pub proceeds: f64,
    pub pnl: f64,
    pub won: bool,
}

impl PerformanceMetrics {
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        initial_cash: f64,
        period: BarPeriod,
        risk_free_rate: f64,
    ) -> Self {
        let initial_value = initial_cash;
        let final_value = equity_curve
            .last()
            .map(|p| p.portfolio_value)
            .unwrap_or(initial_value);

        let total_return = if initial_value > 0.0 {
            final_value / initial_value - 1.0
        } else {
            0.0
        };

        let trips = round_trips(trades);
        let total_trades = trips.len();
        let won_trades = trips.iter().filter(|t| t.won).count();
        let lost_trades = total_trades - won_trades;
        let win_rate = if total_trades > 0 {
            won_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        PerformanceMetrics {
            initial_value,
            final_value: finite_or_zero(final_value),
            total_return: finite_or_zero(total_return),
            annual_return: finite_or_zero(compute_annual_return(equity_curve, total_return)),
            sharpe_ratio: finite_or_zero(compute_sharpe(equity_curve, period, risk_free_rate)),
            max_drawdown: finite_or_zero(compute_drawdown(equity_curve)),
            total_trades,
            won_trades,
            lost_trades,
            win_rate,
        }
    }
}

/// Daily bars, zero risk-free rate.
pub fn analyze(equity_curve: &[EquityPoint], trades: &[Trade], initial_cash: f64) -> PerformanceMetrics {
    PerformanceMetrics::compute(equity_curve, trades, initial_cash, BarPeriod::Daily, 0.0)
}

/// Pair sells with the open lot they close.
///
/// Buys accumulate into one open lot at average cost. A sell closes up to
/// its quantity from that lot, taking a proportional share of the lot's cost.
/// Sells with nothing open are ignored.
pub fn round_trips(trades: &[Trade]) -> Vec<RoundTrip> {
    struct OpenLot {
        entry_date: NaiveDate,
        quantity: u64,
        cost: f64,
    }

    let mut open: Option<OpenLot> = None;
    let mut trips = Vec::new();

    for trade in trades {
        match trade.action {
            Side::Buy => {
                let cost = trade.value + trade.fees();
                match open.as_mut() {
                    Some(lot) => {
                        lot.quantity += trade.quantity;
                        lot.cost += cost;
                    }
                    None => {
                        open = Some(OpenLot {
                            entry_date: trade.date,
                            quantity: trade.quantity,
                            cost,
                        })
                    }
                }
            }
            Side::Sell => {
                let Some(lot) = open.as_mut() else {
                    continue;
                };
                if trade.quantity == 0 || lot.quantity == 0 {
                    continue;
                }
                let quantity = trade.quantity.min(lot.quantity);
                let cost = lot.cost * quantity as f64 / lot.quantity as f64;
                let net = trade.value - trade.fees();
                let proceeds = net * quantity as f64 / trade.quantity as f64;

                trips.push(RoundTrip {
                    entry_date: lot.entry_date,
                    exit_date: trade.date,
                    quantity,
                    cost,
                    proceeds,
                    pnl: proceeds - cost,
                    won: proceeds > cost,
                });

                lot.quantity -= quantity;
                lot.cost -= cost;
                if lot.quantity == 0 {
                    open = None;
                }
            }
        }
    }

    trips
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn compute_annual_return(equity_curve: &[EquityPoint], total_return: f64) -> f64 {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return total_return;
    };
    let days = (last.date - first.date).num_days();
    if days <= 0 {
        return total_return;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(365.0 / days as f64) - 1.0
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.portfolio_value;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        if point.portfolio_value > peak {
            peak = point.portfolio_value;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.portfolio_value) / peak);
        }
    }
    max_dd
}

fn compute_sharpe(equity_curve: &[EquityPoint], period: BarPeriod, risk_free_rate: f64) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].portfolio_value;
            if prev > 0.0 {
                w[1].portfolio_value / prev - 1.0
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return 0.0;
    }

    let factor = period.annualization_factor();
    let per_bar_rf = risk_free_rate / factor;
    (mean - per_bar_rf) / stddev * factor.sqrt()
}
