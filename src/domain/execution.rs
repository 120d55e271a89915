//! Trade execution and fill simulation.
//!
//! Implements long entry sizing under the cost model and full liquidation on
//! exit. Fills never leave cash negative: an unaffordable fill is skipped.

use chrono::NaiveDate;
use tracing::debug;

use super::cost::{CostModel, Side};
use super::portfolio::Portfolio;
use super::position::{Position, Trade};

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered(Trade),
    InsufficientFunds,
    AlreadyInvested,
}

/// Result of an exit attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitResult {
    Exited(Trade),
    /// Fees on liquidation would exceed cash plus proceeds.
    InsufficientFunds,
    NoPosition,
}

/// Largest multiple of `lot_size` shares whose fill value plus commission fits in `cash`.
///
/// Cost(q) = q*p + max(q*p*rate, min) <= cash holds exactly when both
/// q*p*(1+rate) <= cash and q*p + min <= cash.
pub fn affordable_quantity(cash: f64, fill_price: f64, lot_size: u64, costs: &CostModel) -> u64 {
    if cash <= 0.0 || fill_price <= 0.0 || lot_size == 0 {
        return 0;
    }

    let by_rate = (cash / (fill_price * (1.0 + costs.commission_rate))).floor();
    let by_floor = ((cash - costs.min_commission) / fill_price).floor();
    let shares = by_rate.min(by_floor);
    if shares < 1.0 {
        return 0;
    }

    let mut quantity = (shares as u64 / lot_size) * lot_size;
    while quantity > 0 {
        let value = quantity as f64 * fill_price;
        if value + costs.commission(value) <= cash {
            break;
        }
        quantity -= lot_size;
    }
    quantity
}

/// Enter a long position with all available cash at `market_price`.
///
/// Steps:
/// 1. Apply buy-side slippage to get the fill price
/// 2. Size the order to the largest affordable whole-lot quantity
/// 3. If quantity == 0, return InsufficientFunds
/// 4. Deduct fill value + commission from cash
/// 5. Open the position and append the trade
pub fn enter_long(
    portfolio: &mut Portfolio,
    date: NaiveDate,
    market_price: f64,
    lot_size: u64,
    costs: &CostModel,
) -> EntryResult {
    if !portfolio.is_flat() {
        return EntryResult::AlreadyInvested;
    }

    let fill_price = costs.fill_price(market_price, Side::Buy);
    let quantity = affordable_quantity(portfolio.cash, fill_price, lot_size, costs);
    if quantity == 0 {
        return EntryResult::InsufficientFunds;
    }

    let notional = quantity as f64 * market_price;
    let fees = costs.compute_fees(notional, Side::Buy);
    let value = quantity as f64 * fill_price;
    let total_cost = value + fees.charged();

    portfolio.cash -= total_cost;
    portfolio.position = Some(Position {
        quantity,
        average_cost: total_cost / quantity as f64,
        entry_date: date,
    });

    let trade = Trade {
        date,
        action: Side::Buy,
        price: fill_price,
        quantity,
        value,
        commission: fees.commission,
        stamp_duty: fees.stamp_duty,
        slippage_cost: fees.slippage,
        cash_after: portfolio.cash,
    };
    debug!(%date, quantity, price = fill_price, cash_after = portfolio.cash, "buy filled");
    portfolio.record_trade(trade.clone());
    EntryResult::Entered(trade)
}

/// Liquidate the whole position at `market_price`.
///
/// Steps:
/// 1. Apply sell-side slippage to get the fill price
/// 2. Compute commission and stamp duty on the fill value
/// 3. Credit fill value minus fees to cash
/// 4. Close the position and append the trade
pub fn exit_position(
    portfolio: &mut Portfolio,
    date: NaiveDate,
    market_price: f64,
    costs: &CostModel,
) -> ExitResult {
    let Some(position) = portfolio.position.as_ref() else {
        return ExitResult::NoPosition;
    };
    let quantity = position.quantity;
    let cost_basis = position.cost_basis();

    let fill_price = costs.fill_price(market_price, Side::Sell);
    let notional = quantity as f64 * market_price;
    let fees = costs.compute_fees(notional, Side::Sell);
    let value = quantity as f64 * fill_price;
    let net = value - fees.charged();

    if portfolio.cash + net < 0.0 {
        return ExitResult::InsufficientFunds;
    }

    portfolio.cash += net;
    portfolio.position = None;

    let trade = Trade {
        date,
        action: Side::Sell,
        price: fill_price,
        quantity,
        value,
        commission: fees.commission,
        stamp_duty: fees.stamp_duty,
        slippage_cost: fees.slippage,
        cash_after: portfolio.cash,
    };
    debug!(
        %date,
        quantity,
        price = fill_price,
        realized_pnl = net - cost_basis,
        cash_after = portfolio.cash,
        "sell filled"
    );
    portfolio.record_trade(trade.clone());
    ExitResult::Exited(trade)
}
