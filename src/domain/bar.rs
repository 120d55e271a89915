//! OHLCV bar representation and series checks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::BacktestError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Reject series whose dates are not strictly increasing (covers duplicates).
pub fn check_ordering(bars: &[Bar]) -> Result<(), BacktestError> {
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].date <= pair[0].date {
            return Err(BacktestError::UnorderedBars {
                index: i + 1,
                date: pair[1].date,
                previous: pair[0].date,
            });
        }
    }
    Ok(())
}

/// Reject bars with a non-finite or non-positive price, or `low > high`.
pub fn check_prices(bars: &[Bar]) -> Result<(), BacktestError> {
    for (index, bar) in bars.iter().enumerate() {
        let prices = [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ];
        let reason = if let Some((name, value)) = prices.iter().find(|(_, v)| !v.is_finite()) {
            format!("{name} is {value}")
        } else if let Some((name, value)) = prices.iter().find(|(_, v)| *v <= 0.0) {
            format!("{name} {value} is not positive")
        } else if bar.low > bar.high {
            format!("low {} above high {}", bar.low, bar.high)
        } else {
            continue;
        };
        return Err(BacktestError::InvalidBar {
            index,
            date: bar.date,
            reason,
        });
    }
    Ok(())
}
