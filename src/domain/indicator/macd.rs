//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: line from max(fast, slow) - 1, signal and histogram
//! (signal - 1) bars later.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, calculate_ema, ema_of};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: IndicatorSeries,
    pub signal: IndicatorSeries,
    pub histogram: IndicatorSeries,
}

pub fn calculate_macd(
    bars: &[Bar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> MacdSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };

    let ema_fast = calculate_ema(bars, fast);
    let ema_slow = calculate_ema(bars, slow);

    let line: Vec<Option<f64>> = (0..bars.len())
        .map(|i| match (ema_fast.get(i), ema_slow.get(i)) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal = ema_of(&line, signal_period);

    let histogram: Vec<Option<f64>> = line
        .iter()
        .zip(&signal)
        .map(|(l, s)| match (l, s) {
            (Some(l), Some(s)) => Some(l - s),
            _ => None,
        })
        .collect();

    MacdSeries {
        line: IndicatorSeries::from_values(indicator_type.clone(), bars, line),
        signal: IndicatorSeries::from_values(indicator_type.clone(), bars, signal),
        histogram: IndicatorSeries::from_values(indicator_type, bars, histogram),
    }
}

pub fn calculate_macd_default(bars: &[Bar]) -> MacdSeries {
    calculate_macd(bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}
