//! Rolling standard deviation of closes.
//!
//! Population standard deviation over n closing prices.
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - MA(n)[i])^2 for j in 0..n) / n)
//! Warmup: first (n-1) bars are undefined.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_stddev(bars: &[Bar], period: usize) -> IndicatorSeries {
    let values = (0..bars.len())
        .map(|i| window_stddev(bars, i, period))
        .collect();
    IndicatorSeries::from_values(IndicatorType::Stddev(period), bars, values)
}

/// Population stddev of the `period` closes ending at `end`.
pub(crate) fn window_stddev(bars: &[Bar], end: usize, period: usize) -> Option<f64> {
    if period == 0 || end + 1 < period {
        return None;
    }
    let window = &bars[end + 1 - period..=end];
    let mean = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
    let variance = window
        .iter()
        .map(|b| {
            let diff = b.close - mean;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;
    Some(variance.sqrt())
}
