//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are undefined (n price changes seed the averages).

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut values = vec![None; bars.len()];

    if period == 0 || bars.len() <= period {
        return IndicatorSeries::from_values(IndicatorType::Rsi(period), bars, values);
    }

    let changes: Vec<f64> = bars.windows(2).map(|w| w[1].close - w[0].close).collect();
    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

    let mut avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / period as f64;
    values[period] = Some(rsi_from(avg_gain, avg_loss));

    let n = period as f64;
    for i in (period + 1)..bars.len() {
        let change = changes[i - 1];
        avg_gain = (avg_gain * (n - 1.0) + gain(change)) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss(change)) / n;
        values[i] = Some(rsi_from(avg_gain, avg_loss));
    }

    IndicatorSeries::from_values(IndicatorType::Rsi(period), bars, values)
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
