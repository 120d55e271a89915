//! Average True Range indicator.
//!
//! TR[0] = high - low, TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|).
//! Seed with the mean of the first n TRs, then Wilder smoothing:
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n. Warmup: first (n-1) bars are undefined.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut values = vec![None; bars.len()];

    if period == 0 || bars.len() < period {
        return IndicatorSeries::from_values(IndicatorType::Atr(period), bars, values);
    }

    let tr_values: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let n = period as f64;
    let mut atr = tr_values[..period].iter().sum::<f64>() / n;
    values[period - 1] = Some(atr);

    for i in period..bars.len() {
        atr = (atr * (n - 1.0) + tr_values[i]) / n;
        values[i] = Some(atr);
    }

    IndicatorSeries::from_values(IndicatorType::Atr(period), bars, values)
}
