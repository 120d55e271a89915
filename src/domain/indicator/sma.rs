//! Simple moving average of closes.
//!
//! MA(n)[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) bars are undefined.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::undefined(IndicatorType::Sma(period), bars);
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        sum += bar.close;
        if i >= period {
            sum -= bars[i - period].close;
        }
        if i + 1 >= period {
            values.push(Some(sum / period as f64));
        } else {
            values.push(None);
        }
    }

    IndicatorSeries::from_values(IndicatorType::Sma(period), bars, values)
}
