//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). Warmup: first (n-1) bars are undefined.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, ema_of};

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
    IndicatorSeries::from_values(IndicatorType::Ema(period), bars, ema_of(&closes, period))
}
