//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: moving average over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are undefined.

use crate::domain::bar::Bar;
use crate::domain::indicator::stddev::window_stddev;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, calculate_sma};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub upper: IndicatorSeries,
    pub middle: IndicatorSeries,
    pub lower: IndicatorSeries,
}

pub fn calculate_bollinger(bars: &[Bar], period: usize, multiplier: f64) -> BollingerSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        multiplier_x100: (multiplier * 100.0).round() as u32,
    };

    let middle = calculate_sma(bars, period);
    let mut upper = Vec::with_capacity(bars.len());
    let mut lower = Vec::with_capacity(bars.len());

    for i in 0..bars.len() {
        match (middle.get(i), window_stddev(bars, i, period)) {
            (Some(mid), Some(sd)) => {
                upper.push(Some(mid + multiplier * sd));
                lower.push(Some(mid - multiplier * sd));
            }
            _ => {
                upper.push(None);
                lower.push(None);
            }
        }
    }

    BollingerSeries {
        upper: IndicatorSeries::from_values(indicator_type.clone(), bars, upper),
        middle: IndicatorSeries::from_values(indicator_type.clone(), bars, middle.raw()),
        lower: IndicatorSeries::from_values(indicator_type, bars, lower),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    #[test]
    fn bollinger_warmup() {
        let series = calculate_bollinger(&make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3, 2.0);
        for band in [&series.upper, &series.middle, &series.lower] {
            assert_eq!(band.first_defined(), Some(2));
            assert_eq!(band.len(), 5);
        }
    }

    #[test]
    fn bollinger_bands_symmetric() {
        let series = calculate_bollinger(&make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3, 2.0);
        for i in 2..5 {
            let mid = series.middle.get(i).unwrap();
            let up = series.upper.get(i).unwrap();
            let low = series.lower.get(i).unwrap();
            assert!(((up - mid) - (mid - low)).abs() < 1e-12);
        }
    }

    #[test]
    fn bollinger_band_width() {
        // window 1,2,3: mean 2, population stddev sqrt(2/3)
        let series = calculate_bollinger(&make_bars(&[1.0, 2.0, 3.0]), 3, 2.0);
        let sd = (2.0f64 / 3.0).sqrt();
        assert!((series.upper.get(2).unwrap() - (2.0 + 2.0 * sd)).abs() < 1e-12);
        assert!((series.lower.get(2).unwrap() - (2.0 - 2.0 * sd)).abs() < 1e-12);
    }

    #[test]
    fn bollinger_constant_prices_collapse() {
        let series = calculate_bollinger(&make_bars(&[7.0; 4]), 3, 2.0);
        assert_eq!(series.upper.get(3), Some(7.0));
        assert_eq!(series.lower.get(3), Some(7.0));
    }

    #[test]
    fn bollinger_indicator_type() {
        let series = calculate_bollinger(&make_bars(&[1.0]), 20, 2.5);
        assert_eq!(
            series.middle.indicator_type,
            IndicatorType::Bollinger {
                period: 20,
                multiplier_x100: 250
            }
        );
    }
}
