//! Stochastic KDJ indicator.
//!
//! RSV = (C - LLV(n)) / (HHV(n) - LLV(n)) * 100, or 50 when HHV == LLV.
//! K = ((m1-1)*K[i-1] + RSV) / m1, D = ((m2-1)*D[i-1] + K) / m2, both seeded at 50.
//! J = 3K - 2D.
//!
//! Default parameters: n=9, m1=3, m2=3. Warmup: first (n-1) bars are undefined.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub const DEFAULT_PERIOD: usize = 9;
pub const DEFAULT_K_SMOOTHING: usize = 3;
pub const DEFAULT_D_SMOOTHING: usize = 3;

const SEED: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct KdjSeries {
    pub k: IndicatorSeries,
    pub d: IndicatorSeries,
    pub j: IndicatorSeries,
}

pub fn calculate_kdj(
    bars: &[Bar],
    period: usize,
    k_smoothing: usize,
    d_smoothing: usize,
) -> KdjSeries {
    let indicator_type = IndicatorType::Kdj {
        period,
        k_smoothing,
        d_smoothing,
    };

    let mut k_values = vec![None; bars.len()];
    let mut d_values = vec![None; bars.len()];
    let mut j_values = vec![None; bars.len()];

    if period > 0 && k_smoothing > 0 && d_smoothing > 0 {
        let m1 = k_smoothing as f64;
        let m2 = d_smoothing as f64;
        let mut k_prev = SEED;
        let mut d_prev = SEED;

        for i in (period - 1)..bars.len() {
            let window = &bars[i + 1 - period..=i];
            let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);

            let rsv = if highest == lowest {
                SEED
            } else {
                (bars[i].close - lowest) / (highest - lowest) * 100.0
            };

            let k = ((m1 - 1.0) * k_prev + rsv) / m1;
            let d = ((m2 - 1.0) * d_prev + k) / m2;

            k_values[i] = Some(k);
            d_values[i] = Some(d);
            j_values[i] = Some(3.0 * k - 2.0 * d);

            k_prev = k;
            d_prev = d;
        }
    }

    KdjSeries {
        k: IndicatorSeries::from_values(indicator_type.clone(), bars, k_values),
        d: IndicatorSeries::from_values(indicator_type.clone(), bars, d_values),
        j: IndicatorSeries::from_values(indicator_type, bars, j_values),
    }
}
