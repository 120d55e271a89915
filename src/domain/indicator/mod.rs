//! Technical indicator implementations.
//!
//! Every calculator is a pure function of the bar slice and its parameters and
//! returns series of exactly `bars.len()` points. A point whose warm-up window
//! is not yet complete carries `None`; there is no placeholder number.
//!
//! - `IndicatorPoint`: one point of a series (`value == None` is "undefined")
//! - `IndicatorType`: indicator identity + parameters (usable as a HashMap key)
//! - `IndicatorSeries`: a single-valued time series
//! - `MacdSeries`, `KdjSeries`, `BollingerSeries`: multi-output indicators

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod kdj;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;

pub use atr::calculate_atr;
pub use bollinger::{BollingerSeries, calculate_bollinger};
pub use ema::calculate_ema;
pub use kdj::{KdjSeries, calculate_kdj};
pub use macd::{MacdSeries, calculate_macd};
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;


use chrono::NaiveDate;
use std::fmt;

use crate::domain::bar::Bar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Stddev(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Kdj {
        period: usize,
        k_smoothing: usize,
        d_smoothing: usize,
    },
    Bollinger {
        period: usize,
        multiplier_x100: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub(crate) fn from_values(
        indicator_type: IndicatorType,
        bars: &[Bar],
        values: Vec<Option<f64>>,
    ) -> Self {
        debug_assert_eq!(bars.len(), values.len());
        IndicatorSeries {
            indicator_type,
            values: bars
                .iter()
                .zip(values)
                .map(|(bar, value)| IndicatorPoint {
                    date: bar.date,
                    value,
                })
                .collect(),
        }
    }

    /// An all-undefined series aligned to `bars`.
    pub(crate) fn undefined(indicator_type: IndicatorType, bars: &[Bar]) -> Self {
        Self::from_values(indicator_type, bars, vec![None; bars.len()])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at bar `index`; `None` when out of range or still warming up.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).and_then(|p| p.value)
    }

    /// Index of the first defined value.
    pub fn first_defined(&self) -> Option<usize> {
        self.values.iter().position(|p| p.value.is_some())
    }

    pub fn raw(&self) -> Vec<Option<f64>> {
        self.values.iter().map(|p| p.value).collect()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "MA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Kdj {
                period,
                k_smoothing,
                d_smoothing,
            } => write!(f, "KDJ({},{},{})", period, k_smoothing, d_smoothing),
            IndicatorType::Bollinger {
                period,
                multiplier_x100,
            } => {
                let mult = *multiplier_x100 as f64 / 100.0;
                write!(f, "BOLL({},{})", period, mult)
            }
        }
    }
}

/// Exponential smoothing over an optional input series.
///
/// Seeds with the simple mean of the first `period` defined inputs, then applies
/// `out[i] = x[i]*k + out[i-1]*(1-k)`. The input must be contiguous once defined.
pub(crate) fn ema_of(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; input.len()];
    if period == 0 {
        return out;
    }
    let Some(start) = input.iter().position(Option::is_some) else {
        return out;
    };

    let k = 2.0 / (period as f64 + 1.0);
    let mut sum = 0.0;
    let mut prev: Option<f64> = None;

    for (offset, x) in input[start..].iter().enumerate() {
        let Some(x) = *x else { break };
        let i = start + offset;
        if offset + 1 < period {
            sum += x;
        } else if offset + 1 == period {
            sum += x;
            prev = Some(sum / period as f64);
            out[i] = prev;
        } else if let Some(p) = prev {
            let v = x * k + p * (1.0 - k);
            prev = Some(v);
            out[i] = prev;
        }
    }

    out
}
