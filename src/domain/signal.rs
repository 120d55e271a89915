//! Per-bar trading signals derived from indicator series.
//!
//! A cross at bar i compares the sign of `a[i] - b[i]` with `a[i-1] - b[i-1]`:
//! from <= 0 to > 0 is an upward cross, from >= 0 to < 0 a downward one.
//! Any undefined operand on either bar yields no cross, so warm-up bars hold.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::bar::Bar;
use super::error::BacktestError;
use super::indicator::{
    IndicatorSeries, calculate_bollinger, calculate_ema, calculate_kdj, calculate_macd,
    calculate_rsi, calculate_sma,
};
use super::strategy::{StrategyKind, StrategyParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
            Action::Hold => write!(f, "hold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub bar_index: usize,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cross {
    Up,
    Down,
}

fn cross_at(a: &[Option<f64>], b: &[Option<f64>], i: usize) -> Option<Cross> {
    if i == 0 {
        return None;
    }
    let prev = a[i - 1]? - b[i - 1]?;
    let curr = a[i]? - b[i]?;
    if prev <= 0.0 && curr > 0.0 {
        Some(Cross::Up)
    } else if prev >= 0.0 && curr < 0.0 {
        Some(Cross::Down)
    } else {
        None
    }
}

/// Buy on `a` crossing above `b`, sell on `a` crossing below `b`.
fn crossover(a: &IndicatorSeries, b: &IndicatorSeries) -> Vec<Action> {
    let (a, b) = (a.raw(), b.raw());
    (0..a.len())
        .map(|i| match cross_at(&a, &b, i) {
            Some(Cross::Up) => Action::Buy,
            Some(Cross::Down) => Action::Sell,
            None => Action::Hold,
        })
        .collect()
}

impl StrategyKind {
    /// One signal per bar, deterministic in `bars` and the strategy parameters.
    pub fn signals(&self, bars: &[Bar]) -> Vec<Signal> {
        let actions = match *self {
            StrategyKind::MaCross { fast, slow } => {
                crossover(&calculate_sma(bars, fast), &calculate_sma(bars, slow))
            }
            StrategyKind::EmaCross { fast, slow } => {
                crossover(&calculate_ema(bars, fast), &calculate_ema(bars, slow))
            }
            StrategyKind::MacdCross { fast, slow, signal } => {
                let macd = calculate_macd(bars, fast, slow, signal);
                crossover(&macd.line, &macd.signal)
            }
            StrategyKind::KdjCross {
                period,
                k_smoothing,
                d_smoothing,
            } => {
                let kdj = calculate_kdj(bars, period, k_smoothing, d_smoothing);
                crossover(&kdj.k, &kdj.d)
            }
            StrategyKind::RsiThreshold {
                period,
                oversold,
                overbought,
            } => {
                let rsi = calculate_rsi(bars, period).raw();
                let low = vec![Some(oversold); rsi.len()];
                let high = vec![Some(overbought); rsi.len()];
                (0..rsi.len())
                    .map(|i| {
                        if cross_at(&rsi, &low, i) == Some(Cross::Down) {
                            Action::Buy
                        } else if cross_at(&rsi, &high, i) == Some(Cross::Up) {
                            Action::Sell
                        } else {
                            Action::Hold
                        }
                    })
                    .collect()
            }
            StrategyKind::BollingerBreakout { period, multiplier } => {
                let bands = calculate_bollinger(bars, period, multiplier);
                let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
                let (upper, middle) = (bands.upper.raw(), bands.middle.raw());
                (0..closes.len())
                    .map(|i| {
                        if cross_at(&closes, &upper, i) == Some(Cross::Up) {
                            Action::Buy
                        } else if cross_at(&closes, &middle, i) == Some(Cross::Down) {
                            Action::Sell
                        } else {
                            Action::Hold
                        }
                    })
                    .collect()
            }
        };

        actions
            .into_iter()
            .enumerate()
            .map(|(bar_index, action)| Signal { bar_index, action })
            .collect()
    }
}

/// Resolve `strategy_type` + `params` and generate signals for `bars`.
pub fn generate(
    bars: &[Bar],
    strategy_type: &str,
    params: &StrategyParams,
) -> Result<Vec<Signal>, BacktestError> {
    Ok(StrategyKind::from_params(strategy_type, params)?.signals(bars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn actions(signals: &[Signal]) -> Vec<Action> {
        signals.iter().map(|s| s.action).collect()
    }

    fn buys(signals: &[Signal]) -> Vec<usize> {
        signals
            .iter()
            .filter(|s| s.action == Action::Buy)
            .map(|s| s.bar_index)
            .collect()
    }

    fn sells(signals: &[Signal]) -> Vec<usize> {
        signals
            .iter()
            .filter(|s| s.action == Action::Sell)
            .map(|s| s.bar_index)
            .collect()
    }

    #[test]
    fn crossover_fires_once_on_genuine_cross() {
        let a: Vec<Option<f64>> = (0..21).map(|i| Some(if i < 10 { 1.0 } else { 3.0 })).collect();
        let b: Vec<Option<f64>> = vec![Some(2.0); 21];
        let sa = IndicatorSeries::from_values(
            crate::domain::indicator::IndicatorType::Sma(1),
            &make_bars(&[1.0; 21]),
            a,
        );
        let sb = IndicatorSeries::from_values(
            crate::domain::indicator::IndicatorType::Sma(2),
            &make_bars(&[1.0; 21]),
            b,
        );
        let out = crossover(&sa, &sb);
        let buy_idx: Vec<usize> = out
            .iter()
            .enumerate()
            .filter(|(_, a)| **a == Action::Buy)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(buy_idx, vec![10]);
        assert!(!out.contains(&Action::Sell));
    }

    #[test]
    fn touching_then_crossing_counts_from_equal() {
        let a = vec![Some(1.0), Some(2.0), Some(3.0)];
        let b = vec![Some(2.0), Some(2.0), Some(2.0)];
        assert_eq!(cross_at(&a, &b, 1), None);
        assert_eq!(cross_at(&a, &b, 2), Some(Cross::Up));
    }

    #[test]
    fn undefined_operand_holds() {
        let a = vec![None, Some(3.0)];
        let b = vec![Some(2.0), Some(2.0)];
        assert_eq!(cross_at(&a, &b, 1), None);
        assert_eq!(cross_at(&a, &b, 0), None);
    }

    #[test]
    fn ma_cross_one_signal_per_bar() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + ((i as f64) / 4.0).sin() * 10.0).collect();
        let bars = make_bars(&closes);
        let signals = StrategyKind::MaCross { fast: 3, slow: 8 }.signals(&bars);
        assert_eq!(signals.len(), bars.len());
        for (i, s) in signals.iter().enumerate() {
            assert_eq!(s.bar_index, i);
        }
        // slow MA undefined until index 7, so no cross before index 8
        assert!(actions(&signals[..8]).iter().all(|a| *a == Action::Hold));
    }

    #[test]
    fn ma_cross_v_shape_buys_after_bottom() {
        let mut closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        closes.extend((1..=15).map(|i| 86.0 + i as f64 * 2.0));
        let signals = StrategyKind::MaCross { fast: 2, slow: 5 }.signals(&make_bars(&closes));
        let b = buys(&signals);
        assert_eq!(b.len(), 1);
        assert!(b[0] > 14);
        assert!(sells(&signals).is_empty());
    }

    #[test]
    fn rsi_threshold_buys_entering_oversold() {
        // RSI(3): ~33 at 3, ~56 at 4, ~16 at 5 (enters oversold), ~78 at 9
        let closes = [
            100.0, 101.0, 100.0, 99.0, 100.0, 95.0, 90.0, 85.0, 95.0, 105.0, 115.0, 125.0,
        ];
        let kind = StrategyKind::RsiThreshold {
            period: 3,
            oversold: 30.0,
            overbought: 70.0,
        };
        let signals = kind.signals(&make_bars(&closes));
        assert_eq!(buys(&signals), vec![5]);
        assert_eq!(sells(&signals), vec![9]);
    }

    #[test]
    fn bollinger_breakout_signals() {
        let mut closes = vec![100.0; 10];
        closes.push(120.0);
        closes.extend([118.0, 119.0, 100.0, 90.0]);
        let kind = StrategyKind::BollingerBreakout {
            period: 5,
            multiplier: 1.0,
        };
        let signals = kind.signals(&make_bars(&closes));
        assert_eq!(buys(&signals), vec![10]);
        assert_eq!(sells(&signals).len(), 1);
    }

    #[test]
    fn generate_rejects_bad_strategy() {
        assert!(generate(&make_bars(&[1.0]), "nope", &StrategyParams::new()).is_err());
    }

    #[test]
    fn generate_is_deterministic() {
        let closes: Vec<f64> = (0..60).map(|i| 50.0 + ((i * 7) % 13) as f64).collect();
        let bars = make_bars(&closes);
        for t in crate::domain::strategy::STRATEGY_TYPES {
            let first = generate(&bars, t, &StrategyParams::new()).unwrap();
            let second = generate(&bars, t, &StrategyParams::new()).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn action_display() {
        assert_eq!(Action::Buy.to_string(), "buy");
        assert_eq!(Action::Hold.to_string(), "hold");
    }
}
