//! Strategy families and their parameter schemas.
//!
//! A strategy is selected by its `strategy_type` key and configured from a flat
//! map of numeric parameters. Missing parameters take the family defaults,
//! unknown ones are rejected.

use std::collections::BTreeMap;
use std::fmt;

use super::error::BacktestError;

pub type StrategyParams = BTreeMap<String, f64>;

pub const DEFAULT_STRATEGY_TYPE: &str = "ma_cross";

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyKind {
    /// Simple moving average crossover.
    MaCross { fast: usize, slow: usize },
    /// Exponential moving average crossover.
    EmaCross { fast: usize, slow: usize },
    /// MACD line crossing its signal line.
    MacdCross {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    /// KDJ %K crossing %D.
    KdjCross {
        period: usize,
        k_smoothing: usize,
        d_smoothing: usize,
    },
    /// RSI entering the oversold zone (buy) or the overbought zone (sell).
    RsiThreshold {
        period: usize,
        oversold: f64,
        overbought: f64,
    },
    /// Close breaking above the upper band (buy), falling below the middle band (sell).
    BollingerBreakout { period: usize, multiplier: f64 },
}

pub const STRATEGY_TYPES: &[&str] = &[
    "ma_cross",
    "ema_cross",
    "macd_cross",
    "kdj_cross",
    "rsi_threshold",
    "bollinger_breakout",
];

impl StrategyKind {
    pub fn from_params(strategy_type: &str, params: &StrategyParams) -> Result<Self, BacktestError> {
        let reader = ParamReader::new(params);
        let kind = match strategy_type {
            "ma_cross" => {
                reader.only(&["fast_period", "slow_period"])?;
                let (fast, slow) = reader.fast_slow(5, 20)?;
                StrategyKind::MaCross { fast, slow }
            }
            "ema_cross" => {
                reader.only(&["fast_period", "slow_period"])?;
                let (fast, slow) = reader.fast_slow(12, 26)?;
                StrategyKind::EmaCross { fast, slow }
            }
            "macd_cross" => {
                reader.only(&["fast_period", "slow_period", "signal_period"])?;
                let (fast, slow) = reader.fast_slow(12, 26)?;
                StrategyKind::MacdCross {
                    fast,
                    slow,
                    signal: reader.period("signal_period", 9)?,
                }
            }
            "kdj_cross" => {
                reader.only(&["period", "k_smoothing", "d_smoothing"])?;
                StrategyKind::KdjCross {
                    period: reader.period("period", 9)?,
                    k_smoothing: reader.period("k_smoothing", 3)?,
                    d_smoothing: reader.period("d_smoothing", 3)?,
                }
            }
            "rsi_threshold" => {
                reader.only(&["period", "oversold", "overbought"])?;
                let oversold = reader.number("oversold", 30.0)?;
                let overbought = reader.number("overbought", 70.0)?;
                if !(0.0..=100.0).contains(&oversold)
                    || !(0.0..=100.0).contains(&overbought)
                    || oversold >= overbought
                {
                    return Err(BacktestError::invalid(
                        "strategy_params.oversold",
                        "need 0 <= oversold < overbought <= 100",
                    ));
                }
                StrategyKind::RsiThreshold {
                    period: reader.period("period", 14)?,
                    oversold,
                    overbought,
                }
            }
            "bollinger_breakout" => {
                reader.only(&["period", "multiplier"])?;
                let multiplier = reader.number("multiplier", 2.0)?;
                if multiplier <= 0.0 {
                    return Err(BacktestError::invalid(
                        "strategy_params.multiplier",
                        "multiplier must be positive",
                    ));
                }
                StrategyKind::BollingerBreakout {
                    period: reader.period("period", 20)?,
                    multiplier,
                }
            }
            other => {
                return Err(BacktestError::invalid(
                    "strategy_type",
                    format!(
                        "unknown strategy type '{}', expected one of {}",
                        other,
                        STRATEGY_TYPES.join(", ")
                    ),
                ));
            }
        };
        Ok(kind)
    }

    pub fn strategy_type(&self) -> &'static str {
        match self {
            StrategyKind::MaCross { .. } => "ma_cross",
            StrategyKind::EmaCross { .. } => "ema_cross",
            StrategyKind::MacdCross { .. } => "macd_cross",
            StrategyKind::KdjCross { .. } => "kdj_cross",
            StrategyKind::RsiThreshold { .. } => "rsi_threshold",
            StrategyKind::BollingerBreakout { .. } => "bollinger_breakout",
        }
    }

    /// Bars needed before the strategy's indicators produce their first value.
    pub fn warmup_bars(&self) -> usize {
        match *self {
            StrategyKind::MaCross { fast, slow } | StrategyKind::EmaCross { fast, slow } => {
                fast.max(slow)
            }
            StrategyKind::MacdCross { fast, slow, signal } => fast.max(slow) + signal - 1,
            StrategyKind::KdjCross { period, .. } => period,
            StrategyKind::RsiThreshold { period, .. } => period + 1,
            StrategyKind::BollingerBreakout { period, .. } => period,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::MaCross { fast, slow } => write!(f, "MA cross {}/{}", fast, slow),
            StrategyKind::EmaCross { fast, slow } => write!(f, "EMA cross {}/{}", fast, slow),
            StrategyKind::MacdCross { fast, slow, signal } => {
                write!(f, "MACD cross {}/{}/{}", fast, slow, signal)
            }
            StrategyKind::KdjCross {
                period,
                k_smoothing,
                d_smoothing,
            } => write!(f, "KDJ cross {}/{}/{}", period, k_smoothing, d_smoothing),
            StrategyKind::RsiThreshold {
                period,
                oversold,
                overbought,
            } => write!(f, "RSI({}) {}/{}", period, oversold, overbought),
            StrategyKind::BollingerBreakout { period, multiplier } => {
                write!(f, "BOLL breakout {}/{}", period, multiplier)
            }
        }
    }
}

struct ParamReader<'a> {
    params: &'a StrategyParams,
}

impl<'a> ParamReader<'a> {
    fn new(params: &'a StrategyParams) -> Self {
        Self { params }
    }

    fn only(&self, allowed: &[&str]) -> Result<(), BacktestError> {
        match self.params.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(unknown) => Err(BacktestError::invalid(
                &format!("strategy_params.{unknown}"),
                format!("unknown parameter, expected one of {}", allowed.join(", ")),
            )),
            None => Ok(()),
        }
    }

    fn number(&self, key: &str, default: f64) -> Result<f64, BacktestError> {
        let value = self.params.get(key).copied().unwrap_or(default);
        if !value.is_finite() {
            return Err(BacktestError::invalid(
                &format!("strategy_params.{key}"),
                "must be a finite number",
            ));
        }
        Ok(value)
    }

    fn period(&self, key: &str, default: usize) -> Result<usize, BacktestError> {
        let value = self.number(key, default as f64)?;
        if value < 1.0 || value.fract() != 0.0 {
            return Err(BacktestError::invalid(
                &format!("strategy_params.{key}"),
                "must be a positive whole number",
            ));
        }
        Ok(value as usize)
    }

    fn fast_slow(&self, fast: usize, slow: usize) -> Result<(usize, usize), BacktestError> {
        let fast = self.period("fast_period", fast)?;
        let slow = self.period("slow_period", slow)?;
        if fast >= slow {
            return Err(BacktestError::invalid(
                "strategy_params.fast_period",
                "fast_period must be less than slow_period",
            ));
        }
        Ok((fast, slow))
    }
}
