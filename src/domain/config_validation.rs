//! Configuration loading and validation.
//!
//! Reads a BacktestConfig from the `[backtest]` and `[strategy]` sections of
//! a ConfigPort, and validates every field before a task is created.

use std::str::FromStr;

use chrono::NaiveDate;

use crate::domain::backtest::{
    BacktestConfig, BarPeriod, DEFAULT_COMMISSION_RATE, DEFAULT_INITIAL_CASH, DEFAULT_LOT_SIZE,
    DEFAULT_MIN_COMMISSION, DEFAULT_SLIPPAGE_RATE, DEFAULT_STAMP_DUTY_RATE,
};
use crate::domain::error::BacktestError;
use crate::domain::strategy::{DEFAULT_STRATEGY_TYPE, StrategyParams};
use crate::ports::config_port::ConfigPort;

const MAX_COMMISSION_RATE: f64 = 0.01;
const MAX_STAMP_DUTY_RATE: f64 = 0.01;
const MAX_SLIPPAGE_RATE: f64 = 0.1;

/// Build a config from INI-style sections. Absent keys take defaults; present
/// but unparsable values are errors. The result is not yet validated.
pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, BacktestError> {
    let symbol = config
        .get_string("backtest", "symbol")
        .ok_or_else(|| BacktestError::ConfigMissing {
            key: "backtest.symbol".to_string(),
        })?;
    let start_date = required_date(config, "start_date")?;
    let end_date = required_date(config, "end_date")?;

    let period = match config.get_string("backtest", "period") {
        Some(value) => BarPeriod::from_str(&value)?,
        None => BarPeriod::default(),
    };

    let strategy_type = config
        .get_string("strategy", "type")
        .unwrap_or_else(|| DEFAULT_STRATEGY_TYPE.to_string());
    let mut strategy_params = StrategyParams::new();
    for key in config.keys("strategy") {
        if key == "type" {
            continue;
        }
        let value = parse_value::<f64>(config, "strategy", &key)?.unwrap_or_default();
        strategy_params.insert(key, value);
    }

    Ok(BacktestConfig {
        symbol: symbol.trim().to_string(),
        start_date,
        end_date,
        period,
        initial_cash: optional(config, "initial_cash", DEFAULT_INITIAL_CASH)?,
        commission_rate: optional(config, "commission_rate", DEFAULT_COMMISSION_RATE)?,
        stamp_duty_rate: optional(config, "stamp_duty_rate", DEFAULT_STAMP_DUTY_RATE)?,
        min_commission: optional(config, "min_commission", DEFAULT_MIN_COMMISSION)?,
        slippage_rate: optional(config, "slippage_rate", DEFAULT_SLIPPAGE_RATE)?,
        lot_size: optional(config, "lot_size", DEFAULT_LOT_SIZE)?,
        risk_free_rate: optional(config, "risk_free_rate", 0.0)?,
        strategy_type: strategy_type.trim().to_string(),
        strategy_params,
    })
}

fn parse_value<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, BacktestError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    raw.trim().parse::<T>().map(Some).map_err(|_| {
        BacktestError::invalid(&format!("{section}.{key}"), format!("cannot parse '{raw}'"))
    })
}

fn optional<T: FromStr>(config: &dyn ConfigPort, key: &str, default: T) -> Result<T, BacktestError> {
    Ok(parse_value(config, "backtest", key)?.unwrap_or(default))
}

fn required_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, BacktestError> {
    parse_value::<NaiveDate>(config, "backtest", key)?.ok_or_else(|| BacktestError::ConfigMissing {
        key: format!("backtest.{key}"),
    })
}

pub fn validate_backtest_config(config: &BacktestConfig) -> Result<(), BacktestError> {
    validate_symbol(&config.symbol)?;
    validate_dates(config)?;
    validate_initial_cash(config.initial_cash)?;
    validate_rate("commission_rate", config.commission_rate, MAX_COMMISSION_RATE)?;
    validate_rate("stamp_duty_rate", config.stamp_duty_rate, MAX_STAMP_DUTY_RATE)?;
    validate_rate("slippage_rate", config.slippage_rate, MAX_SLIPPAGE_RATE)?;
    validate_min_commission(config.min_commission)?;
    validate_lot_size(config.lot_size)?;
    validate_risk_free_rate(config.risk_free_rate)?;
    config.strategy()?;
    Ok(())
}

fn validate_symbol(symbol: &str) -> Result<(), BacktestError> {
    if symbol.trim().is_empty() {
        return Err(BacktestError::ConfigMissing {
            key: "symbol".to_string(),
        });
    }
    if let Some(c) = symbol
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(BacktestError::invalid(
            "symbol",
            format!("'{symbol}' contains invalid character '{c}'"),
        ));
    }
    Ok(())
}

fn validate_dates(config: &BacktestConfig) -> Result<(), BacktestError> {
    if config.start_date >= config.end_date {
        return Err(BacktestError::invalid(
            "start_date",
            format!(
                "start_date ({}) must be before end_date ({})",
                config.start_date, config.end_date
            ),
        ));
    }
    Ok(())
}

fn validate_initial_cash(value: f64) -> Result<(), BacktestError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(BacktestError::invalid(
            "initial_cash",
            "initial_cash must be positive",
        ));
    }
    Ok(())
}

fn validate_rate(key: &str, value: f64, max: f64) -> Result<(), BacktestError> {
    if !(0.0..=max).contains(&value) {
        return Err(BacktestError::invalid(
            key,
            format!("{key} must be between 0 and {max}, got {value}"),
        ));
    }
    Ok(())
}

fn validate_min_commission(value: f64) -> Result<(), BacktestError> {
    if !value.is_finite() || value < 0.0 {
        return Err(BacktestError::invalid(
            "min_commission",
            "min_commission must be non-negative",
        ));
    }
    Ok(())
}

fn validate_lot_size(value: u64) -> Result<(), BacktestError> {
    if value == 0 {
        return Err(BacktestError::invalid("lot_size", "lot_size must be at least 1"));
    }
    Ok(())
}

fn validate_risk_free_rate(value: f64) -> Result<(), BacktestError> {
    if !(0.0..1.0).contains(&value) {
        return Err(BacktestError::invalid(
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}
