//! Backtest engine and event loop.
//!
//! `BacktestConfig` defines one run. `simulate` replays signals bar by bar
//! against a single-symbol long-only portfolio; `run_backtest` chains
//! validation of the bar series, signal generation, simulation and analysis.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::bar::{Bar, check_ordering, check_prices};
use super::cost::CostModel;
use super::error::BacktestError;
use super::execution::{EntryResult, ExitResult, enter_long, exit_position};
use super::metrics::{PerformanceMetrics, RoundTrip, round_trips};
use super::portfolio::{EquityPoint, Portfolio};
use super::position::Trade;
use super::signal::{Action, Signal};
use super::strategy::{DEFAULT_STRATEGY_TYPE, StrategyKind, StrategyParams};

pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;
pub const DEFAULT_COMMISSION_RATE: f64 = 0.0003;
pub const DEFAULT_STAMP_DUTY_RATE: f64 = 0.001;
pub const DEFAULT_MIN_COMMISSION: f64 = 5.0;
pub const DEFAULT_SLIPPAGE_RATE: f64 = 0.001;
pub const DEFAULT_LOT_SIZE: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl BarPeriod {
    /// Bars per year, used to annualize per-bar statistics.
    pub fn annualization_factor(self) -> f64 {
        match self {
            BarPeriod::Daily => 252.0,
            BarPeriod::Weekly => 52.0,
            BarPeriod::Monthly => 12.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BarPeriod::Daily => "daily",
            BarPeriod::Weekly => "weekly",
            BarPeriod::Monthly => "monthly",
        }
    }
}

impl fmt::Display for BarPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BarPeriod {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(BarPeriod::Daily),
            "weekly" => Ok(BarPeriod::Weekly),
            "monthly" => Ok(BarPeriod::Monthly),
            other => Err(BacktestError::invalid(
                "period",
                format!("'{other}' is not one of daily, weekly, monthly"),
            )),
        }
    }
}

mod defaults {
    pub fn initial_cash() -> f64 {
        super::DEFAULT_INITIAL_CASH
    }
    pub fn commission_rate() -> f64 {
        super::DEFAULT_COMMISSION_RATE
    }
    pub fn stamp_duty_rate() -> f64 {
        super::DEFAULT_STAMP_DUTY_RATE
    }
    pub fn min_commission() -> f64 {
        super::DEFAULT_MIN_COMMISSION
    }
    pub fn slippage_rate() -> f64 {
        super::DEFAULT_SLIPPAGE_RATE
    }
    pub fn lot_size() -> u64 {
        super::DEFAULT_LOT_SIZE
    }
    pub fn strategy_type() -> String {
        super::DEFAULT_STRATEGY_TYPE.to_string()
    }
}

/// Parameters of a single run. Immutable once a task has been created for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub period: BarPeriod,
    #[serde(default = "defaults::initial_cash")]
    pub initial_cash: f64,
    #[serde(default = "defaults::commission_rate")]
    pub commission_rate: f64,
    #[serde(default = "defaults::stamp_duty_rate")]
    pub stamp_duty_rate: f64,
    #[serde(default = "defaults::min_commission")]
    pub min_commission: f64,
    #[serde(default = "defaults::slippage_rate")]
    pub slippage_rate: f64,
    #[serde(default = "defaults::lot_size")]
    pub lot_size: u64,
    #[serde(default)]
    pub risk_free_rate: f64,
    #[serde(default = "defaults::strategy_type")]
    pub strategy_type: String,
    #[serde(default)]
    pub strategy_params: StrategyParams,
}

impl BacktestConfig {
    /// A config with default costs and the default strategy.
    pub fn new(symbol: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        BacktestConfig {
            symbol: symbol.into(),
            start_date,
            end_date,
            period: BarPeriod::default(),
            initial_cash: DEFAULT_INITIAL_CASH,
            commission_rate: DEFAULT_COMMISSION_RATE,
            stamp_duty_rate: DEFAULT_STAMP_DUTY_RATE,
            min_commission: DEFAULT_MIN_COMMISSION,
            slippage_rate: DEFAULT_SLIPPAGE_RATE,
            lot_size: DEFAULT_LOT_SIZE,
            risk_free_rate: 0.0,
            strategy_type: DEFAULT_STRATEGY_TYPE.to_string(),
            strategy_params: StrategyParams::new(),
        }
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel {
            commission_rate: self.commission_rate,
            stamp_duty_rate: self.stamp_duty_rate,
            min_commission: self.min_commission,
            slippage_rate: self.slippage_rate,
        }
    }

    pub fn strategy(&self) -> Result<StrategyKind, BacktestError> {
        StrategyKind::from_params(&self.strategy_type, &self.strategy_params)
    }
}

/// Raw simulator output before analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    /// Signals that could not be filled (unaffordable buys, overdrawn sells).
    pub skipped_fills: usize,
}

/// Everything a completed task reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub round_trips: Vec<RoundTrip>,
}

/// Replay `signals` over `bars`, filling at each bar's close.
///
/// A signal at bar i only affects bar i. Buys are ignored while invested and
/// sells while flat. Exactly one equity point is appended per bar, after the
/// bar's signal has been handled.
pub fn simulate(bars: &[Bar], signals: &[Signal], config: &BacktestConfig) -> SimulationOutput {
    let costs = config.cost_model();
    let mut actions = vec![Action::Hold; bars.len()];
    for signal in signals {
        if let Some(slot) = actions.get_mut(signal.bar_index) {
            *slot = signal.action;
        }
    }

    let mut portfolio = Portfolio::new(config.initial_cash);
    let mut skipped_fills = 0usize;

    for (bar, action) in bars.iter().zip(actions) {
        match action {
            Action::Buy if portfolio.is_flat() => {
                if enter_long(&mut portfolio, bar.date, bar.close, config.lot_size, &costs)
                    == EntryResult::InsufficientFunds
                {
                    warn!(date = %bar.date, cash = portfolio.cash, close = bar.close, "buy skipped: insufficient funds");
                    skipped_fills += 1;
                }
            }
            Action::Sell if !portfolio.is_flat() => {
                if exit_position(&mut portfolio, bar.date, bar.close, &costs)
                    == ExitResult::InsufficientFunds
                {
                    warn!(date = %bar.date, cash = portfolio.cash, "sell skipped: fees exceed available cash");
                    skipped_fills += 1;
                }
            }
            _ => {}
        }
        portfolio.mark(bar.date, bar.close);
    }

    let open_pnl = match (portfolio.position.as_ref(), bars.last()) {
        (Some(position), Some(last)) => position.unrealized_pnl(last.close),
        _ => 0.0,
    };
    debug!(
        bars = bars.len(),
        trades = portfolio.trades.len(),
        skipped_fills,
        open_pnl,
        "simulation finished"
    );

    SimulationOutput {
        equity_curve: portfolio.equity_curve,
        trades: portfolio.trades,
        skipped_fills,
    }
}

/// Run one backtest over an already fetched bar series.
///
/// Fails on an empty series, on bars that are not strictly increasing by
/// date, on bars with unusable prices, and on a series shorter than the
/// strategy's warm-up.
pub fn run_backtest(bars: &[Bar], config: &BacktestConfig) -> Result<BacktestResult, BacktestError> {
    if bars.is_empty() {
        return Err(BacktestError::NoData {
            symbol: config.symbol.clone(),
            start: config.start_date,
            end: config.end_date,
        });
    }
    check_ordering(bars)?;
    check_prices(bars)?;

    let strategy = config.strategy()?;
    let minimum = strategy.warmup_bars();
    if bars.len() < minimum {
        return Err(BacktestError::InsufficientData {
            symbol: config.symbol.clone(),
            bars: bars.len(),
            minimum,
        });
    }

    let signals = strategy.signals(bars);
    let output = simulate(bars, &signals, config);
    let metrics = PerformanceMetrics::compute(
        &output.equity_curve,
        &output.trades,
        config.initial_cash,
        config.period,
        config.risk_free_rate,
    );

    Ok(BacktestResult {
        metrics,
        round_trips: round_trips(&output.trades),
        equity_curve: output.equity_curve,
        trades: output.trades,
    })
}
