//! Strategy parameter grid search.
//!
//! Every combination of the grid is backtested over the same bars; the
//! combination with the highest score on the chosen metric wins. Ties keep
//! the combination evaluated first.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::bar::Bar;
use super::backtest::{BacktestConfig, run_backtest};
use super::error::BacktestError;
use super::metrics::PerformanceMetrics;
use super::strategy::StrategyParams;

/// Candidate values per strategy parameter.
pub type ParamGrid = BTreeMap<String, Vec<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeMetric {
    #[default]
    SharpeRatio,
    TotalReturn,
    WinRate,
    AnnualReturn,
}

impl OptimizeMetric {
    pub fn score(self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            OptimizeMetric::SharpeRatio => metrics.sharpe_ratio,
            OptimizeMetric::TotalReturn => metrics.total_return,
            OptimizeMetric::WinRate => metrics.win_rate,
            OptimizeMetric::AnnualReturn => metrics.annual_return,
        }
    }
}

impl fmt::Display for OptimizeMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptimizeMetric::SharpeRatio => "sharpe_ratio",
            OptimizeMetric::TotalReturn => "total_return",
            OptimizeMetric::WinRate => "win_rate",
            OptimizeMetric::AnnualReturn => "annual_return",
        })
    }
}

impl FromStr for OptimizeMetric {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sharpe_ratio" => Ok(OptimizeMetric::SharpeRatio),
            "total_return" => Ok(OptimizeMetric::TotalReturn),
            "win_rate" => Ok(OptimizeMetric::WinRate),
            "annual_return" => Ok(OptimizeMetric::AnnualReturn),
            other => Err(BacktestError::invalid(
                "metric",
                format!(
                    "unknown metric '{other}', expected sharpe_ratio, total_return, win_rate or annual_return"
                ),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub params: StrategyParams,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub metric: OptimizeMetric,
    pub best_params: StrategyParams,
    pub best_score: f64,
    pub best_metrics: PerformanceMetrics,
    pub evaluated: usize,
    pub skipped: usize,
    pub all_results: Vec<GridPoint>,
}

/// Largest grid `grid_search` accepts.
pub const MAX_COMBINATIONS: usize = 10_000;

/// Size of the cartesian product; `None` on overflow.
pub fn combination_count(grid: &ParamGrid) -> Option<usize> {
    if grid.is_empty() {
        return Some(0);
    }
    grid.values()
        .try_fold(1usize, |count, values| count.checked_mul(values.len()))
}

/// Cartesian product of the grid, keys in sorted order, last key varying fastest.
pub fn combinations(grid: &ParamGrid) -> Vec<StrategyParams> {
    if grid.is_empty() || grid.values().any(Vec::is_empty) {
        return Vec::new();
    }

    let mut combos = vec![StrategyParams::new()];
    for (key, values) in grid {
        combos = combos
            .into_iter()
            .flat_map(|base| {
                values.iter().map(move |&v| {
                    let mut next = base.clone();
                    next.insert(key.clone(), v);
                    next
                })
            })
            .collect();
    }
    combos
}

/// Backtest each grid combination on top of `config.strategy_params`.
///
/// Combinations the strategy rejects, or whose warm-up exceeds the bar
/// count, are skipped. Data errors that would affect every combination
/// (empty or unordered bars) abort the search.
pub fn grid_search(
    bars: &[Bar],
    config: &BacktestConfig,
    grid: &ParamGrid,
    metric: OptimizeMetric,
) -> Result<OptimizationResult, BacktestError> {
    match combination_count(grid) {
        Some(count) if count <= MAX_COMBINATIONS => {}
        _ => {
            return Err(BacktestError::invalid(
                "grid",
                format!("parameter grid exceeds {MAX_COMBINATIONS} combinations"),
            ));
        }
    }
    let combos = combinations(grid);
    if combos.is_empty() {
        return Err(BacktestError::invalid(
            "grid",
            "parameter grid has no combinations",
        ));
    }
    info!(combinations = combos.len(), %metric, strategy = %config.strategy_type, "starting grid search");

    let mut best: Option<(f64, GridPoint)> = None;
    let mut all_results = Vec::new();
    let mut skipped = 0usize;

    for combo in combos {
        let mut params = config.strategy_params.clone();
        params.extend(combo.iter().map(|(k, v)| (k.clone(), *v)));
        let candidate = BacktestConfig {
            strategy_params: params.clone(),
            ..config.clone()
        };

        let result = match run_backtest(bars, &candidate) {
            Ok(result) => result,
            Err(err)
                if err.is_config_error()
                    || matches!(err, BacktestError::InsufficientData { .. }) =>
            {
                debug!(?params, error = %err, "skipping combination");
                skipped += 1;
                continue;
            }
            Err(err) => return Err(err),
        };

        let score = metric.score(&result.metrics);
        debug!(?params, score, "evaluated combination");
        let point = GridPoint {
            params,
            metrics: result.metrics,
        };
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((score, point.clone()));
        }
        all_results.push(point);
    }

    let Some((best_score, best_point)) = best else {
        return Err(BacktestError::invalid(
            "grid",
            format!("all {skipped} combinations were rejected"),
        ));
    };

    info!(params = ?best_point.params, best_score, evaluated = all_results.len(), skipped, "grid search finished");

    Ok(OptimizationResult {
        metric,
        best_params: best_point.params,
        best_score,
        best_metrics: best_point.metrics,
        evaluated: all_results.len(),
        skipped,
        all_results,
    })
}
