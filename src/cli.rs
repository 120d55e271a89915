//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::memory_task_store::MemoryTaskStore;
use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::config_validation::{load_backtest_config, validate_backtest_config};
use crate::domain::error::BacktestError;
use crate::domain::optimizer::{OptimizationResult, OptimizeMetric, ParamGrid, grid_search};
use crate::domain::task::{BacktestTask, TaskStatus};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use crate::ports::task_store::TaskStore;
use crate::task_manager::{DEFAULT_POLL_INTERVAL, TaskManager};

const WAIT_TIMEOUT: Duration = Duration::from_secs(3600);
const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

#[derive(Parser, Debug)]
#[command(name = "stockbt", about = "Single-symbol strategy backtester")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and print its metrics
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of `{symbol}_{period}.csv` files (overrides `[data] path`)
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Export file; `.csv` writes the trade ledger, anything else JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Check a configuration without running it
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Grid-search strategy parameters
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// `name=v1,v2,...`, repeatable
        #[arg(short, long, required = true, num_args = 1..)]
        grid: Vec<String>,
        #[arg(short, long, default_value = "sharpe_ratio")]
        metric: String,
    },
    /// List symbols available in the data directory
    Symbols {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// Print a stored task as JSON
    Status {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        task_id: String,
    },
    /// Start the HTTP server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        addr: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            symbol,
        } => run_backtest(&config, data.as_deref(), output.as_deref(), symbol.as_deref()).map(drop),
        Command::Validate { config } => run_validate(&config).map(drop),
        Command::Optimize {
            config,
            data,
            grid,
            metric,
        } => run_optimize(&config, data.as_deref(), &grid, &metric).map(drop),
        Command::Symbols { config, data } => run_symbols(&config, data.as_deref()).map(drop),
        Command::Status { config, task_id } => run_status(&config, &task_id).map(drop),
        Command::Serve { config, addr } => run_serve(&config, addr.as_deref()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // a subscriber may already be installed when called from tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BacktestError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// `--data` wins over `[data] path`.
pub fn resolve_data_dir(
    data_override: Option<&Path>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, BacktestError> {
    match data_override {
        Some(dir) => Ok(dir.to_path_buf()),
        None => config
            .get_string("data", "path")
            .map(PathBuf::from)
            .ok_or_else(|| BacktestError::ConfigMissing {
                key: "data.path".into(),
            }),
    }
}

/// SQLite when `[store] path` is set, in-memory otherwise.
pub fn open_store(config: &dyn ConfigPort) -> Result<Arc<dyn TaskStore>, BacktestError> {
    match config.get_string("store", "path") {
        #[cfg(feature = "sqlite")]
        Some(_) => {
            use crate::adapters::sqlite_task_store::SqliteTaskStore;
            Ok(Arc::new(SqliteTaskStore::from_config(config)?))
        }
        #[cfg(not(feature = "sqlite"))]
        Some(path) => {
            warn!(%path, "sqlite feature disabled, tasks kept in memory");
            Ok(Arc::new(MemoryTaskStore::new()))
        }
        None => Ok(Arc::new(MemoryTaskStore::new())),
    }
}

/// Parses `name=v1,v2,...` arguments into a parameter grid.
pub fn parse_grid(args: &[String]) -> Result<ParamGrid, BacktestError> {
    let mut grid = ParamGrid::new();
    for arg in args {
        let (name, values) = arg
            .split_once('=')
            .ok_or_else(|| BacktestError::invalid("grid", format!("expected name=v1,v2 in '{arg}'")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(BacktestError::invalid("grid", format!("missing parameter name in '{arg}'")));
        }
        let values = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| BacktestError::invalid("grid", format!("'{v}' is not a number")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if values.is_empty() {
            return Err(BacktestError::invalid("grid", format!("no values for {name}")));
        }
        if grid.insert(name.to_string(), values).is_some() {
            return Err(BacktestError::invalid("grid", format!("{name} given twice")));
        }
    }
    Ok(grid)
}

/// Picks the exporter from the file extension.
pub fn write_report(
    result: &BacktestResult,
    config: &BacktestConfig,
    path: &Path,
) -> Result<(), BacktestError> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let reporter: Box<dyn ReportPort> = if is_csv {
        Box::new(CsvReportAdapter::new())
    } else {
        Box::new(JsonReportAdapter::new())
    };
    reporter.write(result, config, &path.to_string_lossy())?;
    info!(path = %path.display(), "report written");
    Ok(())
}

fn build_runtime() -> Result<tokio::runtime::Runtime, BacktestError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Submits through the task manager and blocks until the task is terminal.
pub fn run_backtest(
    config_path: &Path,
    data_override: Option<&Path>,
    output_path: Option<&Path>,
    symbol_override: Option<&str>,
) -> Result<BacktestResult, BacktestError> {
    let adapter = load_config(config_path)?;
    let mut config = load_backtest_config(&adapter)?;
    if let Some(symbol) = symbol_override {
        config.symbol = symbol.to_string();
    }

    let data: Arc<dyn DataPort> = Arc::new(CsvAdapter::new(resolve_data_dir(data_override, &adapter)?));
    let store = open_store(&adapter)?;
    let runtime = build_runtime()?;
    let manager = TaskManager::new(store, data, runtime.handle().clone());

    let handle = manager.submit(config.clone())?;
    eprintln!("Submitted task {}", handle.task_id);
    let task = runtime.block_on(manager.wait(&handle.task_id, DEFAULT_POLL_INTERVAL, WAIT_TIMEOUT))?;
    let result = completed_result(task)?;

    print_summary(&config, &result);
    if let Some(path) = output_path {
        write_report(&result, &config, path)?;
    }
    Ok(result)
}

fn completed_result(task: BacktestTask) -> Result<BacktestResult, BacktestError> {
    match (task.status, task.result) {
        (TaskStatus::Completed, Some(result)) => Ok(result),
        (TaskStatus::Failed, _) => Err(BacktestError::TaskFailed {
            task_id: task.task_id,
            reason: task.error_message.unwrap_or_default(),
        }),
        (status, _) => Err(BacktestError::TaskNotCompleted {
            task_id: task.task_id,
            status: status.to_string(),
        }),
    }
}

fn print_summary(config: &BacktestConfig, result: &BacktestResult) {
    let m = &result.metrics;
    println!(
        "{} {} {}..{} ({})",
        config.symbol, config.strategy_type, config.start_date, config.end_date, config.period
    );
    println!("  initial value:  {:.2}", m.initial_value);
    println!("  final value:    {:.2}", m.final_value);
    println!("  total return:   {:.2}%", m.total_return * 100.0);
    println!("  annual return:  {:.2}%", m.annual_return * 100.0);
    println!("  sharpe ratio:   {:.4}", m.sharpe_ratio);
    println!("  max drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!(
        "  trades:         {} ({} won, {} lost, win rate {:.2}%)",
        m.total_trades,
        m.won_trades,
        m.lost_trades,
        m.win_rate * 100.0
    );
}

pub fn run_validate(config_path: &Path) -> Result<BacktestConfig, BacktestError> {
    let adapter = load_config(config_path)?;
    let config = load_backtest_config(&adapter)?;
    validate_backtest_config(&config)?;

    let strategy = config.strategy()?;
    println!("Configuration is valid");
    println!("  symbol:   {} ({})", config.symbol, config.period);
    println!("  range:    {} .. {}", config.start_date, config.end_date);
    println!("  strategy: {strategy}");
    println!("  warm-up:  {} bars", strategy.warmup_bars());
    Ok(config)
}

pub fn run_optimize(
    config_path: &Path,
    data_override: Option<&Path>,
    grid_args: &[String],
    metric: &str,
) -> Result<OptimizationResult, BacktestError> {
    let metric: OptimizeMetric = metric.parse()?;
    let grid = parse_grid(grid_args)?;

    let adapter = load_config(config_path)?;
    let config = load_backtest_config(&adapter)?;
    validate_backtest_config(&config)?;

    let data = CsvAdapter::new(resolve_data_dir(data_override, &adapter)?);
    let bars = data.fetch_bars(&config.symbol, config.period, config.start_date, config.end_date)?;
    let outcome = grid_search(&bars, &config, &grid, metric)?;

    println!(
        "Best {} = {:.4} after {} combinations ({} skipped)",
        outcome.metric, outcome.best_score, outcome.evaluated, outcome.skipped
    );
    for (name, value) in &outcome.best_params {
        println!("  {name} = {value}");
    }
    Ok(outcome)
}

pub fn run_symbols(
    config_path: &Path,
    data_override: Option<&Path>,
) -> Result<Vec<String>, BacktestError> {
    let adapter = load_config(config_path)?;
    let data = CsvAdapter::new(resolve_data_dir(data_override, &adapter)?);
    let symbols = data.list_symbols()?;
    if symbols.is_empty() {
        warn!("no symbol files found");
    }
    for symbol in &symbols {
        println!("{symbol}");
    }
    Ok(symbols)
}

/// Reads a snapshot from the persistent store named by `[store] path`.
pub fn run_status(config_path: &Path, task_id: &str) -> Result<BacktestTask, BacktestError> {
    let adapter = load_config(config_path)?;
    if adapter.get_string("store", "path").is_none() {
        return Err(BacktestError::ConfigMissing {
            key: "store.path".into(),
        });
    }
    let store = open_store(&adapter)?;
    let task = store.get(task_id)?;
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(task)
}

fn run_serve(config_path: &Path, addr_override: Option<&str>) -> Result<(), BacktestError> {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{AppState, build_router};
        use std::net::SocketAddr;

        let adapter = load_config(config_path)?;
        let data: Arc<dyn DataPort> = Arc::new(CsvAdapter::new(resolve_data_dir(None, &adapter)?));
        let store = open_store(&adapter)?;

        let listen = addr_override
            .map(str::to_string)
            .or_else(|| adapter.get_string("web", "listen"))
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let addr: SocketAddr = listen
            .parse()
            .map_err(|_| BacktestError::invalid("web.listen", format!("'{listen}' is not host:port")))?;

        let runtime = build_runtime()?;
        let manager = TaskManager::new(store, data, runtime.handle().clone());
        let router = build_router(AppState {
            manager: Arc::new(manager),
        });

        runtime.block_on(async {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "listening");
            axum::serve(listener, router).await?;
            Ok::<(), BacktestError>(())
        })
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = (config_path, addr_override, DEFAULT_LISTEN);
        Err(BacktestError::invalid("serve", "web feature is required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_grid_reads_each_parameter() {
        let grid = parse_grid(&args(&["fast_period=3,5", "slow_period = 20, 30 ,40"])).unwrap();
        assert_eq!(grid["fast_period"], vec![3.0, 5.0]);
        assert_eq!(grid["slow_period"], vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn parse_grid_rejects_malformed_entries() {
        for bad in ["fast_period", "=1,2", "fast_period=", "fast_period=a,b"] {
            let err = parse_grid(&args(&[bad])).unwrap_err();
            assert!(err.is_config_error(), "{bad}: {err}");
        }
        assert!(parse_grid(&args(&["k=1", "k=2"])).is_err());
    }

    #[test]
    fn data_dir_override_wins() {
        let config = FileConfigAdapter::from_string("[data]\npath = /from/config\n").unwrap();
        assert_eq!(
            resolve_data_dir(Some(Path::new("/from/flag")), &config).unwrap(),
            PathBuf::from("/from/flag")
        );
        assert_eq!(
            resolve_data_dir(None, &config).unwrap(),
            PathBuf::from("/from/config")
        );
    }

    #[test]
    fn data_dir_missing_is_config_error() {
        let config = FileConfigAdapter::from_string("[backtest]\nsymbol = X\n").unwrap();
        assert!(matches!(
            resolve_data_dir(None, &config),
            Err(BacktestError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn open_store_defaults_to_memory() {
        let config = FileConfigAdapter::from_string("[backtest]\nsymbol = X\n").unwrap();
        let store = open_store(&config).unwrap();
        assert!(store.list(10, 0).unwrap().is_empty());
    }

    #[test]
    fn cli_parses_backtest_command() {
        let cli = Cli::parse_from([
            "stockbt", "-v", "backtest", "-c", "bt.ini", "-d", "bars", "--symbol", "600519",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Command::Backtest { config, data, symbol, output } => {
                assert_eq!(config, PathBuf::from("bt.ini"));
                assert_eq!(data, Some(PathBuf::from("bars")));
                assert_eq!(symbol.as_deref(), Some("600519"));
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_optimize_requires_grid() {
        assert!(Cli::try_parse_from(["stockbt", "optimize", "-c", "bt.ini"]).is_err());
        let cli = Cli::parse_from([
            "stockbt", "optimize", "-c", "bt.ini", "--grid", "fast_period=3,5", "slow_period=20",
        ]);
        match cli.command {
            Command::Optimize { grid, metric, .. } => {
                assert_eq!(grid.len(), 2);
                assert_eq!(metric, "sharpe_ratio");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
