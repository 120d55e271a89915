//! Backtest task lifecycle: submit, execute in the background, poll.
//!
//! `submit` validates synchronously and returns a pending handle at once.
//! The run itself happens on tokio's blocking pool and moves the task
//! `pending -> running -> completed | failed`. Failures during a run are
//! stored on the task; they never surface to the submitter.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::domain::backtest::{BacktestConfig, BacktestResult, run_backtest};
use crate::domain::config_validation::validate_backtest_config;
use crate::domain::error::BacktestError;
use crate::domain::task::{BacktestTask, TaskHandle, TaskStatus};
use crate::ports::data_port::DataPort;
use crate::ports::task_store::TaskStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone)]
pub struct TaskManager {
    store: Arc<dyn TaskStore>,
    data: Arc<dyn DataPort>,
    runtime: Handle,
}

impl TaskManager {
    pub fn new(store: Arc<dyn TaskStore>, data: Arc<dyn DataPort>, runtime: Handle) -> Self {
        Self {
            store,
            data,
            runtime,
        }
    }

    /// Validate `config`, record a pending task and schedule it.
    ///
    /// Configuration errors are returned here and no task is created.
    pub fn submit(&self, config: BacktestConfig) -> Result<TaskHandle, BacktestError> {
        validate_backtest_config(&config)?;

        let task = BacktestTask::new(config);
        self.store.insert(&task)?;
        info!(
            task_id = %task.task_id,
            symbol = %task.config.symbol,
            strategy = %task.config.strategy_type,
            "backtest submitted"
        );

        let store = Arc::clone(&self.store);
        let data = Arc::clone(&self.data);
        let task_id = task.task_id.clone();
        let worker = self
            .runtime
            .spawn_blocking(move || execute(store.as_ref(), data.as_ref(), &task_id));

        // a panicking run still has to reach a terminal state
        let store = Arc::clone(&self.store);
        let task_id = task.task_id.clone();
        self.runtime.spawn(async move {
            if let Err(join_err) = worker.await {
                error!(%task_id, error = %join_err, "backtest worker aborted");
                let message = format!("internal error: {join_err}");
                if let Err(e) = store.update(&task_id, &mut |t| t.fail(message.clone())) {
                    warn!(%task_id, error = %e, "could not record worker failure");
                }
            }
        });

        Ok(TaskHandle::from(&task))
    }

    pub fn get(&self, task_id: &str) -> Result<BacktestTask, BacktestError> {
        self.store.get(task_id)
    }

    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<BacktestTask>, BacktestError> {
        self.store.list(limit, offset)
    }

    pub fn delete(&self, task_id: &str) -> Result<(), BacktestError> {
        self.store.delete(task_id)?;
        info!(%task_id, "backtest deleted");
        Ok(())
    }

    /// The result of a completed task.
    pub fn result(&self, task_id: &str) -> Result<BacktestResult, BacktestError> {
        let task = self.store.get(task_id)?;
        match (task.status, task.result) {
            (TaskStatus::Completed, Some(result)) => Ok(result),
            (status, _) => Err(BacktestError::TaskNotCompleted {
                task_id: task.task_id,
                status: status.to_string(),
            }),
        }
    }

    /// Poll until the task is terminal. On timeout returns `TaskNotCompleted`
    /// with the last observed status.
    pub async fn wait(
        &self,
        task_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<BacktestTask, BacktestError> {
        let polling = async {
            loop {
                let task = self.store.get(task_id)?;
                if task.status.is_terminal() {
                    return Ok(task);
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        match tokio::time::timeout(timeout, polling).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let task = self.store.get(task_id)?;
                Err(BacktestError::TaskNotCompleted {
                    task_id: task.task_id,
                    status: task.status.to_string(),
                })
            }
        }
    }
}

/// Store writes that move a task forward are tried this many times.
pub const RECORD_ATTEMPTS: u32 = 3;

/// Run one task to a terminal state.
fn execute(store: &dyn TaskStore, data: &dyn DataPort, task_id: &str) {
    let task = match record(store, task_id, &mut |t| t.transition(TaskStatus::Running)) {
        Ok(task) => task,
        Err(e) => {
            warn!(%task_id, error = %e, "could not start backtest");
            let message = format!("could not start: {e}");
            if let Err(e) = record(store, task_id, &mut |t| t.fail(message.clone())) {
                error!(%task_id, error = %e, "could not record start failure");
            }
            return;
        }
    };
    let config = &task.config;

    let outcome = data
        .fetch_bars(&config.symbol, config.period, config.start_date, config.end_date)
        .and_then(|bars| run_backtest(&bars, config));

    let message = match outcome {
        Ok(result) => {
            info!(
                %task_id,
                trades = result.trades.len(),
                total_return = result.metrics.total_return,
                sharpe_ratio = result.metrics.sharpe_ratio,
                "backtest completed"
            );
            match record(store, task_id, &mut |t| t.complete(result.clone())) {
                Ok(_) => return,
                Err(e) => {
                    error!(%task_id, error = %e, "could not record backtest result");
                    format!("could not record result: {e}")
                }
            }
        }
        Err(e) => {
            warn!(%task_id, error = %e, "backtest failed");
            e.to_string()
        }
    };

    if let Err(e) = record(store, task_id, &mut |t| t.fail(message.clone())) {
        error!(%task_id, error = %e, "could not record backtest failure");
    }
}

/// `store.update` with retries. Missing tasks and rejected transitions are
/// returned at once.
fn record(
    store: &dyn TaskStore,
    task_id: &str,
    apply: &mut dyn FnMut(&mut BacktestTask) -> Result<(), BacktestError>,
) -> Result<BacktestTask, BacktestError> {
    let mut attempt = 1;
    loop {
        match store.update(task_id, &mut *apply) {
            Ok(task) => return Ok(task),
            Err(e @ (BacktestError::TaskNotFound { .. } | BacktestError::InvalidTransition { .. })) => {
                return Err(e);
            }
            Err(e) if attempt >= RECORD_ATTEMPTS => return Err(e),
            Err(e) => {
                debug!(%task_id, attempt, error = %e, "task update failed, retrying");
                std::thread::sleep(Duration::from_millis(10 * u64::from(attempt)));
                attempt += 1;
            }
        }
    }
}
