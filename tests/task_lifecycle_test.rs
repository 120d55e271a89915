//! Task lifecycle through the task manager.
//!
//! Tests cover:
//! - Submission returns a pending handle and the task completes
//! - Data failures surface as failed tasks, config failures as errors
//! - Result lookup before completion and for unknown ids
//! - Listing, deletion, and the SQLite-backed store
//! - The running state is observable while bars are being fetched
//! - Store write failures still end in a terminal state

mod common;

use chrono::NaiveDate;
use common::*;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;
use stockbt::adapters::memory_task_store::MemoryTaskStore;
use stockbt::domain::backtest::BarPeriod;
use stockbt::domain::error::BacktestError;
use stockbt::domain::task::TaskStatus;
use stockbt::ports::data_port::DataPort;
use stockbt::ports::task_store::TaskStore;
use stockbt::task_manager::{DEFAULT_POLL_INTERVAL, RECORD_ATTEMPTS, TaskManager};
use tokio::runtime::Handle;

const TIMEOUT: Duration = Duration::from_secs(10);

fn manager_with(port: MockDataPort) -> TaskManager {
    manager_with_store(port, Arc::new(MemoryTaskStore::new()))
}

fn manager_with_store(port: MockDataPort, store: Arc<dyn TaskStore>) -> TaskManager {
    TaskManager::new(store, Arc::new(port), Handle::current())
}

fn port_with_wave() -> MockDataPort {
    MockDataPort::new().with_bars("600519", generate_bars("2024-01-01", 100, 100.0))
}

mod completion {
    use super::*;

    #[tokio::test]
    async fn submitted_task_completes_with_result() {
        let manager = manager_with(port_with_wave());
        let handle = manager.submit(sample_config("600519")).unwrap();
        assert_eq!(handle.status, TaskStatus::Pending);

        let task = manager
            .wait(&handle.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.error_message.is_none());
        assert!(task.updated_at >= task.created_at);

        let result = manager.result(&handle.task_id).unwrap();
        assert_eq!(result.equity_curve.len(), 100);
        assert_eq!(task.result.as_ref(), Some(&result));
    }

    #[tokio::test]
    async fn terminal_snapshot_is_stable() {
        let manager = manager_with(port_with_wave());
        let handle = manager.submit(sample_config("600519")).unwrap();
        let first = manager
            .wait(&handle.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.get(&handle.task_id).unwrap(), first);
    }

    /// Blocks every fetch until the test releases it.
    struct GatedDataPort {
        inner: MockDataPort,
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl DataPort for GatedDataPort {
        fn fetch_bars(
            &self,
            symbol: &str,
            period: BarPeriod,
            start_date: NaiveDate,
            end_date: NaiveDate,
        ) -> Result<Vec<Bar>, BacktestError> {
            self.gate.lock().unwrap().recv().unwrap();
            self.inner.fetch_bars(symbol, period, start_date, end_date)
        }

        fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
            self.inner.list_symbols()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn task_passes_through_running() {
        let (release, gate) = mpsc::channel();
        let port = GatedDataPort {
            inner: port_with_wave(),
            gate: Mutex::new(gate),
        };
        let manager = TaskManager::new(
            Arc::new(MemoryTaskStore::new()),
            Arc::new(port),
            Handle::current(),
        );
        let handle = manager.submit(sample_config("600519")).unwrap();
        assert_eq!(handle.status, TaskStatus::Pending);

        let running = tokio::time::timeout(TIMEOUT, async {
            loop {
                let task = manager.get(&handle.task_id).unwrap();
                if task.status == TaskStatus::Running {
                    return task;
                }
                assert_eq!(task.status, TaskStatus::Pending);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(running.result.is_none());
        assert!(matches!(
            manager.result(&handle.task_id),
            Err(BacktestError::TaskNotCompleted { status, .. }) if status == "running"
        ));

        release.send(()).unwrap();
        let done = manager
            .wait(&handle.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.updated_at >= running.updated_at);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_tasks_do_not_interfere() {
        let port = MockDataPort::new()
            .with_bars("AAA", generate_bars("2024-01-01", 100, 100.0))
            .with_bars("BBB", generate_bars("2024-01-01", 100, 20.0));
        let manager = manager_with(port);

        let a = manager.submit(sample_config("AAA")).unwrap();
        let b = manager.submit(sample_config("BBB")).unwrap();
        let a = manager.wait(&a.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT).await.unwrap();
        let b = manager.wait(&b.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT).await.unwrap();

        assert_eq!(a.status, TaskStatus::Completed);
        assert_eq!(b.status, TaskStatus::Completed);
        assert_eq!(a.config.symbol, "AAA");
        assert_eq!(b.config.symbol, "BBB");
        assert_ne!(
            a.result.unwrap().metrics.final_value,
            b.result.unwrap().metrics.final_value
        );
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn empty_series_fails_task() {
        let manager = manager_with(MockDataPort::new());
        let handle = manager.submit(sample_config("600519")).unwrap();
        let task = manager
            .wait(&handle.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT)
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.result.is_none());
        assert!(task.error_message.unwrap().contains("no bars"));
    }

    #[tokio::test]
    async fn unordered_series_fails_task() {
        let mut bars = generate_bars("2024-01-01", 60, 100.0);
        bars.swap(30, 31);
        let manager = manager_with(MockDataPort::new().with_bars("600519", bars));
        let handle = manager.submit(sample_config("600519")).unwrap();
        let task = manager
            .wait(&handle.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn data_port_error_fails_task() {
        let manager = manager_with(MockDataPort::new().with_error("600519", "feed offline"));
        let handle = manager.submit(sample_config("600519")).unwrap();
        let task = manager
            .wait(&handle.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error_message.unwrap().contains("feed offline"));
    }

    #[tokio::test]
    async fn nan_prices_fail_task() {
        let mut bars = generate_bars("2024-01-01", 100, 100.0);
        for bar in &mut bars[90..] {
            bar.close = f64::NAN;
        }
        let manager = manager_with(MockDataPort::new().with_bars("600519", bars));
        let handle = manager.submit(sample_config("600519")).unwrap();
        let task = manager
            .wait(&handle.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.result.is_none());
        assert!(task.error_message.unwrap().contains("bar 90"));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_without_a_task() {
        let manager = manager_with(port_with_wave());
        let mut config = sample_config("600519");
        config.initial_cash = -1.0;

        let err = manager.submit(config).unwrap_err();
        assert!(err.is_config_error());
        assert!(manager.list(10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn result_of_failed_task_is_not_completed() {
        let manager = manager_with(MockDataPort::new());
        let handle = manager.submit(sample_config("600519")).unwrap();
        manager
            .wait(&handle.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT)
            .await
            .unwrap();
        assert!(matches!(
            manager.result(&handle.task_id),
            Err(BacktestError::TaskNotCompleted { status, .. }) if status == "failed"
        ));
    }
}

mod lookups {
    use super::*;
    use stockbt::domain::task::BacktestTask;

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let manager = manager_with(MockDataPort::new());
        assert!(matches!(
            manager.get("does-not-exist"),
            Err(BacktestError::TaskNotFound { .. })
        ));
        assert!(matches!(
            manager.result("does-not-exist"),
            Err(BacktestError::TaskNotFound { .. })
        ));
        assert!(matches!(
            manager.delete("does-not-exist"),
            Err(BacktestError::TaskNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn result_before_completion_is_not_completed() {
        let store: Arc<dyn TaskStore> = Arc::new(MemoryTaskStore::new());
        let manager = manager_with_store(MockDataPort::new(), Arc::clone(&store));

        // inserted directly, so no worker ever picks it up
        let task = BacktestTask::new(sample_config("600519"));
        store.insert(&task).unwrap();

        assert!(matches!(
            manager.result(&task.task_id),
            Err(BacktestError::TaskNotCompleted { status, .. }) if status == "pending"
        ));
    }

    #[tokio::test]
    async fn wait_times_out_on_stuck_task() {
        let store: Arc<dyn TaskStore> = Arc::new(MemoryTaskStore::new());
        let manager = manager_with_store(MockDataPort::new(), Arc::clone(&store));
        let task = BacktestTask::new(sample_config("600519"));
        store.insert(&task).unwrap();

        let err = manager
            .wait(&task.task_id, Duration::from_millis(5), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, BacktestError::TaskNotCompleted { .. }));
    }

    #[tokio::test]
    async fn list_and_delete() {
        let manager = manager_with(port_with_wave());
        let first = manager.submit(sample_config("600519")).unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = manager.submit(sample_config("600519")).unwrap();
        for id in [&first.task_id, &second.task_id] {
            manager.wait(id, DEFAULT_POLL_INTERVAL, TIMEOUT).await.unwrap();
        }

        let listed: Vec<_> = manager
            .list(10, 0)
            .unwrap()
            .into_iter()
            .map(|t| t.task_id)
            .collect();
        assert_eq!(listed, vec![second.task_id.clone(), first.task_id.clone()]);

        manager.delete(&first.task_id).unwrap();
        assert_eq!(manager.list(10, 0).unwrap().len(), 1);
        assert!(manager.get(&first.task_id).is_err());
    }
}

mod store_failures {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stockbt::domain::task::BacktestTask;

    /// Memory store whose n-th `update` calls (1-based) fail.
    struct FlakyStore {
        inner: MemoryTaskStore,
        failing: Vec<usize>,
        updates: AtomicUsize,
    }

    impl FlakyStore {
        fn failing(calls: impl IntoIterator<Item = usize>) -> Self {
            Self {
                inner: MemoryTaskStore::new(),
                failing: calls.into_iter().collect(),
                updates: AtomicUsize::new(0),
            }
        }
    }

    impl TaskStore for FlakyStore {
        fn insert(&self, task: &BacktestTask) -> Result<(), BacktestError> {
            self.inner.insert(task)
        }

        fn get(&self, task_id: &str) -> Result<BacktestTask, BacktestError> {
            self.inner.get(task_id)
        }

        fn update(
            &self,
            task_id: &str,
            apply: &mut dyn FnMut(&mut BacktestTask) -> Result<(), BacktestError>,
        ) -> Result<BacktestTask, BacktestError> {
            let call = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.contains(&call) {
                return Err(BacktestError::Database {
                    reason: "disk full".into(),
                });
            }
            self.inner.update(task_id, apply)
        }

        fn list(&self, limit: usize, offset: usize) -> Result<Vec<BacktestTask>, BacktestError> {
            self.inner.list(limit, offset)
        }

        fn delete(&self, task_id: &str) -> Result<(), BacktestError> {
            self.inner.delete(task_id)
        }
    }

    async fn run_with(store: FlakyStore) -> BacktestTask {
        let manager = manager_with_store(port_with_wave(), Arc::new(store));
        let handle = manager.submit(sample_config("600519")).unwrap();
        manager
            .wait(&handle.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn transient_result_write_is_retried() {
        // update 1 starts the task, update 2 is the first result write
        let task = run_with(FlakyStore::failing([2])).await;
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.is_some());
    }

    #[tokio::test]
    async fn unrecordable_result_marks_task_failed() {
        let attempts = RECORD_ATTEMPTS as usize;
        let task = run_with(FlakyStore::failing(2..2 + attempts)).await;
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.result.is_none());
        let message = task.error_message.unwrap();
        assert!(message.contains("could not record result"), "{message}");
        assert!(message.contains("disk full"), "{message}");
    }

    #[tokio::test]
    async fn failed_start_marks_pending_task_failed() {
        let attempts = RECORD_ATTEMPTS as usize;
        let task = run_with(FlakyStore::failing(1..1 + attempts)).await;
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error_message.unwrap().contains("could not start"));
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_store {
    use super::*;
    use stockbt::adapters::sqlite_task_store::SqliteTaskStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn completed_task_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.db");
        let path = path.to_str().unwrap();

        let task_id = {
            let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::open(path, 2).unwrap());
            let manager = manager_with_store(port_with_wave(), store);
            let handle = manager.submit(sample_config("600519")).unwrap();
            let task = manager
                .wait(&handle.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT)
                .await
                .unwrap();
            assert_eq!(task.status, TaskStatus::Completed);
            handle.task_id
        };

        let reopened = SqliteTaskStore::open(path, 2).unwrap();
        let task = reopened.get(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.is_some());
    }

    #[tokio::test]
    async fn task_with_nan_prices_stays_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.db");
        let store: Arc<dyn TaskStore> =
            Arc::new(SqliteTaskStore::open(path.to_str().unwrap(), 2).unwrap());

        let mut bars = generate_bars("2024-01-01", 100, 100.0);
        for bar in &mut bars[90..] {
            bar.close = f64::NAN;
        }
        let manager =
            manager_with_store(MockDataPort::new().with_bars("600519", bars), Arc::clone(&store));
        let handle = manager.submit(sample_config("600519")).unwrap();
        let task = manager
            .wait(&handle.task_id, DEFAULT_POLL_INTERVAL, TIMEOUT)
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(store.get(&handle.task_id).unwrap(), task);
    }
}
