//! SQLite task store.
//!
//! Each task is one row holding its JSON snapshot. Updates run the closure
//! inside an IMMEDIATE transaction, so a poller reads either the old or the
//! new snapshot and never a partial write.

use crate::domain::error::BacktestError;
use crate::domain::task::BacktestTask;
use crate::ports::config_port::ConfigPort;
use crate::ports::task_store::TaskStore;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, TransactionBehavior, params};

pub struct SqliteTaskStore {
    pool: Pool<SqliteConnectionManager>,
}

fn db_err(e: r2d2::Error) -> BacktestError {
    BacktestError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> BacktestError {
    BacktestError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn not_found(task_id: &str) -> BacktestError {
    BacktestError::TaskNotFound {
        task_id: task_id.to_string(),
    }
}

impl SqliteTaskStore {
    pub fn open(path: &str, pool_size: u32) -> Result<Self, BacktestError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(db_err)?;
        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Reads `[store] path` and `[store] pool_size` (default 4).
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BacktestError> {
        let path = config
            .get_string("store", "path")
            .ok_or_else(|| BacktestError::ConfigMissing {
                key: "store.path".into(),
            })?;
        let pool_size = config.get_int("store", "pool_size", 4).clamp(1, 64) as u32;
        Self::open(&path, pool_size)
    }

    pub fn in_memory() -> Result<Self, BacktestError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;
        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, BacktestError> {
        self.pool.get().map_err(db_err)
    }

    fn initialize_schema(&self) -> Result<(), BacktestError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS backtest_tasks (
                    task_id TEXT PRIMARY KEY,
                    status TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    snapshot TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_backtest_tasks_created
                    ON backtest_tasks(created_at DESC);",
            )
            .map_err(query_err)
    }
}

fn decode(snapshot: &str) -> Result<BacktestTask, BacktestError> {
    Ok(serde_json::from_str(snapshot)?)
}

impl TaskStore for SqliteTaskStore {
    fn insert(&self, task: &BacktestTask) -> Result<(), BacktestError> {
        let snapshot = serde_json::to_string(task)?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO backtest_tasks (task_id, status, created_at, updated_at, snapshot)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    task.task_id,
                    task.status.as_str(),
                    task.created_at.timestamp_micros(),
                    task.updated_at.timestamp_micros(),
                    snapshot
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn get(&self, task_id: &str) -> Result<BacktestTask, BacktestError> {
        let snapshot: Option<String> = self
            .conn()?
            .query_row(
                "SELECT snapshot FROM backtest_tasks WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;
        decode(&snapshot.ok_or_else(|| not_found(task_id))?)
    }

    fn update(
        &self,
        task_id: &str,
        apply: &mut dyn FnMut(&mut BacktestTask) -> Result<(), BacktestError>,
    ) -> Result<BacktestTask, BacktestError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;

        let snapshot: Option<String> = tx
            .query_row(
                "SELECT snapshot FROM backtest_tasks WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;
        let mut task = decode(&snapshot.ok_or_else(|| not_found(task_id))?)?;

        // an error here drops the transaction, which rolls it back
        apply(&mut task)?;

        tx.execute(
            "UPDATE backtest_tasks SET status = ?2, updated_at = ?3, snapshot = ?4 WHERE task_id = ?1",
            params![
                task_id,
                task.status.as_str(),
                task.updated_at.timestamp_micros(),
                serde_json::to_string(&task)?
            ],
        )
        .map_err(query_err)?;
        tx.commit().map_err(query_err)?;
        Ok(task)
    }

    fn list(&self, limit: usize, offset: usize) -> Result<Vec<BacktestTask>, BacktestError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT snapshot FROM backtest_tasks
                 ORDER BY created_at DESC, task_id ASC
                 LIMIT ?1 OFFSET ?2",
            )
            .map_err(query_err)?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit, offset], |row| row.get::<_, String>(0))
            .map_err(query_err)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(decode(&row.map_err(query_err)?)?);
        }
        Ok(tasks)
    }

    fn delete(&self, task_id: &str) -> Result<(), BacktestError> {
        let affected = self
            .conn()?
            .execute(
                "DELETE FROM backtest_tasks WHERE task_id = ?1",
                params![task_id],
            )
            .map_err(query_err)?;
        if affected == 0 {
            return Err(not_found(task_id));
        }
        Ok(())
    }
}
