//! In-process task store.
//!
//! The map lock is held only long enough to find a record; each record has
//! its own mutex, so updates to different tasks never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::domain::error::BacktestError;
use crate::domain::task::BacktestTask;
use crate::ports::task_store::TaskStore;

type Record = Arc<Mutex<BacktestTask>>;

#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, Record>>,
}

fn poisoned() -> BacktestError {
    BacktestError::Database {
        reason: "task store lock poisoned".to_string(),
    }
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, task_id: &str) -> Result<Record, BacktestError> {
        let tasks = self.tasks.read().map_err(|_| poisoned())?;
        tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| BacktestError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }
}

impl TaskStore for MemoryTaskStore {
    fn insert(&self, task: &BacktestTask) -> Result<(), BacktestError> {
        let mut tasks = self.tasks.write().map_err(|_| poisoned())?;
        tasks.insert(task.task_id.clone(), Arc::new(Mutex::new(task.clone())));
        Ok(())
    }

    fn get(&self, task_id: &str) -> Result<BacktestTask, BacktestError> {
        let record = self.record(task_id)?;
        let task = record.lock().map_err(|_| poisoned())?;
        Ok(task.clone())
    }

    fn update(
        &self,
        task_id: &str,
        apply: &mut dyn FnMut(&mut BacktestTask) -> Result<(), BacktestError>,
    ) -> Result<BacktestTask, BacktestError> {
        let record = self.record(task_id)?;
        let mut task = record.lock().map_err(|_| poisoned())?;
        // apply to a copy so a failed closure leaves the record untouched
        let mut next = task.clone();
        apply(&mut next)?;
        *task = next.clone();
        Ok(next)
    }

    fn list(&self, limit: usize, offset: usize) -> Result<Vec<BacktestTask>, BacktestError> {
        let records: Vec<Record> = {
            let tasks = self.tasks.read().map_err(|_| poisoned())?;
            tasks.values().cloned().collect()
        };

        let mut snapshots = records
            .iter()
            .map(|r| r.lock().map(|t| t.clone()).map_err(|_| poisoned()))
            .collect::<Result<Vec<_>, _>>()?;
        snapshots.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });

        Ok(snapshots.into_iter().skip(offset).take(limit).collect())
    }

    fn delete(&self, task_id: &str) -> Result<(), BacktestError> {
        let mut tasks = self.tasks.write().map_err(|_| poisoned())?;
        tasks
            .remove(task_id)
            .map(|_| ())
            .ok_or_else(|| BacktestError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }
}
