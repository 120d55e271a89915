//! Task persistence port trait.

use crate::domain::error::BacktestError;
use crate::domain::task::BacktestTask;

/// Durable task snapshots keyed by task_id.
///
/// `update` runs the closure while holding exclusive access to that one
/// record, so readers never see a half-applied change. Different task ids
/// must not block each other.
pub trait TaskStore: Send + Sync {
    fn insert(&self, task: &BacktestTask) -> Result<(), BacktestError>;

    fn get(&self, task_id: &str) -> Result<BacktestTask, BacktestError>;

    fn update(
        &self,
        task_id: &str,
        apply: &mut dyn FnMut(&mut BacktestTask) -> Result<(), BacktestError>,
    ) -> Result<BacktestTask, BacktestError>;

    /// Newest first by `created_at`.
    fn list(&self, limit: usize, offset: usize) -> Result<Vec<BacktestTask>, BacktestError>;

    fn delete(&self, task_id: &str) -> Result<(), BacktestError>;
}
