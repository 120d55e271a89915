//! Backtest task record and its status state machine.
//!
//! ```text
//! pending -> running -> completed
//!                   \-> failed
//! ```
//! `pending -> failed` is also allowed so a task whose worker could not be
//! started still reaches a terminal state. Terminal states never change.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::backtest::{BacktestConfig, BacktestResult};
use super::error::BacktestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(BacktestError::DatabaseQuery {
                reason: format!("unknown task status '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTask {
    pub task_id: String,
    pub status: TaskStatus,
    pub config: BacktestConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BacktestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BacktestTask {
    /// A fresh pending task with a random v4 id.
    pub fn new(config: BacktestConfig) -> Self {
        let now = Utc::now();
        BacktestTask {
            task_id: Uuid::new_v4().to_string(),
            status: TaskStatus::Pending,
            config,
            result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: TaskStatus) -> Result<(), BacktestError> {
        if !self.status.can_transition_to(next) {
            return Err(BacktestError::InvalidTransition {
                task_id: self.task_id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self, result: BacktestResult) -> Result<(), BacktestError> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), BacktestError> {
        self.transition(TaskStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }
}

/// `{task_id, status}` as returned on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub task_id: String,
    pub status: TaskStatus,
}

impl From<&BacktestTask> for TaskHandle {
    fn from(task: &BacktestTask) -> Self {
        TaskHandle {
            task_id: task.task_id.clone(),
            status: task.status,
        }
    }
}
