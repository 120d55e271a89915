//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for stockbt.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config value {key}")]
    ConfigMissing { key: String },

    #[error("invalid config value {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("no bars for {symbol} between {start} and {end}")]
    NoData {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("bar {index} dated {date} does not follow {previous}")]
    UnorderedBars {
        index: usize,
        date: NaiveDate,
        previous: NaiveDate,
    },

    #[error("bar {index} dated {date} has invalid prices: {reason}")]
    InvalidBar {
        index: usize,
        date: NaiveDate,
        reason: String,
    },

    #[error("malformed bar data at {location}: {reason}")]
    MalformedData { location: String, reason: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("task {task_id} not found")]
    TaskNotFound { task_id: String },

    #[error("task {task_id} is {status}, result not available")]
    TaskNotCompleted { task_id: String, status: String },

    #[error("task {task_id} failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        BacktestError::ConfigInvalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors rejected synchronously at submission; no task is created for them.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BacktestError::ConfigParse { .. }
                | BacktestError::ConfigMissing { .. }
                | BacktestError::ConfigInvalid { .. }
        )
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) | BacktestError::Serialization(_) => 1,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::ConfigInvalid { .. } => 2,
            BacktestError::Database { .. } | BacktestError::DatabaseQuery { .. } => 3,
            BacktestError::TaskNotFound { .. }
            | BacktestError::TaskNotCompleted { .. }
            | BacktestError::TaskFailed { .. }
            | BacktestError::InvalidTransition { .. } => 4,
            BacktestError::NoData { .. }
            | BacktestError::UnorderedBars { .. }
            | BacktestError::InvalidBar { .. }
            | BacktestError::MalformedData { .. }
            | BacktestError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
