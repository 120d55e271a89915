//! HTTP error responses for web adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::BacktestError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

pub fn status_from_error(err: &BacktestError) -> StatusCode {
    match err {
        BacktestError::ConfigMissing { .. }
        | BacktestError::ConfigInvalid { .. }
        | BacktestError::ConfigParse { .. } => StatusCode::BAD_REQUEST,
        BacktestError::TaskNotFound { .. } => StatusCode::NOT_FOUND,
        BacktestError::TaskNotCompleted { .. }
        | BacktestError::TaskFailed { .. }
        | BacktestError::InvalidTransition { .. } => StatusCode::CONFLICT,
        BacktestError::NoData { .. }
        | BacktestError::UnorderedBars { .. }
        | BacktestError::InvalidBar { .. }
        | BacktestError::MalformedData { .. }
        | BacktestError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BacktestError::Database { .. }
        | BacktestError::DatabaseQuery { .. }
        | BacktestError::Serialization(_)
        | BacktestError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<BacktestError> for WebError {
    fn from(err: BacktestError) -> Self {
        Self::new(status_from_error(&err), err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, "request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
