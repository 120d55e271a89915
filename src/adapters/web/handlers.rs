//! HTTP request handlers for web adapter.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::task::{BacktestTask, TaskHandle, TaskStatus};

use super::{AppState, WebError};

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

pub async fn submit_backtest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BacktestConfig>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskHandle>), WebError> {
    let Json(config) = payload.map_err(|e| WebError::bad_request(e.body_text()))?;
    let handle = state.manager.submit(config)?;
    Ok((StatusCode::ACCEPTED, Json(handle)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Listing row; the full snapshot is served by `get_backtest`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub status: TaskStatus,
    pub symbol: String,
    pub strategy_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BacktestTask> for TaskSummary {
    fn from(task: BacktestTask) -> Self {
        TaskSummary {
            task_id: task.task_id,
            status: task.status,
            symbol: task.config.symbol,
            strategy_type: task.config.strategy_type,
            error_message: task.error_message,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

pub async fn list_backtests(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<TaskSummary>>, WebError> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);
    let tasks = state.manager.list(limit, offset)?;
    Ok(Json(tasks.into_iter().map(TaskSummary::from).collect()))
}

pub async fn get_backtest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BacktestTask>, WebError> {
    Ok(Json(state.manager.get(&id)?))
}

pub async fn get_backtest_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BacktestResult>, WebError> {
    Ok(Json(state.manager.result(&id)?))
}

pub async fn delete_backtest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, WebError> {
    state.manager.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn not_found() -> impl IntoResponse {
    WebError::not_found("no such route")
}
