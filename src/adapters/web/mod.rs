//! HTTP surface over the task manager.
//!
//! A JSON API for submitting backtests and polling their status. All state
//! lives in the [`TaskManager`]; handlers only translate requests.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::*;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::task_manager::TaskManager;

pub struct AppState {
    pub manager: Arc<TaskManager>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/backtests",
            post(handlers::submit_backtest).get(handlers::list_backtests),
        )
        .route(
            "/backtests/{id}",
            get(handlers::get_backtest).delete(handlers::delete_backtest),
        )
        .route("/backtests/{id}/result", get(handlers::get_backtest_result))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
