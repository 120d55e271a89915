//! Core domain types and logic.

pub mod backtest;
pub mod bar;
pub mod config_validation;
pub mod cost;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod metrics;
pub mod optimizer;
pub mod portfolio;
pub mod position;
pub mod signal;
pub mod strategy;
pub mod task;
