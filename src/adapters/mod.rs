//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod json_report_adapter;
pub mod memory_task_store;
#[cfg(feature = "sqlite")]
pub mod sqlite_task_store;
#[cfg(feature = "web")]
pub mod web;
