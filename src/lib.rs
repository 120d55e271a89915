//! stockbt: single-symbol strategy backtester and indicator library.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`task_manager`] runs backtests
//! as pollable background tasks and [`cli`] drives everything from the
//! command line.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
pub mod task_manager;
