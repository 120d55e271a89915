//! Report generation port trait.

use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::error::BacktestError;

/// Port for exporting a completed backtest.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        config: &BacktestConfig,
        output_path: &str,
    ) -> Result<(), BacktestError>;
}
