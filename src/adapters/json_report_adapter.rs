//! JSON report adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::error::BacktestError;
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct Report<'a> {
    config: &'a BacktestConfig,
    #[serde(flatten)]
    result: &'a BacktestResult,
}

/// Writes the config and the full result as one pretty-printed document.
#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        config: &BacktestConfig,
        output_path: &str,
    ) -> Result<(), BacktestError> {
        let body = serde_json::to_string_pretty(&Report { config, result })?;
        if let Some(parent) = Path::new(output_path).parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, body)?;
        Ok(())
    }
}
