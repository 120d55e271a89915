//! CSV report adapter implementing ReportPort.
//!
//! `output_path` receives the trade ledger; the equity curve goes next to it
//! as `<stem>_equity.csv`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::error::BacktestError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn equity_path(output_path: &Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        output_path.with_file_name(format!("{stem}_equity.csv"))
    }
}

fn csv_err(e: csv::Error) -> BacktestError {
    BacktestError::Io(e.into())
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T], header: &[&str]) -> Result<(), BacktestError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!rows.is_empty())
        .from_path(path)
        .map_err(csv_err)?;
    if rows.is_empty() {
        writer.write_record(header).map_err(csv_err)?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        _config: &BacktestConfig,
        output_path: &str,
    ) -> Result<(), BacktestError> {
        let path = Path::new(output_path);
        write_rows(
            path,
            &result.trades,
            &[
                "date",
                "action",
                "price",
                "quantity",
                "value",
                "commission",
                "stamp_duty",
                "slippage_cost",
                "cash_after",
            ],
        )?;
        write_rows(
            &Self::equity_path(path),
            &result.equity_curve,
            &["date", "portfolio_value"],
        )?;
        Ok(())
    }
}
