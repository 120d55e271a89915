//! CSV file data adapter.
//!
//! One file per symbol and period, `{symbol}_{period}.csv`, with a
//! `date,open,high,low,close,volume` header. Rows are returned in file
//! order; the engine rejects files whose dates are not strictly increasing.

use crate::domain::backtest::BarPeriod;
use crate::domain::bar::Bar;
use crate::domain::error::BacktestError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, period: BarPeriod) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, period))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        period: BarPeriod,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, BacktestError> {
        let path = self.csv_path(symbol, period);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BacktestError::NoData {
                    symbol: symbol.to_string(),
                    start: start_date,
                    end: end_date,
                });
            }
            Err(e) => return Err(BacktestError::Io(e)),
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| BacktestError::MalformedData {
                location: format!("{} row {}", path.display(), line + 1),
                reason: e.to_string(),
            })?;

            if row.date < start_date || row.date > end_date {
                continue;
            }

            bars.push(Bar {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut symbols = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(".csv") else {
                continue;
            };
            for period in [BarPeriod::Daily, BarPeriod::Weekly, BarPeriod::Monthly] {
                if let Some(symbol) = stem.strip_suffix(&format!("_{}", period)) {
                    symbols.push(symbol.to_string());
                }
            }
        }

        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}
