//! Bar provider port trait.

use crate::domain::backtest::BarPeriod;
use crate::domain::bar::Bar;
use crate::domain::error::BacktestError;
use chrono::NaiveDate;

/// Supplies an ordered OHLCV series for one symbol.
///
/// Implementations return bars within `[start_date, end_date]` inclusive.
/// Ordering is checked again by the engine, so a provider that returns
/// unordered or duplicated dates makes the run fail rather than mis-trade.
pub trait DataPort: Send + Sync {
    fn fetch_bars(
        &self,
        symbol: &str,
        period: BarPeriod,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, BacktestError>;

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError>;
}
