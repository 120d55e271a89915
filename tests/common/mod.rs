#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::sync::Mutex;
use stockbt::domain::backtest::{BacktestConfig, BarPeriod};
pub use stockbt::domain::bar::Bar;
use stockbt::domain::error::BacktestError;
use stockbt::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
    pub requests: Mutex<Vec<(String, BarPeriod)>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        period: BarPeriod,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Vec<Bar>, BacktestError> {
        self.requests
            .lock()
            .unwrap()
            .push((symbol.to_string(), period));
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BacktestError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let mut symbols: Vec<_> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// One bar per calendar day from `start`, high/low 1% around the close.
pub fn bars_from_closes(start: &str, closes: &[f64]) -> Vec<Bar> {
    let start = date(start);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            date: start + Duration::days(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 10_000 + i as i64,
        })
        .collect()
}

/// Oscillating closes with a slight upward drift, so moving averages cross
/// several times.
pub fn wave_closes(count: usize, base: f64) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            base + base * 0.1 * (t / 7.0).sin() + t * 0.05
        })
        .collect()
}

pub fn generate_bars(start: &str, count: usize, base: f64) -> Vec<Bar> {
    bars_from_closes(start, &wave_closes(count, base))
}

pub fn rising_bars(start: &str, count: usize, base: f64) -> Vec<Bar> {
    let closes: Vec<f64> = (0..count).map(|i| base + i as f64).collect();
    bars_from_closes(start, &closes)
}

pub fn sample_config(symbol: &str) -> BacktestConfig {
    BacktestConfig::new(symbol, date("2024-01-01"), date("2024-12-31"))
}
