//! INI file configuration adapter.

use crate::domain::error::BacktestError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BacktestError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| BacktestError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, BacktestError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| BacktestError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Raw value parsed as `T`; `None` when absent or unparsable.
    fn parsed<T: FromStr>(&self, section: &str, key: &str) -> Option<T> {
        self.config
            .get(section, key)
            .and_then(|raw| raw.trim().parse().ok())
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.parsed(section, key).unwrap_or(default)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        self.config
            .get_map_ref()
            .get(section)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}
