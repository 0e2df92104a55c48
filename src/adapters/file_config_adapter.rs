//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    /// Override a single value, as done for command-line flags.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.config.set(section, key, Some(value.to_string()));
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[market]
symbol = BTC/USDT:USDT
timeframe = 5m

[strategy]
kind = breakout
range_period = 30
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("market", "symbol"),
            Some("BTC/USDT:USDT".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy", "kind"),
            Some("breakout".to_string())
        );
        assert_eq!(adapter.get_int("strategy", "range_period", 20), 30);
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[market]\nsymbol = ETH/USDT\n").unwrap();
        assert_eq!(adapter.get_string("market", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[live]\n").unwrap();
        assert_eq!(adapter.get_int("live", "interval_secs", 5), 5);
    }

    #[test]
    fn get_int_returns_default_for_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[live]\nhistory_limit = abc\n").unwrap();
        assert_eq!(adapter.get_int("live", "history_limit", 100), 100);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter = FileConfigAdapter::from_string("[risk]\nstop_loss = 0.05\n").unwrap();
        assert_eq!(adapter.get_double("risk", "stop_loss", 0.0), 0.05);
    }

    #[test]
    fn get_double_returns_default_for_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[risk]\nstop_loss = tight\n").unwrap();
        assert_eq!(adapter.get_double("risk", "stop_loss", 0.0), 0.0);
    }

    #[test]
    fn set_overrides_value() {
        let mut adapter = FileConfigAdapter::from_string("[market]\nsymbol = ETH/USDT\n").unwrap();
        adapter.set("market", "symbol", "SOL/USDT");
        adapter.set("backtest", "start_date", "2024-01-01");
        assert_eq!(adapter.get_string("market", "symbol"), Some("SOL/USDT".to_string()));
        assert_eq!(
            adapter.get_string("backtest", "start_date"),
            Some("2024-01-01".to_string())
        );
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[market]\ndata_path = /data/btc.csv\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("market", "data_path"),
            Some("/data/btc.csv".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(result.is_err());
    }
}
