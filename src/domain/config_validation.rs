//! Configuration validation.
//!
//! Validates all config fields before a backtest or live session starts. Each
//! check names the offending section and key.

use chrono::{DateTime, NaiveDate};

use crate::domain::error::EngineError;
use crate::domain::strategy::{build_strategy, StrategyKind, StrategyParams};
use crate::ports::config_port::ConfigPort;

pub fn validate_market_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    require_string(config, "market", "symbol")?;
    require_string(config, "market", "data_path")?;
    validate_timeframe(config)?;
    validate_leverage(config)?;
    validate_quote_balance(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    strategy_kind(config)?;
    validate_position_size(config)?;
    validate_periods(config)?;
    validate_thresholds(config)?;
    validate_risk_config(config)?;
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    for key in ["stop_loss", "take_profit", "trailing_stop"] {
        let value = read_double(config, "risk", key, 0.0)?;
        if !(0.0..1.0).contains(&value) {
            return Err(EngineError::invalid(
                "risk",
                key,
                format!("{} must be a fraction in [0, 1)", key),
            ));
        }
    }
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_dates(config)?;

    let page_size = read_int(config, "backtest", "page_size", 1000)?;
    if page_size < 1 {
        return Err(EngineError::invalid(
            "backtest",
            "page_size",
            "page_size must be at least 1",
        ));
    }

    if config.get_string("backtest", "initial_balance").is_some() {
        let balance = read_double(config, "backtest", "initial_balance", 0.0)?;
        if balance <= 0.0 {
            return Err(EngineError::invalid(
                "backtest",
                "initial_balance",
                "initial_balance must be positive",
            ));
        }
    }
    Ok(())
}

pub fn validate_live_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let interval = read_int(config, "live", "interval_secs", 5)?;
    if interval < 1 {
        return Err(EngineError::invalid(
            "live",
            "interval_secs",
            "interval_secs must be at least 1",
        ));
    }

    let required = match strategy_kind(config) {
        Ok(kind) => build_strategy(kind, &strategy_params(config)?).required_history(),
        Err(_) => 1,
    };
    let limit = read_int(config, "live", "history_limit", 100)?;
    if limit < required as i64 {
        return Err(EngineError::invalid(
            "live",
            "history_limit",
            format!("history_limit must be at least {} for this strategy", required),
        ));
    }
    Ok(())
}

/// Parse `[strategy] kind`.
pub fn strategy_kind(config: &dyn ConfigPort) -> Result<StrategyKind, EngineError> {
    require_string(config, "strategy", "kind")?.parse()
}

/// Read the per-variant parameters, falling back to the defaults.
pub fn strategy_params(config: &dyn ConfigPort) -> Result<StrategyParams, EngineError> {
    let d = StrategyParams::default();
    Ok(StrategyParams {
        fast_period: read_period(config, "fast_period", d.fast_period)?,
        slow_period: read_period(config, "slow_period", d.slow_period)?,
        bollinger_period: read_period(config, "bollinger_period", d.bollinger_period)?,
        bollinger_stddev: read_double(config, "strategy", "bollinger_stddev", d.bollinger_stddev)?,
        rsi_period: read_period(config, "rsi_period", d.rsi_period)?,
        rsi_overbought: read_double(config, "strategy", "rsi_overbought", d.rsi_overbought)?,
        rsi_oversold: read_double(config, "strategy", "rsi_oversold", d.rsi_oversold)?,
        range_period: read_period(config, "range_period", d.range_period)?,
        confirmation_period: read_period(config, "confirmation_period", d.confirmation_period)?,
    })
}

/// Parse a window bound given as `YYYY-MM-DD` (midnight UTC) or RFC 3339.
/// Returns epoch milliseconds.
pub fn parse_time(value: &str, section: &str, field: &str) -> Result<i64, EngineError> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp_millis());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp_millis())
        .map_err(|_| {
            EngineError::invalid(
                section,
                field,
                format!("invalid {} format, expected YYYY-MM-DD or RFC 3339", field),
            )
        })
}

/// Length of a timeframe such as `1m`, `15m`, `4h`, `1d` in milliseconds.
pub fn timeframe_millis(timeframe: &str) -> Option<i64> {
    let timeframe = timeframe.trim();
    let unit = timeframe.chars().last()?;
    let count: i64 = timeframe[..timeframe.len() - unit.len_utf8()].parse().ok()?;
    if count < 1 {
        return None;
    }
    let unit_ms = match unit {
        's' => 1_000,
        'm' => 60_000,
        'h' => 3_600_000,
        'd' => 86_400_000,
        'w' => 604_800_000,
        _ => return None,
    };
    Some(count * unit_ms)
}

pub(crate) fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, EngineError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(EngineError::missing(section, key)),
    }
}

/// Like [`ConfigPort::get_double`], but a present value that does not parse
/// is an error instead of silently becoming the default.
pub(crate) fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, EngineError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| EngineError::invalid(section, key, format!("'{}' is not a number", raw))),
    }
}

pub(crate) fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, EngineError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| EngineError::invalid(section, key, format!("'{}' is not an integer", raw))),
    }
}

fn read_period(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, EngineError> {
    let value = read_int(config, "strategy", key, default as i64)?;
    if value < 1 {
        return Err(EngineError::invalid(
            "strategy",
            key,
            format!("{} must be at least 1", key),
        ));
    }
    Ok(value as usize)
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let timeframe = config
        .get_string("market", "timeframe")
        .unwrap_or_else(|| "1m".to_string());
    if timeframe_millis(&timeframe).is_none() {
        return Err(EngineError::invalid(
            "market",
            "timeframe",
            format!("unrecognised timeframe '{}'", timeframe),
        ));
    }
    Ok(())
}

fn validate_leverage(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = read_int(config, "market", "leverage", 1)?;
    if !(1..=i64::from(u32::MAX)).contains(&value) {
        return Err(EngineError::invalid(
            "market",
            "leverage",
            "leverage must be at least 1",
        ));
    }
    Ok(())
}

fn validate_quote_balance(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = read_double(config, "market", "quote_balance", 10_000.0)?;
    if value <= 0.0 {
        return Err(EngineError::invalid(
            "market",
            "quote_balance",
            "quote_balance must be positive",
        ));
    }
    Ok(())
}

fn validate_position_size(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = read_double(config, "strategy", "position_size", 100.0)?;
    if value <= 0.0 {
        return Err(EngineError::invalid(
            "strategy",
            "position_size",
            "position_size must be positive",
        ));
    }
    Ok(())
}

fn validate_periods(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let params = strategy_params(config)?;
    if params.fast_period >= params.slow_period {
        return Err(EngineError::invalid(
            "strategy",
            "fast_period",
            "fast_period must be shorter than slow_period",
        ));
    }
    Ok(())
}

fn validate_thresholds(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let params = strategy_params(config)?;
    if params.bollinger_stddev <= 0.0 {
        return Err(EngineError::invalid(
            "strategy",
            "bollinger_stddev",
            "bollinger_stddev must be positive",
        ));
    }
    for (key, value) in [
        ("rsi_overbought", params.rsi_overbought),
        ("rsi_oversold", params.rsi_oversold),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(EngineError::invalid(
                "strategy",
                key,
                format!("{} must be between 0 and 100", key),
            ));
        }
    }
    if params.rsi_oversold >= params.rsi_overbought {
        return Err(EngineError::invalid(
            "strategy",
            "rsi_oversold",
            "rsi_oversold must be below rsi_overbought",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let start = parse_time(&require_string(config, "backtest", "start_date")?, "backtest", "start_date")?;
    let end = parse_time(&require_string(config, "backtest", "end_date")?, "backtest", "end_date")?;

    if start >= end {
        return Err(EngineError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}
