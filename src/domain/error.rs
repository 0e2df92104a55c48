//! Domain error types.

/// Top-level error type for stratbot.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("market error: {reason}")]
    Market { reason: String },

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid backtest window: start {start} must be before end {end}")]
    InvalidWindow { start: i64, end: i64 },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        EngineError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. }
            | EngineError::InvalidWindow { .. } => 2,
            EngineError::Market { .. } | EngineError::OrderRejected { .. } => 3,
            EngineError::NoData { .. } | EngineError::Data { .. } => 5,
            EngineError::Report { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
