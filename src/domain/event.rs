//! Notifications emitted by the engine for the presentation layer.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::order::Order;
use super::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Warning,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Success => write!(f, "success"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    PositionChanged { position: Option<Position> },
    OrderCreated { order: Order },
    Log { message: String, level: LogLevel },
    BacktestProgress { percent: u8 },
}

impl EngineEvent {
    pub fn log(message: impl Into<String>, level: LogLevel) -> Self {
        EngineEvent::Log {
            message: message.into(),
            level,
        }
    }
}
