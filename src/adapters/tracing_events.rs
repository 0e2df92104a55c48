//! Event sink that renders engine events through `tracing`.

use tracing::{debug, error, info, warn, Level};

use crate::domain::event::{EngineEvent, LogLevel};
use crate::ports::event_port::EventPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

/// Level an event is rendered at. Success is reported as info.
pub fn severity(event: &EngineEvent) -> Level {
    match event {
        EngineEvent::Log { level, .. } => match level {
            LogLevel::Info | LogLevel::Success => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error => Level::ERROR,
        },
        EngineEvent::PositionChanged { .. } | EngineEvent::OrderCreated { .. } => Level::INFO,
        EngineEvent::BacktestProgress { .. } => Level::DEBUG,
    }
}

impl EventPort for TracingEvents {
    fn publish(&self, event: EngineEvent) {
        let level = severity(&event);
        match event {
            EngineEvent::Log { message, level: kind } => {
                if level == Level::ERROR {
                    error!(target: "stratbot::events", %kind, "{}", message)
                } else if level == Level::WARN {
                    warn!(target: "stratbot::events", %kind, "{}", message)
                } else {
                    info!(target: "stratbot::events", %kind, "{}", message)
                }
            }
            EngineEvent::PositionChanged { position: Some(p) } => info!(
                target: "stratbot::events",
                side = %p.side,
                entry_price = p.entry_price,
                contracts = p.contracts,
                "position opened"
            ),
            EngineEvent::PositionChanged { position: None } => {
                info!(target: "stratbot::events", "position closed")
            }
            EngineEvent::OrderCreated { order } => info!(
                target: "stratbot::events",
                id = %order.id,
                side = %order.side,
                price = order.price,
                amount = order.amount,
                "order filled"
            ),
            EngineEvent::BacktestProgress { percent } => {
                debug!(target: "stratbot::events", percent, "backtest progress")
            }
        }
    }
}
