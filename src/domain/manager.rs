//! Position lifecycle: the single open-position slot and its transitions.
//!
//! States are FLAT, LONG and SHORT. The only transitions are
//! [`PositionManager::enter_position`] (FLAT → LONG/SHORT) and
//! [`PositionManager::exit_position`] (LONG/SHORT → FLAT). Entering while
//! positioned and exiting while flat are no-ops.
//!
//! In live mode orders go to a [`MarketPort`]; a failed submission is logged
//! and leaves the position untouched. In backtest mode nothing is submitted:
//! fills happen at the current candle's close and are booked on a borrowed
//! [`BacktestState`].

use tracing::{debug, error, info, trace, warn};

use super::candle::Candle;
use super::error::EngineError;
use super::event::{EngineEvent, LogLevel};
use super::ledger::BacktestState;
use super::order::{Order, OrderRequest};
use super::position::{Position, Side};
use super::risk::{check_stop_conditions, RiskParams};
use crate::ports::event_port::EventPort;
use crate::ports::market_port::MarketPort;

/// What the manager trades and how much risk it tolerates.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSettings {
    pub symbol: String,
    pub position_size: f64,
    pub risk: RiskParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

pub enum ExecutionMode<'a> {
    Live { market: &'a dyn MarketPort },
    Backtest { state: &'a mut BacktestState },
}

pub struct PositionManager<'a> {
    symbol: String,
    position_size: f64,
    risk: RiskParams,
    position: Option<Position>,
    mode: ExecutionMode<'a>,
    events: &'a dyn EventPort,
}

impl<'a> PositionManager<'a> {
    pub fn live(settings: &TradeSettings, market: &'a dyn MarketPort, events: &'a dyn EventPort) -> Self {
        Self::with_mode(settings, ExecutionMode::Live { market }, events)
    }

    pub fn backtest(
        settings: &TradeSettings,
        state: &'a mut BacktestState,
        events: &'a dyn EventPort,
    ) -> Self {
        Self::with_mode(settings, ExecutionMode::Backtest { state }, events)
    }

    fn with_mode(settings: &TradeSettings, mode: ExecutionMode<'a>, events: &'a dyn EventPort) -> Self {
        PositionManager {
            symbol: settings.symbol.clone(),
            position_size: settings.position_size,
            risk: settings.risk,
            position: None,
            mode,
            events,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn state(&self) -> PositionState {
        match &self.position {
            None => PositionState::Flat,
            Some(p) if p.is_long() => PositionState::Long,
            Some(_) => PositionState::Short,
        }
    }

    pub fn is_backtest(&self) -> bool {
        matches!(self.mode, ExecutionMode::Backtest { .. })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Ledger being written in backtest mode.
    pub fn ledger(&self) -> Option<&BacktestState> {
        match &self.mode {
            ExecutionMode::Backtest { state } => Some(state),
            ExecutionMode::Live { .. } => None,
        }
    }

    pub(crate) fn events(&self) -> &'a dyn EventPort {
        self.events
    }

    /// Info-level notice for the presentation layer; silent during backtests.
    pub fn notice(&self, message: &str) {
        if self.is_backtest() {
            trace!(message, "backtest notice suppressed");
        } else {
            self.events.publish(EngineEvent::log(message, LogLevel::Info));
        }
    }

    fn live_market(&self) -> Option<&'a dyn MarketPort> {
        match self.mode {
            ExecutionMode::Live { market } => Some(market),
            ExecutionMode::Backtest { .. } => None,
        }
    }

    /// FLAT → LONG/SHORT. Returns whether the transition happened.
    pub fn enter_position(&mut self, side: Side, candle: &Candle) -> bool {
        if self.position.is_some() {
            self.notice("Already in a position, cannot enter new one");
            return false;
        }

        match self.live_market() {
            Some(market) => self.enter_live(market, side),
            None => self.enter_simulated(side, candle),
        }
    }

    /// LONG/SHORT → FLAT. Returns whether the transition happened.
    pub fn exit_position(&mut self, candle: &Candle) -> bool {
        if self.position.is_none() {
            self.notice("No position to exit");
            return false;
        }

        match self.live_market() {
            Some(market) => self.exit_live(market),
            None => self.exit_simulated(candle),
        }
    }

    /// Run the risk checks against the current close and exit if one fires.
    ///
    /// Returns `true` when a stop fired, in which case the caller must not look
    /// for a new signal on this tick.
    pub fn check_stops(&mut self, candle: &Candle) -> bool {
        let price = candle.close;
        let trigger = match self.position.as_mut() {
            Some(position) => {
                position.mark(price);
                check_stop_conditions(position, price, &self.risk)
            }
            None => return false,
        };

        let Some(trigger) = trigger else {
            return false;
        };

        debug!(kind = %trigger.kind, price, "stop condition fired");
        self.notice(&trigger.reason);
        self.exit_position(candle);
        true
    }

    /// Reconcile a directional signal with the current position: hold if
    /// already on that side, reverse if on the other side, enter if flat.
    pub fn apply_signal(&mut self, side: Side, candle: &Candle) {
        match self.position.as_ref().map(|p| p.side) {
            Some(current) if current == side => {}
            Some(_) => {
                if self.exit_position(candle) {
                    self.enter_position(side, candle);
                }
            }
            None => {
                self.enter_position(side, candle);
            }
        }
    }

    fn enter_simulated(&mut self, side: Side, candle: &Candle) -> bool {
        let ExecutionMode::Backtest { state } = &mut self.mode else {
            return false;
        };
        if !state.record_entry(candle.timestamp, side, candle.close) {
            warn!("ledger already holds an open trade; entry skipped");
            return false;
        }

        self.position = Some(Position::open(
            side,
            candle.close,
            candle.timestamp,
            self.position_size,
        ));
        debug!(%side, price = candle.close, timestamp = candle.timestamp, "[backtest] entered position");
        true
    }

    fn exit_simulated(&mut self, candle: &Candle) -> bool {
        let Some(position) = self.position.take() else {
            return false;
        };
        let price = candle.close;
        let profit = position.return_fraction(price) * self.position_size;

        if let ExecutionMode::Backtest { state } = &mut self.mode {
            if state.record_exit(price, candle.timestamp, profit).is_none() {
                warn!("no open trade in ledger to close");
            }
        }

        debug!(side = %position.side, price, profit, "[backtest] exited position");
        true
    }

    fn enter_live(&mut self, market: &dyn MarketPort, side: Side) -> bool {
        let request = OrderRequest::market(&self.symbol, side.entry_order(), self.position_size);
        match submit(market, &request) {
            Ok(order) => {
                let position = Position::open(side, order.price, order.timestamp, self.position_size);
                let message = format!("Entered {} position at {}", side, order.price);
                info!(%side, price = order.price, "entered position");

                self.position = Some(position.clone());
                self.events.publish(EngineEvent::PositionChanged {
                    position: Some(position),
                });
                self.events.publish(EngineEvent::OrderCreated { order });
                self.events.publish(EngineEvent::log(message, LogLevel::Success));
                true
            }
            Err(e) => {
                error!(%side, error = %e, "entry order failed");
                self.events.publish(EngineEvent::log(
                    format!("Failed to enter {} position: {}", side, e),
                    LogLevel::Error,
                ));
                false
            }
        }
    }

    fn exit_live(&mut self, market: &dyn MarketPort) -> bool {
        let Some(position) = self.position.clone() else {
            return false;
        };
        let request = OrderRequest::market(
            &self.symbol,
            position.side.exit_order(),
            position.contracts.abs(),
        )
        .closing();

        match submit(market, &request) {
            Ok(order) => {
                let pnl_pct = position.return_fraction(order.price) * 100.0;
                let message = format!("Exited position at {} (PNL: {:.2}%)", order.price, pnl_pct);
                info!(side = %position.side, price = order.price, pnl_pct, "exited position");

                self.position = None;
                self.events.publish(EngineEvent::OrderCreated { order });
                self.events.publish(EngineEvent::log(message, LogLevel::Success));
                self.events
                    .publish(EngineEvent::PositionChanged { position: None });
                true
            }
            Err(e) => {
                error!(error = %e, "exit order failed");
                self.events.publish(EngineEvent::log(
                    format!("Failed to exit position: {}", e),
                    LogLevel::Error,
                ));
                false
            }
        }
    }
}

fn submit(market: &dyn MarketPort, request: &OrderRequest) -> Result<Order, EngineError> {
    let order = market.create_order(request)?;
    if !order.price.is_finite() || order.price <= 0.0 {
        return Err(EngineError::OrderRejected {
            reason: format!("order {} filled at invalid price {}", order.id, order.price),
        });
    }
    Ok(order)
}
