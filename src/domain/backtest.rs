//! Backtest replay engine.
//!
//! [`load_candles`] pages through the market's history for the window
//! `[start_time, end_time)`. [`replay`] then feeds the strategy every prefix of
//! that history in order, so no evaluation ever sees a candle from its future.
//! A position still open at the end is closed at the final close.

use tracing::{debug, info};

use super::candle::Candle;
use super::error::EngineError;
use super::event::EngineEvent;
use super::ledger::BacktestState;
use super::manager::{PositionManager, TradeSettings};
use super::metrics::BacktestResult;
use super::risk::RiskParams;
use super::strategy::StrategyEvaluator;
use crate::ports::event_port::EventPort;
use crate::ports::market_port::MarketPort;

/// Replay progress is reported once every this many candles.
const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub symbol: String,
    pub timeframe: String,
    /// Inclusive window start, epoch milliseconds.
    pub start_time: i64,
    /// Exclusive window end, epoch milliseconds.
    pub end_time: i64,
    pub page_size: usize,
    pub initial_balance: f64,
    pub position_size: f64,
    pub risk: RiskParams,
}

impl BacktestConfig {
    pub fn trade_settings(&self) -> TradeSettings {
        TradeSettings {
            symbol: self.symbol.clone(),
            position_size: self.position_size,
            risk: self.risk,
        }
    }
}

fn publish_progress(events: &dyn EventPort, percent: u8) {
    events.publish(EngineEvent::BacktestProgress { percent });
}

fn load_percent(cursor: i64, start: i64, end: i64) -> u8 {
    let fraction = (cursor - start) as f64 / (end - start) as f64;
    (fraction * 100.0).floor().clamp(0.0, 100.0) as u8
}

/// Fetch every candle in `[start_time, end_time)`, one page at a time.
///
/// Stops on an empty page, when the cursor reaches `end_time`, or when a page
/// fails to move the cursor forward. Candles that do not extend the sequence
/// strictly forward in time are dropped.
pub fn load_candles(
    market: &dyn MarketPort,
    config: &BacktestConfig,
    events: &dyn EventPort,
) -> Result<Vec<Candle>, EngineError> {
    let (start, end) = (config.start_time, config.end_time);
    if start >= end {
        return Err(EngineError::InvalidWindow { start, end });
    }

    let page_size = config.page_size.max(1);
    let mut candles: Vec<Candle> = Vec::new();
    let mut cursor = start;
    let mut since = start;

    while cursor < end {
        let page = market.fetch_ohlcv(&config.symbol, &config.timeframe, Some(since), Some(page_size))?;
        let Some(page_last) = page.iter().map(|c| c.timestamp).max() else {
            debug!(cursor, "empty page, history exhausted");
            break;
        };

        let before = candles.len();
        for candle in page {
            if candle.timestamp < start || candle.timestamp >= end {
                continue;
            }
            if candles.last().is_some_and(|last| candle.timestamp <= last.timestamp) {
                continue;
            }
            candles.push(candle);
        }
        debug!(since, kept = candles.len() - before, total = candles.len(), "fetched page");

        if page_last < since {
            debug!(page_last, since, "page did not advance, stopping");
            break;
        }

        cursor = page_last;
        since = page_last + 1;
        publish_progress(events, load_percent(cursor.min(end), start, end));
    }

    info!(symbol = %config.symbol, candles = candles.len(), "history loaded");
    Ok(candles)
}

/// Replay `candles` through `strategy` on a fresh ledger and aggregate the result.
pub fn replay(
    candles: &[Candle],
    strategy: &mut dyn StrategyEvaluator,
    config: &BacktestConfig,
    events: &dyn EventPort,
) -> BacktestResult {
    let mut state = BacktestState::new(config.initial_balance);
    let total = candles.len();
    let settings = config.trade_settings();

    {
        let mut manager = PositionManager::backtest(&settings, &mut state, events);

        for i in 0..total {
            if i % PROGRESS_EVERY == 0 {
                publish_progress(events, (i * 100 / total) as u8);
            }
            strategy.evaluate(&candles[..=i], &mut manager);
        }

        if let Some(last) = candles.last() {
            if manager.position().is_some() {
                debug!(price = last.close, "closing open position at end of replay");
                manager.exit_position(last);
            }
        }
    }
    publish_progress(events, 100);

    let result = BacktestResult::from_state(&state);
    info!(
        strategy = %strategy.name(),
        candles = total,
        trades = result.total_trades(),
        profit = result.total_profit,
        "backtest finished"
    );
    result
}

/// Load the configured window from `market` and replay it through `strategy`.
pub fn run_backtest(
    market: &dyn MarketPort,
    strategy: &mut dyn StrategyEvaluator,
    config: &BacktestConfig,
    events: &dyn EventPort,
) -> Result<BacktestResult, EngineError> {
    let candles = load_candles(market, config, events)?;
    Ok(replay(&candles, strategy, config, events))
}
