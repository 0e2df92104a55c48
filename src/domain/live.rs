//! Live trading session.
//!
//! A [`LiveSession`] owns a rolling candle history and runs one tick at a
//! time: fetch candles newer than the last one held, append them, trim to
//! `history_limit`, evaluate the strategy. Each tick runs to completion before
//! the next one starts. Stopping only prevents the next tick.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::candle::Candle;
use super::error::EngineError;
use super::event::{EngineEvent, LogLevel};
use super::manager::{PositionManager, TradeSettings};
use super::position::Position;
use super::strategy::StrategyEvaluator;
use crate::ports::event_port::EventPort;
use crate::ports::market_port::MarketPort;

#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub timeframe: String,
    pub leverage: u32,
    pub interval: Duration,
    pub history_limit: usize,
    /// Stop after this many ticks. `None` runs until shutdown.
    pub max_ticks: Option<u64>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            timeframe: "1m".into(),
            leverage: 1,
            interval: Duration::from_secs(5),
            history_limit: 100,
            max_ticks: None,
        }
    }
}

pub struct LiveSession<'a> {
    market: &'a dyn MarketPort,
    events: &'a dyn EventPort,
    manager: PositionManager<'a>,
    strategy: Box<dyn StrategyEvaluator>,
    config: LiveConfig,
    history: Vec<Candle>,
    ticks: u64,
}

impl<'a> LiveSession<'a> {
    pub fn new(
        settings: &TradeSettings,
        config: LiveConfig,
        strategy: Box<dyn StrategyEvaluator>,
        market: &'a dyn MarketPort,
        events: &'a dyn EventPort,
    ) -> Self {
        LiveSession {
            market,
            events,
            manager: PositionManager::live(settings, market, events),
            strategy,
            config,
            history: Vec::new(),
            ticks: 0,
        }
    }

    pub fn history(&self) -> &[Candle] {
        &self.history
    }

    pub fn position(&self) -> Option<&Position> {
        self.manager.position()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Apply leverage on the exchange. Called once before the first tick.
    pub fn start(&mut self) -> Result<(), EngineError> {
        let symbol = self.manager.symbol().to_string();
        let applied = self.market.set_leverage(self.config.leverage, &symbol)?;
        if !applied {
            warn!(leverage = self.config.leverage, %symbol, "exchange did not confirm leverage");
        }
        self.events.publish(EngineEvent::log(
            format!(
                "Started {} on {} ({}, leverage {}x)",
                self.strategy.name(),
                symbol,
                self.config.timeframe,
                self.config.leverage
            ),
            LogLevel::Info,
        ));
        info!(strategy = %self.strategy.name(), %symbol, "live session started");
        Ok(())
    }

    /// One fetch/evaluate cycle. Returns the number of new candles appended.
    ///
    /// A fetch failure is reported and the tick ends without trading.
    pub fn tick(&mut self) -> usize {
        self.ticks += 1;
        let since = self.history.last().map(|c| c.timestamp);
        let fetched = match self.market.fetch_ohlcv(
            self.manager.symbol(),
            &self.config.timeframe,
            since,
            Some(self.config.history_limit),
        ) {
            Ok(candles) => candles,
            Err(e) => {
                warn!(error = %e, "candle fetch failed");
                self.events.publish(EngineEvent::log(
                    format!("Failed to fetch market data: {}", e),
                    LogLevel::Error,
                ));
                return 0;
            }
        };

        let appended = self.append(fetched);
        if appended == 0 {
            debug!(tick = self.ticks, "no new candles");
            return 0;
        }

        self.strategy.evaluate(&self.history, &mut self.manager);
        appended
    }

    fn append(&mut self, fetched: Vec<Candle>) -> usize {
        let mut appended = 0;
        for candle in fetched {
            if self
                .history
                .last()
                .is_some_and(|last| candle.timestamp <= last.timestamp)
            {
                continue;
            }
            self.history.push(candle);
            appended += 1;
        }

        let limit = self.config.history_limit.max(1);
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
        appended
    }

    /// Manually close the open position at market.
    pub fn close_position(&mut self) -> bool {
        if self.manager.position().is_none() {
            self.events
                .publish(EngineEvent::log("No active position to close", LogLevel::Error));
            return false;
        }
        match self.history.last().copied() {
            Some(candle) => self.manager.exit_position(&candle),
            None => false,
        }
    }

    /// Tick on a fixed period until `shutdown` resolves or `max_ticks` is reached.
    ///
    /// A tick that overruns the period delays the next one; ticks never overlap.
    #[cfg(feature = "live")]
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        use tokio::time::{interval, MissedTickBehavior};

        let mut timer = interval(self.config.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            if self.config.max_ticks.is_some_and(|max| self.ticks >= max) {
                info!(ticks = self.ticks, "tick limit reached");
                break;
            }
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(ticks = self.ticks, "shutdown requested");
                    break;
                }
                _ = timer.tick() => {
                    self.tick();
                }
            }
        }

        self.events
            .publish(EngineEvent::log("Stopped live trading", LogLevel::Info));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_candles;
    use crate::domain::order::{Balance, Fee, Order, OrderRequest};
    use crate::domain::position::Side;
    use crate::domain::risk::RiskParams;
    use crate::domain::strategy::{build_strategy, StrategyKind, StrategyParams};
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, VecDeque};

    /// Serves queued fetch responses and fills orders at the newest close seen.
    struct ScriptedMarket {
        pages: RefCell<VecDeque<Result<Vec<Candle>, EngineError>>>,
        last_close: Cell<f64>,
        leverage: Cell<Option<u32>>,
        orders: RefCell<Vec<OrderRequest>>,
        since_seen: RefCell<Vec<Option<i64>>>,
    }

    impl ScriptedMarket {
        fn new(pages: Vec<Result<Vec<Candle>, EngineError>>) -> Self {
            ScriptedMarket {
                pages: RefCell::new(pages.into()),
                last_close: Cell::new(0.0),
                leverage: Cell::new(None),
                orders: RefCell::new(Vec::new()),
                since_seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl MarketPort for ScriptedMarket {
        fn fetch_ohlcv(
            &self,
            _symbol: &str,
            _timeframe: &str,
            since: Option<i64>,
            _limit: Option<usize>,
        ) -> Result<Vec<Candle>, EngineError> {
            self.since_seen.borrow_mut().push(since);
            let page = self.pages.borrow_mut().pop_front().unwrap_or(Ok(Vec::new()))?;
            if let Some(last) = page.last() {
                self.last_close.set(last.close);
            }
            Ok(page)
        }

        fn create_order(&self, request: &OrderRequest) -> Result<Order, EngineError> {
            self.orders.borrow_mut().push(request.clone());
            let price = self.last_close.get();
            Ok(Order {
                id: format!("order-{}", self.orders.borrow().len()),
                timestamp: 0,
                symbol: request.symbol.clone(),
                order_type: request.order_type,
                side: request.side,
                price,
                amount: request.amount,
                cost: price * request.amount,
                fee: Fee {
                    cost: 0.0,
                    currency: "USDT".into(),
                },
                status: "closed".into(),
            })
        }

        fn set_leverage(&self, leverage: u32, _symbol: &str) -> Result<bool, EngineError> {
            self.leverage.set(Some(leverage));
            Ok(true)
        }

        fn fetch_balance(&self) -> Result<HashMap<String, Balance>, EngineError> {
            Ok(HashMap::new())
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<EngineEvent>>,
    }

    impl EventPort for Recorder {
        fn publish(&self, event: EngineEvent) {
            self.events.borrow_mut().push(event);
        }
    }

    impl Recorder {
        fn errors(&self) -> Vec<String> {
            self.events
                .borrow()
                .iter()
                .filter_map(|e| match e {
                    EngineEvent::Log {
                        message,
                        level: LogLevel::Error,
                    } => Some(message.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    fn settings() -> TradeSettings {
        TradeSettings {
            symbol: "BTC/USDT:USDT".into(),
            position_size: 100.0,
            risk: RiskParams::default(),
        }
    }

    fn config(history_limit: usize) -> LiveConfig {
        LiveConfig {
            leverage: 5,
            interval: Duration::from_millis(1),
            history_limit,
            ..LiveConfig::default()
        }
    }

    fn trend() -> Box<dyn StrategyEvaluator> {
        build_strategy(StrategyKind::TrendFollowing, &StrategyParams::default())
    }

    #[test]
    fn start_sets_leverage() {
        let market = ScriptedMarket::new(Vec::new());
        let events = Recorder::default();
        let mut session = LiveSession::new(&settings(), config(100), trend(), &market, &events);
        session.start().unwrap();
        assert_eq!(market.leverage.get(), Some(5));
    }

    #[test]
    fn tick_appends_only_newer_candles_and_asks_since_last() {
        let candles = make_candles(&[1.0, 2.0, 3.0, 4.0]);
        let market = ScriptedMarket::new(vec![
            Ok(candles[..3].to_vec()),
            Ok(candles[2..].to_vec()),
        ]);
        let events = Recorder::default();
        let mut session = LiveSession::new(&settings(), config(100), trend(), &market, &events);

        assert_eq!(session.tick(), 3);
        assert_eq!(session.tick(), 1);
        assert_eq!(session.history(), &candles[..]);
        assert_eq!(
            *market.since_seen.borrow(),
            vec![None, Some(candles[2].timestamp)]
        );
    }

    #[test]
    fn history_is_trimmed_to_limit() {
        let candles = make_candles(&(0..10).map(|i| i as f64).collect::<Vec<_>>());
        let market = ScriptedMarket::new(vec![Ok(candles.clone())]);
        let events = Recorder::default();
        let mut session = LiveSession::new(&settings(), config(4), trend(), &market, &events);
        session.tick();
        assert_eq!(session.history(), &candles[6..]);
    }

    #[test]
    fn fetch_failure_is_logged_and_tick_completes() {
        let market = ScriptedMarket::new(vec![Err(EngineError::Market {
            reason: "timeout".into(),
        })]);
        let events = Recorder::default();
        let mut session = LiveSession::new(&settings(), config(100), trend(), &market, &events);
        assert_eq!(session.tick(), 0);
        assert!(session.history().is_empty());
        assert_eq!(events.errors(), vec!["Failed to fetch market data: market error: timeout".to_string()]);
    }

    #[test]
    fn uptrend_opens_long_through_market() {
        let mut closes = vec![100.0; 30];
        closes.extend([101.0, 102.0]);
        let candles = make_candles(&closes);
        let market = ScriptedMarket::new(vec![
            Ok(candles[..30].to_vec()),
            Ok(candles[30..31].to_vec()),
            Ok(candles[31..].to_vec()),
        ]);
        let events = Recorder::default();
        let mut session = LiveSession::new(&settings(), config(100), trend(), &market, &events);

        session.tick();
        assert!(session.position().is_none());
        session.tick();
        let position = session.position().unwrap();
        assert_eq!(position.side, Side::Long);
        assert!((position.entry_price - 101.0).abs() < f64::EPSILON);
        session.tick();
        assert_eq!(market.orders.borrow().len(), 1);
    }

    #[test]
    fn close_position_when_flat_logs_error() {
        let market = ScriptedMarket::new(Vec::new());
        let events = Recorder::default();
        let mut session = LiveSession::new(&settings(), config(100), trend(), &market, &events);
        assert!(!session.close_position());
        assert_eq!(events.errors(), vec!["No active position to close".to_string()]);
    }

    #[test]
    fn close_position_exits_open_position() {
        let mut closes = vec![100.0; 30];
        closes.push(101.0);
        let candles = make_candles(&closes);
        let market = ScriptedMarket::new(vec![Ok(candles)]);
        let events = Recorder::default();
        let mut session = LiveSession::new(&settings(), config(100), trend(), &market, &events);
        session.tick();
        assert!(session.position().is_some());
        assert!(session.close_position());
        assert!(session.position().is_none());
        assert_eq!(market.orders.borrow().len(), 2);
    }

    #[cfg(feature = "live")]
    #[tokio::test]
    async fn run_stops_after_tick_limit() {
        let market = ScriptedMarket::new(Vec::new());
        let events = Recorder::default();
        let cfg = LiveConfig {
            max_ticks: Some(3),
            ..config(100)
        };
        let mut session = LiveSession::new(&settings(), cfg, trend(), &market, &events);
        session.run(std::future::pending()).await;
        assert_eq!(session.ticks(), 3);
        assert_eq!(market.since_seen.borrow().len(), 3);
    }

    #[cfg(feature = "live")]
    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let market = ScriptedMarket::new(Vec::new());
        let events = Recorder::default();
        let mut session = LiveSession::new(&settings(), config(100), trend(), &market, &events);
        session.run(std::future::ready(())).await;
        assert_eq!(session.ticks(), 0);
    }
}
