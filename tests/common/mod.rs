#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use stratbot::domain::backtest::BacktestConfig;
pub use stratbot::domain::candle::Candle;
use stratbot::domain::error::EngineError;
use stratbot::domain::event::{EngineEvent, LogLevel};
use stratbot::domain::order::{Balance, Fee, Order, OrderRequest, OrderType};
use stratbot::domain::risk::RiskParams;
use stratbot::ports::event_port::EventPort;
use stratbot::ports::market_port::MarketPort;

pub const SYMBOL: &str = "BTC/USDT:USDT";
pub const START: i64 = 1_704_067_200_000;
pub const MINUTE: i64 = 60_000;

/// Market double serving a fixed candle list. Orders fill at the newest
/// candle's close unless `fail_orders` is set.
pub struct MockMarketPort {
    pub candles: Vec<Candle>,
    pub fail_orders: Option<String>,
    /// When set, every fetch returns this page regardless of `since`.
    pub fixed_page: Option<Vec<Candle>>,
    pub fetches: Cell<usize>,
    pub orders: RefCell<Vec<OrderRequest>>,
}

impl MockMarketPort {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles,
            fail_orders: None,
            fixed_page: None,
            fetches: Cell::new(0),
            orders: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_orders(mut self, reason: &str) -> Self {
        self.fail_orders = Some(reason.to_string());
        self
    }

    pub fn with_fixed_page(mut self, page: Vec<Candle>) -> Self {
        self.fixed_page = Some(page);
        self
    }
}

impl MarketPort for MockMarketPort {
    fn fetch_ohlcv(
        &self,
        _symbol: &str,
        _timeframe: &str,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, EngineError> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(page) = &self.fixed_page {
            return Ok(page.clone());
        }
        let limit = limit.unwrap_or(usize::MAX);
        Ok(self
            .candles
            .iter()
            .filter(|c| since.is_none_or(|s| c.timestamp >= s))
            .take(limit)
            .copied()
            .collect())
    }

    fn create_order(&self, request: &OrderRequest) -> Result<Order, EngineError> {
        self.orders.borrow_mut().push(request.clone());
        if let Some(reason) = &self.fail_orders {
            return Err(EngineError::OrderRejected {
                reason: reason.clone(),
            });
        }
        let last = self.candles.last().ok_or_else(|| EngineError::Market {
            reason: "no candles".into(),
        })?;
        Ok(Order {
            id: format!("mock-{}", self.orders.borrow().len()),
            timestamp: last.timestamp,
            symbol: request.symbol.clone(),
            order_type: OrderType::Market,
            side: request.side,
            price: last.close,
            amount: request.amount,
            cost: request.amount * last.close,
            fee: Fee {
                cost: 0.0,
                currency: "USDT".into(),
            },
            status: "closed".into(),
        })
    }

    fn set_leverage(&self, _leverage: u32, _symbol: &str) -> Result<bool, EngineError> {
        Ok(true)
    }

    fn fetch_balance(&self) -> Result<HashMap<String, Balance>, EngineError> {
        Ok(HashMap::new())
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    pub events: RefCell<Vec<EngineEvent>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self, level: LogLevel) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Log { message, level: l } if *l == level => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::BacktestProgress { percent } => Some(*percent),
                _ => None,
            })
            .collect()
    }
}

impl EventPort for RecordingEvents {
    fn publish(&self, event: EngineEvent) {
        self.events.borrow_mut().push(event);
    }
}

pub fn make_candle(index: usize, close: f64) -> Candle {
    Candle {
        timestamp: START + index as i64 * MINUTE,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000.0,
    }
}

pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_candle(i, c))
        .collect()
}

/// Backtest window covering every candle in `candles`.
pub fn window_config(candles: &[Candle], page_size: usize, risk: RiskParams) -> BacktestConfig {
    let end = candles.last().map_or(START + MINUTE, |c| c.timestamp + MINUTE);
    BacktestConfig {
        symbol: SYMBOL.to_string(),
        timeframe: "1m".to_string(),
        start_time: START,
        end_time: end,
        page_size,
        initial_balance: 100.0,
        position_size: 100.0,
        risk,
    }
}

/// 30 flat candles followed by a steady climb of `rise` candles.
pub fn uptrend(rise: usize) -> Vec<f64> {
    let mut closes = vec![100.0; 30];
    closes.extend((1..=rise).map(|i| 100.0 + i as f64));
    closes
}

pub fn candles_csv(candles: &[Candle]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for c in candles {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.timestamp, c.open, c.high, c.low, c.close, c.volume
        ));
    }
    out
}
