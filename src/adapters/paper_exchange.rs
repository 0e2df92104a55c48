//! In-process simulated exchange over a fixed candle feed.
//!
//! Only candles up to a visibility cursor can be fetched. With
//! [`PaperExchange::stepping`] each `fetch_ohlcv` call reveals one more candle
//! first, which turns a historical file into a live-like feed. Market orders
//! fill immediately at the latest visible close with no fees; the quote
//! balance books realised PnL and `used` tracks the margin of open exposure.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::order::{Balance, Fee, Order, OrderRequest, OrderType};
use crate::domain::position::OrderSide;
use crate::ports::market_port::MarketPort;

pub struct PaperExchange {
    symbol: String,
    quote_currency: String,
    state: Mutex<PaperState>,
}

struct PaperState {
    candles: Vec<Candle>,
    visible: usize,
    stepping: bool,
    orders_filled: u64,
    leverage: u32,
    quote_total: f64,
    /// Signed contracts: positive long, negative short.
    contracts: f64,
    avg_price: f64,
}

impl PaperState {
    fn visible(&self) -> &[Candle] {
        &self.candles[..self.visible]
    }

    fn advance(&mut self) -> bool {
        if self.visible < self.candles.len() {
            self.visible += 1;
            true
        } else {
            false
        }
    }

    /// Apply a signed fill and book any realised PnL.
    fn fill(&mut self, qty: f64, price: f64) {
        let position = self.contracts;
        if position == 0.0 || position.signum() == qty.signum() {
            let total = position.abs() + qty.abs();
            self.avg_price = (self.avg_price * position.abs() + price * qty.abs()) / total;
            self.contracts = position + qty;
            return;
        }

        let closed = qty.abs().min(position.abs());
        self.quote_total += closed * (price - self.avg_price) * position.signum();
        self.contracts = position + qty;
        if self.contracts == 0.0 {
            self.avg_price = 0.0;
        } else if self.contracts.signum() != position.signum() {
            self.avg_price = price;
        }
    }

    fn used(&self) -> f64 {
        self.contracts.abs() * self.avg_price / f64::from(self.leverage.max(1))
    }
}

impl PaperExchange {
    /// Exchange with the whole feed visible.
    pub fn new(symbol: &str, candles: Vec<Candle>, quote_balance: f64) -> Self {
        let visible = candles.len();
        PaperExchange {
            symbol: symbol.to_string(),
            quote_currency: quote_currency(symbol),
            state: Mutex::new(PaperState {
                candles,
                visible,
                stepping: false,
                orders_filled: 0,
                leverage: 1,
                quote_total: quote_balance,
                contracts: 0.0,
                avg_price: 0.0,
            }),
        }
    }

    /// Exchange that starts with `initial_visible` candles and reveals one
    /// more on every fetch.
    pub fn stepping(symbol: &str, candles: Vec<Candle>, quote_balance: f64, initial_visible: usize) -> Self {
        let exchange = Self::new(symbol, candles, quote_balance);
        if let Ok(mut state) = exchange.state.lock() {
            state.visible = initial_visible.min(state.candles.len());
            state.stepping = true;
        }
        exchange
    }

    pub fn quote_currency(&self) -> &str {
        &self.quote_currency
    }

    /// Reveal the next candle. Returns false once the feed is exhausted.
    pub fn advance(&self) -> Result<bool, EngineError> {
        Ok(self.lock()?.advance())
    }

    pub fn visible_len(&self) -> Result<usize, EngineError> {
        Ok(self.lock()?.visible)
    }

    pub fn is_exhausted(&self) -> Result<bool, EngineError> {
        let state = self.lock()?;
        Ok(state.visible >= state.candles.len())
    }

    /// Signed open contracts held on the exchange.
    pub fn open_contracts(&self) -> Result<f64, EngineError> {
        Ok(self.lock()?.contracts)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PaperState>, EngineError> {
        self.state.lock().map_err(|_| EngineError::Market {
            reason: "paper exchange state poisoned".into(),
        })
    }

    fn check_symbol(&self, symbol: &str) -> Result<(), EngineError> {
        if symbol != self.symbol {
            return Err(EngineError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(())
    }
}

/// Settlement currency of a unified symbol: `BTC/USDT:USDT` → `USDT`,
/// `ETH/BTC` → `BTC`.
fn quote_currency(symbol: &str) -> String {
    symbol
        .rsplit_once(':')
        .map(|(_, settle)| settle)
        .or_else(|| symbol.split_once('/').map(|(_, quote)| quote))
        .filter(|s| !s.is_empty())
        .unwrap_or("USDT")
        .to_string()
}

fn reject(reason: impl Into<String>) -> EngineError {
    EngineError::OrderRejected {
        reason: reason.into(),
    }
}

impl MarketPort for PaperExchange {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        _timeframe: &str,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, EngineError> {
        self.check_symbol(symbol)?;
        let mut state = self.lock()?;
        if state.stepping {
            state.advance();
        }

        let visible = state.visible();
        let candles = match since {
            Some(since) => {
                let start = visible.partition_point(|c| c.timestamp < since);
                let end = limit.map_or(visible.len(), |l| (start + l).min(visible.len()));
                &visible[start..end]
            }
            // Without a start point the newest candles are returned.
            None => {
                let take = limit.unwrap_or(visible.len()).min(visible.len());
                &visible[visible.len() - take..]
            }
        };
        Ok(candles.to_vec())
    }

    fn create_order(&self, request: &OrderRequest) -> Result<Order, EngineError> {
        self.check_symbol(&request.symbol)?;
        if !request.amount.is_finite() || request.amount <= 0.0 {
            return Err(reject(format!("invalid amount {}", request.amount)));
        }

        let mut state = self.lock()?;
        let last = *state.visible().last().ok_or_else(|| EngineError::Market {
            reason: "no market price available yet".into(),
        })?;

        if request.order_type == OrderType::Limit {
            let limit = request
                .price
                .ok_or_else(|| reject("limit order without a price"))?;
            let marketable = match request.side {
                OrderSide::Buy => limit >= last.close,
                OrderSide::Sell => limit <= last.close,
            };
            if !marketable {
                return Err(reject(format!(
                    "limit {} not marketable at {}; resting orders are not simulated",
                    limit, last.close
                )));
            }
        }

        let qty = match request.side {
            OrderSide::Buy => request.amount,
            OrderSide::Sell => -request.amount,
        };
        if request.reduce_only
            && (state.contracts == 0.0
                || state.contracts.signum() == qty.signum()
                || qty.abs() > state.contracts.abs())
        {
            return Err(reject("reduce-only order would increase exposure"));
        }

        state.fill(qty, last.close);
        state.orders_filled += 1;
        let order = Order {
            id: format!("order-{}", state.orders_filled),
            timestamp: last.timestamp,
            symbol: request.symbol.clone(),
            order_type: request.order_type,
            side: request.side,
            price: last.close,
            amount: request.amount,
            cost: request.amount * last.close,
            fee: Fee {
                cost: 0.0,
                currency: self.quote_currency.clone(),
            },
            status: "closed".into(),
        };
        debug!(id = %order.id, side = %order.side, price = order.price, amount = order.amount, "paper fill");
        Ok(order)
    }

    fn set_leverage(&self, leverage: u32, symbol: &str) -> Result<bool, EngineError> {
        self.check_symbol(symbol)?;
        if leverage == 0 {
            return Err(EngineError::Market {
                reason: "leverage must be at least 1".into(),
            });
        }
        self.lock()?.leverage = leverage;
        Ok(true)
    }

    fn fetch_balance(&self) -> Result<HashMap<String, Balance>, EngineError> {
        let state = self.lock()?;
        let used = state.used();
        let mut balances = HashMap::new();
        balances.insert(
            self.quote_currency.clone(),
            Balance {
                total: state.quote_total,
                used,
                free: state.quote_total - used,
            },
        );
        Ok(balances)
    }
}
