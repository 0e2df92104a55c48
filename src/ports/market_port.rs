//! Market data and order execution port trait.

use std::collections::HashMap;

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::order::{Balance, Order, OrderRequest};

/// An already-authenticated exchange: candle history plus order execution.
pub trait MarketPort {
    /// Candles for `symbol` with `timestamp >= since` (when given), oldest
    /// first, at most `limit` of them (when given).
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, EngineError>;

    fn create_order(&self, request: &OrderRequest) -> Result<Order, EngineError>;

    fn set_leverage(&self, leverage: u32, symbol: &str) -> Result<bool, EngineError>;

    /// Per-asset balances keyed by currency code.
    fn fetch_balance(&self) -> Result<HashMap<String, Balance>, EngineError>;
}
