//! Order requests, fills and balances exchanged with the market port.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::OrderSide;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: f64,
    pub price: Option<f64>,
    /// Closes existing exposure rather than opening new exposure.
    pub reduce_only: bool,
}

impl OrderRequest {
    pub fn market(symbol: &str, side: OrderSide, amount: f64) -> Self {
        OrderRequest {
            symbol: symbol.to_string(),
            order_type: OrderType::Market,
            side,
            amount,
            price: None,
            reduce_only: false,
        }
    }

    pub fn closing(mut self) -> Self {
        self.reduce_only = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub cost: f64,
    pub currency: String,
}

/// A filled (or otherwise acknowledged) order as reported by the market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub timestamp: i64,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub price: f64,
    pub amount: f64,
    pub cost: f64,
    pub fee: Fee,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub total: f64,
    pub used: f64,
    pub free: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_request_defaults() {
        let req = OrderRequest::market("BTC/USDT:USDT", OrderSide::Buy, 2.0);
        assert_eq!(req.order_type, OrderType::Market);
        assert_eq!(req.price, None);
        assert!(!req.reduce_only);
        assert!(req.closing().reduce_only);
    }

    #[test]
    fn order_type_display() {
        assert_eq!(OrderType::Market.to_string(), "market");
    }
}
