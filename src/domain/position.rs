//! The single open position and its direction.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Order side that opens a position in this direction.
    pub fn entry_order(self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Order side that closes a position in this direction.
    pub fn exit_order(self) -> OrderSide {
        self.entry_order().opposite()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: i64,
    /// Signed contract size: positive for long, negative for short.
    pub contracts: f64,
    /// Most favourable close seen since entry; drives the trailing stop.
    pub watermark: f64,
}

impl Position {
    pub fn open(side: Side, entry_price: f64, entry_time: i64, size: f64) -> Self {
        Position {
            side,
            entry_price,
            entry_time,
            contracts: side.sign() * size.abs(),
            watermark: entry_price,
        }
    }

    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    /// Fractional return of the position at `price`, sign-adjusted for direction.
    pub fn return_fraction(&self, price: f64) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        (price - self.entry_price) / self.entry_price * self.side.sign()
    }

    /// Ratchet the watermark toward the favourable direction. Never moves back.
    pub fn mark(&mut self, price: f64) {
        match self.side {
            Side::Long if price > self.watermark => self.watermark = price,
            Side::Short if price < self.watermark => self.watermark = price,
            _ => {}
        }
    }
}
