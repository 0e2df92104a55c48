//! Core domain types and logic.

pub mod candle;
pub mod indicator;
pub mod position;
pub mod risk;
pub mod order;
pub mod event;
pub mod ledger;
pub mod manager;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod live;
pub mod config_validation;
pub mod error;
