//! Port traits (hexagonal boundaries) the domain depends on.

pub mod config_port;
pub mod event_port;
pub mod market_port;
pub mod report_port;
