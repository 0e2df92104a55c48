//! Concrete adapter implementations for ports.

pub mod channel_events;
pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod json_report_adapter;
pub mod paper_exchange;
pub mod tracing_events;
