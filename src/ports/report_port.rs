//! Report generation port trait.

use crate::domain::error::EngineError;
use crate::domain::metrics::BacktestResult;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        strategy_name: &str,
        output_path: &str,
    ) -> Result<(), EngineError>;
}
