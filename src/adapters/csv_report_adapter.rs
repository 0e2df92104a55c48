//! CSV report adapter implementing ReportPort.
//!
//! Layout: a metrics block, a blank line, then one row per trade.

use std::fs::File;
use std::io::Write;

use crate::domain::candle::format_timestamp;
use crate::domain::error::EngineError;
use crate::domain::ledger::TradeStatus;
use crate::domain::metrics::BacktestResult;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

fn report_err(e: impl std::fmt::Display) -> EngineError {
    EngineError::Report {
        reason: e.to_string(),
    }
}

fn fmt_ratio(value: f64) -> String {
    if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:.2}", value)
    }
}

impl CsvReportAdapter {
    pub fn render<W: Write>(
        result: &BacktestResult,
        strategy_name: &str,
        out: W,
    ) -> Result<(), EngineError> {
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(out);

        let metrics = [
            ("Strategy", strategy_name.to_string()),
            ("Total Profit", format!("{:.2}", result.total_profit)),
            ("Profit %", format!("{:.2}", result.profit_percentage)),
            ("Total Trades", result.total_trades().to_string()),
            ("Win Rate", format!("{:.2}%", result.win_rate)),
            ("Max Drawdown", format!("{:.2}%", result.max_drawdown)),
            ("Profit Factor", fmt_ratio(result.profit_factor)),
        ];
        for (label, value) in &metrics {
            wtr.write_record([*label, value.as_str()]).map_err(report_err)?;
        }
        wtr.write_record([""]).map_err(report_err)?;

        wtr.write_record([
            "Timestamp",
            "Side",
            "Entry Price",
            "Exit Price",
            "Exit Time",
            "Profit",
            "Profit %",
            "Status",
        ])
        .map_err(report_err)?;

        for trade in &result.trades {
            let profit_pct = if result.initial_balance != 0.0 {
                trade.profit / result.initial_balance * 100.0
            } else {
                0.0
            };
            let status = match trade.status {
                TradeStatus::Open => "open",
                TradeStatus::Closed => "closed",
            };
            wtr.write_record([
                format_timestamp(trade.timestamp),
                trade.side.to_string(),
                format!("{:.2}", trade.entry_price),
                trade.exit_price.map(|p| format!("{:.2}", p)).unwrap_or_default(),
                trade.exit_time.map(format_timestamp).unwrap_or_default(),
                format!("{:.2}", trade.profit),
                format!("{:.2}", profit_pct),
                status.to_string(),
            ])
            .map_err(report_err)?;
        }

        wtr.flush().map_err(report_err)?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        strategy_name: &str,
        output_path: &str,
    ) -> Result<(), EngineError> {
        let file = File::create(output_path)
            .map_err(|e| report_err(format!("failed to create {}: {}", output_path, e)))?;
        Self::render(result, strategy_name, file)
    }
}
