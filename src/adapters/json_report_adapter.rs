//! JSON report adapter implementing ReportPort.

use std::fs::File;
use std::io::{BufWriter, Write};

use serde::Serialize;

use crate::domain::error::EngineError;
use crate::domain::metrics::BacktestResult;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

#[derive(Serialize)]
struct JsonReport<'a> {
    strategy: &'a str,
    #[serde(flatten)]
    result: &'a BacktestResult,
}

impl JsonReportAdapter {
    pub fn render<W: Write>(
        result: &BacktestResult,
        strategy_name: &str,
        mut out: W,
    ) -> Result<(), EngineError> {
        let report = JsonReport {
            strategy: strategy_name,
            result,
        };
        serde_json::to_writer_pretty(&mut out, &report).map_err(|e| EngineError::Report {
            reason: e.to_string(),
        })?;
        writeln!(out)?;
        Ok(())
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        strategy_name: &str,
        output_path: &str,
    ) -> Result<(), EngineError> {
        let file = File::create(output_path).map_err(|e| EngineError::Report {
            reason: format!("failed to create {}: {}", output_path, e),
        })?;
        let mut writer = BufWriter::new(file);
        Self::render(result, strategy_name, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
