//! CSV candle file loader.
//!
//! Expected columns: `timestamp,open,high,low,close,volume` with a header row.
//! `timestamp` is epoch milliseconds or an RFC 3339 date-time.

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use chrono::DateTime;
use std::fs;
use std::path::Path;

pub struct CsvAdapter;

impl CsvAdapter {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<Candle>, EngineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| EngineError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::parse(&content)
    }

    /// Parse CSV text into candles sorted by timestamp. Repeated timestamps
    /// keep the first row.
    pub fn parse(content: &str) -> Result<Vec<Candle>, EngineError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| EngineError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            let row = line + 2;

            let timestamp = parse_timestamp(field(&record, 0, "timestamp", row)?, row)?;
            candles.push(Candle {
                timestamp,
                open: number(&record, 1, "open", row)?,
                high: number(&record, 2, "high", row)?,
                low: number(&record, 3, "low", row)?,
                close: number(&record, 4, "close", row)?,
                volume: number(&record, 5, "volume", row)?,
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    row: usize,
) -> Result<&'r str, EngineError> {
    record.get(idx).ok_or_else(|| EngineError::Data {
        reason: format!("row {}: missing {} column", row, name),
    })
}

fn number(record: &csv::StringRecord, idx: usize, name: &str, row: usize) -> Result<f64, EngineError> {
    field(record, idx, name, row)?
        .parse()
        .map_err(|e| EngineError::Data {
            reason: format!("row {}: invalid {} value: {}", row, name, e),
        })
}

fn parse_timestamp(raw: &str, row: usize) -> Result<i64, EngineError> {
    if let Ok(ms) = raw.parse::<i64>() {
        return Ok(ms);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| EngineError::Data {
            reason: format!("row {}: invalid timestamp '{}': {}", row, raw, e),
        })
}
