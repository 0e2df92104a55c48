//! Rolling price range (highest high / lowest low) over a trailing window.
//!
//! Warmup: first (period-1) candles are invalid. Fewer than `period` candles
//! yields an all-placeholder series.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

const PLACEHOLDER: IndicatorValue = IndicatorValue::Range {
    high: 0.0,
    low: 0.0,
};

pub fn calculate_range(candles: &[Candle], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(candles.len());

    for (i, candle) in candles.iter().enumerate() {
        if period == 0 || i + 1 < period {
            values.push(IndicatorPoint::placeholder(candle.timestamp, PLACEHOLDER));
            continue;
        }

        let window = &candles[i + 1 - period..=i];
        let high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);

        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid: true,
            value: IndicatorValue::Range { high, low },
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Range(period),
        values,
    }
}

/// Split a range series into parallel high and low arrays, placeholders included.
pub fn split_range(series: &IndicatorSeries) -> (Vec<f64>, Vec<f64>) {
    series
        .values
        .iter()
        .map(|p| match p.value {
            IndicatorValue::Range { high, low } => (high, low),
            _ => (0.0, 0.0),
        })
        .unzip()
}
