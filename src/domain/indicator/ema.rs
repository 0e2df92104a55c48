//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with the SMA of the first n closes, then
//! EMA[i] = (C[i] - EMA[i-1]) * k + EMA[i-1].
//! Warmup: first (n-1) candles are invalid.
//!
//! [`continue_ema`] extends an existing series by the candles it has not seen
//! yet, so a live evaluator does not recompute the whole history on every tick. Both
//! paths share [`ema_step`], which keeps an incremental chain bit-identical to
//! a full recomputation over the same candles.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn smoothing_factor(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

#[inline]
pub fn ema_step(previous: f64, close: f64, k: f64) -> f64 {
    (close - previous) * k + previous
}

pub fn calculate_ema(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 || candles.is_empty() {
        return IndicatorSeries::new(IndicatorType::Ema(period));
    }

    let mut values = Vec::with_capacity(candles.len());
    let k = smoothing_factor(period);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        if i < period - 1 {
            sum += candle.close;
            values.push(IndicatorPoint::placeholder(
                candle.timestamp,
                IndicatorValue::Simple(0.0),
            ));
        } else if i == period - 1 {
            sum += candle.close;
            ema = sum / period as f64;
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Simple(ema),
            });
        } else {
            ema = ema_step(ema, candle.close, k);
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Simple(ema),
            });
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// Bring `series` up to date with `candles`.
///
/// The series' newest timestamp is located in `candles` and one step is
/// appended for every candle after it, seeded from the series' last value. If
/// it already ends at the newest candle nothing is computed. Anything else
/// (empty series, warmup not finished, timestamp not in the window) falls back
/// to [`calculate_ema`].
///
/// The series is then re-aligned to `candles.len()`: points older than the
/// candle window are dropped from the front, and a shorter series is padded
/// with placeholders.
pub fn continue_ema(series: &mut IndicatorSeries, candles: &[Candle], period: usize) {
    if candles.is_empty() || period == 0 || series.indicator_type != IndicatorType::Ema(period) {
        *series = calculate_ema(candles, period);
        return;
    }

    let last = match series.values.last() {
        Some(IndicatorPoint {
            timestamp,
            valid: true,
            value: IndicatorValue::Simple(v),
        }) => Some((*timestamp, *v)),
        _ => None,
    };
    let resume = last.and_then(|(ts, previous)| {
        candles
            .binary_search_by_key(&ts, |c| c.timestamp)
            .ok()
            .map(|idx| (idx + 1, previous))
    });
    let Some((from, mut ema)) = resume else {
        *series = calculate_ema(candles, period);
        return;
    };

    let k = smoothing_factor(period);
    for candle in &candles[from..] {
        ema = ema_step(ema, candle.close, k);
        series.values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid: true,
            value: IndicatorValue::Simple(ema),
        });
    }

    align_to(series, candles);
}

fn align_to(series: &mut IndicatorSeries, candles: &[Candle]) {
    let n = candles.len();
    let len = series.values.len();
    if len > n {
        series.values.drain(..len - n);
    } else if len < n {
        let padding = candles[..n - len]
            .iter()
            .map(|c| IndicatorPoint::placeholder(c.timestamp, IndicatorValue::Simple(0.0)));
        series.values.splice(0..0, padding);
    }
}
