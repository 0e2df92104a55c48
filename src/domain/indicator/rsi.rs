//! RSI (Relative Strength Index) indicator implementation.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n candles are invalid (need n price changes to seed the averages).

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

/// One Wilder smoothing step.
#[inline]
pub fn wilder_step(previous: f64, current: f64, period: usize) -> f64 {
    (previous * (period - 1) as f64 + current) / period as f64
}

/// Wilder averages carried from one candle to the next.
///
/// [`calculate_rsi`] runs the same state over every candle, so feeding a
/// growing history through [`RsiState::update`] yields bit-identical values.
#[derive(Debug, Clone, PartialEq)]
pub struct RsiState {
    period: usize,
    /// Timestamp and close of the newest candle consumed.
    last: Option<(i64, f64)>,
    changes: usize,
    avg_gain: f64,
    avg_loss: f64,
}

impl RsiState {
    pub fn new(period: usize) -> Self {
        RsiState {
            period,
            last: None,
            changes: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Current RSI, once `period` price changes have been seen.
    pub fn value(&self) -> Option<f64> {
        (self.period > 0 && self.changes >= self.period)
            .then(|| rsi_from_averages(self.avg_gain, self.avg_loss))
    }

    /// Consume the next candle and return the RSI at it.
    pub fn push(&mut self, candle: &Candle) -> Option<f64> {
        let (_, previous) = self.last.replace((candle.timestamp, candle.close))?;
        if self.period == 0 {
            return None;
        }

        let change = candle.close - previous;
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        self.changes += 1;

        if self.changes < self.period {
            // still seeding: running sums
            self.avg_gain += gain;
            self.avg_loss += loss;
        } else if self.changes == self.period {
            self.avg_gain = (self.avg_gain + gain) / self.period as f64;
            self.avg_loss = (self.avg_loss + loss) / self.period as f64;
        } else {
            self.avg_gain = wilder_step(self.avg_gain, gain, self.period);
            self.avg_loss = wilder_step(self.avg_loss, loss, self.period);
        }
        self.value()
    }

    /// Consume every candle newer than the last one seen and return the RSI at
    /// the newest candle.
    ///
    /// If the last consumed candle is not in `candles` the state restarts from
    /// the start of `candles`.
    pub fn update(&mut self, candles: &[Candle]) -> Option<f64> {
        let from = match self.last {
            None => 0,
            Some((ts, _)) => match candles.binary_search_by_key(&ts, |c| c.timestamp) {
                Ok(idx) => idx + 1,
                Err(_) => {
                    *self = RsiState::new(self.period);
                    0
                }
            },
        };
        for candle in &candles[from..] {
            self.push(candle);
        }
        self.value()
    }
}

pub fn calculate_rsi(candles: &[Candle], period: usize) -> IndicatorSeries {
    let mut state = RsiState::new(period);
    let values = candles
        .iter()
        .map(|candle| match state.push(candle) {
            Some(rsi) => IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Simple(rsi),
            },
            None => IndicatorPoint::placeholder(candle.timestamp, IndicatorValue::Simple(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}
