//! Technical indicator implementations.
//!
//! Every indicator returns an [`IndicatorSeries`] aligned index-for-index with
//! the input candles. Indices before the first full window carry a zero-valued
//! placeholder with `valid == false`.
//!
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values

pub mod bollinger;
pub mod ema;
pub mod range;
pub mod rsi;

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: i64,
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    pub(crate) fn placeholder(timestamp: i64, value: IndicatorValue) -> Self {
        IndicatorPoint {
            timestamp,
            valid: false,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger { upper: f64, middle: f64, lower: f64 },
    Range { high: f64, low: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Range(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn new(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<&IndicatorPoint> {
        self.values.last()
    }

    /// The most recent value of a single-valued series, if it is valid.
    pub fn last_simple(&self) -> Option<f64> {
        match self.values.last() {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }

    /// Raw scalar values including placeholders, for single-valued series.
    pub fn simple_values(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|p| match p.value {
                IndicatorValue::Simple(v) => v,
                _ => 0.0,
            })
            .collect()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Range(period) => write!(f, "RANGE({})", period),
        }
    }
}
