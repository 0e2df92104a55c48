//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) candles are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

const PLACEHOLDER: IndicatorValue = IndicatorValue::Bollinger {
    upper: 0.0,
    middle: 0.0,
    lower: 0.0,
};

pub fn calculate_bollinger(candles: &[Candle], period: usize, stddev_mult: f64) -> IndicatorSeries {
    let mult = stddev_mult.abs();
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100: (mult * 100.0).round() as u32,
    };

    if period == 0 {
        let values = candles
            .iter()
            .map(|c| IndicatorPoint::placeholder(c.timestamp, PLACEHOLDER))
            .collect();
        return IndicatorSeries {
            indicator_type,
            values,
        };
    }

    let mut values = Vec::with_capacity(candles.len());
    let warmup = period - 1;

    for (i, candle) in candles.iter().enumerate() {
        if i < warmup {
            values.push(IndicatorPoint::placeholder(candle.timestamp, PLACEHOLDER));
            continue;
        }

        let window = &candles[i + 1 - period..=i];
        let middle: f64 = window.iter().map(|c| c.close).sum::<f64>() / period as f64;
        let variance: f64 = window
            .iter()
            .map(|c| {
                let diff = c.close - middle;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;
        let stddev = variance.sqrt();

        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid: true,
            value: IndicatorValue::Bollinger {
                upper: middle + mult * stddev,
                middle,
                lower: middle - mult * stddev,
            },
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_candles;
    use proptest::prelude::*;

    fn bands(series: &IndicatorSeries, i: usize) -> (f64, f64, f64) {
        match series.values[i].value {
            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            } => (upper, middle, lower),
            other => panic!("Expected Bollinger value, got {:?}", other),
        }
    }

    #[test]
    fn bollinger_warmup() {
        let series = calculate_bollinger(&make_candles(&[10.0, 20.0, 30.0, 40.0, 50.0]), 3, 2.0);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
        assert!(series.values[4].valid);
        assert_eq!(bands(&series, 0), (0.0, 0.0, 0.0));
    }

    #[test]
    fn bollinger_shorter_than_period() {
        let series = calculate_bollinger(&make_candles(&[10.0, 20.0]), 20, 2.0);
        assert_eq!(series.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn bollinger_constant_values() {
        let series = calculate_bollinger(&make_candles(&[100.0; 5]), 3, 2.0);
        let (upper, middle, lower) = bands(&series, 2);
        assert!((middle - 100.0).abs() < f64::EPSILON);
        assert!((upper - 100.0).abs() < f64::EPSILON);
        assert!((lower - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bollinger_basic_calculation() {
        let series = calculate_bollinger(&make_candles(&[10.0, 20.0, 30.0]), 3, 2.0);
        let (upper, middle, lower) = bands(&series, 2);

        let expected_middle: f64 = 20.0;
        let stddev = (200.0_f64 / 3.0).sqrt();

        assert!((middle - expected_middle).abs() < 1e-10);
        assert!((upper - (expected_middle + 2.0 * stddev)).abs() < 1e-10);
        assert!((lower - (expected_middle - 2.0 * stddev)).abs() < 1e-10);
    }

    #[test]
    fn bollinger_multiplier_variations() {
        let series = calculate_bollinger(&make_candles(&[10.0, 20.0, 30.0]), 3, 1.0);
        let (upper, middle, lower) = bands(&series, 2);
        let stddev = (200.0_f64 / 3.0).sqrt();

        assert!((upper - (middle + stddev)).abs() < 1e-10);
        assert!((lower - (middle - stddev)).abs() < 1e-10);
    }

    #[test]
    fn bollinger_indicator_type() {
        let series = calculate_bollinger(&make_candles(&[10.0, 20.0, 30.0]), 20, 2.0);
        assert_eq!(
            series.indicator_type,
            IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 200
            }
        );
    }

    #[test]
    fn bollinger_tail_window_matches_full_series() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let candles = make_candles(&prices);
        let full = calculate_bollinger(&candles, 20, 2.0);
        let tail = calculate_bollinger(&candles[20..], 20, 2.0);
        assert_eq!(full.last(), tail.last());
    }

    proptest! {
        #[test]
        fn bands_are_ordered(prices in prop::collection::vec(0.01f64..10_000.0, 0..80), period in 1usize..25, mult in 0.0f64..4.0) {
            let series = calculate_bollinger(&make_candles(&prices), period, mult);
            for point in series.values.iter().filter(|p| p.valid) {
                if let IndicatorValue::Bollinger { upper, middle, lower } = point.value {
                    prop_assert!(upper >= middle && middle >= lower);
                }
            }
        }
    }
}
