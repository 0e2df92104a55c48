//! Bollinger Bands + RSI mean reversion.
//!
//! Short when the close is above the upper band and RSI is overbought, long
//! when the close is below the lower band and RSI is oversold.

use crate::domain::candle::Candle;
use crate::domain::indicator::bollinger::calculate_bollinger;
use crate::domain::indicator::rsi::RsiState;
use crate::domain::indicator::{IndicatorPoint, IndicatorValue};
use crate::domain::manager::PositionManager;
use crate::domain::position::Side;

use super::{act, observe, StrategyEvaluator, StrategyKind};

pub struct MeanReversion {
    bollinger_period: usize,
    stddev_mult: f64,
    rsi_period: usize,
    overbought: f64,
    oversold: f64,
    /// Wilder averages carried across calls, like the trend EMAs.
    rsi: RsiState,
    view: Option<Candle>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bands {
    upper: f64,
    lower: f64,
}

impl MeanReversion {
    pub fn new(
        bollinger_period: usize,
        stddev_mult: f64,
        rsi_period: usize,
        overbought: f64,
        oversold: f64,
    ) -> Self {
        MeanReversion {
            bollinger_period,
            stddev_mult,
            rsi_period,
            overbought,
            oversold,
            rsi: RsiState::new(rsi_period),
            view: None,
        }
    }

    fn bands(&self, candles: &[Candle]) -> Option<Bands> {
        let tail = &candles[candles.len().saturating_sub(self.bollinger_period)..];
        match calculate_bollinger(tail, self.bollinger_period, self.stddev_mult).last() {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Bollinger { upper, lower, .. },
                ..
            }) => Some(Bands {
                upper: *upper,
                lower: *lower,
            }),
            _ => None,
        }
    }

    fn signal(&self, price: f64, bands: Bands, rsi: f64) -> Option<Side> {
        if price > bands.upper && rsi > self.overbought {
            Some(Side::Short)
        } else if price < bands.lower && rsi < self.oversold {
            Some(Side::Long)
        } else {
            None
        }
    }
}

impl StrategyEvaluator for MeanReversion {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn required_history(&self) -> usize {
        self.bollinger_period.max(self.rsi_period).max(1)
    }

    fn evaluate(&mut self, candles: &[Candle], manager: &mut PositionManager<'_>) {
        let (required, kind) = (self.required_history(), self.kind());
        let Some(latest) = observe(&mut self.view, candles, required, kind, manager) else {
            return;
        };

        let bands = self.bands(candles);
        let rsi = self.rsi.update(candles);

        let signal = match (bands, rsi) {
            (Some(bands), Some(rsi)) => self.signal(latest.close, bands, rsi),
            _ => None,
        };

        act(manager, &latest, signal);
    }

    fn last_candle(&self) -> Option<&Candle> {
        self.view.as_ref()
    }
}
