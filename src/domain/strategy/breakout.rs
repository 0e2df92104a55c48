//! Confirmed range breakout.
//!
//! The reference range is the highest high and lowest low of the
//! `range_period` candles that precede the confirmation window. A breakout is
//! confirmed when every close in the confirmation window (the newest
//! `confirmation_period` candles, current one included) is strictly beyond
//! that range. A single-candle spike does not qualify.

use crate::domain::candle::Candle;
use crate::domain::indicator::range::{calculate_range, split_range};
use crate::domain::manager::PositionManager;
use crate::domain::position::Side;

use super::{act, observe, StrategyEvaluator, StrategyKind};

pub struct Breakout {
    range_period: usize,
    confirmation_period: usize,
    view: Option<Candle>,
}

impl Breakout {
    pub fn new(range_period: usize, confirmation_period: usize) -> Self {
        Breakout {
            range_period,
            confirmation_period,
            view: None,
        }
    }

    /// (high, low) of the window just before the confirmation candles.
    fn reference_range(&self, candles: &[Candle]) -> Option<(f64, f64)> {
        let end = candles.len().checked_sub(self.confirmation_period)?;
        let start = end.checked_sub(self.range_period)?;
        let series = calculate_range(&candles[start..end], self.range_period);
        if !series.last().is_some_and(|p| p.valid) {
            return None;
        }
        let (highs, lows) = split_range(&series);
        Some((*highs.last()?, *lows.last()?))
    }

    fn signal(&self, candles: &[Candle], high: f64, low: f64) -> Option<Side> {
        let window = &candles[candles.len().saturating_sub(self.confirmation_period)..];
        if window.is_empty() {
            return None;
        }
        if window.iter().all(|c| c.close > high) {
            Some(Side::Long)
        } else if window.iter().all(|c| c.close < low) {
            Some(Side::Short)
        } else {
            None
        }
    }
}

impl StrategyEvaluator for Breakout {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Breakout
    }

    fn required_history(&self) -> usize {
        (self.range_period + self.confirmation_period).max(1)
    }

    fn evaluate(&mut self, candles: &[Candle], manager: &mut PositionManager<'_>) {
        let (required, kind) = (self.required_history(), self.kind());
        let Some(latest) = observe(&mut self.view, candles, required, kind, manager) else {
            return;
        };

        let signal = self
            .reference_range(candles)
            .and_then(|(high, low)| self.signal(candles, high, low));

        act(manager, &latest, signal);
    }

    fn last_candle(&self) -> Option<&Candle> {
        self.view.as_ref()
    }
}
