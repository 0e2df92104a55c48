//! Fast/slow EMA trend follower.
//!
//! Long while `close > fast > slow`, short while `close < fast < slow`.
//! Both averages are carried between calls and extended with
//! [`continue_ema`], so each tick costs one EMA step per average.

use crate::domain::candle::Candle;
use crate::domain::indicator::ema::continue_ema;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::manager::PositionManager;
use crate::domain::position::Side;

use super::{act, observe, StrategyEvaluator, StrategyKind};

pub struct TrendFollowing {
    fast_period: usize,
    slow_period: usize,
    fast: IndicatorSeries,
    slow: IndicatorSeries,
    view: Option<Candle>,
}

impl TrendFollowing {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        TrendFollowing {
            fast_period,
            slow_period,
            fast: IndicatorSeries::new(IndicatorType::Ema(fast_period)),
            slow: IndicatorSeries::new(IndicatorType::Ema(slow_period)),
            view: None,
        }
    }

    fn signal(price: f64, fast: f64, slow: f64) -> Option<Side> {
        if price > fast && fast > slow {
            Some(Side::Long)
        } else if price < fast && fast < slow {
            Some(Side::Short)
        } else {
            None
        }
    }
}

impl StrategyEvaluator for TrendFollowing {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TrendFollowing
    }

    fn required_history(&self) -> usize {
        self.fast_period.max(self.slow_period).max(1)
    }

    fn evaluate(&mut self, candles: &[Candle], manager: &mut PositionManager<'_>) {
        let (required, kind) = (self.required_history(), self.kind());
        let Some(latest) = observe(&mut self.view, candles, required, kind, manager) else {
            return;
        };

        continue_ema(&mut self.fast, candles, self.fast_period);
        continue_ema(&mut self.slow, candles, self.slow_period);

        let signal = match (self.fast.last_simple(), self.slow.last_simple()) {
            (Some(fast), Some(slow)) => Self::signal(latest.close, fast, slow),
            _ => None,
        };

        act(manager, &latest, signal);
    }

    fn last_candle(&self) -> Option<&Candle> {
        self.view.as_ref()
    }
}
