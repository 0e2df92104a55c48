//! Strategy evaluators: a closed set of variants behind one trait.
//!
//! Every variant runs the same sequence on each call to
//! [`StrategyEvaluator::evaluate`]:
//!
//! 1. remember the newest candle as its current view
//! 2. bail out if the history is shorter than [`StrategyEvaluator::required_history`]
//! 3. compute its indicators
//! 4. let the manager run the stop checks; a fired stop ends the tick
//! 5. reconcile its directional signal with the open position
//!
//! Evaluators never own the position. They only ask the
//! [`PositionManager`] to enter or exit.

pub mod breakout;
pub mod mean_reversion;
pub mod trend_following;

use std::fmt;
use std::str::FromStr;

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::manager::PositionManager;
use crate::domain::position::Side;

pub use breakout::Breakout;
pub use mean_reversion::MeanReversion;
pub use trend_following::TrendFollowing;

pub trait StrategyEvaluator {
    fn kind(&self) -> StrategyKind;

    /// Minimum number of candles before a signal can be computed.
    fn required_history(&self) -> usize;

    fn evaluate(&mut self, candles: &[Candle], manager: &mut PositionManager<'_>);

    /// Newest candle seen by the last call to `evaluate`.
    fn last_candle(&self) -> Option<&Candle>;

    fn name(&self) -> String {
        self.kind().label().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    TrendFollowing,
    MeanReversion,
    Breakout,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::TrendFollowing,
        StrategyKind::MeanReversion,
        StrategyKind::Breakout,
    ];

    /// Human-readable name used in reports.
    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::TrendFollowing => "Trend Following",
            StrategyKind::MeanReversion => "Mean Reversion",
            StrategyKind::Breakout => "Breakout",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::TrendFollowing => write!(f, "trend_following"),
            StrategyKind::MeanReversion => write!(f, "mean_reversion"),
            StrategyKind::Breakout => write!(f, "breakout"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "trend_following" => Ok(StrategyKind::TrendFollowing),
            "mean_reversion" => Ok(StrategyKind::MeanReversion),
            "breakout" => Ok(StrategyKind::Breakout),
            other => Err(EngineError::invalid(
                "strategy",
                "kind",
                format!(
                    "unknown strategy '{}', expected one of trend_following, mean_reversion, breakout",
                    other
                ),
            )),
        }
    }
}

/// Tunable parameters for all variants. Each variant reads only its own.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub bollinger_period: usize,
    pub bollinger_stddev: f64,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub range_period: usize,
    pub confirmation_period: usize,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            fast_period: 12,
            slow_period: 26,
            bollinger_period: 20,
            bollinger_stddev: 2.0,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            range_period: 20,
            confirmation_period: 3,
        }
    }
}

pub fn build_strategy(kind: StrategyKind, params: &StrategyParams) -> Box<dyn StrategyEvaluator> {
    match kind {
        StrategyKind::TrendFollowing => Box::new(TrendFollowing::new(
            params.fast_period,
            params.slow_period,
        )),
        StrategyKind::MeanReversion => Box::new(MeanReversion::new(
            params.bollinger_period,
            params.bollinger_stddev,
            params.rsi_period,
            params.rsi_overbought,
            params.rsi_oversold,
        )),
        StrategyKind::Breakout => Box::new(Breakout::new(
            params.range_period,
            params.confirmation_period,
        )),
    }
}

/// Steps 1 and 2 shared by every variant: record the newest candle and check
/// the history length. Returns the newest candle when evaluation can go on.
pub(crate) fn observe(
    view: &mut Option<Candle>,
    candles: &[Candle],
    required: usize,
    kind: StrategyKind,
    manager: &PositionManager<'_>,
) -> Option<Candle> {
    *view = candles.last().copied();
    let latest = (*view)?;
    if candles.len() < required {
        manager.notice(&format!(
            "Not enough data for {} strategy ({}/{} candles)",
            kind.label(),
            candles.len(),
            required
        ));
        return None;
    }
    Some(latest)
}

/// Steps 4 and 5: stops first, then the directional signal.
pub(crate) fn act(manager: &mut PositionManager<'_>, latest: &Candle, signal: Option<Side>) {
    if manager.check_stops(latest) {
        return;
    }
    if let Some(side) = signal {
        manager.apply_signal(side, latest);
    }
}
