//! Stop-loss / take-profit / trailing-stop evaluation.
//!
//! [`check_stop_conditions`] is the pure decision. The exit it implies is
//! carried out by [`PositionManager::check_stops`], which every strategy calls
//! before looking for a new signal.
//!
//! [`PositionManager::check_stops`]: crate::domain::manager::PositionManager::check_stops

use crate::domain::position::{Position, Side};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fractional distances from the entry price. Zero disables a check.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskParams {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub trailing_stop: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    StopLoss,
    TakeProfit,
    TrailingStop,
}

impl fmt::Display for StopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopKind::StopLoss => write!(f, "Stop loss"),
            StopKind::TakeProfit => write!(f, "Take profit"),
            StopKind::TrailingStop => write!(f, "Trailing stop"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopTrigger {
    pub kind: StopKind,
    pub reason: String,
}

impl StopTrigger {
    fn new(kind: StopKind, fraction: f64) -> Self {
        StopTrigger {
            kind,
            reason: format!("{} triggered ({:.1}%)", kind, fraction * 100.0),
        }
    }
}

/// Decide whether the open position must be closed at `price`.
///
/// Checked in order: stop-loss, take-profit, trailing stop. The first one that
/// fires wins. The trailing stop uses the position's watermark, which the
/// caller is expected to have ratcheted with `price` already.
pub fn check_stop_conditions(
    position: &Position,
    price: f64,
    params: &RiskParams,
) -> Option<StopTrigger> {
    let entry = position.entry_price;

    if params.stop_loss > 0.0 {
        let hit = match position.side {
            Side::Long => price <= entry * (1.0 - params.stop_loss),
            Side::Short => price >= entry * (1.0 + params.stop_loss),
        };
        if hit {
            return Some(StopTrigger::new(StopKind::StopLoss, params.stop_loss));
        }
    }

    if params.take_profit > 0.0 {
        let hit = match position.side {
            Side::Long => price >= entry * (1.0 + params.take_profit),
            Side::Short => price <= entry * (1.0 - params.take_profit),
        };
        if hit {
            return Some(StopTrigger::new(StopKind::TakeProfit, params.take_profit));
        }
    }

    if params.trailing_stop > 0.0 {
        let mark = position.watermark;
        let hit = match position.side {
            Side::Long => price <= mark * (1.0 - params.trailing_stop),
            Side::Short => price >= mark * (1.0 + params.trailing_stop),
        };
        if hit {
            return Some(StopTrigger::new(
                StopKind::TrailingStop,
                params.trailing_stop,
            ));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_at(price: f64) -> Position {
        Position::open(Side::Long, price, 0, 1.0)
    }

    fn short_at(price: f64) -> Position {
        Position::open(Side::Short, price, 0, 1.0)
    }

    fn params(stop_loss: f64, take_profit: f64, trailing_stop: f64) -> RiskParams {
        RiskParams {
            stop_loss,
            take_profit,
            trailing_stop,
        }
    }

    #[test]
    fn stop_loss_long_triggered() {
        let p = params(0.05, 0.0, 0.0);
        let pos = long_at(100.0);
        assert!(check_stop_conditions(&pos, 94.0, &p).is_some());
        assert!(check_stop_conditions(&pos, 94.99, &p).is_some());
        assert!(check_stop_conditions(&pos, 96.0, &p).is_none());
    }

    #[test]
    fn stop_loss_short_triggered() {
        let p = params(0.10, 0.0, 0.0);
        let pos = short_at(100.0);
        let trigger = check_stop_conditions(&pos, 111.0, &p).unwrap();
        assert_eq!(trigger.kind, StopKind::StopLoss);
        assert!(check_stop_conditions(&pos, 109.0, &p).is_none());
    }

    #[test]
    fn take_profit_long_triggered() {
        let p = params(0.0, 0.10, 0.0);
        let pos = long_at(100.0);
        let trigger = check_stop_conditions(&pos, 111.0, &p).unwrap();
        assert_eq!(trigger.kind, StopKind::TakeProfit);
        assert!(check_stop_conditions(&pos, 109.0, &p).is_none());
    }

    #[test]
    fn take_profit_short_triggered() {
        let p = params(0.0, 0.10, 0.0);
        let pos = short_at(100.0);
        assert!(check_stop_conditions(&pos, 89.0, &p).is_some());
        assert!(check_stop_conditions(&pos, 91.0, &p).is_none());
    }

    #[test]
    fn stop_loss_takes_precedence() {
        // Degenerate config where both thresholds sit on the same side.
        let p = params(0.05, 0.0, 0.01);
        let pos = long_at(100.0);
        let trigger = check_stop_conditions(&pos, 90.0, &p).unwrap();
        assert_eq!(trigger.kind, StopKind::StopLoss);
    }

    #[test]
    fn all_disabled() {
        let p = RiskParams::default();
        let pos = long_at(100.0);
        assert!(check_stop_conditions(&pos, 0.0, &p).is_none());
        assert!(check_stop_conditions(&pos, 1_000_000.0, &p).is_none());
    }

    #[test]
    fn trailing_stop_follows_watermark_long() {
        let p = params(0.0, 0.0, 0.05);
        let mut pos = long_at(100.0);
        pos.mark(120.0);
        // 5% below the 120 peak is 114.
        assert!(check_stop_conditions(&pos, 115.0, &p).is_none());
        let trigger = check_stop_conditions(&pos, 113.9, &p).unwrap();
        assert_eq!(trigger.kind, StopKind::TrailingStop);
    }

    #[test]
    fn trailing_stop_follows_watermark_short() {
        let p = params(0.0, 0.0, 0.05);
        let mut pos = short_at(100.0);
        pos.mark(80.0);
        assert!(check_stop_conditions(&pos, 83.0, &p).is_none());
        assert!(check_stop_conditions(&pos, 84.5, &p).is_some());
    }

    #[test]
    fn reason_mentions_percentage() {
        let p = params(0.05, 0.0, 0.0);
        let trigger = check_stop_conditions(&long_at(100.0), 90.0, &p).unwrap();
        assert_eq!(trigger.reason, "Stop loss triggered (5.0%)");
    }
}
