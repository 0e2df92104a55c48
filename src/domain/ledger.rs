//! Simulated account state for a backtest: balance, peak, drawdown and the
//! trade ledger.

use serde::{Deserialize, Serialize};

use super::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub timestamp: i64,
    pub side: Side,
    pub entry_price: f64,
    pub profit: f64,
    pub status: TradeStatus,
    pub exit_price: Option<f64>,
    pub exit_time: Option<i64>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestState {
    pub initial_balance: f64,
    pub current_balance: f64,
    pub peak_balance: f64,
    pub max_drawdown_pct: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestState {
    pub fn new(initial_balance: f64) -> Self {
        BacktestState {
            initial_balance,
            current_balance: initial_balance,
            peak_balance: initial_balance,
            max_drawdown_pct: 0.0,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn open_trade(&self) -> Option<&Trade> {
        self.trades.iter().find(|t| t.is_open())
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| !t.is_open())
    }

    /// Append an open ledger entry. Refused while another entry is still open.
    pub fn record_entry(&mut self, timestamp: i64, side: Side, price: f64) -> bool {
        if self.open_trade().is_some() {
            return false;
        }
        self.trades.push(Trade {
            timestamp,
            side,
            entry_price: price,
            profit: 0.0,
            status: TradeStatus::Open,
            exit_price: None,
            exit_time: None,
        });
        true
    }

    /// Close the open ledger entry and book its profit against the balance.
    pub fn record_exit(&mut self, exit_price: f64, exit_time: i64, profit: f64) -> Option<&Trade> {
        let idx = self.trades.iter().position(|t| t.is_open())?;
        {
            let trade = &mut self.trades[idx];
            trade.profit = profit;
            trade.status = TradeStatus::Closed;
            trade.exit_price = Some(exit_price);
            trade.exit_time = Some(exit_time);
        }
        self.apply_profit(profit, exit_time);
        Some(&self.trades[idx])
    }

    fn apply_profit(&mut self, profit: f64, timestamp: i64) {
        self.current_balance += profit;

        if self.current_balance > self.peak_balance {
            self.peak_balance = self.current_balance;
        } else if self.peak_balance > 0.0 {
            let drawdown = (self.peak_balance - self.current_balance) / self.peak_balance * 100.0;
            if drawdown > self.max_drawdown_pct {
                self.max_drawdown_pct = drawdown;
            }
        }

        self.equity_curve.push(EquityPoint {
            timestamp,
            balance: self.current_balance,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_state() {
        let state = BacktestState::new(1000.0);
        assert!((state.current_balance - 1000.0).abs() < f64::EPSILON);
        assert!((state.peak_balance - 1000.0).abs() < f64::EPSILON);
        assert!(state.max_drawdown_pct.abs() < f64::EPSILON);
        assert!(state.trades.is_empty());
        assert!(state.open_trade().is_none());
    }

    #[test]
    fn entry_then_exit_closes_trade() {
        let mut state = BacktestState::new(100.0);
        assert!(state.record_entry(1, Side::Long, 50.0));
        assert_eq!(state.open_trade().unwrap().side, Side::Long);

        let trade = state.record_exit(55.0, 2, 10.0).unwrap().clone();
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.exit_price, Some(55.0));
        assert_eq!(trade.exit_time, Some(2));
        assert!((trade.profit - 10.0).abs() < f64::EPSILON);
        assert!((state.current_balance - 110.0).abs() < f64::EPSILON);
        assert!(state.open_trade().is_none());
    }

    #[test]
    fn second_entry_refused_while_open() {
        let mut state = BacktestState::new(100.0);
        assert!(state.record_entry(1, Side::Long, 50.0));
        assert!(!state.record_entry(2, Side::Short, 51.0));
        assert_eq!(state.trades.len(), 1);
    }

    #[test]
    fn exit_without_open_trade_is_none() {
        let mut state = BacktestState::new(100.0);
        assert!(state.record_exit(10.0, 1, 5.0).is_none());
        assert!((state.current_balance - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn drawdown_from_peak() {
        let mut state = BacktestState::new(100.0);
        for (i, profit) in [10.0, -22.0, 5.0].iter().enumerate() {
            state.record_entry(i as i64, Side::Long, 1.0);
            state.record_exit(1.0, i as i64, *profit);
        }
        assert!((state.peak_balance - 110.0).abs() < 1e-9);
        assert!((state.max_drawdown_pct - 20.0).abs() < 1e-9);
        assert_eq!(state.equity_curve.len(), 3);
        assert!((state.equity_curve[2].balance - 93.0).abs() < 1e-9);
    }

    #[test]
    fn trade_serializes_camel_case() {
        let trade = Trade {
            timestamp: 1,
            side: Side::Short,
            entry_price: 2.0,
            profit: 0.0,
            status: TradeStatus::Open,
            exit_price: None,
            exit_time: None,
        };
        let json = serde_json::to_string(&trade).unwrap();
        assert!(json.contains("\"entryPrice\":2.0"));
        assert!(json.contains("\"side\":\"short\""));
        assert!(json.contains("\"status\":\"open\""));
    }

    proptest! {
        #[test]
        fn ledger_invariants(profits in prop::collection::vec(-50.0f64..50.0, 0..60)) {
            let mut state = BacktestState::new(1000.0);
            let mut last_peak = state.peak_balance;
            let mut last_dd = state.max_drawdown_pct;

            for (i, profit) in profits.iter().enumerate() {
                prop_assert!(state.record_entry(i as i64, Side::Long, 1.0));
                let open = state.trades.iter().filter(|t| t.is_open()).count();
                prop_assert_eq!(open, 1);
                state.record_exit(1.0, i as i64, *profit);
                prop_assert!(state.open_trade().is_none());

                prop_assert!(state.peak_balance >= last_peak);
                prop_assert!(state.max_drawdown_pct >= last_dd);
                last_peak = state.peak_balance;
                last_dd = state.max_drawdown_pct;
            }

            let booked: f64 = state.closed_trades().map(|t| t.profit).sum();
            prop_assert!((state.current_balance - (state.initial_balance + booked)).abs() < 1e-6);
        }
    }
}
