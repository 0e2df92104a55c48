//! Backtest result aggregation.

use serde::Serialize;

use super::ledger::{BacktestState, EquityPoint, Trade};

const MS_PER_MINUTE: f64 = 60_000.0;

/// Per-trade statistics over the closed trades of a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStats {
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Sum of winning profits.
    pub gross_profit: f64,
    /// Sum of losing profits, as a positive amount.
    pub gross_loss: f64,
    /// Mean holding time in minutes.
    pub avg_trade_duration: f64,
}

/// Result payload of a backtest run. Percentages are 0–100.
///
/// `profit_factor` is `+inf` when there are winning trades and no losing
/// ones; JSON output renders it as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_profit: f64,
    pub profit_percentage: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub profit_factor: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub stats: TradeStats,
}

impl BacktestResult {
    pub fn from_state(state: &BacktestState) -> Self {
        let initial_balance = state.initial_balance;
        let final_balance = state.current_balance;
        let total_profit = final_balance - initial_balance;

        let profit_percentage = if initial_balance != 0.0 {
            total_profit / initial_balance * 100.0
        } else {
            0.0
        };

        let stats = compute_stats(state.closed_trades());
        let total_closed = stats.trades_won + stats.trades_lost + stats.trades_breakeven;

        let win_rate = if total_closed > 0 {
            stats.trades_won as f64 / total_closed as f64 * 100.0
        } else {
            0.0
        };

        let profit_factor = if stats.gross_loss > 0.0 {
            stats.gross_profit / stats.gross_loss
        } else if stats.gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        BacktestResult {
            initial_balance,
            final_balance,
            total_profit,
            profit_percentage,
            win_rate,
            max_drawdown: state.max_drawdown_pct,
            profit_factor,
            trades: state.trades.clone(),
            equity_curve: state.equity_curve.clone(),
            stats,
        }
    }

    pub fn total_trades(&self) -> usize {
        self.trades.len()
    }
}

fn compute_stats<'a>(trades: impl Iterator<Item = &'a Trade>) -> TradeStats {
    let mut stats = TradeStats::default();
    let mut total_duration_ms = 0i64;
    let mut count = 0usize;

    for trade in trades {
        let profit = trade.profit;
        if profit > 0.0 {
            stats.trades_won += 1;
            stats.gross_profit += profit;
            if profit > stats.largest_win {
                stats.largest_win = profit;
            }
        } else if profit < 0.0 {
            stats.trades_lost += 1;
            stats.gross_loss += profit.abs();
            if profit.abs() > stats.largest_loss {
                stats.largest_loss = profit.abs();
            }
        } else {
            stats.trades_breakeven += 1;
        }

        if let Some(exit_time) = trade.exit_time {
            total_duration_ms += exit_time - trade.timestamp;
        }
        count += 1;
    }

    if stats.trades_won > 0 {
        stats.avg_win = stats.gross_profit / stats.trades_won as f64;
    }
    if stats.trades_lost > 0 {
        stats.avg_loss = stats.gross_loss / stats.trades_lost as f64;
    }
    if count > 0 {
        stats.avg_trade_duration = total_duration_ms as f64 / MS_PER_MINUTE / count as f64;
    }

    stats
}
