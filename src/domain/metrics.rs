//! Performance metrics and statistics.
//!
//! Percentages (`total_return`, `max_drawdown`, `win_rate`, trade returns) are
//! expressed in percent, not fractions. `max_drawdown` is zero or negative.

use crate::domain::backtest::Trade;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub num_trades: usize,
    pub win_rate: f64,
    pub gross_profit: f64,
    /// Magnitude of summed losing profits (non-negative).
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub avg_trade_return: f64,
    pub avg_winning_trade: f64,
    /// Mean profit of losing trades (non-positive).
    pub avg_losing_trade: f64,
    pub sharpe_ratio: f64,
    pub final_cash: f64,
    pub initial_cash: f64,
}

impl Metrics {
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[f64],
        initial_cash: f64,
        final_cash: f64,
        bars_per_year: f64,
    ) -> Self {
        let total_return = if initial_cash > 0.0 {
            (final_cash - initial_cash) / initial_cash * 100.0
        } else {
            0.0
        };

        let max_drawdown = compute_drawdown(equity_curve);
        let sharpe_ratio = compute_sharpe(equity_curve, bars_per_year);

        let mut winners = 0usize;
        let mut losers = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut losing_sum = 0.0_f64;
        let mut return_sum = 0.0_f64;

        for trade in trades {
            let profit = trade.profit;
            if profit > 0.0 {
                winners += 1;
                gross_profit += profit;
            } else if profit < 0.0 {
                losers += 1;
                losing_sum += profit;
            }
            return_sum += trade.return_pct;
        }

        let num_trades = trades.len();
        let gross_loss = losing_sum.abs();

        let win_rate = if num_trades > 0 {
            winners as f64 / num_trades as f64 * 100.0
        } else {
            0.0
        };

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_trade_return = if num_trades > 0 {
            return_sum / num_trades as f64
        } else {
            0.0
        };

        let avg_winning_trade = if winners > 0 {
            gross_profit / winners as f64
        } else {
            0.0
        };

        let avg_losing_trade = if losers > 0 {
            losing_sum / losers as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            max_drawdown,
            num_trades,
            win_rate,
            gross_profit,
            gross_loss,
            profit_factor,
            avg_trade_return,
            avg_winning_trade,
            avg_losing_trade,
            sharpe_ratio,
            final_cash,
            initial_cash,
        }
    }
}

/// Deepest decline from the running peak, in percent (`<= 0`).
pub fn compute_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
        } else if peak > 0.0 {
            let dd = (equity / peak - 1.0) * 100.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

/// Mean over population standard deviation of per-bar simple returns,
/// scaled by `sqrt(bars_per_year)`. Zero when undefined.
pub fn compute_sharpe(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0];
            let curr = w[1];
            if prev > 0.0 {
                curr / prev - 1.0
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        mean / stddev * bars_per_year.sqrt()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::TradeStatus;
    use crate::domain::ohlcv::BarStamp;
    use approx::assert_relative_eq;

    fn make_trade(profit: f64, return_pct: f64) -> Trade {
        Trade {
            entry_date: BarStamp::Index(0),
            exit_date: BarStamp::Index(1),
            entry_price: 100.0,
            exit_price: 100.0 + return_pct,
            position_size: 1.0,
            profit,
            return_pct,
            status: TradeStatus::Closed,
        }
    }

    fn compute(trades: &[Trade]) -> Metrics {
        Metrics::compute(trades, &[100_000.0, 100_000.0], 100_000.0, 100_000.0, 252.0)
    }

    #[test]
    fn drawdown_against_running_peak() {
        assert_relative_eq!(compute_drawdown(&[100.0, 120.0, 90.0, 130.0]), -25.0);
    }

    #[test]
    fn drawdown_deepest_trough() {
        let dd = compute_drawdown(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        assert_relative_eq!(dd, (80.0 / 110.0 - 1.0) * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn drawdown_monotonic_is_zero() {
        assert_eq!(compute_drawdown(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(compute_drawdown(&[]), 0.0);
    }

    #[test]
    fn total_return_percent() {
        let m = Metrics::compute(&[], &[100.0, 110.0], 100.0, 110.0, 252.0);
        assert_relative_eq!(m.total_return, 10.0, epsilon = 1e-9);
        let m = Metrics::compute(&[], &[100.0, 90.0], 100.0, 90.0, 252.0);
        assert_relative_eq!(m.total_return, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn no_trades_all_zero() {
        let m = compute(&[]);
        assert_eq!(m.num_trades, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.gross_profit, 0.0);
        assert_eq!(m.gross_loss, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.avg_trade_return, 0.0);
        assert_eq!(m.avg_winning_trade, 0.0);
        assert_eq!(m.avg_losing_trade, 0.0);
    }

    #[test]
    fn trade_stats_wins_and_losses() {
        let trades = vec![
            make_trade(100.0, 1.0),
            make_trade(-50.0, -0.5),
            make_trade(200.0, 2.0),
            make_trade(0.0, 0.0),
        ];
        let m = compute(&trades);

        assert_eq!(m.num_trades, 4);
        assert_relative_eq!(m.win_rate, 50.0);
        assert_relative_eq!(m.gross_profit, 300.0);
        assert_relative_eq!(m.gross_loss, 50.0);
        assert_relative_eq!(m.profit_factor, 6.0, epsilon = 1e-9);
        assert_relative_eq!(m.avg_trade_return, 0.625, epsilon = 1e-9);
    }

    #[test]
    fn avg_winning_and_losing() {
        let trades = vec![
            make_trade(100.0, 1.0),
            make_trade(-60.0, -0.6),
            make_trade(200.0, 2.0),
            make_trade(-40.0, -0.4),
        ];
        let m = compute(&trades);
        assert_relative_eq!(m.avg_winning_trade, 150.0, epsilon = 1e-9);
        assert_relative_eq!(m.avg_losing_trade, -50.0, epsilon = 1e-9);
    }

    #[test]
    fn profit_factor_infinite_without_losses() {
        let m = compute(&[make_trade(10.0, 1.0)]);
        assert!(m.profit_factor.is_infinite());
    }

    #[test]
    fn profit_factor_zero_when_all_breakeven() {
        let m = compute(&[make_trade(0.0, 0.0)]);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.win_rate, 0.0);
    }

    #[test]
    fn sharpe_positive_for_rising_curve() {
        let mut values = vec![100_000.0];
        for i in 1..253 {
            values.push(100_000.0 * (1.0 + 0.001 * (i as f64)));
        }
        assert!(compute_sharpe(&values, 252.0) > 0.0);
    }

    #[test]
    fn sharpe_zero_when_flat_or_short() {
        assert_eq!(compute_sharpe(&[100.0, 100.0, 100.0], 252.0), 0.0);
        assert_eq!(compute_sharpe(&[100.0], 252.0), 0.0);
    }

    #[test]
    fn sharpe_known_value_and_annualization() {
        // returns +10%, -10%: mean 0 -> sharpe 0
        assert_relative_eq!(compute_sharpe(&[100.0, 110.0, 99.0], 252.0), 0.0, epsilon = 1e-12);

        // returns 0.1 and 0.3: mean 0.2, population std 0.1
        let curve = [100.0, 110.0, 143.0];
        assert_relative_eq!(compute_sharpe(&curve, 1.0), 2.0, epsilon = 1e-9);
        assert_relative_eq!(compute_sharpe(&curve, 4.0), 4.0, epsilon = 1e-9);
    }
}
