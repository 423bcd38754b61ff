//! Backtest engine.
//!
//! A strictly sequential fold over bars. The position is an explicit
//! [`PositionState`]: either flat with cash, or long with a size and entry.
//! Signals are consumed at the bar's close; there is no short state.

use crate::domain::error::BacktestError;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::{BarStamp, PriceSeries};
use crate::domain::rule_eval::Signals;
use std::fmt;
use tracing::{debug, info};

pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;
pub const DEFAULT_COMMISSION: f64 = 0.001;
/// One bar is assumed to be one trading day unless configured otherwise.
pub const DEFAULT_BARS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    /// Fraction of traded value charged on entry and exit.
    pub commission: f64,
    /// Periods per year used to annualize the Sharpe ratio.
    pub bars_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_cash: DEFAULT_INITIAL_CASH,
            commission: DEFAULT_COMMISSION,
            bars_per_year: DEFAULT_BARS_PER_YEAR,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(BacktestError::InvalidConfig {
                reason: format!("initial_cash must be positive, got {}", self.initial_cash),
            });
        }
        if !(0.0..1.0).contains(&self.commission) {
            return Err(BacktestError::InvalidConfig {
                reason: format!("commission must be in [0, 1), got {}", self.commission),
            });
        }
        if !(self.bars_per_year.is_finite() && self.bars_per_year > 0.0) {
            return Err(BacktestError::InvalidConfig {
                reason: format!("bars_per_year must be positive, got {}", self.bars_per_year),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Closed,
    /// Force-closed at the last bar's close.
    OpenAtEnd,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Closed => f.write_str("closed"),
            TradeStatus::OpenAtEnd => f.write_str("open_at_end"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_date: BarStamp,
    pub exit_date: BarStamp,
    pub entry_price: f64,
    pub exit_price: f64,
    pub position_size: f64,
    pub profit: f64,
    pub return_pct: f64,
    pub status: TradeStatus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionState {
    Flat {
        cash: f64,
    },
    Long {
        size: f64,
        entry_price: f64,
        entry_stamp: BarStamp,
    },
}

impl PositionState {
    /// Mark-to-market value at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        match self {
            PositionState::Flat { cash } => *cash,
            PositionState::Long { size, .. } => size * price,
        }
    }
}

/// One bar's inputs to the state machine.
#[derive(Debug, Clone, Copy)]
pub struct BarEvent {
    pub stamp: BarStamp,
    pub price: f64,
    pub entry: bool,
    pub exit: bool,
}

/// Advance the state by one bar. Returns the trade closed on this bar, if any.
///
/// Entry is only considered when flat and exit only when long, so a bar with
/// both signals enters from flat and exits from long.
pub fn transition(
    state: PositionState,
    event: &BarEvent,
    commission: f64,
) -> (PositionState, Option<Trade>) {
    match state {
        PositionState::Flat { cash } if event.entry => {
            let size = cash / (event.price * (1.0 + commission));
            debug!(stamp = %event.stamp, price = event.price, size, "opened position");
            let next = PositionState::Long {
                size,
                entry_price: event.price,
                entry_stamp: event.stamp,
            };
            (next, None)
        }
        PositionState::Long {
            size,
            entry_price,
            entry_stamp,
        } if event.exit => {
            let (cash, trade) = close_position(
                size,
                entry_price,
                entry_stamp,
                event,
                commission,
                TradeStatus::Closed,
            );
            debug!(
                stamp = %event.stamp,
                price = event.price,
                profit = trade.profit,
                "closed position"
            );
            (PositionState::Flat { cash }, Some(trade))
        }
        other => (other, None),
    }
}

fn close_position(
    size: f64,
    entry_price: f64,
    entry_stamp: BarStamp,
    event: &BarEvent,
    commission: f64,
    status: TradeStatus,
) -> (f64, Trade) {
    let gross = size * event.price;
    let net = gross - gross * commission;
    let trade = Trade {
        entry_date: entry_stamp,
        exit_date: event.stamp,
        entry_price,
        exit_price: event.price,
        position_size: size,
        profit: net - size * entry_price,
        return_pct: (event.price / entry_price - 1.0) * 100.0,
        status,
    };
    (net, trade)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    /// One value per bar. The last value is realized cash when a position
    /// was force-closed.
    pub equity_curve: Vec<f64>,
    pub metrics: Metrics,
}

pub fn run_backtest(
    series: &PriceSeries,
    signals: &Signals,
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;
    if series.is_empty() {
        return Err(BacktestError::EmptySeries);
    }
    for len in [signals.entry.len(), signals.exit.len()] {
        if len != series.len() {
            return Err(BacktestError::LengthMismatch {
                bars: series.len(),
                signals: len,
            });
        }
    }

    let mut state = PositionState::Flat {
        cash: config.initial_cash,
    };
    let mut trades = Vec::new();
    let mut equity_curve = Vec::with_capacity(series.len());

    for (i, bar) in series.bars.iter().enumerate() {
        let event = BarEvent {
            stamp: bar.stamp,
            price: bar.close,
            entry: signals.entry[i],
            exit: signals.exit[i],
        };
        let (next, closed) = transition(state, &event, config.commission);
        state = next;
        trades.extend(closed);
        equity_curve.push(state.equity(bar.close));
    }

    let final_cash = match state {
        PositionState::Flat { cash } => cash,
        PositionState::Long {
            size,
            entry_price,
            entry_stamp,
        } => {
            let last = &series.bars[series.len() - 1];
            let event = BarEvent {
                stamp: last.stamp,
                price: last.close,
                entry: false,
                exit: true,
            };
            let (cash, trade) = close_position(
                size,
                entry_price,
                entry_stamp,
                &event,
                config.commission,
                TradeStatus::OpenAtEnd,
            );
            debug!(
                stamp = %last.stamp,
                price = last.close,
                profit = trade.profit,
                "force-closed position at end of data"
            );
            trades.push(trade);
            if let Some(final_equity) = equity_curve.last_mut() {
                *final_equity = cash;
            }
            cash
        }
    };

    let metrics = Metrics::compute(
        &trades,
        &equity_curve,
        config.initial_cash,
        final_cash,
        config.bars_per_year,
    );

    info!(
        bars = series.len(),
        trades = trades.len(),
        final_cash,
        total_return = metrics.total_return,
        "backtest complete"
    );

    Ok(BacktestResult {
        trades,
        equity_curve,
        metrics,
    })
}
