//! Technical indicator implementations.
//!
//! Every routine takes a raw column and returns a series of the same length,
//! using `f64::NAN` for bars without enough history:
//! - `IndicatorKey`: indicator identity as written in a rule (serves as cache key)
//! - `IndicatorType`: the resolved, computable indicator
//! - `rolling`: shift and trailing-window min/max used by non-indicator nodes

pub mod ema;
pub mod pct_change;
pub mod rolling;
pub mod rsi;
pub mod sma;

use crate::domain::error::EvaluationError;
use crate::domain::ohlcv::Field;
use std::fmt;

/// `name(field, window)` as referenced by a rule. The name is not checked
/// against the computable set until evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndicatorKey {
    pub name: String,
    pub field: Field,
    pub window: usize,
}

impl IndicatorKey {
    /// Names are normalized to lowercase.
    pub fn new(name: &str, field: Field, window: usize) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            field,
            window,
        }
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.name, self.field, self.window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    PctChange(usize),
}

impl IndicatorType {
    pub fn resolve(key: &IndicatorKey) -> Result<Self, EvaluationError> {
        let indicator = match key.name.as_str() {
            "sma" => IndicatorType::Sma(key.window),
            "ema" => IndicatorType::Ema(key.window),
            "rsi" => IndicatorType::Rsi(key.window),
            "pct_change" => IndicatorType::PctChange(key.window),
            _ => {
                return Err(EvaluationError::UnsupportedIndicator {
                    name: key.name.clone(),
                });
            }
        };
        if key.window == 0 {
            return Err(EvaluationError::InvalidWindow {
                name: key.name.clone(),
                window: key.window,
            });
        }
        Ok(indicator)
    }

    pub fn calculate(self, values: &[f64]) -> Vec<f64> {
        match self {
            IndicatorType::Sma(window) => sma::calculate_sma(values, window),
            IndicatorType::Ema(window) => ema::calculate_ema(values, window),
            IndicatorType::Rsi(window) => rsi::calculate_rsi(values, window),
            IndicatorType::PctChange(window) => pct_change::calculate_pct_change(values, window),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::PctChange(period) => write!(f, "PCT_CHANGE({})", period),
        }
    }
}
