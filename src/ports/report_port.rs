//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RuletraderError;
use crate::domain::strategy::Strategy;
use std::io::Write;

/// Port for rendering a backtest result.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        strategy: &Strategy,
        out: &mut dyn Write,
    ) -> Result<(), RuletraderError>;
}
