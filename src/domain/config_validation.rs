//! Configuration validation.
//!
//! Validates all config fields before any data is loaded.

use crate::domain::backtest::{
    BacktestConfig, DEFAULT_BARS_PER_YEAR, DEFAULT_COMMISSION, DEFAULT_INITIAL_CASH,
};
use crate::domain::error::RuletraderError;
use crate::ports::config_port::ConfigPort;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    validate_initial_cash(config)?;
    validate_commission(config)?;
    validate_bars_per_year(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    let rules = non_empty(config.get_string("strategy", "rules_file"));
    let conditions = non_empty(config.get_string("strategy", "conditions_file"));
    if rules.is_some() && conditions.is_some() {
        return Err(invalid(
            "strategy",
            "conditions_file",
            "set only one of rules_file or conditions_file",
        ));
    }
    Ok(())
}

/// Validate the `[backtest]` section and build the engine config from it.
pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, RuletraderError> {
    validate_backtest_config(config)?;
    Ok(BacktestConfig {
        initial_cash: read_number(config, "backtest", "initial_cash", DEFAULT_INITIAL_CASH)?,
        commission: read_number(config, "backtest", "commission", DEFAULT_COMMISSION)?,
        bars_per_year: read_number(config, "backtest", "bars_per_year", DEFAULT_BARS_PER_YEAR)?,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn invalid(section: &str, key: &str, reason: &str) -> RuletraderError {
    RuletraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Read a float, rejecting values present but unparsable or infinite.
fn read_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, RuletraderError> {
    match config.get_double(section, key)? {
        None => Ok(default),
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(invalid(
            section,
            key,
            &format!("{} must be a finite number, got '{}'", key, v),
        )),
    }
}
fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    let value = read_number(config, "backtest", "initial_cash", DEFAULT_INITIAL_CASH)?;
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_cash",
            "initial_cash must be positive",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    let value = read_number(config, "backtest", "commission", DEFAULT_COMMISSION)?;
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "commission",
            "commission must be a fraction in [0, 1)",
        ));
    }
    Ok(())
}

fn validate_bars_per_year(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    let value = read_number(config, "backtest", "bars_per_year", DEFAULT_BARS_PER_YEAR)?;
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "bars_per_year",
            "bars_per_year must be positive",
        ));
    }
    Ok(())
}
