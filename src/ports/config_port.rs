//! Configuration access port trait.
//!
//! Keys are looked up by `[section] key`. A missing or blank value reads as
//! `None`; a numeric key holding something that is not a number is an error.

use crate::domain::error::RuletraderError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, RuletraderError>;
}
