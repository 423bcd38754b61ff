//! Strategy: named rule text and its parsed AST.

use crate::domain::conditions::{ConditionSet, generate_dsl};
use crate::domain::error::{RuletraderError, SyntaxError};
use crate::domain::rule::StrategyAst;
use crate::domain::rule_parser;

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub description: String,
    /// Rule text the AST was parsed from.
    pub rules: String,
    pub ast: StrategyAst,
}

impl Strategy {
    pub fn from_rules(name: &str, description: &str, rules: &str) -> Result<Self, SyntaxError> {
        let ast = rule_parser::parse(rules)?;
        Ok(Strategy {
            name: name.to_string(),
            description: description.to_string(),
            rules: rules.to_string(),
            ast,
        })
    }

    /// Generate rule text from a condition list, then parse it.
    pub fn from_conditions(
        name: &str,
        description: &str,
        conditions: &ConditionSet,
    ) -> Result<Self, RuletraderError> {
        let rules = generate_dsl(conditions)?;
        Ok(Self::from_rules(name, description, &rules)?)
    }
}
