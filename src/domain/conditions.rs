//! Structured condition lists and rule text generation.
//!
//! A [`ConditionSet`] is the JSON-friendly form of a strategy: per section, a
//! flat list of `left operator right` conditions joined by `AND`/`OR`
//! connectors. It is validated, then rendered to rule text:
//!
//! ```text
//! ENTRY:
//!     (close > sma(close,20) AND volume > 1000000)
//!
//! EXIT:
//!     (FALSE)
//! ```

use crate::domain::error::{RuletraderError, ValidationError};
use crate::domain::ohlcv::Field;
use crate::domain::rule::{Node, Operator, StrategyAst, format_number};
use crate::domain::rule_parser;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Indicator names accepted in conditions. Only some are computable; the
/// rest are rejected when signals are evaluated.
pub const KNOWN_INDICATORS: [&str; 9] = [
    "sma",
    "ema",
    "rsi",
    "macd",
    "bbands",
    "atr",
    "adx",
    "stoch",
    "pct_change",
];

const COMPARISON_OPERATORS: [&str; 8] = [
    ">",
    "<",
    ">=",
    "<=",
    "==",
    "!=",
    "cross_above",
    "cross_below",
];

const MISSING_PART: &str = "Missing left/operator/right";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionOperand {
    Number(f64),
    Text(String),
}

impl fmt::Display for ConditionOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionOperand::Number(v) => f.write_str(&format_number(*v)),
            ConditionOperand::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for ConditionOperand {
    fn from(v: f64) -> Self {
        ConditionOperand::Number(v)
    }
}

impl From<&str> for ConditionOperand {
    fn from(s: &str) -> Self {
        ConditionOperand::Text(s.to_string())
    }
}

/// One `left operator right` comparison. Parts may be absent in loaded JSON;
/// validation reports that instead of the JSON decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<ConditionOperand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<ConditionOperand>,
}

impl Condition {
    pub fn new(
        left: impl Into<ConditionOperand>,
        operator: &str,
        right: impl Into<ConditionOperand>,
    ) -> Self {
        Self {
            left: Some(left.into()),
            operator: Some(operator.to_string()),
            right: Some(right.into()),
        }
    }

    fn parts(&self) -> Result<(&ConditionOperand, &str, &ConditionOperand), String> {
        match (&self.left, &self.operator, &self.right) {
            (Some(left), Some(op), Some(right)) => Ok((left, op.as_str(), right)),
            _ => Err(MISSING_PART.to_string()),
        }
    }

    fn to_rule_text(&self) -> Result<String, String> {
        let (left, op, right) = self.parts()?;
        let op = if is_crossing_keyword(op) {
            op.to_ascii_uppercase()
        } else {
            op.to_string()
        };
        Ok(format!("{} {} {}", left, op, right))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionBlock {
    pub conditions: Vec<Condition>,
    /// Connector between consecutive conditions; missing entries mean `AND`.
    pub operators: Vec<String>,
}

impl ConditionBlock {
    fn connector(&self, index: usize) -> String {
        self.operators
            .get(index)
            .map(|op| op.to_ascii_uppercase())
            .unwrap_or_else(|| "AND".to_string())
    }

    fn validate(&self, name: &str, errors: &mut Vec<String>) {
        if self.operators.len() > self.conditions.len().saturating_sub(1) {
            errors.push(format!("[{}] too many logical operators", name));
        }

        for (i, cond) in self.conditions.iter().enumerate() {
            if let Err(msg) = validate_condition(cond) {
                errors.push(format!("[{} condition #{}] {}", name, i, msg));
            }
        }

        for op in &self.operators {
            if !matches!(op.to_ascii_uppercase().as_str(), "AND" | "OR") {
                errors.push(format!("[{}] invalid logical operator {}", name, op));
            }
        }
    }

    fn to_rule_text(&self) -> Result<String, String> {
        if self.conditions.is_empty() {
            return Ok("    (FALSE)".to_string());
        }
        let mut tokens = Vec::with_capacity(self.conditions.len() * 2);
        for (i, cond) in self.conditions.iter().enumerate() {
            if i > 0 {
                tokens.push(self.connector(i - 1));
            }
            tokens.push(cond.to_rule_text()?);
        }
        Ok(format!("    ({})", tokens.join(" ")))
    }

    fn to_nodes(&self) -> Result<Vec<Node>, RuletraderError> {
        let mut acc: Option<Node> = None;
        for (i, cond) in self.conditions.iter().enumerate() {
            let node = condition_node(cond)?;
            acc = Some(match acc {
                None => node,
                Some(left) => {
                    let joiner = self
                        .connector(i - 1)
                        .parse::<Operator>()
                        .map_err(|reason| ValidationError {
                            errors: vec![reason],
                        })?;
                    Node::binary(left, joiner, node)
                }
            });
        }
        Ok(acc.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionSet {
    pub entry: ConditionBlock,
    pub exit: ConditionBlock,
}

impl ConditionSet {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Build the AST directly, folding connectors left to right.
    pub fn to_ast(&self) -> Result<StrategyAst, RuletraderError> {
        validate(self)?;
        Ok(StrategyAst {
            entry: self.entry.to_nodes()?,
            exit: self.exit.to_nodes()?,
        })
    }
}

fn condition_node(cond: &Condition) -> Result<Node, RuletraderError> {
    let (left, op, right) = cond.parts().map_err(|reason| ValidationError {
        errors: vec![reason],
    })?;
    let op = op.parse::<Operator>().map_err(|reason| ValidationError {
        errors: vec![reason],
    })?;
    Ok(Node::binary(operand_node(left)?, op, operand_node(right)?))
}

fn operand_node(operand: &ConditionOperand) -> Result<Node, RuletraderError> {
    match operand {
        ConditionOperand::Number(v) => Ok(Node::Number(*v)),
        ConditionOperand::Text(s) => Ok(rule_parser::parse_operand(s)?),
    }
}

/// Check every condition and connector, collecting all failures.
pub fn validate(set: &ConditionSet) -> Result<(), ValidationError> {
    let mut errors = Vec::new();
    set.entry.validate("entry", &mut errors);
    set.exit.validate("exit", &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}

/// Validate and render rule text.
pub fn generate_dsl(set: &ConditionSet) -> Result<String, ValidationError> {
    validate(set)?;
    let entry = set.entry.to_rule_text().map_err(|e| ValidationError { errors: vec![e] })?;
    let exit = set.exit.to_rule_text().map_err(|e| ValidationError { errors: vec![e] })?;
    let text = format!("ENTRY:\n{}\n\nEXIT:\n{}\n", entry, exit);
    debug!(
        entry_conditions = set.entry.conditions.len(),
        exit_conditions = set.exit.conditions.len(),
        "generated rule text"
    );
    Ok(text)
}

fn validate_condition(cond: &Condition) -> Result<(), String> {
    let (left, op, right) = cond.parts()?;
    if !is_valid_operand(left) {
        return Err(format!("Invalid left operand: {}", left));
    }
    if !is_valid_operator(op) {
        return Err(format!("Invalid operator: {}", op));
    }
    if !is_valid_operand(right) {
        return Err(format!("Invalid right operand: {}", right));
    }
    Ok(())
}

fn is_crossing_keyword(op: &str) -> bool {
    op.eq_ignore_ascii_case("cross_above") || op.eq_ignore_ascii_case("cross_below")
}

fn is_valid_operator(op: &str) -> bool {
    COMPARISON_OPERATORS.contains(&op) || is_crossing_keyword(op)
}

fn is_valid_operand(operand: &ConditionOperand) -> bool {
    match operand {
        ConditionOperand::Number(v) => v.is_finite(),
        ConditionOperand::Text(s) => {
            s.parse::<Field>().is_ok()
                || is_number(s)
                || is_shift(s)
                || is_min_max(s)
                || is_indicator_call(s)
        }
    }
}

/// Minimal scanner over an operand string.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, prefix: &str) -> bool {
        match self.rest.strip_prefix(prefix) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let end = self
            .rest
            .char_indices()
            .find(|&(_, c)| !pred(c))
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        taken
    }

    fn digits(&mut self) -> bool {
        !self.take_while(|c| c.is_ascii_digit()).is_empty()
    }

    fn field(&mut self) -> bool {
        self.take_while(|c| c.is_ascii_alphanumeric() || c == '_')
            .parse::<Field>()
            .is_ok()
    }

    fn is_done(&self) -> bool {
        self.rest.is_empty()
    }
}

/// Plain decimal literal: optional sign, digits, at most one point.
fn is_number(text: &str) -> bool {
    let mut cur = Cursor::new(text.trim());
    cur.eat("-");
    let int = cur.digits();
    let frac = cur.eat(".") && cur.digits();
    (int || frac) && cur.is_done()
}

/// `field.shift(N)`
fn is_shift(text: &str) -> bool {
    let mut cur = Cursor::new(text);
    if !cur.field() {
        return false;
    }
    cur.skip_whitespace();
    if !cur.eat(".") {
        return false;
    }
    cur.skip_whitespace();
    if !cur.eat("shift(") {
        return false;
    }
    cur.skip_whitespace();
    if !cur.digits() {
        return false;
    }
    cur.skip_whitespace();
    cur.eat(")") && cur.is_done()
}

/// `min(field,N)` or `max(field,N)`, name in any case.
fn is_min_max(text: &str) -> bool {
    let mut cur = Cursor::new(text);
    let name = cur.take_while(|c| c.is_ascii_alphanumeric());
    if !(name.eq_ignore_ascii_case("min") || name.eq_ignore_ascii_case("max")) {
        return false;
    }
    if !cur.eat("(") {
        return false;
    }
    cur.skip_whitespace();
    if !cur.field() {
        return false;
    }
    cur.skip_whitespace();
    if !cur.eat(",") {
        return false;
    }
    cur.skip_whitespace();
    if !cur.digits() {
        return false;
    }
    cur.skip_whitespace();
    cur.eat(")") && cur.is_done()
}

/// `name(arg[, N]*)` with a known indicator name, any case.
fn is_indicator_call(text: &str) -> bool {
    let mut cur = Cursor::new(text);
    let name = cur.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
    if !KNOWN_INDICATORS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(name))
    {
        return false;
    }
    if !cur.eat("(") {
        return false;
    }
    cur.skip_whitespace();
    let arg = cur.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
    if arg.is_empty() || arg.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    loop {
        cur.skip_whitespace();
        if !cur.eat(",") {
            break;
        }
        cur.skip_whitespace();
        if !cur.digits() {
            return false;
        }
    }
    cur.eat(")") && cur.is_done()
}
