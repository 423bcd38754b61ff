//! Rule AST data structures.
//!
//! This module defines the abstract syntax tree for trading rules:
//! - `Node`: a closed tagged variant over every expression kind
//! - `Operator`: logical, comparison and crossing operators of `BinaryOp`
//! - `StrategyAst`: independent entry and exit forests
//!
//! Only `BinaryOp` has children, so every AST is a finite tree. The `Display`
//! impls render canonical rule text that parses back to the same tree.

use crate::domain::indicator::IndicatorKey;
use crate::domain::ohlcv::Field;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    And,
    Or,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    CrossAbove,
    CrossBelow,
}

impl Operator {
    pub fn is_logical(self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::CrossAbove => "CROSS_ABOVE",
            Operator::CrossBelow => "CROSS_BELOW",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    /// Keyword operators are case-insensitive; symbols must match exactly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => return Ok(Operator::Gt),
            "<" => return Ok(Operator::Lt),
            ">=" => return Ok(Operator::Ge),
            "<=" => return Ok(Operator::Le),
            "==" => return Ok(Operator::Eq),
            "!=" => return Ok(Operator::Ne),
            _ => {}
        }
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(Operator::And),
            "OR" => Ok(Operator::Or),
            "CROSS_ABOVE" => Ok(Operator::CrossAbove),
            "CROSS_BELOW" => Ok(Operator::CrossBelow),
            _ => Err(format!("unknown operator '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Field(Field),
    Number(f64),
    /// Value of `field`, `periods` bars in the past.
    Shift { field: Field, periods: usize },
    RollingMin { field: Field, window: usize },
    RollingMax { field: Field, window: usize },
    Indicator(IndicatorKey),
    BinaryOp {
        left: Box<Node>,
        op: Operator,
        right: Box<Node>,
    },
}

impl Node {
    pub fn binary(left: Node, op: Operator, right: Node) -> Node {
        Node::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn indicator(name: &str, field: Field, window: usize) -> Node {
        Node::Indicator(IndicatorKey::new(name, field, window))
    }

    fn is_logical(&self) -> bool {
        matches!(self, Node::BinaryOp { op, .. } if op.is_logical())
    }

    fn collect_indicators(&self, out: &mut BTreeSet<IndicatorKey>) {
        match self {
            Node::Indicator(key) => {
                out.insert(key.clone());
            }
            Node::BinaryOp { left, right, .. } => {
                left.collect_indicators(out);
                right.collect_indicators(out);
            }
            Node::Field(_)
            | Node::Number(_)
            | Node::Shift { .. }
            | Node::RollingMin { .. }
            | Node::RollingMax { .. } => {}
        }
    }
}

/// Render a literal without a trailing `.0` for integral values.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Field(field) => write!(f, "{}", field),
            Node::Number(v) => f.write_str(&format_number(*v)),
            Node::Shift { field, periods } => write!(f, "{}.shift({})", field, periods),
            Node::RollingMin { field, window } => write!(f, "min({},{})", field, window),
            Node::RollingMax { field, window } => write!(f, "max({},{})", field, window),
            Node::Indicator(key) => write!(f, "{}", key),
            Node::BinaryOp { left, op, right } => {
                if op.is_logical() {
                    write_grouped(f, left)?;
                    write!(f, " {} ", op)?;
                    write_grouped(f, right)
                } else {
                    write!(f, "{} {} {}", left, op, right)
                }
            }
        }
    }
}

fn write_grouped(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
    if node.is_logical() {
        write!(f, "({})", node)
    } else {
        write!(f, "{}", node)
    }
}

/// Parsed strategy: entry roots are ANDed, exit roots are ORed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyAst {
    pub entry: Vec<Node>,
    pub exit: Vec<Node>,
}

impl StrategyAst {
    /// Distinct indicators referenced anywhere in either forest.
    pub fn indicators(&self) -> Vec<IndicatorKey> {
        let mut keys = BTreeSet::new();
        for node in self.entry.iter().chain(self.exit.iter()) {
            node.collect_indicators(&mut keys);
        }
        keys.into_iter().collect()
    }
}

fn write_section(f: &mut fmt::Formatter<'_>, nodes: &[Node], joiner: Operator) -> fmt::Result {
    if nodes.is_empty() {
        return f.write_str("    (FALSE)\n");
    }
    f.write_str("    (")?;
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", joiner)?;
        }
        if nodes.len() > 1 {
            write!(f, "({})", node)?;
        } else {
            write!(f, "{}", node)?;
        }
    }
    f.write_str(")\n")
}

impl fmt::Display for StrategyAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ENTRY:\n")?;
        write_section(f, &self.entry, Operator::And)?;
        f.write_str("\nEXIT:\n")?;
        write_section(f, &self.exit, Operator::Or)
    }
}
