//! Rule evaluation engine.
//!
//! Evaluates an AST over a whole [`PriceSeries`] at once, producing series
//! aligned one-to-one with the input bars.
//!
//! # Evaluation Semantics
//!
//! - Comparisons broadcast scalars against series; any comparison involving
//!   NaN is false except `!=`, which is true
//! - `CROSS_ABOVE`/`CROSS_BELOW`: Require `t >= 1`, false at bar 0
//! - `AND`/`OR`: Elementwise over boolean series only
//! - Indicators are memoized in an [`IndicatorCache`] owned by the caller;
//!   the cache is bound to the series it was filled from and starts over when
//!   handed a different one

use crate::domain::error::EvaluationError;
use crate::domain::indicator::rolling::{rolling_max, rolling_min, shift};
use crate::domain::indicator::{IndicatorKey, IndicatorType};
use crate::domain::ohlcv::PriceSeries;
use crate::domain::rule::{Node, Operator, StrategyAst};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Result of evaluating one node.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesValue {
    Numeric(Vec<f64>),
    Boolean(Vec<bool>),
    Scalar(f64),
}

impl SeriesValue {
    fn kind(&self) -> &'static str {
        match self {
            SeriesValue::Numeric(_) => "numeric series",
            SeriesValue::Boolean(_) => "boolean series",
            SeriesValue::Scalar(_) => "scalar",
        }
    }
}

/// Run-scoped memo of computed indicator series.
///
/// Entries are only valid for the series they were computed from. Handing the
/// cache a series with different bars drops every entry before computing.
#[derive(Debug, Default)]
pub struct IndicatorCache {
    values: HashMap<IndicatorKey, Vec<f64>>,
    bound_to: Option<u64>,
    computations: usize,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indicator series actually computed (cache misses).
    pub fn computations(&self) -> usize {
        self.computations
    }

    fn get_or_compute(
        &mut self,
        key: &IndicatorKey,
        series: &PriceSeries,
    ) -> Result<Vec<f64>, EvaluationError> {
        self.bind(series);
        if let Some(values) = self.values.get(key) {
            debug!(indicator = %key, "indicator cache hit");
            return Ok(values.clone());
        }

        let indicator = IndicatorType::resolve(key)?;
        let values = indicator.calculate(&series.column(key.field));
        self.computations += 1;
        debug!(indicator = %key, kind = %indicator, bars = values.len(), "computed indicator");
        self.values.insert(key.clone(), values.clone());
        Ok(values)
    }

    fn bind(&mut self, series: &PriceSeries) {
        let fingerprint = series_fingerprint(series);
        if self.bound_to == Some(fingerprint) {
            return;
        }
        if !self.values.is_empty() {
            debug!(
                dropped = self.values.len(),
                "price series changed, clearing indicator cache"
            );
            self.values.clear();
        }
        self.bound_to = Some(fingerprint);
    }
}

fn series_fingerprint(series: &PriceSeries) -> u64 {
    let mut hasher = DefaultHasher::new();
    series.len().hash(&mut hasher);
    for bar in &series.bars {
        bar.stamp.hash(&mut hasher);
        for value in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            value.to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Entry and exit signals, one flag per bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    pub entry: Vec<bool>,
    pub exit: Vec<bool>,
}

impl Signals {
    /// Signals with no entries or exits on any bar.
    pub fn none(len: usize) -> Self {
        Self {
            entry: vec![false; len],
            exit: vec![false; len],
        }
    }
}

pub fn evaluate(
    node: &Node,
    series: &PriceSeries,
    cache: &mut IndicatorCache,
) -> Result<SeriesValue, EvaluationError> {
    match node {
        Node::Field(field) => Ok(SeriesValue::Numeric(series.column(*field))),
        Node::Number(v) => Ok(SeriesValue::Scalar(*v)),
        Node::Shift { field, periods } => {
            Ok(SeriesValue::Numeric(shift(&series.column(*field), *periods)))
        }
        Node::RollingMin { field, window } => {
            check_window("min", *window)?;
            Ok(SeriesValue::Numeric(rolling_min(
                &series.column(*field),
                *window,
            )))
        }
        Node::RollingMax { field, window } => {
            check_window("max", *window)?;
            Ok(SeriesValue::Numeric(rolling_max(
                &series.column(*field),
                *window,
            )))
        }
        Node::Indicator(key) => Ok(SeriesValue::Numeric(cache.get_or_compute(key, series)?)),
        Node::BinaryOp { left, op, right } => {
            let lhs = evaluate(left, series, cache)?;
            let rhs = evaluate(right, series, cache)?;
            apply_operator(*op, lhs, rhs, series.len())
        }
    }
}

fn check_window(name: &str, window: usize) -> Result<(), EvaluationError> {
    if window == 0 {
        return Err(EvaluationError::InvalidWindow {
            name: name.to_string(),
            window,
        });
    }
    Ok(())
}

/// Numeric operand: a per-bar series or a constant.
enum Numeric<'a> {
    Series(&'a [f64]),
    Constant(f64),
}

impl Numeric<'_> {
    fn at(&self, index: usize) -> f64 {
        match self {
            Numeric::Series(values) => values.get(index).copied().unwrap_or(f64::NAN),
            Numeric::Constant(v) => *v,
        }
    }
}

fn as_numeric(op: Operator, value: &SeriesValue) -> Result<Numeric<'_>, EvaluationError> {
    match value {
        SeriesValue::Numeric(values) => Ok(Numeric::Series(values)),
        SeriesValue::Scalar(v) => Ok(Numeric::Constant(*v)),
        SeriesValue::Boolean(_) => Err(EvaluationError::UnsupportedOperator {
            op: op.to_string(),
            reason: "cannot compare a boolean series".to_string(),
        }),
    }
}

fn apply_operator(
    op: Operator,
    lhs: SeriesValue,
    rhs: SeriesValue,
    len: usize,
) -> Result<SeriesValue, EvaluationError> {
    if op.is_logical() {
        return match (lhs, rhs) {
            (SeriesValue::Boolean(a), SeriesValue::Boolean(b)) => {
                let combined = a
                    .iter()
                    .zip(b.iter())
                    .map(|(&x, &y)| if op == Operator::And { x && y } else { x || y })
                    .collect();
                Ok(SeriesValue::Boolean(combined))
            }
            (a, b) => Err(EvaluationError::UnsupportedOperator {
                op: op.to_string(),
                reason: format!("expected boolean operands, found {} and {}", a.kind(), b.kind()),
            }),
        };
    }

    let left = as_numeric(op, &lhs)?;
    let right = as_numeric(op, &rhs)?;

    let flags = (0..len)
        .map(|t| {
            let (l, r) = (left.at(t), right.at(t));
            match op {
                Operator::Gt => l > r,
                Operator::Lt => l < r,
                Operator::Ge => l >= r,
                Operator::Le => l <= r,
                Operator::Eq => l == r,
                Operator::Ne => l != r,
                Operator::CrossAbove => {
                    t >= 1 && left.at(t - 1) <= right.at(t - 1) && l > r
                }
                Operator::CrossBelow => {
                    t >= 1 && left.at(t - 1) >= right.at(t - 1) && l < r
                }
                Operator::And | Operator::Or => false,
            }
        })
        .collect();

    Ok(SeriesValue::Boolean(flags))
}

fn combine_section(
    roots: &[Node],
    section: &str,
    joiner: Operator,
    series: &PriceSeries,
    cache: &mut IndicatorCache,
) -> Result<Vec<bool>, EvaluationError> {
    let len = series.len();
    if roots.is_empty() {
        return Ok(vec![false; len]);
    }

    let mut acc = vec![joiner == Operator::And; len];
    for root in roots {
        let SeriesValue::Boolean(flags) = evaluate(root, series, cache)? else {
            return Err(EvaluationError::NotBoolean {
                section: section.to_string(),
            });
        };
        for (a, f) in acc.iter_mut().zip(flags) {
            *a = if joiner == Operator::And { *a && f } else { *a || f };
        }
    }
    Ok(acc)
}

/// Evaluate both forests: entry roots are ANDed, exit roots are ORed, and an
/// empty forest never fires.
pub fn evaluate_signals(
    ast: &StrategyAst,
    series: &PriceSeries,
    cache: &mut IndicatorCache,
) -> Result<Signals, EvaluationError> {
    let entry = combine_section(&ast.entry, "entry", Operator::And, series, cache)?;
    let exit = combine_section(&ast.exit, "exit", Operator::Or, series, cache)?;

    debug!(
        bars = series.len(),
        entries = entry.iter().filter(|&&f| f).count(),
        exits = exit.iter().filter(|&&f| f).count(),
        indicators_computed = cache.computations(),
        "evaluated signals"
    );

    Ok(Signals { entry, exit })
}
