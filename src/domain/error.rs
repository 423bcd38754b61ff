//! Domain error types.
//!
//! Each pipeline stage has its own failure type so callers can tell a grammar
//! violation from an evaluation or simulation failure. [`RuletraderError`]
//! wraps them all for the CLI and maps each to a process exit code.

/// A grammar violation in rule text, with line/column information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("syntax error at line {line}, column {column}: {message}")]
pub struct SyntaxError {
    pub message: String,
    /// Byte offset into the input.
    pub position: usize,
    /// 1-based.
    pub line: usize,
    /// 1-based, counted in characters.
    pub column: usize,
    /// The offending source line.
    pub context: String,
}

impl SyntaxError {
    /// Build an error at byte offset `position` of `input`, resolving line,
    /// column and the source line it falls on.
    pub fn at(input: &str, position: usize, message: impl Into<String>) -> Self {
        let position = position.min(input.len());
        let before = &input[..position];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = input[line_start..position].chars().count() + 1;
        let line_end = input[line_start..]
            .find('\n')
            .map(|i| line_start + i)
            .unwrap_or(input.len());

        SyntaxError {
            message: message.into(),
            position,
            line,
            column,
            context: input[line_start..line_end].trim_end_matches('\r').to_string(),
        }
    }

    /// Format the error with a caret pointing at the offending column.
    pub fn display_with_context(&self) -> String {
        let caret = " ".repeat(self.column - 1) + "^";
        format!(
            "{context}\n{caret}\n{err}",
            context = self.context,
            caret = caret,
            err = self
        )
    }
}

/// A structured condition list failed legality checks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("validation failed:\n{}", .errors.join("\n"))]
pub struct ValidationError {
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("unsupported indicator: {name}")]
    UnsupportedIndicator { name: String },

    #[error("unsupported operator '{op}': {reason}")]
    UnsupportedOperator { op: String, reason: String },

    #[error("invalid window {window} for {name}: must be at least 1")]
    InvalidWindow { name: String, window: usize },

    #[error("{section} condition does not produce a boolean series")]
    NotBoolean { section: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BacktestError {
    #[error("price series has {bars} bars but signals have {signals}")]
    LengthMismatch { bars: usize, signals: usize },

    #[error("price series is empty")]
    EmptySeries,

    #[error("invalid backtest config: {reason}")]
    InvalidConfig { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("price data is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("invalid {column} value on row {row}: {reason}")]
    InvalidValue {
        row: usize,
        column: String,
        reason: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Top-level error type for ruletrader.
#[derive(Debug, thiserror::Error)]
pub enum RuletraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Backtest(#[from] BacktestError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RuletraderError {
    pub fn exit_code(&self) -> u8 {
        match self {
            RuletraderError::Io(_) => 1,
            RuletraderError::ConfigParse { .. }
            | RuletraderError::ConfigMissing { .. }
            | RuletraderError::ConfigInvalid { .. } => 2,
            RuletraderError::Data(_) | RuletraderError::Json(_) => 3,
            RuletraderError::Syntax(_) | RuletraderError::Validation(_) => 4,
            RuletraderError::Evaluation(_) => 5,
            RuletraderError::Backtest(_) => 6,
        }
    }
}

impl From<&RuletraderError> for std::process::ExitCode {
    fn from(err: &RuletraderError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}
