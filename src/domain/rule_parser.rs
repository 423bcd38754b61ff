//! Rule DSL parser.
//!
//! Recursive descent parser for the rule grammar. Converts text to a
//! [`StrategyAst`] with errors carrying line, column and the offending line.
//!
//! ```text
//! program   := ("ENTRY" ":" section)? ("EXIT" ":" section)?
//! section   := "FALSE" | "(" section ")" | expr
//! expr      := term (("AND" | "OR") term)*
//! term      := "(" expr ")" | operand OP operand
//! operand   := NUMBER | NAME "." "shift" "(" INT ")" | NAME "(" NAME "," INT ")" | NAME
//! OP        := ">=" | "<=" | ">" | "<" | "==" | "!=" | "CROSS_ABOVE" | "CROSS_BELOW"
//! ```
//!
//! `AND`/`OR` share one precedence level and fold strictly left to right:
//! `a AND b OR c` is `(a AND b) OR c`. Operator keywords are case-insensitive;
//! field names, `shift`, `ENTRY`, `EXIT` and `FALSE` are not. Function names
//! are lowercased, and `min`/`max` become rolling extrema.

use crate::domain::error::SyntaxError;
use crate::domain::indicator::IndicatorKey;
use crate::domain::ohlcv::Field;
use crate::domain::rule::{Node, Operator, StrategyAst};
use tracing::debug;

/// Intermediate result of a section: `FALSE` has no node form.
#[derive(Debug)]
enum Expr {
    False,
    Node(Node),
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> SyntaxError {
        SyntaxError::at(self.input, position, message)
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.input.len()
    }

    fn expect_char(&mut self, expected: char) -> Result<(), SyntaxError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(_) => Err(self.error_at(
                self.pos,
                format!("expected '{}', found '{}'", expected, self.peek_word()),
            )),
            None => Err(self.error_at(
                self.pos,
                format!("expected '{}', found end of input", expected),
            )),
        }
    }

    fn peek_word(&self) -> String {
        let word = self.word_at_cursor();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word.to_string()
        }
    }

    fn word_at_cursor(&self) -> &'a str {
        let rest = self.remaining();
        let end = rest
            .char_indices()
            .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        &rest[..end]
    }

    /// True if the next word equals `keyword`, compared case-insensitively
    /// when `any_case` is set.
    fn peek_keyword(&mut self, keyword: &str, any_case: bool) -> bool {
        self.skip_whitespace();
        let word = self.word_at_cursor();
        if any_case {
            word.eq_ignore_ascii_case(keyword)
        } else {
            word == keyword
        }
    }

    fn consume_keyword(&mut self, keyword: &str, any_case: bool) -> bool {
        if self.peek_keyword(keyword, any_case) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn parse_number(&mut self) -> Result<f64, SyntaxError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(self.error_at(start, "expected number"));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map_err(|_| self.error_at(start, format!("invalid number: {}", num_str)))
    }

    fn parse_integer(&mut self) -> Result<usize, SyntaxError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(self.error_at(
                start,
                format!("expected integer, found '{}'", self.peek_word()),
            ));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<usize>()
            .map_err(|_| self.error_at(start, format!("invalid integer: {}", num_str)))
    }

    fn parse_field(&mut self) -> Result<Field, SyntaxError> {
        self.skip_whitespace();
        let start = self.pos;
        let word = self.word_at_cursor();
        let field = word
            .parse::<Field>()
            .map_err(|msg| self.error_at(start, msg))?;
        self.pos += word.len();
        Ok(field)
    }

    fn parse_operand(&mut self) -> Result<Node, SyntaxError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Node::Number(self.parse_number()?));
        }

        let start = self.pos;
        let name = self.word_at_cursor();
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(self.error_at(
                start,
                format!("expected operand, found '{}'", self.peek_word()),
            ));
        }
        self.pos += name.len();
        self.skip_whitespace();

        match self.peek() {
            Some('.') => {
                self.advance();
                let field = name.parse::<Field>().map_err(|msg| self.error_at(start, msg))?;
                if !self.consume_keyword("shift", false) {
                    return Err(self.error_at(
                        self.pos,
                        format!("expected 'shift', found '{}'", self.peek_word()),
                    ));
                }
                self.expect_char('(')?;
                let periods = self.parse_integer()?;
                self.expect_char(')')?;
                Ok(Node::Shift { field, periods })
            }
            Some('(') => {
                self.advance();
                let field = self.parse_field()?;
                self.expect_char(',')?;
                let window = self.parse_integer()?;
                self.expect_char(')')?;
                Ok(match name.to_ascii_lowercase().as_str() {
                    "min" => Node::RollingMin { field, window },
                    "max" => Node::RollingMax { field, window },
                    _ => Node::Indicator(IndicatorKey::new(name, field, window)),
                })
            }
            _ => {
                let field = name.parse::<Field>().map_err(|msg| self.error_at(start, msg))?;
                Ok(Node::Field(field))
            }
        }
    }

    fn parse_operator(&mut self) -> Result<Operator, SyntaxError> {
        self.skip_whitespace();

        for symbol in [">=", "<=", "==", "!=", ">", "<"] {
            if self.remaining().starts_with(symbol) {
                self.pos += symbol.len();
                return symbol
                    .parse::<Operator>()
                    .map_err(|msg| self.error_at(self.pos, msg));
            }
        }

        for keyword in ["CROSS_ABOVE", "CROSS_BELOW"] {
            if self.consume_keyword(keyword, true) {
                return keyword
                    .parse::<Operator>()
                    .map_err(|msg| self.error_at(self.pos, msg));
            }
        }

        Err(self.error_at(
            self.pos,
            format!("expected comparison operator, found '{}'", self.peek_word()),
        ))
    }

    fn parse_condition(&mut self) -> Result<Node, SyntaxError> {
        let left = self.parse_operand()?;
        let op = self.parse_operator()?;
        let right = self.parse_operand()?;
        Ok(Node::binary(left, op, right))
    }

    fn parse_term(&mut self) -> Result<Expr, SyntaxError> {
        self.skip_whitespace();

        if self.peek() == Some('(') {
            self.advance();
            let inner = self.parse_expr()?;
            self.expect_char(')')?;
            return Ok(inner);
        }

        if self.consume_keyword("FALSE", false) {
            return Ok(Expr::False);
        }

        Ok(Expr::Node(self.parse_condition()?))
    }

    fn parse_logic(&mut self) -> Option<Operator> {
        if self.consume_keyword("AND", true) {
            Some(Operator::And)
        } else if self.consume_keyword("OR", true) {
            Some(Operator::Or)
        } else {
            None
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut acc = self.parse_term()?;

        loop {
            self.skip_whitespace();
            let op_pos = self.pos;
            let Some(op) = self.parse_logic() else {
                break;
            };
            let rhs = self.parse_term()?;
            acc = match (acc, rhs) {
                (Expr::Node(left), Expr::Node(right)) => Expr::Node(Node::binary(left, op, right)),
                _ => {
                    return Err(self.error_at(
                        op_pos,
                        format!("FALSE cannot be combined with {}", op),
                    ));
                }
            };
        }

        Ok(acc)
    }

    fn parse_section(&mut self, keyword: &str) -> Result<Option<Vec<Node>>, SyntaxError> {
        if !self.consume_keyword(keyword, false) {
            return Ok(None);
        }
        self.expect_char(':')?;
        if self.at_end() || self.peek_keyword("EXIT", false) {
            return Err(self.error_at(
                self.pos,
                format!("expected expression or FALSE after '{}:'", keyword),
            ));
        }
        match self.parse_expr()? {
            Expr::False => Ok(Some(Vec::new())),
            Expr::Node(node) => Ok(Some(vec![node])),
        }
    }

    fn parse_program(&mut self) -> Result<StrategyAst, SyntaxError> {
        let entry = self.parse_section("ENTRY")?.unwrap_or_default();
        let exit = self.parse_section("EXIT")?.unwrap_or_default();

        if !self.at_end() {
            return Err(self.error_at(
                self.pos,
                format!("unexpected input: '{}'", self.peek_word()),
            ));
        }

        Ok(StrategyAst { entry, exit })
    }

    fn finish<T>(&mut self, value: T) -> Result<T, SyntaxError> {
        if self.at_end() {
            Ok(value)
        } else {
            Err(self.error_at(
                self.pos,
                format!("unexpected input: '{}'", self.peek_word()),
            ))
        }
    }
}

/// Parse full rule text of the form `ENTRY: <expr> EXIT: <expr>`.
pub fn parse(input: &str) -> Result<StrategyAst, SyntaxError> {
    let ast = Parser::new(input).parse_program()?;
    debug!(
        entry_roots = ast.entry.len(),
        exit_roots = ast.exit.len(),
        indicators = ast.indicators().len(),
        "parsed strategy rules"
    );
    Ok(ast)
}

/// Parse a single boolean expression (no section keywords, no `FALSE`).
pub fn parse_expression(input: &str) -> Result<Node, SyntaxError> {
    let mut parser = Parser::new(input);
    let start = parser.pos;
    match parser.parse_expr()? {
        Expr::Node(node) => parser.finish(node),
        Expr::False => Err(parser.error_at(start, "FALSE is only valid as a whole section")),
    }
}

/// Parse a single operand such as `close`, `high.shift(1)`, `sma(close,20)` or `30`.
pub fn parse_operand(input: &str) -> Result<Node, SyntaxError> {
    let mut parser = Parser::new(input);
    let node = parser.parse_operand()?;
    parser.finish(node)
}
