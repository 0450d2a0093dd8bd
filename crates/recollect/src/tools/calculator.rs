//! `calculator` tool: evaluates a single-line arithmetic expression.
//!
//! Supported syntax: numbers (including `1.5e3`), `+ - * / %`, `**` for
//! powers (right-associative, binds tighter than unary minus), parentheses,
//! the constants `pi` and `e`, and the functions `sin cos tan log exp sqrt
//! abs floor ceil`. `log` is the natural logarithm.

use schemars::JsonSchema;
use serde::Deserialize;

use super::core::{Tool, ToolFuture, parse_tool_args};
use crate::api::ToolDef;

#[derive(Deserialize, JsonSchema)]
pub struct CalculatorArgs {
    /// A single-line arithmetic expression, e.g. "37593 * 67" or "sqrt(2) * pi".
    pub expression: String,
}

/// Evaluates arithmetic so the model does not have to.
#[derive(Debug, Default, Clone, Copy)]
pub struct Calculator;

impl Tool for Calculator {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "calculator",
            "Calculate a single-line arithmetic expression. Supports + - * / % **, \
             parentheses, pi, e and the functions sin, cos, tan, log, exp, sqrt, \
             abs, floor and ceil.",
            crate::json_schema_for::<CalculatorArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let result = match parse_tool_args::<CalculatorArgs>(arguments) {
            Ok(args) => match evaluate(&args.expression) {
                Ok(value) => format_number(value),
                Err(e) => format!("Error evaluating expression: {e}"),
            },
            Err(e) => e,
        };
        Box::pin(async move { result })
    }
}

/// Evaluate `expression` to a finite number.
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("empty expression".into());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(tok) = parser.peek() {
        return Err(format!("unexpected {tok}"));
    }
    if value.is_finite() {
        Ok(value)
    } else {
        Err("result is not a finite number".into())
    }
}

/// Integers print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "number {n}"),
            Token::Ident(name) => write!(f, "name '{name}'"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::Pow => write!(f, "'**'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent suffix: 1e3, 2.5E-4.
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

/// Nesting bound for parentheses, calls and signs. Every nested level
/// passes through `unary`, so counting there bounds the recursion.
const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            if self.eat(&Token::Plus) {
                value += self.term()?;
            } else if self.eat(&Token::Minus) {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                value *= self.unary()?;
            } else if self.eat(&Token::Slash) {
                let rhs = self.unary()?;
                if rhs == 0.0 {
                    return Err("division by zero".into());
                }
                value /= rhs;
            } else if self.eat(&Token::Percent) {
                let rhs = self.unary()?;
                if rhs == 0.0 {
                    return Err("modulo by zero".into());
                }
                // Sign follows the divisor.
                value = value - rhs * (value / rhs).floor();
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression nested too deeply".into());
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    // unary := ('-' | '+') unary | power
    fn signed(&mut self) -> Result<f64, String> {
        if self.eat(&Token::Minus) {
            return Ok(-self.unary()?);
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    // power := primary ('**' unary)?
    fn power(&mut self) -> Result<f64, String> {
        let base = self.primary()?;
        if self.eat(&Token::Pow) {
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                if !self.eat(&Token::RParen) {
                    return Err("missing ')'".into());
                }
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.eat(&Token::LParen) {
                    let arg = self.expr()?;
                    if !self.eat(&Token::RParen) {
                        return Err(format!("missing ')' after {name}("));
                    }
                    apply_function(&name, arg)
                } else {
                    constant(&name)
                }
            }
            Some(tok) => Err(format!("unexpected {tok}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

fn constant(name: &str) -> Result<f64, String> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        other => Err(format!("unknown name '{other}'")),
    }
}

fn apply_function(name: &str, arg: f64) -> Result<f64, String> {
    Ok(match name {
        "sin" => arg.sin(),
        "cos" => arg.cos(),
        "tan" => arg.tan(),
        "exp" => arg.exp(),
        "abs" => arg.abs(),
        "floor" => arg.floor(),
        "ceil" => arg.ceil(),
        "log" if arg <= 0.0 => return Err("log of a non-positive number".into()),
        "log" => arg.ln(),
        "sqrt" if arg < 0.0 => return Err("sqrt of a negative number".into()),
        "sqrt" => arg.sqrt(),
        other => return Err(format!("unknown function '{other}'")),
    })
}
