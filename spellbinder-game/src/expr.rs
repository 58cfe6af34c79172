//! Safe arithmetic/boolean expression evaluator for data-driven formulas.
//!
//! Skill effect formulas (`"5 + level * 2"`) and custom unlock conditions
//! (`"fire >= 20 && earth >= 20"`) are parsed into a small AST and evaluated
//! against a caller-supplied variable lookup. Nothing here can execute code.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("unexpected character '{0}' at {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("function `{name}` expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("expected a {expected} value")]
    TypeMismatch { expected: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    const OPS: [&str; 16] = [
        ">=", "<=", "==", "!=", "&&", "||", ">", "<", "+", "-", "*", "/", "%", "^", "!", "=",
    ];
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    'outer: while pos < bytes.len() {
        let ch = char::from(bytes[pos]);
        if ch.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if ch.is_ascii_digit() || ch == '.' {
            let start = pos;
            while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                pos += 1;
            }
            let text = &src[start..pos];
            let value = text
                .parse::<f64>()
                .map_err(|_| ExprError::UnexpectedToken(text.to_string()))?;
            tokens.push(Token::Num(value));
            continue;
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            let start = pos;
            while pos < bytes.len()
                && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'.')
            {
                pos += 1;
            }
            tokens.push(Token::Ident(src[start..pos].to_string()));
            continue;
        }
        match ch {
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            _ => {
                for op in OPS {
                    if src[pos..].starts_with(op) {
                        // a lone `=` is accepted as equality
                        tokens.push(Token::Op(if op == "=" { "==" } else { op }));
                        pos += op.len();
                        continue 'outer;
                    }
                }
                return Err(ExprError::UnexpectedChar(ch, pos));
            }
        }
        pos += 1;
    }
    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Bool(bool),
    Var(String),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(&'static str, Box<Node>, Box<Node>),
    Call(String, Vec<Node>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_op(&self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => Some(*op),
            _ => None,
        }
    }

    fn expect(&mut self, want: &Token) -> Result<(), ExprError> {
        match self.next() {
            Some(ref tok) if tok == want => Ok(()),
            Some(tok) => Err(ExprError::UnexpectedToken(format!("{tok:?}"))),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn binary_level(
        &mut self,
        ops: &[&str],
        next: fn(&mut Self) -> Result<Node, ExprError>,
    ) -> Result<Node, ExprError> {
        let mut lhs = next(self)?;
        while let Some(op) = self.peek_op(ops) {
            self.pos += 1;
            let rhs = next(self)?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Node, ExprError> {
        self.binary_level(&["||"], Self::and)
    }

    fn and(&mut self) -> Result<Node, ExprError> {
        self.binary_level(&["&&"], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Node, ExprError> {
        self.binary_level(&[">=", "<=", ">", "<", "==", "!="], Self::additive)
    }

    fn additive(&mut self) -> Result<Node, ExprError> {
        self.binary_level(&["+", "-"], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Node, ExprError> {
        self.binary_level(&["*", "/", "%"], Self::unary)
    }

    fn unary(&mut self) -> Result<Node, ExprError> {
        if self.peek_op(&["-"]).is_some() {
            self.pos += 1;
            return Ok(Node::Neg(Box::new(self.unary()?)));
        }
        if self.peek_op(&["!"]).is_some() {
            self.pos += 1;
            return Ok(Node::Not(Box::new(self.unary()?)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Node, ExprError> {
        let base = self.primary()?;
        if self.peek_op(&["^"]).is_some() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Node::Binary("^", Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Node, ExprError> {
        match self.next() {
            Some(Token::Num(value)) => Ok(Node::Num(value)),
            Some(Token::LParen) => {
                let inner = self.or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Some(Token::RParen)) {
                        loop {
                            args.push(self.or()?);
                            if matches!(self.peek(), Some(Token::Comma)) {
                                self.pos += 1;
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(&Token::RParen)?;
                    let name = name.strip_prefix("Math.").unwrap_or(&name).to_string();
                    return Ok(Node::Call(name, args));
                }
                match name.as_str() {
                    "true" => Ok(Node::Bool(true)),
                    "false" => Ok(Node::Bool(false)),
                    _ => Ok(Node::Var(name)),
                }
            }
            Some(tok) => Err(ExprError::UnexpectedToken(format!("{tok:?}"))),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Num(f64),
    Bool(bool),
}

impl Value {
    const fn num(self) -> Result<f64, ExprError> {
        match self {
            Self::Num(v) => Ok(v),
            Self::Bool(_) => Err(ExprError::TypeMismatch { expected: "numeric" }),
        }
    }

    fn truthy(self) -> bool {
        match self {
            Self::Num(v) => v != 0.0,
            Self::Bool(b) => b,
        }
    }
}

/// A parsed expression, reusable across evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    root: Node,
}

impl Expr {
    /// Parse an expression.
    ///
    /// # Errors
    ///
    /// Returns an [`ExprError`] when the source is not a well-formed expression.
    pub fn parse(src: &str) -> Result<Self, ExprError> {
        let mut parser = Parser {
            tokens: tokenize(src)?,
            pos: 0,
        };
        let root = parser.or()?;
        if let Some(tok) = parser.peek() {
            return Err(ExprError::UnexpectedToken(format!("{tok:?}")));
        }
        Ok(Self { root })
    }

    /// Evaluate to a number; booleans are rejected.
    ///
    /// # Errors
    ///
    /// Returns an [`ExprError`] for unknown variables, bad arity, or division by zero.
    pub fn eval_number(&self, vars: &dyn Fn(&str) -> Option<f64>) -> Result<f64, ExprError> {
        let value = eval(&self.root, vars)?.num()?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ExprError::DivisionByZero)
        }
    }

    /// Evaluate to a truth value; non-zero numbers are true.
    ///
    /// # Errors
    ///
    /// Returns an [`ExprError`] for unknown variables, bad arity, or division by zero.
    pub fn eval_bool(&self, vars: &dyn Fn(&str) -> Option<f64>) -> Result<bool, ExprError> {
        eval(&self.root, vars).map(Value::truthy)
    }
}

fn eval(node: &Node, vars: &dyn Fn(&str) -> Option<f64>) -> Result<Value, ExprError> {
    match node {
        Node::Num(v) => Ok(Value::Num(*v)),
        Node::Bool(b) => Ok(Value::Bool(*b)),
        Node::Var(name) => vars(name)
            .map(Value::Num)
            .ok_or_else(|| ExprError::UnknownVariable(name.clone())),
        Node::Neg(inner) => Ok(Value::Num(-eval(inner, vars)?.num()?)),
        Node::Not(inner) => Ok(Value::Bool(!eval(inner, vars)?.truthy())),
        Node::Binary(op, lhs, rhs) => eval_binary(op, lhs, rhs, vars),
        Node::Call(name, args) => {
            let values = args
                .iter()
                .map(|arg| eval(arg, vars)?.num())
                .collect::<Result<Vec<_>, _>>()?;
            call(name, &values).map(Value::Num)
        }
    }
}

fn eval_binary(
    op: &str,
    lhs: &Node,
    rhs: &Node,
    vars: &dyn Fn(&str) -> Option<f64>,
) -> Result<Value, ExprError> {
    match op {
        "&&" => {
            let left = eval(lhs, vars)?.truthy();
            Ok(Value::Bool(left && eval(rhs, vars)?.truthy()))
        }
        "||" => {
            let left = eval(lhs, vars)?.truthy();
            Ok(Value::Bool(left || eval(rhs, vars)?.truthy()))
        }
        _ => {
            let a = eval(lhs, vars)?.num()?;
            let b = eval(rhs, vars)?.num()?;
            let value = match op {
                "+" => Value::Num(a + b),
                "-" => Value::Num(a - b),
                "*" => Value::Num(a * b),
                "/" | "%" if b == 0.0 => return Err(ExprError::DivisionByZero),
                "/" => Value::Num(a / b),
                "%" => Value::Num(a % b),
                "^" => Value::Num(a.powf(b)),
                ">=" => Value::Bool(a >= b),
                "<=" => Value::Bool(a <= b),
                ">" => Value::Bool(a > b),
                "<" => Value::Bool(a < b),
                "==" => Value::Bool((a - b).abs() < f64::EPSILON),
                "!=" => Value::Bool((a - b).abs() >= f64::EPSILON),
                other => return Err(ExprError::UnexpectedToken(other.to_string())),
            };
            Ok(value)
        }
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, ExprError> {
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(ExprError::Arity {
                name: name.to_string(),
                expected,
                got: args.len(),
            })
        }
    };
    match name {
        "floor" => arity(1).map(|()| args[0].floor()),
        "ceil" => arity(1).map(|()| args[0].ceil()),
        "round" => arity(1).map(|()| args[0].round()),
        "sqrt" => arity(1).map(|()| args[0].sqrt()),
        "abs" => arity(1).map(|()| args[0].abs()),
        "pow" => arity(2).map(|()| args[0].powf(args[1])),
        "min" if !args.is_empty() => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" if !args.is_empty() => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        "min" | "max" => arity(1).map(|()| 0.0),
        other => Err(ExprError::UnknownFunction(other.to_string())),
    }
}

/// Parse and evaluate a numeric formula in one step.
///
/// # Errors
///
/// Returns an [`ExprError`] when parsing or evaluation fails.
pub fn eval_number(src: &str, vars: &dyn Fn(&str) -> Option<f64>) -> Result<f64, ExprError> {
    Expr::parse(src)?.eval_number(vars)
}

/// Parse and evaluate a condition; any error is reported as `false`.
#[must_use]
pub fn check_condition(src: &str, vars: &dyn Fn(&str) -> Option<f64>) -> bool {
    match Expr::parse(src).and_then(|expr| expr.eval_bool(vars)) {
        Ok(result) => result,
        Err(err) => {
            log::warn!("condition `{src}` rejected: {err}");
            false
        }
    }
}
