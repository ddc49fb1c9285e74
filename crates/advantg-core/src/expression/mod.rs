//! Arithmetic expressions used by parameter definitions and numeric directives.
//!
//! Supported syntax: numeric literals (`12`, `0.3`, `1e-3`), references written
//! either bare (`x_1`) or as placeholders (`<x_1>`), the binary operators
//! `+ - * /` and `^` (alias `**`), unary sign, parentheses, and the functions
//! `abs`, `sqrt`, `min`, `max`. Bracketed lists (`[a, b, c]`) are parsed by
//! [`parse_expression_list`].

use std::collections::BTreeSet;

const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected character '{ch}' at offset {position}")]
    UnexpectedCharacter { ch: char, position: usize },
    #[error("unexpected {found} at offset {position}, expected {expected}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        position: usize,
    },
    #[error("unterminated placeholder starting at offset {position}")]
    UnterminatedPlaceholder { position: usize },
    #[error("unbalanced parentheses: '(' at offset {position} is never closed")]
    UnbalancedParenthesis { position: usize },
    #[error("invalid number '{raw}' at offset {position}")]
    InvalidNumber { raw: String, position: usize },
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },
    #[error("function '{function}' expects {expected} argument(s), got {found}")]
    WrongArity {
        function: &'static str,
        expected: &'static str,
        found: usize,
    },
    #[error("expression nesting exceeds {MAX_NESTING} levels")]
    TooDeep,
    #[error("undefined name '{name}'")]
    UndefinedName { name: String },
    #[error("'{name}' is not a numeric scalar")]
    NotNumeric { name: String },
    #[error("expression does not evaluate to a finite number")]
    NonFinite,
}

/// Name lookup used during evaluation.
pub trait NumericScope {
    fn number(&self, name: &str) -> Result<f64, ExpressionError>;
}

impl<F> NumericScope for F
where
    F: Fn(&str) -> Result<f64, ExpressionError>,
{
    fn number(&self, name: &str) -> Result<f64, ExpressionError> {
        (self)(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Sqrt,
    Min,
    Max,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "abs" => Some(Self::Abs),
            "sqrt" => Some(Self::Sqrt),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Sqrt => "sqrt",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Bare name, `x_1`.
    Reference(String),
    /// Bracketed name, `<x_1>`.
    Placeholder(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Names this expression reads, in sorted order.
    pub fn references(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_references(&mut names, true);
        names
    }

    /// Names written without angle brackets.
    pub fn bare_references(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_references(&mut names, false);
        names
    }

    fn collect_references<'a>(&'a self, names: &mut BTreeSet<&'a str>, placeholders: bool) {
        match self {
            Self::Number(_) => {}
            Self::Reference(name) => {
                names.insert(name.as_str());
            }
            Self::Placeholder(name) => {
                if placeholders {
                    names.insert(name.as_str());
                }
            }
            Self::Unary { operand, .. } => operand.collect_references(names, placeholders),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_references(names, placeholders);
                rhs.collect_references(names, placeholders);
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.collect_references(names, placeholders);
                }
            }
        }
    }

    pub fn evaluate<S: NumericScope + ?Sized>(&self, scope: &S) -> Result<f64, ExpressionError> {
        let value = self.evaluate_inner(scope)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ExpressionError::NonFinite)
        }
    }

    fn evaluate_inner<S: NumericScope + ?Sized>(&self, scope: &S) -> Result<f64, ExpressionError> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Reference(name) | Self::Placeholder(name) => scope.number(name),
            Self::Unary { op, operand } => {
                let value = operand.evaluate_inner(scope)?;
                Ok(match op {
                    UnaryOp::Plus => value,
                    UnaryOp::Minus => -value,
                })
            }
            Self::Binary { op, lhs, rhs } => {
                let lhs = lhs.evaluate_inner(scope)?;
                let rhs = rhs.evaluate_inner(scope)?;
                Ok(match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Subtract => lhs - rhs,
                    BinaryOp::Multiply => lhs * rhs,
                    BinaryOp::Divide => lhs / rhs,
                    BinaryOp::Power => lhs.powf(rhs),
                })
            }
            Self::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate_inner(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(match function {
                    Function::Abs => values[0].abs(),
                    Function::Sqrt => values[0].sqrt(),
                    Function::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
                    Function::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                })
            }
        }
    }
}

pub fn parse_expression(input: &str) -> Result<Expr, ExpressionError> {
    let tokens = Lexer::new(input).lex()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parses `[expr, expr, ...]`. An empty list is rejected.
pub fn parse_expression_list(input: &str) -> Result<Vec<Expr>, ExpressionError> {
    let tokens = Lexer::new(input).lex()?;
    let mut parser = Parser::new(tokens);
    parser.expect(Token::LBracket, "'['")?;
    let mut items = vec![parser.parse_expression()?];
    while parser.matches(Token::Comma) {
        items.push(parser.parse_expression()?);
    }
    parser.expect(Token::RBracket, "']'")?;
    parser.expect_eof()?;
    Ok(items)
}

/// Returns true for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {}
        _ => return false,
    }

    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Placeholder(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Number(value) => format!("number {value}"),
            Self::Ident(name) => format!("name '{name}'"),
            Self::Placeholder(name) => format!("placeholder '<{name}>'"),
            Self::Plus => "'+'".to_string(),
            Self::Minus => "'-'".to_string(),
            Self::Star => "'*'".to_string(),
            Self::Slash => "'/'".to_string(),
            Self::Caret => "'^'".to_string(),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::LBracket => "'['".to_string(),
            Self::RBracket => "']'".to_string(),
            Self::Comma => "','".to_string(),
            Self::Eof => "end of expression".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct SpannedToken {
    token: Token,
    position: usize,
}

struct Lexer<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    const fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    fn lex(mut self) -> Result<Vec<SpannedToken>, ExpressionError> {
        let bytes = self.input.as_bytes();
        let mut tokens = Vec::new();

        while self.offset < bytes.len() {
            let start = self.offset;
            let token = match bytes[self.offset] {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.offset += 1;
                    continue;
                }
                b'+' => self.single(Token::Plus),
                b'-' => self.single(Token::Minus),
                b'/' => self.single(Token::Slash),
                b'^' => self.single(Token::Caret),
                b'(' => self.single(Token::LParen),
                b')' => self.single(Token::RParen),
                b'[' => self.single(Token::LBracket),
                b']' => self.single(Token::RBracket),
                b',' => self.single(Token::Comma),
                b'*' => {
                    if bytes.get(self.offset + 1) == Some(&b'*') {
                        self.offset += 2;
                        Token::Caret
                    } else {
                        self.single(Token::Star)
                    }
                }
                b'<' => self.placeholder()?,
                b'0'..=b'9' | b'.' => self.number(bytes)?,
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    self.consume_while(bytes, |b| b.is_ascii_alphanumeric() || b == b'_');
                    Token::Ident(self.input[start..self.offset].to_string())
                }
                _ => {
                    let ch = self.input[start..].chars().next().unwrap_or('?');
                    return Err(ExpressionError::UnexpectedCharacter {
                        ch,
                        position: start,
                    });
                }
            };
            tokens.push(SpannedToken {
                token,
                position: start,
            });
        }

        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }

        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.offset += 1;
        token
    }

    fn placeholder(&mut self) -> Result<Token, ExpressionError> {
        let start = self.offset;
        let Some(close) = self.input[start..].find('>') else {
            return Err(ExpressionError::UnterminatedPlaceholder { position: start });
        };
        let name = self.input[start + 1..start + close].trim();
        if !is_identifier(name) {
            let found = &self.input[start..start + close + 1];
            return Err(ExpressionError::UnexpectedToken {
                expected: "placeholder of the form <name>",
                found: format!("'{found}'"),
                position: start,
            });
        }
        self.offset = start + close + 1;
        Ok(Token::Placeholder(name.to_string()))
    }

    fn number(&mut self, bytes: &[u8]) -> Result<Token, ExpressionError> {
        let start = self.offset;
        self.consume_while(bytes, |b| b.is_ascii_digit() || b == b'.');
        if matches!(bytes.get(self.offset), Some(b'e' | b'E')) {
            let mut lookahead = self.offset + 1;
            if matches!(bytes.get(lookahead), Some(b'+' | b'-')) {
                lookahead += 1;
            }
            if bytes.get(lookahead).is_some_and(u8::is_ascii_digit) {
                self.offset = lookahead;
                self.consume_while(bytes, |b| b.is_ascii_digit());
            }
        }

        let raw = &self.input[start..self.offset];
        raw.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ExpressionError::InvalidNumber {
                raw: raw.to_string(),
                position: start,
            })
    }

    fn consume_while<F>(&mut self, bytes: &[u8], condition: F)
    where
        F: Fn(u8) -> bool,
    {
        while let Some(&b) = bytes.get(self.offset) {
            if condition(b) {
                self.offset += 1;
            } else {
                break;
            }
        }
    }
}

struct Parser {
    tokens: Vec<SpannedToken>,
    index: usize,
    nesting: usize,
}

impl Parser {
    const fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            index: 0,
            nesting: 0,
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.current().token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.current().token {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = match self.current().token {
            Token::Plus => UnaryOp::Plus,
            Token::Minus => UnaryOp::Minus,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.nested(|parser| parser.parse_unary())?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    // `^` binds tighter than unary minus on its left and is right-associative.
    fn parse_power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.parse_primary()?;
        if self.matches(Token::Caret) {
            let exponent = self.nested(|parser| parser.parse_unary())?;
            return Ok(binary(BinaryOp::Power, base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let SpannedToken { token, position } = self.current().clone();
        match token {
            Token::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            Token::Placeholder(name) => {
                self.advance();
                Ok(Expr::Placeholder(name))
            }
            Token::Ident(name) => {
                self.advance();
                if self.matches(Token::LParen) {
                    self.nested(|parser| parser.parse_call(&name, position))
                } else {
                    Ok(Expr::Reference(name))
                }
            }
            Token::LParen => {
                self.advance();
                self.nested(|parser| {
                    let inner = parser.parse_expression()?;
                    if parser.current().token != Token::RParen {
                        return Err(ExpressionError::UnbalancedParenthesis { position });
                    }
                    parser.advance();
                    Ok(inner)
                })
            }
            other => Err(ExpressionError::UnexpectedToken {
                expected: "number, name or '('",
                found: other.describe(),
                position,
            }),
        }
    }

    fn parse_call(&mut self, name: &str, position: usize) -> Result<Expr, ExpressionError> {
        let function = Function::from_name(name).ok_or_else(|| ExpressionError::UnknownFunction {
            name: name.to_string(),
        })?;

        let mut args = Vec::new();
        if !self.matches(Token::RParen) {
            args.push(self.parse_expression()?);
            while self.matches(Token::Comma) {
                args.push(self.parse_expression()?);
            }
            if self.current().token != Token::RParen {
                return Err(ExpressionError::UnbalancedParenthesis { position });
            }
            self.advance();
        }

        let arity_ok = match function {
            Function::Abs | Function::Sqrt => args.len() == 1,
            Function::Min | Function::Max => !args.is_empty(),
        };
        if !arity_ok {
            return Err(ExpressionError::WrongArity {
                function: function.name(),
                expected: match function {
                    Function::Abs | Function::Sqrt => "exactly 1",
                    Function::Min | Function::Max => "at least 1",
                },
                found: args.len(),
            });
        }

        Ok(Expr::Call { function, args })
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ExpressionError>,
    ) -> Result<T, ExpressionError> {
        if self.nesting >= MAX_NESTING {
            return Err(ExpressionError::TooDeep);
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ExpressionError> {
        if self.current().token == token {
            self.advance();
            return Ok(());
        }
        Err(ExpressionError::UnexpectedToken {
            expected,
            found: self.current().token.describe(),
            position: self.current().position,
        })
    }

    fn expect_eof(&self) -> Result<(), ExpressionError> {
        match &self.current().token {
            Token::Eof => Ok(()),
            other => Err(ExpressionError::UnexpectedToken {
                expected: "end of expression",
                found: other.describe(),
                position: self.current().position,
            }),
        }
    }

    fn matches(&mut self, token: Token) -> bool {
        if self.current().token == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
