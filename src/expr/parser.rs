//! Recursive-descent parser for the rule expression language.
//!
//! Precedence, lowest first: `||`, `&&`, equality, comparison, additive,
//! multiplicative, unary, postfix (`[index]`, `.field`).

use std::str::FromStr;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    expr::lexer::{tokenize, Token, TokenKind},
    value::Value,
    Error, Result,
};

/// Maximum nesting depth of a parsed expression.
pub(crate) const MAX_DEPTH: usize = 64;

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum BinaryOp {
    /// Addition, or concatenation when either side is a string.
    #[strum(serialize = "+")]
    Add,
    /// Subtraction.
    #[strum(serialize = "-")]
    Sub,
    /// Multiplication.
    #[strum(serialize = "*")]
    Mul,
    /// Division. Integer division by zero is an evaluation fault.
    #[strum(serialize = "/")]
    Div,
    /// Remainder.
    #[strum(serialize = "%")]
    Rem,
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum CompareOp {
    /// `==`
    #[strum(serialize = "==")]
    Eq,
    /// `!=`
    #[strum(serialize = "!=")]
    Ne,
    /// `<`
    #[strum(serialize = "<")]
    Lt,
    /// `<=`
    #[strum(serialize = "<=")]
    Le,
    /// `>`
    #[strum(serialize = ">")]
    Gt,
    /// `>=`
    #[strum(serialize = ">=")]
    Ge,
}

/// Short-circuiting logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Logical negation.
    Not,
}

/// The fixed set of functions callable from an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Builtin {
    /// `len(x)`: length of a string, list or map.
    Len,
    /// `lower(s)`
    Lower,
    /// `upper(s)`
    Upper,
    /// `contains(haystack, needle)`: substring, list element or map key.
    Contains,
    /// `starts_with(s, prefix)`
    StartsWith,
    /// `ends_with(s, suffix)`
    EndsWith,
    /// `str(x)`: display form of any value.
    Str,
    /// `int(x)`: integer conversion of a number or numeric string.
    Int,
}

impl Builtin {
    /// Returns the number of arguments the builtin takes.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Builtin::Len | Builtin::Lower | Builtin::Upper | Builtin::Str | Builtin::Int => 1,
            Builtin::Contains | Builtin::StartsWith | Builtin::EndsWith => 2,
        }
    }
}

/// Expression syntax tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A constant.
    Literal(Value),
    /// `argN`: the N-th call argument.
    Arg(usize),
    /// `args`: all call arguments as a list.
    Args,
    /// `argc`: the number of call arguments.
    ArgCount,
    /// Unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// Arithmetic operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Comparison.
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    /// Logical connective.
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    /// `base[index]`
    Index(Box<Expr>, Box<Expr>),
    /// `base.name`
    Field(Box<Expr>, String),
    /// Builtin function call.
    Call(Builtin, Vec<Expr>),
}

/// Parses `source` into a syntax tree.
pub(crate) fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    let next = parser.peek();
    if next.kind != TokenKind::Eof {
        return Err(Error::Expression {
            message: "unexpected trailing input".to_string(),
            position: next.position,
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize() always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Expression {
            message: message.into(),
            position: self.peek().position,
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::RecursionLimit(MAX_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expression(&mut self) -> Result<Expr> {
        self.enter()?;
        let expr = self.logical_or();
        self.leave();
        expr
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut lhs = self.logical_and()?;
        while self.eat(&TokenKind::OrOr) {
            let rhs = self.logical_and()?;
            lhs = Expr::Logical(LogicalOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut lhs = self.equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let rhs = self.equality()?;
            lhs = Expr::Logical(LogicalOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => CompareOp::Eq,
                TokenKind::NotEq => CompareOp::Ne,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.comparison()?;
            lhs = Expr::Compare(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => CompareOp::Lt,
                TokenKind::Le => CompareOp::Le,
                TokenKind::Gt => CompareOp::Gt,
                TokenKind::Ge => CompareOp::Ge,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.additive()?;
            lhs = Expr::Compare(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.pos += 1;

        self.enter()?;
        let operand = self.unary();
        self.leave();
        let operand = operand?;

        // Fold negative numeric literals
        Ok(match (op, operand) {
            (UnaryOp::Neg, Expr::Literal(Value::Long(v))) => Expr::Literal(Value::Long(-v)),
            (UnaryOp::Neg, Expr::Literal(Value::Double(v))) => Expr::Literal(Value::Double(-v)),
            (op, operand) => Expr::Unary(op, Box::new(operand)),
        })
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::LBracket) {
                let index = self.expression()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat(&TokenKind::Dot) {
                let token = self.advance();
                let TokenKind::Ident(name) = token.kind else {
                    return Err(Error::Expression {
                        message: "expected field name after '.'".to_string(),
                        position: token.position,
                    });
                };
                expr = Expr::Field(Box::new(expr), name);
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::Int(v) => Ok(Expr::Literal(Value::Long(v))),
            TokenKind::Float(v) => Ok(Expr::Literal(Value::Double(v))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::from(s))),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => self.identifier(&name, token.position),
            TokenKind::Eof => Err(Error::Expression {
                message: "unexpected end of expression".to_string(),
                position: token.position,
            }),
            other => Err(Error::Expression {
                message: format!("unexpected token {other:?}"),
                position: token.position,
            }),
        }
    }

    fn identifier(&mut self, name: &str, position: usize) -> Result<Expr> {
        match name {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" => return Ok(Expr::Literal(Value::Null)),
            "args" => return Ok(Expr::Args),
            "argc" => return Ok(Expr::ArgCount),
            _ => {}
        }

        if let Some(index) = name.strip_prefix("arg") {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                return index.parse().map(Expr::Arg).map_err(|_| Error::Expression {
                    message: format!("argument index '{name}' is out of range"),
                    position,
                });
            }
        }

        if self.peek().kind == TokenKind::LParen {
            let builtin = Builtin::from_str(name).map_err(|_| Error::Expression {
                message: format!("unknown function '{name}'"),
                position,
            })?;
            self.pos += 1;

            let mut args = Vec::new();
            if !self.eat(&TokenKind::RParen) {
                loop {
                    args.push(self.expression()?);
                    if self.eat(&TokenKind::RParen) {
                        break;
                    }
                    self.expect(&TokenKind::Comma, "',' or ')'")?;
                }
            }
            if args.len() != builtin.arity() {
                return Err(Error::Expression {
                    message: format!(
                        "function '{builtin}' takes {} argument(s), got {}",
                        builtin.arity(),
                        args.len()
                    ),
                    position,
                });
            }
            return Ok(Expr::Call(builtin, args));
        }

        Err(Error::Expression {
            message: format!("unknown identifier '{name}'"),
            position,
        })
    }
}
