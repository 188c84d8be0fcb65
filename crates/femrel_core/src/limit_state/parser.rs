//! Recursive descent parser for limit state expressions
//!
//! Precedence follows Python: `**` binds tighter than a unary minus on its
//! left and is right associative, so `-2**2 == -4` and `2**-1 == 0.5`.

use super::lexer::{Spanned, Token, tokenize};
use crate::error::ExpressionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Argument {
    Positional(Ast),
    Keyword(String, Ast),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Ast {
    Number(f64),
    Name(String),
    Negate(Box<Ast>),
    Binary(BinaryOp, Box<Ast>, Box<Ast>),
    Call(String, Vec<Argument>),
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

pub(crate) fn parse(source: &str) -> Result<Ast, ExpressionError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
    };
    let ast = parser.additive()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(ast),
        Some((token, position)) => Err(ExpressionError::UnexpectedToken {
            position: *position,
            found: token.describe(),
        }),
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<Spanned, ExpressionError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        let (token, position) = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(ExpressionError::UnexpectedToken {
                position,
                found: token.describe(),
            })
        }
    }

    fn additive(&mut self) -> Result<Ast, ExpressionError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Ast, ExpressionError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Ast, ExpressionError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Ast::Negate(Box::new(self.unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Ast, ExpressionError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Power) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Ast::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Ast, ExpressionError> {
        let (token, position) = self.next()?;
        match token {
            Token::Number(value) => Ok(Ast::Number(value)),
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    Ok(Ast::Call(name, args))
                } else {
                    Ok(Ast::Name(name))
                }
            }
            Token::LParen => {
                let inner = self.additive()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(ExpressionError::UnexpectedToken {
                position,
                found: other.describe(),
            }),
        }
    }

    /// Arguments after the opening parenthesis, up to and including `)`
    fn arguments(&mut self) -> Result<Vec<Argument>, ExpressionError> {
        let mut args = Vec::new();
        let mut seen_keyword = false;

        loop {
            if self.peek() == Some(&Token::RParen) {
                self.pos += 1;
                return Ok(args);
            }

            let keyword = match (self.peek(), self.tokens.get(self.pos + 1)) {
                (Some(Token::Ident(name)), Some((Token::Assign, _))) => Some(name.clone()),
                _ => None,
            };

            let start = self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(0);
            match keyword {
                Some(name) => {
                    self.pos += 2;
                    seen_keyword = true;
                    args.push(Argument::Keyword(name, self.additive()?));
                }
                None if seen_keyword => {
                    return Err(ExpressionError::UnexpectedToken {
                        position: start,
                        found: "positional argument after keyword argument".into(),
                    });
                }
                None => args.push(Argument::Positional(self.additive()?)),
            }

            let (token, position) = self.next()?;
            match token {
                Token::Comma => continue,
                Token::RParen => return Ok(args),
                other => {
                    return Err(ExpressionError::UnexpectedToken {
                        position,
                        found: other.describe(),
                    });
                }
            }
        }
    }
}

/// Names referenced as variables, in order of first appearance
pub(crate) fn collect_names(ast: &Ast, out: &mut Vec<String>) {
    match ast {
        Ast::Number(_) => {}
        Ast::Name(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Ast::Negate(inner) => collect_names(inner, out),
        Ast::Binary(_, lhs, rhs) => {
            collect_names(lhs, out);
            collect_names(rhs, out);
        }
        Ast::Call(_, args) => {
            for arg in args {
                match arg {
                    Argument::Positional(a) | Argument::Keyword(_, a) => collect_names(a, out),
                }
            }
        }
    }
}
