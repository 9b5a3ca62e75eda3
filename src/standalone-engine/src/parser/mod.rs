// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Hand-written recursive descent parser for abstract-code expressions.
//!
//! The grammar follows Python's expression precedence: `or` < `and` <
//! `not` < comparisons < `+ -` < `* / // %` < unary `+ -` < `**` (right
//! associative) < calls and atoms.  Comparisons chain, so `a < b < c` is
//! one node.

use crate::ast::{BinaryOp, CmpOp, Expr, UnaryOp};
use crate::common::{EquationError, ErrorCode};
use crate::data::Value;
use crate::lexer::{Lexer, Spanned, Token};

#[cfg(test)]
mod tests;

/// TokenKind discriminant for efficient peek comparisons without payload matching
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Eq,
    Neq,
    Not,
    And,
    Or,
    True,
    False,
    Inf,
    Nan,
    Lt,
    Lte,
    Gt,
    Gte,
    Plus,
    Minus,
    Mul,
    Pow,
    Div,
    FloorDiv,
    Percent,
    LParen,
    RParen,
    Comma,
    Ident,
    Num,
}

impl<'a> From<&Token<'a>> for TokenKind {
    fn from(token: &Token<'a>) -> Self {
        match token {
            Token::Eq => TokenKind::Eq,
            Token::Neq => TokenKind::Neq,
            Token::Not => TokenKind::Not,
            Token::And => TokenKind::And,
            Token::Or => TokenKind::Or,
            Token::True => TokenKind::True,
            Token::False => TokenKind::False,
            Token::Inf => TokenKind::Inf,
            Token::Nan => TokenKind::Nan,
            Token::Lt => TokenKind::Lt,
            Token::Lte => TokenKind::Lte,
            Token::Gt => TokenKind::Gt,
            Token::Gte => TokenKind::Gte,
            Token::Plus => TokenKind::Plus,
            Token::Minus => TokenKind::Minus,
            Token::Mul => TokenKind::Mul,
            Token::Pow => TokenKind::Pow,
            Token::Div => TokenKind::Div,
            Token::FloorDiv => TokenKind::FloorDiv,
            Token::Percent => TokenKind::Percent,
            Token::LParen => TokenKind::LParen,
            Token::RParen => TokenKind::RParen,
            Token::Comma => TokenKind::Comma,
            Token::Ident(_) => TokenKind::Ident,
            Token::Num(_) => TokenKind::Num,
        }
    }
}

/// Parser state holding tokenized input
struct Parser<'input> {
    tokens: Vec<Spanned<Token<'input>>>,
    pos: usize,
}

impl<'input> Parser<'input> {
    /// Create a new parser from a lexer, collecting all tokens up front.
    /// Returns an error if the lexer produces any errors.
    fn new(lexer: Lexer<'input>) -> Result<Self, EquationError> {
        let mut tokens = Vec::new();
        for result in lexer {
            tokens.push(result?);
        }
        Ok(Parser { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|(_, tok, _)| TokenKind::from(tok))
    }

    /// Advance to the next token and return the consumed token
    fn advance(&mut self) -> Option<Spanned<Token<'input>>> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// error for the current token, or for running out of input
    fn unexpected(&self) -> EquationError {
        if let Some((start, _, end)) = self.peek() {
            EquationError {
                start: *start as u16,
                end: *end as u16,
                code: ErrorCode::UnrecognizedToken,
            }
        } else {
            let pos = self.eof_position();
            EquationError {
                start: pos as u16,
                end: (pos + 1) as u16,
                code: ErrorCode::UnrecognizedEof,
            }
        }
    }

    /// Expect the current token to match the expected kind, returning an error if not
    fn expect(&mut self, expected: TokenKind) -> Result<Spanned<Token<'input>>, EquationError> {
        if self.peek_kind() == Some(expected) {
            self.advance().ok_or_else(|| self.unexpected())
        } else {
            Err(self.unexpected())
        }
    }

    fn eof_position(&self) -> usize {
        if let Some((_, _, end)) = self.tokens.last() {
            *end
        } else {
            0
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Parse an expression from the token stream.
    /// Returns Ok(None) for empty input.
    fn parse_equation(&mut self) -> Result<Option<Expr>, EquationError> {
        if self.is_at_end() {
            return Ok(None);
        }

        let expr = self.parse_or()?;

        if let Some((start, _, end)) = self.peek() {
            return Err(EquationError {
                start: *start as u16,
                end: *end as u16,
                code: ErrorCode::ExtraToken,
            });
        }

        Ok(Some(expr))
    }

    fn parse_or(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_and()?;

        while self.peek_kind() == Some(TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::op2(BinaryOp::Or, left, right);
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_not()?;

        while self.peek_kind() == Some(TokenKind::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::op2(BinaryOp::And, left, right);
        }

        Ok(left)
    }

    /// `not` binds looser than comparisons: `not a < b` is `not (a < b)`
    fn parse_not(&mut self) -> Result<Expr, EquationError> {
        if self.peek_kind() == Some(TokenKind::Not) {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Op1(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    /// Parse a (possibly chained) comparison
    fn parse_comparison(&mut self) -> Result<Expr, EquationError> {
        let first = self.parse_additive()?;
        let mut rest = vec![];

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Lt) => CmpOp::Lt,
                Some(TokenKind::Lte) => CmpOp::Lte,
                Some(TokenKind::Gt) => CmpOp::Gt,
                Some(TokenKind::Gte) => CmpOp::Gte,
                Some(TokenKind::Eq) => CmpOp::Eq,
                Some(TokenKind::Neq) => CmpOp::Neq,
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_additive()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::op2(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Mul) => BinaryOp::Mul,
                Some(TokenKind::Div) => BinaryOp::Div,
                Some(TokenKind::FloorDiv) => BinaryOp::FloorDiv,
                Some(TokenKind::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::op2(op, left, right);
        }

        Ok(left)
    }

    /// Parse unary `+` and `-`; these bind looser than `**`
    fn parse_unary(&mut self) -> Result<Expr, EquationError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Plus) => UnaryOp::Positive,
            Some(TokenKind::Minus) => UnaryOp::Negative,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Op1(op, Box::new(operand)))
    }

    /// Parse `**`, which is right associative and whose exponent may
    /// carry a sign (`x**-2`)
    fn parse_power(&mut self) -> Result<Expr, EquationError> {
        let base = self.parse_app()?;

        if self.peek_kind() == Some(TokenKind::Pow) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Expr::op2(BinaryOp::Pow, base, exponent));
        }

        Ok(base)
    }

    /// Parse function application: id(args)
    fn parse_app(&mut self) -> Result<Expr, EquationError> {
        if self.peek_kind() == Some(TokenKind::Ident)
            && self.pos + 1 < self.tokens.len()
            && TokenKind::from(&self.tokens[self.pos + 1].1) == TokenKind::LParen
        {
            let name = match self.advance() {
                Some((_, Token::Ident(s), _)) => s.to_owned(),
                _ => unreachable!(),
            };

            self.advance(); // consume '('
            let args = self.parse_comma_separated_exprs()?;
            self.expect(TokenKind::RParen)?;

            return Ok(Expr::Call(name, args));
        }

        self.parse_atom()
    }

    /// Parse an atomic expression (number, identifier, parenthesized expression)
    fn parse_atom(&mut self) -> Result<Expr, EquationError> {
        let (lpos, tok, rpos) = match self.peek() {
            Some(spanned) => *spanned,
            None => return Err(self.unexpected()),
        };
        let expr = match tok {
            Token::Num(s) => parse_number(s).ok_or(EquationError {
                start: lpos as u16,
                end: rpos as u16,
                code: ErrorCode::ExpectedNumber,
            })?,
            Token::True => Expr::Const(Value::Bool(true)),
            Token::False => Expr::Const(Value::Bool(false)),
            Token::Inf => Expr::Const(Value::Float(f64::INFINITY)),
            Token::Nan => Expr::Const(Value::Float(f64::NAN)),
            Token::Ident(s) => Expr::Var(s.to_owned()),
            Token::LParen => {
                self.advance(); // consume '('
                let expr = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                return Ok(expr);
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }

    /// Parse comma-separated expressions (for function arguments)
    fn parse_comma_separated_exprs(&mut self) -> Result<Vec<Expr>, EquationError> {
        let mut exprs = Vec::new();

        if self.peek_kind() == Some(TokenKind::RParen) {
            return Ok(exprs);
        }

        exprs.push(self.parse_or()?);

        while self.peek_kind() == Some(TokenKind::Comma) {
            self.advance(); // consume ','

            // Handle trailing comma
            if self.peek_kind() == Some(TokenKind::RParen) {
                break;
            }

            exprs.push(self.parse_or()?);
        }

        Ok(exprs)
    }
}

/// integer literals stay integers so `int` targets don't get a
/// spurious `.0`
fn parse_number(s: &str) -> Option<Expr> {
    let is_float = s.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(n) = s.parse::<i64>() {
            return Some(Expr::Const(Value::Int(n)));
        }
    }
    s.parse::<f64>().ok().map(|n| Expr::Const(Value::Float(n)))
}

/// Parse an abstract-code expression string into an AST.
///
/// Returns:
/// - `Ok(Some(expr))` for valid expressions
/// - `Ok(None)` for empty input
/// - `Err(error)` for parse errors
pub fn parse(input: &str) -> Result<Option<Expr>, Vec<EquationError>> {
    let lexer = Lexer::new(input);
    let mut parser = match Parser::new(lexer) {
        Ok(p) => p,
        Err(e) => return Err(vec![e]),
    };

    parser.parse_equation().map_err(|e| vec![e])
}
