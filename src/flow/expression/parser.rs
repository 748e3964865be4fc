// SPDX-License-Identifier: MIT

//! Recursive-descent expression parser
//!
//! Precedence, lowest to highest:
//! `||`, `&&`, equality, comparison, additive, multiplicative, unary, primary.
//! Every binary level is left-associative.

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::lexer::{is_blocked, tokenize, Token, TokenKind, TokenValue};
use super::value::Value;
use crate::adk::error::ExprError;

/// Deepest AST the parser will build. Evaluation recurses over the tree, so
/// this also bounds the evaluator's stack use.
pub const MAX_DEPTH: usize = 128;

/// Parse an expression string into an AST
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_or()?;

    let rest = parser.peek();
    if rest.kind != TokenKind::Eof {
        return Err(unexpected(rest));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Nesting of the node being parsed
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends the stream with Eof, and Eof is never consumed
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    /// Go one level deeper, failing past [`MAX_DEPTH`]
    fn descend(&mut self, position: usize) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep { position });
        }
        Ok(())
    }

    /// Consume the next token if it is one of `symbols`
    fn match_op(&mut self, symbols: &[&str]) -> Option<BinaryOp> {
        let symbol = self.peek().op()?;
        if !symbols.contains(&symbol) {
            return None;
        }
        let op = BinaryOp::from_symbol(symbol);
        self.pos += 1;
        op
    }

    fn binary_level(
        &mut self,
        symbols: &[&str],
        next: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        // Each operator in a chain nests the left operand one level deeper
        let base = self.depth;
        let mut left = next(self)?;
        loop {
            let position = self.peek().position;
            let Some(op) = self.match_op(symbols) else {
                break;
            };
            self.descend(position)?;
            let right = next(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["||"], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["&&"], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["==", "!=", "===", "!=="], Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["<", ">", "<=", ">="], Self::parse_additive)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["+", "-"], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["*", "/", "%"], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek().op() {
            Some("!") => Some(UnaryOp::Not),
            Some("-") => Some(UnaryOp::Neg),
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_primary();
        };
        let position = self.advance().position;
        self.descend(position)?;
        let operand = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let token = self.advance();
        match (token.kind, token.value) {
            (TokenKind::Number, TokenValue::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            (TokenKind::String, TokenValue::Text(s)) => Ok(Expr::Literal(Value::String(s))),
            (TokenKind::Boolean, TokenValue::Bool(b)) => Ok(Expr::Literal(Value::Bool(b))),
            (TokenKind::Null, _) => Ok(Expr::Literal(Value::Null)),
            (TokenKind::Undefined, _) => Ok(Expr::Literal(Value::Undefined)),
            (TokenKind::LParen, _) => {
                self.descend(token.position)?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                if self.peek().kind != TokenKind::RParen {
                    return Err(ExprError::UnmatchedParen {
                        position: self.peek().position,
                    });
                }
                self.pos += 1;
                Ok(inner)
            }
            (TokenKind::Identifier, TokenValue::Text(root)) => self.parse_property_chain(root),
            (kind, value) => Err(unexpected(&Token {
                kind,
                value,
                raw: token.raw,
                position: token.position,
            })),
        }
    }

    fn parse_property_chain(&mut self, root: String) -> Result<Expr, ExprError> {
        let mut properties = Vec::new();
        while self.peek().is_op(".") {
            let dot = self.advance();
            let name = self.advance();
            let property = match name.kind {
                TokenKind::Identifier
                | TokenKind::Boolean
                | TokenKind::Null
                | TokenKind::Undefined => name.raw,
                _ => {
                    return Err(ExprError::ExpectedProperty {
                        position: dot.position,
                    })
                }
            };
            if is_blocked(&property) {
                return Err(ExprError::BlockedProperty(property));
            }
            properties.push(property);
        }
        Ok(Expr::Path { root, properties })
    }
}

fn unexpected(token: &Token) -> ExprError {
    let found = if token.kind == TokenKind::Eof {
        "end of input".to_string()
    } else {
        token.raw.clone()
    };
    ExprError::UnexpectedToken {
        found,
        position: token.position,
    }
}
