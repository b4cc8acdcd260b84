//! Expression parsing (Pratt style).

use crate::ast::{Expr, ExprKind, InfixOp, PrefixOp};
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::parser::core::{ParseResult, Parser};
use crate::parser::precedence::{get_precedence, Precedence};

impl Parser {
    /// Parse an expression with at least the given binding power.
    pub(crate) fn expression(&mut self, precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.prefix()?;

        while !self.is_at_end() && precedence < get_precedence(&self.peek().kind) {
            left = self.infix(left)?;
        }

        Ok(left)
    }

    fn prefix(&mut self) -> ParseResult<Expr> {
        let token = self.advance();
        let span = token.span;

        match token.kind {
            TokenKind::IntLiteral(n) => Ok(Expr::new(ExprKind::IntLiteral(n), span)),
            TokenKind::StringLiteral(s) => Ok(Expr::new(ExprKind::StringLiteral(s), span)),
            TokenKind::BoolLiteral(b) => Ok(Expr::new(ExprKind::BoolLiteral(b), span)),
            TokenKind::Identifier(name) => Ok(Expr::new(ExprKind::Identifier(name), span)),

            TokenKind::Bang => self.prefix_op(PrefixOp::Not, span),
            TokenKind::Minus => self.prefix_op(PrefixOp::Negate, span),

            TokenKind::LeftParen => {
                let expr = self.expression(Precedence::None)?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }

            TokenKind::If => self.if_expression(span),
            TokenKind::Fn => self.function_literal(span),
            TokenKind::LeftBracket => self.array_literal(span),
            TokenKind::LeftBrace => self.hash_literal(span),

            other => Err(ParserError::NoPrefixRule(format!("{}", other), span)),
        }
    }

    fn prefix_op(&mut self, operator: PrefixOp, start: crate::span::Span) -> ParseResult<Expr> {
        let operand = self.expression(Precedence::Unary)?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Prefix {
                operator,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn infix(&mut self, left: Expr) -> ParseResult<Expr> {
        match self.peek().kind {
            TokenKind::LeftParen => self.call_expression(left),
            TokenKind::LeftBracket => self.index_expression(left),
            _ => self.binary_expression(left),
        }
    }

    fn binary_expression(&mut self, left: Expr) -> ParseResult<Expr> {
        let token = self.advance();
        let operator = match token.kind {
            TokenKind::Plus => InfixOp::Add,
            TokenKind::Minus => InfixOp::Subtract,
            TokenKind::Star => InfixOp::Multiply,
            TokenKind::Slash => InfixOp::Divide,
            TokenKind::EqualEqual => InfixOp::Equal,
            TokenKind::BangEqual => InfixOp::NotEqual,
            TokenKind::Less => InfixOp::Less,
            TokenKind::Greater => InfixOp::Greater,
            other => {
                return Err(ParserError::unexpected_token(
                    "infix operator",
                    format!("{}", other),
                    token.span,
                ))
            }
        };

        let precedence = get_precedence(&token.kind);
        let right = self.expression(precedence)?;
        let span = left.span.merge(right.span);
        Ok(Expr::new(
            ExprKind::Infix {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            span,
        ))
    }

    fn if_expression(&mut self, start: crate::span::Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.expression(Precedence::None)?;
        self.expect(&TokenKind::RightParen)?;

        let consequence = self.block()?;

        let alternative = if self.match_token(&TokenKind::Else) {
            Some(self.block()?)
        } else {
            None
        };

        let span = start.merge(self.previous_span());
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                consequence,
                alternative,
            },
            span,
        ))
    }

    fn function_literal(&mut self, start: crate::span::Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;

        let mut parameters = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                parameters.push(self.expect_identifier()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen)?;

        let body = self.block()?;
        let span = start.merge(self.previous_span());
        Ok(Expr::new(
            ExprKind::Function {
                name: None,
                parameters,
                body,
            },
            span,
        ))
    }

    fn call_expression(&mut self, callee: Expr) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;

        let mut arguments = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                arguments.push(self.expression(Precedence::None)?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen)?;

        let span = callee.span.merge(self.previous_span());
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
            span,
        ))
    }

    fn index_expression(&mut self, object: Expr) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftBracket)?;
        let index = self.expression(Precedence::None)?;
        self.expect(&TokenKind::RightBracket)?;

        let span = object.span.merge(self.previous_span());
        Ok(Expr::new(
            ExprKind::Index {
                object: Box::new(object),
                index: Box::new(index),
            },
            span,
        ))
    }

    fn array_literal(&mut self, start: crate::span::Span) -> ParseResult<Expr> {
        let mut elements = Vec::new();
        if !self.check(&TokenKind::RightBracket) {
            loop {
                elements.push(self.expression(Precedence::None)?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightBracket)?;

        let span = start.merge(self.previous_span());
        Ok(Expr::new(ExprKind::Array(elements), span))
    }

    fn hash_literal(&mut self, start: crate::span::Span) -> ParseResult<Expr> {
        let mut pairs = Vec::new();
        if !self.check(&TokenKind::RightBrace) {
            loop {
                let key = self.expression(Precedence::None)?;
                self.expect(&TokenKind::Colon)?;
                let value = self.expression(Precedence::None)?;
                pairs.push((key, value));
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightBrace)?;

        let span = start.merge(self.previous_span());
        Ok(Expr::new(ExprKind::Hash(pairs), span))
    }
}
