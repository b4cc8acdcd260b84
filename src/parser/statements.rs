//! Statement parsing.

use crate::ast::{ExprKind, Stmt, StmtKind};
use crate::lexer::TokenKind;
use crate::parser::core::{ParseResult, Parser};
use crate::parser::precedence::Precedence;

impl Parser {
    pub(crate) fn statement(&mut self) -> ParseResult<Stmt> {
        // `{` in statement position is a hash literal, not a block; blocks
        // only appear as if/fn bodies.
        if self.check(&TokenKind::Let) {
            self.let_statement()
        } else if self.check(&TokenKind::Return) {
            self.return_statement()
        } else {
            self.expression_statement()
        }
    }

    fn let_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Let)?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Equal)?;

        let mut value = self.expression(Precedence::None)?;

        // A function literal bound directly by a let carries the binding's
        // name so its body can reference itself.
        if let ExprKind::Function {
            name: fn_name @ None,
            ..
        } = &mut value.kind
        {
            *fn_name = Some(name.clone());
        }

        self.match_token(&TokenKind::Semicolon);
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Let { name, value }, span))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Return)?;
        let value = self.expression(Precedence::None)?;
        self.match_token(&TokenKind::Semicolon);
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    /// Parse `{ statements }` and return the inner statements.
    pub(crate) fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression(Precedence::None)?;
        self.match_token(&TokenKind::Semicolon);
        let span = expr.span;
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }
}
