//! The Tarn lexer: source text to tokens.

use crate::error::LexerError;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

/// Scans source text into a token stream.
pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    column: usize,
    start_line: usize,
    start_column: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scan the whole source, returning every token plus a trailing `Eof`.
    pub fn scan_tokens(mut self) -> Result<Vec<Token>, LexerError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_column = self.column;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            Span::new(self.current, self.current, self.line, self.column),
        ));
        Ok(self.tokens)
    }

    fn scan_token(&mut self) -> Result<(), LexerError> {
        let c = self.advance();
        match c {
            ' ' | '\t' | '\r' | '\n' => {}

            '(' => self.push(TokenKind::LeftParen),
            ')' => self.push(TokenKind::RightParen),
            '{' => self.push(TokenKind::LeftBrace),
            '}' => self.push(TokenKind::RightBrace),
            '[' => self.push(TokenKind::LeftBracket),
            ']' => self.push(TokenKind::RightBracket),
            ',' => self.push(TokenKind::Comma),
            ':' => self.push(TokenKind::Colon),
            ';' => self.push(TokenKind::Semicolon),
            '+' => self.push(TokenKind::Plus),
            '-' => self.push(TokenKind::Minus),
            '*' => self.push(TokenKind::Star),
            '<' => self.push(TokenKind::Less),
            '>' => self.push(TokenKind::Greater),

            '/' => {
                if self.match_char('/') {
                    while !self.is_at_end() && self.peek() != '\n' {
                        self.advance();
                    }
                } else {
                    self.push(TokenKind::Slash);
                }
            }

            '=' => {
                if self.match_char('=') {
                    self.push(TokenKind::EqualEqual);
                } else {
                    self.push(TokenKind::Equal);
                }
            }

            '!' => {
                if self.match_char('=') {
                    self.push(TokenKind::BangEqual);
                } else {
                    self.push(TokenKind::Bang);
                }
            }

            '"' => self.string()?,

            _ if c.is_ascii_digit() => self.number()?,
            _ if c.is_ascii_alphabetic() || c == '_' => self.identifier(),

            _ => return Err(LexerError::UnexpectedChar(c, self.current_span())),
        }
        Ok(())
    }

    fn string(&mut self) -> Result<(), LexerError> {
        let mut value = String::new();

        loop {
            if self.is_at_end() {
                return Err(LexerError::UnterminatedString(self.current_span()));
            }
            match self.advance() {
                '"' => break,
                '\\' => {
                    if self.is_at_end() {
                        return Err(LexerError::UnterminatedString(self.current_span()));
                    }
                    let escaped = self.advance();
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        other => {
                            return Err(LexerError::InvalidEscape(other, self.current_span()))
                        }
                    }
                }
                other => value.push(other),
            }
        }

        self.push(TokenKind::StringLiteral(value));
        Ok(())
    }

    fn number(&mut self) -> Result<(), LexerError> {
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let value = text
            .parse::<i64>()
            .map_err(|_| LexerError::InvalidNumber(text.clone(), self.current_span()))?;
        self.push(TokenKind::IntLiteral(value));
        Ok(())
    }

    fn identifier(&mut self) {
        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == '_') {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        match TokenKind::keyword(&text) {
            Some(kind) => self.push(kind),
            None => self.push(TokenKind::Identifier(text)),
        }
    }

    // ===== Cursor helpers =====

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn peek(&self) -> char {
        self.source[self.current]
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.current_span()));
    }

    fn current_span(&self) -> Span {
        Span::new(self.start, self.current, self.start_line, self.start_column)
    }
}
