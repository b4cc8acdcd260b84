//! Operator precedence for Pratt parsing.

use crate::lexer::TokenKind;

/// Operator precedence levels (higher = tighter binding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None = 0,
    Equality = 1,   // == !=
    Comparison = 2, // < >
    Term = 3,       // + -
    Factor = 4,     // * /
    Unary = 5,      // ! -
    Call = 6,       // () []
    Primary = 7,
}

pub fn get_precedence(kind: &TokenKind) -> Precedence {
    match kind {
        TokenKind::EqualEqual | TokenKind::BangEqual => Precedence::Equality,
        TokenKind::Less | TokenKind::Greater => Precedence::Comparison,
        TokenKind::Plus | TokenKind::Minus => Precedence::Term,
        TokenKind::Star | TokenKind::Slash => Precedence::Factor,
        TokenKind::LeftParen | TokenKind::LeftBracket => Precedence::Call,
        _ => Precedence::None,
    }
}
