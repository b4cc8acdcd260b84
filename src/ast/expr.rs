//! Expression AST nodes.

use std::fmt;

use crate::ast::stmt::Stmt;
use crate::span::Span;

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal: 42
    IntLiteral(i64),
    /// String literal: "hello"
    StringLiteral(String),
    /// Boolean literal: true, false
    BoolLiteral(bool),

    /// Variable reference: foo
    Identifier(String),

    /// Prefix operation: -x, !x
    Prefix {
        operator: PrefixOp,
        operand: Box<Expr>,
    },

    /// Infix operation: a + b
    Infix {
        left: Box<Expr>,
        operator: InfixOp,
        right: Box<Expr>,
    },

    /// If expression: if (cond) { ... } else { ... }
    /// Evaluates to the last expression of the taken branch, or null.
    If {
        condition: Box<Expr>,
        consequence: Vec<Stmt>,
        alternative: Option<Vec<Stmt>>,
    },

    /// Function literal: fn(a, b) { ... }
    /// `name` is filled in by the parser when the literal is directly
    /// bound by a let statement, enabling self-recursive reference.
    Function {
        name: Option<String>,
        parameters: Vec<String>,
        body: Vec<Stmt>,
    },

    /// Function call: foo(a, b)
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },

    /// Index expression: arr[0], hash["key"]
    Index { object: Box<Expr>, index: Box<Expr> },

    /// Array literal: [1, 2, 3]
    Array(Vec<Expr>),

    /// Hash literal: {"key": "value", ...}
    Hash(Vec<(Expr, Expr)>),
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    Greater,
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfixOp::Add => write!(f, "+"),
            InfixOp::Subtract => write!(f, "-"),
            InfixOp::Multiply => write!(f, "*"),
            InfixOp::Divide => write!(f, "/"),
            InfixOp::Equal => write!(f, "=="),
            InfixOp::NotEqual => write!(f, "!="),
            InfixOp::Less => write!(f, "<"),
            InfixOp::Greater => write!(f, ">"),
        }
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Negate,
    Not,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOp::Negate => write!(f, "-"),
            PrefixOp::Not => write!(f, "!"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

// Compact source-like rendering, used for diagnostics and for the
// compiler's deterministic hash-key ordering.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::IntLiteral(n) => write!(f, "{}", n),
            ExprKind::StringLiteral(s) => write!(f, "\"{}\"", s),
            ExprKind::BoolLiteral(b) => write!(f, "{}", b),
            ExprKind::Identifier(name) => write!(f, "{}", name),
            ExprKind::Prefix { operator, operand } => write!(f, "({}{})", operator, operand),
            ExprKind::Infix {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if ({}) {{ ", condition)?;
                for stmt in consequence {
                    write!(f, "{} ", stmt)?;
                }
                write!(f, "}}")?;
                if let Some(alt) = alternative {
                    write!(f, " else {{ ")?;
                    for stmt in alt {
                        write!(f, "{} ", stmt)?;
                    }
                    write!(f, "}}")?;
                }
                Ok(())
            }
            ExprKind::Function {
                parameters, body, ..
            } => {
                write!(f, "fn({}) {{ ", parameters.join(", "))?;
                for stmt in body {
                    write!(f, "{} ", stmt)?;
                }
                write!(f, "}}")
            }
            ExprKind::Call { callee, arguments } => {
                write!(f, "{}(", callee)?;
                write_joined(f, arguments)?;
                write!(f, ")")
            }
            ExprKind::Index { object, index } => write!(f, "({}[{}])", object, index),
            ExprKind::Array(elements) => {
                write!(f, "[")?;
                write_joined(f, elements)?;
                write!(f, "]")
            }
            ExprKind::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}
