//! Parser tests.

use pretty_assertions::assert_eq;

use crate::ast::{Expr, ExprKind, InfixOp, PrefixOp, Program, StmtKind};
use crate::lexer::Scanner;
use crate::parser::Parser;

fn parse(source: &str) -> Program {
    let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
    Parser::new(tokens).parse().expect("parser error")
}

fn parse_expr(source: &str) -> Expr {
    let program = parse(source);
    assert_eq!(program.statements.len(), 1, "expected a single statement");
    match &program.statements[0].kind {
        StmtKind::Expression(expr) => expr.clone(),
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_let_statement() {
    let program = parse("let x = 5;");
    assert_eq!(program.statements.len(), 1);
    match &program.statements[0].kind {
        StmtKind::Let { name, value } => {
            assert_eq!(name, "x");
            assert_eq!(value.kind, ExprKind::IntLiteral(5));
        }
        other => panic!("expected let statement, got {:?}", other),
    }
}

#[test]
fn test_return_statement() {
    let program = parse("return 10;");
    match &program.statements[0].kind {
        StmtKind::Return(value) => assert_eq!(value.kind, ExprKind::IntLiteral(10)),
        other => panic!("expected return statement, got {:?}", other),
    }
}

#[test]
fn test_prefix_expressions() {
    let expr = parse_expr("!true");
    match expr.kind {
        ExprKind::Prefix { operator, operand } => {
            assert_eq!(operator, PrefixOp::Not);
            assert_eq!(operand.kind, ExprKind::BoolLiteral(true));
        }
        other => panic!("expected prefix, got {:?}", other),
    }

    let expr = parse_expr("-15");
    match expr.kind {
        ExprKind::Prefix { operator, operand } => {
            assert_eq!(operator, PrefixOp::Negate);
            assert_eq!(operand.kind, ExprKind::IntLiteral(15));
        }
        other => panic!("expected prefix, got {:?}", other),
    }
}

#[test]
fn test_infix_expression() {
    let expr = parse_expr("5 + 6");
    match expr.kind {
        ExprKind::Infix {
            left,
            operator,
            right,
        } => {
            assert_eq!(left.kind, ExprKind::IntLiteral(5));
            assert_eq!(operator, InfixOp::Add);
            assert_eq!(right.kind, ExprKind::IntLiteral(6));
        }
        other => panic!("expected infix, got {:?}", other),
    }
}

#[test]
fn test_operator_precedence() {
    // The Display rendering parenthesizes fully, making precedence visible.
    let cases = [
        ("-a * b", "((-a) * b)"),
        ("!-a", "(!(-a))"),
        ("a + b + c", "((a + b) + c)"),
        ("a + b * c", "(a + (b * c))"),
        ("3 + 4 * 5 == 3 * 1 + 4 * 5", "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))"),
        ("5 < 4 != 3 > 4", "((5 < 4) != (3 > 4))"),
        ("(5 + 5) * 2", "((5 + 5) * 2)"),
        ("a * [1, 2][1]", "(a * ([1, 2][1]))"),
        ("add(a + b, c)", "add((a + b), c)"),
    ];

    for (source, expected) in cases {
        assert_eq!(parse_expr(source).to_string(), expected, "source: {source}");
    }
}

#[test]
fn test_if_expression() {
    let expr = parse_expr("if (x < y) { x } else { y }");
    match expr.kind {
        ExprKind::If {
            condition,
            consequence,
            alternative,
        } => {
            assert_eq!(condition.to_string(), "(x < y)");
            assert_eq!(consequence.len(), 1);
            assert_eq!(alternative.expect("missing else").len(), 1);
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn test_function_literal() {
    let expr = parse_expr("fn(x, y) { x + y; }");
    match expr.kind {
        ExprKind::Function {
            name,
            parameters,
            body,
        } => {
            assert_eq!(name, None);
            assert_eq!(parameters, vec!["x".to_string(), "y".to_string()]);
            assert_eq!(body.len(), 1);
        }
        other => panic!("expected function literal, got {:?}", other),
    }
}

#[test]
fn test_let_names_function_literal() {
    let program = parse("let double = fn(x) { x * 2 };");
    match &program.statements[0].kind {
        StmtKind::Let { value, .. } => match &value.kind {
            ExprKind::Function { name, .. } => {
                assert_eq!(name.as_deref(), Some("double"));
            }
            other => panic!("expected function literal, got {:?}", other),
        },
        other => panic!("expected let statement, got {:?}", other),
    }
}

#[test]
fn test_call_expression() {
    let expr = parse_expr("add(1, 2 * 3, 4 + 5)");
    match expr.kind {
        ExprKind::Call { callee, arguments } => {
            assert_eq!(callee.kind, ExprKind::Identifier("add".to_string()));
            assert_eq!(arguments.len(), 3);
            assert_eq!(arguments[1].to_string(), "(2 * 3)");
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn test_array_and_index() {
    let expr = parse_expr("[1, 2 * 2, 3 + 3]");
    match expr.kind {
        ExprKind::Array(elements) => assert_eq!(elements.len(), 3),
        other => panic!("expected array, got {:?}", other),
    }

    let expr = parse_expr("myArray[1 + 1]");
    match expr.kind {
        ExprKind::Index { object, index } => {
            assert_eq!(object.kind, ExprKind::Identifier("myArray".to_string()));
            assert_eq!(index.to_string(), "(1 + 1)");
        }
        other => panic!("expected index, got {:?}", other),
    }
}

#[test]
fn test_hash_literal() {
    let expr = parse_expr(r#"{"one": 1, "two": 2}"#);
    match expr.kind {
        ExprKind::Hash(pairs) => {
            assert_eq!(pairs.len(), 2);
            assert_eq!(pairs[0].0.kind, ExprKind::StringLiteral("one".to_string()));
            assert_eq!(pairs[1].1.kind, ExprKind::IntLiteral(2));
        }
        other => panic!("expected hash, got {:?}", other),
    }
}

#[test]
fn test_empty_hash_in_statement_position() {
    let expr = parse_expr("{}");
    assert_eq!(expr.kind, ExprKind::Hash(Vec::new()));
}

#[test]
fn test_missing_paren_is_error() {
    let tokens = Scanner::new("if (x { 1 }").scan_tokens().unwrap();
    assert!(Parser::new(tokens).parse().is_err());
}
