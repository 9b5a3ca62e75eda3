// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use super::*;

fn parse_ok(input: &str) -> Expr {
    parse(input).unwrap().unwrap()
}

fn var(name: &str) -> Expr {
    Expr::var(name)
}

fn neg(e: Expr) -> Expr {
    Expr::Op1(UnaryOp::Negative, Box::new(e))
}

// ============================================================================
// Atom parsing tests
// ============================================================================

#[test]
fn test_parse_number() {
    assert_eq!(Expr::int(42), parse_ok("42"));
    assert_eq!(Expr::float(2.75), parse_ok("2.75"));
    assert_eq!(Expr::float(1e-3), parse_ok("1e-3"));
    assert_eq!(Expr::float(0.5), parse_ok(".5"));
}

#[test]
fn test_parse_bools_and_specials() {
    assert_eq!(Expr::Const(Value::Bool(true)), parse_ok("True"));
    assert_eq!(Expr::Const(Value::Bool(false)), parse_ok("False"));
    assert_eq!(Expr::float(f64::INFINITY), parse_ok("inf"));
    assert!(matches!(parse_ok("nan"), Expr::Const(Value::Float(n)) if n.is_nan()));
}

#[test]
fn test_parse_empty() {
    assert_eq!(Ok(None), parse(""));
    assert_eq!(Ok(None), parse("   "));
}

// ============================================================================
// Precedence tests
// ============================================================================

#[test]
fn test_arithmetic_precedence() {
    // v + dt*(-v/tau)
    let expected = Expr::op2(
        BinaryOp::Add,
        var("v"),
        Expr::op2(
            BinaryOp::Mul,
            var("dt"),
            Expr::op2(BinaryOp::Div, neg(var("v")), var("tau")),
        ),
    );
    assert_eq!(expected, parse_ok("v + dt*(-v/tau)"));

    // left associativity
    let expected = Expr::op2(
        BinaryOp::Sub,
        Expr::op2(BinaryOp::Sub, var("a"), var("b")),
        var("c"),
    );
    assert_eq!(expected, parse_ok("a - b - c"));
}

#[test]
fn test_power_is_right_associative() {
    let expected = Expr::op2(
        BinaryOp::Pow,
        var("a"),
        Expr::op2(BinaryOp::Pow, var("b"), var("c")),
    );
    assert_eq!(expected, parse_ok("a ** b ** c"));
}

#[test]
fn test_power_binds_tighter_than_unary() {
    assert_eq!(
        neg(Expr::op2(BinaryOp::Pow, var("x"), Expr::int(2))),
        parse_ok("-x**2")
    );
    assert_eq!(
        Expr::op2(BinaryOp::Pow, var("x"), neg(Expr::int(2))),
        parse_ok("x**-2")
    );
}

#[test]
fn test_floor_div_and_mod() {
    let expected = Expr::op2(
        BinaryOp::Mod,
        Expr::op2(BinaryOp::FloorDiv, var("i"), Expr::int(3)),
        var("N"),
    );
    assert_eq!(expected, parse_ok("i // 3 % N"));
}

#[test]
fn test_comparison_chain() {
    let expected = Expr::Compare(
        Box::new(Expr::int(0)),
        vec![(CmpOp::Lte, var("i")), (CmpOp::Lt, var("N"))],
    );
    assert_eq!(expected, parse_ok("0 <= i < N"));
}

#[test]
fn test_boolean_precedence() {
    // not binds looser than comparison, and binds tighter than or
    let expected = Expr::op2(
        BinaryOp::Or,
        Expr::op2(
            BinaryOp::And,
            var("a"),
            Expr::Op1(
                UnaryOp::Not,
                Box::new(Expr::Compare(
                    Box::new(var("v")),
                    vec![(CmpOp::Gt, var("v_th"))],
                )),
            ),
        ),
        var("c"),
    );
    assert_eq!(expected, parse_ok("a and not v > v_th or c"));
}

#[test]
fn test_function_calls() {
    let expected = Expr::Call(
        "clip".to_owned(),
        vec![
            Expr::op2(BinaryOp::Add, var("w"), var("dw")),
            Expr::int(0),
            var("wmax"),
        ],
    );
    assert_eq!(expected, parse_ok("clip(w + dw, 0, wmax)"));
    assert_eq!(Expr::Call("rand".to_owned(), vec![]), parse_ok("rand()"));
    // trailing comma
    assert_eq!(
        Expr::Call("exp".to_owned(), vec![var("x")]),
        parse_ok("exp(x,)")
    );
}

// ============================================================================
// Error tests
// ============================================================================

#[test]
fn test_unclosed_paren() {
    let errs = parse("(a + b").unwrap_err();
    assert_eq!(1, errs.len());
    assert_eq!(ErrorCode::UnrecognizedEof, errs[0].code);
    assert_eq!(6, errs[0].start);
}

#[test]
fn test_extra_token() {
    let errs = parse("a b").unwrap_err();
    assert_eq!(ErrorCode::ExtraToken, errs[0].code);
    assert_eq!(2, errs[0].start);
    assert_eq!(3, errs[0].end);
}

#[test]
fn test_dangling_operator() {
    let errs = parse("a +").unwrap_err();
    assert_eq!(ErrorCode::UnrecognizedEof, errs[0].code);

    let errs = parse("a + * b").unwrap_err();
    assert_eq!(ErrorCode::UnrecognizedToken, errs[0].code);
    assert_eq!(4, errs[0].start);
}

#[test]
fn test_bad_number() {
    let errs = parse("1 + .").unwrap_err();
    assert_eq!(ErrorCode::ExpectedNumber, errs[0].code);
    assert_eq!(4, errs[0].start);
}

#[test]
fn test_lexer_errors_propagate() {
    let errs = parse("a = b").unwrap_err();
    assert_eq!(ErrorCode::UnrecognizedToken, errs[0].code);
    assert_eq!(2, errs[0].start);
}
