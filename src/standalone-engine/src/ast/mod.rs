// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Expression trees and statements of abstract (per-element) code.

use std::collections::BTreeSet;
use std::fmt;

use crate::data::Value;
use crate::dtype::DType;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    And,
    Or,
}

impl BinaryOp {
    /// precedence in C++ terms, higher binds tighter.  `Pow`, `FloorDiv`
    /// and `Mod` render as function calls, so they never need parens.
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Pow | BinaryOp::FloorDiv | BinaryOp::Mod => 16,
            BinaryOp::Mul | BinaryOp::Div => 13,
            BinaryOp::Add | BinaryOp::Sub => 12,
            BinaryOp::And => 5,
            BinaryOp::Or => 4,
        }
    }

    /// support_function names the C++ helper an operator lowers to when
    /// no native operator rounds and signs like Python's.
    pub fn support_function(&self) -> Option<&'static str> {
        match self {
            BinaryOp::FloorDiv => Some("_floordiv"),
            BinaryOp::Mod => Some("_mod"),
            _ => None,
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum UnaryOp {
    Positive,
    Negative,
    Not,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CmpOp {
    pub(crate) fn as_cpp(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Neq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
        }
    }

    pub(crate) fn precedence(&self) -> u8 {
        match self {
            CmpOp::Eq | CmpOp::Neq => 8,
            _ => 9,
        }
    }
}

/// Expr is an already-parsed abstract-code expression.  Comparison chains
/// (`a < b < c`) are kept as one node so they can be expanded into a
/// conjunction when rendered.
#[derive(PartialEq, Clone, Debug)]
pub enum Expr {
    Const(Value),
    Var(String),
    Call(String, Vec<Expr>),
    Op1(UnaryOp, Box<Expr>),
    Op2(BinaryOp, Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
}

impl Expr {
    pub fn var(name: &str) -> Expr {
        Expr::Var(name.to_owned())
    }

    pub fn float(n: f64) -> Expr {
        Expr::Const(Value::Float(n))
    }

    pub fn int(n: i64) -> Expr {
        Expr::Const(Value::Int(n))
    }

    pub fn op2(op: BinaryOp, l: Expr, r: Expr) -> Expr {
        Expr::Op2(op, Box::new(l), Box::new(r))
    }

    /// identifiers returns every variable name referenced by the
    /// expression, in order of first appearance.  Function names are not
    /// included.
    pub fn identifiers(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = vec![];
        self.visit(&mut |expr| {
            if let Expr::Var(id) = expr {
                if seen.insert(id.clone()) {
                    out.push(id.clone());
                }
            }
        });
        out
    }

    /// functions returns every called function name, in order of first
    /// appearance.  Operators that lower to a support function count as
    /// calls of it.
    pub fn functions(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = vec![];
        self.visit(&mut |expr| {
            let func = match expr {
                Expr::Call(func, _) => func.as_str(),
                Expr::Op2(op, _, _) => match op.support_function() {
                    Some(func) => func,
                    None => return,
                },
                _ => return,
            };
            if seen.insert(func.to_owned()) {
                out.push(func.to_owned());
            }
        });
        out
    }

    /// has_call is true when evaluating the expression calls a function.
    pub fn has_call(&self) -> bool {
        let mut found = false;
        self.visit(&mut |expr| {
            if let Expr::Call(_, _) = expr {
                found = true;
            }
        });
        found
    }

    fn visit<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        match self {
            Expr::Const(_) | Expr::Var(_) => {}
            Expr::Call(_, args) => {
                for arg in args {
                    arg.visit(f);
                }
            }
            Expr::Op1(_, r) => r.visit(f),
            Expr::Op2(_, l, r) => {
                l.visit(f);
                r.visit(f);
            }
            Expr::Compare(first, rest) => {
                first.visit(f);
                for (_, e) in rest {
                    e.visit(f);
                }
            }
        }
    }

    /// rename_functions returns a copy of the expression where calls to
    /// (and bare references of) functions listed in `renames` use the new
    /// name.  This is structural, so string and number literals are never
    /// touched.
    pub fn rename_functions<F>(&self, renames: &F) -> Expr
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            Expr::Const(_) => self.clone(),
            Expr::Var(id) => match renames(id) {
                Some(new_name) => Expr::Var(new_name),
                None => self.clone(),
            },
            Expr::Call(func, args) => {
                let func = renames(func).unwrap_or_else(|| func.clone());
                let args = args.iter().map(|a| a.rename_functions(renames)).collect();
                Expr::Call(func, args)
            }
            Expr::Op1(op, r) => Expr::Op1(*op, Box::new(r.rename_functions(renames))),
            Expr::Op2(op, l, r) => Expr::Op2(
                *op,
                Box::new(l.rename_functions(renames)),
                Box::new(r.rename_functions(renames)),
            ),
            Expr::Compare(first, rest) => Expr::Compare(
                Box::new(first.rename_functions(renames)),
                rest.iter()
                    .map(|(op, e)| (*op, e.rename_functions(renames)))
                    .collect(),
            ),
        }
    }
}

/// StatementOp distinguishes declarations of new locals (`:=`) from
/// updates of names that already exist in the unit's scope.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum StatementOp {
    Declare,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

impl StatementOp {
    /// in-place operators read their target before writing it.
    pub fn is_inplace(&self) -> bool {
        !matches!(self, StatementOp::Declare | StatementOp::Assign)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementOp::Declare => ":=",
            StatementOp::Assign => "=",
            StatementOp::AddAssign => "+=",
            StatementOp::SubAssign => "-=",
            StatementOp::MulAssign => "*=",
            StatementOp::DivAssign => "/=",
        }
    }

    pub fn from_symbol(op: &str) -> Option<StatementOp> {
        let op = match op {
            ":=" => StatementOp::Declare,
            "=" => StatementOp::Assign,
            "+=" => StatementOp::AddAssign,
            "-=" => StatementOp::SubAssign,
            "*=" => StatementOp::MulAssign,
            "/=" => StatementOp::DivAssign,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for StatementOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(PartialEq, Clone, Debug)]
pub struct Statement {
    pub var: String,
    pub op: StatementOp,
    pub expr: Expr,
    pub comment: String,
    /// element type of `var`, used when the statement declares it
    pub dtype: DType,
    pub scalar: bool,
    pub constant: bool,
    /// explicit guard; the write only happens when the guard is true
    pub conditional_write: Option<String>,
}

impl Statement {
    pub fn new(var: &str, op: StatementOp, expr: Expr, dtype: DType) -> Self {
        Statement {
            var: var.to_owned(),
            op,
            expr,
            comment: String::new(),
            dtype,
            scalar: false,
            constant: false,
            conditional_write: None,
        }
    }
}

#[test]
fn test_identifiers_in_order() {
    // v + dt * (-v / tau) + exp(v)
    let expr = Expr::op2(
        BinaryOp::Add,
        Expr::op2(
            BinaryOp::Add,
            Expr::var("v"),
            Expr::op2(
                BinaryOp::Mul,
                Expr::var("dt"),
                Expr::op2(
                    BinaryOp::Div,
                    Expr::Op1(UnaryOp::Negative, Box::new(Expr::var("v"))),
                    Expr::var("tau"),
                ),
            ),
        ),
        Expr::Call("exp".to_owned(), vec![Expr::var("v")]),
    );
    assert_eq!(vec!["v", "dt", "tau"], expr.identifiers());
    assert_eq!(vec!["exp"], expr.functions());
    assert!(expr.has_call());
}

#[test]
fn test_operator_support_functions() {
    let expr = Expr::op2(
        BinaryOp::Add,
        Expr::op2(BinaryOp::Mod, Expr::var("i"), Expr::var("N")),
        Expr::op2(BinaryOp::FloorDiv, Expr::var("i"), Expr::int(2)),
    );
    assert_eq!(vec!["_mod", "_floordiv"], expr.functions());
    assert_eq!(vec!["i", "N"], expr.identifiers());
    assert!(!expr.has_call());
}

#[test]
fn test_rename_functions() {
    let expr = Expr::op2(
        BinaryOp::Add,
        Expr::Call("abs".to_owned(), vec![Expr::var("abs_v")]),
        Expr::var("rand"),
    );
    let renamed = expr.rename_functions(&|name: &str| match name {
        "abs" => Some("fabs".to_owned()),
        "rand" => Some("_rand".to_owned()),
        _ => None,
    });
    let expected = Expr::op2(
        BinaryOp::Add,
        Expr::Call("fabs".to_owned(), vec![Expr::var("abs_v")]),
        Expr::var("_rand"),
    );
    assert_eq!(expected, renamed);
}

#[test]
fn test_statement_op_inplace() {
    assert!(!StatementOp::Declare.is_inplace());
    assert!(!StatementOp::Assign.is_inplace());
    assert!(StatementOp::AddAssign.is_inplace());
    assert_eq!(Some(StatementOp::DivAssign), StatementOp::from_symbol("/="));
    assert_eq!(None, StatementOp::from_symbol("**="));
}
