// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use crate::ast::{BinaryOp, CmpOp, Expr, UnaryOp};
use crate::codegen_err;
use crate::common::Result;
use crate::variables::{Entry, Namespace};

const ATOM_PRECEDENCE: u8 = 17;
const UNARY_PRECEDENCE: u8 = 15;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Const(_) | Expr::Var(_) | Expr::Call(_, _) => ATOM_PRECEDENCE,
        Expr::Op1(_, _) => UNARY_PRECEDENCE,
        Expr::Op2(op, _, _) => op.precedence(),
        // a single comparison renders as itself, a chain as a conjunction
        Expr::Compare(_, rest) if rest.len() == 1 => rest[0].0.precedence(),
        Expr::Compare(_, _) => BinaryOp::And.precedence(),
    }
}

fn renders_as_call(op: BinaryOp) -> bool {
    matches!(op, BinaryOp::Pow | BinaryOp::FloorDiv | BinaryOp::Mod)
}

fn child_needs_parens(parent: &Expr, child: &Expr, is_right: bool) -> bool {
    match parent {
        // no children so doesn't matter
        Expr::Const(_) | Expr::Var(_) => false,
        // children are comma separated, so no ambiguity possible
        Expr::Call(_, _) => false,
        // `- -x` would turn into a decrement
        Expr::Op1(_, _) => precedence(child) <= UNARY_PRECEDENCE,
        Expr::Op2(op, _, _) if renders_as_call(*op) => false,
        Expr::Op2(op, _, _) => {
            // if we have `3 * (2 + 3)`, the parent's precedence
            // is higher than the child and we need enclosing parens.
            // C++ is left associative, so `a - (b - c)` needs them
            // on the right even at equal precedence.
            if is_right {
                op.precedence() >= precedence(child)
            } else {
                op.precedence() > precedence(child)
            }
        }
        // operands of comparisons are never themselves comparisons
        // or boolean expressions in C++ without parens
        Expr::Compare(_, _) => precedence(child) <= CmpOp::Lt.precedence(),
    }
}

fn paren_if_necessary(parent: &Expr, child: &Expr, is_right: bool) -> String {
    let eqn = render(child);
    if child_needs_parens(parent, child, is_right) {
        format!("({eqn})")
    } else {
        eqn
    }
}

/// render turns an expression tree into C++ source.  Function names are
/// emitted as-is; see `translate_expression` for the renaming pass.
pub fn render(expr: &Expr) -> String {
    match expr {
        Expr::Const(n) => n.to_cpp_literal(),
        Expr::Var(id) => id.clone(),
        Expr::Call(func, args) => {
            let args: Vec<_> = args.iter().map(render).collect();
            format!("{}({})", func, args.join(", "))
        }
        Expr::Op1(op, l) => {
            let l = paren_if_necessary(expr, l, false);
            let op = match op {
                UnaryOp::Positive => "+",
                UnaryOp::Negative => "-",
                UnaryOp::Not => "!",
            };
            format!("{op}{l}")
        }
        Expr::Op2(op, l, r) => {
            let l_str = paren_if_necessary(expr, l, false);
            let r_str = paren_if_necessary(expr, r, true);
            if let Some(func) = op.support_function() {
                return format!("{func}({l_str}, {r_str})");
            }
            match op {
                BinaryOp::Pow => format!("pow({l_str}, {r_str})"),
                BinaryOp::FloorDiv | BinaryOp::Mod => unreachable!(),
                BinaryOp::Add => format!("{l_str} + {r_str}"),
                BinaryOp::Sub => format!("{l_str} - {r_str}"),
                BinaryOp::Mul => format!("{l_str} * {r_str}"),
                BinaryOp::Div => format!("{l_str} / {r_str}"),
                BinaryOp::And => format!("{l_str} && {r_str}"),
                BinaryOp::Or => format!("{l_str} || {r_str}"),
            }
        }
        Expr::Compare(first, rest) => {
            let mut operands = vec![paren_if_necessary(expr, first, false)];
            operands.extend(rest.iter().map(|(_, e)| paren_if_necessary(expr, e, true)));
            if rest.len() == 1 {
                return format!("{} {} {}", operands[0], rest[0].0.as_cpp(), operands[1]);
            }

            // every inner operand shows up in two comparisons; one that
            // calls a function is bound once so it is evaluated once
            let mut bindings = vec![];
            for (i, (_, e)) in rest[..rest.len() - 1].iter().enumerate() {
                if e.has_call() {
                    let temp = format!("_cmp_{i}");
                    bindings.push(format!("const auto {temp} = {};", render(e)));
                    operands[i + 1] = temp;
                }
            }
            let pairs: Vec<String> = rest
                .iter()
                .enumerate()
                .map(|(i, (op, _))| format!("({} {} {})", operands[i], op.as_cpp(), operands[i + 1]))
                .collect();
            let chain = pairs.join(" && ");
            if bindings.is_empty() {
                chain
            } else {
                format!("[&]{{ {} return {}; }}()", bindings.join(" "), chain)
            }
        }
    }
}

/// translate_expression renders `expr` as C++, replacing every function
/// the namespace binds with the name of its C++ implementation.
pub fn translate_expression(expr: &Expr, namespace: &Namespace) -> Result<String> {
    for func in expr.functions() {
        match namespace.get(&func) {
            Some(Entry::Function(f)) if f.cpp.is_some() => {}
            Some(Entry::Function(_)) => {
                return codegen_err!(
                    MissingImplementation,
                    format!("function {func} has no C++ implementation")
                );
            }
            _ => {
                return codegen_err!(
                    MissingImplementation,
                    format!("{func} is called but isn't a function")
                );
            }
        }
    }

    let renamed = expr.rename_functions(&|name: &str| {
        let f = namespace.get(name)?.as_function()?;
        let cpp_name = f.cpp_name()?;
        if cpp_name != name {
            Some(cpp_name.to_owned())
        } else {
            None
        }
    });

    Ok(render(&renamed))
}
