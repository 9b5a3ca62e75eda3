// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Substitution of build-time constants into generated C++.
//!
//! The source is scanned token by token so that a constant `N` replaces
//! the identifier `N` but never `_N`, `N_incoming`, `obj.N`, a string
//! or a comment mentioning it.

use std::collections::BTreeMap;

use crate::data::Value;
use crate::variables::Namespace;

/// frozen_values collects every namespace entry with a build-time value.
pub fn frozen_values(namespace: &Namespace) -> BTreeMap<String, Value> {
    namespace
        .iter()
        .filter_map(|(name, entry)| Some((name.clone(), entry.frozen_value()?)))
        .collect()
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

fn is_member_access(out: &str) -> bool {
    let out = out.trim_end();
    out.ends_with('.') || out.ends_with("->") || out.ends_with("::")
}

/// freeze replaces every free-standing identifier of `code` that has a
/// value in `values` by its C++ literal.
pub fn freeze(code: &str, values: &BTreeMap<String, Value>) -> String {
    if values.is_empty() {
        return code.to_owned();
    }

    let mut out = String::with_capacity(code.len());
    let bytes: Vec<char> = code.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        match c {
            '/' if bytes.get(i + 1) == Some(&'/') => {
                while i < bytes.len() && bytes[i] != '\n' {
                    i += 1;
                }
            }
            '/' if bytes.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == '*' && bytes.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            '"' | '\'' => {
                i += 1;
                while i < bytes.len() && bytes[i] != c {
                    if bytes[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
            }
            c if c.is_ascii_digit() => {
                // numeric literals like 1e5 or 0x1f contain letters
                i += 1;
                while i < bytes.len() {
                    let d = bytes[i];
                    let exponent_sign = (d == '+' || d == '-')
                        && matches!(bytes[i - 1], 'e' | 'E')
                        && !bytes[start..i].iter().any(|&b| b == 'x' || b == 'X');
                    if is_ident_continue(d) || d == '.' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
            }
            c if is_ident_start(c) => {
                while i < bytes.len() && is_ident_continue(bytes[i]) {
                    i += 1;
                }
                let ident: String = bytes[start..i].iter().collect();
                match values.get(&ident) {
                    Some(value) if !is_member_access(&out) => {
                        out.push_str(&value.to_cpp_literal());
                    }
                    _ => out.push_str(&ident),
                }
                continue;
            }
            _ => {
                i += 1;
            }
        }
        out.extend(&bytes[start..i]);
    }

    out
}
