// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;

use crate::common::Result;
use crate::device_err;

/// MainAction is one deferred step of program assembly.  The queue of
/// actions is replayed once, in order, when the project is emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MainAction {
    RunCodeObject(String),
    RunNetwork {
        network: String,
        lines: Vec<String>,
    },
    /// copy a whole static array into an array; dynamic containers are
    /// resized to the static array's length first
    SetByArray {
        array: String,
        static_array: String,
        resize: bool,
    },
    /// scatter the values of one static array into an array at the
    /// indices held by another
    SetArrayByArray {
        array: String,
        index_array: String,
        value_array: String,
    },
    InsertCode(String),
    StartRunFunc {
        name: String,
        include_in_parent: bool,
    },
    EndRunFunc {
        name: String,
    },
}

/// Program is the replayed queue: the body of `main` plus the bodies of
/// every subprocedure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    pub main_lines: Vec<String>,
    pub run_funcs: BTreeMap<String, Vec<String>>,
}

fn set_by_array_lines(array: &str, static_array: &str, resize: bool) -> Vec<String> {
    let mut lines = vec![];
    if resize {
        lines.push(format!("{array}.resize(_num_{static_array});"));
    }
    lines.extend([
        format!("for(int i=0; i<_num_{static_array}; i++)"),
        "{".to_owned(),
        format!("    {array}[i] = {static_array}[i];"),
        "}".to_owned(),
    ]);
    lines
}

fn set_array_by_array_lines(array: &str, index_array: &str, value_array: &str) -> Vec<String> {
    vec![
        format!("for(int i=0; i<_num_{index_array}; i++)"),
        "{".to_owned(),
        format!("    {array}[{index_array}[i]] = {value_array}[i];"),
        "}".to_owned(),
    ]
}

/// replay turns the action queue into program text.  Subprocedures nest
/// strictly: actions queued after an inner subprocedure closes belong to
/// the enclosing one again.
pub fn replay(queue: &[MainAction]) -> Result<Program> {
    // bottom of the stack is main itself
    let mut scopes: Vec<(String, Vec<String>)> = vec![(String::new(), vec![])];
    let mut run_funcs = BTreeMap::new();

    for action in queue {
        let (_, lines) = match scopes.last_mut() {
            Some(scope) => scope,
            None => return device_err!(UnbalancedScope),
        };
        match action {
            MainAction::RunCodeObject(name) => lines.push(format!("_run_{name}();")),
            MainAction::RunNetwork { lines: net, .. } => lines.extend(net.iter().cloned()),
            MainAction::SetByArray {
                array,
                static_array,
                resize,
            } => lines.extend(set_by_array_lines(array, static_array, *resize)),
            MainAction::SetArrayByArray {
                array,
                index_array,
                value_array,
            } => lines.extend(set_array_by_array_lines(array, index_array, value_array)),
            MainAction::InsertCode(code) => lines.extend(code.lines().map(|l| l.to_owned())),
            MainAction::StartRunFunc {
                name,
                include_in_parent,
            } => {
                if *include_in_parent {
                    lines.push(format!("{name}();"));
                }
                scopes.push((name.clone(), vec![]));
            }
            MainAction::EndRunFunc { name } => {
                if scopes.len() < 2 {
                    return device_err!(
                        UnbalancedScope,
                        format!("subprocedure {name} ended but never started")
                    );
                }
                let (open, lines) = scopes.pop().unwrap_or_default();
                if open != *name {
                    return device_err!(
                        UnbalancedScope,
                        format!("subprocedure {name} ended while {open} is open")
                    );
                }
                run_funcs.insert(open, lines);
            }
        }
    }

    if scopes.len() != 1 {
        let open: Vec<&str> = scopes[1..].iter().map(|(name, _)| name.as_str()).collect();
        return device_err!(
            UnbalancedScope,
            format!("subprocedures never ended: {}", open.join(", "))
        );
    }
    let main_lines = scopes.pop().map(|(_, lines)| lines).unwrap_or_default();

    Ok(Program {
        main_lines,
        run_funcs,
    })
}
