// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{BTreeMap, BTreeSet};

use super::CppCodeGenerator;
use crate::ast::{Statement, StatementOp};
use crate::codegen_err;
use crate::common::Result;
use crate::dtype::c_data_type;
use crate::variables::ArrayVariable;

/// ArrayUsage classifies the array variables a statement block touches.
/// Every list is ordered by first appearance in the block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArrayUsage {
    pub read: Vec<String>,
    pub write: Vec<String>,
    /// index arrays, read before everything else
    pub indices: Vec<String>,
    /// written variable -> guard variable
    pub conditional: BTreeMap<String, String>,
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_owned());
    }
}

impl CppCodeGenerator {
    fn array(&self, name: &str) -> Option<&ArrayVariable> {
        self.namespace.get(name).and_then(|entry| entry.as_array())
    }

    fn array_or_err(&self, name: &str) -> Result<&ArrayVariable> {
        match self.array(name) {
            Some(var) => Ok(var),
            None => codegen_err!(DoesNotExist, format!("{name} is not an array")),
        }
    }

    fn mark_read(&self, read: &mut Vec<String>, name: &str) {
        if self.array(name).is_some() {
            push_unique(read, name);
        }
    }

    /// arrays_helper derives which arrays a block reads and writes, which
    /// index arrays it needs and which of its writes are guarded.  Every
    /// guard has to be bound in the namespace.
    pub fn arrays_helper(&self, statements: &[Statement]) -> Result<ArrayUsage> {
        let mut read = vec![];
        let mut write = vec![];
        let mut conditional = BTreeMap::new();

        for stmt in statements {
            if stmt.op.is_inplace() {
                self.mark_read(&mut read, &stmt.var);
            }
            for id in stmt.expr.identifiers() {
                self.mark_read(&mut read, &id);
            }

            let guard = match self.array(&stmt.var) {
                Some(var) => {
                    push_unique(&mut write, &stmt.var);
                    let array_guard = var
                        .conditional_write
                        .as_ref()
                        .filter(|_| !self.override_conditional_write.contains(&stmt.var));
                    stmt.conditional_write.as_ref().or(array_guard)
                }
                None => stmt.conditional_write.as_ref(),
            };
            if let Some(guard) = guard {
                if !self.namespace.contains_key(guard) {
                    return codegen_err!(
                        DoesNotExist,
                        format!("{guard} guards writes to {} but isn't defined", stmt.var)
                    );
                }
                // a skipped write must store back the old value, so the
                // target is read as well as its guard
                self.mark_read(&mut read, guard);
                self.mark_read(&mut read, &stmt.var);
                conditional.insert(stmt.var.clone(), guard.clone());
            }
        }

        let mut indices = vec![];
        for name in read.iter().chain(write.iter()) {
            let index = self.index_of(name);
            if self.array(index).is_some() {
                push_unique(&mut indices, index);
            }
        }
        read.retain(|name| !indices.contains(name));

        Ok(ArrayUsage {
            read,
            write,
            indices,
            conditional,
        })
    }

    pub fn translate_statement(&self, stmt: &Statement) -> Result<String> {
        let (decl, op) = if stmt.op == StatementOp::Declare {
            let c_type = c_data_type(stmt.dtype)?;
            let decl = if stmt.constant {
                format!("const {c_type} ")
            } else {
                format!("{c_type} ")
            };
            (decl, "=")
        } else {
            (String::new(), stmt.op.as_str())
        };
        let expr = super::translate_expression(&stmt.expr, &self.namespace)?;
        let mut code = format!("{}{} {} {};", decl, stmt.var, op, expr);
        if !stmt.comment.is_empty() {
            code.push_str(" // ");
            code.push_str(&stmt.comment);
        }
        Ok(code)
    }

    pub fn translate_to_read_arrays(&self, usage: &ArrayUsage) -> Result<Vec<String>> {
        let mut lines = vec![];
        // index arrays first
        for name in usage.indices.iter().chain(usage.read.iter()) {
            let var = self.array_or_err(name)?;
            let qualifier = if usage.write.contains(name) { "" } else { "const " };
            lines.push(format!(
                "{}{} {} = {}[{}];",
                qualifier,
                c_data_type(var.dtype)?,
                name,
                var.pointer_name(),
                self.index_of(name)
            ));
        }
        Ok(lines)
    }

    pub fn translate_to_declarations(&self, usage: &ArrayUsage) -> Result<Vec<String>> {
        let mut lines = vec![];
        for name in usage.write.iter() {
            if usage.read.contains(name) || usage.indices.contains(name) {
                continue;
            }
            let var = self.array_or_err(name)?;
            lines.push(format!("{} {};", c_data_type(var.dtype)?, name));
        }
        Ok(lines)
    }

    pub fn translate_to_statements(
        &self,
        statements: &[Statement],
        usage: &ArrayUsage,
    ) -> Result<Vec<String>> {
        let mut lines = vec![];
        for stmt in statements {
            let line = self.translate_statement(stmt)?;
            match usage.conditional.get(&stmt.var) {
                Some(guard) => {
                    lines.push(format!("if({guard})"));
                    lines.push(format!("    {line}"));
                }
                None => lines.push(line),
            }
        }
        Ok(lines)
    }

    pub fn translate_to_write_arrays(&self, usage: &ArrayUsage) -> Result<Vec<String>> {
        let mut lines = vec![];
        for name in usage.write.iter() {
            let var = self.array_or_err(name)?;
            lines.push(format!(
                "{}[{}] = {};",
                var.pointer_name(),
                self.index_of(name),
                name
            ));
        }
        Ok(lines)
    }

    /// translate_one_statement_sequence compiles one block into its four
    /// phases: index and array reads, declarations of write-only arrays,
    /// the statements themselves and the write-back.
    pub fn translate_one_statement_sequence(&self, statements: &[Statement]) -> Result<Vec<String>> {
        let usage = self.arrays_helper(statements)?;
        let mut lines = self.translate_to_read_arrays(&usage)?;
        lines.extend(self.translate_to_declarations(&usage)?);
        lines.extend(self.translate_to_statements(statements, &usage)?);
        lines.extend(self.translate_to_write_arrays(&usage)?);
        Ok(lines)
    }

    /// check_targets rejects updates of names that are neither bound in
    /// the namespace nor declared earlier in the block.
    pub(super) fn check_targets(&self, block: &[Statement]) -> Result<()> {
        let mut declared = BTreeSet::new();
        // scalar statements are emitted before the vector loop
        let ordered = block
            .iter()
            .filter(|s| s.scalar)
            .chain(block.iter().filter(|s| !s.scalar));
        for stmt in ordered {
            if stmt.op == StatementOp::Declare {
                declared.insert(stmt.var.as_str());
            } else if !declared.contains(stmt.var.as_str())
                && !self.namespace.contains_key(&stmt.var)
            {
                return codegen_err!(
                    DoesNotExist,
                    format!("{} {} ... updates an undeclared name", stmt.var, stmt.op)
                );
            }
        }
        Ok(())
    }
}
