// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeSet;

use super::CppCodeGenerator;
use crate::codegen_err;
use crate::common::Result;
use crate::dtype::c_data_type;
use crate::variables::Entry;

const DENORMALS_TO_ZERO_CODE: &str = "\
#define CSR_FLUSH_TO_ZERO         (1 << 15)
unsigned csr = __builtin_ia32_stmxcsr();
csr |= CSR_FLUSH_TO_ZERO;
__builtin_ia32_ldmxcsr(csr);";

/// Keywords are the per-code-object pieces of source that surround the
/// translated statements.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keywords {
    pub pointers: Vec<String>,
    pub support_code: Vec<String>,
    pub hashdefines: Vec<String>,
    pub denormals: Vec<String>,
}

fn code_lines(code: &str) -> impl Iterator<Item = String> + '_ {
    code.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim_end().to_owned())
}

impl CppCodeGenerator {
    fn denormals_to_zero_code(&self) -> &'static str {
        if self.prefs.flush_denormals {
            DENORMALS_TO_ZERO_CODE
        } else {
            ""
        }
    }

    /// determine_keywords declares a restricted pointer for every 1-D
    /// array and collects the code of every function the namespace binds.
    /// Functions are then removed from the namespace and replaced by the
    /// names their implementations bring along.
    pub fn determine_keywords(&mut self) -> Result<Keywords> {
        let restrict = if self.prefs.restrict_keyword.is_empty() {
            String::new()
        } else {
            format!("{} ", self.prefs.restrict_keyword)
        };

        // several local names may denote the same array, e.g. v_pre and
        // v_post of a group connected to itself
        let mut handled_pointers = BTreeSet::new();
        let mut pointers = vec![];
        for entry in self.namespace.values() {
            let var = match entry {
                Entry::Array(var) => var,
                _ => continue,
            };
            if var.shape.ndim() > 1 {
                continue;
            }
            let pointer_name = var.pointer_name();
            if !handled_pointers.insert(pointer_name.clone()) {
                continue;
            }
            pointers.push(format!(
                "{} * {}{} = {};",
                c_data_type(var.dtype)?,
                restrict,
                pointer_name,
                var.storage_name()
            ));
        }

        let mut support_code = vec![];
        let mut hashdefines = vec![];
        let mut functions = vec![];
        let mut seen_code = BTreeSet::new();
        for (name, entry) in self.namespace.iter() {
            let func = match entry {
                Entry::Function(func) => func,
                _ => continue,
            };
            let imp = match func.cpp.as_ref() {
                Some(imp) => imp,
                None => {
                    return codegen_err!(
                        MissingImplementation,
                        format!("function {name} has no C++ implementation")
                    );
                }
            };
            if seen_code.insert(imp.support_code.as_str()) {
                support_code.extend(code_lines(&imp.support_code));
            }
            if seen_code.insert(imp.hashdefine_code.as_str()) {
                hashdefines.extend(code_lines(&imp.hashdefine_code));
            }
            functions.push((name.clone(), imp.namespace.clone()));
        }

        for (name, namespace) in functions {
            self.namespace.remove(&name);
            self.namespace.extend(namespace);
        }

        Ok(Keywords {
            pointers,
            support_code,
            hashdefines,
            denormals: code_lines(self.denormals_to_zero_code()).collect(),
        })
    }
}
