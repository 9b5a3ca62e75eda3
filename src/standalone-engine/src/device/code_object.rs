// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{BTreeMap, BTreeSet};

use super::freeze::{freeze, frozen_values};
use super::templates::{self, CONSTANTS_PLACEHOLDER, Template};
use crate::ast::Statement;
use crate::codegen::{CppCodeGenerator, GeneratedCode, Preferences};
use crate::common::{Result, is_c_identifier};
use crate::dtype::c_data_type;
use crate::variables::{ArrayShape, Entry, Namespace};
use crate::{codegen_err, device_err};

/// CodeObjectSpec describes one scheduled operation before translation.
#[derive(Clone, Debug, Default)]
pub struct CodeObjectSpec {
    pub name: String,
    pub template: Template,
    /// named statement blocks; each is translated and wrapped separately
    pub blocks: BTreeMap<String, Vec<Statement>>,
    pub namespace: Namespace,
    /// index expression per variable, `_idx` when absent
    pub variable_indices: BTreeMap<String, String>,
    pub override_conditional_write: BTreeSet<String>,
}

/// CodeObject is a translated unit, ready to be written out as
/// `code_objects/<name>.cpp` and `.h`.
#[derive(Clone, Debug)]
pub struct CodeObject {
    pub name: String,
    pub template: Template,
    pub code: GeneratedCode,
    /// the unit's namespace after function resolution
    pub namespace: Namespace,
}

impl CodeObject {
    pub fn generate(spec: CodeObjectSpec, prefs: &Preferences) -> Result<CodeObject> {
        if !is_c_identifier(&spec.name) {
            return codegen_err!(BadIdentifier, spec.name);
        }
        if spec.template == Template::VectorLoop && !spec.namespace.contains_key("N") {
            return codegen_err!(
                DoesNotExist,
                format!("{}: a vector loop needs the number of elements N", spec.name)
            );
        }

        let mut generator =
            CppCodeGenerator::new(spec.namespace, spec.variable_indices, prefs.clone())
                .with_override_conditional_write(spec.override_conditional_write);
        let code = generator.translate_statement_sequence(&spec.blocks)?;

        Ok(CodeObject {
            name: spec.name,
            template: spec.template,
            code,
            namespace: generator.into_namespace(),
        })
    }

    /// constants are the declarations of everything the unit reads that
    /// isn't a global: attributes of runtime objects, views of dynamic
    /// arrays, array lengths and non-frozen scalars.
    pub fn constants(&self) -> Result<Vec<String>> {
        let mut lines: Vec<String> = vec![];
        for (k, entry) in self.namespace.iter() {
            match entry {
                Entry::Attribute {
                    obj,
                    attribute,
                    dtype,
                } => {
                    lines.push(format!("const {} {k} = {obj}.{attribute}();", c_data_type(*dtype)?));
                }
                Entry::Array(var) => match var.shape {
                    ArrayShape::Fixed(n) => lines.push(format!("const int _num{k} = {n};")),
                    ArrayShape::Dynamic(_) => {
                        let container = var.container_name().unwrap_or_default();
                        lines.push(format!(
                            "{}* const {} = {container}.empty() ? 0 : &{container}[0];",
                            c_data_type(var.dtype)?,
                            var.storage_name()
                        ));
                        lines.push(format!("const int _num{k} = {container}.size();"));
                    }
                    ArrayShape::Dynamic2d(..) => {}
                },
                Entry::Constant { value, dtype, .. } if entry.frozen_value().is_none() => {
                    lines.push(format!(
                        "const {} {k} = {};",
                        c_data_type(*dtype)?,
                        value.to_cpp_literal()
                    ));
                }
                _ => {}
            }
        }

        // v_pre and v_post of the same array yield the same view
        let mut seen = BTreeSet::new();
        lines.retain(|line| seen.insert(line.clone()));
        Ok(lines)
    }

    /// source is the final text of `code_objects/<name>.cpp`.
    pub fn source(&self) -> Result<String> {
        let code = templates::code_object_cpp(&self.name, self.template, &self.code);
        let code = freeze(&code, &frozen_values(&self.namespace));

        let constants: String = self
            .constants()?
            .iter()
            .map(|line| format!("    {line}\n"))
            .collect();
        let placeholder = format!("    {CONSTANTS_PLACEHOLDER}\n");
        if !code.contains(&placeholder) {
            return device_err!(
                InvalidState,
                format!("{}: constants placeholder missing", self.name)
            );
        }
        Ok(code.replace(&placeholder, &constants))
    }

    pub fn header(&self) -> String {
        templates::code_object_h(&self.name)
    }
}
