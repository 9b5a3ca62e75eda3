// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Translation of abstract per-element statements into C++ source.
//!
//! A `CppCodeGenerator` works on the namespace of one code object.  It
//! compiles statement blocks into the four phases of a C++ loop body
//! (reads, declarations, computation, write-back) and then resolves the
//! keywords the code object's template needs: restrict pointers,
//! function support code and the optional denormal prelude.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ast::Statement;
use crate::common::Result;
use crate::variables::Namespace;

mod keywords;
mod render;
mod statements;

pub use self::keywords::Keywords;
pub use self::render::{render, translate_expression};
pub use self::statements::ArrayUsage;

/// index expression used for arrays that don't name one
pub const DEFAULT_INDEX: &str = "_idx";

/// Preferences for the generated C++.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// keyword declaring a pointer as not aliased, compiler-specific
    pub restrict_keyword: String,
    /// flush denormals to zero at the start of every code object; the
    /// code for this is gcc and x86 specific
    pub flush_denormals: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            restrict_keyword: "__restrict__".to_owned(),
            flush_denormals: false,
        }
    }
}

/// GeneratedCode is the result of translating all statement blocks of a
/// code object.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedCode {
    pub scalar_code: BTreeMap<String, Vec<String>>,
    pub vector_code: BTreeMap<String, Vec<String>>,
    pub keywords: Keywords,
}

pub struct CppCodeGenerator {
    pub(crate) namespace: Namespace,
    variable_indices: BTreeMap<String, String>,
    override_conditional_write: BTreeSet<String>,
    prefs: Preferences,
}

impl CppCodeGenerator {
    pub fn new(
        namespace: Namespace,
        variable_indices: BTreeMap<String, String>,
        prefs: Preferences,
    ) -> Self {
        CppCodeGenerator {
            namespace,
            variable_indices,
            override_conditional_write: BTreeSet::new(),
            prefs,
        }
    }

    /// with_override_conditional_write ignores the conditional-write
    /// guards of the given arrays, e.g. for resets that must apply to
    /// refractory elements too.
    pub fn with_override_conditional_write(mut self, names: BTreeSet<String>) -> Self {
        self.override_conditional_write = names;
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn into_namespace(self) -> Namespace {
        self.namespace
    }

    /// index_of is the index expression `name` is accessed with.
    pub fn index_of(&self, name: &str) -> &str {
        self.variable_indices
            .get(name)
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_INDEX)
    }

    /// translate_statement_sequence compiles every named block, split into
    /// its scalar and vector parts, and then resolves keywords.  Keyword
    /// resolution strips functions from the namespace, so it has to come
    /// last.
    pub fn translate_statement_sequence(
        &mut self,
        blocks: &BTreeMap<String, Vec<Statement>>,
    ) -> Result<GeneratedCode> {
        let mut scalar_code = BTreeMap::new();
        let mut vector_code = BTreeMap::new();
        for (name, block) in blocks {
            self.check_targets(block)?;
            let (scalar, vector): (Vec<Statement>, Vec<Statement>) =
                block.iter().cloned().partition(|stmt| stmt.scalar);
            scalar_code.insert(name.clone(), self.translate_one_statement_sequence(&scalar)?);
            vector_code.insert(name.clone(), self.translate_one_statement_sequence(&vector)?);
        }

        let keywords = self.determine_keywords()?;

        Ok(GeneratedCode {
            scalar_code,
            vector_code,
            keywords,
        })
    }
}
