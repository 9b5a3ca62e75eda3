// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! JSON description of a whole build session.
//!
//! A project lists arrays, clocks, functions and code objects (with
//! their statements as abstract-code strings) plus the ordered actions
//! that make up the program.  `Project::into_device` replays it into a
//! `Device`, ready to be emitted.
//!
//! # Example
//! ```no_run
//! use standalone_engine::json;
//!
//! let project = json::Project::from_str(r#"{"arrays": []}"#)?;
//! let mut device = project.into_device()?;
//! device.build(&project.build)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ast::{Statement, StatementOp};
use crate::codegen::{DEFAULT_INDEX, Preferences};
use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::data::{ArrayData, Value};
use crate::device::{
    BuildOptions, CodeObjectSpec, DEFAULT_REPORT_PERIOD, Device, ReportMode, Selector, Template,
};
use crate::dtype::DType;
use crate::import_err;
use crate::parser::parse;
use crate::variables::{ArrayShape, ArrayVariable, Entry, Function, FunctionImplementation, Namespace};

fn is_false(val: &bool) -> bool {
    !*val
}

fn is_true(val: &bool) -> bool {
    *val
}

fn default_true() -> bool {
    true
}

fn is_empty_string(val: &str) -> bool {
    val.is_empty()
}

fn is_empty_vec<T>(val: &[T]) -> bool {
    val.is_empty()
}

fn is_empty_map<K, V>(val: &BTreeMap<K, V>) -> bool {
    val.is_empty()
}

fn default_network() -> String {
    "net".to_owned()
}

fn default_index() -> String {
    DEFAULT_INDEX.to_owned()
}

fn default_slot() -> String {
    "main".to_owned()
}

fn default_report_period() -> f64 {
    DEFAULT_REPORT_PERIOD
}

/// JsonValue is a scalar as JSON spells it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Value {
        match value {
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Int(n) => Value::Int(n),
            JsonValue::Float(n) => Value::Float(n),
        }
    }
}

impl JsonValue {
    fn dtype(self) -> DType {
        match self {
            JsonValue::Bool(_) => DType::Bool,
            JsonValue::Int(_) => DType::DefaultInt,
            JsonValue::Float(_) => DType::Float64,
        }
    }
}

fn to_values(values: &[JsonValue]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    #[default]
    Fixed,
    Dynamic,
    Dynamic2d,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayInit {
    Zeros,
    Arange(i64),
    Values(Vec<JsonValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array {
    pub owner: String,
    pub name: String,
    pub dtype: DType,
    #[serde(default)]
    pub shape: Shape,
    /// length, or rows of a 2-D array
    #[serde(default)]
    pub size: usize,
    #[serde(skip_serializing_if = "is_zero_usize", default)]
    pub columns: usize,
    #[serde(skip_serializing_if = "is_false", default)]
    pub constant: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub conditional_write: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub init: Option<ArrayInit>,
}

fn is_zero_usize(val: &usize) -> bool {
    *val == 0
}

impl Array {
    pub fn variable(&self) -> ArrayVariable {
        let shape = match self.shape {
            Shape::Fixed => ArrayShape::Fixed(self.size),
            Shape::Dynamic => ArrayShape::Dynamic(self.size),
            Shape::Dynamic2d => ArrayShape::Dynamic2d(self.size, self.columns),
        };
        let mut var = ArrayVariable::new(&self.owner, &self.name, self.dtype, shape);
        var.constant = self.constant;
        var.read_only = self.read_only || self.constant;
        var.conditional_write = self.conditional_write.clone();
        var
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    pub name: String,
    pub dt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub value: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dtype: Option<DType>,
    /// constants are frozen into the generated code unless marked
    /// otherwise
    #[serde(skip_serializing_if = "is_true", default = "default_true")]
    pub constant: bool,
}

impl Constant {
    fn entry(&self) -> Entry {
        Entry::Constant {
            value: self.value.into(),
            dtype: self.dtype.unwrap_or_else(|| self.value.dtype()),
            constant: self.constant,
            read_only: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub obj: String,
    pub attribute: String,
    pub dtype: DType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValues {
    pub dtype: DType,
    pub values: Vec<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cpp_name: Option<String>,
    #[serde(skip_serializing_if = "is_empty_string", default)]
    pub support_code: String,
    #[serde(skip_serializing_if = "is_empty_string", default)]
    pub hashdefine_code: String,
    /// scalars the implementation refers to
    #[serde(skip_serializing_if = "is_empty_map", default)]
    pub values: BTreeMap<String, JsonValue>,
    /// tables the implementation refers to
    #[serde(skip_serializing_if = "is_empty_map", default)]
    pub arrays: BTreeMap<String, TypedValues>,
}

impl FunctionDef {
    fn function(&self) -> Result<Function> {
        let mut namespace = BTreeMap::new();
        for (name, value) in self.values.iter() {
            namespace.insert(name.clone(), Entry::Value((*value).into()));
        }
        for (name, table) in self.arrays.iter() {
            let data = ArrayData::from_values(table.dtype, &to_values(&table.values))?;
            namespace.insert(name.clone(), Entry::StaticData(data));
        }
        Ok(Function {
            name: self.name.clone(),
            cpp: Some(FunctionImplementation {
                name: self.cpp_name.clone(),
                support_code: self.support_code.clone(),
                hashdefine_code: self.hashdefine_code.clone(),
                namespace,
            }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementDef {
    pub var: String,
    pub op: String,
    pub expr: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dtype: Option<DType>,
    #[serde(skip_serializing_if = "is_empty_string", default)]
    pub comment: String,
    #[serde(skip_serializing_if = "is_false", default)]
    pub scalar: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub constant: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub conditional_write: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeObjectDef {
    pub name: String,
    #[serde(default)]
    pub template: Template,
    /// local name to `owner.name` of a registered array
    #[serde(skip_serializing_if = "is_empty_map", default)]
    pub arrays: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "is_empty_map", default)]
    pub indices: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "is_empty_map", default)]
    pub constants: BTreeMap<String, Constant>,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub override_conditional_write: Vec<String>,
    pub statements: Vec<StatementDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub clock: String,
    pub code_object: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stop: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub step: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    RunCodeObject {
        name: String,
    },
    NetworkRun {
        #[serde(default = "default_network")]
        network: String,
        schedule: Vec<ScheduleEntry>,
        duration: f64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        report: Option<String>,
        #[serde(default = "default_report_period")]
        report_period: f64,
    },
    /// assign to all of an array, or the elements a selector picks
    Set {
        array: String,
        #[serde(default = "default_index")]
        index: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        indices: Option<Vec<i64>>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        slice: Option<Slice>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        condition: Option<String>,
        values: Vec<JsonValue>,
    },
    InsertCode {
        #[serde(default = "default_slot")]
        slot: String,
        code: String,
    },
    Subprocedure {
        name: String,
        #[serde(default = "default_true")]
        call_in_parent: bool,
        actions: Vec<Action>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub preferences: Preferences,
    pub build: BuildOptions,
    #[serde(skip_serializing_if = "is_empty_vec")]
    pub clocks: Vec<Clock>,
    #[serde(skip_serializing_if = "is_empty_vec")]
    pub arrays: Vec<Array>,
    /// constants every code object can refer to
    #[serde(skip_serializing_if = "is_empty_map")]
    pub constants: BTreeMap<String, Constant>,
    #[serde(skip_serializing_if = "is_empty_map")]
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(skip_serializing_if = "is_empty_vec")]
    pub functions: Vec<FunctionDef>,
    #[serde(skip_serializing_if = "is_empty_vec")]
    pub code_objects: Vec<CodeObjectDef>,
    #[serde(skip_serializing_if = "is_empty_vec")]
    pub actions: Vec<Action>,
}

fn bad_project<T>(details: String) -> Result<T> {
    import_err!(BadProject, details)
}

fn parse_statement(co: &str, stmt: &StatementDef) -> Result<Statement> {
    let op = match StatementOp::from_symbol(&stmt.op) {
        Some(op) => op,
        None => return bad_project(format!("{co}: unknown operator {} for {}", stmt.op, stmt.var)),
    };
    let expr = match parse(&stmt.expr) {
        Ok(Some(expr)) => expr,
        Ok(None) => return bad_project(format!("{co}: {} has an empty expression", stmt.var)),
        Err(errs) => {
            let errs: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
            return bad_project(format!(
                "{co}: can't parse \"{}\": {}",
                stmt.expr,
                errs.join(", ")
            ));
        }
    };
    let mut statement = Statement::new(&stmt.var, op, expr, stmt.dtype.unwrap_or(DType::Float64));
    statement.comment = stmt.comment.clone();
    statement.scalar = stmt.scalar;
    statement.constant = stmt.constant;
    statement.conditional_write = stmt.conditional_write.clone();
    Ok(statement)
}

impl Project {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Project> {
        serde_json::from_str(json).map_err(|err| {
            Error::new(ErrorKind::Import, ErrorCode::BadProject, Some(err.to_string()))
        })
    }

    fn find_array(&self, device: &Device, reference: &str) -> Result<ArrayVariable> {
        let found = reference
            .split_once('.')
            .and_then(|(owner, name)| device.array(owner, name));
        match found {
            Some(var) => Ok(var.clone()),
            None => bad_project(format!("unknown array {reference}")),
        }
    }

    fn code_object_spec(&self, device: &Device, def: &CodeObjectDef) -> Result<CodeObjectSpec> {
        let mut statements = Vec::with_capacity(def.statements.len());
        for stmt in def.statements.iter() {
            statements.push(parse_statement(&def.name, stmt)?);
        }

        // only bind the names the statements use, plus the element count
        let mut used: BTreeSet<String> = BTreeSet::new();
        used.insert("N".to_owned());
        for stmt in statements.iter() {
            used.insert(stmt.var.clone());
            used.extend(stmt.expr.identifiers());
            if let Some(guard) = stmt.conditional_write.as_ref() {
                used.insert(guard.clone());
            }
        }

        let mut namespace = Namespace::new();
        for (local, reference) in def.arrays.iter() {
            let var = self.find_array(device, reference)?;
            if let Some(guard) = var.conditional_write.as_ref() {
                used.insert(guard.clone());
            }
            namespace.insert(local.clone(), Entry::Array(var));
        }
        for name in used.iter() {
            if namespace.contains_key(name) {
                continue;
            }
            if let Some(constant) = def.constants.get(name).or_else(|| self.constants.get(name)) {
                namespace.insert(name.clone(), constant.entry());
            } else if let Some(attr) = self.attributes.get(name) {
                namespace.insert(
                    name.clone(),
                    Entry::Attribute {
                        obj: attr.obj.clone(),
                        attribute: attr.attribute.clone(),
                        dtype: attr.dtype,
                    },
                );
            }
        }

        let mut blocks = BTreeMap::new();
        blocks.insert(String::new(), statements);
        Ok(CodeObjectSpec {
            name: def.name.clone(),
            template: def.template,
            blocks,
            namespace,
            variable_indices: def.indices.clone(),
            override_conditional_write: def.override_conditional_write.iter().cloned().collect(),
        })
    }

    fn apply(&self, device: &mut Device, action: &Action) -> Result<()> {
        match action {
            Action::RunCodeObject { name } => device.run_code_object(name),
            Action::NetworkRun {
                network,
                schedule,
                duration,
                report,
                report_period,
            } => {
                let schedule: Vec<(String, String)> = schedule
                    .iter()
                    .map(|e| (e.clock.clone(), e.code_object.clone()))
                    .collect();
                device.network_run(
                    network,
                    &schedule,
                    *duration,
                    ReportMode::from_name(report.as_deref()),
                    *report_period,
                )
            }
            Action::Set {
                array,
                index,
                indices,
                slice,
                condition,
                values,
            } => {
                let var = self.find_array(device, array)?;
                let values = ArrayData::from_values(var.dtype, &to_values(values))?;
                let selector = match (indices, slice, condition) {
                    (None, None, None) => Selector::All,
                    (Some(indices), None, None) => Selector::Indices(indices.clone()),
                    (None, Some(slice), None) => Selector::Slice {
                        start: slice.start,
                        stop: slice.stop,
                        step: slice.step,
                    },
                    (None, None, Some(condition)) => Selector::Expression(condition.clone()),
                    _ => {
                        return bad_project(format!(
                            "set {array}: give at most one of indices, slice and condition"
                        ));
                    }
                };
                device.set_with_index_array(&var, index, &selector, &values)
            }
            Action::InsertCode { slot, code } => device.insert_code(slot, code),
            Action::Subprocedure {
                name,
                call_in_parent,
                actions,
            } => device.run_function(name, *call_in_parent, |device| {
                for action in actions.iter() {
                    self.apply(device, action)?;
                }
                Ok(())
            }),
        }
    }

    /// into_device replays the project into a fresh device.
    pub fn into_device(&self) -> Result<Device> {
        let mut device = Device::new(self.preferences.clone());

        for clock in self.clocks.iter() {
            device.add_clock(&clock.name, clock.dt)?;
        }
        for array in self.arrays.iter() {
            let var = array.variable();
            device.add_array(var.clone())?;
            match array.init.as_ref() {
                Some(ArrayInit::Zeros) => device.init_with_zeros(&var)?,
                Some(ArrayInit::Arange(start)) => device.init_with_arange(&var, *start)?,
                Some(ArrayInit::Values(values)) => {
                    let data = ArrayData::from_values(var.dtype, &to_values(values))?;
                    device.init_with_array(&var, &data)?;
                }
                None => {}
            }
        }
        for func in self.functions.iter() {
            device.add_function(func.function()?)?;
        }
        for def in self.code_objects.iter() {
            let spec = self.code_object_spec(&device, def)?;
            device.code_object(spec)?;
        }
        for action in self.actions.iter() {
            self.apply(&mut device, action)?;
        }

        Ok(device)
    }
}
