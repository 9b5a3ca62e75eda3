// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The variable catalogue: every kind of name a generated unit can refer
//! to, as a closed set of namespace entries.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::data::{ArrayData, Value};
use crate::dtype::DType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayShape {
    /// fixed-length 1-D array
    Fixed(usize),
    /// resizable 1-D array with its initial length
    Dynamic(usize),
    /// resizable 2-D array with its initial rows and columns
    Dynamic2d(usize, usize),
}

impl ArrayShape {
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, ArrayShape::Fixed(_))
    }

    pub fn ndim(&self) -> usize {
        match self {
            ArrayShape::Dynamic2d(..) => 2,
            _ => 1,
        }
    }

    /// total number of elements at registration time
    pub fn size(&self) -> usize {
        match *self {
            ArrayShape::Fixed(n) | ArrayShape::Dynamic(n) => n,
            ArrayShape::Dynamic2d(rows, cols) => rows * cols,
        }
    }
}

/// ArrayVariable is a typed block of per-element values owned by some
/// simulation object.  Identity is `(owner, name)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayVariable {
    pub owner: String,
    pub name: String,
    pub dtype: DType,
    pub shape: ArrayShape,
    pub constant: bool,
    pub read_only: bool,
    /// name of the boolean array guarding writes to this variable
    pub conditional_write: Option<String>,
}

impl ArrayVariable {
    pub fn new(owner: &str, name: &str, dtype: DType, shape: ArrayShape) -> Self {
        ArrayVariable {
            owner: owner.to_owned(),
            name: name.to_owned(),
            dtype,
            shape,
            constant: false,
            read_only: false,
            conditional_write: None,
        }
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self.read_only = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_conditional_write(mut self, guard: &str) -> Self {
        self.conditional_write = Some(guard.to_owned());
        self
    }

    pub fn key(&self) -> (String, String) {
        (self.owner.clone(), self.name.clone())
    }

    /// storage_name is the global symbol bound to this array's data
    pub fn storage_name(&self) -> String {
        format!("_array_{}_{}", self.owner, self.name)
    }

    /// container_name is the global symbol of the resizable container of
    /// a dynamic array.
    pub fn container_name(&self) -> Option<String> {
        if self.shape.is_dynamic() {
            Some(format!("_dynamic_array_{}_{}", self.owner, self.name))
        } else {
            None
        }
    }

    pub fn pointer_name(&self) -> String {
        format!("_ptr{}", self.storage_name())
    }

    pub fn len(&self) -> usize {
        self.shape.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// FunctionImplementation is the C++ side of a function: the symbol the
/// generated code calls, plus code it needs to link against.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FunctionImplementation {
    pub name: Option<String>,
    pub support_code: String,
    pub hashdefine_code: String,
    /// extra names the implementation needs, merged into the unit's
    /// namespace when the function is resolved
    pub namespace: BTreeMap<String, Entry>,
}

impl FunctionImplementation {
    pub fn renamed(name: &str) -> Self {
        FunctionImplementation {
            name: Some(name.to_owned()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub cpp: Option<FunctionImplementation>,
}

impl Function {
    /// cpp_name is the symbol generated code must call
    pub fn cpp_name(&self) -> Option<&str> {
        self.cpp
            .as_ref()
            .map(|imp| imp.name.as_deref().unwrap_or(&self.name))
    }
}

/// Entry is everything a name in a unit's namespace can be bound to.
#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Array(ArrayVariable),
    /// a live property of a runtime object, read once per unit execution
    Attribute {
        obj: String,
        attribute: String,
        dtype: DType,
    },
    Constant {
        value: Value,
        dtype: DType,
        constant: bool,
        read_only: bool,
    },
    Function(Rc<Function>),
    /// plain numeric value contributed by a function's namespace
    Value(Value),
    /// literal array contributed by a function's namespace
    StaticData(ArrayData),
}

impl Entry {
    pub fn constant(value: Value, dtype: DType) -> Self {
        Entry::Constant {
            value,
            dtype,
            constant: true,
            read_only: true,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayVariable> {
        match self {
            Entry::Array(var) => Some(var),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<Function>> {
        match self {
            Entry::Function(func) => Some(func),
            _ => None,
        }
    }

    /// frozen_value is the build-time value a constant can be substituted
    /// by in generated code, if any.
    pub fn frozen_value(&self) -> Option<Value> {
        match *self {
            Entry::Constant {
                value,
                constant: true,
                read_only: true,
                ..
            } => Some(value),
            Entry::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// Namespace maps local names of a unit to what they denote.  Ordered so
/// that everything derived from it is emitted deterministically.
pub type Namespace = BTreeMap<String, Entry>;

#[test]
fn test_storage_names() {
    let v = ArrayVariable::new("neurongroup", "v", DType::Float64, ArrayShape::Fixed(10));
    assert_eq!("_array_neurongroup_v", v.storage_name());
    assert_eq!("_ptr_array_neurongroup_v", v.pointer_name());
    assert_eq!(None, v.container_name());

    let i = ArrayVariable::new("synapses", "_synaptic_pre", DType::Int32, ArrayShape::Dynamic(0));
    assert_eq!(
        Some("_dynamic_array_synapses__synaptic_pre".to_owned()),
        i.container_name()
    );
    assert_eq!(0, i.len());
    assert_eq!(6, ArrayShape::Dynamic2d(2, 3).size());
}

#[test]
fn test_frozen_values() {
    assert_eq!(
        Some(Value::Float(0.5)),
        Entry::constant(Value::Float(0.5), DType::Float64).frozen_value()
    );
    let changing = Entry::Constant {
        value: Value::Float(0.5),
        dtype: DType::Float64,
        constant: false,
        read_only: true,
    };
    assert_eq!(None, changing.frozen_value());
    let attr = Entry::Attribute {
        obj: "synapses".to_owned(),
        attribute: "N".to_owned(),
        dtype: DType::Int32,
    };
    assert_eq!(None, attr.frozen_value());
}

#[test]
fn test_function_cpp_name() {
    let abs = Function {
        name: "abs".to_owned(),
        cpp: Some(FunctionImplementation::renamed("fabs")),
    };
    assert_eq!(Some("fabs"), abs.cpp_name());
    let exp = Function {
        name: "exp".to_owned(),
        cpp: Some(FunctionImplementation::default()),
    };
    assert_eq!(Some("exp"), exp.cpp_name());
    let missing = Function {
        name: "f".to_owned(),
        cpp: None,
    };
    assert_eq!(None, missing.cpp_name());
}
