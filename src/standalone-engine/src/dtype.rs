// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Element types of simulation arrays and their C++ spelling.
//!
//! The set of element types mirrors numpy's scalar types, including several
//! the C++ backend cannot represent.  Mapping one of those is a programming
//! error in the caller and fails with `UnsupportedType`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codegen_err;
use crate::common::{Error, ErrorCode, ErrorKind, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    Complex128,
    /// the platform's default integer, what `numpy.array([1]).dtype` is
    DefaultInt,
    /// the platform's default float, what `numpy.array([1.]).dtype` is
    DefaultFloat,
}

impl DType {
    /// resolve replaces the platform-dependent default types with the
    /// concrete width numpy picks on this host.
    pub fn resolve(self) -> DType {
        match self {
            // numpy uses C `long` for its default integer
            DType::DefaultInt => {
                if cfg!(all(target_pointer_width = "64", not(windows))) {
                    DType::Int64
                } else {
                    DType::Int32
                }
            }
            DType::DefaultFloat => DType::Float64,
            dtype => dtype,
        }
    }

    /// itemsize is the width of one element in bytes.
    pub fn itemsize(self) -> usize {
        match self.resolve() {
            DType::Bool | DType::Int8 | DType::UInt8 => 1,
            DType::Int16 | DType::UInt16 | DType::Float16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 => 4,
            DType::Int64 | DType::UInt64 | DType::Float64 => 8,
            DType::Complex128 => 16,
            DType::DefaultInt | DType::DefaultFloat => unreachable!(),
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self.resolve(),
            DType::Float16 | DType::Float32 | DType::Float64
        )
    }

    pub fn is_bool(self) -> bool {
        self == DType::Bool
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float16 => "float16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Complex128 => "complex128",
            DType::DefaultInt => "int",
            DType::DefaultFloat => "float",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let dtype = match s {
            "bool" | "bool_" => DType::Bool,
            "int8" => DType::Int8,
            "int16" => DType::Int16,
            "int32" => DType::Int32,
            "int64" => DType::Int64,
            "uint8" => DType::UInt8,
            "uint16" => DType::UInt16,
            "uint32" => DType::UInt32,
            "uint64" => DType::UInt64,
            "float16" => DType::Float16,
            "float32" => DType::Float32,
            "float64" | "double" => DType::Float64,
            "complex128" => DType::Complex128,
            "int" => DType::DefaultInt,
            "float" => DType::DefaultFloat,
            _ => {
                return codegen_err!(UnsupportedType, format!("dtype {s} not known"));
            }
        };
        Ok(dtype)
    }
}

impl TryFrom<String> for DType {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DType> for String {
    fn from(dtype: DType) -> Self {
        dtype.name().to_owned()
    }
}

/// c_data_type gives the C++ specifier for an element type, e.g.
/// `Int32` maps to `int32_t`.
pub fn c_data_type(dtype: DType) -> Result<&'static str> {
    let c_type = match dtype.resolve() {
        DType::Float32 => "float",
        DType::Float64 => "double",
        DType::Int8 => "int8_t",
        DType::Int16 => "int16_t",
        DType::Int32 => "int32_t",
        DType::Int64 => "int64_t",
        DType::UInt16 => "uint16_t",
        DType::UInt32 => "uint32_t",
        DType::Bool => "bool",
        unsupported => {
            return Err(Error::new(
                ErrorKind::Codegen,
                ErrorCode::UnsupportedType,
                Some(format!("dtype {unsupported} not known")),
            ));
        }
    };
    Ok(c_type)
}
