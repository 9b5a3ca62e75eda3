// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Scalar values and typed, flat array buffers.
//!
//! `ArrayData` stores elements in exactly the layout the generated program
//! reads from `static_arrays/` and writes to `results/`: a contiguous block
//! of native-endian elements of one supported `DType`.

use std::fmt;

use crate::codegen_err;
use crate::common::Result;
use crate::dtype::{DType, c_data_type};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(n) => n as f64,
            Value::Float(n) => n,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match *self {
            Value::Bool(b) => b as i64,
            Value::Int(n) => n,
            Value::Float(n) => n as i64,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match *self {
            Value::Bool(b) => b,
            Value::Int(n) => n != 0,
            Value::Float(n) => n != 0.0,
        }
    }

    fn is_negative(&self) -> bool {
        match *self {
            Value::Bool(_) => false,
            Value::Int(n) => n < 0,
            Value::Float(n) => n.is_sign_negative() && !n.is_nan(),
        }
    }

    /// to_cpp_literal renders the value as a C++ literal that can replace
    /// an identifier anywhere in an expression; negative values are
    /// parenthesized so `x-N` never turns into `x--3`.
    pub fn to_cpp_literal(&self) -> String {
        let literal = self.to_string();
        if self.is_negative() {
            format!("({literal})")
        } else {
            literal
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => {
                if n.is_nan() {
                    write!(f, "NAN")
                } else if n.is_infinite() {
                    if n > 0.0 {
                        write!(f, "INFINITY")
                    } else {
                        write!(f, "-INFINITY")
                    }
                } else {
                    // Debug formatting always keeps a decimal point or exponent
                    write!(f, "{n:?}")
                }
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ArrayData {
    dtype: DType,
    bytes: Vec<u8>,
}

impl fmt::Debug for ArrayData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let values: Vec<Value> = (0..self.len()).map(|i| self.get(i)).collect();
        f.debug_struct("ArrayData")
            .field("dtype", &self.dtype)
            .field("values", &values)
            .finish()
    }
}

fn push_value(dtype: DType, value: Value, out: &mut Vec<u8>) {
    match dtype {
        DType::Bool => out.push(value.is_truthy() as u8),
        DType::Int8 => out.extend_from_slice(&(value.as_i64() as i8).to_ne_bytes()),
        DType::Int16 => out.extend_from_slice(&(value.as_i64() as i16).to_ne_bytes()),
        DType::Int32 => out.extend_from_slice(&(value.as_i64() as i32).to_ne_bytes()),
        DType::Int64 => out.extend_from_slice(&value.as_i64().to_ne_bytes()),
        DType::UInt16 => out.extend_from_slice(&(value.as_i64() as u16).to_ne_bytes()),
        DType::UInt32 => out.extend_from_slice(&(value.as_i64() as u32).to_ne_bytes()),
        DType::Float32 => out.extend_from_slice(&(value.as_f64() as f32).to_ne_bytes()),
        DType::Float64 => out.extend_from_slice(&value.as_f64().to_ne_bytes()),
        _ => unreachable!("unsupported dtype {dtype} in ArrayData"),
    }
}

fn read_value(dtype: DType, chunk: &[u8]) -> Value {
    // chunk is always exactly itemsize long, so the conversions can't fail
    match dtype {
        DType::Bool => Value::Bool(chunk[0] != 0),
        DType::Int8 => Value::Int(i8::from_ne_bytes([chunk[0]]) as i64),
        DType::Int16 => Value::Int(i16::from_ne_bytes([chunk[0], chunk[1]]) as i64),
        DType::Int32 => Value::Int(i32::from_ne_bytes(chunk.try_into().unwrap()) as i64),
        DType::Int64 => Value::Int(i64::from_ne_bytes(chunk.try_into().unwrap())),
        DType::UInt16 => Value::Int(u16::from_ne_bytes([chunk[0], chunk[1]]) as i64),
        DType::UInt32 => Value::Int(u32::from_ne_bytes(chunk.try_into().unwrap()) as i64),
        DType::Float32 => Value::Float(f32::from_ne_bytes(chunk.try_into().unwrap()) as f64),
        DType::Float64 => Value::Float(f64::from_ne_bytes(chunk.try_into().unwrap())),
        _ => unreachable!("unsupported dtype {dtype} in ArrayData"),
    }
}

impl ArrayData {
    /// from_values converts `values` to `dtype`, the way numpy's
    /// `astype` would (floats truncate towards zero for integer types).
    pub fn from_values(dtype: DType, values: &[Value]) -> Result<ArrayData> {
        c_data_type(dtype)?;
        let dtype = dtype.resolve();
        let mut bytes = Vec::with_capacity(values.len() * dtype.itemsize());
        for value in values {
            push_value(dtype, *value, &mut bytes);
        }
        Ok(ArrayData { dtype, bytes })
    }

    pub fn from_f64s(dtype: DType, values: &[f64]) -> Result<ArrayData> {
        let values: Vec<Value> = values.iter().map(|v| Value::Float(*v)).collect();
        ArrayData::from_values(dtype, &values)
    }

    pub fn from_i64s(dtype: DType, values: &[i64]) -> Result<ArrayData> {
        let values: Vec<Value> = values.iter().map(|v| Value::Int(*v)).collect();
        ArrayData::from_values(dtype, &values)
    }

    /// from_bytes wraps a raw native-endian dump, as written by `tofile`
    /// or by the generated program's `_write_arrays`.
    pub fn from_bytes(dtype: DType, bytes: Vec<u8>) -> Result<ArrayData> {
        c_data_type(dtype)?;
        let dtype = dtype.resolve();
        if bytes.len() % dtype.itemsize() != 0 {
            return codegen_err!(
                ShapeMismatch,
                format!(
                    "{} bytes is not a whole number of {} elements",
                    bytes.len(),
                    dtype
                )
            );
        }
        Ok(ArrayData { dtype, bytes })
    }

    pub fn repeat(dtype: DType, value: Value, n: usize) -> Result<ArrayData> {
        ArrayData::from_values(dtype, &vec![value; n])
    }

    /// arange is `start, start+1, ...` with `n` elements.
    pub fn arange(dtype: DType, start: i64, n: usize) -> Result<ArrayData> {
        let values: Vec<Value> = (0..n as i64).map(|i| Value::Int(start + i)).collect();
        ArrayData::from_values(dtype, &values)
    }

    pub fn cast(&self, dtype: DType) -> Result<ArrayData> {
        if self.dtype == dtype.resolve() {
            return Ok(self.clone());
        }
        ArrayData::from_values(dtype, &self.values())
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / self.dtype.itemsize()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn get(&self, i: usize) -> Value {
        let size = self.dtype.itemsize();
        read_value(self.dtype, &self.bytes[i * size..(i + 1) * size])
    }

    pub fn values(&self) -> Vec<Value> {
        self.bytes
            .chunks_exact(self.dtype.itemsize())
            .map(|chunk| read_value(self.dtype, chunk))
            .collect()
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.values().iter().map(|v| v.as_f64()).collect()
    }

    pub fn to_i64_vec(&self) -> Vec<i64> {
        self.values().iter().map(|v| v.as_i64()).collect()
    }
}

impl From<Vec<f64>> for ArrayData {
    fn from(values: Vec<f64>) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * 8);
        for v in values {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        ArrayData {
            dtype: DType::Float64,
            bytes,
        }
    }
}

impl From<Vec<i32>> for ArrayData {
    fn from(values: Vec<i32>) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for v in values {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        ArrayData {
            dtype: DType::Int32,
            bytes,
        }
    }
}

impl From<Vec<i64>> for ArrayData {
    fn from(values: Vec<i64>) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * 8);
        for v in values {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        ArrayData {
            dtype: DType::Int64,
            bytes,
        }
    }
}

impl From<Vec<bool>> for ArrayData {
    fn from(values: Vec<bool>) -> Self {
        ArrayData {
            dtype: DType::Bool,
            bytes: values.into_iter().map(|b| b as u8).collect(),
        }
    }
}

/// ArrayValue is an array read back from the device together with the
/// shape it should be interpreted in (row-major for 2-D arrays).
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayValue {
    pub data: ArrayData,
    pub shape: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;

    #[test]
    fn test_literal_rendering() {
        assert_eq!("0.5", Value::Float(0.5).to_cpp_literal());
        assert_eq!("10.0", Value::Float(10.0).to_cpp_literal());
        assert_eq!("(-3.0)", Value::Float(-3.0).to_cpp_literal());
        assert_eq!("(-7)", Value::Int(-7).to_cpp_literal());
        assert_eq!("4000", Value::Int(4000).to_cpp_literal());
        assert_eq!("true", Value::Bool(true).to_cpp_literal());
        assert_eq!("1e-5", Value::Float(1e-5).to_cpp_literal());
        assert_eq!("INFINITY", Value::Float(f64::INFINITY).to_cpp_literal());
        assert_eq!("(-INFINITY)", Value::Float(f64::NEG_INFINITY).to_cpp_literal());
        assert_eq!("NAN", Value::Float(f64::NAN).to_cpp_literal());
    }

    #[test]
    fn test_cast_truncates_like_astype() {
        let data = ArrayData::from_f64s(DType::Int32, &[1.9, -1.9, 0.0]).unwrap();
        assert_eq!(vec![1, -1, 0], data.to_i64_vec());
        assert_eq!(12, data.as_bytes().len());

        let data: ArrayData = vec![0.0, 2.5].into();
        let as_bool = data.cast(DType::Bool).unwrap();
        assert_eq!(vec![Value::Bool(false), Value::Bool(true)], as_bool.values());
    }

    #[test]
    fn test_from_bytes_checks_itemsize() {
        let err = ArrayData::from_bytes(DType::Float64, vec![0; 12]).unwrap_err();
        assert_eq!(ErrorCode::ShapeMismatch, err.code);
        let data = ArrayData::from_bytes(DType::Int32, vec![0; 12]).unwrap();
        assert_eq!(3, data.len());
    }

    #[test]
    fn test_unsupported_dtype_rejected() {
        let err = ArrayData::from_f64s(DType::UInt64, &[1.0]).unwrap_err();
        assert_eq!(ErrorCode::UnsupportedType, err.code);
    }

    #[test]
    fn test_arange() {
        let data = ArrayData::arange(DType::Int32, 5, 4).unwrap();
        assert_eq!(vec![5, 6, 7, 8], data.to_i64_vec());
        assert_eq!(DType::Int32, data.dtype());
    }
}
