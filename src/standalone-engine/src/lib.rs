// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Generate, compile and run a standalone C++ project from abstract code.
//!
//! Callers register arrays and code objects with a `device::Device`,
//! queue the actions the program should take, and then `build` it: the
//! device writes the C++ sources and a makefile to the project directory,
//! runs `make` and the resulting binary, and can then read results back.

#![forbid(unsafe_code)]

mod ast;
pub mod codegen;
pub mod common;
pub mod data;
pub mod device;
pub mod dtype;
mod functions;
pub mod json;
mod lexer;
mod parser;
pub mod variables;

pub use self::ast::{BinaryOp, CmpOp, Expr, Statement, StatementOp, UnaryOp};
pub use self::common::{Error, ErrorCode, ErrorKind, Result};
pub use self::data::{ArrayData, ArrayValue, Value};
pub use self::device::{BuildMode, BuildOptions, Device, DeviceState, ReportMode, Selector};
pub use self::dtype::DType;
pub use self::functions::default_functions;
pub use self::parser::parse;
pub use self::variables::{ArrayShape, ArrayVariable, Entry, Function, FunctionImplementation};
