// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError,      // will never be produced
    DoesNotExist, // the named entity doesn't exist
    Generic,
    // equation (abstract code) parsing
    InvalidToken,
    UnrecognizedEof,
    UnrecognizedToken,
    ExtraToken,
    ExpectedNumber,
    // code generation
    UnsupportedType,
    MissingImplementation,
    BadIdentifier,
    // device
    DuplicateArray,
    DuplicateName,
    BadValue,
    DuplicateStaticArray,
    EmptyStaticArray,
    UnimplementedIndexing,
    UninitializedConstant,
    UnbalancedScope,
    InvalidState,
    NotYetRun,
    ShapeMismatch,
    // build
    Io,
    BuildFailed,
    RunFailed,
    // project import
    BadProject,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            DoesNotExist => "does_not_exist",
            Generic => "generic",
            InvalidToken => "invalid_token",
            UnrecognizedEof => "unrecognized_eof",
            UnrecognizedToken => "unrecognized_token",
            ExtraToken => "extra_token",
            ExpectedNumber => "expected_number",
            UnsupportedType => "unsupported_type",
            MissingImplementation => "missing_implementation",
            BadIdentifier => "bad_identifier",
            DuplicateArray => "duplicate_array",
            DuplicateName => "duplicate_name",
            BadValue => "bad_value",
            DuplicateStaticArray => "duplicate_static_array",
            EmptyStaticArray => "empty_static_array",
            UnimplementedIndexing => "unimplemented_indexing",
            UninitializedConstant => "uninitialized_constant",
            UnbalancedScope => "unbalanced_scope",
            InvalidState => "invalid_state",
            NotYetRun => "not_yet_run",
            ShapeMismatch => "shape_mismatch",
            Io => "io",
            BuildFailed => "build_failed",
            RunFailed => "run_failed",
            BadProject => "bad_project",
        };

        write!(f, "{name}")
    }
}

/// EquationError locates a problem inside a single abstract-code
/// expression by byte offsets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EquationError {
    pub start: u16,
    pub end: u16,
    pub code: ErrorCode,
}

impl fmt::Display for EquationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.end, self.code)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Codegen,
    Device,
    Build,
    Import,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Build,
            code: ErrorCode::Io,
            details: Some(err.to_string()),
        }
    }
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Codegen => "CodegenError",
            ErrorKind::Device => "DeviceError",
            ErrorKind::Build => "BuildError",
            ErrorKind::Import => "ImportError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;
pub type EquationResult<T> = result::Result<T, EquationError>;

/// is_c_identifier reports whether `name` can be used verbatim as a
/// C/C++ identifier in generated source.
pub fn is_c_identifier(name: &str) -> bool {
    lazy_static! {
        static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    }
    IDENT_RE.is_match(name)
}

#[test]
fn test_is_c_identifier() {
    assert!(is_c_identifier("_array_neurongroup_v"));
    assert!(is_c_identifier("v"));
    assert!(is_c_identifier("N_incoming"));
    assert!(!is_c_identifier(""));
    assert!(!is_c_identifier("1abc"));
    assert!(!is_c_identifier("a.b"));
    assert!(!is_c_identifier("a b"));
    assert!(!is_c_identifier("naïve"));
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Device,
        ErrorCode::NotYetRun,
        Some("_array_group_v".to_owned()),
    );
    assert_eq!("DeviceError{not_yet_run: _array_group_v}", format!("{err}"));

    let err = Error::new(ErrorKind::Codegen, ErrorCode::UnsupportedType, None);
    assert_eq!("CodegenError{unsupported_type}", format!("{err}"));

    let eqn_err = EquationError {
        start: 2,
        end: 4,
        code: ErrorCode::UnrecognizedToken,
    };
    assert_eq!("2:4:unrecognized_token", format!("{eqn_err}"));
}

#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: Error = io_err.into();
    assert_eq!(ErrorKind::Build, err.kind);
    assert_eq!(ErrorCode::Io, err.code);
    assert_eq!(Some("missing".to_owned()), err.get_details());
}
