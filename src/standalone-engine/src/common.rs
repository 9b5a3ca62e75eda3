// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

// Re-export all common types from standalone-core
pub use standalone_core::common::*;

#[macro_export]
macro_rules! codegen_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Codegen, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Codegen, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! device_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Device, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Device, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! build_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Build, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Build, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! import_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Import, ErrorCode::$code, Some($str)))
    }};
}

#[test]
fn test_err_macros() {
    let err: Result<()> = device_err!(NotYetRun, "v".to_owned());
    let err = err.unwrap_err();
    assert_eq!(ErrorKind::Device, err.kind);
    assert_eq!(ErrorCode::NotYetRun, err.code);

    let err: Result<()> = codegen_err!(UnsupportedType);
    let err = err.unwrap_err();
    assert_eq!(ErrorKind::Codegen, err.kind);
    assert!(err.details.is_none());
}
