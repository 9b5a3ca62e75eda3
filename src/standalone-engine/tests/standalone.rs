// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! End-to-end tests of the device: emitting projects, and compiling and
//! running them when a C++ toolchain is around.

use std::collections::BTreeMap;
use std::fs;
use std::process::Command;

use float_cmp::approx_eq;
use standalone_engine::device::{CodeObjectSpec, MainAction};
use standalone_engine::variables::Namespace;
use standalone_engine::{
    ArrayData, ArrayShape, ArrayVariable, BuildOptions, DType, Device, DeviceState, Entry,
    ErrorCode, ReportMode, Statement, StatementOp, Value, parse,
};

fn have_toolchain() -> bool {
    let ok = |cmd: &str| {
        Command::new(cmd)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    };
    ok("make") && ok("g++")
}

fn doubling_spec(v: &ArrayVariable) -> CodeObjectSpec {
    let mut namespace = Namespace::new();
    namespace.insert("v".to_owned(), Entry::Array(v.clone()));
    namespace.insert("N".to_owned(), Entry::constant(Value::Int(v.len() as i64), DType::Int32));
    let mut blocks = BTreeMap::new();
    blocks.insert(
        String::new(),
        vec![Statement::new(
            "v",
            StatementOp::Assign,
            parse("v * 2").unwrap().unwrap(),
            DType::Float64,
        )],
    );
    CodeObjectSpec {
        name: "group_doubling".to_owned(),
        blocks,
        namespace,
        ..Default::default()
    }
}

#[test]
fn literal_constant_reads_back_without_building() {
    let mut device = Device::default();
    let i = ArrayVariable::new("group", "i", DType::Int32, ArrayShape::Fixed(10)).constant();
    device.add_array(i.clone()).unwrap();
    let data = ArrayData::from_i64s(DType::Int32, &(0..10).collect::<Vec<_>>()).unwrap();
    device.init_with_array(&i, &data).unwrap();

    let value = device.read_back(&i).unwrap();
    assert_eq!((0..10).collect::<Vec<i64>>(), value.data.to_i64_vec());
    assert_eq!(vec![10], value.shape);
}

#[test]
fn emitting_twice_rewrites_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut device = Device::default();
    let v = ArrayVariable::new("group", "v", DType::Float64, ArrayShape::Fixed(3));
    device.add_array(v.clone()).unwrap();
    device.init_with_zeros(&v).unwrap();
    device.code_object(doubling_spec(&v)).unwrap();
    device.run_code_object("group_doubling").unwrap();

    let options = BuildOptions {
        project_dir: dir.path().to_owned(),
        compile: false,
        ..Default::default()
    };
    let first = device.build(&options).unwrap();
    assert!(!first.written.is_empty());
    let main = fs::read_to_string(dir.path().join("main.cpp")).unwrap();
    assert!(main.contains("_run_group_doubling();"));

    let second = device.emit(&options).unwrap();
    assert!(second.written.is_empty());
    assert_eq!(first.written.len(), second.unchanged.len());
    assert_eq!(DeviceState::Emitted, device.state());
}

#[test]
fn static_array_names_never_collide() {
    let mut device = Device::default();
    let a = device.static_array("_timedarray_values", ArrayData::from(vec![1.0])).unwrap();
    let b = device.static_array("_timedarray_values", ArrayData::from(vec![2.0])).unwrap();
    assert_ne!(a, b);
    assert_eq!(2, device.static_arrays().len());
}

#[test]
fn subprocedures_nest_and_must_balance() {
    let mut device = Device::default();
    device.begin_subprocedure("outer", true).unwrap();
    device.insert_code("main", "// in outer").unwrap();
    device.begin_subprocedure("inner", false).unwrap();
    device.insert_code("main", "// in inner").unwrap();
    assert_eq!("inner", device.end_subprocedure().unwrap());

    let dir = tempfile::tempdir().unwrap();
    let options = BuildOptions {
        project_dir: dir.path().to_owned(),
        compile: false,
        ..Default::default()
    };
    let err = device.emit(&options).unwrap_err();
    assert_eq!(ErrorCode::UnbalancedScope, err.code);

    assert_eq!("outer", device.end_subprocedure().unwrap());
    let err = device.end_subprocedure().unwrap_err();
    assert_eq!(ErrorCode::UnbalancedScope, err.code);

    device.emit(&options).unwrap();
    let run = fs::read_to_string(dir.path().join("run.cpp")).unwrap();
    assert!(run.contains("void outer()"));
    assert!(run.contains("void inner()"));
    // inner isn't called from its parent
    let outer_body = run.split("void outer()").nth(1).unwrap();
    assert!(!outer_body.split("void ").next().unwrap().contains("inner();"));
    let main = fs::read_to_string(dir.path().join("main.cpp")).unwrap();
    assert!(main.contains("outer();"));
}

#[test]
fn compiles_and_runs_a_network() {
    if !have_toolchain() {
        eprintln!("skipping: make or g++ isn't available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut device = Device::default();
    let v = ArrayVariable::new("group", "v", DType::Float64, ArrayShape::Fixed(4));
    device.add_array(v.clone()).unwrap();
    device.init_with_zeros(&v).unwrap();
    device
        .fill_with_array(&v, &ArrayData::from(vec![1.0, 2.0, 3.0, 4.0]))
        .unwrap();
    assert!(matches!(device.main_queue()[0], MainAction::SetByArray { .. }));

    device.add_clock("defaultclock", 0.001).unwrap();
    device.code_object(doubling_spec(&v)).unwrap();
    device
        .run_function("simulate", true, |device| {
            device.network_run(
                "net",
                &[("defaultclock".to_owned(), "group_doubling".to_owned())],
                0.003,
                ReportMode::None,
                10.0,
            )
        })
        .unwrap();

    let options = BuildOptions {
        project_dir: dir.path().to_owned(),
        run: true,
        with_output: false,
        ..Default::default()
    };
    device.build(&options).unwrap();
    assert!(device.has_been_run());
    assert_eq!(DeviceState::Run, device.state());

    let result = device.read_back(&v).unwrap().data.to_f64_vec();
    for (expected, actual) in [8.0, 16.0, 24.0, 32.0].iter().zip(result.iter()) {
        assert!(approx_eq!(f64, *expected, *actual));
    }
}

#[test]
fn integer_division_rounds_like_python() {
    if !have_toolchain() {
        eprintln!("skipping: make or g++ isn't available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut device = Device::default();
    let int_array = |name: &str| ArrayVariable::new("ops", name, DType::Int32, ArrayShape::Fixed(2));
    let (x, q, r, s) = (int_array("x"), int_array("q"), int_array("r"), int_array("s"));
    let mut namespace = Namespace::new();
    for var in [&x, &q, &r, &s] {
        device.add_array(var.clone()).unwrap();
        device.init_with_zeros(var).unwrap();
        namespace.insert(var.name.clone(), Entry::Array(var.clone()));
    }
    namespace.insert("N".to_owned(), Entry::constant(Value::Int(2), DType::Int32));
    let x_data = ArrayData::from_i64s(DType::Int32, &[-7, 7]).unwrap();
    device.fill_with_array(&x, &x_data).unwrap();

    let statement = |var: &str, expr: &str| {
        Statement::new(var, StatementOp::Assign, parse(expr).unwrap().unwrap(), DType::Int32)
    };
    let mut blocks = BTreeMap::new();
    blocks.insert(
        String::new(),
        vec![
            statement("q", "x // 2"),
            statement("r", "x % 2"),
            statement("s", "x % -3"),
        ],
    );
    device
        .code_object(CodeObjectSpec {
            name: "ops_divide".to_owned(),
            blocks,
            namespace,
            ..Default::default()
        })
        .unwrap();
    device.run_code_object("ops_divide").unwrap();

    let options = BuildOptions {
        project_dir: dir.path().to_owned(),
        run: true,
        with_output: false,
        ..Default::default()
    };
    device.build(&options).unwrap();

    assert_eq!(vec![-4, 3], device.read_back(&q).unwrap().data.to_i64_vec());
    assert_eq!(vec![1, 1], device.read_back(&r).unwrap().data.to_i64_vec());
    assert_eq!(vec![-1, -2], device.read_back(&s).unwrap().data.to_i64_vec());
}

#[test]
fn filling_a_dynamic_array_grows_it() {
    if !have_toolchain() {
        eprintln!("skipping: make or g++ isn't available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut device = Device::default();
    let t = ArrayVariable::new("mon", "t", DType::Float64, ArrayShape::Dynamic(0));
    device.add_array(t.clone()).unwrap();
    let values = vec![0.0, 0.1, 0.2, 0.3, 0.4];
    device.fill_with_array(&t, &ArrayData::from(values.clone())).unwrap();

    let options = BuildOptions {
        project_dir: dir.path().to_owned(),
        run: true,
        with_output: false,
        ..Default::default()
    };
    device.build(&options).unwrap();

    let result = device.read_back(&t).unwrap();
    assert_eq!(vec![5], result.shape);
    for (expected, actual) in values.iter().zip(result.data.to_f64_vec().iter()) {
        assert!(approx_eq!(f64, *expected, *actual));
    }
}
