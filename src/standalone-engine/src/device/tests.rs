// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;

use super::*;
use crate::ast::{Statement, StatementOp};
use crate::common::ErrorCode;
use crate::parser::parse;

fn float_array(owner: &str, name: &str, n: usize) -> ArrayVariable {
    ArrayVariable::new(owner, name, DType::Float64, ArrayShape::Fixed(n))
}

fn decay_spec(v: &ArrayVariable) -> CodeObjectSpec {
    let mut namespace = crate::variables::Namespace::new();
    namespace.insert("v".to_owned(), Entry::Array(v.clone()));
    namespace.insert("N".to_owned(), Entry::constant(Value::Int(v.len() as i64), DType::Int32));
    let mut blocks = BTreeMap::new();
    blocks.insert(
        "".to_owned(),
        vec![Statement::new(
            "v",
            StatementOp::MulAssign,
            parse("exp(-0.5)").unwrap().unwrap(),
            DType::Float64,
        )],
    );
    CodeObjectSpec {
        name: "group_decay".to_owned(),
        blocks,
        namespace,
        ..Default::default()
    }
}

#[test]
fn test_add_array() {
    let mut device = Device::default();
    let v = float_array("group", "v", 10);
    device.add_array(v.clone()).unwrap();
    // registering the identical variable again is harmless
    device.add_array(v.clone()).unwrap();

    let conflicting = ArrayVariable::new("group", "v", DType::Float64, ArrayShape::Dynamic(10));
    let err = device.add_array(conflicting).unwrap_err();
    assert_eq!(ErrorCode::DuplicateArray, err.code);

    let err = device
        .add_array(float_array("group", "v-1", 1))
        .unwrap_err();
    assert_eq!(ErrorCode::BadIdentifier, err.code);

    let err = device
        .add_array(ArrayVariable::new("g", "flag", DType::Bool, ArrayShape::Dynamic(0)))
        .unwrap_err();
    assert_eq!(ErrorCode::UnsupportedType, err.code);

    let err = device
        .add_array(ArrayVariable::new("g", "c", DType::Complex128, ArrayShape::Fixed(1)))
        .unwrap_err();
    assert_eq!(ErrorCode::UnsupportedType, err.code);
}

#[test]
fn test_get_array_name() {
    let mut device = Device::default();
    let v = float_array("group", "v", 10);
    let i = ArrayVariable::new("syn", "_synaptic_pre", DType::Int32, ArrayShape::Dynamic(0));
    device.add_array(v.clone()).unwrap();
    device.add_array(i.clone()).unwrap();

    assert_eq!("_array_group_v", device.get_array_name(&v, true).unwrap());
    assert_eq!("_array_group_v", device.get_array_name(&v, false).unwrap());
    assert_eq!("_array_syn__synaptic_pre", device.get_array_name(&i, true).unwrap());
    assert_eq!(
        "_dynamic_array_syn__synaptic_pre",
        device.get_array_name(&i, false).unwrap()
    );

    let unknown = float_array("other", "v", 1);
    let err = device.get_array_name(&unknown, true).unwrap_err();
    assert_eq!(ErrorCode::DoesNotExist, err.code);
}

#[test]
fn test_static_array_names_never_collide() {
    let mut device = Device::default();
    let a = ArrayData::from(vec![1.0, 2.0]);
    let b = ArrayData::from(vec![3.0]);
    let c = ArrayData::from(vec![4, 5, 6]);
    assert_eq!("_static_array_x", device.static_array("x", a.clone()).unwrap());
    assert_eq!("_static_array_x_1", device.static_array("x", b.clone()).unwrap());
    assert_eq!("_static_array_x_2", device.static_array("x", c.clone()).unwrap());

    let statics = device.static_arrays();
    assert_eq!(&a, &statics["_static_array_x"]);
    assert_eq!(&b, &statics["_static_array_x_1"]);
    assert_eq!(&c, &statics["_static_array_x_2"]);

    let err = device
        .static_array("empty", ArrayData::from(Vec::<f64>::new()))
        .unwrap_err();
    assert_eq!(ErrorCode::EmptyStaticArray, err.code);
}

#[test]
fn test_read_back_constants_without_building() {
    let mut device = Device::default();
    let x = float_array("group", "x", 10).constant();
    device.add_array(x.clone()).unwrap();
    let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
    device
        .init_with_array(&x, &ArrayData::from(values.clone()))
        .unwrap();

    let read = device.read_back(&x).unwrap();
    assert_eq!(vec![10], read.shape);
    assert_eq!(values, read.data.to_f64_vec());

    let i = ArrayVariable::new("group", "i", DType::Int32, ArrayShape::Fixed(4)).constant();
    device.add_array(i.clone()).unwrap();
    device.init_with_arange(&i, 3).unwrap();
    assert_eq!(vec![3, 4, 5, 6], device.read_back(&i).unwrap().data.to_i64_vec());

    let uninit = float_array("group", "y", 3).constant();
    device.add_array(uninit.clone()).unwrap();
    let err = device.read_back(&uninit).unwrap_err();
    assert_eq!(ErrorCode::UninitializedConstant, err.code);

    let live = float_array("group", "v", 3);
    device.add_array(live.clone()).unwrap();
    let err = device.read_back(&live).unwrap_err();
    assert_eq!(ErrorCode::NotYetRun, err.code);
}

#[test]
fn test_read_back_checks_dump_shape() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results");
    fs::create_dir_all(&results).unwrap();

    let mut device = Device::default();
    let v = float_array("g", "v", 3);
    let w = ArrayVariable::new("g", "w", DType::Float64, ArrayShape::Dynamic2d(2, 3));
    let m = ArrayVariable::new("g", "m", DType::Float64, ArrayShape::Dynamic2d(0, 2));
    for var in [&v, &w, &m] {
        device.add_array(var.clone()).unwrap();
    }
    device.project_dir = Some(dir.path().to_owned());
    device.has_been_run = true;

    let dump = |var: &ArrayVariable, values: Vec<f64>| {
        fs::write(results.join(result_name(var)), ArrayData::from(values).as_bytes()).unwrap();
    };

    // a fixed-length array dumped with the wrong number of values
    dump(&v, vec![1.0, 2.0]);
    let err = device.read_back(&v).unwrap_err();
    assert_eq!(ErrorCode::ShapeMismatch, err.code);
    dump(&v, vec![1.0, 2.0, 3.0]);
    assert_eq!(vec![3], device.read_back(&v).unwrap().shape);

    // known rows and columns have to account for every value
    dump(&w, vec![1.0; 5]);
    let err = device.read_back(&w).unwrap_err();
    assert_eq!(ErrorCode::ShapeMismatch, err.code);
    dump(&w, vec![1.0; 6]);
    assert_eq!(vec![2, 3], device.read_back(&w).unwrap().shape);

    // rows that grew at run time are derived from the columns
    dump(&m, vec![1.0; 3]);
    let err = device.read_back(&m).unwrap_err();
    assert_eq!(ErrorCode::ShapeMismatch, err.code);
    dump(&m, vec![1.0; 8]);
    assert_eq!(vec![4, 2], device.read_back(&m).unwrap().shape);
}

#[test]
fn test_init_with_array_shapes() {
    let mut device = Device::default();
    let x = float_array("g", "x", 3);
    device.add_array(x.clone()).unwrap();
    let err = device
        .init_with_array(&x, &ArrayData::from(vec![1.0, 2.0]))
        .unwrap_err();
    assert_eq!(ErrorCode::ShapeMismatch, err.code);

    // literal data is cast to the array's type
    let n = ArrayVariable::new("g", "n", DType::Int32, ArrayShape::Fixed(2)).constant();
    device.add_array(n.clone()).unwrap();
    device.init_with_array(&n, &ArrayData::from(vec![1.9, -2.5])).unwrap();
    let read = device.read_back(&n).unwrap();
    assert_eq!(DType::Int32, read.data.dtype());
    assert_eq!(vec![1, -2], read.data.to_i64_vec());

    let w = ArrayVariable::new("m", "w", DType::Float64, ArrayShape::Dynamic2d(0, 2)).constant();
    device.add_array(w.clone()).unwrap();
    device
        .init_with_array(&w, &ArrayData::from(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
        .unwrap();
    assert_eq!(vec![3, 2], device.read_back(&w).unwrap().shape);
    let err = device
        .init_with_array(&w, &ArrayData::from(vec![1.0, 2.0, 3.0]))
        .unwrap_err();
    assert_eq!(ErrorCode::ShapeMismatch, err.code);
}

#[test]
fn test_fill_with_array() {
    let mut device = Device::default();
    let v = float_array("group", "v", 4);
    device.add_array(v.clone()).unwrap();

    device.fill_with_array(&v, &ArrayData::from(vec![-0.07])).unwrap();
    assert_eq!(
        &[MainAction::SetByArray {
            array: "_array_group_v".to_owned(),
            static_array: "_static_array__array_group_v".to_owned(),
            resize: false,
        }],
        device.main_queue()
    );
    assert_eq!(
        vec![-0.07; 4],
        device.static_arrays()["_static_array__array_group_v"].to_f64_vec()
    );

    let err = device
        .fill_with_array(&v, &ArrayData::from(vec![1.0, 2.0]))
        .unwrap_err();
    assert_eq!(ErrorCode::ShapeMismatch, err.code);
}

#[test]
fn test_fill_dynamic_array_grows_it() {
    let mut device = Device::default();
    let t = ArrayVariable::new("mon", "t", DType::Float64, ArrayShape::Dynamic(0));
    device.add_array(t.clone()).unwrap();

    device
        .fill_with_array(&t, &ArrayData::from(vec![0.0, 0.1, 0.2, 0.3, 0.4]))
        .unwrap();
    assert_eq!(
        &[MainAction::SetByArray {
            array: "_dynamic_array_mon_t".to_owned(),
            static_array: "_static_array__dynamic_array_mon_t".to_owned(),
            resize: true,
        }],
        device.main_queue()
    );
}

#[test]
fn test_set_with_index_array() {
    let mut device = Device::default();
    let v = float_array("group", "v", 5);
    device.add_array(v.clone()).unwrap();

    device
        .set_with_index_array(&v, "_idx", &Selector::Indices(vec![0, -1]), &ArrayData::from(vec![1.0, 2.0]))
        .unwrap();
    assert_eq!(
        &[MainAction::SetArrayByArray {
            array: "_array_group_v".to_owned(),
            index_array: "_static_array__index__array_group_v".to_owned(),
            value_array: "_static_array__value__array_group_v".to_owned(),
        }],
        device.main_queue()
    );
    let statics = device.static_arrays();
    assert_eq!(vec![0, 4], statics["_static_array__index__array_group_v"].to_i64_vec());
    assert_eq!(DType::Int32, statics["_static_array__index__array_group_v"].dtype());
    assert_eq!(vec![1.0, 2.0], statics["_static_array__value__array_group_v"].to_f64_vec());

    let slice = Selector::Slice {
        start: Some(1),
        stop: None,
        step: Some(2),
    };
    device
        .set_with_index_array(&v, "_idx", &slice, &ArrayData::from(vec![9.0]))
        .unwrap();
    let statics = device.static_arrays();
    assert_eq!(vec![1, 3], statics["_static_array__index__array_group_v_1"].to_i64_vec());
    assert_eq!(vec![9.0, 9.0], statics["_static_array__value__array_group_v_1"].to_f64_vec());

    device
        .set_with_index_array(&v, "_idx", &Selector::All, &ArrayData::from(vec![0.5]))
        .unwrap();
    assert_eq!(3, device.main_queue().len());

    let err = device
        .set_with_index_array(&v, "_idx", &Selector::Indices(vec![5]), &ArrayData::from(vec![1.0]))
        .unwrap_err();
    assert_eq!(ErrorCode::ShapeMismatch, err.code);

    let err = device
        .set_with_index_array(&v, "_idx", &Selector::Expression("v > 0".to_owned()), &ArrayData::from(vec![1.0]))
        .unwrap_err();
    assert_eq!(ErrorCode::UnimplementedIndexing, err.code);

    let err = device
        .set_with_index_array(&v, "_postsynaptic_idx", &Selector::All, &ArrayData::from(vec![1.0]))
        .unwrap_err();
    assert_eq!(ErrorCode::UnimplementedIndexing, err.code);

    let w = ArrayVariable::new("syn", "w", DType::Float64, ArrayShape::Dynamic(0));
    device.add_array(w.clone()).unwrap();
    let err = device
        .set_with_index_array(&w, "_idx", &Selector::Indices(vec![0]), &ArrayData::from(vec![1.0]))
        .unwrap_err();
    assert_eq!(ErrorCode::UnimplementedIndexing, err.code);
}

#[test]
fn test_slice_indices() {
    assert_eq!(vec![0, 1, 2, 3, 4], slice_indices(5, None, None, None).unwrap());
    assert_eq!(vec![3, 4], slice_indices(5, Some(-2), None, None).unwrap());
    assert_eq!(vec![4, 2, 0], slice_indices(5, None, None, Some(-2)).unwrap());
    assert_eq!(vec![1, 2], slice_indices(5, Some(1), Some(3), None).unwrap());
    assert!(slice_indices(5, Some(10), None, None).unwrap().is_empty());
    let err = slice_indices(5, None, None, Some(0)).unwrap_err();
    assert_eq!(ErrorCode::BadValue, err.code);
}

#[test]
fn test_subprocedures() {
    let mut device = Device::default();
    let v = float_array("group", "v", 2);
    device.add_array(v.clone()).unwrap();
    device.code_object(decay_spec(&v)).unwrap();

    device.begin_subprocedure("A", true).unwrap();
    device.run_code_object("group_decay").unwrap();
    device.begin_subprocedure("B", true).unwrap();
    device.insert_code("main", "// in B").unwrap();
    assert_eq!("B", device.end_subprocedure().unwrap());
    device.insert_code("main", "// after B").unwrap();
    assert_eq!("A", device.end_subprocedure().unwrap());

    let err = device.end_subprocedure().unwrap_err();
    assert_eq!(ErrorCode::UnbalancedScope, err.code);
    let err = device.begin_subprocedure("A", false).unwrap_err();
    assert_eq!(ErrorCode::DuplicateName, err.code);

    let program = queue::replay(device.main_queue()).unwrap();
    assert_eq!(vec!["A();"], program.main_lines);
    assert_eq!(vec!["_run_group_decay();", "B();", "// after B"], program.run_funcs["A"]);
    assert_eq!(vec!["// in B"], program.run_funcs["B"]);
}

#[test]
fn test_run_function_closes_scope_on_error() {
    let mut device = Device::default();
    let err = device
        .run_function("failing", true, |device| -> Result<()> {
            device.run_code_object("missing")
        })
        .unwrap_err();
    assert_eq!(ErrorCode::DoesNotExist, err.code);
    assert!(matches!(
        device.main_queue().last(),
        Some(MainAction::EndRunFunc { name }) if name == "failing"
    ));

    let value = device
        .run_function("ok", false, |device| {
            device.insert_code("main", "int x = 1;")?;
            Ok(42)
        })
        .unwrap();
    assert_eq!(42, value);

    let err = device
        .run_function("sneaky", true, |device| device.end_subprocedure().map(|_| ()))
        .unwrap_err();
    assert_eq!(ErrorCode::UnbalancedScope, err.code);
}

#[test]
fn test_network_run() {
    let mut device = Device::default();
    let v = float_array("group", "v", 2);
    device.add_array(v.clone()).unwrap();
    device.code_object(decay_spec(&v)).unwrap();
    device.add_clock("defaultclock", 0.0001).unwrap();

    let schedule = vec![("defaultclock".to_owned(), "group_decay".to_owned())];
    device
        .network_run("net", &schedule, 0.1, ReportMode::Stdout, DEFAULT_REPORT_PERIOD)
        .unwrap();
    assert_eq!(
        &[MainAction::RunNetwork {
            network: "net".to_owned(),
            lines: vec![
                "net.clear();".to_owned(),
                "net.add(&defaultclock, _run_group_decay);".to_owned(),
                "net.run(0.1, report_progress, 10.0);".to_owned(),
            ],
        }],
        device.main_queue()
    );

    let bad = vec![("otherclock".to_owned(), "group_decay".to_owned())];
    let err = device
        .network_run("net", &bad, 0.1, ReportMode::None, 1.0)
        .unwrap_err();
    assert_eq!(ErrorCode::DoesNotExist, err.code);

    let err = device.add_clock("defaultclock", 0.001).unwrap_err();
    assert_eq!(ErrorCode::DuplicateName, err.code);
    let err = device.add_clock("fast", 0.0).unwrap_err();
    assert_eq!(ErrorCode::BadValue, err.code);
}

#[test]
fn test_code_object_registration() {
    let mut device = Device::default();
    let v = float_array("group", "v", 2);
    let err = device.code_object(decay_spec(&v)).unwrap_err();
    assert_eq!(ErrorCode::DoesNotExist, err.code);

    device.add_array(v.clone()).unwrap();
    let co = device.code_object(decay_spec(&v)).unwrap();
    assert_eq!("group_decay", co.name);
    let err = device.code_object(decay_spec(&v)).unwrap_err();
    assert_eq!(ErrorCode::DuplicateName, err.code);
}

#[test]
fn test_registered_functions_are_available() {
    let mut device = Device::default();
    let v = float_array("group", "v", 2);
    device.add_array(v.clone()).unwrap();
    device
        .add_function(Function {
            name: "gain".to_owned(),
            cpp: Some(crate::variables::FunctionImplementation {
                name: Some("_gain".to_owned()),
                support_code: "double _gain(double x) { return 2 * x; }".to_owned(),
                ..Default::default()
            }),
        })
        .unwrap();

    let mut spec = decay_spec(&v);
    spec.blocks.insert(
        "".to_owned(),
        vec![Statement::new(
            "v",
            StatementOp::Assign,
            parse("gain(v)").unwrap().unwrap(),
            DType::Float64,
        )],
    );
    let source = device.code_object(spec).unwrap().source().unwrap();
    assert!(source.contains("v = _gain(v);"));
    assert!(source.contains("double _gain(double x) { return 2 * x; }"));
    // builtins that aren't called bring no support code along
    assert!(!source.contains("double _rand()"));
}

#[test]
fn test_operators_bring_their_support_code() {
    let mut device = Device::default();
    let v = float_array("group", "v", 3);
    device.add_array(v.clone()).unwrap();

    let mut spec = decay_spec(&v);
    spec.blocks.insert(
        "".to_owned(),
        vec![Statement::new(
            "v",
            StatementOp::Assign,
            parse("v // 2 + v % 3").unwrap().unwrap(),
            DType::Float64,
        )],
    );
    let source = device.code_object(spec).unwrap().source().unwrap();
    assert!(source.contains("v = _floordiv(v, 2) + _mod(v, 3);"));
    assert!(source.contains("double _floordiv(const double a, const double b)"));
    assert!(source.contains("double _mod(const double a, const double b)"));
}

#[test]
fn test_code_object_rejects_unbound_names() {
    let mut device = Device::default();
    let v = float_array("group", "v", 3);
    device.add_array(v.clone()).unwrap();

    let mut spec = decay_spec(&v);
    spec.name = "group_calls_foo".to_owned();
    spec.blocks.insert(
        "".to_owned(),
        vec![Statement::new(
            "v",
            StatementOp::Assign,
            parse("foo(v) + 1").unwrap().unwrap(),
            DType::Float64,
        )],
    );
    let err = device.code_object(spec).unwrap_err();
    assert_eq!(ErrorCode::MissingImplementation, err.code);

    let guarded = float_array("group", "w", 3).with_conditional_write("not_refractory");
    device.add_array(guarded.clone()).unwrap();
    let mut spec = decay_spec(&guarded);
    spec.name = "group_guarded".to_owned();
    spec.namespace.remove("v");
    spec.namespace.insert("w".to_owned(), Entry::Array(guarded.clone()));
    spec.blocks.insert(
        "".to_owned(),
        vec![Statement::new(
            "w",
            StatementOp::Assign,
            parse("0.0").unwrap().unwrap(),
            DType::Float64,
        )],
    );
    let err = device.code_object(spec).unwrap_err();
    assert_eq!(ErrorCode::DoesNotExist, err.code);
    assert_eq!(0, device.code_objects().count());
}

#[test]
fn test_emit_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut device = Device::default();
    let v = float_array("group", "v", 3);
    device.add_array(v.clone()).unwrap();
    device.init_with_zeros(&v).unwrap();
    device.fill_with_array(&v, &ArrayData::from(vec![1.0, 2.0, 3.0])).unwrap();
    device.code_object(decay_spec(&v)).unwrap();
    device.run_code_object("group_decay").unwrap();

    let options = BuildOptions {
        project_dir: dir.path().to_owned(),
        compile: false,
        ..Default::default()
    };
    let first = device.emit(&options).unwrap();
    assert!(first.unchanged.is_empty());
    for file in [
        "objects.cpp",
        "objects.h",
        "main.cpp",
        "run.cpp",
        "run.h",
        "makefile",
        "code_objects/group_decay.cpp",
        "code_objects/group_decay.h",
        "brianlib/network.cpp",
        "brianlib/spikequeue.h",
        "static_arrays/_static_array__array_group_v",
    ] {
        assert!(first.written.contains(&PathBuf::from(file)), "{file} not written");
    }
    assert!(dir.path().join("results").is_dir());

    let before: Vec<(PathBuf, Vec<u8>)> = first
        .written
        .iter()
        .map(|f| (f.clone(), fs::read(dir.path().join(f)).unwrap()))
        .collect();

    let second = device.emit(&options).unwrap();
    assert!(second.written.is_empty());
    assert_eq!(first.written.len(), second.unchanged.len());
    for (file, contents) in before {
        assert_eq!(contents, fs::read(dir.path().join(&file)).unwrap());
    }

    let main = fs::read_to_string(dir.path().join("main.cpp")).unwrap();
    assert!(main.contains("        _run_group_decay();\n"));
    let makefile = fs::read_to_string(dir.path().join("makefile")).unwrap();
    assert!(makefile.contains("code_objects/group_decay.cpp"));
    assert!(makefile.contains("brianlib/network.cpp"));
}

#[test]
fn test_state_transitions() {
    let dir = tempfile::tempdir().unwrap();
    let mut device = Device::default();
    let v = float_array("group", "v", 3);
    device.add_array(v.clone()).unwrap();

    let err = device.compile(BuildMode::Plain).unwrap_err();
    assert_eq!(ErrorCode::InvalidState, err.code);
    let err = device.run(&[], false).unwrap_err();
    assert_eq!(ErrorCode::InvalidState, err.code);

    device.begin_subprocedure("open", true).unwrap();
    let options = BuildOptions {
        project_dir: dir.path().to_owned(),
        compile: false,
        ..Default::default()
    };
    let err = device.emit(&options).unwrap_err();
    assert_eq!(ErrorCode::UnbalancedScope, err.code);
    device.end_subprocedure().unwrap();

    device.build(&options).unwrap();
    assert_eq!(DeviceState::Emitted, device.state());
    assert_eq!(Some(dir.path()), device.project_dir());

    let err = device.add_array(float_array("group", "w", 1)).unwrap_err();
    assert_eq!(ErrorCode::InvalidState, err.code);
    let err = device.fill_with_array(&v, &ArrayData::from(vec![1.0])).unwrap_err();
    assert_eq!(ErrorCode::InvalidState, err.code);
    let err = device.run(&[], false).unwrap_err();
    assert_eq!(ErrorCode::InvalidState, err.code);
}

#[test]
fn test_function_static_data_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let mut device = Device::default();
    let v = float_array("group", "v", 2);
    device.add_array(v.clone()).unwrap();

    let mut table = BTreeMap::new();
    table.insert(
        "_table_values".to_owned(),
        Entry::StaticData(ArrayData::from(vec![0.5, 1.5])),
    );
    device
        .add_function(Function {
            name: "table".to_owned(),
            cpp: Some(crate::variables::FunctionImplementation {
                name: Some("_table".to_owned()),
                support_code: "double _table(int i) { return _table_values[i]; }".to_owned(),
                hashdefine_code: String::new(),
                namespace: table,
            }),
        })
        .unwrap();
    let mut spec = decay_spec(&v);
    spec.blocks.insert(
        "".to_owned(),
        vec![Statement::new(
            "v",
            StatementOp::Assign,
            parse("table(1)").unwrap().unwrap(),
            DType::Float64,
        )],
    );
    device.code_object(spec).unwrap();

    let options = BuildOptions {
        project_dir: dir.path().to_owned(),
        compile: false,
        ..Default::default()
    };
    let report = device.emit(&options).unwrap();
    assert!(report.written.contains(&PathBuf::from("static_arrays/_table_values")));
    let objects = fs::read_to_string(dir.path().join("objects.h")).unwrap();
    assert!(objects.contains("extern double *_table_values;"));
}
