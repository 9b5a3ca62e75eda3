// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The standalone device: a build session that collects arrays, static
//! data and code objects, replays the queued main actions into a C++
//! project, and drives `make` and the resulting binary.
//!
//! A session moves through `Collecting -> Emitted -> Compiled -> Run`.
//! Everything that changes the program has to happen while collecting;
//! reading results back requires a successful run, except for constant
//! arrays whose contents are known at build time.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::rc::Rc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::codegen::{DEFAULT_INDEX, Preferences};
use crate::common::{Result, is_c_identifier};
use crate::data::{ArrayData, ArrayValue, Value};
use crate::dtype::{DType, c_data_type};
use crate::functions::default_functions;
use crate::variables::{ArrayShape, ArrayVariable, Entry, Function};
use crate::{build_err, device_err};

mod code_object;
mod freeze;
mod queue;
mod runtime;
mod templates;
mod writer;

pub use self::code_object::{CodeObject, CodeObjectSpec};
pub use self::freeze::freeze;
pub use self::queue::{MainAction, Program};
pub use self::templates::{BuildMode, ReportMode, Template};
pub use self::writer::EmitReport;

use self::templates::{ObjectsSpec, result_name};
use self::writer::CppWriter;

/// seconds between progress reports unless asked otherwise
pub const DEFAULT_REPORT_PERIOD: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceState {
    Collecting,
    Emitted,
    Compiled,
    CompileFailed,
    Run,
    RunFailed,
}

/// Selector picks the elements of an array an assignment applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    All,
    Indices(Vec<i64>),
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    /// a condition on the elements; needs the values at run time
    Expression(String),
}

/// BuildOptions control where and how a project is emitted, compiled
/// and run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub project_dir: PathBuf,
    pub compile: bool,
    pub run: bool,
    pub mode: BuildMode,
    /// let the program write to stdout instead of capturing it
    pub with_output: bool,
    /// extra sources and headers for the makefile, relative to the
    /// project directory
    pub additional_source_files: Vec<String>,
    pub additional_header_files: Vec<String>,
    pub main_includes: Vec<String>,
    pub run_includes: Vec<String>,
    pub run_args: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            project_dir: PathBuf::from("output"),
            compile: true,
            run: false,
            mode: BuildMode::Debug,
            with_output: true,
            additional_source_files: vec![],
            additional_header_files: vec![],
            main_includes: vec![],
            run_includes: vec![],
            run_args: vec![],
        }
    }
}

// python-style slice resolution against an array of length n
fn slice_indices(n: usize, start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Result<Vec<i64>> {
    let n = n as i64;
    let step = step.unwrap_or(1);
    if step == 0 {
        return device_err!(BadValue, "slice step cannot be zero".to_owned());
    }
    let clamp = |i: i64, lo: i64, hi: i64| {
        let i = if i < 0 { i + n } else { i };
        i.clamp(lo, hi)
    };
    let mut indices = vec![];
    if step > 0 {
        let start = start.map(|i| clamp(i, 0, n)).unwrap_or(0);
        let stop = stop.map(|i| clamp(i, 0, n)).unwrap_or(n);
        let mut i = start;
        while i < stop {
            indices.push(i);
            i += step;
        }
    } else {
        let start = start.map(|i| clamp(i, -1, n - 1)).unwrap_or(n - 1);
        let stop = stop.map(|i| clamp(i, -1, n - 1)).unwrap_or(-1);
        let mut i = start;
        while i > stop {
            indices.push(i);
            i += step;
        }
    }
    Ok(indices)
}

/// Device is one build session.  Function implementations are shared
/// through `Rc`s, so a device stays on the thread that created it.
pub struct Device {
    state: DeviceState,
    prefs: Preferences,
    functions: BTreeMap<String, Rc<Function>>,
    /// every registered array by storage name
    arrays: BTreeMap<String, ArrayVariable>,
    /// container name to storage name, for 1-D and 2-D dynamic arrays
    dynamic_arrays: BTreeMap<String, String>,
    dynamic_arrays_2d: BTreeMap<String, String>,
    zero_arrays: BTreeSet<String>,
    arange_arrays: BTreeMap<String, i64>,
    /// storage name to the static array holding its initial values
    literal_arrays: BTreeMap<String, String>,
    static_arrays: BTreeMap<String, ArrayData>,
    code_objects: BTreeMap<String, CodeObject>,
    clocks: BTreeMap<String, f64>,
    networks: BTreeSet<String>,
    report: ReportMode,
    main_queue: Vec<MainAction>,
    scopes: Vec<String>,
    subprocedures: BTreeSet<String>,
    project_dir: Option<PathBuf>,
    has_been_run: bool,
}

impl Default for Device {
    fn default() -> Self {
        Device::new(Preferences::default())
    }
}

impl Device {
    pub fn new(prefs: Preferences) -> Self {
        Device {
            state: DeviceState::Collecting,
            prefs,
            functions: default_functions(),
            arrays: BTreeMap::new(),
            dynamic_arrays: BTreeMap::new(),
            dynamic_arrays_2d: BTreeMap::new(),
            zero_arrays: BTreeSet::new(),
            arange_arrays: BTreeMap::new(),
            literal_arrays: BTreeMap::new(),
            static_arrays: BTreeMap::new(),
            code_objects: BTreeMap::new(),
            clocks: BTreeMap::new(),
            networks: BTreeSet::new(),
            report: ReportMode::None,
            main_queue: vec![],
            scopes: vec![],
            subprocedures: BTreeSet::new(),
            project_dir: None,
            has_been_run: false,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn has_been_run(&self) -> bool {
        self.has_been_run
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn main_queue(&self) -> &[MainAction] {
        &self.main_queue
    }

    pub fn static_arrays(&self) -> &BTreeMap<String, ArrayData> {
        &self.static_arrays
    }

    pub fn code_objects(&self) -> impl Iterator<Item = &CodeObject> {
        self.code_objects.values()
    }

    fn check_collecting(&self) -> Result<()> {
        if self.state != DeviceState::Collecting {
            return device_err!(
                InvalidState,
                format!("the project was already emitted ({:?})", self.state)
            );
        }
        Ok(())
    }

    fn lookup(&self, var: &ArrayVariable) -> Result<&ArrayVariable> {
        match self.arrays.get(&var.storage_name()) {
            Some(registered) => Ok(registered),
            None => device_err!(
                DoesNotExist,
                format!("array {}.{} was never registered", var.owner, var.name)
            ),
        }
    }

    /// array finds a registered array by its identity.
    pub fn array(&self, owner: &str, name: &str) -> Option<&ArrayVariable> {
        self.arrays.get(&format!("_array_{owner}_{name}"))
    }

    pub fn add_array(&mut self, var: ArrayVariable) -> Result<()> {
        self.check_collecting()?;
        if !is_c_identifier(&var.owner) || !is_c_identifier(&var.name) {
            return device_err!(BadIdentifier, format!("{}.{}", var.owner, var.name));
        }
        c_data_type(var.dtype)?;
        if var.shape.is_dynamic() && var.dtype.is_bool() {
            return device_err!(
                UnsupportedType,
                format!("dynamic array {}.{} can't hold bools", var.owner, var.name)
            );
        }

        let storage = var.storage_name();
        if let Some(existing) = self.arrays.get(&storage) {
            if *existing == var {
                return Ok(());
            }
            return device_err!(DuplicateArray, storage);
        }

        if let Some(container) = var.container_name() {
            if var.shape.ndim() == 1 {
                self.dynamic_arrays.insert(container, storage.clone());
            } else {
                self.dynamic_arrays_2d.insert(container, storage.clone());
            }
        }
        self.arrays.insert(storage, var);
        Ok(())
    }

    /// get_array_name is the global symbol of an array: its data pointer
    /// when `access_data` is set, otherwise the resizable container for
    /// dynamic arrays.
    pub fn get_array_name(&self, var: &ArrayVariable, access_data: bool) -> Result<String> {
        let var = self.lookup(var)?;
        if access_data {
            Ok(var.storage_name())
        } else {
            Ok(result_name(var))
        }
    }

    pub fn add_function(&mut self, func: Function) -> Result<()> {
        self.check_collecting()?;
        self.functions.insert(func.name.clone(), Rc::new(func));
        Ok(())
    }

    pub fn init_with_zeros(&mut self, var: &ArrayVariable) -> Result<()> {
        self.check_collecting()?;
        let storage = self.lookup(var)?.storage_name();
        self.zero_arrays.insert(storage);
        Ok(())
    }

    pub fn init_with_arange(&mut self, var: &ArrayVariable, start: i64) -> Result<()> {
        self.check_collecting()?;
        let var = self.lookup(var)?;
        if var.shape.ndim() != 1 {
            return device_err!(ShapeMismatch, format!("{} is not 1-D", var.storage_name()));
        }
        let storage = var.storage_name();
        self.arange_arrays.insert(storage, start);
        Ok(())
    }

    /// init_with_array stores literal initial values, loaded right after
    /// the arrays are allocated.
    pub fn init_with_array(&mut self, var: &ArrayVariable, data: &ArrayData) -> Result<()> {
        self.check_collecting()?;
        let var = self.lookup(var)?.clone();
        let data = data.cast(var.dtype)?;
        match var.shape {
            ArrayShape::Fixed(n) if data.len() != n => {
                return device_err!(
                    ShapeMismatch,
                    format!("{} values for {} elements", data.len(), n)
                );
            }
            ArrayShape::Dynamic2d(_, cols) if cols == 0 || data.len() % cols != 0 => {
                return device_err!(
                    ShapeMismatch,
                    format!("{} values don't fill rows of {}", data.len(), cols)
                );
            }
            _ => {}
        }
        let static_name = self.static_array(&result_name(&var), data)?;
        self.literal_arrays.insert(var.storage_name(), static_name);
        Ok(())
    }

    /// fill_with_array queues copying `data` into every element of `var`;
    /// a single value is broadcast.
    pub fn fill_with_array(&mut self, var: &ArrayVariable, data: &ArrayData) -> Result<()> {
        self.check_collecting()?;
        let var = self.lookup(var)?.clone();
        if var.shape.ndim() != 1 {
            return device_err!(
                UnimplementedIndexing,
                format!("can't fill 2-D array {}", var.storage_name())
            );
        }
        let data = if data.len() == 1 {
            ArrayData::repeat(var.dtype, data.get(0), var.len())?
        } else {
            data.cast(var.dtype)?
        };
        if let ArrayShape::Fixed(n) = var.shape {
            if data.len() != n {
                return device_err!(
                    ShapeMismatch,
                    format!("{} values for {} elements", data.len(), n)
                );
            }
        }

        let array = result_name(&var);
        let static_array = self.static_array(&array, data)?;
        self.main_queue.push(MainAction::SetByArray {
            array,
            static_array,
            resize: var.shape.is_dynamic(),
        });
        Ok(())
    }

    /// set_with_index_array queues an assignment to the elements of `var`
    /// picked by `selector`.  Only selections that can be resolved
    /// without running the program are supported.
    pub fn set_with_index_array(
        &mut self,
        var: &ArrayVariable,
        var_index: &str,
        selector: &Selector,
        values: &ArrayData,
    ) -> Result<()> {
        self.check_collecting()?;
        let var = self.lookup(var)?.clone();
        if var_index != DEFAULT_INDEX {
            return device_err!(
                UnimplementedIndexing,
                format!("{} is indexed by {var_index}", var.storage_name())
            );
        }
        let indices = match selector {
            Selector::All => return self.fill_with_array(&var, values),
            Selector::Indices(indices) => {
                let n = fixed_len(&var)? as i64;
                let mut resolved = Vec::with_capacity(indices.len());
                for &i in indices {
                    let j = if i < 0 { i + n } else { i };
                    if j < 0 || j >= n {
                        return device_err!(
                            ShapeMismatch,
                            format!("index {i} out of bounds for {n} elements")
                        );
                    }
                    resolved.push(j);
                }
                resolved
            }
            Selector::Slice { start, stop, step } => {
                slice_indices(fixed_len(&var)?, *start, *stop, *step)?
            }
            Selector::Expression(expr) => {
                return device_err!(
                    UnimplementedIndexing,
                    format!("selecting elements by \"{expr}\" needs the runtime values")
                );
            }
        };
        if indices.is_empty() {
            return Ok(());
        }

        let values = if values.len() == 1 {
            ArrayData::repeat(var.dtype, values.get(0), indices.len())?
        } else if values.len() == indices.len() {
            values.cast(var.dtype)?
        } else {
            return device_err!(
                ShapeMismatch,
                format!("{} values for {} indices", values.len(), indices.len())
            );
        };

        let array = var.storage_name();
        let index_array =
            self.static_array(&format!("_index_{array}"), ArrayData::from_i64s(DType::Int32, &indices)?)?;
        let value_array = self.static_array(&format!("_value_{array}"), values)?;
        self.main_queue.push(MainAction::SetArrayByArray {
            array,
            index_array,
            value_array,
        });
        Ok(())
    }

    /// static_array persists `data` under a fresh name derived from
    /// `name` and returns that name.
    pub fn static_array(&mut self, name: &str, data: ArrayData) -> Result<String> {
        self.check_collecting()?;
        if data.is_empty() {
            return device_err!(EmptyStaticArray, name.to_owned());
        }
        let base = format!("_static_array_{name}");
        let mut unique = base.clone();
        let mut i = 0;
        while self.static_arrays.contains_key(&unique) {
            i += 1;
            unique = format!("{base}_{i}");
        }
        self.static_arrays.insert(unique.clone(), data);
        Ok(unique)
    }

    /// insert_code adds verbatim C++ to a part of the program.  Only the
    /// body of `main` can be extended.
    pub fn insert_code(&mut self, slot: &str, code: &str) -> Result<()> {
        self.check_collecting()?;
        if slot == "main" {
            self.main_queue.push(MainAction::InsertCode(code.to_owned()));
        } else {
            warn!("ignoring device code for unknown slot {slot}");
        }
        Ok(())
    }

    /// code_object translates one scheduled operation.  Every array it
    /// uses has to be registered; the builtin or registered functions its
    /// statements call are bound unless the namespace defines them.
    pub fn code_object(&mut self, mut spec: CodeObjectSpec) -> Result<&CodeObject> {
        self.check_collecting()?;
        if self.code_objects.contains_key(&spec.name) {
            return device_err!(DuplicateName, spec.name);
        }
        for (name, entry) in spec.namespace.iter() {
            if let Entry::Array(var) = entry {
                if self.arrays.get(&var.storage_name()) != Some(var) {
                    return device_err!(
                        DoesNotExist,
                        format!("{}: {name} refers to an unregistered array", spec.name)
                    );
                }
            }
        }
        let called: BTreeSet<String> = spec
            .blocks
            .values()
            .flatten()
            .flat_map(|stmt| stmt.expr.functions())
            .collect();
        for name in called {
            if let Some(func) = self.functions.get(&name) {
                spec.namespace
                    .entry(name)
                    .or_insert_with(|| Entry::Function(func.clone()));
            }
        }

        let co = CodeObject::generate(spec, &self.prefs)?;
        let name = co.name.clone();
        Ok(self.code_objects.entry(name).or_insert(co))
    }

    pub fn run_code_object(&mut self, name: &str) -> Result<()> {
        self.check_collecting()?;
        if !self.code_objects.contains_key(name) {
            return device_err!(DoesNotExist, format!("code object {name}"));
        }
        self.main_queue.push(MainAction::RunCodeObject(name.to_owned()));
        Ok(())
    }

    pub fn add_clock(&mut self, name: &str, dt: f64) -> Result<()> {
        self.check_collecting()?;
        if !is_c_identifier(name) {
            return device_err!(BadIdentifier, name.to_owned());
        }
        if !dt.is_finite() || dt <= 0.0 {
            return device_err!(BadValue, format!("clock {name} has dt {dt}"));
        }
        match self.clocks.get(name) {
            Some(&existing) if existing != dt => {
                device_err!(DuplicateName, format!("clock {name} with dt {existing}"))
            }
            _ => {
                self.clocks.insert(name.to_owned(), dt);
                Ok(())
            }
        }
    }

    /// network_run queues running `schedule`, pairs of clock and code
    /// object in execution order, for `duration` seconds.
    pub fn network_run(
        &mut self,
        network: &str,
        schedule: &[(String, String)],
        duration: f64,
        report: ReportMode,
        report_period: f64,
    ) -> Result<()> {
        self.check_collecting()?;
        if !is_c_identifier(network) {
            return device_err!(BadIdentifier, network.to_owned());
        }
        if !duration.is_finite() || duration < 0.0 {
            return device_err!(BadValue, format!("run duration {duration}"));
        }
        if !report_period.is_finite() || report_period <= 0.0 {
            return device_err!(BadValue, format!("report period {report_period}"));
        }

        let mut lines = vec![format!("{network}.clear();")];
        for (clock, code_object) in schedule {
            if !self.clocks.contains_key(clock) {
                return device_err!(DoesNotExist, format!("clock {clock}"));
            }
            if !self.code_objects.contains_key(code_object) {
                return device_err!(DoesNotExist, format!("code object {code_object}"));
            }
            lines.push(format!("{network}.add(&{clock}, _run_{code_object});"));
        }
        lines.push(format!(
            "{network}.run({}, {}, {});",
            Value::Float(duration).to_cpp_literal(),
            report.call(),
            Value::Float(report_period).to_cpp_literal()
        ));

        // every run shares the one report_progress function
        if report != ReportMode::None {
            self.report = report;
        }
        self.networks.insert(network.to_owned());
        self.main_queue.push(MainAction::RunNetwork {
            network: network.to_owned(),
            lines,
        });
        Ok(())
    }

    /// begin_subprocedure starts collecting actions into a new C++
    /// function, called from the enclosing one if `call_in_parent`.
    pub fn begin_subprocedure(&mut self, name: &str, call_in_parent: bool) -> Result<()> {
        self.check_collecting()?;
        if !is_c_identifier(name) {
            return device_err!(BadIdentifier, name.to_owned());
        }
        if !self.subprocedures.insert(name.to_owned()) {
            return device_err!(DuplicateName, format!("subprocedure {name}"));
        }
        self.scopes.push(name.to_owned());
        self.main_queue.push(MainAction::StartRunFunc {
            name: name.to_owned(),
            include_in_parent: call_in_parent,
        });
        Ok(())
    }

    /// end_subprocedure closes the innermost open subprocedure and
    /// returns its name.
    pub fn end_subprocedure(&mut self) -> Result<String> {
        self.check_collecting()?;
        let name = match self.scopes.pop() {
            Some(name) => name,
            None => return device_err!(UnbalancedScope, "no subprocedure is open".to_owned()),
        };
        self.main_queue.push(MainAction::EndRunFunc { name: name.clone() });
        Ok(name)
    }

    /// run_function collects everything `f` queues into a subprocedure,
    /// closing it even when `f` fails.
    pub fn run_function<T, F>(&mut self, name: &str, call_in_parent: bool, f: F) -> Result<T>
    where
        F: FnOnce(&mut Device) -> Result<T>,
    {
        self.begin_subprocedure(name, call_in_parent)?;
        let depth = self.scopes.len();
        let result = f(self);
        if self.scopes.len() != depth || self.scopes.last().map(|s| s.as_str()) != Some(name) {
            return device_err!(
                UnbalancedScope,
                format!("subprocedure {name} was closed from inside")
            );
        }
        self.end_subprocedure()?;
        result
    }

    /// read_back returns the current contents of an array: the build-time
    /// values of a constant, otherwise what the last run wrote.
    pub fn read_back(&self, var: &ArrayVariable) -> Result<ArrayValue> {
        let var = self.lookup(var)?;
        let storage = var.storage_name();

        if var.constant && var.read_only {
            let data = if let Some(static_name) = self.literal_arrays.get(&storage) {
                self.static_arrays.get(static_name).cloned()
            } else if let Some(&start) = self.arange_arrays.get(&storage) {
                Some(ArrayData::arange(var.dtype, start, var.len())?)
            } else if self.zero_arrays.contains(&storage) {
                Some(ArrayData::repeat(var.dtype, Value::Int(0), var.len())?)
            } else {
                None
            };
            return match data {
                Some(data) => shaped(var, data),
                None => device_err!(UninitializedConstant, storage),
            };
        }

        if !self.has_been_run {
            return device_err!(NotYetRun, storage);
        }
        let dir = match self.project_dir.as_ref() {
            Some(dir) => dir,
            None => return device_err!(NotYetRun, storage),
        };
        let path = dir.join("results").join(result_name(var));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => return build_err!(Io, format!("{}: {}", path.display(), err)),
        };
        shaped(var, ArrayData::from_bytes(var.dtype, bytes)?)
    }

    fn objects_spec(&self) -> ObjectsSpec<'_> {
        let array = |storage: &String| &self.arrays[storage];
        ObjectsSpec {
            arrays: self.arrays.values().collect(),
            zero_arrays: self.zero_arrays.iter().map(array).collect(),
            arange_arrays: self
                .arange_arrays
                .iter()
                .map(|(storage, start)| (array(storage), *start))
                .collect(),
            literal_arrays: self
                .literal_arrays
                .iter()
                .map(|(storage, static_name)| (array(storage), static_name.as_str()))
                .collect(),
            static_arrays: vec![],
            clocks: self.clocks.iter().map(|(name, dt)| (name.as_str(), *dt)).collect(),
            networks: self.networks.iter().map(|name| name.as_str()).collect(),
        }
    }

    /// all_static_arrays adds the literal data code objects bring along
    /// through their functions to the device's own static arrays.
    fn all_static_arrays(&self) -> Result<BTreeMap<String, ArrayData>> {
        let mut statics = self.static_arrays.clone();
        for co in self.code_objects.values() {
            for (name, entry) in co.namespace.iter() {
                if let Entry::StaticData(data) = entry {
                    if data.is_empty() {
                        return device_err!(EmptyStaticArray, name.clone());
                    }
                    match statics.get(name) {
                        Some(existing) if existing != data => {
                            return device_err!(DuplicateStaticArray, name.clone());
                        }
                        Some(_) => {}
                        None => {
                            statics.insert(name.clone(), data.clone());
                        }
                    }
                }
            }
        }
        Ok(statics)
    }

    /// emit writes the complete project.  Emitting again without changes
    /// in between rewrites no file.
    pub fn emit(&mut self, options: &BuildOptions) -> Result<EmitReport> {
        if !matches!(self.state, DeviceState::Collecting | DeviceState::Emitted) {
            return device_err!(
                InvalidState,
                format!("can't emit a project that is {:?}", self.state)
            );
        }
        if let Some(open) = self.scopes.last() {
            return device_err!(UnbalancedScope, format!("subprocedure {open} is still open"));
        }
        let program = queue::replay(&self.main_queue)?;
        let statics = self.all_static_arrays()?;

        let dir = options.project_dir.as_path();
        info!("emitting project to {}", dir.display());
        let mut writer = CppWriter::new(dir);
        for subdir in ["code_objects", "results", "static_arrays", "brianlib"] {
            writer.ensure_dir(subdir)?;
        }

        for (name, data) in statics.iter() {
            writer.write_bytes(&format!("static_arrays/{name}"), data.as_bytes())?;
        }

        let mut spec = self.objects_spec();
        spec.static_arrays = statics.iter().map(|(name, data)| (name.as_str(), data)).collect();
        writer.write("objects.cpp", &templates::objects_cpp(&spec)?)?;
        writer.write("objects.h", &templates::objects_h(&spec)?)?;

        for co in self.code_objects.values() {
            writer.write(&format!("code_objects/{}.cpp", co.name), &co.source()?)?;
            writer.write(&format!("code_objects/{}.h", co.name), &co.header())?;
        }

        let code_object_names: Vec<&str> = self.code_objects.keys().map(|k| k.as_str()).collect();
        writer.write(
            "main.cpp",
            &templates::main_cpp(&program.main_lines, &code_object_names, &options.main_includes),
        )?;

        let run_funcs: Vec<(&str, &[String])> = program
            .run_funcs
            .iter()
            .map(|(name, lines)| (name.as_str(), lines.as_slice()))
            .collect();
        let run_func_names: Vec<&str> = run_funcs.iter().map(|(name, _)| *name).collect();
        writer.write(
            "run.cpp",
            &templates::run_cpp(&run_funcs, &code_object_names, &options.run_includes, &self.report),
        )?;
        writer.write("run.h", &templates::run_h(&run_func_names, &self.report))?;

        for (name, source) in runtime::BRIANLIB {
            writer.write(&format!("brianlib/{name}"), source)?;
        }

        writer.source_files.extend(options.additional_source_files.iter().cloned());
        writer.header_files.extend(options.additional_header_files.iter().cloned());
        let makefile = templates::makefile(&writer.source_files, &writer.header_files);
        writer.write_bytes("makefile", makefile.as_bytes())?;

        self.project_dir = Some(dir.to_owned());
        self.state = DeviceState::Emitted;
        Ok(writer.into_report())
    }

    fn emitted_dir(&self) -> Result<PathBuf> {
        match self.project_dir.as_ref() {
            Some(dir) => Ok(dir.clone()),
            None => device_err!(InvalidState, "the project hasn't been emitted".to_owned()),
        }
    }

    /// compile runs make in the project directory.
    pub fn compile(&mut self, mode: BuildMode) -> Result<()> {
        if self.state == DeviceState::Collecting {
            return device_err!(InvalidState, "the project hasn't been emitted".to_owned());
        }
        let dir = self.emitted_dir()?;

        let mut make = Command::new("make");
        if let Some(target) = mode.target() {
            make.arg(target);
        }
        info!("compiling {} with {:?}", dir.display(), make);
        let status = match make.current_dir(&dir).status() {
            Ok(status) => status,
            Err(err) => {
                self.state = DeviceState::CompileFailed;
                return build_err!(BuildFailed, format!("couldn't start make: {err}"));
            }
        };
        if !status.success() {
            self.state = DeviceState::CompileFailed;
            return build_err!(BuildFailed, format!("make failed with {status}"));
        }
        self.state = DeviceState::Compiled;
        Ok(())
    }

    /// run executes the compiled program, which writes every array to
    /// `results/`.
    pub fn run(&mut self, args: &[String], with_output: bool) -> Result<()> {
        if !matches!(
            self.state,
            DeviceState::Compiled | DeviceState::Run | DeviceState::RunFailed
        ) {
            return device_err!(
                InvalidState,
                format!("can't run a project that is {:?}", self.state)
            );
        }
        let dir = self.emitted_dir()?;
        let program = dir.join("main");

        // resolved against the project directory, not ours
        let mut cmd = Command::new(Path::new(".").join("main"));
        cmd.args(args).current_dir(&dir);
        info!("running {}", program.display());
        let result = if with_output {
            cmd.status().map(|status| (status, String::new()))
        } else {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).output().map(|output| {
                let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
                captured.push_str(&String::from_utf8_lossy(&output.stderr));
                (output.status, captured)
            })
        };

        match result {
            Ok((status, _)) if status.success() => {
                self.has_been_run = true;
                self.state = DeviceState::Run;
                Ok(())
            }
            Ok((status, captured)) => {
                self.state = DeviceState::RunFailed;
                if captured.is_empty() {
                    build_err!(RunFailed, format!("{} failed with {status}", program.display()))
                } else {
                    build_err!(
                        RunFailed,
                        format!("{} failed with {status}:\n{captured}", program.display())
                    )
                }
            }
            Err(err) => {
                self.state = DeviceState::RunFailed;
                build_err!(RunFailed, format!("couldn't start {}: {err}", program.display()))
            }
        }
    }

    /// build emits the project and then compiles and runs it as the
    /// options ask.
    pub fn build(&mut self, options: &BuildOptions) -> Result<EmitReport> {
        let report = self.emit(options)?;
        if options.compile {
            self.compile(options.mode)?;
            if options.run {
                self.run(&options.run_args, options.with_output)?;
            }
        }
        Ok(report)
    }

    pub fn project_dir(&self) -> Option<&Path> {
        self.project_dir.as_deref()
    }
}

fn fixed_len(var: &ArrayVariable) -> Result<usize> {
    match var.shape {
        ArrayShape::Fixed(n) => Ok(n),
        _ => device_err!(
            UnimplementedIndexing,
            format!("the size of {} is only known at run time", var.storage_name())
        ),
    }
}

fn shaped(var: &ArrayVariable, data: ArrayData) -> Result<ArrayValue> {
    let len = data.len();
    let shape = match var.shape {
        ArrayShape::Fixed(n) if len != n => {
            return device_err!(
                ShapeMismatch,
                format!("{}: expected {} values, got {}", var.storage_name(), n, len)
            );
        }
        ArrayShape::Fixed(n) => vec![n],
        ArrayShape::Dynamic(_) => vec![len],
        ArrayShape::Dynamic2d(rows, cols) if rows * cols == len => vec![rows, cols],
        ArrayShape::Dynamic2d(0, cols) if cols > 0 && len % cols == 0 => vec![len / cols, cols],
        ArrayShape::Dynamic2d(rows, cols) => {
            return device_err!(
                ShapeMismatch,
                format!(
                    "{}: {} values don't fit {}x{}",
                    var.storage_name(),
                    len,
                    rows,
                    cols
                )
            );
        }
    };
    Ok(ArrayValue { data, shape })
}

#[cfg(test)]
mod tests;
