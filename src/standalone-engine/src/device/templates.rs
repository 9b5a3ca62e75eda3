// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Source text of every generated project file.

use serde::{Deserialize, Serialize};

use crate::codegen::GeneratedCode;
use crate::common::Result;
use crate::data::{ArrayData, Value};
use crate::dtype::c_data_type;
use crate::variables::{ArrayShape, ArrayVariable};

/// placeholder in code object sources for the per-unit constants
pub const CONSTANTS_PLACEHOLDER: &str = "%CONSTANTS%";

/// Template selects the loop structure wrapped around a code object's
/// statements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    /// run the vector code once per element, `N` elements
    #[default]
    VectorLoop,
    /// run the scalar code, then the vector code once for element 0
    Scalar,
}

fn indent(lines: &[String], level: usize) -> Vec<String> {
    let prefix = " ".repeat(level * 4);
    lines
        .iter()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect()
}

fn join(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn includes(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .map(|header| {
            if header.starts_with('<') || header.starts_with('"') {
                format!("#include {header}")
            } else {
                format!("#include \"{header}\"")
            }
        })
        .collect()
}

/// ObjectsSpec is everything the data-layout descriptor declares.
#[derive(Default)]
pub struct ObjectsSpec<'a> {
    pub arrays: Vec<&'a ArrayVariable>,
    pub zero_arrays: Vec<&'a ArrayVariable>,
    pub arange_arrays: Vec<(&'a ArrayVariable, i64)>,
    pub literal_arrays: Vec<(&'a ArrayVariable, &'a str)>,
    pub static_arrays: Vec<(&'a str, &'a ArrayData)>,
    pub clocks: Vec<(&'a str, f64)>,
    pub networks: Vec<&'a str>,
}

/// result_name is the file below `results/` an array is dumped to.
pub fn result_name(var: &ArrayVariable) -> String {
    var.container_name().unwrap_or_else(|| var.storage_name())
}

pub fn objects_h(spec: &ObjectsSpec) -> Result<String> {
    let mut lines = vec![
        "#ifndef _BRIAN_OBJECTS_H".to_owned(),
        "#define _BRIAN_OBJECTS_H".to_owned(),
        "".to_owned(),
        "#include <stdint.h>".to_owned(),
        "#include <vector>".to_owned(),
        "#include \"brianlib/clocks.h\"".to_owned(),
        "#include \"brianlib/dynamic_array.h\"".to_owned(),
        "#include \"brianlib/network.h\"".to_owned(),
        "".to_owned(),
        "namespace brian {".to_owned(),
        "".to_owned(),
        "//////////////// clocks ///////////////////".to_owned(),
    ];
    for (name, _) in spec.clocks.iter() {
        lines.push(format!("extern Clock {name};"));
    }

    lines.push("".to_owned());
    lines.push("//////////////// networks /////////////////".to_owned());
    for name in spec.networks.iter() {
        lines.push(format!("extern Network {name};"));
    }

    lines.push("".to_owned());
    lines.push("//////////////// arrays ///////////////////".to_owned());
    for var in spec.arrays.iter() {
        let c_type = c_data_type(var.dtype)?;
        match var.shape {
            ArrayShape::Fixed(_) => {
                lines.push(format!("extern {c_type} *{};", var.storage_name()));
                lines.push(format!("extern const int _num_{};", var.storage_name()));
            }
            ArrayShape::Dynamic(_) => {
                lines.push(format!("extern std::vector<{c_type}> {};", result_name(var)));
            }
            ArrayShape::Dynamic2d(..) => {
                lines.push(format!("extern DynamicArray2D<{c_type}> {};", result_name(var)));
            }
        }
    }

    lines.push("".to_owned());
    lines.push("//////////////// static arrays ////////////".to_owned());
    for (name, data) in spec.static_arrays.iter() {
        lines.push(format!("extern {} *{name};", c_data_type(data.dtype())?));
        lines.push(format!("extern const int _num_{name};"));
    }

    lines.extend(
        [
            "",
            "}",
            "",
            "void _init_arrays();",
            "void _load_arrays();",
            "void _write_arrays();",
            "void _dealloc_arrays();",
            "",
            "#endif",
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    Ok(join(lines))
}

fn read_file_lines(name: &str, target: &str, count: &str, c_type: &str, path: &str) -> Vec<String> {
    vec![
        format!("std::ifstream f{name};"),
        format!("f{name}.open(\"{path}\", std::ios::in | std::ios::binary);"),
        format!("if(f{name}.is_open())"),
        "{".to_owned(),
        format!("    f{name}.read(reinterpret_cast<char*>({target}), {count}*sizeof({c_type}));"),
        "} else".to_owned(),
        "{".to_owned(),
        format!("    std::cout << \"Error opening static array {name}.\" << std::endl;"),
        "}".to_owned(),
    ]
}

fn write_file_lines(var: &ArrayVariable, c_type: &str) -> Vec<String> {
    let name = result_name(var);
    let mut lines = vec![
        format!("std::ofstream outfile{name};"),
        format!("outfile{name}.open(\"results/{name}\", std::ios::binary | std::ios::out);"),
        format!("if(outfile{name}.is_open())"),
        "{".to_owned(),
    ];
    let body = match var.shape {
        ArrayShape::Fixed(n) => vec![format!(
            "outfile{name}.write(reinterpret_cast<char*>({name}), {n}*sizeof({c_type}));"
        )],
        ArrayShape::Dynamic(_) => vec![
            format!("for(size_t i=0; i<{name}.size(); i++)"),
            "{".to_owned(),
            format!("    {c_type} value = {name}[i];"),
            format!("    outfile{name}.write(reinterpret_cast<char*>(&value), sizeof({c_type}));"),
            "}".to_owned(),
        ],
        ArrayShape::Dynamic2d(..) => vec![
            format!("for(size_t i=0; i<{name}.n; i++)"),
            "{".to_owned(),
            format!("    for(size_t j=0; j<{name}.m; j++)"),
            "    {".to_owned(),
            format!("        {c_type} value = {name}(i, j);"),
            format!(
                "        outfile{name}.write(reinterpret_cast<char*>(&value), sizeof({c_type}));"
            ),
            "    }".to_owned(),
            "}".to_owned(),
        ],
    };
    lines.extend(indent(&body, 1));
    lines.push(format!("    outfile{name}.close();"));
    lines.push("} else".to_owned());
    lines.push("{".to_owned());
    lines.push(format!(
        "    std::cout << \"Error writing output file for {name}.\" << std::endl;"
    ));
    lines.push("}".to_owned());
    lines
}

// fills every element of a 1-D array with `value`, which may refer to i
fn fill_lines(var: &ArrayVariable, value: &str) -> Vec<String> {
    let name = result_name(var);
    let count = match var.shape {
        ArrayShape::Fixed(n) => n.to_string(),
        _ => format!("{name}.size()"),
    };
    vec![
        format!("for(int i=0; i<(int){count}; i++)"),
        "{".to_owned(),
        format!("    {name}[i] = {value};"),
        "}".to_owned(),
    ]
}

fn literal_lines(var: &ArrayVariable, static_name: &str) -> Vec<String> {
    let name = result_name(var);
    let mut lines = vec![];
    match var.shape {
        ArrayShape::Fixed(_) => {}
        ArrayShape::Dynamic(_) => lines.push(format!("{name}.resize(_num_{static_name});")),
        ArrayShape::Dynamic2d(_, cols) => {
            lines.push(format!("{name}.resize(_num_{static_name} / {cols}, {cols});"))
        }
    }
    lines.push(format!("for(int i=0; i<_num_{static_name}; i++)"));
    lines.push("{".to_owned());
    match var.shape {
        ArrayShape::Dynamic2d(_, cols) => {
            lines.push(format!("    {name}(i / {cols}, i % {cols}) = {static_name}[i];"))
        }
        _ => lines.push(format!("    {name}[i] = {static_name}[i];")),
    }
    lines.push("}".to_owned());
    lines
}

pub fn objects_cpp(spec: &ObjectsSpec) -> Result<String> {
    let mut lines = vec![
        "#include \"objects.h\"".to_owned(),
        "#include <fstream>".to_owned(),
        "#include <iostream>".to_owned(),
        "#include <stdint.h>".to_owned(),
        "#include <vector>".to_owned(),
        "".to_owned(),
        "namespace brian {".to_owned(),
        "".to_owned(),
        "//////////////// clocks ///////////////////".to_owned(),
    ];
    for (name, dt) in spec.clocks.iter() {
        lines.push(format!("Clock {name}({});", Value::Float(*dt).to_cpp_literal()));
    }

    lines.push("".to_owned());
    lines.push("//////////////// networks /////////////////".to_owned());
    for name in spec.networks.iter() {
        lines.push(format!("Network {name};"));
    }

    lines.push("".to_owned());
    lines.push("//////////////// arrays ///////////////////".to_owned());
    for var in spec.arrays.iter() {
        let c_type = c_data_type(var.dtype)?;
        match var.shape {
            ArrayShape::Fixed(n) => {
                lines.push(format!("{c_type} *{};", var.storage_name()));
                lines.push(format!("const int _num_{} = {n};", var.storage_name()));
            }
            ArrayShape::Dynamic(_) => {
                lines.push(format!("std::vector<{c_type}> {};", result_name(var)));
            }
            ArrayShape::Dynamic2d(..) => {
                lines.push(format!("DynamicArray2D<{c_type}> {};", result_name(var)));
            }
        }
    }

    lines.push("".to_owned());
    lines.push("//////////////// static arrays ////////////".to_owned());
    for (name, data) in spec.static_arrays.iter() {
        lines.push(format!("{} *{name};", c_data_type(data.dtype())?));
        lines.push(format!("const int _num_{name} = {};", data.len()));
    }
    lines.push("".to_owned());
    lines.push("}".to_owned());
    lines.push("".to_owned());

    // _init_arrays
    let mut body = vec![];
    for var in spec.arrays.iter() {
        let c_type = c_data_type(var.dtype)?;
        let name = result_name(var);
        match var.shape {
            ArrayShape::Fixed(n) => body.push(format!("{name} = new {c_type}[{n}]();")),
            ArrayShape::Dynamic(n) => body.push(format!("{name}.resize({n});")),
            ArrayShape::Dynamic2d(rows, cols) => body.push(format!("{name}.resize({rows}, {cols});")),
        }
    }
    if !spec.zero_arrays.is_empty() {
        body.push("".to_owned());
        body.push("// Arrays initialized to 0".to_owned());
        for var in spec.zero_arrays.iter().filter(|var| var.shape.ndim() == 1) {
            body.extend(fill_lines(var, "0"));
        }
    }
    if !spec.arange_arrays.is_empty() {
        body.push("".to_owned());
        body.push("// Arrays initialized to an \"arange\"".to_owned());
        for (var, start) in spec.arange_arrays.iter() {
            body.extend(fill_lines(var, &format!("{start} + i")));
        }
    }
    lines.push("void _init_arrays()".to_owned());
    lines.push("{".to_owned());
    lines.push("    using namespace brian;".to_owned());
    lines.push("".to_owned());
    lines.extend(indent(&body, 1));
    lines.push("}".to_owned());
    lines.push("".to_owned());

    // _load_arrays
    let mut body = vec![];
    for (name, data) in spec.static_arrays.iter() {
        let c_type = c_data_type(data.dtype())?;
        body.push(format!("{name} = new {c_type}[{}];", data.len()));
        body.extend(read_file_lines(
            name,
            name,
            &data.len().to_string(),
            c_type,
            &format!("static_arrays/{name}"),
        ));
    }
    if !spec.literal_arrays.is_empty() {
        body.push("".to_owned());
        body.push("// Arrays initialized with literal values".to_owned());
        for (var, static_name) in spec.literal_arrays.iter() {
            body.extend(literal_lines(var, static_name));
        }
    }
    lines.push("void _load_arrays()".to_owned());
    lines.push("{".to_owned());
    lines.push("    using namespace brian;".to_owned());
    lines.push("".to_owned());
    lines.extend(indent(&body, 1));
    lines.push("}".to_owned());
    lines.push("".to_owned());

    // _write_arrays
    let mut body = vec![];
    for var in spec.arrays.iter() {
        body.extend(write_file_lines(var, c_data_type(var.dtype)?));
    }
    lines.push("void _write_arrays()".to_owned());
    lines.push("{".to_owned());
    lines.push("    using namespace brian;".to_owned());
    lines.push("".to_owned());
    lines.extend(indent(&body, 1));
    lines.push("}".to_owned());
    lines.push("".to_owned());

    // _dealloc_arrays
    let mut body = vec![];
    let owned = spec
        .arrays
        .iter()
        .filter(|var| !var.shape.is_dynamic())
        .map(|var| var.storage_name())
        .chain(spec.static_arrays.iter().map(|(name, _)| name.to_string()));
    for name in owned {
        body.push(format!("if({name}!=0)"));
        body.push("{".to_owned());
        body.push(format!("    delete [] {name};"));
        body.push(format!("    {name} = 0;"));
        body.push("}".to_owned());
    }
    lines.push("void _dealloc_arrays()".to_owned());
    lines.push("{".to_owned());
    lines.push("    using namespace brian;".to_owned());
    lines.push("".to_owned());
    lines.extend(indent(&body, 1));
    lines.push("}".to_owned());

    Ok(join(lines))
}

/// ReportMode selects the progress report compiled into the program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ReportMode {
    #[default]
    None,
    Stdout,
    Stderr,
    /// body of a custom `report_progress(elapsed, completed, duration)`
    Custom(String),
}

impl ReportMode {
    /// from_name understands `text`/`stdout` and `stderr`; anything else
    /// is the code of a custom report function.
    pub fn from_name(report: Option<&str>) -> ReportMode {
        match report {
            None => ReportMode::None,
            Some("text") | Some("stdout") => ReportMode::Stdout,
            Some("stderr") => ReportMode::Stderr,
            Some(code) => ReportMode::Custom(code.to_owned()),
        }
    }

    pub fn call(&self) -> &'static str {
        match self {
            ReportMode::None => "NULL",
            _ => "report_progress",
        }
    }
}

const STANDARD_REPORT: &str = r#"void report_progress(const double elapsed, const double completed, const double duration)
{
    if (completed == 0.0)
    {
        %STREAMNAME% << "Starting simulation for duration " << duration << " s";
    } else
    {
        %STREAMNAME% << completed*duration << " s (" << (int)(completed*100.) << "%) simulated in " << elapsed << " s";
        if (completed < 1.0)
        {
            const int remaining = (int)((1-completed)/completed*elapsed+0.5);
            %STREAMNAME% << ", estimated " << remaining << " s remaining.";
        }
    }

    %STREAMNAME% << std::endl << std::flush;
}"#;

pub fn report_function(mode: &ReportMode) -> String {
    match mode {
        ReportMode::None => String::new(),
        ReportMode::Stdout => STANDARD_REPORT.replace("%STREAMNAME%", "std::cout"),
        ReportMode::Stderr => STANDARD_REPORT.replace("%STREAMNAME%", "std::cerr"),
        ReportMode::Custom(code) => {
            let body: Vec<String> = code.lines().map(|l| l.to_owned()).collect();
            let mut lines = vec![
                "void report_progress(const double elapsed, const double completed, const double duration)"
                    .to_owned(),
                "{".to_owned(),
            ];
            lines.extend(indent(&body, 1));
            lines.push("}".to_owned());
            lines.join("\n")
        }
    }
}

pub fn main_cpp(main_lines: &[String], code_objects: &[&str], headers: &[String]) -> String {
    let mut lines = vec![
        "#include <stdlib.h>".to_owned(),
        "#include \"objects.h\"".to_owned(),
        "#include <ctime>".to_owned(),
        "#include <iostream>".to_owned(),
        "#include \"run.h\"".to_owned(),
        "#include \"brianlib/common_math.h\"".to_owned(),
        "".to_owned(),
    ];
    lines.extend(
        code_objects
            .iter()
            .map(|name| format!("#include \"code_objects/{name}.h\"")),
    );
    lines.extend(includes(headers));
    lines.extend(
        [
            "",
            "int main(int argc, char **argv)",
            "{",
            "    brian_start();",
            "",
            "    {",
            "        using namespace brian;",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    lines.extend(indent(main_lines, 2));
    lines.extend(
        ["    }", "", "    brian_end();", "", "    return 0;", "}"]
            .iter()
            .map(|s| s.to_string()),
    );
    join(lines)
}

pub fn run_h(run_funcs: &[&str], report: &ReportMode) -> String {
    let mut lines = vec![
        "#ifndef _BRIAN_RUN_H".to_owned(),
        "#define _BRIAN_RUN_H".to_owned(),
        "".to_owned(),
        "void brian_start();".to_owned(),
        "void brian_end();".to_owned(),
    ];
    if *report != ReportMode::None {
        lines.push(
            "void report_progress(const double elapsed, const double completed, const double duration);"
                .to_owned(),
        );
    }
    lines.push("".to_owned());
    lines.extend(run_funcs.iter().map(|name| format!("void {name}();")));
    lines.push("".to_owned());
    lines.push("#endif".to_owned());
    join(lines)
}

pub fn run_cpp(
    run_funcs: &[(&str, &[String])],
    code_objects: &[&str],
    headers: &[String],
    report: &ReportMode,
) -> String {
    let mut lines = vec![
        "#include <stdlib.h>".to_owned(),
        "#include \"objects.h\"".to_owned(),
        "#include <ctime>".to_owned(),
        "#include <iostream>".to_owned(),
        "#include \"run.h\"".to_owned(),
        "#include \"brianlib/common_math.h\"".to_owned(),
        "".to_owned(),
    ];
    lines.extend(
        code_objects
            .iter()
            .map(|name| format!("#include \"code_objects/{name}.h\"")),
    );
    lines.extend(includes(headers));
    lines.extend(
        [
            "",
            "void brian_start()",
            "{",
            "    _init_arrays();",
            "    _load_arrays();",
            "    srand((unsigned int)time(NULL));",
            "    // the first value depends strongly on the seed",
            "    rand();",
            "}",
            "",
            "void brian_end()",
            "{",
            "    _write_arrays();",
            "    _dealloc_arrays();",
            "}",
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    let report = report_function(report);
    if !report.is_empty() {
        lines.push("".to_owned());
        lines.extend(report.lines().map(|l| l.to_owned()));
    }

    for (name, body) in run_funcs.iter() {
        lines.push("".to_owned());
        lines.push(format!("void {name}()"));
        lines.push("{".to_owned());
        lines.push("    using namespace brian;".to_owned());
        lines.extend(indent(body, 1));
        lines.push("}".to_owned());
    }
    join(lines)
}

pub fn code_object_h(name: &str) -> String {
    join(vec![
        format!("#ifndef _INCLUDED_{name}"),
        format!("#define _INCLUDED_{name}"),
        "".to_owned(),
        format!("void _run_{name}();"),
        "".to_owned(),
        "#endif".to_owned(),
    ])
}

fn block_lines(template: Template, scalar: &[String], vector: &[String]) -> Vec<String> {
    let mut lines = vec![
        "// scalar code".to_owned(),
        "const int _vectorisation_idx = -1;".to_owned(),
    ];
    lines.extend(scalar.iter().cloned());
    match template {
        Template::VectorLoop => {
            lines.push("".to_owned());
            lines.push("const int _N = N;".to_owned());
            lines.push("for(int _idx=0; _idx<_N; _idx++)".to_owned());
            lines.push("{".to_owned());
            let mut body = vec![
                "// vector code".to_owned(),
                "const int _vectorisation_idx = _idx;".to_owned(),
            ];
            body.extend(vector.iter().cloned());
            lines.extend(indent(&body, 1));
            lines.push("}".to_owned());
        }
        Template::Scalar => {
            lines.push("".to_owned());
            lines.push("{".to_owned());
            let mut body = vec![
                "// vector code".to_owned(),
                "const int _idx = 0;".to_owned(),
                "const int _vectorisation_idx = _idx;".to_owned(),
            ];
            body.extend(vector.iter().cloned());
            lines.extend(indent(&body, 1));
            lines.push("}".to_owned());
        }
    }
    lines
}

/// code_object_cpp is the source of one code object, still containing
/// the constants placeholder.
pub fn code_object_cpp(name: &str, template: Template, code: &GeneratedCode) -> String {
    let keywords = &code.keywords;
    let mut lines = vec![
        "#include \"objects.h\"".to_owned(),
        format!("#include \"code_objects/{name}.h\""),
        "#include \"brianlib/common_math.h\"".to_owned(),
        "#include <cmath>".to_owned(),
        "#include <stdint.h>".to_owned(),
        "#include <stdlib.h>".to_owned(),
        "".to_owned(),
        "////// SUPPORT CODE ///////".to_owned(),
        "namespace {".to_owned(),
    ];
    lines.extend(indent(&keywords.support_code, 1));
    lines.push("}".to_owned());
    lines.push("".to_owned());
    lines.push("////// HASH DEFINES ///////".to_owned());
    lines.extend(keywords.hashdefines.iter().cloned());
    lines.push("".to_owned());

    let mut body = vec!["using namespace brian;".to_owned()];
    body.extend(keywords.denormals.iter().cloned());
    body.push("///// CONSTANTS ///////////".to_owned());
    body.push(CONSTANTS_PLACEHOLDER.to_owned());
    body.push("///// POINTERS ////////////".to_owned());
    body.extend(keywords.pointers.iter().cloned());
    body.push("".to_owned());
    body.push("//// MAIN CODE ////////////".to_owned());
    for (block, vector) in code.vector_code.iter() {
        let scalar = code
            .scalar_code
            .get(block)
            .map(|lines| lines.as_slice())
            .unwrap_or_default();
        body.push("{".to_owned());
        body.extend(indent(&block_lines(template, scalar, vector), 1));
        body.push("}".to_owned());
    }

    lines.push(format!("void _run_{name}()"));
    lines.push("{".to_owned());
    lines.extend(indent(&body, 1));
    lines.push("}".to_owned());
    join(lines)
}

/// BuildMode picks the makefile target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    #[default]
    Debug,
    Native,
    Plain,
}

impl BuildMode {
    pub fn target(self) -> Option<&'static str> {
        match self {
            BuildMode::Debug => Some("debug"),
            BuildMode::Native => Some("native"),
            BuildMode::Plain => None,
        }
    }
}

pub fn makefile(sources: &[String], headers: &[String]) -> String {
    format!(
        "PROGRAM = main
SRCS = {sources}
H_SRCS = {headers}
OBJS = ${{SRCS:.cpp=.o}}
OPTFLAGS = -O3
CFLAGS = -c -Wno-write-strings $(OPTFLAGS) -I.
LFLAGS =

all: $(PROGRAM)

.PHONY: all debug native clean

$(PROGRAM): $(OBJS) makefile
\tg++ $(OBJS) -o $(PROGRAM) $(LFLAGS)

%.o : %.cpp $(H_SRCS) makefile
\tg++ $(CFLAGS) $< -o $@

debug: OPTFLAGS = -g -O0 -DDEBUG
debug: all

native: OPTFLAGS = -O3 -march=native
native: all

clean:
\trm -f $(OBJS) $(PROGRAM)
",
        sources = sources.join(" "),
        headers = headers.join(" "),
    )
}
