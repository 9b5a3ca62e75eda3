// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! C++ implementations of the functions abstract code may call.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::variables::{Function, FunctionImplementation};
#[cfg(test)]
use crate::variables::{Entry, Namespace};

// functions that exist under the same name in <cmath>
const SAME_NAME: &[&str] = &[
    "sin", "cos", "tan", "sinh", "cosh", "tanh", "exp", "log", "log10", "sqrt", "ceil", "floor",
];

const RENAMED: &[(&str, &str)] = &[
    ("arcsin", "asin"),
    ("arccos", "acos"),
    ("arctan", "atan"),
    ("abs", "fabs"),
];

const RAND_SUPPORT_CODE: &str = "\
double _rand()
{
    return (double)rand()/RAND_MAX;
}
";

// polar Box-Muller; every second call returns the cached deviate
const RANDN_SUPPORT_CODE: &str = "\
inline double _ranf()
{
    return (double)rand()/RAND_MAX;
}

double _randn()
{
    double x1, x2, w;
    static double y1, y2;
    static bool need_values = true;
    if (need_values)
    {
        do {
            x1 = 2.0 * _ranf() - 1.0;
            x2 = 2.0 * _ranf() - 1.0;
            w = x1 * x1 + x2 * x2;
        } while (w >= 1.0);

        w = sqrt((-2.0 * log(w)) / w);
        y1 = x1 * w;
        y2 = x2 * w;

        need_values = false;
        return y1;
    }
    need_values = true;
    return y2;
}
";

const CLIP_SUPPORT_CODE: &str = "\
double _clip(const double value, const double a_min, const double a_max)
{
    if (value < a_min)
        return a_min;
    if (value > a_max)
        return a_max;
    return value;
}
";

// rounds toward negative infinity like Python's `//`
const FLOORDIV_SUPPORT_CODE: &str = "\
double _floordiv(const double a, const double b)
{
    return floor(a / b);
}
";

// the result takes the sign of the divisor like Python's `%`
const MOD_SUPPORT_CODE: &str = "\
double _mod(const double a, const double b)
{
    return fmod(fmod(a, b) + b, b);
}
";

const INT_SUPPORT_CODE: &str = "\
int int_(const bool value)
{
    return value ? 1 : 0;
}
";

fn with_support_code(name: &str, support_code: &str) -> FunctionImplementation {
    FunctionImplementation {
        name: Some(name.to_owned()),
        support_code: support_code.to_owned(),
        hashdefine_code: String::new(),
        namespace: BTreeMap::new(),
    }
}

/// default_functions returns every builtin function with its C++
/// implementation, keyed by the name abstract code uses.
pub fn default_functions() -> BTreeMap<String, Rc<Function>> {
    let mut functions = BTreeMap::new();
    let mut add = |name: &str, imp: FunctionImplementation| {
        functions.insert(
            name.to_owned(),
            Rc::new(Function {
                name: name.to_owned(),
                cpp: Some(imp),
            }),
        );
    };

    for &name in SAME_NAME {
        add(name, FunctionImplementation::default());
    }
    for &(name, cpp_name) in RENAMED {
        add(name, FunctionImplementation::renamed(cpp_name));
    }
    add("rand", with_support_code("_rand", RAND_SUPPORT_CODE));
    add("randn", with_support_code("_randn", RANDN_SUPPORT_CODE));
    add("clip", with_support_code("_clip", CLIP_SUPPORT_CODE));
    add("int", with_support_code("int_", INT_SUPPORT_CODE));
    add("mod", with_support_code("_mod", MOD_SUPPORT_CODE));
    // what the `//` and `%` operators lower to
    add("_floordiv", with_support_code("_floordiv", FLOORDIV_SUPPORT_CODE));
    add("_mod", with_support_code("_mod", MOD_SUPPORT_CODE));

    functions
}

/// add_default_functions binds every builtin function that `namespace`
/// doesn't already define.
#[cfg(test)]
pub fn add_default_functions(namespace: &mut Namespace) {
    for (name, func) in default_functions() {
        namespace.entry(name).or_insert(Entry::Function(func));
    }
}
