// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The C++ support library every generated project is built against.

/// files copied into `brianlib/`, by name
pub const BRIANLIB: &[(&str, &str)] = &[
    ("clocks.h", include_str!("../../runtime/brianlib/clocks.h")),
    ("common_math.h", include_str!("../../runtime/brianlib/common_math.h")),
    ("dynamic_array.h", include_str!("../../runtime/brianlib/dynamic_array.h")),
    ("network.cpp", include_str!("../../runtime/brianlib/network.cpp")),
    ("network.h", include_str!("../../runtime/brianlib/network.h")),
    ("spikequeue.h", include_str!("../../runtime/brianlib/spikequeue.h")),
];

#[test]
fn test_runtime_sources() {
    for (name, source) in BRIANLIB {
        if name.ends_with(".h") {
            assert!(source.starts_with("#ifndef _BRIAN_"), "{name} lacks an include guard");
        }
    }
    assert!(BRIANLIB.iter().any(|(name, _)| *name == "spikequeue.h"));
}
