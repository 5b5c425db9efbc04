// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Math builtins and the `math` host module.

use crate::runtime::{Module, Value, Vm};
use crate::vm::VmError;

/// Ratio of circumference to diameter
pub const PI: f64 = std::f64::consts::PI;

/// Euler's number
pub const E: f64 = std::f64::consts::E;

/// `sqrt(x)`: square root of `x`. Negative input gives NaN.
pub fn sqrt(_vm: &mut Vm, value: Value) -> Result<Value, VmError> {
    Ok(Value::Number(value.to_number()?.sqrt()))
}

/// The `math` module.
pub fn module() -> Module {
    let mut math = Module::new("math");
    math.export("pi", Value::Number(PI));
    math.export("e", Value::Number(E));
    math.export("infinity", Value::Number(f64::INFINITY));
    math
}
