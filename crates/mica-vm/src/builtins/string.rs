// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! String builtins.

use crate::runtime::{Value, Vm};
use crate::vm::VmError;

/// `toString(x)`: allocates the display form of `x`.
///
/// A string argument is returned as is.
pub fn to_string(vm: &mut Vm, value: Value) -> Result<Value, VmError> {
    if let Value::String(_) = value {
        return Ok(value);
    }

    let text = vm.display(value)?;
    Ok(Value::String(vm.heap.alloc_string(text).get()))
}
