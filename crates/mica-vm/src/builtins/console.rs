// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Program output.

use crate::runtime::{Value, Vm};
use crate::vm::VmError;

/// `print(x)`: writes one line and returns its argument.
pub fn print(vm: &mut Vm, value: Value) -> Result<Value, VmError> {
    let line = vm.display(value)?;
    vm.write_line(line);
    Ok(value)
}
