// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Built-in methods and host modules.
//!
//! Builtins are primitive methods: the fiber calls them synchronously
//! inside CALL and stores the result in the caller's argument register.
//!
//! - `print(x)`: writes the display form of `x`, returns `x`
//! - `toString(x)`: the display form of `x` as a new string
//! - `sqrt(x)`: square root of a number
//!
//! The `math` module exports `pi`, `e` and `infinity`.

pub mod console;
pub mod math;
pub mod string;

use tracing::{trace, warn};

use crate::runtime::Vm;

/// Registers every builtin method and host module with `vm`.
pub fn install(vm: &mut Vm) {
    vm.define_native("print", console::print);
    vm.define_native("toString", string::to_string);
    vm.define_native("sqrt", math::sqrt);

    match vm.define_module(math::module()) {
        Some(math) => trace!(methods = vm.methods.len(), math, "installed builtins"),
        None => warn!("a module named 'math' already exists"),
    }
}
