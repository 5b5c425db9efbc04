// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Mica runtime types and the shared VM context.

pub mod context;
pub mod method;
pub mod module;
pub mod object;
pub mod value;

pub use context::{Vm, VmConfig, builtin};
pub use method::{Method, MethodTable, Primitive};
pub use module::{Module, ModuleRegistry};
pub use object::{RecordType, RecordTypes, SymbolTable};
pub use value::Value;
