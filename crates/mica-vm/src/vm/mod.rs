// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode virtual machine.
//!
//! ## Structure
//!
//! - `fiber` - Call frames, the register stack and the dispatch loop
//! - `error` - Runtime faults

mod error;
mod fiber;

#[cfg(test)]
mod tests;

pub use error::VmError;
pub use fiber::{CallFrame, Fiber, FiberResult, Uncaught};
