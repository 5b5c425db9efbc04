// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Precise mark-and-sweep garbage collector.
//!
//! Heap objects live in a slot arena and are addressed by [`GcRef`] indices.
//! Collection never happens behind the mutator's back: the fiber checks
//! [`Heap::is_collection_due`] between instructions and pauses, and the
//! driver calls [`crate::runtime::Vm::collect`] with every live fiber.
//!
//! Fresh allocations come back as a [`Temp`] and stay pinned until the next
//! safepoint, so an intermediate that has not yet reached a register is
//! always reachable.

mod heap;
mod object;

pub use heap::{GcConfig, GcStats, Heap, Temp};
pub use object::{GcRef, Object, Trace, Tracer};
