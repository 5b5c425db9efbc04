// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Mica value representation.

use crate::gc::{GcRef, Trace, Tracer};
use crate::vm::VmError;

/// A Mica value.
///
/// Values are small and `Copy`; strings and records live on the garbage
/// collected heap and are referenced by [`GcRef`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    /// `nothing`
    #[default]
    Nothing,
    /// `true` / `false`
    Bool(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// Heap string
    String(GcRef),
    /// Heap record
    Record(GcRef),
}

impl Value {
    /// Returns true if this value is `nothing`.
    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Nothing)
    }

    /// Boolean coercion: only `false` and `nothing` are false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nothing | Value::Bool(false))
    }

    /// Numeric coercion. Only numbers convert.
    pub fn to_number(&self) -> Result<f64, VmError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(VmError::NotANumber {
                found: other.type_name(),
            }),
        }
    }

    /// The record reference, if this is a record.
    pub fn to_record(&self) -> Result<GcRef, VmError> {
        match self {
            Value::Record(gc_ref) => Ok(*gc_ref),
            other => Err(VmError::NotARecord {
                found: other.type_name(),
            }),
        }
    }

    /// Returns the type of this value as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nothing => "nothing",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Record(_) => "record",
        }
    }
}

impl Trace for Value {
    fn trace(&self, tracer: &mut Tracer) {
        match self {
            Value::String(gc_ref) | Value::Record(gc_ref) => tracer.mark(*gc_ref),
            Value::Nothing | Value::Bool(_) | Value::Number(_) => {}
        }
    }
}
