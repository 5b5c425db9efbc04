// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Heap object representation and tracing.

use std::fmt;

use crate::runtime::value::Value;

/// A reference to a garbage-collected object.
///
/// This is a plain slot index. Slots are reused after a sweep, so a
/// reference that outlives its object is detected as dangling when read
/// rather than silently aliasing.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcRef {
    index: u32,
}

impl GcRef {
    /// Creates a reference to slot `index`.
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index: index as u32,
        }
    }

    /// Returns the slot index of this reference.
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for GcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GcRef({})", self.index)
    }
}

/// A heap-allocated object.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// An immutable string
    String(String),
    /// A record; `values` are stored in the order of the record type's
    /// fields
    Record {
        /// Record type id
        ty: u8,
        /// Field values
        values: Vec<Value>,
    },
}

impl Trace for Object {
    fn trace(&self, tracer: &mut Tracer) {
        match self {
            Object::String(_) => {}
            Object::Record { values, .. } => {
                for value in values {
                    value.trace(tracer);
                }
            }
        }
    }
}

/// Anything that can hold references into the heap.
pub trait Trace {
    /// Reports every heap reference held by `self` to `tracer`.
    fn trace(&self, tracer: &mut Tracer);
}

/// Mark state for one collection: a mark bit per heap slot plus the gray
/// worklist of marked objects whose children have not been visited yet.
pub struct Tracer {
    marks: Vec<bool>,
    gray: Vec<GcRef>,
}

impl Tracer {
    pub(crate) fn new(slots: usize) -> Self {
        Self {
            marks: vec![false; slots],
            gray: Vec::new(),
        }
    }

    /// Marks `gc_ref` reachable.
    pub fn mark(&mut self, gc_ref: GcRef) {
        let Some(mark) = self.marks.get_mut(gc_ref.index()) else {
            return;
        };
        if !*mark {
            *mark = true;
            self.gray.push(gc_ref);
        }
    }

    /// Shorthand for tracing a single value.
    pub fn value(&mut self, value: &Value) {
        value.trace(self);
    }

    pub(crate) fn pop_gray(&mut self) -> Option<GcRef> {
        self.gray.pop()
    }

    pub(crate) fn is_marked(&self, index: usize) -> bool {
        self.marks.get(index).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_idempotent() {
        let mut tracer = Tracer::new(4);
        tracer.mark(GcRef::new(2));
        tracer.mark(GcRef::new(2));

        assert!(tracer.is_marked(2));
        assert!(!tracer.is_marked(1));
        assert_eq!(tracer.pop_gray(), Some(GcRef::new(2)));
        assert_eq!(tracer.pop_gray(), None);
    }

    #[test]
    fn test_record_traces_its_values() {
        let record = Object::Record {
            ty: 0,
            values: vec![Value::String(GcRef::new(1)), Value::Number(3.0)],
        };
        let mut tracer = Tracer::new(2);
        record.trace(&mut tracer);
        assert!(tracer.is_marked(1));
        assert!(!tracer.is_marked(0));
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", GcRef::new(7)), "GcRef(7)");
    }
}
