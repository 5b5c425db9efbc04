// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Slot arena with a free list and a mark-and-sweep collector.
//!
//! ```text
//! slots:  [ obj ][ --- ][ obj ][ obj ][ --- ]
//!                  ↑                    ↑
//! free:   [ 4, 1 ]  (reused last-in first-out)
//! ```

use tracing::debug;

use super::object::{GcRef, Object, Trace, Tracer};
use crate::vm::VmError;

/// Collector tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcConfig {
    /// Allocations between collections before the first collection
    pub initial_threshold: usize,
    /// After a collection the threshold becomes `live * growth_factor`
    /// (never below `initial_threshold`)
    pub growth_factor: f64,
    /// Collect at every safepoint that follows an allocation
    pub stress: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 1024,
            growth_factor: 2.0,
            stress: false,
        }
    }
}

/// Running collector statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Completed collections
    pub collections: usize,
    /// Objects freed over all collections
    pub freed: usize,
    /// Objects alive after the last collection
    pub live: usize,
}

/// A freshly allocated object.
///
/// The object stays pinned (treated as a root) until the owner of the heap
/// reaches a safepoint and calls [`Heap::release_temps`]. Store the
/// reference somewhere rooted before that happens.
#[must_use = "a fresh allocation must be stored somewhere rooted"]
#[derive(Debug)]
pub struct Temp(GcRef);

impl Temp {
    /// The pinned reference.
    pub fn get(&self) -> GcRef {
        self.0
    }
}

/// The garbage-collected heap.
pub struct Heap {
    slots: Vec<Option<Object>>,
    free: Vec<usize>,
    pinned: Vec<GcRef>,
    allocated_since_collection: usize,
    threshold: usize,
    requested: bool,
    config: GcConfig,
    stats: GcStats,
}

impl Heap {
    /// Creates an empty heap.
    pub fn new(config: GcConfig) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            pinned: Vec::new(),
            allocated_since_collection: 0,
            threshold: config.initial_threshold.max(1),
            requested: false,
            config,
            stats: GcStats::default(),
        }
    }

    /// Allocates `object` and pins it.
    pub fn alloc(&mut self, object: Object) -> Temp {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(object);
                index
            }
            None => {
                self.slots.push(Some(object));
                self.slots.len() - 1
            }
        };

        let gc_ref = GcRef::new(index);
        self.pinned.push(gc_ref);
        self.allocated_since_collection += 1;
        Temp(gc_ref)
    }

    /// Allocates a string.
    pub fn alloc_string(&mut self, text: impl Into<String>) -> Temp {
        self.alloc(Object::String(text.into()))
    }

    /// Reads an object.
    pub fn get(&self, gc_ref: GcRef) -> Result<&Object, VmError> {
        self.slots
            .get(gc_ref.index())
            .and_then(Option::as_ref)
            .ok_or(VmError::DanglingReference(gc_ref.index()))
    }

    /// Reads a string object.
    pub fn string(&self, gc_ref: GcRef) -> Result<&str, VmError> {
        match self.get(gc_ref)? {
            Object::String(text) => Ok(text),
            Object::Record { .. } => Err(VmError::NotAString { found: "record" }),
        }
    }

    /// Unpins every outstanding [`Temp`].
    pub fn release_temps(&mut self) {
        self.pinned.clear();
    }

    /// Number of currently pinned allocations.
    #[cfg(test)]
    pub fn pinned_count(&self) -> usize {
        self.pinned.len()
    }

    /// Asks for a collection at the next safepoint regardless of the
    /// allocation threshold.
    pub fn request_collection(&mut self) {
        self.requested = true;
    }

    /// Returns true if the next safepoint should pause for a collection.
    pub fn is_collection_due(&self) -> bool {
        self.requested
            || self.allocated_since_collection >= self.threshold
            || (self.config.stress && self.allocated_since_collection > 0)
    }

    /// Number of live (occupied) slots.
    pub fn live_objects(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Statistics so far.
    pub fn stats(&self) -> GcStats {
        self.stats
    }

    /// Runs a full collection. `mark_roots` reports every root outside the
    /// heap; pinned temps are added automatically.
    pub fn collect(&mut self, mark_roots: impl FnOnce(&mut Tracer)) -> GcStats {
        let mut tracer = Tracer::new(self.slots.len());

        for gc_ref in &self.pinned {
            tracer.mark(*gc_ref);
        }
        mark_roots(&mut tracer);

        while let Some(gc_ref) = tracer.pop_gray() {
            if let Some(Some(object)) = self.slots.get(gc_ref.index()) {
                object.trace(&mut tracer);
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !tracer.is_marked(index) {
                *slot = None;
                self.free.push(index);
                freed += 1;
            }
        }

        let live = self.live_objects();
        self.stats.collections += 1;
        self.stats.freed += freed;
        self.stats.live = live;

        let grown = (live as f64 * self.config.growth_factor) as usize;
        self.threshold = grown.max(self.config.initial_threshold).max(1);
        self.allocated_since_collection = 0;
        self.requested = false;

        debug!(
            collection = self.stats.collections,
            freed,
            live,
            next_threshold = self.threshold,
            "garbage collection finished"
        );

        self.stats
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(GcConfig::default())
    }
}
