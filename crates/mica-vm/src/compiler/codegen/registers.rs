// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Register allocation.
//!
//! Registers are handed out from the top of a stack of in-use flags.
//! Temporaries are released in reverse order and simply pop, but a variable
//! may outlive temporaries allocated before it. Releasing such a temporary
//! leaves a hole under the variable that is reclaimed only once everything
//! above it has been released too, so a variable's register never changes
//! and never collides with a live temporary.

/// Operands are one byte wide.
pub const MAX_REGISTERS: usize = 256;

/// Tracks which registers of the current method are in use.
#[derive(Debug, Default)]
pub struct Registers {
    in_use: Vec<bool>,
    max: usize,
}

impl Registers {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the register above every register in use. Returns `None`
    /// when the one-byte operand space is exhausted.
    pub fn allocate(&mut self) -> Option<u8> {
        if self.in_use.len() >= MAX_REGISTERS {
            return None;
        }
        self.in_use.push(true);
        self.max = self.max.max(self.in_use.len());
        u8::try_from(self.in_use.len() - 1).ok()
    }

    /// Frees `register` and trims free registers off the top.
    pub fn release(&mut self, register: u8) {
        if let Some(flag) = self.in_use.get_mut(register as usize) {
            *flag = false;
        }
        while self.in_use.last() == Some(&false) {
            self.in_use.pop();
        }
    }

    /// Number of registers the method needs.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Number of registers currently in use.
    #[cfg(test)]
    pub fn live(&self) -> usize {
        self.in_use.iter().filter(|used| **used).count()
    }

    /// Returns true if `register` is allocated.
    #[cfg(test)]
    pub fn is_live(&self, register: u8) -> bool {
        self.in_use.get(register as usize).copied().unwrap_or(false)
    }
}
