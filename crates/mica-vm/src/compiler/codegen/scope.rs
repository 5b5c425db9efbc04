// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Scope management for local name resolution during compilation.

/// A named local bound to a register.
#[derive(Debug, Clone)]
pub struct Local {
    /// The variable name
    pub name: String,
    /// The register holding the value
    pub register: u8,
    /// The scope depth where this was declared
    pub depth: usize,
}

/// The locals visible at the current point of a method.
#[derive(Debug, Default)]
pub struct Scope {
    /// Locals in declaration order
    pub locals: Vec<Local>,
    /// Current scope depth
    pub depth: usize,
}

impl Scope {
    /// Creates a new scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new scope.
    pub fn begin_scope(&mut self) {
        self.depth += 1;
    }

    /// End the current scope and return the registers of the locals it
    /// declared, innermost first.
    pub fn end_scope(&mut self) -> Vec<u8> {
        let mut registers = Vec::new();
        while let Some(local) = self.locals.last() {
            if local.depth < self.depth {
                break;
            }
            registers.push(local.register);
            self.locals.pop();
        }
        self.depth = self.depth.saturating_sub(1);
        registers
    }

    /// Declare a local. Redeclaring a name shadows the earlier one.
    pub fn declare(&mut self, name: &str, register: u8) {
        self.locals.push(Local {
            name: name.to_string(),
            register,
            depth: self.depth,
        });
    }

    /// Resolve a name to the register of its nearest declaration.
    pub fn resolve(&self, name: &str) -> Option<u8> {
        self.locals
            .iter()
            .rev()
            .find(|local| local.name == name)
            .map(|local| local.register)
    }
}
