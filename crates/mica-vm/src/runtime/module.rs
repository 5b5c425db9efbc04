// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Modules: imports and named exports.

use rustc_hash::FxHashMap;

use super::value::Value;
use crate::gc::{Trace, Tracer};

/// A compiled or host module.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// The module name
    pub name: String,
    /// Ids of imported modules, in import order
    pub imports: Vec<usize>,
    /// Named exports, addressed by position
    exports: Vec<(String, Value)>,
}

impl Module {
    /// Creates a module with no imports or exports.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Adds an export and returns its index.
    pub fn export(&mut self, name: &str, value: Value) -> usize {
        self.exports.push((name.to_string(), value));
        self.exports.len() - 1
    }

    /// Position of the export called `name`.
    pub fn export_index(&self, name: &str) -> Option<usize> {
        self.exports.iter().position(|(export, _)| export == name)
    }

    /// Value of export `index`.
    pub fn export_value(&self, index: usize) -> Option<Value> {
        self.exports.get(index).map(|(_, value)| *value)
    }
}

impl Trace for Module {
    fn trace(&self, tracer: &mut Tracer) {
        for (_, value) in &self.exports {
            value.trace(tracer);
        }
    }
}

/// Every module known to the VM, by id.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: Vec<Module>,
    by_name: FxHashMap<String, usize>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module` under a fresh id. Returns `None` if the name is
    /// taken, since compiled code addresses imports and exports by position.
    pub fn add(&mut self, module: Module) -> Option<usize> {
        if self.by_name.contains_key(&module.name) {
            return None;
        }
        let id = self.modules.len();
        self.by_name.insert(module.name.clone(), id);
        self.modules.push(module);
        Some(id)
    }

    /// Unregisters the most recently added module, if `id` is that module.
    pub fn discard(&mut self, id: usize) {
        if id + 1 != self.modules.len() {
            return;
        }
        if let Some(module) = self.modules.pop() {
            self.by_name.remove(&module.name);
        }
    }

    /// Looks up a module id by name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Looks up a module by id.
    pub fn get(&self, id: usize) -> Option<&Module> {
        self.modules.get(id)
    }

    /// Iterates over every module.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }
}
