// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiled methods and the global method table.

use std::fmt::Write;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::context::Vm;
use super::value::Value;
use crate::compiler::Bytecode;
use crate::gc::{Heap, Trace, Tracer};
use crate::vm::VmError;

/// A host function backing a builtin method.
pub type Primitive = fn(&mut Vm, Value) -> Result<Value, VmError>;

/// An immutable compiled method.
///
/// Built once by the compiler and then shared by every frame that runs it.
#[derive(Debug, Clone)]
pub struct Method {
    /// The method name
    pub name: String,
    /// Instructions and constant pool
    pub bytecode: Bytecode,
    /// Methods defined inside this one, bound at run time by DEF_METHOD
    pub methods: Vec<Arc<Method>>,
    /// Highest number of registers live at once
    pub num_registers: usize,
    /// Native implementation, for builtins
    pub primitive: Option<Primitive>,
    /// Id of the module this method was compiled in
    pub module: usize,
}

impl Method {
    /// Creates a builtin method.
    pub fn native(name: &str, module: usize, primitive: Primitive) -> Self {
        Self {
            name: name.to_string(),
            bytecode: Bytecode::new(),
            methods: Vec::new(),
            num_registers: 1,
            primitive: Some(primitive),
            module,
        }
    }

    /// Returns true for builtin methods.
    pub fn is_native(&self) -> bool {
        self.primitive.is_some()
    }

    /// Renders the instructions, constants and nested methods.
    pub fn disassemble(&self, heap: &Heap) -> String {
        let mut out = String::new();
        self.write_disassembly(heap, 0, &mut out);
        out
    }

    fn write_disassembly(&self, heap: &Heap, indent: usize, out: &mut String) {
        let pad = " ".repeat(indent);

        if self.is_native() {
            let _ = writeln!(out, "{pad}method {} (native)", self.name);
            return;
        }

        let _ = writeln!(
            out,
            "{pad}method {} ({} registers)",
            self.name, self.num_registers
        );
        for (index, instruction) in self.bytecode.instructions.iter().enumerate() {
            let _ = writeln!(out, "{pad}{:>4}  {}", index, instruction);
        }

        if !self.bytecode.constants.is_empty() {
            let _ = writeln!(out, "{pad}constants:");
            for (index, constant) in self.bytecode.constants.iter().enumerate() {
                let text = match constant {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => match heap.string(*s) {
                        Ok(text) => format!("{:?}", text),
                        Err(err) => format!("<{}>", err),
                    },
                    other => other.type_name().to_string(),
                };
                let _ = writeln!(out, "{pad}{:>4}  k{} = {}", "", index, text);
            }
        }

        for (index, nested) in self.methods.iter().enumerate() {
            let _ = writeln!(out, "{pad}nested #{}:", index);
            nested.write_disassembly(heap, indent + 4, out);
        }
    }
}

impl Trace for Method {
    fn trace(&self, tracer: &mut Tracer) {
        for constant in &self.bytecode.constants {
            constant.trace(tracer);
        }
        for nested in &self.methods {
            nested.trace(tracer);
        }
    }
}

/// The process-wide mapping from method name to method.
///
/// Names are declared before any body is compiled, so calls are resolved
/// to indices at compile time even for mutually recursive methods. A
/// declared slot stays empty until it is defined.
#[derive(Debug, Default)]
pub struct MethodTable {
    methods: Vec<Option<Arc<Method>>>,
    names: Vec<String>,
    by_name: FxHashMap<String, usize>,
}

impl MethodTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a slot for `name`, or returns the existing one.
    pub fn declare(&mut self, name: &str) -> usize {
        if let Some(index) = self.by_name.get(name) {
            return *index;
        }
        let index = self.methods.len();
        self.methods.push(None);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), index);
        index
    }

    /// Declares `name` and fills its slot.
    pub fn define(&mut self, name: &str, method: Arc<Method>) -> usize {
        let index = self.declare(name);
        self.methods[index] = Some(method);
        index
    }

    /// Fills an already declared slot.
    pub fn define_index(&mut self, index: usize, method: Arc<Method>) -> Result<(), VmError> {
        let slot = self
            .methods
            .get_mut(index)
            .ok_or(VmError::UnknownMethod(index))?;
        *slot = Some(method);
        Ok(())
    }

    /// Looks up the slot for `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Returns the method at `index`, failing if it was only declared.
    pub fn get(&self, index: usize) -> Result<&Arc<Method>, VmError> {
        match self.methods.get(index) {
            Some(Some(method)) => Ok(method),
            Some(None) => Err(VmError::UndefinedMethod {
                name: self.names[index].clone(),
            }),
            None => Err(VmError::UnknownMethod(index)),
        }
    }

    /// Returns true if `name` has a definition.
    pub fn is_defined(&self, name: &str) -> bool {
        self.find(name)
            .is_some_and(|index| self.methods[index].is_some())
    }

    /// Number of declared slots.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns true if nothing has been declared.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Iterates over every defined method.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Method>> {
        self.methods.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(_vm: &mut Vm, value: Value) -> Result<Value, VmError> {
        Ok(value)
    }

    #[test]
    fn test_declare_is_idempotent() {
        let mut table = MethodTable::new();
        let first = table.declare("f");
        let second = table.declare("f");
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_declared_but_undefined() {
        let mut table = MethodTable::new();
        let index = table.declare("f");
        assert_eq!(
            table.get(index).unwrap_err(),
            VmError::UndefinedMethod { name: "f".into() }
        );
        assert!(!table.is_defined("f"));
    }

    #[test]
    fn test_define_fills_slot() {
        let mut table = MethodTable::new();
        let index = table.declare("id");
        table
            .define_index(index, Arc::new(Method::native("id", 0, identity)))
            .unwrap();
        assert!(table.is_defined("id"));
        assert!(table.get(index).unwrap().is_native());
        assert_eq!(table.iter().count(), 1);
    }

    #[test]
    fn test_unknown_index() {
        let table = MethodTable::new();
        assert_eq!(table.get(3).unwrap_err(), VmError::UnknownMethod(3));
        assert!(table.find("missing").is_none());
    }
}
