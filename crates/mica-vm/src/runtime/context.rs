// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The VM context: everything fibers and the compiler share.

use std::sync::Arc;

use tracing::{debug, trace};

use super::method::{Method, MethodTable, Primitive};
use super::module::{Module, ModuleRegistry};
use super::object::{RecordTypes, SymbolTable};
use super::value::Value;
use crate::builtins;
use crate::gc::{GcConfig, GcStats, Heap, Object, Trace};
use crate::vm::{Fiber, FiberResult, Uncaught, VmError};

/// Builtin value ids used by BUILT_IN.
pub mod builtin {
    /// `false`
    pub const FALSE: u8 = 0;
    /// `true`
    pub const TRUE: u8 = 1;
    /// `nothing`
    pub const NOTHING: u8 = 2;
}

/// VM configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VmConfig {
    /// Collector tuning
    pub gc: GcConfig,
}

/// Where `print` writes.
#[derive(Debug)]
enum Output {
    Stdout,
    Captured(Vec<String>),
}

/// The owned context passed to the compiler and to every fiber.
///
/// Holds the method table, the heap, interned symbols, record types and
/// modules. There is no ambient global state.
pub struct Vm {
    /// Global method table
    pub methods: MethodTable,
    /// Garbage-collected heap
    pub heap: Heap,
    /// Interned field names
    pub symbols: SymbolTable,
    /// Known record shapes
    pub record_types: RecordTypes,
    /// Compiled and host modules
    pub modules: ModuleRegistry,
    core_module: usize,
    output: Output,
}

impl Vm {
    /// Creates a VM with default configuration and the builtins installed.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Creates a VM with the given configuration.
    pub fn with_config(config: VmConfig) -> Self {
        let mut modules = ModuleRegistry::new();
        let core_module = modules.add(Module::new("core")).unwrap_or_default();

        let mut vm = Self {
            methods: MethodTable::new(),
            heap: Heap::new(config.gc),
            symbols: SymbolTable::new(),
            record_types: RecordTypes::new(),
            modules,
            core_module,
            output: Output::Stdout,
        };
        builtins::install(&mut vm);
        vm
    }

    /// Registers a builtin method.
    pub fn define_native(&mut self, name: &str, primitive: Primitive) -> usize {
        let method = Method::native(name, self.core_module, primitive);
        self.methods.define(name, Arc::new(method))
    }

    /// Registers a host module. Returns `None` if the name is taken.
    pub fn define_module(&mut self, module: Module) -> Option<usize> {
        self.modules.add(module)
    }

    /// Reads a VM-wide builtin value.
    pub fn builtin(&self, id: u8) -> Result<Value, VmError> {
        match id {
            builtin::FALSE => Ok(Value::Bool(false)),
            builtin::TRUE => Ok(Value::Bool(true)),
            builtin::NOTHING => Ok(Value::Nothing),
            other => Err(VmError::UnknownBuiltin(other)),
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Sends `print` output to a buffer instead of stdout.
    pub fn capture_output(&mut self) {
        self.output = Output::Captured(Vec::new());
    }

    /// Returns and clears captured output.
    pub fn take_output(&mut self) -> Vec<String> {
        match &mut self.output {
            Output::Captured(lines) => std::mem::take(lines),
            Output::Stdout => Vec::new(),
        }
    }

    /// Writes one line of program output.
    pub fn write_line(&mut self, line: String) {
        match &mut self.output {
            Output::Captured(lines) => lines.push(line),
            Output::Stdout => println!("{}", line),
        }
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Renders a value the way `print` shows it.
    pub fn display(&self, value: Value) -> Result<String, VmError> {
        let mut out = String::new();
        self.write_value(value, &mut out)?;
        Ok(out)
    }

    fn write_value(&self, value: Value, out: &mut String) -> Result<(), VmError> {
        match value {
            Value::Nothing => out.push_str("nothing"),
            Value::Bool(b) => out.push_str(if b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&n.to_string()),
            Value::String(s) => out.push_str(self.heap.string(s)?),
            Value::Record(r) => {
                let Object::Record { ty, values } = self.heap.get(r)? else {
                    return Err(VmError::NotARecord { found: "string" });
                };
                let ty = self
                    .record_types
                    .get(*ty as usize)
                    .ok_or(VmError::UnknownRecordType(*ty))?;

                out.push('(');
                for (i, (symbol, field)) in ty.fields.iter().zip(values).enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(self.symbols.name(*symbol).unwrap_or("?"));
                    out.push_str(": ");
                    self.write_value(*field, out)?;
                }
                out.push(')');
            }
        }
        Ok(())
    }

    /// Renders an uncaught error for the user.
    pub fn describe(&self, uncaught: &Uncaught) -> String {
        match uncaught {
            Uncaught::Thrown(value) => match self.display(*value) {
                Ok(text) => format!("uncaught {}", text),
                Err(err) => format!("uncaught value ({})", err),
            },
            Uncaught::Fault(err) => err.to_string(),
        }
    }

    // ========================================================================
    // Running
    // ========================================================================

    /// Runs the method defined as `name` on `argument` to completion,
    /// collecting whenever the fiber pauses.
    pub fn run(&mut self, name: &str, argument: Value) -> Result<Value, Uncaught> {
        let index = self
            .methods
            .find(name)
            .ok_or_else(|| Uncaught::Fault(VmError::UndefinedMethod { name: name.into() }))?;
        let method = Arc::clone(self.methods.get(index).map_err(Uncaught::Fault)?);
        self.run_method(method, argument)
    }

    /// Runs `method` on `argument` in a fresh fiber.
    pub fn run_method(&mut self, method: Arc<Method>, argument: Value) -> Result<Value, Uncaught> {
        if let Some(primitive) = method.primitive {
            return primitive(self, argument).map_err(Uncaught::Fault);
        }

        let mut fiber = Fiber::new(method, argument);
        loop {
            match fiber.run(self) {
                FiberResult::Done(value) => return Ok(value),
                FiberResult::PausedForGc => {
                    trace!("fiber paused for collection");
                    self.collect(&mut [&mut fiber]);
                }
                FiberResult::Uncaught(uncaught) => {
                    debug!(error = %self.describe(&uncaught), "fiber terminated");
                    return Err(uncaught);
                }
            }
        }
    }

    /// Collects garbage. Roots are every defined method, module exports,
    /// pinned temps and the given fibers.
    pub fn collect(&mut self, fibers: &mut [&mut Fiber]) -> GcStats {
        let Vm {
            heap,
            methods,
            modules,
            ..
        } = self;

        heap.collect(|tracer| {
            for method in methods.iter() {
                method.trace(tracer);
            }
            for module in modules.iter() {
                module.trace(tracer);
            }
            for fiber in fibers.iter_mut() {
                fiber.reach(tracer);
            }
        })
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
