// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # mica-vm
//!
//! A small expression language compiled to register bytecode and run on
//! resumable fibers with a precise, pausing garbage collector.
//!
//! ## Overview
//!
//! - Lexer and recursive-descent parser for newline-sensitive source
//! - Compiler from the syntax tree to one-byte-operand register bytecode
//! - Fibers that pause at a safepoint whenever a collection is due
//! - A mark-and-sweep heap for strings and records
//! - Native builtins and host modules
//!
//! ## Quick Start
//!
//! ```rust
//! use mica_vm::{Engine, Value};
//!
//! let mut engine = Engine::new();
//! engine.load("def main() = 1 + 2", "main").unwrap();
//! assert_eq!(engine.run("main").unwrap(), Value::Number(3.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod builtins;
pub mod compiler;
pub mod gc;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod vm;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

pub use compiler::{CompileError, CompileErrors};
pub use gc::{GcConfig, GcStats};
pub use parser::ParseError;
pub use runtime::{Value, Vm, VmConfig};
pub use vm::{Fiber, FiberResult, Uncaught, VmError};

use ast::MethodAst;
use parser::Parser;

/// Name given to methods compiled by [`Engine::eval`].
pub const EVAL_METHOD: &str = "(eval)";

/// A VM plus the glue to load source into it and run it.
pub struct Engine {
    vm: Vm,
    /// Module whose imports are visible to `eval`
    eval_module: usize,
}

impl Engine {
    /// Creates an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Creates an engine with the given configuration.
    pub fn with_config(config: VmConfig) -> Self {
        Self {
            vm: Vm::with_config(config),
            eval_module: 0,
        }
    }

    /// Parses and compiles a module, installing its methods.
    ///
    /// Later calls to [`eval`](Self::eval) resolve imported names against
    /// this module. Nothing is installed if any method fails, and a name
    /// that is already loaded is rejected.
    pub fn load(&mut self, source: &str, module: &str) -> Result<usize> {
        let ast = Parser::new(source).parse_module(module)?;
        let id = compiler::compile_module(&mut self.vm, &ast)?;
        self.eval_module = id;
        Ok(id)
    }

    /// Loads a source file, naming the module after the file stem.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let source = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("main");
        self.load(&source, name)
    }

    /// Runs the method `entry` with no argument.
    pub fn run(&mut self, entry: &str) -> Result<Value> {
        if !self.vm.methods.is_defined(entry) {
            return Err(Error::MissingEntry(entry.to_string()));
        }
        let result = self.vm.run(entry, Value::Nothing);
        self.finish(result)
    }

    /// Evaluates an expression or block as the body of a fresh method.
    ///
    /// The method is not installed, so evaluating never defines a name
    /// except through a nested `def`.
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        let body = Parser::new(source).parse_standalone_expression()?;
        let ast = MethodAst {
            name: EVAL_METHOD.to_string(),
            parameter: None,
            body,
        };

        let method = compiler::compile_method(&mut self.vm, self.eval_module, &ast)?;
        debug!(
            instructions = method.bytecode.instructions.len(),
            "evaluating expression"
        );
        let result = self.vm.run_method(Arc::new(method), Value::Nothing);
        self.finish(result)
    }

    fn finish(&self, result: std::result::Result<Value, Uncaught>) -> Result<Value> {
        result.map_err(|uncaught| Error::Uncaught {
            message: self.vm.describe(&uncaught),
        })
    }

    /// Renders a value the way `print` would.
    pub fn display(&self, value: Value) -> String {
        self.vm
            .display(value)
            .unwrap_or_else(|err| format!("<{}>", err))
    }

    /// Disassembles every compiled method in definition order.
    pub fn disassemble(&self) -> String {
        self.vm
            .methods
            .iter()
            .filter(|method| !method.is_native())
            .map(|method| method.disassemble(&self.vm.heap))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Sends program output to a buffer instead of stdout.
    pub fn capture_output(&mut self) {
        self.vm.capture_output();
    }

    /// Returns and clears captured output.
    pub fn take_output(&mut self) -> Vec<String> {
        self.vm.take_output()
    }

    /// Collector statistics so far.
    pub fn gc_stats(&self) -> GcStats {
        self.vm.heap.stats()
    }

    /// The underlying VM.
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// The underlying VM, mutably.
    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors surfaced by [`Engine`].
#[derive(Debug, Error)]
pub enum Error {
    /// The source did not parse
    #[error("parse error at {0}")]
    Parse(#[from] ParseError),

    /// One or more methods failed to compile
    #[error("{0}")]
    Compile(#[from] CompileErrors),

    /// A fiber terminated with an uncaught throw or a fault
    #[error("{message}")]
    Uncaught {
        /// User-facing description
        message: String,
    },

    /// The entry method is not defined
    #[error("no method named '{0}' is defined")]
    MissingEntry(String),

    /// Reading source failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for [`Engine`] operations.
pub type Result<T> = std::result::Result<T, Error>;
