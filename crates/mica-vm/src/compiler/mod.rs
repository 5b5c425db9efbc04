//! Bytecode compiler.
//!
//! Turns a parsed module into register bytecode and installs it in a [`Vm`].
//!
//! # Module Structure
//!
//! - `bytecode`: Instruction encoding and per-method constant pools
//! - `codegen`: Code generation from the syntax tree
//!   - `codegen::registers`: Register allocation
//!   - `codegen::scope`: Local variable resolution
//!
//! [`Vm`]: crate::runtime::Vm

pub mod bytecode;
pub mod codegen;

pub use bytecode::{Bytecode, Instruction, OpCode, Operand};
pub use codegen::{CompileError, CompileErrors, Compiler, compile_method, compile_module};
