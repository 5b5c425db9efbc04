// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Parser for Mica source code.
//!
//! Transforms a stream of tokens into an Abstract Syntax Tree (AST).
//!
//! ## Structure
//!
//! - `parser` - Parser state, modules and method definitions
//! - `expressions` - Expression parsing (operators, literals, calls, control flow)
//! - `patterns` - Binding patterns for `val`/`var` and parameters
//!
//! ## Usage
//!
//! ```rust
//! use mica_vm::parser::Parser;
//!
//! let mut parser = Parser::new("def main() = 1 + 2");
//! let module = parser.parse_module("main").expect("Should parse");
//! assert_eq!(module.methods.len(), 1);
//! ```

mod expressions;
mod parser;
mod patterns;

pub use parser::{ParseError, Parser};
