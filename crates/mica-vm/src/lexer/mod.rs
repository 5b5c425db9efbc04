// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lexical analysis (tokenization) for Mica source code.
//!
//! The lexer transforms source text into a stream of tokens that can be
//! consumed by the parser. Newlines are significant: they separate the
//! expressions of a block, so the scanner reports them as `Line` tokens
//! except where an expression obviously continues (after an operator, a
//! comma, `=`, or inside parentheses).
//!
//! ## Structure
//!
//! - `scanner.rs` - Main `Scanner` struct that produces tokens
//! - `token.rs` - `Token` and `TokenKind` definitions
//!
//! ## Usage
//!
//! ```rust
//! use mica_vm::lexer::{Scanner, TokenKind};
//!
//! let mut scanner = Scanner::new("def main() = 1 + 2");
//!
//! loop {
//!     let token = scanner.next_token();
//!     if matches!(token.kind, TokenKind::Eof) {
//!         break;
//!     }
//!     println!("{:?}", token.kind);
//! }
//! ```

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{Span, Token, TokenKind};
