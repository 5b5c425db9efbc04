// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The main parser implementation.

use thiserror::Error;

use crate::ast::*;
use crate::lexer::{Scanner, Span, Token, TokenKind};

/// A parsing error with source location.
///
/// `line` and `column` are 1-based and come from the token the parser was
/// looking at when it gave up.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    /// What went wrong
    pub message: String,
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
}

/// A recursive descent parser for Mica.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Creates a new parser for the given source code.
    pub fn new(source: &str) -> Self {
        Self {
            tokens: Scanner::new(source).tokenize(),
            position: 0,
        }
    }

    /// Parses the source code into a module named `name`.
    pub fn parse_module(&mut self, name: &str) -> Result<ModuleAst, ParseError> {
        let mut module = ModuleAst {
            name: name.to_string(),
            ..ModuleAst::default()
        };

        self.skip_lines();

        while !self.is_at_end() {
            match self.current().kind {
                TokenKind::Import => {
                    self.advance();
                    module.imports.push(self.expect_name()?);
                }
                TokenKind::Def => module.methods.push(self.parse_method()?),
                _ => return Err(self.error("Expected 'def' or 'import'")),
            }

            if !self.is_at_end() {
                self.expect(&TokenKind::Line)?;
            }
        }

        Ok(module)
    }

    /// Parses a single expression that must make up the whole input.
    pub fn parse_standalone_expression(&mut self) -> Result<Expr, ParseError> {
        self.skip_lines();
        let body = self.parse_block(&[TokenKind::Eof])?;
        Ok(body)
    }

    /// Parses `def name(pattern) = expr` or the multi-line form ending in
    /// `end`.
    pub(super) fn parse_method(&mut self) -> Result<MethodAst, ParseError> {
        self.expect(&TokenKind::Def)?;
        let name = self.expect_name()?;

        self.expect(&TokenKind::LeftParen)?;
        let parameter = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_pattern()?)
        };
        self.expect(&TokenKind::RightParen)?;

        let body = if self.match_token(&TokenKind::Equals) {
            self.parse_expression()?
        } else if self.match_token(&TokenKind::Line) {
            let body = self.parse_block(&[TokenKind::End])?;
            self.expect(&TokenKind::End)?;
            body
        } else {
            return Err(self.error("Expected '=' or a newline after the parameter list"));
        };

        Ok(MethodAst {
            name,
            parameter,
            body,
        })
    }

    /// Parses newline-separated expressions up to (not including) one of
    /// `terminators`.
    pub(super) fn parse_block(&mut self, terminators: &[TokenKind]) -> Result<Expr, ParseError> {
        let mut expressions = Vec::new();

        loop {
            self.skip_lines();
            if terminators.contains(&self.current().kind) {
                break;
            }
            if self.is_at_end() {
                return Err(self.error("Unexpected end of input inside a block"));
            }

            expressions.push(self.parse_expression()?);

            if terminators.contains(&self.current().kind) {
                break;
            }
            self.expect(&TokenKind::Line)?;
        }

        Ok(Expr::Sequence(expressions))
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    pub(super) fn current(&self) -> &Token {
        // The token list always ends with Eof, so clamp to it.
        let index = self.position.min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    pub(super) fn peek_kind(&self, distance: usize) -> &TokenKind {
        let index = (self.position + distance).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    pub(super) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !self.is_at_end() {
            self.position += 1;
        }
        token
    }

    pub(super) fn is_at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    pub(super) fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    pub(super) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(&format!(
                "Expected {}, found {}",
                kind,
                self.current().kind
            )))
        }
    }

    pub(super) fn expect_name(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Name(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(self.error(&format!("Expected a name, found {}", other))),
        }
    }

    pub(super) fn skip_lines(&mut self) {
        while self.check(&TokenKind::Line) {
            self.advance();
        }
    }

    pub(super) fn error(&self, message: &str) -> ParseError {
        let Span { line, column, .. } = self.current().span;
        ParseError {
            message: message.to_string(),
            line,
            column,
        }
    }
}
