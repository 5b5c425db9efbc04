// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Binding patterns.

use super::parser::{ParseError, Parser};
use crate::ast::Pattern;
use crate::lexer::TokenKind;

impl Parser {
    /// Parses `_`, `name`, or a record pattern `x: p, y: q`.
    pub(super) fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        if !matches!(self.current().kind, TokenKind::Field(_)) {
            return self.parse_simple_pattern();
        }

        let mut fields = Vec::new();
        loop {
            let TokenKind::Field(name) = self.current().kind.clone() else {
                return Err(self.error("Expected a field name"));
            };
            self.advance();

            let pattern = self.parse_simple_pattern()?;
            fields.push((name, pattern));

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(Pattern::Record(fields))
    }

    fn parse_simple_pattern(&mut self) -> Result<Pattern, ParseError> {
        match &self.current().kind {
            TokenKind::Name(name) if name == "_" => {
                self.advance();
                Ok(Pattern::Wildcard)
            }
            TokenKind::Name(name) => {
                let pattern = Pattern::Variable(name.clone());
                self.advance();
                Ok(pattern)
            }
            TokenKind::LeftParen => {
                self.advance();
                let pattern = self.parse_pattern()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(pattern)
            }
            other => Err(self.error(&format!("Expected a pattern, found {}", other))),
        }
    }
}
