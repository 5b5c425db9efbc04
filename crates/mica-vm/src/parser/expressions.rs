// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Expression parsing.
//!
//! Precedence, loosest first: record literal, flow expressions (`val`,
//! `if`, `do`, `return`, `throw`, nested `def`), `or`, `and`, `not`, `<`,
//! `+ -`, `* /`, unary minus, calls and primaries.

use super::parser::{ParseError, Parser};
use crate::ast::*;
use crate::lexer::TokenKind;

impl Parser {
    /// Parses a full expression, including an unparenthesized record.
    pub(super) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.current().kind, TokenKind::Field(_)) {
            self.parse_record()
        } else {
            self.parse_flow()
        }
    }

    fn parse_record(&mut self) -> Result<Expr, ParseError> {
        let mut fields = Vec::new();

        loop {
            let TokenKind::Field(name) = self.current().kind.clone() else {
                return Err(self.error("Expected a field name"));
            };
            self.advance();

            if fields.iter().any(|(existing, _)| existing == &name) {
                return Err(self.error(&format!("Duplicate field '{}'", name)));
            }
            let value = self.parse_flow()?;
            fields.push((name, value));

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(Expr::Record(fields))
    }

    fn parse_flow(&mut self) -> Result<Expr, ParseError> {
        match self.current().kind {
            TokenKind::Val | TokenKind::Var => self.parse_variable(),
            TokenKind::If => self.parse_if(),
            TokenKind::Do => {
                self.advance();
                self.expect(&TokenKind::Line)?;
                let body = self.parse_block(&[TokenKind::End])?;
                self.expect(&TokenKind::End)?;
                Ok(body)
            }
            TokenKind::Return => {
                self.advance();
                if self.at_expression_end() {
                    Ok(Expr::Return(None))
                } else {
                    Ok(Expr::Return(Some(Box::new(self.parse_expression()?))))
                }
            }
            TokenKind::Throw => {
                self.advance();
                Ok(Expr::Throw(Box::new(self.parse_expression()?)))
            }
            TokenKind::Def => Ok(Expr::Def(Box::new(self.parse_method()?))),
            _ => self.parse_or(),
        }
    }

    fn parse_variable(&mut self) -> Result<Expr, ParseError> {
        let mutable = self.advance().kind == TokenKind::Var;
        let pattern = self.parse_pattern()?;
        self.expect(&TokenKind::Equals)?;
        let value = self.parse_expression()?;

        Ok(Expr::Variable {
            mutable,
            pattern,
            value: Box::new(value),
        })
    }

    fn parse_if(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::If)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::Then)?;

        if self.match_token(&TokenKind::Line) {
            // Block form: the then-arm runs until `else` or `end`.
            let then_arm = self.parse_block(&[TokenKind::Else, TokenKind::End])?;
            let else_arm = if self.match_token(&TokenKind::Else) {
                Some(self.parse_else_arm()?)
            } else {
                self.expect(&TokenKind::End)?;
                None
            };
            return Ok(Self::make_if(condition, then_arm, else_arm));
        }

        let then_arm = self.parse_expression()?;
        let has_else = self.check(&TokenKind::Else)
            || (self.check(&TokenKind::Line) && self.peek_kind(1) == &TokenKind::Else);

        let else_arm = if has_else {
            self.skip_lines();
            self.expect(&TokenKind::Else)?;
            Some(self.parse_else_arm()?)
        } else {
            None
        };

        Ok(Self::make_if(condition, then_arm, else_arm))
    }

    /// `else expr` on one line, or `else` NEWLINE block `end`.
    fn parse_else_arm(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&TokenKind::Line) {
            let arm = self.parse_block(&[TokenKind::End])?;
            self.expect(&TokenKind::End)?;
            Ok(arm)
        } else {
            self.parse_expression()
        }
    }

    fn make_if(condition: Expr, then_arm: Expr, else_arm: Option<Expr>) -> Expr {
        Expr::If {
            condition: Box::new(condition),
            then_arm: Box::new(then_arm),
            else_arm: else_arm.map(Box::new),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.match_token(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.match_token(&TokenKind::And) {
            let right = self.parse_not()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&TokenKind::Not) {
            let operand = self.parse_not()?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        if self.match_token(&TokenKind::LessThan) {
            let right = self.parse_additive()?;
            left = Expr::binary(BinaryOp::LessThan, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&TokenKind::Minus) {
            let operand = self.parse_unary()?;
            // Fold negative literals so they stay in the constant pool.
            return Ok(match operand {
                Expr::Number(n) => Expr::Number(-n),
                other => Expr::binary(BinaryOp::Subtract, Expr::Number(0.0), other),
            });
        }
        self.parse_call()
    }

    fn parse_call(&mut self) -> Result<Expr, ParseError> {
        let TokenKind::Name(name) = &self.current().kind else {
            return self.parse_primary();
        };
        if self.peek_kind(1) != &TokenKind::LeftParen {
            return self.parse_primary();
        }

        let name = name.clone();
        self.advance();
        self.advance();

        let argument = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RightParen)?;

        Ok(Expr::call(name, argument))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let expr = match &self.current().kind {
            TokenKind::Number(n) => Expr::Number(*n),
            TokenKind::String(s) => Expr::String(s.clone()),
            TokenKind::True => Expr::Bool(true),
            TokenKind::False => Expr::Bool(false),
            TokenKind::Nothing => Expr::Nothing,
            TokenKind::Name(name) => Expr::Name(name.clone()),
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(inner);
            }
            other => {
                return Err(self.error(&format!("Expected expression, found {}", other)));
            }
        };
        self.advance();
        Ok(expr)
    }

    /// True if the current token cannot start an operand.
    fn at_expression_end(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Line
                | TokenKind::Eof
                | TokenKind::End
                | TokenKind::Else
                | TokenKind::RightParen
                | TokenKind::Comma
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::Parser;

    fn parse_body(body: &str) -> Expr {
        let source = format!("def main()\n{}\nend", body);
        let mut module = Parser::new(&source)
            .parse_module("test")
            .expect("Should parse");
        let Expr::Sequence(mut exprs) = module.methods.remove(0).body else {
            panic!("Expected a block body");
        };
        assert_eq!(exprs.len(), 1, "Expected a single expression");
        exprs.remove(0)
    }

    #[test]
    fn test_precedence() {
        let expr = parse_body("1 + 2 * 3");
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Add,
                Expr::Number(1.0),
                Expr::binary(BinaryOp::Multiply, Expr::Number(2.0), Expr::Number(3.0))
            )
        );
    }

    #[test]
    fn test_left_associative() {
        let expr = parse_body("8 - 2 - 1");
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Subtract,
                Expr::binary(BinaryOp::Subtract, Expr::Number(8.0), Expr::Number(2.0)),
                Expr::Number(1.0)
            )
        );
    }

    #[test]
    fn test_comparison_binds_looser_than_arithmetic() {
        let expr = parse_body("a + 1 < b");
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::LessThan, .. }));
    }

    #[test]
    fn test_logical_precedence() {
        let expr = parse_body("not a or b and c");
        let Expr::Logical { op: LogicalOp::Or, left, right } = expr else {
            panic!("Expected 'or' at the root");
        };
        assert_eq!(*left, Expr::Not(Box::new(Expr::name("a"))));
        assert!(matches!(*right, Expr::Logical { op: LogicalOp::And, .. }));
    }

    #[test]
    fn test_negative_literal_folds() {
        assert_eq!(parse_body("-4"), Expr::Number(-4.0));
        assert_eq!(
            parse_body("-x"),
            Expr::binary(BinaryOp::Subtract, Expr::Number(0.0), Expr::name("x"))
        );
    }

    #[test]
    fn test_call_without_argument() {
        assert_eq!(parse_body("f()"), Expr::call("f", None));
    }

    #[test]
    fn test_call_with_record_argument() {
        let expr = parse_body("f(x: 1, y: 2)");
        let Expr::Call { argument: Some(arg), .. } = expr else {
            panic!("Expected a call with an argument");
        };
        assert_eq!(
            *arg,
            Expr::Record(vec![
                ("x".into(), Expr::Number(1.0)),
                ("y".into(), Expr::Number(2.0)),
            ])
        );
    }

    #[test]
    fn test_duplicate_record_field() {
        let result = Parser::new("def main() = x: 1, x: 2").parse_module("test");
        assert!(result.is_err());
    }

    #[test]
    fn test_single_line_if() {
        let expr = parse_body("if a then 1 else 2");
        assert_eq!(
            expr,
            Expr::If {
                condition: Box::new(Expr::name("a")),
                then_arm: Box::new(Expr::Number(1.0)),
                else_arm: Some(Box::new(Expr::Number(2.0))),
            }
        );
    }

    #[test]
    fn test_if_without_else() {
        let Expr::If { else_arm, .. } = parse_body("if a then 1") else {
            panic!("Expected if");
        };
        assert!(else_arm.is_none());
    }

    #[test]
    fn test_else_on_next_line() {
        let Expr::If { else_arm, .. } = parse_body("if a then 1\nelse 2") else {
            panic!("Expected if");
        };
        assert_eq!(else_arm, Some(Box::new(Expr::Number(2.0))));
    }

    #[test]
    fn test_block_if() {
        let expr = parse_body("if a then\n  print(1)\n  2\nelse\n  3\nend");
        let Expr::If { then_arm, else_arm, .. } = expr else {
            panic!("Expected if");
        };
        assert!(matches!(*then_arm, Expr::Sequence(ref e) if e.len() == 2));
        assert!(matches!(else_arm.as_deref(), Some(Expr::Sequence(e)) if e.len() == 1));
    }

    #[test]
    fn test_block_if_without_else() {
        let expr = parse_body("if a then\n  1\nend");
        assert!(matches!(expr, Expr::If { else_arm: None, .. }));
    }

    #[test]
    fn test_do_block() {
        let expr = parse_body("do\n  val a = 1\n  a\nend");
        assert!(matches!(expr, Expr::Sequence(ref e) if e.len() == 2));
    }

    #[test]
    fn test_variable_declaration() {
        let expr = parse_body("var x = 1 + 2");
        assert!(matches!(
            expr,
            Expr::Variable { mutable: true, pattern: Pattern::Variable(ref n), .. } if n == "x"
        ));
    }

    #[test]
    fn test_return_forms() {
        assert_eq!(parse_body("return"), Expr::Return(None));
        assert_eq!(
            parse_body("return 3"),
            Expr::Return(Some(Box::new(Expr::Number(3.0))))
        );
    }

    #[test]
    fn test_throw() {
        assert_eq!(
            parse_body("throw \"bad\""),
            Expr::Throw(Box::new(Expr::String("bad".into())))
        );
    }

    #[test]
    fn test_nested_def() {
        let Expr::Def(method) = parse_body("def inner(y) = y * 2") else {
            panic!("Expected a nested def");
        };
        assert_eq!(method.name, "inner");
    }

    #[test]
    fn test_parenthesized_newlines() {
        let expr = parse_body("(1 +\n 2)");
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Add, .. }));
    }
}
