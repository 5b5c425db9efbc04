// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Token definitions for the Mica lexer.

use std::fmt;

/// A span in the source code, representing a range of characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// 1-based line of the first character
    pub line: usize,
    /// 1-based column of the first character
    pub column: usize,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Returns the length of this span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if this span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The span in the source code
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The different kinds of tokens in Mica.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Numeric literal
    Number(f64),
    /// String literal (escapes already processed)
    String(String),
    /// Identifier
    Name(String),
    /// A record field label: an identifier directly followed by `:`
    Field(String),

    // Punctuators
    LeftParen,
    RightParen,
    Comma,
    Equals,
    Plus,
    Minus,
    Star,
    Slash,
    LessThan,

    // Keywords
    And,
    Case,
    Catch,
    Def,
    Do,
    End,
    Else,
    False,
    For,
    If,
    Import,
    Is,
    Match,
    Not,
    Nothing,
    Or,
    Return,
    Then,
    Throw,
    True,
    Val,
    Var,
    While,
    Xor,

    /// A significant newline
    Line,
    /// Unrecognized input
    Error(String),
    /// End of input
    Eof,
}

impl TokenKind {
    /// Looks up the keyword spelled by `ident`, if any.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        let kind = match ident {
            "and" => TokenKind::And,
            "case" => TokenKind::Case,
            "catch" => TokenKind::Catch,
            "def" => TokenKind::Def,
            "do" => TokenKind::Do,
            "end" => TokenKind::End,
            "else" => TokenKind::Else,
            "false" => TokenKind::False,
            "for" => TokenKind::For,
            "if" => TokenKind::If,
            "import" => TokenKind::Import,
            "is" => TokenKind::Is,
            "match" => TokenKind::Match,
            "not" => TokenKind::Not,
            "nothing" => TokenKind::Nothing,
            "or" => TokenKind::Or,
            "return" => TokenKind::Return,
            "then" => TokenKind::Then,
            "throw" => TokenKind::Throw,
            "true" => TokenKind::True,
            "val" => TokenKind::Val,
            "var" => TokenKind::Var,
            "while" => TokenKind::While,
            "xor" => TokenKind::Xor,
            _ => return None,
        };
        Some(kind)
    }

    /// Returns true if a newline directly after this token cannot end an
    /// expression, so the scanner should swallow it.
    pub fn continues_expression(&self) -> bool {
        matches!(
            self,
            TokenKind::LeftParen
                | TokenKind::Comma
                | TokenKind::Equals
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::LessThan
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Not
                | TokenKind::Field(_)
                | TokenKind::Line
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::String(s) => write!(f, "string \"{}\"", s),
            TokenKind::Name(name) => write!(f, "name '{}'", name),
            TokenKind::Field(name) => write!(f, "field '{}:'", name),
            TokenKind::LeftParen => write!(f, "'('"),
            TokenKind::RightParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Equals => write!(f, "'='"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::LessThan => write!(f, "'<'"),
            TokenKind::Line => write!(f, "newline"),
            TokenKind::Error(text) => write!(f, "invalid input '{}'", text),
            TokenKind::Eof => write!(f, "end of input"),
            keyword => write!(f, "keyword '{}'", format!("{:?}", keyword).to_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::keyword("def"), Some(TokenKind::Def));
        assert_eq!(TokenKind::keyword("nothing"), Some(TokenKind::Nothing));
        assert_eq!(TokenKind::keyword("define"), None);
    }

    #[test]
    fn test_keyword_display() {
        assert_eq!(TokenKind::Then.to_string(), "keyword 'then'");
        assert_eq!(TokenKind::Name("x".into()).to_string(), "name 'x'");
    }
}
