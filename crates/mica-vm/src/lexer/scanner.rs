// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The scanner that produces tokens from source text.

use unicode_xid::UnicodeXID;

use super::{Span, Token, TokenKind};

/// A scanner that tokenizes Mica source code.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    line_start: usize,
    /// Nesting depth of parentheses; newlines inside them are insignificant
    paren_depth: usize,
    /// Kind of the last token handed out
    last: TokenKind,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            line_start: 0,
            paren_depth: 0,
            // Leading newlines are never significant.
            last: TokenKind::Line,
        }
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        let token = self.scan_token();
        self.last = token.kind.clone();
        token
    }

    /// Scans every remaining token, ending with `Eof`.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn scan_token(&mut self) -> Token {
        loop {
            self.skip_whitespace_and_comments();

            if self.peek() != Some('\n') {
                break;
            }

            let start = self.current_pos;
            let (line, column) = self.position(start);
            self.advance();
            self.new_line();

            if self.paren_depth > 0 || self.last.continues_expression() {
                continue;
            }

            // Collapse runs of blank lines into one token.
            loop {
                self.skip_whitespace_and_comments();
                if self.peek() != Some('\n') {
                    break;
                }
                self.advance();
                self.new_line();
            }
            return Token::new(TokenKind::Line, Span::new(start, start + 1, line, column));
        }

        let start = self.current_pos;
        let (line, column) = self.position(start);

        let Some((_pos, ch)) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start, line, column));
        };

        let kind = match ch {
            '(' => {
                self.paren_depth += 1;
                TokenKind::LeftParen
            }
            ')' => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                TokenKind::RightParen
            }
            ',' => TokenKind::Comma,
            '=' => TokenKind::Equals,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '<' => TokenKind::LessThan,
            '"' => self.scan_string(),
            '0'..='9' => self.scan_number(start),
            _ if is_id_start(ch) => self.scan_identifier(start),
            other => TokenKind::Error(other.to_string()),
        };

        Token::new(kind, Span::new(start, self.current_pos, line, column))
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn new_line(&mut self) {
        self.line += 1;
        self.line_start = self.current_pos;
    }

    fn position(&self, offset: usize) -> (usize, usize) {
        (self.line, offset - self.line_start + 1)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    // Comment runs to the end of the line; the newline itself stays.
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_string(&mut self) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return TokenKind::Error("unterminated string".into()),
                Some((_, '"')) => return TokenKind::String(value),
                Some((_, '\\')) => match self.advance() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, '"')) => value.push('"'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, other)) => {
                        return TokenKind::Error(format!("unknown escape '\\{}'", other));
                    }
                    None => return TokenKind::Error("unterminated string".into()),
                },
                Some((_, '\n')) => {
                    value.push('\n');
                    self.new_line();
                }
                Some((_, ch)) => value.push(ch),
            }
        }
    }

    fn scan_number(&mut self, start: usize) -> TokenKind {
        while matches!(self.peek(), Some('0'..='9')) {
            self.advance();
        }

        // Only treat the dot as a fraction when a digit follows it.
        if self.peek() == Some('.') && matches!(self.peek_next(), Some('0'..='9')) {
            self.advance();
            while matches!(self.peek(), Some('0'..='9')) {
                self.advance();
            }
        }

        let text = &self.source[start..self.current_pos];
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Error(text.to_string()),
        }
    }

    fn scan_identifier(&mut self, start: usize) -> TokenKind {
        while let Some(ch) = self.peek() {
            if !is_id_continue(ch) {
                break;
            }
            self.advance();
        }

        let text = &self.source[start..self.current_pos];

        if self.peek() == Some(':') {
            self.advance();
            return TokenKind::Field(text.to_string());
        }

        TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Name(text.to_string()))
    }
}

fn is_id_start(ch: char) -> bool {
    ch == '_' || UnicodeXID::is_xid_start(ch)
}

fn is_id_continue(ch: char) -> bool {
    UnicodeXID::is_xid_continue(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .tokenize()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_scan_method_header() {
        assert_eq!(
            kinds("def f(x) = x + 1"),
            vec![
                TokenKind::Def,
                TokenKind::Name("f".into()),
                TokenKind::LeftParen,
                TokenKind::Name("x".into()),
                TokenKind::RightParen,
                TokenKind::Equals,
                TokenKind::Name("x".into()),
                TokenKind::Plus,
                TokenKind::Number(1.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newlines_collapse() {
        assert_eq!(
            kinds("a\n\n\n  b"),
            vec![
                TokenKind::Name("a".into()),
                TokenKind::Line,
                TokenKind::Name("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_after_operator_is_ignored() {
        assert_eq!(
            kinds("1 +\n2"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Plus,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_inside_parens_is_ignored() {
        assert_eq!(
            kinds("f(\n1\n)"),
            vec![
                TokenKind::Name("f".into()),
                TokenKind::LeftParen,
                TokenKind::Number(1.0),
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_leading_newlines_and_comments() {
        assert_eq!(
            kinds("// header\n\nnothing // trailing\n"),
            vec![TokenKind::Nothing, TokenKind::Line, TokenKind::Eof]
        );
    }

    #[test]
    fn test_field_token() {
        assert_eq!(
            kinds("x: 1"),
            vec![TokenKind::Field("x".into()), TokenKind::Number(1.0), TokenKind::Eof]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("3.25")[0], TokenKind::Number(3.25));
        assert_eq!(kinds("42")[0], TokenKind::Number(42.0));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\n\"b\"""#)[0],
            TokenKind::String("a\n\"b\"".into())
        );
        assert!(matches!(kinds("\"open")[0], TokenKind::Error(_)));
    }

    #[test]
    fn test_span_positions() {
        let tokens = Scanner::new("a\n  b").tokenize();
        assert_eq!((tokens[0].span.line, tokens[0].span.column), (1, 1));
        assert_eq!((tokens[2].span.line, tokens[2].span.column), (2, 3));
    }

    #[test]
    fn test_invalid_character() {
        assert_eq!(kinds("@")[0], TokenKind::Error("@".into()));
    }
}
