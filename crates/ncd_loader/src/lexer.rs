//! Lexical analyzer for definition text.
//!
//! Produces a flat token vector ending in [`TokenKind::Eof`]. Whitespace
//! other than newlines is skipped, `#` starts a comment running to the end
//! of the line, and newlines are kept as tokens because they separate
//! attributes. The first malformed token aborts lexing.

use crate::error::LoadError;
use crate::token::{Token, TokenKind};

/// Lexes `source` into tokens.
pub fn lex(source: &str) -> Result<Vec<Token>, LoadError> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        line: 1,
        column: 1,
    };
    lexer.lex_all()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

impl<'a> Lexer<'a> {
    fn lex_all(&mut self) -> Result<Vec<Token>, LoadError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_blanks_and_comments();
            let (line, column) = (self.line, self.column);
            if self.pos >= self.source.len() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    column,
                });
                return Ok(tokens);
            }
            let kind = self.next_kind()?;
            tokens.push(Token { kind, line, column });
        }
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn advance(&mut self) -> u8 {
        let b = self.source[self.pos];
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if b & 0xC0 != 0x80 {
            // Count characters, not UTF-8 continuation bytes.
            self.column += 1;
        }
        b
    }

    fn error(&self, line: u32, column: u32, reason: impl Into<String>) -> LoadError {
        LoadError::Parse {
            line,
            column,
            reason: reason.into(),
        }
    }

    fn skip_blanks_and_comments(&mut self) {
        while self.pos < self.source.len() {
            match self.peek() {
                b' ' | b'\t' | b'\r' => {
                    self.advance();
                }
                b'#' => {
                    while self.pos < self.source.len() && self.peek() != b'\n' {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_kind(&mut self) -> Result<TokenKind, LoadError> {
        let (line, column) = (self.line, self.column);
        let b = self.peek();
        match b {
            b'\n' => {
                self.advance();
                Ok(TokenKind::Newline)
            }
            b'{' => {
                self.advance();
                Ok(TokenKind::LBrace)
            }
            b'}' => {
                self.advance();
                Ok(TokenKind::RBrace)
            }
            b'=' => {
                self.advance();
                Ok(TokenKind::Eq)
            }
            b',' => {
                self.advance();
                Ok(TokenKind::Comma)
            }
            b'"' => self.lex_string(),
            b'@' => {
                self.advance();
                if !is_ident_start(self.peek()) {
                    return Err(self.error(line, column, "expected an entry name after '@'"));
                }
                Ok(TokenKind::Ref(self.lex_ident_text()))
            }
            b'-' | b'0'..=b'9' => self.lex_number(),
            _ if is_ident_start(b) => Ok(TokenKind::Ident(self.lex_ident_text())),
            _ => {
                let shown = std::str::from_utf8(&self.source[self.pos..])
                    .ok()
                    .and_then(|s| s.chars().next())
                    .unwrap_or('?');
                Err(self.error(line, column, format!("unexpected character '{shown}'")))
            }
        }
    }

    fn lex_ident_text(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.peek()) {
            self.advance();
        }
        // Identifier bytes are ASCII by construction.
        String::from_utf8_lossy(&self.source[start..self.pos]).into_owned()
    }

    fn lex_number(&mut self) -> Result<TokenKind, LoadError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        if self.peek() == b'-' {
            self.advance();
        }
        if !self.peek().is_ascii_digit() {
            return Err(self.error(line, column, "expected a digit after '-'"));
        }
        let mut is_float = false;
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' && self.peek_at(1).is_ascii_digit() {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        if matches!(self.peek(), b'e' | b'E') {
            let sign = usize::from(matches!(self.peek_at(1), b'+' | b'-'));
            if self.peek_at(1 + sign).is_ascii_digit() {
                is_float = true;
                for _ in 0..=sign {
                    self.advance();
                }
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }
        if is_ident_start(self.peek()) {
            return Err(self.error(line, column, "malformed number literal"));
        }

        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|e| self.error(line, column, format!("invalid float '{text}': {e}")))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|e| self.error(line, column, format!("invalid integer '{text}': {e}")))
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, LoadError> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut bytes = Vec::new();
        loop {
            if self.pos >= self.source.len() || self.peek() == b'\n' {
                return Err(self.error(line, column, "unterminated string literal"));
            }
            match self.advance() {
                b'"' => break,
                b'\\' => {
                    let (esc_line, esc_column) = (self.line, self.column);
                    if self.pos >= self.source.len() {
                        return Err(self.error(line, column, "unterminated string literal"));
                    }
                    let decoded = match self.advance() {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        b'"' => b'"',
                        b'\\' => b'\\',
                        other => {
                            return Err(self.error(
                                esc_line,
                                esc_column,
                                format!("unknown escape '\\{}'", other as char),
                            ))
                        }
                    };
                    bytes.push(decoded);
                }
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes)
            .map(TokenKind::Str)
            .map_err(|_| self.error(line, column, "string literal is not valid UTF-8"))
    }
}
