//! Recursive-descent parser from tokens to a [`Definition`].

use std::collections::HashMap;

use ncd_ir::{Attribute, Definition, Entry, KindRegistry, Value};

use crate::error::LoadError;
use crate::token::{Token, TokenKind};

/// Keyword introducing the optional definition header.
pub const HEADER_KEYWORD: &str = "definition";

/// Parses a token stream (ending in `Eof`) into a definition.
///
/// Entry kinds are checked against `kinds` and entry names for uniqueness
/// while parsing; references are left as names for [`resolve`](crate::resolve).
pub fn parse(
    tokens: &[Token],
    fallback_name: &str,
    kinds: &KindRegistry,
) -> Result<Definition, LoadError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        kinds,
    };
    parser.parse_definition(fallback_name)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    kinds: &'a KindRegistry,
}

impl<'a> Parser<'a> {
    fn current(&self) -> &'a Token {
        // The lexer always terminates the stream with Eof and we never advance past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> &'a Token {
        let tok = self.current();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn skip_newlines(&mut self) {
        while self.at(&TokenKind::Newline) {
            self.bump();
        }
    }

    fn error_here(&self, reason: String) -> LoadError {
        let tok = self.current();
        LoadError::Parse {
            line: tok.line,
            column: tok.column,
            reason,
        }
    }

    fn expected(&self, what: &str) -> LoadError {
        self.error_here(format!(
            "expected {what}, found {}",
            self.current().kind.describe()
        ))
    }

    fn expect_ident(&mut self, what: &str) -> Result<&'a Token, LoadError> {
        match &self.current().kind {
            TokenKind::Ident(_) => Ok(self.bump()),
            _ => Err(self.expected(what)),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), LoadError> {
        if self.at(&kind) {
            self.bump();
            Ok(())
        } else {
            Err(self.expected(what))
        }
    }

    fn parse_definition(&mut self, fallback_name: &str) -> Result<Definition, LoadError> {
        self.skip_newlines();
        let mut name = fallback_name.to_string();
        if matches!(&self.current().kind, TokenKind::Ident(kw) if kw == HEADER_KEYWORD) {
            self.bump();
            name = ident_text(self.expect_ident("a definition name")?);
            self.expect_line_end()?;
        }

        let mut definition = Definition::new(name);
        let mut seen: HashMap<String, u32> = HashMap::new();
        loop {
            self.skip_newlines();
            if self.at(&TokenKind::Eof) {
                break;
            }
            let entry = self.parse_entry()?;
            if let Some(&first_line) = seen.get(&entry.name) {
                return Err(LoadError::DuplicateName {
                    name: entry.name,
                    line: entry.line,
                    column: entry.column,
                    first_line,
                });
            }
            seen.insert(entry.name.clone(), entry.line);
            definition.entries.push(entry);
        }
        Ok(definition)
    }

    fn expect_line_end(&mut self) -> Result<(), LoadError> {
        match self.current().kind {
            TokenKind::Newline => {
                self.bump();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.expected("end of line")),
        }
    }

    fn parse_entry(&mut self) -> Result<Entry, LoadError> {
        let kind_tok = self.expect_ident("an entry kind")?;
        let kind = ident_text(kind_tok);
        if !self.kinds.contains(&kind) {
            return Err(LoadError::UnknownKind {
                kind,
                line: kind_tok.line,
                column: kind_tok.column,
            });
        }
        let name = ident_text(self.expect_ident("an entry name")?);
        self.skip_newlines();
        self.expect(TokenKind::LBrace, "'{'")?;

        let mut attributes: Vec<Attribute> = Vec::new();
        loop {
            self.skip_separators();
            if self.at(&TokenKind::RBrace) {
                self.bump();
                break;
            }
            let attr = self.parse_attribute()?;
            if attributes.iter().any(|a| a.name == attr.name) {
                return Err(LoadError::Parse {
                    line: attr.line,
                    column: attr.column,
                    reason: format!("attribute '{}' repeated in entry '{name}'", attr.name),
                });
            }
            attributes.push(attr);
            match self.current().kind {
                TokenKind::Comma | TokenKind::Newline | TokenKind::RBrace => {}
                _ => return Err(self.expected("',', end of line or '}'")),
            }
        }

        Ok(Entry {
            kind,
            name,
            attributes,
            line: kind_tok.line,
            column: kind_tok.column,
        })
    }

    fn skip_separators(&mut self) {
        while matches!(self.current().kind, TokenKind::Comma | TokenKind::Newline) {
            self.bump();
        }
    }

    fn parse_attribute(&mut self) -> Result<Attribute, LoadError> {
        let name_tok = self.expect_ident("an attribute name or '}'")?;
        self.expect(TokenKind::Eq, "'='")?;
        let value = match &self.current().kind {
            TokenKind::Str(s) => Value::Str(s.clone()),
            TokenKind::Int(i) => Value::Int(*i),
            TokenKind::Float(x) => Value::Float(*x),
            TokenKind::Ref(target) => Value::Ref(target.clone()),
            TokenKind::Ident(word) if word == "true" => Value::Bool(true),
            TokenKind::Ident(word) if word == "false" => Value::Bool(false),
            _ => return Err(self.expected("a value")),
        };
        self.bump();
        Ok(Attribute {
            name: ident_text(name_tok),
            value,
            line: name_tok.line,
            column: name_tok.column,
        })
    }
}

fn ident_text(tok: &Token) -> String {
    match &tok.kind {
        TokenKind::Ident(name) => name.clone(),
        _ => String::new(),
    }
}
