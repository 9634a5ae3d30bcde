//! Token types for the definition syntax.

/// The kind of a lexed token, with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// An identifier: kind names, entry names, attribute names, keywords.
    Ident(String),
    /// A decoded string literal.
    Str(String),
    /// An integer literal.
    Int(i64),
    /// A float literal.
    Float(f64),
    /// A reference `@name`, carrying the name.
    Ref(String),
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `=`
    Eq,
    /// `,`
    Comma,
    /// End of a line. Significant as an attribute separator.
    Newline,
    /// End of input. Always the last token.
    Eof,
}

impl TokenKind {
    /// Short description for "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Int(_) => "integer".to_string(),
            TokenKind::Float(_) => "float".to_string(),
            TokenKind::Ref(name) => format!("reference '@{name}'"),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was lexed.
    pub kind: TokenKind,
    /// 1-based line.
    pub line: u32,
    /// 1-based column (in characters).
    pub column: u32,
}
