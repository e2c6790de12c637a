use std::fmt;

use crate::ast::Literal;

/// Position of a token inside the original expression text.
///
/// Both coordinates are 1-based and always point at the first character of
/// the token they belong to. Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Location { line, column }
    }
}

impl Default for Location {
    fn default() -> Self {
        Location { line: 1, column: 1 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    /// `true` or `false`
    Bool,

    /// Integer or floating-point number
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 3.14
    /// 1e3
    /// ```
    Number,

    /// Single-quoted string literal, no escape processing
    ///
    /// # Examples
    /// ```text
    /// 'Poland'
    /// ''
    /// ```
    String,

    /// `null`
    Null,

    // Identifiers
    /// Field path, possibly dotted
    ///
    /// # Examples
    /// ```text
    /// Age
    /// ContactDetails.Email
    /// Stability.High
    /// ```
    Identifier,

    /// Identifier immediately followed by `(`
    ///
    /// # Examples
    /// ```text
    /// Today()
    /// StartsWith(Name, 'A')
    /// ```
    Function,

    // Logical
    /// `&&`
    And,
    /// `||`
    Or,
    /// `!`
    Not,

    // Comparison
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,

    // Arithmetic
    /// Addition or string concatenation
    Plus,
    /// Subtraction or negation
    Minus,
    Star,
    Slash,
    Percent,

    // Conditional
    /// `?` of `condition ? a : b`
    Question,
    /// `:` of `condition ? a : b`
    Colon,

    // Delimiters
    LParen,
    RParen,
    Comma,

    /// End of input
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Bool => "bool",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Null => "\"null\"",
            TokenKind::Identifier => "property",
            TokenKind::Function => "func",
            TokenKind::And => "\"&&\"",
            TokenKind::Or => "\"||\"",
            TokenKind::Not => "\"!\"",
            TokenKind::EqEq => "\"==\"",
            TokenKind::NotEq => "\"!=\"",
            TokenKind::Lt => "\"<\"",
            TokenKind::LtEq => "\"<=\"",
            TokenKind::Gt => "\">\"",
            TokenKind::GtEq => "\">=\"",
            TokenKind::Plus => "\"+\"",
            TokenKind::Minus => "\"-\"",
            TokenKind::Star => "\"*\"",
            TokenKind::Slash => "\"/\"",
            TokenKind::Percent => "\"%\"",
            TokenKind::Question => "\"?\"",
            TokenKind::Colon => "\":\"",
            TokenKind::LParen => "\"(\"",
            TokenKind::RParen => "\")\"",
            TokenKind::Comma => "\",\"",
            TokenKind::Eof => "end of expression",
        };
        f.write_str(text)
    }
}

/// A lexical token. Immutable once the lexer has produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Parsed literal value, only set for literal tokens
    pub value: Option<Literal>,
    /// Token text exactly as written (string tokens keep their quotes)
    pub raw: String,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, value: Option<Literal>, raw: impl Into<String>, location: Location) -> Self {
        Token {
            kind,
            value,
            raw: raw.into(),
            location,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" {:?} ({}, {})",
            self.raw, self.kind, self.location.line, self.location.column
        )
    }
}
