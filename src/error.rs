//! Error taxonomy shared by every stage of the engine.
//!
//! Everything that can go wrong is detected while compiling; a compiled
//! predicate never fails. Errors that point into the expression carry a
//! [`Diagnostic`], whose `Display` renders the developer-facing message:
//!
//! ```text
//! Parse error on line 1, column 10:
//! ... =! true ...
//!     ^--- Invalid token.
//! ```

use std::fmt;

use thiserror::Error;

use crate::ast::Location;

/// Maximum number of characters of context reproduced in a diagnostic.
pub const CONTEXT_WIDTH: usize = 100;

pub type Result<T> = std::result::Result<T, Error>;

/// A located message about an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Location,
    pub message: String,
    pub expression: String,
}

impl Diagnostic {
    pub fn new(location: Location, message: impl Into<String>, expression: impl Into<String>) -> Self {
        Diagnostic {
            location,
            message: message.into(),
            expression: expression.into(),
        }
    }

    /// Rest of the offending line, starting at the diagnostic's column.
    fn context(&self) -> String {
        let line = self
            .expression
            .split('\n')
            .nth(self.location.line.saturating_sub(1))
            .unwrap_or("");
        line.trim_end_matches('\r')
            .chars()
            .skip(self.location.column.saturating_sub(1))
            .collect()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let context = self.context();
        if context.is_empty() {
            return write!(
                f,
                "Parse error on line {}, last column: {}",
                self.location.line, self.message
            );
        }

        let snippet: String = context.chars().take(CONTEXT_WIDTH).collect();
        write!(
            f,
            "Parse error on line {}, column {}:\n... {} ...\n    ^--- {}",
            self.location.line, self.location.column, snippet, self.message
        )
    }
}

/// Errors produced while building models, registering functions or
/// compiling expressions.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum Error {
    /// Lexing or parsing failure
    #[error("{0}")]
    Syntax(Diagnostic),

    /// A field path segment that the model does not have
    #[error("{diagnostic}")]
    Resolution { segment: String, diagnostic: Diagnostic },

    /// Operands that cannot meet under the given operator or function
    #[error("{0}")]
    TypeMismatch(Diagnostic),

    /// No registered signature accepts the call's arguments
    #[error("{diagnostic}")]
    UnresolvedFunction { name: String, diagnostic: Diagnostic },

    /// Registering a (name, parameter types) pair that already exists
    #[error("Function {name}({params}) is already registered.")]
    DuplicateSignature { name: String, params: String },

    /// A rule attached where it can never have an effect
    #[error("{0}")]
    Misuse(String),

    /// Display name lookup on a field without display metadata
    #[error("No display name provided for {field} field.")]
    MissingDisplayName { field: String },

    /// A host value that does not fit the declared field type
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl Error {
    pub fn syntax(location: Location, message: impl Into<String>, expression: &str) -> Self {
        Error::Syntax(Diagnostic::new(location, message, expression))
    }

    pub fn type_mismatch(location: Location, message: impl Into<String>, expression: &str) -> Self {
        Error::TypeMismatch(Diagnostic::new(location, message, expression))
    }

    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The located diagnostic, for the errors that have one.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Error::Syntax(d) | Error::TypeMismatch(d) => Some(d),
            Error::Resolution { diagnostic, .. } | Error::UnresolvedFunction { diagnostic, .. } => {
                Some(diagnostic)
            }
            _ => None,
        }
    }

    pub fn location(&self) -> Option<Location> {
        self.diagnostic().map(|d| d.location)
    }
}

#[test]
fn test_diagnostic_points_at_column() {
    let d = Diagnostic::new(Location::new(1, 10), "Invalid token.", "GoAbroad =! true");
    assert_eq!(
        d.to_string(),
        "Parse error on line 1, column 10:\n... =! true ...\n    ^--- Invalid token."
    );
}

#[test]
fn test_diagnostic_at_end_of_input() {
    let d = Diagnostic::new(Location::new(1, 12), "Unexpected end.", "GoAbroad ==");
    assert_eq!(d.to_string(), "Parse error on line 1, last column: Unexpected end.");
}

#[test]
fn test_diagnostic_context_is_bounded() {
    let expression = format!("A == {}", "x".repeat(300));
    let d = Diagnostic::new(Location::new(1, 6), "Too long.", expression);
    let rendered = d.to_string();
    let snippet = rendered.lines().nth(1).unwrap();
    assert_eq!(snippet.len(), "... ".len() + CONTEXT_WIDTH + " ...".len());
}
