//! CLI support for expressive
//!
//! Provides programmatic access to the expressive CLI functionality for
//! embedding in other tools.

mod check;
mod convert;
mod functions;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use convert::{record_from_json, schema_from_json};
pub use functions::list_functions;

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    /// Lexing, parsing, compilation or value error
    #[error("{0}")]
    Engine(#[from] crate::Error),

    /// JSON parsing error
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed model schema
    #[error("Invalid schema: {0}")]
    Schema(String),

    /// Compiling requires a schema
    #[error("No schema provided. Use --schema to describe the model, or --syntax-only.")]
    NoSchema,
}
