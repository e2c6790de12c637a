//! # Expression Language - Abstract Syntax Tree
//!
//! This module defines the tokens and the Abstract Syntax Tree (AST) of the
//! validation expression language: small boolean expressions attached to the
//! fields of a model, such as
//!
//! ```text
//! GoAbroad == true && Country != 'Poland'
//! ```
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens and their source locations
//! - **[expressions]** - Expression nodes (literals, field paths, calls, operations)
//! - **[operators]** - Unary and binary operators
//!
//! ## Precedence
//!
//! From loosest to tightest binding:
//!
//! ```text
//! ?:            right-associative conditional
//! ||
//! &&
//! == !=
//! < <= > >=
//! + -
//! * / %
//! ! -           unary
//! literal, field path, call, ( ... )
//! ```
//!
//! ## Examples
//!
//! ### Field paths
//!
//! ```text
//! ContactDetails.Email != null
//! ```
//!
//! ### Function calls
//!
//! ```text
//! StartsWith(Name, 'A') && Length(Name) > 3
//! ```
//!
//! ### Conditional
//!
//! ```text
//! (Age >= 18 ? 'adult' : 'minor') == 'adult'
//! ```
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::{Expr, Literal};
pub use operators::{BinOp, UnaryOp};
pub use tokens::{Location, Token, TokenKind};
