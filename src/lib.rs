pub mod ast;
pub mod cache;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod rules;
pub mod toolchain;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinOp, Expr, Literal, Location, Token, TokenKind, UnaryOp};
pub use cache::{CacheStats, CompilationCache, Engine};
pub use error::{Diagnostic, Error, Result};
pub use evaluator::{CompileOptions, CompiledPredicate, Compiler, compile};
pub use lexer::{Lexer, tokenize};
pub use model::{
    Accessor, CoarseType, EnumType, FieldDescriptor, Model, ModelType, ModelTypeBuilder, NumericKind,
    ResolvedField, UnknownSegment, ValueType, segments_collide,
};
pub use parser::{Parser, parse};
pub use rules::{AssertThat, RequiredIf, Violation};
pub use toolchain::{Signature, Toolchain};
pub use value::{Record, RecordBuilder, Value};
