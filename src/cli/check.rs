//! Check expressions and evaluate them against JSON input

use super::{CliError, record_from_json, schema_from_json};
use crate::{CompileOptions, Toolchain, compile, parse};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The expression to check
    pub expression: String,
    /// JSON schema of the model
    pub schema: Option<String>,
    /// JSON instance of the model
    pub input: Option<String>,
    /// Only validate syntax, don't compile
    pub syntax_only: bool,
    /// Match names ignoring case
    pub ignore_case: bool,
}

/// Result of a check operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    /// Syntax validation passed
    SyntaxValid,
    /// Expression compiled against the named model
    Compiled(String),
    /// Expression evaluated against the input
    Evaluated(bool),
}

/// Execute a check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    if options.syntax_only {
        parse(&options.expression)?;
        return Ok(CheckResult::SyntaxValid);
    }

    let schema = options.schema.as_ref().ok_or(CliError::NoSchema)?;
    let schema: serde_json::Value = serde_json::from_str(schema)?;
    let model = schema_from_json(&schema)?;

    let compile_options = if options.ignore_case {
        CompileOptions::ignore_case()
    } else {
        CompileOptions::default()
    };
    let predicate = compile(&options.expression, &model, &Toolchain::new(), compile_options)?;

    let Some(input) = &options.input else {
        return Ok(CheckResult::Compiled(model.name().to_string()));
    };
    let input: serde_json::Value = serde_json::from_str(input)?;
    let record = record_from_json(&model, &input)?;

    Ok(CheckResult::Evaluated(predicate.evaluate(&record)))
}
