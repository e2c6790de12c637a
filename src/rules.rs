//! Validation rules attached to model fields.
//!
//! [`RequiredIf`] demands a value when its expression holds; [`AssertThat`]
//! demands that its expression holds whenever the field has a value. Turning
//! a [`Violation`] into a user-facing response is up to the host.

use crate::{
    cache::Engine,
    error::{Error, Result},
    model::ModelType,
    value::{Record, Value},
};

/// A rule whose condition was not met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path of the validated field
    pub field: String,
    pub message: String,
}

/// Display name from metadata, falling back to the path itself.
fn display_name(model: &ModelType, field: &str) -> String {
    model.display_name(field).unwrap_or_else(|_| field.to_string())
}

fn read_field(record: &Record, field: &str) -> Result<Value> {
    record.read(field).ok_or_else(|| {
        Error::invalid_value(field, format!("{} has no such field", record.model().name()))
    })
}

/// The field is required when the expression evaluates to true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredIf {
    pub expression: String,
    /// Whether empty or whitespace-only strings count as values
    pub allow_empty_strings: bool,
}

impl RequiredIf {
    pub fn new(expression: impl Into<String>) -> Self {
        RequiredIf {
            expression: expression.into(),
            allow_empty_strings: false,
        }
    }

    pub fn allow_empty_strings(mut self, allow: bool) -> Self {
        self.allow_empty_strings = allow;
        self
    }

    /// Rejects targets that can never be absent: the rule could never fire.
    pub fn check_target(&self, model: &ModelType, field: &str) -> Result<()> {
        let descriptor = model
            .descriptor(field)
            .map_err(|e| Error::invalid_value(field, e.to_string()))?;
        let ty = &descriptor.value_type;
        if ty.is_non_nullable_value_type() {
            return Err(Error::Misuse(format!(
                "RequiredIf has no effect when applied to a field of non-nullable value type '{ty}'. \
                 Use nullable '{ty}?' version instead, or switch to AssertThat otherwise."
            )));
        }
        Ok(())
    }

    pub fn validate(&self, engine: &Engine, record: &Record, field: &str) -> Result<Option<Violation>> {
        let model = record.model();
        self.check_target(model, field)?;

        let value = read_field(record, field)?;
        let empty = value.as_str().is_some_and(|s| s.trim().is_empty());
        if !value.is_null() && !(empty && !self.allow_empty_strings) {
            return Ok(None);
        }

        if !engine.evaluate(model, &self.expression, record)? {
            return Ok(None);
        }
        Ok(Some(Violation {
            field: field.to_string(),
            message: format!(
                "The {} field is required by the following logic: {}",
                display_name(model, field),
                self.expression
            ),
        }))
    }
}

/// A present field value must satisfy the expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertThat {
    pub expression: String,
}

impl AssertThat {
    pub fn new(expression: impl Into<String>) -> Self {
        AssertThat {
            expression: expression.into(),
        }
    }

    pub fn validate(&self, engine: &Engine, record: &Record, field: &str) -> Result<Option<Violation>> {
        let model = record.model();
        if read_field(record, field)?.is_null() {
            return Ok(None);
        }

        if engine.evaluate(model, &self.expression, record)? {
            return Ok(None);
        }
        Ok(Some(Violation {
            field: field.to_string(),
            message: format!(
                "Assertion for {} field is not satisfied by the following logic: {}",
                display_name(model, field),
                self.expression
            ),
        }))
    }
}
