//! JSON -> model schema and record conversion utilities
//!
//! A schema describes one model:
//!
//! ```json
//! {
//!   "name": "Trip",
//!   "fields": [
//!     { "name": "GoAbroad", "type": "bool", "display": "Go abroad" },
//!     { "name": "Stay", "type": "i32?" },
//!     { "name": "Contact", "type": { "name": "Contact", "fields": [] } },
//!     { "name": "Stability", "type": { "enum": "Stability", "members": { "High": 0, "Low": 1 } } },
//!     { "name": "Tags", "type": { "array": "string" } }
//!   ]
//! }
//! ```
//!
//! Object types accept `"nullable": true`.

use std::{str::FromStr, sync::Arc};

use chrono::TimeDelta;
use rust_decimal::Decimal;
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use super::CliError;
use crate::{
    error::Error,
    model::{EnumType, ModelType, NumericKind, ValueType},
    value::{Record, Value, parse_datetime},
};

fn schema_error(message: impl Into<String>) -> CliError {
    CliError::Schema(message.into())
}

/// Build a model type from its JSON schema
pub fn schema_from_json(schema: &Json) -> Result<Arc<ModelType>, CliError> {
    let object = schema
        .as_object()
        .ok_or_else(|| schema_error("a schema must be an object"))?;
    let name = object
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| schema_error("a schema needs a \"name\""))?;
    let fields = object
        .get("fields")
        .and_then(Json::as_array)
        .ok_or_else(|| schema_error(format!("schema {name} needs a \"fields\" array")))?;

    let mut builder = ModelType::builder(name);
    for field in fields {
        let field_name = field
            .get("name")
            .and_then(Json::as_str)
            .ok_or_else(|| schema_error(format!("a field of {name} has no \"name\"")))?;
        let ty = field
            .get("type")
            .ok_or_else(|| schema_error(format!("field {name}.{field_name} has no \"type\"")))?;

        builder = builder.field(field_name, type_from_json(ty)?);
        if let Some(display) = field.get("display").and_then(Json::as_str) {
            builder = builder.display(display);
        }
    }
    Ok(builder.build())
}

fn type_from_json(ty: &Json) -> Result<ValueType, CliError> {
    match ty {
        Json::String(name) => ValueType::from_str(name).map_err(schema_error),
        Json::Object(object) => {
            let ty = object_type(object, ty)?;
            if object.get("nullable").and_then(Json::as_bool).unwrap_or(false) {
                Ok(ty.nullable())
            } else {
                Ok(ty)
            }
        }
        other => Err(schema_error(format!("unsupported type {other}"))),
    }
}

fn object_type(object: &Map<String, Json>, ty: &Json) -> Result<ValueType, CliError> {
    if let Some(element) = object.get("array") {
        return Ok(ValueType::array(type_from_json(element)?));
    }

    if let Some(name) = object.get("enum").and_then(Json::as_str) {
        let members = object
            .get("members")
            .and_then(Json::as_object)
            .ok_or_else(|| schema_error(format!("enum {name} needs a \"members\" object")))?;
        let members = members
            .iter()
            .map(|(member, value)| {
                value
                    .as_i64()
                    .map(|v| (member.clone(), v))
                    .ok_or_else(|| schema_error(format!("{name}.{member} must be an integer")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ValueType::Enum(EnumType::new(name, members)));
    }

    Ok(ValueType::Model(schema_from_json(ty)?))
}

/// Convert a JSON object to a record of `model`. Absent fields are null.
pub fn record_from_json(model: &Arc<ModelType>, json: &Json) -> Result<Record, CliError> {
    let object = json
        .as_object()
        .ok_or_else(|| Error::invalid_value(model.name(), "expected a JSON object"))?;

    let values = model
        .fields()
        .iter()
        .map(|field| {
            let json = object.get(&field.name).unwrap_or(&Json::Null);
            value_from_json(json, &field.value_type)
                .map_err(|message| Error::invalid_value(&field.name, message))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Record::from_values(model.clone(), values)?)
}

fn value_from_json(json: &Json, ty: &ValueType) -> Result<Value, String> {
    let mismatch = || format!("{json} is not a valid {ty}");

    let value = match (json, ty.underlying()) {
        (Json::Null, _) => Value::Null,
        (Json::Bool(b), ValueType::Bool) => Value::Bool(*b),
        (Json::Number(n), ValueType::Number(NumericKind::Decimal)) => {
            Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .map(Value::Decimal)
                .map_err(|_| mismatch())?
        }
        (Json::String(s), ValueType::Number(NumericKind::Decimal)) => {
            Decimal::from_str(s.trim()).map(Value::Decimal).map_err(|_| mismatch())?
        }
        (Json::Number(n), ValueType::Number(_)) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i as i128)
            } else if let Some(u) = n.as_u64() {
                Value::Int(u as i128)
            } else {
                n.as_f64().map(Value::Float).ok_or_else(mismatch)?
            }
        }
        (Json::String(s), ValueType::String) => Value::String(s.clone()),
        (Json::String(s), ValueType::DateTime) => parse_datetime(s).map(Value::DateTime).ok_or_else(mismatch)?,
        (Json::String(s), ValueType::TimeSpan) => parse_timespan(s).map(Value::TimeSpan).ok_or_else(mismatch)?,
        (Json::Number(n), ValueType::TimeSpan) => n
            .as_i64()
            .and_then(TimeDelta::try_seconds)
            .map(Value::TimeSpan)
            .ok_or_else(mismatch)?,
        (Json::String(s), ValueType::Guid) => Uuid::parse_str(s.trim()).map(Value::Guid).map_err(|_| mismatch())?,
        (Json::String(s), ValueType::Enum(enum_type)) => enum_type
            .value_of(s, true)
            .map(Value::Enum)
            .ok_or_else(|| format!("'{s}' is not a member of {}", enum_type.name()))?,
        (Json::Number(n), ValueType::Enum(_)) => n.as_i64().map(Value::Enum).ok_or_else(mismatch)?,
        (Json::Array(items), ValueType::Array(element)) => Value::Array(
            items
                .iter()
                .map(|item| value_from_json(item, element))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        (Json::Object(_), ValueType::Model(model)) => {
            let record = record_from_json(model, json).map_err(|e| e.to_string())?;
            Value::Record(record)
        }
        _ => return Err(mismatch()),
    };

    value.conform(ty)
}

/// Parses `[-][d.]hh:mm:ss`.
fn parse_timespan(text: &str) -> Option<TimeDelta> {
    let text = text.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (days, clock) = match text.split_once('.') {
        Some((days, clock)) if clock.contains(':') => (days.parse::<i64>().ok()?, clock),
        _ => (0, text),
    };

    let parts: Vec<i64> = clock
        .split(':')
        .map(|part| part.parse().ok())
        .collect::<Option<_>>()?;
    let [hours, minutes, seconds] = parts[..] else {
        return None;
    };

    let total = days
        .checked_mul(86_400)?
        .checked_add(hours.checked_mul(3_600)?)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    TimeDelta::try_seconds(if negative { total.checked_neg()? } else { total })
}

#[test]
fn test_parse_timespan() {
    assert_eq!(parse_timespan("01:30:00"), TimeDelta::try_minutes(90));
    assert_eq!(parse_timespan("2.00:00:05"), TimeDelta::try_seconds(2 * 86_400 + 5));
    assert_eq!(parse_timespan("-00:00:10"), TimeDelta::try_seconds(-10));
    assert_eq!(parse_timespan("10:00"), None);
    assert_eq!(parse_timespan(&format!("-00:00:{}", i64::MIN)), None);
}
