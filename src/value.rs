use std::{fmt, sync::Arc};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    model::{ModelType, ValueType},
};

/// A runtime value read out of a model instance or produced by an expression.
///
/// # Numeric Representation
///
/// Every integral kind (`i8` through `u64`) is carried as an `i128`, so
/// widening between integral kinds never loses information. Floating kinds
/// are carried as `f64` and decimals exactly as [`Decimal`].
///
/// # Examples
///
/// ```
/// use expressive::Value;
///
/// let age = Value::from(17u8);
/// let email: Value = Some("a@b.c").into();
/// let missing: Value = Option::<i32>::None.into();
///
/// assert_eq!(age, Value::Int(17));
/// assert_eq!(email, Value::String("a@b.c".to_string()));
/// assert!(missing.is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,

    Bool(bool),

    /// Any integral kind
    Int(i128),

    /// `f32` or `f64`
    Float(f64),

    Decimal(Decimal),

    String(String),

    DateTime(NaiveDateTime),

    TimeSpan(TimeDelta),

    Guid(Uuid),

    /// Underlying value of an enumeration member
    Enum(i64),

    Array(Vec<Value>),

    /// Nested model instance
    Record(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as bool; `None` for null and non-bools
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Enum(n) => Some(*n as i128),
            _ => None,
        }
    }

    /// Get as exact decimal
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(n) => Decimal::try_from_i128_with_scale(*n, 0).ok(),
            Value::Float(n) => Decimal::try_from(*n).ok(),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::TimeSpan(_) => "timespan",
            Value::Guid(_) => "guid",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
        }
    }

    /// Checks the value against a declared type, normalizing its numeric
    /// representation (e.g. an `Int` stored in an `f64` field becomes a
    /// `Float`). Errors describe the mismatch.
    pub fn conform(self, ty: &ValueType) -> std::result::Result<Value, String> {
        let mismatch = |value: &Value| format!("{} is not a valid {ty}", value.type_name());

        match (self, ty) {
            (Value::Null, ty) if ty.is_nullable() => Ok(Value::Null),
            (value, ValueType::Nullable(inner)) => value.conform(inner),

            (Value::Bool(b), ValueType::Bool) => Ok(Value::Bool(b)),

            (Value::Int(n), ValueType::Number(kind)) if kind.is_integral() => {
                if kind.fits(n) {
                    Ok(Value::Int(n))
                } else {
                    Err(format!("{n} is out of range for {}", kind.name()))
                }
            }
            (Value::Int(n), ValueType::Number(kind)) if kind.is_floating() => Ok(Value::Float(n as f64)),
            (Value::Int(n), ValueType::Number(_)) => Decimal::try_from_i128_with_scale(n, 0)
                .map(Value::Decimal)
                .map_err(|_| format!("{n} is out of range for decimal")),

            (Value::Float(f), ValueType::Number(kind)) if kind.is_integral() => {
                if f.fract() == 0.0 && kind.fits(f as i128) {
                    Ok(Value::Int(f as i128))
                } else {
                    Err(format!("{f} is not a valid {}", kind.name()))
                }
            }
            (Value::Float(f), ValueType::Number(kind)) if kind.is_floating() => Ok(Value::Float(f)),
            (Value::Float(f), ValueType::Number(_)) => Decimal::try_from(f)
                .map(Value::Decimal)
                .map_err(|_| format!("{f} is not a valid decimal")),

            (Value::Decimal(d), ValueType::Number(kind)) if kind.is_integral() => d
                .fract()
                .is_zero()
                .then(|| d.to_i128())
                .flatten()
                .filter(|n| kind.fits(*n))
                .map(Value::Int)
                .ok_or_else(|| format!("{d} is not a valid {}", kind.name())),
            (Value::Decimal(d), ValueType::Number(kind)) if kind.is_floating() => d
                .to_f64()
                .map(Value::Float)
                .ok_or_else(|| format!("{d} is not a valid {}", kind.name())),
            (Value::Decimal(d), ValueType::Number(_)) => Ok(Value::Decimal(d)),

            (Value::String(s), ValueType::String) => Ok(Value::String(s)),
            (Value::DateTime(d), ValueType::DateTime) => Ok(Value::DateTime(d)),
            (Value::TimeSpan(t), ValueType::TimeSpan) => Ok(Value::TimeSpan(t)),
            (Value::Guid(g), ValueType::Guid) => Ok(Value::Guid(g)),

            (value @ (Value::Enum(_) | Value::Int(_)), ValueType::Enum(enum_type)) => value
                .as_int()
                .and_then(|n| i64::try_from(n).ok())
                .filter(|n| enum_type.name_of(*n).is_some())
                .map(Value::Enum)
                .ok_or_else(|| format!("{value} is not a member of {}", enum_type.name())),

            (Value::Array(items), ValueType::Array(element)) => items
                .into_iter()
                .map(|item| item.conform(element))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::Array),

            (Value::Record(record), ValueType::Model(model)) => {
                if record.model.id() == model.id() {
                    Ok(Value::Record(record))
                } else {
                    Err(format!("{} record is not a valid {}", record.model.name(), model.name()))
                }
            }

            (value, _) => Err(mismatch(&value)),
        }
    }
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`,
/// seconds optionally fractional.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|day| day.and_hms_opt(0, 0, 0))
        })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::DateTime(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            Value::TimeSpan(t) => write!(f, "{t}"),
            Value::Guid(g) => write!(f, "{g}"),
            Value::Enum(n) => write!(f, "{n}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Record(record) => f.write_str(record.model.name()),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Int(n as i128)
            }
        })*
    };
}

impl_from_int!(i8, u8, i16, u16, i32, u32, i64, u64);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::DateTime(d)
    }
}

impl From<TimeDelta> for Value {
    fn from(t: TimeDelta) -> Self {
        Value::TimeSpan(t)
    }
}

impl From<Uuid> for Value {
    fn from(g: Uuid) -> Self {
        Value::Guid(g)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}

/// Snapshot of one model instance: a value per field, in field order.
#[derive(Debug, Clone)]
pub struct Record {
    model: Arc<ModelType>,
    values: Vec<Value>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.model.id() == other.model.id() && self.values == other.values
    }
}

impl Record {
    pub fn builder(model: &Arc<ModelType>) -> RecordBuilder {
        RecordBuilder {
            model: model.clone(),
            values: vec![Value::Null; model.fields().len()],
            error: None,
        }
    }

    /// Record from values given in field order, each checked against its field type.
    pub fn from_values(model: Arc<ModelType>, values: Vec<Value>) -> Result<Record> {
        if values.len() != model.fields().len() {
            return Err(Error::invalid_value(
                model.name(),
                format!("expected {} values, got {}", model.fields().len(), values.len()),
            ));
        }

        let values = model
            .fields()
            .iter()
            .zip(values)
            .map(|(field, value)| {
                value
                    .conform(&field.value_type)
                    .map_err(|message| Error::invalid_value(&field.name, message))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Record { model, values })
    }

    pub fn model(&self) -> &Arc<ModelType> {
        &self.model
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of a top-level field by name.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.model.field(name, true).and_then(|(index, _)| self.values.get(index))
    }

    /// Value at a dotted path; `None` when the path does not resolve.
    pub fn read(&self, path: &str) -> Option<Value> {
        let segments: Vec<&str> = path.split('.').collect();
        let resolved = self.model.resolve(&segments, true).ok()?;
        Some(resolved.accessor.read(self))
    }
}

/// Collects field values by name; conformance errors surface from [`build`](Self::build).
pub struct RecordBuilder {
    model: Arc<ModelType>,
    values: Vec<Value>,
    error: Option<Error>,
}

impl RecordBuilder {
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.model.field(name, true) {
            Some((index, _)) => self.values[index] = value.into(),
            None => {
                self.error = Some(Error::invalid_value(
                    name,
                    format!("{} has no such field", self.model.name()),
                ));
            }
        }
        self
    }

    /// Fields never set are null, which only nullable fields accept.
    pub fn build(self) -> Result<Record> {
        match self.error {
            Some(error) => Err(error),
            None => Record::from_values(self.model, self.values),
        }
    }
}

#[test]
fn test_conform_normalizes_numbers() {
    use crate::model::NumericKind;

    let f64_field = ValueType::Number(NumericKind::F64);
    assert_eq!(Value::Int(3).conform(&f64_field), Ok(Value::Float(3.0)));

    let u8_field = ValueType::Number(NumericKind::U8);
    assert!(Value::Int(256).conform(&u8_field).is_err());
    assert!(Value::Null.conform(&u8_field).is_err());
    assert_eq!(Value::Null.conform(&u8_field.clone().nullable()), Ok(Value::Null));
}
