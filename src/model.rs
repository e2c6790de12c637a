//! Static description of host models.
//!
//! Expressions are checked against a [`ModelType`]: an ordered list of named,
//! typed fields. Resolving a dotted path against it yields the value type of
//! the leaf plus an [`Accessor`], a list of field indices that reads the leaf
//! out of a [`Record`] without any name lookups.

use std::{
    fmt,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use thiserror::Error;

use crate::{
    error::Error,
    value::{Record, Value},
};

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Name of the intrinsic member giving the length of strings and arrays.
pub const LENGTH_MEMBER: &str = "Length";

pub(crate) fn names_match(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// Semantic category of a value, used for coercion and overload resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoarseType {
    Bool,
    Number,
    String,
    DateTime,
    TimeSpan,
    Guid,
    Enumeration,
    /// Arrays of any element type
    Collection,
    /// Nested models
    Object,
}

impl fmt::Display for CoarseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoarseType::Bool => "bool",
            CoarseType::Number => "number",
            CoarseType::String => "string",
            CoarseType::DateTime => "datetime",
            CoarseType::TimeSpan => "timespan",
            CoarseType::Guid => "guid",
            CoarseType::Enumeration => "enumeration",
            CoarseType::Collection => "collection",
            CoarseType::Object => "object",
        };
        f.write_str(name)
    }
}

/// Exact numeric representation of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
}

impl NumericKind {
    const INTEGRAL: [NumericKind; 8] = [
        NumericKind::I8,
        NumericKind::U8,
        NumericKind::I16,
        NumericKind::U16,
        NumericKind::I32,
        NumericKind::U32,
        NumericKind::I64,
        NumericKind::U64,
    ];

    pub fn is_integral(self) -> bool {
        Self::INTEGRAL.contains(&self)
    }

    pub fn is_floating(self) -> bool {
        matches!(self, NumericKind::F32 | NumericKind::F64)
    }

    /// Position in the integral precision order; `None` for non-integral kinds.
    fn precision(self) -> Option<usize> {
        Self::INTEGRAL.iter().position(|k| *k == self)
    }

    /// Common kind two operands are widened to before an operation.
    ///
    /// Integral kinds widen to the higher precision, integral/floating mixes
    /// to floating, and anything mixed with decimal to decimal.
    pub fn widen(self, other: NumericKind) -> NumericKind {
        use NumericKind::*;
        match (self, other) {
            (Decimal, _) | (_, Decimal) => Decimal,
            (F64, _) | (_, F64) => F64,
            (F32, _) | (_, F32) => F32,
            (a, b) => {
                if a.precision() >= b.precision() {
                    a
                } else {
                    b
                }
            }
        }
    }

    /// Inclusive range of an integral kind.
    pub fn bounds(self) -> Option<(i128, i128)> {
        use NumericKind::*;
        let bounds = match self {
            I8 => (i8::MIN as i128, i8::MAX as i128),
            U8 => (0, u8::MAX as i128),
            I16 => (i16::MIN as i128, i16::MAX as i128),
            U16 => (0, u16::MAX as i128),
            I32 => (i32::MIN as i128, i32::MAX as i128),
            U32 => (0, u32::MAX as i128),
            I64 => (i64::MIN as i128, i64::MAX as i128),
            U64 => (0, u64::MAX as i128),
            F32 | F64 | Decimal => return None,
        };
        Some(bounds)
    }

    pub fn fits(self, value: i128) -> bool {
        self.bounds().is_some_and(|(lo, hi)| lo <= value && value <= hi)
    }

    /// Two's-complement wrap of an integral result into this kind.
    pub fn wrap(self, value: i128) -> i128 {
        use NumericKind::*;
        match self {
            I8 => value as i8 as i128,
            U8 => value as u8 as i128,
            I16 => value as i16 as i128,
            U16 => value as u16 as i128,
            I32 => value as i32 as i128,
            U32 => value as u32 as i128,
            I64 => value as i64 as i128,
            U64 => value as u64 as i128,
            F32 | F64 | Decimal => value,
        }
    }

    pub fn name(self) -> &'static str {
        use NumericKind::*;
        match self {
            I8 => "i8",
            U8 => "u8",
            I16 => "i16",
            U16 => "u16",
            I32 => "i32",
            U32 => "u32",
            I64 => "i64",
            U64 => "u64",
            F32 => "f32",
            F64 => "f64",
            Decimal => "decimal",
        }
    }
}

/// A named enumeration and its members' underlying values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    members: Vec<(String, i64)>,
}

impl EnumType {
    pub fn new<S: Into<String>>(name: impl Into<String>, members: impl IntoIterator<Item = (S, i64)>) -> Arc<Self> {
        Arc::new(EnumType {
            name: name.into(),
            members: members.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[(String, i64)] {
        &self.members
    }

    pub fn value_of(&self, member: &str, case_sensitive: bool) -> Option<i64> {
        self.members
            .iter()
            .find(|(name, _)| names_match(name, member, case_sensitive))
            .map(|(_, value)| *value)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }
}

/// Static type of a field or of a sub-expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    /// Type of the `null` literal
    Null,
    Bool,
    Number(NumericKind),
    String,
    DateTime,
    TimeSpan,
    Guid,
    Enum(Arc<EnumType>),
    Array(Box<ValueType>),
    Model(Arc<ModelType>),
    /// Optional wrapper around a value type
    Nullable(Box<ValueType>),
}

impl ValueType {
    pub fn array(element: ValueType) -> Self {
        ValueType::Array(Box::new(element))
    }

    /// Nullable equivalent; reference-like types are returned unchanged.
    pub fn nullable(self) -> Self {
        if self.is_nullable() {
            self
        } else {
            ValueType::Nullable(Box::new(self))
        }
    }

    /// The type with any nullable wrapper removed.
    pub fn underlying(&self) -> &ValueType {
        match self {
            ValueType::Nullable(inner) => inner.underlying(),
            other => other,
        }
    }

    /// Whether a value of this type may be absent.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            ValueType::Null
                | ValueType::String
                | ValueType::Array(_)
                | ValueType::Model(_)
                | ValueType::Nullable(_)
        )
    }

    /// Value types that can never hold null.
    pub fn is_non_nullable_value_type(&self) -> bool {
        !self.is_nullable()
    }

    pub fn coarse_type(&self) -> Option<CoarseType> {
        match self.underlying() {
            ValueType::Null => None,
            ValueType::Bool => Some(CoarseType::Bool),
            ValueType::Number(_) => Some(CoarseType::Number),
            ValueType::String => Some(CoarseType::String),
            ValueType::DateTime => Some(CoarseType::DateTime),
            ValueType::TimeSpan => Some(CoarseType::TimeSpan),
            ValueType::Guid => Some(CoarseType::Guid),
            ValueType::Enum(_) => Some(CoarseType::Enumeration),
            ValueType::Array(_) => Some(CoarseType::Collection),
            ValueType::Model(_) => Some(CoarseType::Object),
            ValueType::Nullable(inner) => inner.coarse_type(),
        }
    }

    pub fn numeric_kind(&self) -> Option<NumericKind> {
        match self.underlying() {
            ValueType::Number(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn enum_type(&self) -> Option<&Arc<EnumType>> {
        match self.underlying() {
            ValueType::Enum(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Null => f.write_str("null"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::Number(kind) => f.write_str(kind.name()),
            ValueType::String => f.write_str("string"),
            ValueType::DateTime => f.write_str("datetime"),
            ValueType::TimeSpan => f.write_str("timespan"),
            ValueType::Guid => f.write_str("guid"),
            ValueType::Enum(e) => f.write_str(e.name()),
            ValueType::Array(element) => write!(f, "{element}[]"),
            ValueType::Model(m) => f.write_str(m.name()),
            ValueType::Nullable(inner) => write!(f, "{inner}?"),
        }
    }
}

/// Parses the scalar type names used by schemas: `bool`, `i32`, `decimal`,
/// `string`, `datetime`, `timespan`, `guid`, with optional `?` (nullable) and
/// `[]` (array) suffixes, e.g. `i32?[]`.
impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(element) = s.strip_suffix("[]") {
            return Ok(ValueType::array(element.parse()?));
        }
        if let Some(inner) = s.strip_suffix('?') {
            return Ok(inner.parse::<ValueType>()?.nullable());
        }
        let ty = match s.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => ValueType::Bool,
            "i8" | "sbyte" => ValueType::Number(NumericKind::I8),
            "u8" | "byte" => ValueType::Number(NumericKind::U8),
            "i16" | "short" => ValueType::Number(NumericKind::I16),
            "u16" | "ushort" => ValueType::Number(NumericKind::U16),
            "i32" | "int" => ValueType::Number(NumericKind::I32),
            "u32" | "uint" => ValueType::Number(NumericKind::U32),
            "i64" | "long" => ValueType::Number(NumericKind::I64),
            "u64" | "ulong" => ValueType::Number(NumericKind::U64),
            "f32" | "float" => ValueType::Number(NumericKind::F32),
            "f64" | "double" => ValueType::Number(NumericKind::F64),
            "decimal" => ValueType::Number(NumericKind::Decimal),
            "string" => ValueType::String,
            "datetime" => ValueType::DateTime,
            "timespan" => ValueType::TimeSpan,
            "guid" | "uuid" => ValueType::Guid,
            _ => return Err(format!("unknown type '{s}'")),
        };
        Ok(ty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub value_type: ValueType,
    /// Human-readable name used in validation messages
    pub display_name: Option<String>,
}

/// A path segment that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown field '{segment}' in path '{path}'.")]
pub struct UnknownSegment {
    pub segment: String,
    /// Zero-based index of the segment in the path
    pub depth: usize,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Field at this index of the current record
    Field(usize),
    /// Length of the current string or array
    Length,
}

/// Pre-resolved route from a record to one of its (nested) values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessor {
    steps: Vec<Step>,
}

impl Accessor {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Reads the value; a null (or missing) value on the way yields `Null`.
    pub fn read(&self, record: &Record) -> Value {
        let mut current: Option<&Value> = None;
        for step in &self.steps {
            let next = match (step, current) {
                (Step::Field(index), None) => record.get(*index),
                (Step::Field(index), Some(Value::Record(inner))) => inner.get(*index),
                (Step::Length, Some(Value::Array(items))) => return Value::Int(items.len() as i128),
                (Step::Length, Some(Value::String(s))) => return Value::Int(s.chars().count() as i128),
                _ => return Value::Null,
            };
            match next {
                Some(value) => current = Some(value),
                None => return Value::Null,
            }
        }
        current.cloned().unwrap_or(Value::Null)
    }
}

/// Result of resolving a field path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub value_type: ValueType,
    pub accessor: Accessor,
}

/// Reflective description of a host model.
#[derive(Debug)]
pub struct ModelType {
    id: u64,
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl ModelType {
    pub fn builder(name: impl Into<String>) -> ModelTypeBuilder {
        ModelTypeBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Process-unique identity, distinct for every built model.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str, case_sensitive: bool) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| names_match(&f.name, name, case_sensitive))
    }

    /// Resolves a path end-to-end. Every segment must be a field of the model
    /// reached so far, except a trailing `Length` on strings and arrays.
    ///
    /// Paths longer than one segment resolve to a nullable type, since any
    /// intermediate record may be absent.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S], case_sensitive: bool) -> Result<ResolvedField, UnknownSegment> {
        let unknown = |segment: &str, depth: usize| UnknownSegment {
            segment: segment.to_string(),
            depth,
            path: path.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("."),
        };

        let mut steps = Vec::with_capacity(path.len());
        let mut current: Option<ValueType> = None;

        for (depth, segment) in path.iter().map(AsRef::as_ref).enumerate() {
            let next = match current.as_ref().map(ValueType::underlying) {
                None => {
                    let (index, field) = self
                        .field(segment, case_sensitive)
                        .ok_or_else(|| unknown(segment, depth))?;
                    steps.push(Step::Field(index));
                    field.value_type.clone()
                }
                Some(ValueType::Model(model)) => {
                    let (index, field) = model
                        .field(segment, case_sensitive)
                        .ok_or_else(|| unknown(segment, depth))?;
                    steps.push(Step::Field(index));
                    field.value_type.clone()
                }
                Some(ValueType::Array(_) | ValueType::String)
                    if names_match(segment, LENGTH_MEMBER, case_sensitive)
                        && steps.last() != Some(&Step::Length) =>
                {
                    steps.push(Step::Length);
                    ValueType::Number(NumericKind::I32)
                }
                Some(_) => return Err(unknown(segment, depth)),
            };
            current = Some(next);
        }

        let value_type = current.ok_or_else(|| unknown("", 0))?;
        let value_type = if steps.len() > 1 { value_type.nullable() } else { value_type };
        Ok(ResolvedField {
            value_type,
            accessor: Accessor { steps },
        })
    }

    /// Field descriptor at the end of a dotted path.
    pub fn descriptor(&self, path: &str) -> Result<&FieldDescriptor, UnknownSegment> {
        let segments: Vec<&str> = path.split('.').collect();
        let unknown = |segment: &str, depth: usize| UnknownSegment {
            segment: segment.to_string(),
            depth,
            path: path.to_string(),
        };

        let (_, mut field) = self
            .field(segments[0], true)
            .ok_or_else(|| unknown(segments[0], 0))?;
        for (depth, segment) in segments.iter().enumerate().skip(1) {
            let ValueType::Model(model) = field.value_type.underlying() else {
                return Err(unknown(segment, depth));
            };
            field = model
                .field(segment, true)
                .map(|(_, f)| f)
                .ok_or_else(|| unknown(segment, depth))?;
        }
        Ok(field)
    }

    /// Human-readable name of the field at `path`, from its display metadata.
    pub fn display_name(&self, path: &str) -> Result<String, Error> {
        let field = self.descriptor(path).map_err(|e| Error::MissingDisplayName { field: e.segment })?;
        field
            .display_name
            .clone()
            .ok_or_else(|| Error::MissingDisplayName {
                field: field.name.clone(),
            })
    }

    /// Enumerations reachable from this model's fields, nested models included.
    pub fn enums(&self) -> Vec<Arc<EnumType>> {
        let mut found = Vec::new();
        let mut visited = vec![self.id];
        self.collect_enums(&mut found, &mut visited);
        found
    }

    fn collect_enums(&self, found: &mut Vec<Arc<EnumType>>, visited: &mut Vec<u64>) {
        for field in &self.fields {
            let mut ty = field.value_type.underlying();
            while let ValueType::Array(element) = ty {
                ty = element.underlying();
            }
            match ty {
                ValueType::Enum(e) if !found.iter().any(|known| known.name() == e.name()) => {
                    found.push(e.clone());
                }
                ValueType::Model(model) if !visited.contains(&model.id) => {
                    visited.push(model.id);
                    model.collect_enums(found, visited);
                }
                _ => {}
            }
        }
    }
}

pub struct ModelTypeBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl ModelTypeBuilder {
    pub fn field(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            value_type,
            display_name: None,
        });
        self
    }

    /// Sets the display name of the most recently added field.
    pub fn display(mut self, display_name: impl Into<String>) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.display_name = Some(display_name.into());
        }
        self
    }

    pub fn build(self) -> Arc<ModelType> {
        Arc::new(ModelType {
            id: NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            fields: self.fields,
        })
    }
}

/// Host types that can be validated.
///
/// Implementations should hand out the same `Arc` on every call (e.g. from a
/// `LazyLock`) so that compiled predicates can be cached per model.
pub trait Model {
    fn model_type() -> Arc<ModelType>;

    /// Snapshot of the instance, fields in `model_type()` order.
    fn to_record(&self) -> Record;
}

/// Detects two dependency lists that share a leading segment run.
///
/// Each name is split on `.`; two names collide when all segments up to the
/// shorter one's length are equal. Returns the segment at that boundary and
/// its zero-based depth for the first colliding pair.
pub fn segments_collide<A: AsRef<str>, B: AsRef<str>>(names_a: &[A], names_b: &[B]) -> Option<(String, usize)> {
    for a in names_a {
        let segments_a: Vec<&str> = a.as_ref().split('.').collect();
        for b in names_b {
            let segments_b: Vec<&str> = b.as_ref().split('.').collect();
            let boundary = segments_a.len().min(segments_b.len()) - 1;
            if segments_a[..=boundary] == segments_b[..=boundary] {
                return Some((segments_a[boundary].to_string(), boundary));
            }
        }
    }
    None
}

#[test]
fn test_widening_order() {
    assert_eq!(NumericKind::U8.widen(NumericKind::I64), NumericKind::I64);
    assert_eq!(NumericKind::I32.widen(NumericKind::U32), NumericKind::U32);
    assert_eq!(NumericKind::I64.widen(NumericKind::F32), NumericKind::F32);
    assert_eq!(NumericKind::F32.widen(NumericKind::F64), NumericKind::F64);
    assert_eq!(NumericKind::F64.widen(NumericKind::Decimal), NumericKind::Decimal);
}

#[test]
fn test_wrap() {
    assert_eq!(NumericKind::U8.wrap(256), 0);
    assert_eq!(NumericKind::I8.wrap(128), -128);
    assert_eq!(NumericKind::I32.wrap(i32::MAX as i128 + 1), i32::MIN as i128);
}

#[test]
fn test_type_names_parse() {
    assert_eq!("i32?".parse::<ValueType>().unwrap(), ValueType::Number(NumericKind::I32).nullable());
    assert_eq!("string[]".parse::<ValueType>().unwrap(), ValueType::array(ValueType::String));
    assert_eq!("string?".parse::<ValueType>().unwrap(), ValueType::String);
    assert!("widget".parse::<ValueType>().is_err());
}
