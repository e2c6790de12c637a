//! Function registry.
//!
//! A [`Toolchain`] maps function names to one or more [`Signature`]s. Calls
//! are resolved at compile time by exact coarse-type match on every
//! parameter, in registration order; a `null` argument matches any
//! parameter. Invokers never fail: input they cannot handle yields
//! [`Value::Null`] or a neutral value.

use std::{
    cmp::Ordering,
    fmt,
    sync::{Arc, LazyLock},
};

use chrono::{Local, NaiveDate, TimeDelta};
use regex::Regex;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    model::{CoarseType, NumericKind, ValueType, names_match},
    value::{Value, parse_datetime},
};

pub type Invoker = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

static DIGIT_CHAIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("invalid regex"));
static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+|[0-9]+[eE][+-]?[0-9]+|[0-9]*\.[0-9]+(?:[eE][+-]?[0-9]+)?)$").expect("invalid regex")
});
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("invalid regex")
});
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\+\s?)?(\(\+?\d+([\s\-.]?\d+)?\)|\d+)([\s\-.]?(\(\d+([\s\-.]?\d+)?\)|\d+))*(\s?(x|ext\.?)\s?\d+)?$")
        .expect("invalid regex")
});
static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(https?|ftp)://[^\s/$.?#][^\s]*$").expect("invalid regex"));

/// A callable entry of the registry.
#[derive(Clone)]
pub struct Signature {
    pub name: String,
    pub params: Vec<CoarseType>,
    pub returns: ValueType,
    invoker: Invoker,
}

impl Signature {
    pub fn new(
        name: impl Into<String>,
        params: &[CoarseType],
        returns: ValueType,
        invoker: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        Signature {
            name: name.into(),
            params: params.to_vec(),
            returns,
            invoker: Arc::new(invoker),
        }
    }

    pub fn invoke(&self, args: &[Value]) -> Value {
        (self.invoker)(args)
    }

    /// Whether the signature accepts arguments of these coarse types (`None` is a null argument).
    pub fn accepts(&self, args: &[Option<CoarseType>]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| arg.is_none_or(|arg| arg == *param))
    }

    fn params_text(&self) -> String {
        self.params.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) -> {}", self.name, self.params_text(), self.returns)
    }
}

/// Registry of functions callable from expressions.
#[derive(Clone, Debug)]
pub struct Toolchain {
    signatures: Vec<Signature>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Toolchain {
    /// Toolchain holding the standard library.
    pub fn new() -> Self {
        Toolchain {
            signatures: standard_library(),
        }
    }

    /// Toolchain with no functions at all.
    pub fn empty() -> Self {
        Toolchain { signatures: Vec::new() }
    }

    /// Registers one more function. The same name and parameter list may only be registered once;
    /// names are compared ignoring case since lookups may ignore it.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        params: &[CoarseType],
        returns: ValueType,
        invoker: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
    ) -> Result<()> {
        self.add(Signature::new(name, params, returns, invoker))
    }

    pub fn add(&mut self, signature: Signature) -> Result<()> {
        if self
            .signatures
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(&signature.name) && s.params == signature.params)
        {
            return Err(Error::DuplicateSignature {
                name: signature.name.clone(),
                params: signature.params_text(),
            });
        }
        debug!(signature = %signature, "registered function");
        self.signatures.push(signature);
        Ok(())
    }

    /// Drops every registered function, the standard library included, and
    /// registers `signatures` instead.
    pub fn replace(&mut self, signatures: impl IntoIterator<Item = Signature>) -> Result<()> {
        let mut replacement = Toolchain::empty();
        for signature in signatures {
            replacement.add(signature)?;
        }
        debug!(count = replacement.signatures.len(), "replaced toolchain");
        *self = replacement;
        Ok(())
    }

    /// First same-name signature, in registration order, accepting the arguments.
    pub fn resolve(&self, name: &str, args: &[Option<CoarseType>], case_sensitive: bool) -> Option<&Signature> {
        self.overloads(name, case_sensitive).find(|s| s.accepts(args))
    }

    pub fn overloads<'a, 'n>(
        &'a self,
        name: &'n str,
        case_sensitive: bool,
    ) -> impl Iterator<Item = &'a Signature> + use<'a, 'n> {
        self.signatures
            .iter()
            .filter(move |s| names_match(&s.name, name, case_sensitive))
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }
}

fn str_arg(args: &[Value], index: usize) -> Option<&str> {
    args.get(index).and_then(Value::as_str)
}

/// Integral value of a numeric argument; fractional values are rejected.
fn int_arg(args: &[Value], index: usize) -> Option<i64> {
    match args.get(index)? {
        Value::Int(n) => i64::try_from(*n).ok(),
        Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
        _ => None,
    }
}

fn ordinal(ordering: Ordering) -> Value {
    Value::Int(match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

fn compare_nullable(a: Option<&str>, b: Option<&str>, fold: bool) -> Value {
    let ordering = match (a, b) {
        (Some(a), Some(b)) if fold => a.to_lowercase().cmp(&b.to_lowercase()),
        (a, b) => a.cmp(&b),
    };
    ordinal(ordering)
}

fn string_test(args: &[Value], test: impl Fn(&str, &str) -> bool) -> Value {
    match (str_arg(args, 0), str_arg(args, 1)) {
        (Some(a), Some(b)) => Value::Bool(test(a, b)),
        _ => Value::Bool(false),
    }
}

fn regex_test(args: &[Value], regex: &Regex) -> Value {
    Value::Bool(str_arg(args, 0).is_some_and(|s| regex.is_match(s)))
}

fn decimals(args: &[Value]) -> Vec<Decimal> {
    match args.first() {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_decimal).collect(),
        _ => Vec::new(),
    }
}

fn date(args: &[Value]) -> Option<Value> {
    let part = |i| int_arg(args, i).and_then(|n| u32::try_from(n).ok());
    let year = i32::try_from(int_arg(args, 0)?).ok()?;
    let day = NaiveDate::from_ymd_opt(year, part(1)?, part(2)?)?;
    let time = if args.len() == 6 {
        day.and_hms_opt(part(3)?, part(4)?, part(5)?)?
    } else {
        day.and_hms_opt(0, 0, 0)?
    };
    Some(Value::DateTime(time))
}

fn timespan(args: &[Value]) -> Option<Value> {
    let seconds = [86_400i64, 3_600, 60, 1]
        .iter()
        .enumerate()
        .try_fold(0i64, |total, (i, unit)| {
            int_arg(args, i)?.checked_mul(*unit).and_then(|s| total.checked_add(s))
        })?;
    TimeDelta::try_seconds(seconds).map(Value::TimeSpan)
}

fn standard_library() -> Vec<Signature> {
    use CoarseType::{Collection, Number, String as Str};

    let int = ValueType::Number(NumericKind::I32);
    let aggregate = ValueType::Number(NumericKind::Decimal).nullable();
    let nullable_date = ValueType::DateTime.nullable();

    vec![
        // Dates
        Signature::new("Now", &[], ValueType::DateTime, |_| Value::DateTime(Local::now().naive_local())),
        Signature::new("Today", &[], ValueType::DateTime, |_| {
            Local::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map_or(Value::Null, Value::DateTime)
        }),
        Signature::new("ToDate", &[Str], nullable_date.clone(), |args| {
            str_arg(args, 0).and_then(parse_datetime).map_or(Value::Null, Value::DateTime)
        }),
        Signature::new("Date", &[Number, Number, Number], nullable_date.clone(), |args| {
            date(args).unwrap_or(Value::Null)
        }),
        Signature::new(
            "Date",
            &[Number, Number, Number, Number, Number, Number],
            nullable_date,
            |args| date(args).unwrap_or(Value::Null),
        ),
        Signature::new(
            "TimeSpan",
            &[Number, Number, Number, Number],
            ValueType::TimeSpan.nullable(),
            |args| timespan(args).unwrap_or(Value::Null),
        ),
        // Strings
        Signature::new("Length", &[Str], int.clone(), |args| {
            Value::Int(str_arg(args, 0).map_or(0, |s| s.chars().count() as i128))
        }),
        Signature::new("Trim", &[Str], ValueType::String, |args| {
            str_arg(args, 0).map_or(Value::Null, |s| Value::String(s.trim().to_string()))
        }),
        Signature::new("Concat", &[Str, Str], ValueType::String, |args| {
            Value::String(args.iter().filter_map(Value::as_str).collect())
        }),
        Signature::new("Concat", &[Str, Str, Str], ValueType::String, |args| {
            Value::String(args.iter().filter_map(Value::as_str).collect())
        }),
        Signature::new("CompareOrdinal", &[Str, Str], int.clone(), |args| {
            compare_nullable(str_arg(args, 0), str_arg(args, 1), false)
        }),
        Signature::new("CompareOrdinalIgnoreCase", &[Str, Str], int.clone(), |args| {
            compare_nullable(str_arg(args, 0), str_arg(args, 1), true)
        }),
        Signature::new("StartsWith", &[Str, Str], ValueType::Bool, |args| {
            string_test(args, |s, prefix| s.starts_with(prefix))
        }),
        Signature::new("StartsWithIgnoreCase", &[Str, Str], ValueType::Bool, |args| {
            string_test(args, |s, prefix| s.to_lowercase().starts_with(&prefix.to_lowercase()))
        }),
        Signature::new("EndsWith", &[Str, Str], ValueType::Bool, |args| {
            string_test(args, |s, suffix| s.ends_with(suffix))
        }),
        Signature::new("EndsWithIgnoreCase", &[Str, Str], ValueType::Bool, |args| {
            string_test(args, |s, suffix| s.to_lowercase().ends_with(&suffix.to_lowercase()))
        }),
        Signature::new("Contains", &[Str, Str], ValueType::Bool, |args| {
            string_test(args, |s, part| s.contains(part))
        }),
        Signature::new("ContainsIgnoreCase", &[Str, Str], ValueType::Bool, |args| {
            string_test(args, |s, part| s.to_lowercase().contains(&part.to_lowercase()))
        }),
        Signature::new("IsNullOrWhiteSpace", &[Str], ValueType::Bool, |args| {
            Value::Bool(str_arg(args, 0).is_none_or(|s| s.trim().is_empty()))
        }),
        Signature::new("IsDigitChain", &[Str], ValueType::Bool, |args| regex_test(args, &DIGIT_CHAIN)),
        Signature::new("IsNumber", &[Str], ValueType::Bool, |args| regex_test(args, &NUMBER)),
        Signature::new("IsEmail", &[Str], ValueType::Bool, |args| regex_test(args, &EMAIL)),
        Signature::new("IsPhone", &[Str], ValueType::Bool, |args| regex_test(args, &PHONE)),
        Signature::new("IsUrl", &[Str], ValueType::Bool, |args| regex_test(args, &URL)),
        Signature::new("IsRegexMatch", &[Str, Str], ValueType::Bool, |args| {
            string_test(args, |s, pattern| Regex::new(pattern).is_ok_and(|re| re.is_match(s)))
        }),
        Signature::new("Guid", &[Str], ValueType::Guid.nullable(), |args| {
            str_arg(args, 0)
                .and_then(|s| Uuid::parse_str(s.trim()).ok())
                .map_or(Value::Null, Value::Guid)
        }),
        // Collections
        Signature::new("Length", &[Collection], int, |args| match args.first() {
            Some(Value::Array(items)) => Value::Int(items.len() as i128),
            _ => Value::Int(0),
        }),
        Signature::new("Sum", &[Collection], aggregate.clone(), |args| {
            decimals(args)
                .into_iter()
                .try_fold(Decimal::ZERO, |sum, n| sum.checked_add(n))
                .map_or(Value::Null, Value::Decimal)
        }),
        Signature::new("Min", &[Collection], aggregate.clone(), |args| {
            decimals(args).into_iter().min().map_or(Value::Null, Value::Decimal)
        }),
        Signature::new("Max", &[Collection], aggregate.clone(), |args| {
            decimals(args).into_iter().max().map_or(Value::Null, Value::Decimal)
        }),
        Signature::new("Average", &[Collection], aggregate, |args| {
            let items = decimals(args);
            if items.is_empty() {
                return Value::Null;
            }
            items
                .iter()
                .try_fold(Decimal::ZERO, |sum, n| sum.checked_add(*n))
                .and_then(|sum| sum.checked_div(Decimal::from(items.len())))
                .map_or(Value::Null, Value::Decimal)
        }),
    ]
}
