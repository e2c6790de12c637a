use chrono::{NaiveDate, TimeDelta};
use expressive::{CoarseType, Error, NumericKind, Signature, Toolchain, Value, ValueType};
use rust_decimal::Decimal;

fn call(name: &str, args: &[Value]) -> Value {
    let toolchain = Toolchain::new();
    let coarse: Vec<Option<CoarseType>> = args.iter().map(coarse_of).collect();
    let signature = toolchain
        .resolve(name, &coarse, true)
        .unwrap_or_else(|| panic!("no overload of {name} for {coarse:?}"));
    signature.invoke(args)
}

fn coarse_of(value: &Value) -> Option<CoarseType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(CoarseType::Bool),
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => Some(CoarseType::Number),
        Value::String(_) => Some(CoarseType::String),
        Value::DateTime(_) => Some(CoarseType::DateTime),
        Value::TimeSpan(_) => Some(CoarseType::TimeSpan),
        Value::Guid(_) => Some(CoarseType::Guid),
        Value::Enum(_) => Some(CoarseType::Enumeration),
        Value::Array(_) => Some(CoarseType::Collection),
        Value::Record(_) => Some(CoarseType::Object),
    }
}

fn s(text: &str) -> Value {
    Value::from(text)
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_register_and_resolve() {
    let mut toolchain = Toolchain::empty();
    toolchain
        .register("Twice", &[CoarseType::Number], ValueType::Number(NumericKind::I64), |args| {
            Value::Int(args.first().and_then(Value::as_int).unwrap_or(0) * 2)
        })
        .unwrap();

    let signature = toolchain.resolve("Twice", &[Some(CoarseType::Number)], true).unwrap();
    assert_eq!(signature.invoke(&[Value::Int(21)]), Value::Int(42));
    assert_eq!(signature.to_string(), "Twice(number) -> i64");

    assert!(toolchain.resolve("Twice", &[Some(CoarseType::String)], true).is_none());
    assert!(toolchain.resolve("twice", &[Some(CoarseType::Number)], true).is_none());
    assert!(toolchain.resolve("twice", &[Some(CoarseType::Number)], false).is_some());
}

#[test]
fn test_duplicate_signature_is_rejected() {
    let mut toolchain = Toolchain::new();
    let error = toolchain
        .register("Trim", &[CoarseType::String], ValueType::String, |_| Value::Null)
        .unwrap_err();
    assert!(matches!(error, Error::DuplicateSignature { .. }));
    assert_eq!(error.to_string(), "Function Trim(string) is already registered.");

    // Same name with other parameters is an overload
    toolchain
        .register("Trim", &[CoarseType::String, CoarseType::String], ValueType::String, |_| Value::Null)
        .unwrap();
    assert_eq!(toolchain.overloads("Trim", true).count(), 2);
}

#[test]
fn test_duplicate_check_ignores_case() {
    let mut toolchain = Toolchain::new();
    let error = toolchain
        .register("length", &[CoarseType::String], ValueType::Number(NumericKind::I32), |_| Value::Null)
        .unwrap_err();
    assert_eq!(error.to_string(), "Function length(string) is already registered.");

    toolchain
        .register("TRIM", &[CoarseType::String, CoarseType::String], ValueType::String, |_| Value::Null)
        .unwrap();
    assert_eq!(toolchain.overloads("trim", false).count(), 2);
    assert_eq!(toolchain.overloads("trim", true).count(), 0);
}

#[test]
fn test_resolved_signature_outlives_the_name() {
    let toolchain = Toolchain::new();
    let signature = {
        let name = String::from("trim");
        toolchain.resolve(&name, &[Some(CoarseType::String)], false).unwrap()
    };
    assert_eq!(signature.name, "Trim");

    let overloads: Vec<&Signature> = {
        let name = String::from("Concat");
        toolchain.overloads(&name, true).collect()
    };
    assert_eq!(overloads.len(), 2);
}

#[test]
fn test_overloads_resolve_in_registration_order() {
    let mut toolchain = Toolchain::empty();
    toolchain
        .register("Pick", &[CoarseType::String], ValueType::Bool, |_| Value::Bool(true))
        .unwrap();
    toolchain
        .register("Pick", &[CoarseType::Number], ValueType::Bool, |_| Value::Bool(false))
        .unwrap();

    let for_null = toolchain.resolve("Pick", &[None], true).unwrap();
    assert_eq!(for_null.params, [CoarseType::String]);
    let for_number = toolchain.resolve("Pick", &[Some(CoarseType::Number)], true).unwrap();
    assert_eq!(for_number.params, [CoarseType::Number]);
}

#[test]
fn test_replace_drops_standard_library() {
    let mut toolchain = Toolchain::new();
    toolchain
        .replace([Signature::new("Always", &[], ValueType::Bool, |_| Value::Bool(true))])
        .unwrap();

    assert_eq!(toolchain.signatures().len(), 1);
    assert!(toolchain.resolve("Trim", &[Some(CoarseType::String)], true).is_none());
}

#[test]
fn test_replace_with_duplicates_keeps_original() {
    let mut toolchain = Toolchain::new();
    let before = toolchain.signatures().len();
    let result = toolchain.replace([
        Signature::new("Same", &[], ValueType::Bool, |_| Value::Bool(true)),
        Signature::new("Same", &[], ValueType::Bool, |_| Value::Bool(false)),
    ]);
    assert!(matches!(result, Err(Error::DuplicateSignature { .. })));
    assert_eq!(toolchain.signatures().len(), before);
}

// ============================================================================
// Standard library: strings
// ============================================================================

#[test]
fn test_string_functions() {
    assert_eq!(call("Length", &[s("Zażółć")]), Value::Int(6));
    assert_eq!(call("Length", &[Value::Null]), Value::Int(0));
    assert_eq!(call("Trim", &[s("  x  ")]), s("x"));
    assert_eq!(call("Trim", &[Value::Null]), Value::Null);
    assert_eq!(call("Concat", &[s("a"), Value::Null]), s("a"));
    assert_eq!(call("Concat", &[s("a"), s("b"), s("c")]), s("abc"));
}

#[test]
fn test_ordinal_comparison() {
    assert_eq!(call("CompareOrdinal", &[s("a"), s("b")]), Value::Int(-1));
    assert_eq!(call("CompareOrdinal", &[s("a"), s("A")]), Value::Int(1));
    assert_eq!(call("CompareOrdinalIgnoreCase", &[s("a"), s("A")]), Value::Int(0));
    assert_eq!(call("CompareOrdinal", &[Value::Null, s("a")]), Value::Int(-1));
    assert_eq!(call("CompareOrdinal", &[Value::Null, Value::Null]), Value::Int(0));
}

#[test]
fn test_string_tests() {
    assert_eq!(call("StartsWith", &[s("Poland"), s("Po")]), Value::Bool(true));
    assert_eq!(call("StartsWith", &[s("Poland"), s("po")]), Value::Bool(false));
    assert_eq!(call("StartsWithIgnoreCase", &[s("Poland"), s("po")]), Value::Bool(true));
    assert_eq!(call("EndsWith", &[s("Poland"), s("and")]), Value::Bool(true));
    assert_eq!(call("EndsWithIgnoreCase", &[s("Poland"), s("AND")]), Value::Bool(true));
    assert_eq!(call("Contains", &[s("Poland"), s("la")]), Value::Bool(true));
    assert_eq!(call("ContainsIgnoreCase", &[s("Poland"), s("LA")]), Value::Bool(true));
    assert_eq!(call("Contains", &[Value::Null, s("la")]), Value::Bool(false));
}

#[test]
fn test_whitespace_and_formats() {
    assert_eq!(call("IsNullOrWhiteSpace", &[Value::Null]), Value::Bool(true));
    assert_eq!(call("IsNullOrWhiteSpace", &[s(" \t")]), Value::Bool(true));
    assert_eq!(call("IsNullOrWhiteSpace", &[s(" a ")]), Value::Bool(false));

    assert_eq!(call("IsDigitChain", &[s("0123")]), Value::Bool(true));
    assert_eq!(call("IsDigitChain", &[s("12a")]), Value::Bool(false));
    assert_eq!(call("IsDigitChain", &[s("")]), Value::Bool(false));

    for number in ["1", "-1.5", "+.5", "1e10", "2.5E-3"] {
        assert_eq!(call("IsNumber", &[s(number)]), Value::Bool(true), "{number}");
    }
    for not_number in ["", "1.", "e5", "1,5", "--1"] {
        assert_eq!(call("IsNumber", &[s(not_number)]), Value::Bool(false), "{not_number}");
    }

    assert_eq!(call("IsEmail", &[s("jane.doe@example.com")]), Value::Bool(true));
    assert_eq!(call("IsEmail", &[s("jane@")]), Value::Bool(false));
    assert_eq!(call("IsPhone", &[s("+48 (22) 123-45-67")]), Value::Bool(true));
    assert_eq!(call("IsPhone", &[s("call me")]), Value::Bool(false));
    assert_eq!(call("IsUrl", &[s("https://example.com/path?q=1")]), Value::Bool(true));
    assert_eq!(call("IsUrl", &[s("example.com")]), Value::Bool(false));
}

#[test]
fn test_regex_match() {
    assert_eq!(call("IsRegexMatch", &[s("abc123"), s("^[a-z]+[0-9]+$")]), Value::Bool(true));
    assert_eq!(call("IsRegexMatch", &[s("abc"), s("^[0-9]+$")]), Value::Bool(false));
    // An invalid pattern never matches
    assert_eq!(call("IsRegexMatch", &[s("abc"), s("(")]), Value::Bool(false));
}

#[test]
fn test_guid_parsing() {
    let parsed = call("Guid", &[s("6f9619ff-8b86-d011-b42d-00c04fc964ff")]);
    assert!(matches!(parsed, Value::Guid(_)));
    assert_eq!(call("Guid", &[s("nope")]), Value::Null);
}

// ============================================================================
// Standard library: dates
// ============================================================================

#[test]
fn test_date_construction() {
    let expected = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap().and_hms_opt(0, 0, 0).unwrap();
    assert_eq!(
        call("Date", &[Value::Int(2024), Value::Int(2), Value::Int(29)]),
        Value::DateTime(expected)
    );

    let expected = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap().and_hms_opt(13, 5, 9).unwrap();
    let args = [2024, 2, 29, 13, 5, 9].map(Value::Int);
    assert_eq!(call("Date", &args), Value::DateTime(expected));

    assert_eq!(call("Date", &[Value::Int(2023), Value::Int(2), Value::Int(29)]), Value::Null);
    assert_eq!(call("Date", &[Value::Int(2023), Value::Float(1.5), Value::Int(1)]), Value::Null);
}

#[test]
fn test_to_date_and_timespan() {
    let expected = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(10, 30, 0).unwrap();
    assert_eq!(call("ToDate", &[s("2024-05-01T10:30:00")]), Value::DateTime(expected));
    assert_eq!(call("ToDate", &[s("2024-05-01 10:30:00")]), Value::DateTime(expected));
    assert_eq!(call("ToDate", &[s("yesterday")]), Value::Null);

    let args = [1, 2, 3, 4].map(Value::Int);
    let expected = TimeDelta::days(1) + TimeDelta::hours(2) + TimeDelta::minutes(3) + TimeDelta::seconds(4);
    assert_eq!(call("TimeSpan", &args), Value::TimeSpan(expected));
}

#[test]
fn test_today_is_midnight_of_now() {
    let Value::DateTime(today) = call("Today", &[]) else {
        panic!("Today() must return a datetime");
    };
    let Value::DateTime(now) = call("Now", &[]) else {
        panic!("Now() must return a datetime");
    };
    assert_eq!(today.time(), chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    assert!(today <= now);
}

// ============================================================================
// Standard library: collections
// ============================================================================

#[test]
fn test_aggregates() {
    let items = Value::from(vec![1, 2, 3, 4]);
    assert_eq!(call("Length", &[items.clone()]), Value::Int(4));
    assert_eq!(call("Sum", &[items.clone()]), Value::Decimal(Decimal::from(10)));
    assert_eq!(call("Min", &[items.clone()]), Value::Decimal(Decimal::from(1)));
    assert_eq!(call("Max", &[items.clone()]), Value::Decimal(Decimal::from(4)));
    assert_eq!(call("Average", &[items]), Value::Decimal(Decimal::new(25, 1)));
}

#[test]
fn test_aggregates_of_empty_collection() {
    let empty = Value::Array(vec![]);
    assert_eq!(call("Sum", &[empty.clone()]), Value::Decimal(Decimal::ZERO));
    assert_eq!(call("Min", &[empty.clone()]), Value::Null);
    assert_eq!(call("Max", &[empty.clone()]), Value::Null);
    assert_eq!(call("Average", &[empty]), Value::Null);
}

#[test]
fn test_list_is_stable() {
    let toolchain = Toolchain::new();
    let names: Vec<&str> = toolchain.signatures().iter().map(|s| s.name.as_str()).collect();
    for expected in ["Now", "Today", "ToDate", "Date", "TimeSpan", "Length", "IsEmail", "Average"] {
        assert!(names.contains(&expected), "{expected} missing");
    }
}
