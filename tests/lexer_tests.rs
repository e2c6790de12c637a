// tests/lexer_tests.rs

use expressive::ast::{Literal, Location, TokenKind};
use expressive::error::Error;
use expressive::lexer::{Lexer, tokenize};
use proptest::prelude::*;

fn kinds(input: &str) -> Vec<TokenKind> {
    tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
}

fn syntax_error(input: &str) -> (Location, String) {
    match tokenize(input) {
        Err(Error::Syntax(d)) => (d.location, d.message),
        other => panic!("expected syntax error for {input:?}, got {other:?}"),
    }
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("<", TokenKind::Lt),
        (">", TokenKind::Gt),
        ("!", TokenKind::Not),
        ("+", TokenKind::Plus),
        ("-", TokenKind::Minus),
        ("*", TokenKind::Star),
        ("/", TokenKind::Slash),
        ("%", TokenKind::Percent),
        ("?", TokenKind::Question),
        (":", TokenKind::Colon),
        ("(", TokenKind::LParen),
        (")", TokenKind::RParen),
        (",", TokenKind::Comma),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, expected, "Failed for input: {}", input);
        assert_eq!(token.raw, input);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
    }
}

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        ("&&", TokenKind::And),
        ("||", TokenKind::Or),
        ("==", TokenKind::EqEq),
        ("!=", TokenKind::NotEq),
        ("<=", TokenKind::LtEq),
        (">=", TokenKind::GtEq),
    ];

    for (input, expected) in test_cases {
        assert_eq!(kinds(input), vec![expected, TokenKind::Eof], "Failed for input: {}", input);
    }
}

#[test]
fn test_maximal_munch() {
    assert_eq!(
        kinds("a<=b"),
        vec![TokenKind::Identifier, TokenKind::LtEq, TokenKind::Identifier, TokenKind::Eof]
    );
    assert_eq!(
        kinds("!!a"),
        vec![TokenKind::Not, TokenKind::Not, TokenKind::Identifier, TokenKind::Eof]
    );
    assert_eq!(
        kinds("a!=b"),
        vec![TokenKind::Identifier, TokenKind::NotEq, TokenKind::Identifier, TokenKind::Eof]
    );
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_numbers() {
    let tokens = tokenize("42 3.14 1e3 2.5E-2").unwrap();
    let values: Vec<f64> = tokens
        .iter()
        .filter_map(|t| match &t.value {
            Some(Literal::Number { value, .. }) => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(values, vec![42.0, 3.14, 1000.0, 0.025]);
    assert_eq!(tokens[2].raw, "1e3");
}

#[test]
fn test_number_keeps_raw_text() {
    let tokens = tokenize("0.10").unwrap();
    assert_eq!(
        tokens[0].value,
        Some(Literal::Number {
            value: 0.1,
            raw: "0.10".to_string()
        })
    );
}

#[test]
fn test_strings() {
    let tokens = tokenize("'Poland' ''").unwrap();
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[0].value, Some(Literal::String("Poland".to_string())));
    assert_eq!(tokens[0].raw, "'Poland'");
    assert_eq!(tokens[1].value, Some(Literal::String(String::new())));
}

#[test]
fn test_string_has_no_escapes() {
    let tokens = tokenize(r"'C:\temp'").unwrap();
    assert_eq!(tokens[0].value, Some(Literal::String(r"C:\temp".to_string())));
}

#[test]
fn test_keywords_are_literals() {
    assert_eq!(
        kinds("true false null"),
        vec![TokenKind::Bool, TokenKind::Bool, TokenKind::Null, TokenKind::Eof]
    );
    // Keywords only match whole identifiers
    assert_eq!(kinds("nullable trueish"), vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]);
}

// ============================================================================
// Identifiers and functions
// ============================================================================

#[test]
fn test_dotted_path_is_one_token() {
    let tokens = tokenize("Contact.Details.Name").unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].kind, TokenKind::Identifier);
    assert_eq!(tokens[0].raw, "Contact.Details.Name");
}

#[test]
fn test_identifier_with_digits_and_underscores() {
    let tokens = tokenize("_field2.sub_3").unwrap();
    assert_eq!(tokens[0].raw, "_field2.sub_3");
}

#[test]
fn test_function_name() {
    let tokens = tokenize("StartsWith(Name, 'A')").unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Function);
    assert_eq!(tokens[0].raw, "StartsWith");
    assert_eq!(tokens[2].kind, TokenKind::Identifier);
}

// ============================================================================
// Locations
// ============================================================================

#[test]
fn test_locations_single_line() {
    let tokens = tokenize("Age >= 18").unwrap();
    let locations: Vec<Location> = tokens.iter().map(|t| t.location).collect();
    assert_eq!(
        locations,
        vec![
            Location::new(1, 1),
            Location::new(1, 5),
            Location::new(1, 8),
            Location::new(1, 10)
        ]
    );
}

#[test]
fn test_locations_multi_line() {
    let tokens = tokenize("GoAbroad == true\n  && Country != 'Poland'").unwrap();
    assert_eq!(tokens[3].kind, TokenKind::And);
    assert_eq!(tokens[3].location, Location::new(2, 3));
    assert_eq!(tokens[4].location, Location::new(2, 6));
    assert_eq!(tokens[6].location, Location::new(2, 17));
}

#[test]
fn test_string_spanning_lines_advances_line() {
    let tokens = tokenize("'a\nb' == X").unwrap();
    assert_eq!(tokens[1].location, Location::new(2, 4));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unterminated_string() {
    let (location, message) = syntax_error("Name == 'abc");
    assert_eq!(location, Location::new(1, 9));
    assert_eq!(message, "Unterminated string literal.");
}

#[test]
fn test_malformed_numbers() {
    for input in ["1.", "1e", "1e+", "12abc", "1.2.3"] {
        let (location, message) = syntax_error(input);
        assert_eq!(location, Location::new(1, 1), "Failed for input: {}", input);
        assert!(message.starts_with("Malformed numeric literal"), "{message}");
    }
}

#[test]
fn test_unrecognized_character() {
    let (location, message) = syntax_error("Age # 3");
    assert_eq!(location, Location::new(1, 5));
    assert_eq!(message, "Invalid token. Unexpected character '#'.");
}

#[test]
fn test_single_equals_sign() {
    let (location, message) = syntax_error("Age = 3");
    assert_eq!(location, Location::new(1, 5));
    assert!(message.contains("did you mean '=='?"));
}

// ============================================================================
// Properties
// ============================================================================

fn atom() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Z][a-z]{0,6}(\\.[A-Z][a-z]{0,6}){0,2}",
        "[0-9]{1,5}",
        "'[a-z ]{0,6}'",
        Just("==".to_string()),
        Just("&&".to_string()),
        Just("<=".to_string()),
        Just("(".to_string()),
        Just(")".to_string()),
        Just("true".to_string()),
        Just("null".to_string()),
    ]
}

fn separator() -> impl Strategy<Value = String> {
    prop_oneof![Just(" ".to_string()), Just("  ".to_string()), Just("\n".to_string()), Just(" \n\t".to_string())]
}

proptest! {
    #[test]
    fn prop_locations_point_at_raw_text(parts in prop::collection::vec((atom(), separator()), 1..12)) {
        let source: String = parts.iter().map(|(a, s)| format!("{a}{s}")).collect();
        let lines: Vec<Vec<char>> = source.split('\n').map(|l| l.chars().collect()).collect();

        for token in tokenize(&source).unwrap() {
            if token.kind == TokenKind::Eof {
                continue;
            }
            let line = &lines[token.location.line - 1];
            let start = token.location.column - 1;
            let text: String = line[start..start + token.raw.chars().count()].iter().collect();
            prop_assert_eq!(text, token.raw);
        }
    }
}
