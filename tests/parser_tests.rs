// tests/parser_tests.rs

use expressive::ast::{BinOp, Expr, Literal, Location, UnaryOp};
use expressive::error::Error;
use expressive::parser::{MAX_NESTING, parse};

// Helper functions to build expected trees, ignoring locations
fn strip(expr: Expr) -> Expr {
    let location = Location::default();
    match expr {
        Expr::Literal { value, .. } => Expr::Literal { value, location },
        Expr::Field { path, .. } => Expr::Field { path, location },
        Expr::Call { name, args, .. } => Expr::Call {
            name,
            args: args.into_iter().map(strip).collect(),
            location,
        },
        Expr::Unary { op, operand, .. } => Expr::Unary {
            op,
            operand: Box::new(strip(*operand)),
            location,
        },
        Expr::Binary { op, left, right, .. } => Expr::Binary {
            op,
            left: Box::new(strip(*left)),
            right: Box::new(strip(*right)),
            location,
        },
        Expr::Conditional {
            condition,
            then_branch,
            else_branch,
            ..
        } => Expr::Conditional {
            condition: Box::new(strip(*condition)),
            then_branch: Box::new(strip(*then_branch)),
            else_branch: Box::new(strip(*else_branch)),
            location,
        },
    }
}

fn parse_stripped(input: &str) -> Expr {
    strip(parse(input).unwrap())
}

fn field(path: &str) -> Expr {
    Expr::Field {
        path: path.split('.').map(str::to_string).collect(),
        location: Location::default(),
    }
}

fn num(raw: &str) -> Expr {
    Expr::Literal {
        value: Literal::Number {
            value: raw.parse().unwrap(),
            raw: raw.to_string(),
        },
        location: Location::default(),
    }
}

fn string(s: &str) -> Expr {
    Expr::Literal {
        value: Literal::String(s.to_string()),
        location: Location::default(),
    }
}

fn boolean(b: bool) -> Expr {
    Expr::Literal {
        value: Literal::Bool(b),
        location: Location::default(),
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        location: Location::default(),
    }
}

fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Box::new(operand),
        location: Location::default(),
    }
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.to_string(),
        args,
        location: Location::default(),
    }
}

fn syntax_error(input: &str) -> (Location, String, String) {
    match parse(input) {
        Err(Error::Syntax(d)) => {
            let rendered = d.to_string();
            (d.location, d.message, rendered)
        }
        other => panic!("expected syntax error for {input:?}, got {other:?}"),
    }
}

// ============================================================================
// Primaries
// ============================================================================

#[test]
fn test_literals() {
    assert_eq!(parse_stripped("true"), boolean(true));
    assert_eq!(parse_stripped("'Poland'"), string("Poland"));
    assert_eq!(parse_stripped("2.5"), num("2.5"));
    assert_eq!(
        parse_stripped("null"),
        Expr::Literal {
            value: Literal::Null,
            location: Location::default()
        }
    );
}

#[test]
fn test_field_path_segments() {
    assert_eq!(parse_stripped("Contact.Details.Email"), field("Contact.Details.Email"));
}

#[test]
fn test_function_calls() {
    assert_eq!(parse_stripped("Today()"), call("Today", vec![]));
    assert_eq!(
        parse_stripped("StartsWith(Name, 'A')"),
        call("StartsWith", vec![field("Name"), string("A")])
    );
    assert_eq!(
        parse_stripped("Length(Trim(Name))"),
        call("Length", vec![call("Trim", vec![field("Name")])])
    );
}

#[test]
fn test_parenthesized_group() {
    assert_eq!(
        parse_stripped("(A + B) * C"),
        binary(
            BinOp::Multiply,
            binary(BinOp::Add, field("A"), field("B")),
            field("C")
        )
    );
}

// ============================================================================
// Precedence and associativity
// ============================================================================

#[test]
fn test_and_binds_tighter_than_or() {
    assert_eq!(
        parse_stripped("A || B && C"),
        binary(BinOp::Or, field("A"), binary(BinOp::And, field("B"), field("C")))
    );
}

#[test]
fn test_comparison_binds_tighter_than_and() {
    assert_eq!(
        parse_stripped("GoAbroad == true && Country != 'Poland'"),
        binary(
            BinOp::And,
            binary(BinOp::Equal, field("GoAbroad"), boolean(true)),
            binary(BinOp::NotEqual, field("Country"), string("Poland"))
        )
    );
}

#[test]
fn test_relational_binds_tighter_than_equality() {
    assert_eq!(
        parse_stripped("A < B == true"),
        binary(BinOp::Equal, binary(BinOp::LessThan, field("A"), field("B")), boolean(true))
    );
}

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(
        parse_stripped("1 + 2 * 3 % 4"),
        binary(
            BinOp::Add,
            num("1"),
            binary(BinOp::Modulo, binary(BinOp::Multiply, num("2"), num("3")), num("4"))
        )
    );
}

#[test]
fn test_left_associativity() {
    assert_eq!(
        parse_stripped("10 - 4 - 3"),
        binary(BinOp::Subtract, binary(BinOp::Subtract, num("10"), num("4")), num("3"))
    );
}

#[test]
fn test_unary_operators() {
    assert_eq!(
        parse_stripped("!!A"),
        unary(UnaryOp::Not, unary(UnaryOp::Not, field("A")))
    );
    assert_eq!(
        parse_stripped("-A * 2"),
        binary(BinOp::Multiply, unary(UnaryOp::Negate, field("A")), num("2"))
    );
}

#[test]
fn test_conditional_is_right_associative_and_loosest() {
    assert_eq!(
        parse_stripped("A ? B : C ? D : E"),
        Expr::Conditional {
            condition: Box::new(field("A")),
            then_branch: Box::new(field("B")),
            else_branch: Box::new(Expr::Conditional {
                condition: Box::new(field("C")),
                then_branch: Box::new(field("D")),
                else_branch: Box::new(field("E")),
                location: Location::default(),
            }),
            location: Location::default(),
        }
    );

    let Expr::Conditional { condition, .. } = parse_stripped("A || B ? 1 : 2") else {
        panic!("expected conditional");
    };
    assert_eq!(*condition, binary(BinOp::Or, field("A"), field("B")));
}

#[test]
fn test_binary_located_at_operator() {
    let expr = parse("Age >= 18").unwrap();
    assert_eq!(expr.location(), Location::new(1, 5));
}

#[test]
fn test_field_paths() {
    let expr = parse("A.B == 1 && Length(C) > 0 || A.B != D").unwrap();
    assert_eq!(expr.field_paths(), vec!["A.B", "C", "D"]);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_missing_operand_at_end_of_input() {
    let (location, message, rendered) = syntax_error("GoAbroad ==");
    assert_eq!(location, Location::new(1, 12));
    assert!(message.contains("Unexpected end of expression."), "{message}");
    assert!(rendered.starts_with("Parse error on line 1, last column: "), "{rendered}");
}

#[test]
fn test_unexpected_token_points_at_it() {
    let (location, message, rendered) = syntax_error("A == == B");
    assert_eq!(location, Location::new(1, 6));
    assert!(message.contains("Unexpected token \"==\"."), "{message}");
    assert_eq!(rendered.lines().nth(1), Some("... == B ..."));
}

#[test]
fn test_unmatched_parenthesis() {
    let (location, message, _) = syntax_error("(A && B");
    assert_eq!(location, Location::new(1, 8));
    assert!(message.starts_with("Expected \")\""), "{message}");

    let (location, message, _) = syntax_error("A && B)");
    assert_eq!(location, Location::new(1, 7));
    assert!(message.starts_with("Expected end of expression"), "{message}");
}

#[test]
fn test_trailing_tokens() {
    let (location, _, _) = syntax_error("A == 1 B");
    assert_eq!(location, Location::new(1, 8));
}

#[test]
fn test_bad_argument_list() {
    let (_, message, _) = syntax_error("Concat(A B)");
    assert!(message.starts_with("Expected \",\" or \")\""), "{message}");

    let (location, _, _) = syntax_error("Concat(A,)");
    assert_eq!(location, Location::new(1, 10));
}

#[test]
fn test_missing_conditional_colon() {
    let (_, message, _) = syntax_error("A ? B");
    assert!(message.starts_with("Expected \":\""), "{message}");
}

#[test]
fn test_lexer_errors_surface_from_parse() {
    let (location, _, _) = syntax_error("A == 'open");
    assert_eq!(location, Location::new(1, 6));
}

// ============================================================================
// Nesting
// ============================================================================

fn parenthesized(depth: usize) -> String {
    format!("{}true{}", "(".repeat(depth), ")".repeat(depth))
}

#[test]
fn test_nesting_up_to_the_limit_parses() {
    assert!(parse(&parenthesized(MAX_NESTING)).is_ok());
    assert!(parse(&format!("{}A", "!".repeat(MAX_NESTING))).is_ok());
    assert!(parse(&vec!["A"; MAX_NESTING].join(" && ")).is_ok());
    assert!(parse(&format!("{}C", "A ? B : ".repeat(MAX_NESTING))).is_ok());
}

#[test]
fn test_nesting_past_the_limit_is_a_syntax_error() {
    let error = parse(&parenthesized(500)).unwrap_err();
    assert!(matches!(error, Error::Syntax(_)), "{error:?}");
    assert_eq!(error.location(), Some(Location::new(1, MAX_NESTING + 2)));
    assert_eq!(
        error.diagnostic().unwrap().message,
        format!("Expression nested deeper than {MAX_NESTING} levels.")
    );

    for expression in [
        format!("{}A", "!".repeat(20_000)),
        format!("{}A", "-".repeat(MAX_NESTING + 1)),
        vec!["A"; 5_000].join(" + "),
        format!("{}C", "A ? B : ".repeat(500)),
        format!("{}true{}", "Trim(".repeat(500), ")".repeat(500)),
    ] {
        assert!(matches!(parse(&expression), Err(Error::Syntax(_))));
    }
}
