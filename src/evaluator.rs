//! Type checking and compilation of expressions into predicates.
//!
//! Compilation is a single depth-first pass over the AST. Every node is
//! typed against the [`ModelType`] and the [`Toolchain`]; coercions are
//! decided here and recorded in the lowered [`Node`] tree, so evaluating a
//! [`CompiledPredicate`] never type-checks and never fails.

use std::{cmp::Ordering, str::FromStr, sync::Arc, time::Instant};

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::{
    ast::{BinOp, Expr, Literal, Location, UnaryOp},
    error::{Diagnostic, Error, Result},
    lexer::Lexer,
    model::{Accessor, CoarseType, EnumType, Model, ModelType, NumericKind, ValueType, names_match},
    parser::Parser,
    toolchain::{Signature, Toolchain},
    value::{Record, Value},
};

/// Options affecting how names in an expression are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompileOptions {
    /// When false, field paths, enum names and members and function names
    /// match ignoring ASCII case.
    pub case_sensitive: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { case_sensitive: true }
    }
}

impl CompileOptions {
    pub fn ignore_case() -> Self {
        CompileOptions { case_sensitive: false }
    }
}

/// Lowered expression, evaluated against a [`Record`].
#[derive(Debug, Clone)]
enum Node {
    Const(Value),
    Field(Accessor),
    Call { signature: Signature, args: Vec<Node> },
    Not(Box<Node>),
    Negate { operand: Box<Node>, kind: Option<NumericKind> },
    /// Changes the representation of a number to that of `to`
    Convert { operand: Box<Node>, to: NumericKind },
    /// Equality or relational comparison of two operands in the same representation
    Compare { op: BinOp, left: Box<Node>, right: Box<Node> },
    Arith { op: BinOp, kind: NumericKind, left: Box<Node>, right: Box<Node> },
    Concat(Box<Node>, Box<Node>),
    /// Date and time arithmetic
    Temporal { op: BinOp, left: Box<Node>, right: Box<Node> },
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Conditional { condition: Box<Node>, then_branch: Box<Node>, else_branch: Box<Node> },
    /// Enumeration value rendered as its member name
    EnumName { operand: Box<Node>, enum_type: Arc<EnumType> },
}

impl Node {
    fn eval(&self, record: &Record) -> Value {
        match self {
            Node::Const(value) => value.clone(),
            Node::Field(accessor) => accessor.read(record),
            Node::Call { signature, args } => {
                let args: Vec<Value> = args.iter().map(|arg| arg.eval(record)).collect();
                signature
                    .invoke(&args)
                    .conform(&signature.returns)
                    .unwrap_or(Value::Null)
            }
            Node::Not(operand) => match operand.eval(record) {
                Value::Bool(b) => Value::Bool(!b),
                _ => Value::Null,
            },
            Node::Negate { operand, kind } => negate(operand.eval(record), *kind),
            Node::Convert { operand, to } => convert(operand.eval(record), *to),
            Node::Compare { op, left, right } => compare(*op, &left.eval(record), &right.eval(record)),
            Node::Arith { op, kind, left, right } => {
                arithmetic(*op, *kind, left.eval(record), right.eval(record))
            }
            Node::Concat(left, right) => {
                let mut text = concat_text(left.eval(record));
                text.push_str(&concat_text(right.eval(record)));
                Value::String(text)
            }
            Node::Temporal { op, left, right } => temporal(*op, left.eval(record), right.eval(record)),
            Node::And(left, right) => Value::Bool(truthy(&left.eval(record)) && truthy(&right.eval(record))),
            Node::Or(left, right) => Value::Bool(truthy(&left.eval(record)) || truthy(&right.eval(record))),
            Node::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if truthy(&condition.eval(record)) {
                    then_branch.eval(record)
                } else {
                    else_branch.eval(record)
                }
            }
            Node::EnumName { operand, enum_type } => match operand.eval(record) {
                Value::Enum(n) => enum_type
                    .name_of(n)
                    .map_or(Value::Enum(n), |name| Value::String(name.to_string())),
                other => other,
            },
        }
    }
}

/// A null bool in a logical position counts as false.
fn truthy(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

fn concat_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn convert(value: Value, to: NumericKind) -> Value {
    match value {
        Value::Null => Value::Null,
        value if to == NumericKind::Decimal => value.as_decimal().map_or(Value::Null, Value::Decimal),
        value if to.is_floating() => value.as_float().map_or(Value::Null, |f| float(to, f)),
        value => value,
    }
}

fn float(kind: NumericKind, f: f64) -> Value {
    if kind == NumericKind::F32 {
        Value::Float(f as f32 as f64)
    } else {
        Value::Float(f)
    }
}

fn negate(value: Value, kind: Option<NumericKind>) -> Value {
    match (value, kind) {
        (Value::Int(n), Some(kind)) => Value::Int(kind.wrap(n.wrapping_neg())),
        (Value::Float(f), _) => Value::Float(-f),
        (Value::Decimal(d), _) => Value::Decimal(-d),
        (Value::TimeSpan(t), _) => Value::TimeSpan(-t),
        _ => Value::Null,
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::TimeSpan(a), Value::TimeSpan(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Lifted comparison: `null == null`, and relational operators on a null operand are false.
fn compare(op: BinOp, left: &Value, right: &Value) -> Value {
    let result = match op {
        BinOp::Equal => left == right,
        BinOp::NotEqual => left != right,
        _ => match order(left, right) {
            Some(ordering) => match op {
                BinOp::LessThan => ordering.is_lt(),
                BinOp::LessEqual => ordering.is_le(),
                BinOp::GreaterThan => ordering.is_gt(),
                BinOp::GreaterEqual => ordering.is_ge(),
                _ => false,
            },
            None => false,
        },
    };
    Value::Bool(result)
}

/// Integral results wrap to `kind`; integral division by zero and decimal overflow give null.
fn arithmetic(op: BinOp, kind: NumericKind, left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinOp::Add => a.wrapping_add(b),
                BinOp::Subtract => a.wrapping_sub(b),
                BinOp::Multiply => a.wrapping_mul(b),
                BinOp::Divide if b != 0 => a.wrapping_div(b),
                BinOp::Modulo if b != 0 => a.wrapping_rem(b),
                _ => return Value::Null,
            };
            Value::Int(kind.wrap(result))
        }
        (Value::Float(a), Value::Float(b)) => {
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Subtract => a - b,
                BinOp::Multiply => a * b,
                BinOp::Divide => a / b,
                BinOp::Modulo => a % b,
                _ => return Value::Null,
            };
            float(kind, result)
        }
        (Value::Decimal(a), Value::Decimal(b)) => {
            let result = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Subtract => a.checked_sub(b),
                BinOp::Multiply => a.checked_mul(b),
                BinOp::Divide => a.checked_div(b),
                BinOp::Modulo => a.checked_rem(b),
                _ => None,
            };
            result.map_or(Value::Null, Value::Decimal)
        }
        _ => Value::Null,
    }
}

fn temporal(op: BinOp, left: Value, right: Value) -> Value {
    let result = match (op, left, right) {
        (BinOp::Subtract, Value::DateTime(a), Value::DateTime(b)) => Some(Value::TimeSpan(a - b)),
        (BinOp::Add, Value::DateTime(a), Value::TimeSpan(b)) => a.checked_add_signed(b).map(Value::DateTime),
        (BinOp::Subtract, Value::DateTime(a), Value::TimeSpan(b)) => a.checked_sub_signed(b).map(Value::DateTime),
        (BinOp::Add, Value::TimeSpan(a), Value::TimeSpan(b)) => a.checked_add(&b).map(Value::TimeSpan),
        (BinOp::Subtract, Value::TimeSpan(a), Value::TimeSpan(b)) => a.checked_sub(&b).map(Value::TimeSpan),
        _ => None,
    };
    result.unwrap_or(Value::Null)
}

/// A predicate compiled against one model type.
///
/// Immutable once built; evaluate it from as many threads as needed.
#[derive(Debug)]
pub struct CompiledPredicate {
    source: String,
    model: Arc<ModelType>,
    dependencies: Vec<String>,
    root: Node,
}

impl CompiledPredicate {
    /// The expression text this predicate was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn model(&self) -> &Arc<ModelType> {
        &self.model
    }

    /// Dotted paths of the fields the expression reads.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Evaluates against a record of the compiled model. A null result is
    /// false, and so is a record of any other model.
    pub fn evaluate(&self, record: &Record) -> bool {
        if record.model().id() != self.model.id() {
            warn!(
                expected = self.model.name(),
                actual = record.model().name(),
                "record does not belong to the compiled model"
            );
            return false;
        }
        truthy(&self.root.eval(record))
    }

    pub fn evaluate_model<M: Model>(&self, instance: &M) -> bool {
        self.evaluate(&instance.to_record())
    }
}

/// Compiles expressions against one model with one toolchain.
pub struct Compiler<'a> {
    model: &'a Arc<ModelType>,
    toolchain: &'a Toolchain,
    options: CompileOptions,
}

impl<'a> Compiler<'a> {
    pub fn new(model: &'a Arc<ModelType>, toolchain: &'a Toolchain, options: CompileOptions) -> Self {
        Compiler {
            model,
            toolchain,
            options,
        }
    }

    /// Lexes, parses and compiles an expression.
    pub fn compile(&self, expression: &str) -> Result<CompiledPredicate> {
        let ast = Parser::new(Lexer::new(expression))?.parse()?;
        self.compile_ast(&ast, expression)
    }

    /// Compiles an already parsed expression; `source` is the text it was parsed from.
    pub fn compile_ast(&self, ast: &Expr, source: &str) -> Result<CompiledPredicate> {
        let started = Instant::now();
        let mut lowering = Lowering {
            model: self.model,
            toolchain: self.toolchain,
            case_sensitive: self.options.case_sensitive,
            enums: self.model.enums(),
            source,
            dependencies: Vec::new(),
        };

        let root = lowering.lower(ast)?;
        if !is_bool(&root.ty) {
            return Err(Error::type_mismatch(
                ast.location(),
                format!("Expression must evaluate to bool, not '{}'.", root.ty),
                source,
            ));
        }

        debug!(
            model = self.model.name(),
            expression = source,
            elapsed = ?started.elapsed(),
            "compiled expression"
        );

        Ok(CompiledPredicate {
            source: source.to_string(),
            model: self.model.clone(),
            dependencies: lowering.dependencies,
            root: root.node,
        })
    }
}

/// Compiles an expression against `model`.
///
/// # Examples
///
/// ```
/// use expressive::{CompileOptions, ModelType, NumericKind, Record, Toolchain, ValueType, compile};
///
/// let model = ModelType::builder("Person")
///     .field("Age", ValueType::Number(NumericKind::I32))
///     .build();
/// let adult = compile("Age >= 18", &model, &Toolchain::new(), CompileOptions::default()).unwrap();
///
/// let record = Record::builder(&model).set("Age", 17).build().unwrap();
/// assert!(!adult.evaluate(&record));
/// ```
pub fn compile(
    expression: &str,
    model: &Arc<ModelType>,
    toolchain: &Toolchain,
    options: CompileOptions,
) -> Result<CompiledPredicate> {
    Compiler::new(model, toolchain, options).compile(expression)
}

/// Lowered node with its static type.
struct Typed {
    node: Node,
    ty: ValueType,
    /// Source of numeric literals, for exact re-coercion
    raw: Option<RawLiteral>,
}

struct RawLiteral {
    text: String,
    location: Location,
}

impl Typed {
    fn new(node: Node, ty: ValueType) -> Self {
        Typed { node, ty, raw: None }
    }
}

fn is_bool(ty: &ValueType) -> bool {
    matches!(ty.underlying(), ValueType::Bool | ValueType::Null)
}

/// Kind of an integral literal: the narrowest of i32, i64 and u64 holding it.
fn literal_kind(n: i128) -> Option<NumericKind> {
    [NumericKind::I32, NumericKind::I64, NumericKind::U64]
        .into_iter()
        .find(|kind| kind.fits(n))
}

/// Integral kinds narrower than i32 are promoted before arithmetic.
fn promote(kind: NumericKind) -> NumericKind {
    match kind {
        NumericKind::I8 | NumericKind::U8 | NumericKind::I16 | NumericKind::U16 => NumericKind::I32,
        other => other,
    }
}

fn nullable_if(ty: ValueType, nullable: bool) -> ValueType {
    if nullable { ty.nullable() } else { ty }
}

struct Lowering<'a> {
    model: &'a ModelType,
    toolchain: &'a Toolchain,
    case_sensitive: bool,
    enums: Vec<Arc<EnumType>>,
    source: &'a str,
    dependencies: Vec<String>,
}

impl Lowering<'_> {
    fn mismatch(&self, location: Location, message: String) -> Error {
        Error::type_mismatch(location, message, self.source)
    }

    fn operands_mismatch(&self, op: &str, left: &ValueType, right: &ValueType, location: Location) -> Error {
        self.mismatch(
            location,
            format!("Operator '{op}' cannot be applied to operands of type '{left}' and '{right}'."),
        )
    }

    fn lower(&mut self, expr: &Expr) -> Result<Typed> {
        match expr {
            Expr::Literal { value, location } => Ok(self.lower_literal(value, *location)),
            Expr::Field { path, location } => self.lower_field(path, *location),
            Expr::Call { name, args, location } => self.lower_call(name, args, *location),
            Expr::Unary { op, operand, location } => self.lower_unary(*op, operand, *location),
            Expr::Binary {
                op,
                left,
                right,
                location,
            } => self.lower_binary(*op, left, right, *location),
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
                location,
            } => {
                let condition = self.lower(condition)?;
                if !is_bool(&condition.ty) {
                    return Err(self.mismatch(
                        *location,
                        format!("Condition must be bool, not '{}'.", condition.ty),
                    ));
                }
                let then_branch = self.lower(then_branch)?;
                let else_branch = self.lower(else_branch)?;
                let (then_node, else_node, ty) = self.unify("?:", then_branch, else_branch, *location)?;

                Ok(Typed::new(
                    Node::Conditional {
                        condition: Box::new(condition.node),
                        then_branch: Box::new(then_node),
                        else_branch: Box::new(else_node),
                    },
                    ty,
                ))
            }
        }
    }

    fn lower_literal(&self, literal: &Literal, location: Location) -> Typed {
        match literal {
            Literal::Bool(b) => Typed::new(Node::Const(Value::Bool(*b)), ValueType::Bool),
            Literal::String(s) => Typed::new(Node::Const(Value::String(s.clone())), ValueType::String),
            Literal::Null => Typed::new(Node::Const(Value::Null), ValueType::Null),
            Literal::Number { value, raw } => {
                let integral = literal
                    .is_integral()
                    .then(|| raw.parse::<i128>().ok())
                    .flatten()
                    .and_then(|n| literal_kind(n).map(|kind| (n, kind)));

                let (value, kind) = match integral {
                    Some((n, kind)) => (Value::Int(n), kind),
                    None => (Value::Float(*value), NumericKind::F64),
                };
                Typed {
                    node: Node::Const(value),
                    ty: ValueType::Number(kind),
                    raw: Some(RawLiteral {
                        text: raw.clone(),
                        location,
                    }),
                }
            }
        }
    }

    fn lower_field(&mut self, path: &[String], location: Location) -> Result<Typed> {
        match self.model.resolve(path, self.case_sensitive) {
            Ok(resolved) => {
                let joined = path.join(".");
                if !self.dependencies.contains(&joined) {
                    self.dependencies.push(joined);
                }
                Ok(Typed::new(Node::Field(resolved.accessor), resolved.value_type))
            }
            Err(unknown) => {
                if let Some(member) = self.enum_member(path) {
                    return Ok(member);
                }
                // Point at the unresolved segment within the path
                let offset: usize = path[..unknown.depth].iter().map(|s| s.chars().count() + 1).sum();
                let location = Location::new(location.line, location.column + offset);
                Err(Error::Resolution {
                    segment: unknown.segment.clone(),
                    diagnostic: Diagnostic::new(location, unknown.to_string(), self.source),
                })
            }
        }
    }

    /// `Enum.Member` for enumerations reachable from the model.
    fn enum_member(&self, path: &[String]) -> Option<Typed> {
        let (member, name) = path.split_last()?;
        if name.is_empty() {
            return None;
        }
        let name = name.join(".");
        let enum_type = self
            .enums
            .iter()
            .find(|e| names_match(e.name(), &name, self.case_sensitive))?;
        let value = enum_type.value_of(member, self.case_sensitive)?;
        Some(Typed::new(
            Node::Const(Value::Enum(value)),
            ValueType::Enum(enum_type.clone()),
        ))
    }

    fn lower_call(&mut self, name: &str, args: &[Expr], location: Location) -> Result<Typed> {
        let args = args.iter().map(|arg| self.lower(arg)).collect::<Result<Vec<_>>>()?;
        let coarse: Vec<Option<CoarseType>> = args.iter().map(|arg| arg.ty.coarse_type()).collect();

        let Some(signature) = self.toolchain.resolve(name, &coarse, self.case_sensitive) else {
            let same_arity = self
                .toolchain
                .overloads(name, self.case_sensitive)
                .any(|s| s.params.len() == args.len());
            let message = if same_arity {
                let types: Vec<String> = coarse
                    .iter()
                    .map(|c| c.map_or("null".to_string(), |c| c.to_string()))
                    .collect();
                format!("Function '{name}' has no overload accepting ({}).", types.join(", "))
            } else {
                format!("Function '{name}' accepting {} argument(s) not found.", args.len())
            };
            return Err(Error::UnresolvedFunction {
                name: name.to_string(),
                diagnostic: Diagnostic::new(location, message, self.source),
            });
        };

        Ok(Typed::new(
            Node::Call {
                signature: signature.clone(),
                args: args.into_iter().map(|arg| arg.node).collect(),
            },
            signature.returns.clone(),
        ))
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr, location: Location) -> Result<Typed> {
        let operand = self.lower(operand)?;
        let nullable = operand.ty.is_nullable();

        match (op, operand.ty.underlying().clone()) {
            (UnaryOp::Not, ValueType::Bool | ValueType::Null) => Ok(Typed::new(
                Node::Not(Box::new(operand.node)),
                nullable_if(ValueType::Bool, nullable),
            )),
            (UnaryOp::Negate, ValueType::Number(kind)) => self.negate_number(operand, kind, nullable),
            (UnaryOp::Negate, ValueType::TimeSpan) => Ok(Typed::new(
                Node::Negate {
                    operand: Box::new(operand.node),
                    kind: None,
                },
                nullable_if(ValueType::TimeSpan, nullable),
            )),
            (op, ty) => Err(self.mismatch(
                location,
                format!("Operator '{op}' cannot be applied to operand of type '{ty}'."),
            )),
        }
    }

    fn negate_number(&self, operand: Typed, kind: NumericKind, nullable: bool) -> Result<Typed> {
        // Fold negative literals so they keep their exact text
        if let (Node::Const(value), Some(raw)) = (&operand.node, &operand.raw) {
            let raw = Some(RawLiteral {
                text: format!("-{}", raw.text),
                location: raw.location,
            });
            match value {
                Value::Int(n) => {
                    if let Some(kind) = literal_kind(-n) {
                        return Ok(Typed {
                            node: Node::Const(Value::Int(-n)),
                            ty: ValueType::Number(kind),
                            raw,
                        });
                    }
                }
                Value::Float(f) => {
                    return Ok(Typed {
                        node: Node::Const(Value::Float(-f)),
                        ty: ValueType::Number(kind),
                        raw,
                    });
                }
                _ => {}
            }
        }

        let kind = match promote(kind) {
            NumericKind::U32 | NumericKind::U64 => NumericKind::I64,
            other => other,
        };
        let operand = self.coerce(operand, kind)?;
        Ok(Typed::new(
            Node::Negate {
                operand: Box::new(operand),
                kind: Some(kind),
            },
            nullable_if(ValueType::Number(kind), nullable),
        ))
    }

    /// Converts a numeric operand to the representation of `to`. A literal
    /// that `to` cannot represent exactly is a type mismatch.
    fn coerce(&self, operand: Typed, to: NumericKind) -> Result<Node> {
        let from = operand.ty.numeric_kind();
        if from == Some(to) || (from.is_some_and(NumericKind::is_integral) && to.is_integral()) {
            return Ok(operand.node);
        }

        if let (Node::Const(value), Some(raw)) = (&operand.node, &operand.raw) {
            if to == NumericKind::Decimal {
                let text = raw.text.as_str();
                return Decimal::from_str(text)
                    .or_else(|_| Decimal::from_scientific(text))
                    .map(|d| Node::Const(Value::Decimal(d)))
                    .map_err(|_| {
                        self.mismatch(
                            raw.location,
                            format!("Literal {text} is out of range for type '{}'.", ValueType::Number(to)),
                        )
                    });
            } else if to.is_floating() {
                return Ok(Node::Const(convert(value.clone(), to)));
            }
        }

        Ok(Node::Convert {
            operand: Box::new(operand.node),
            to,
        })
    }

    /// Brings two operands to a common type: numbers are widened, a null
    /// operand makes the other side nullable.
    fn unify(&self, op: &str, left: Typed, right: Typed, location: Location) -> Result<(Node, Node, ValueType)> {
        let nullable = left.ty.is_nullable() || right.ty.is_nullable();

        match (left.ty.underlying().clone(), right.ty.underlying().clone()) {
            (ValueType::Null, ValueType::Null) => Ok((left.node, right.node, ValueType::Null)),
            (ValueType::Null, ty) => Ok((left.node, right.node, ty.nullable())),
            (ty, ValueType::Null) => Ok((left.node, right.node, ty.nullable())),
            (ValueType::Number(a), ValueType::Number(b)) => {
                let kind = a.widen(b);
                let ty = nullable_if(ValueType::Number(kind), nullable);
                Ok((self.coerce(left, kind)?, self.coerce(right, kind)?, ty))
            }
            (ValueType::Enum(a), ValueType::Enum(b)) if a == b => {
                Ok((left.node, right.node, nullable_if(ValueType::Enum(a), nullable)))
            }
            (a, b) if a.coarse_type() == b.coarse_type() && !matches!(a, ValueType::Enum(_)) => {
                Ok((left.node, right.node, nullable_if(a, nullable)))
            }
            _ => Err(self.operands_mismatch(op, &left.ty, &right.ty, location)),
        }
    }

    fn lower_binary(&mut self, op: BinOp, left: &Expr, right: &Expr, location: Location) -> Result<Typed> {
        let left = self.lower(left)?;
        let right = self.lower(right)?;

        match op {
            BinOp::And | BinOp::Or => {
                if !is_bool(&left.ty) || !is_bool(&right.ty) {
                    return Err(self.operands_mismatch(op.symbol(), &left.ty, &right.ty, location));
                }
                let (l, r) = (Box::new(left.node), Box::new(right.node));
                let node = if op == BinOp::And { Node::And(l, r) } else { Node::Or(l, r) };
                Ok(Typed::new(node, ValueType::Bool))
            }
            op if op.is_equality() || op.is_relational() => {
                let (left_ty, right_ty) = (left.ty.clone(), right.ty.clone());
                let (l, r, common) = self.unify(op.symbol(), left, right, location)?;
                let orderable = matches!(
                    common.coarse_type(),
                    None | Some(CoarseType::Number | CoarseType::DateTime | CoarseType::TimeSpan)
                );
                if op.is_relational() && !orderable {
                    return Err(self.operands_mismatch(op.symbol(), &left_ty, &right_ty, location));
                }
                Ok(Typed::new(
                    Node::Compare {
                        op,
                        left: Box::new(l),
                        right: Box::new(r),
                    },
                    ValueType::Bool,
                ))
            }
            op => self.lower_arithmetic(op, left, right, location),
        }
    }

    fn lower_arithmetic(&self, op: BinOp, left: Typed, right: Typed, location: Location) -> Result<Typed> {
        let nullable = left.ty.is_nullable() || right.ty.is_nullable();
        let coarse = (left.ty.coarse_type(), right.ty.coarse_type());

        if op == BinOp::Add && (coarse.0 == Some(CoarseType::String) || coarse.1 == Some(CoarseType::String)) {
            return Ok(Typed::new(
                Node::Concat(Box::new(self.text_operand(left)), Box::new(self.text_operand(right))),
                ValueType::String,
            ));
        }

        let (left_kind, right_kind) = match (left.ty.underlying(), right.ty.underlying()) {
            (ValueType::Number(a), ValueType::Number(b)) => (Some(*a), Some(*b)),
            (ValueType::Number(a), ValueType::Null) => (Some(*a), None),
            (ValueType::Null, ValueType::Number(b)) => (None, Some(*b)),
            _ => (None, None),
        };
        if let Some(kind) = left_kind.or(right_kind) {
            let kind = promote(left_kind.unwrap_or(kind).widen(right_kind.unwrap_or(kind)));
            let ty = nullable_if(ValueType::Number(kind), nullable);
            return Ok(Typed::new(
                Node::Arith {
                    op,
                    kind,
                    left: Box::new(self.coerce(left, kind)?),
                    right: Box::new(self.coerce(right, kind)?),
                },
                ty,
            ));
        }

        let result = match (op, left.ty.underlying(), right.ty.underlying()) {
            (BinOp::Subtract, ValueType::DateTime, ValueType::DateTime) => Some(ValueType::TimeSpan),
            (BinOp::Add | BinOp::Subtract, ValueType::DateTime, ValueType::TimeSpan) => Some(ValueType::DateTime),
            (BinOp::Add | BinOp::Subtract, ValueType::TimeSpan, ValueType::TimeSpan) => Some(ValueType::TimeSpan),
            _ => None,
        };
        match result {
            Some(ty) => Ok(Typed::new(
                Node::Temporal {
                    op,
                    left: Box::new(left.node),
                    right: Box::new(right.node),
                },
                nullable_if(ty, nullable),
            )),
            None => Err(self.operands_mismatch(op.symbol(), &left.ty, &right.ty, location)),
        }
    }

    /// Operand of a string concatenation; enumerations render as member names.
    fn text_operand(&self, operand: Typed) -> Node {
        match operand.ty.enum_type() {
            Some(enum_type) => Node::EnumName {
                operand: Box::new(operand.node),
                enum_type: enum_type.clone(),
            },
            None => operand.node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_arithmetic_wraps() {
        let result = arithmetic(BinOp::Add, NumericKind::I32, Value::Int(i32::MAX as i128), Value::Int(1));
        assert_eq!(result, Value::Int(i32::MIN as i128));
    }

    #[test]
    fn test_division_by_zero_is_null() {
        assert_eq!(arithmetic(BinOp::Divide, NumericKind::I32, Value::Int(1), Value::Int(0)), Value::Null);
        assert_eq!(arithmetic(BinOp::Modulo, NumericKind::I64, Value::Int(1), Value::Int(0)), Value::Null);
    }

    #[test]
    fn test_relational_with_null_is_false() {
        assert_eq!(compare(BinOp::LessThan, &Value::Null, &Value::Int(1)), Value::Bool(false));
        assert_eq!(compare(BinOp::GreaterEqual, &Value::Null, &Value::Null), Value::Bool(false));
        assert_eq!(compare(BinOp::Equal, &Value::Null, &Value::Null), Value::Bool(true));
    }

    #[test]
    fn test_literal_kind() {
        assert_eq!(literal_kind(5), Some(NumericKind::I32));
        assert_eq!(literal_kind(1 << 40), Some(NumericKind::I64));
        assert_eq!(literal_kind(u64::MAX as i128), Some(NumericKind::U64));
        assert_eq!(literal_kind(1 << 70), None);
    }
}
