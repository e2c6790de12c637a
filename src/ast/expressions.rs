use crate::ast::{BinOp, Location, UnaryOp};

/// A literal value as written in the expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `true` / `false`
    Bool(bool),

    /// Numeric literal, parsed eagerly with double precision.
    ///
    /// The raw text is kept so the compiler can re-coerce the literal to the
    /// exact numeric type of the operand it meets (e.g. an exact decimal).
    Number { value: f64, raw: String },

    /// String literal without its quotes
    String(String),

    /// `null`
    Null,
}

impl Literal {
    /// True for numbers written without a fraction or exponent.
    pub fn is_integral(&self) -> bool {
        match self {
            Literal::Number { raw, .. } => raw.bytes().all(|b| b.is_ascii_digit()),
            _ => false,
        }
    }
}

/// Abstract Syntax Tree node.
///
/// Every node remembers the location it was parsed at so that the compiler
/// can point its diagnostics at the offending part of the expression. Binary
/// nodes are located at their operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    ///
    /// # Example
    /// ```text
    /// 'Poland'
    /// ```
    Literal { value: Literal, location: Location },

    /// Field path, segments kept verbatim
    ///
    /// # Example
    /// ```text
    /// ContactDetails.Email   // ["ContactDetails", "Email"]
    /// ```
    Field { path: Vec<String>, location: Location },

    /// Function call, zero or more arguments
    ///
    /// # Example
    /// ```text
    /// StartsWith(Name, 'A')
    /// ```
    Call {
        name: String,
        args: Vec<Expr>,
        location: Location,
    },

    /// `!operand` or `-operand`
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        location: Location,
    },

    /// Arithmetic, comparison and logical operations
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        location: Location,
    },

    /// `condition ? then_branch : else_branch`
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        location: Location,
    },
}

impl Expr {
    pub fn location(&self) -> Location {
        match self {
            Expr::Literal { location, .. }
            | Expr::Field { location, .. }
            | Expr::Call { location, .. }
            | Expr::Unary { location, .. }
            | Expr::Binary { location, .. }
            | Expr::Conditional { location, .. } => *location,
        }
    }

    /// Dotted field paths referenced anywhere in the tree, in order of appearance.
    pub fn field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths(&self, paths: &mut Vec<String>) {
        match self {
            Expr::Literal { .. } => {}
            Expr::Field { path, .. } => {
                let joined = path.join(".");
                if !paths.contains(&joined) {
                    paths.push(joined);
                }
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_paths(paths);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_paths(paths),
            Expr::Binary { left, right, .. } => {
                left.collect_paths(paths);
                right.collect_paths(paths);
            }
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                condition.collect_paths(paths);
                then_branch.collect_paths(paths);
                else_branch.collect_paths(paths);
            }
        }
    }
}
