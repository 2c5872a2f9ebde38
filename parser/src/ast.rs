//! FILENAME: core/parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for formula expressions.
//! CONTEXT: After the Lexer tokenizes a formula string, the Parser converts
//! those tokens into this tree structure. The engine crate's evaluator then
//! traverses this tree to compute the final result.
//!
//! SUPPORTED EXPRESSIONS:
//! - Literals: numbers
//! - Cell references: A1, AA100
//! - Binary operations: +, -, *, /
//! - Unary operations: - (negation), + (identity)

/// Represents a parsed formula expression.
/// This is the core data structure the evaluator traverses.
///
/// `CellRef`'s column is stored as the raw uppercased letters and the row as
/// the 1-indexed number exactly as written; the engine crate is responsible
/// for turning that pair into a validated `Position`, since this crate has no
/// notion of grid bounds.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// A numeric literal.
    Literal(f64),

    /// A single cell reference like A1 or AA100.
    CellRef { col: String, row: u32 },

    /// A binary operation: left op right (e.g., 5 + 3).
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// A unary operation: op operand (e.g., -5).
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
}

/// Binary operators for expressions, in precedence order (lowest first).
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    Add,      // +
    Subtract, // -
    Multiply, // *
    Divide,   // /
}

impl BinaryOperator {
    /// Binding power used by the canonical printer to decide when a child
    /// expression needs parentheses. Higher binds tighter.
    fn binding_power(self) -> u8 {
        match self {
            BinaryOperator::Add | BinaryOperator::Subtract => 1,
            BinaryOperator::Multiply | BinaryOperator::Divide => 2,
        }
    }
}

/// Unary operators.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOperator {
    Negate, // -
    Identity, // +
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
        }
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Identity => write!(f, "+"),
        }
    }
}

impl Expression {
    /// Renders the tree back to a string with minimal parenthesization,
    /// consistent with the grammar's precedence and left-associativity.
    ///
    /// `min_bp` is the binding power the surrounding context requires of this
    /// subexpression; a child whose own operator binds more loosely than that
    /// gets wrapped in parentheses. This is the standard precedence-climbing
    /// printer, run with `min_bp = 0` at the root.
    fn fmt_with(&self, f: &mut std::fmt::Formatter<'_>, min_bp: u8) -> std::fmt::Result {
        match self {
            Expression::Literal(n) => write!(f, "{}", n),
            Expression::CellRef { col, row } => write!(f, "{}{}", col, row),
            Expression::UnaryOp { op, operand } => {
                write!(f, "{}", op)?;
                operand.fmt_with(f, 3)
            }
            Expression::BinaryOp { left, op, right } => {
                let bp = op.binding_power();
                let needs_parens = bp < min_bp;
                if needs_parens {
                    write!(f, "(")?;
                }
                left.fmt_with(f, bp)?;
                write!(f, "{}", op)?;
                // The right operand of a left-associative operator must bind
                // strictly tighter than its own operator to round-trip correctly
                // (e.g. 1-(2-3) must keep its parens).
                right.fmt_with(f, bp + 1)?;
                if needs_parens {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_with(f, 0)
    }
}
