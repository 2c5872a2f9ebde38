//! FILENAME: core/engine/src/formula.rs
//! PURPOSE: Thin façade over `parser::Expression`: parses formula bodies,
//! evaluates them against a sheet-supplied numeric resolver, caches the
//! result, and renders a canonical textual form.
//! CONTEXT: Keeps the parser crate free of any notion of cell values or
//! grid bounds; this module is where a parsed AST meets spreadsheet
//! semantics (coercion rules, error propagation, caching).

use std::cell::RefCell;

use parser::{BinaryOperator, Expression, UnaryOperator};

use crate::cell::FormulaError;
use crate::cell::Value;
use crate::position::Position;

/// A formula body failed to parse. Wraps the parser crate's own error so
/// callers get a descriptive message without this crate re-deriving one.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaParseError(pub parser::ParseError);

impl std::fmt::Display for FormulaParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FormulaParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<parser::ParseError> for FormulaParseError {
    fn from(e: parser::ParseError) -> Self {
        FormulaParseError(e)
    }
}

/// A parsed formula body (no leading `=`) plus its evaluated-value cache.
///
/// The cache is `RefCell`-wrapped so `value()`/`evaluate()` can stay `&self`
/// even though evaluating first fills it in — the same interior-mutability
/// shape this codebase's `Evaluator` uses for its own incidental state.
#[derive(Debug)]
pub struct Formula {
    expr: Expression,
    cache: RefCell<Option<Value>>,
}

impl Clone for Formula {
    fn clone(&self) -> Self {
        Formula {
            expr: self.expr.clone(),
            cache: RefCell::new(self.cache.borrow().clone()),
        }
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl Formula {
    /// Parses `text` (the formula body with the leading `=` already
    /// stripped by the caller) into a `Formula`.
    pub fn parse(text: &str) -> Result<Self, FormulaParseError> {
        let expr = parser::parse(text)?;
        Ok(Formula {
            expr,
            cache: RefCell::new(None),
        })
    }

    /// The valid positions this formula references, deduplicated, in the
    /// AST's traversal order. Invalid references are dropped — they don't
    /// need a dependency edge because they fail at evaluation time on their
    /// own, via the `Position::is_valid` check in `eval`.
    pub fn referenced_cells(&self) -> Vec<Position> {
        let mut out = Vec::new();
        collect_refs(&self.expr, &mut out);
        out
    }

    /// Evaluates the formula, reusing the cache if present. `resolve` turns
    /// a referenced cell's current content into a number or an error
    /// following the coercion rules owned by the sheet (missing/empty -> 0,
    /// numeric text -> its value, non-numeric text -> `Value` error, an
    /// error cell -> that same error).
    pub fn evaluate(&self, resolve: &dyn Fn(Position) -> Result<f64, FormulaError>) -> Value {
        if let Some(cached) = self.cache.borrow().as_ref() {
            return cached.clone();
        }

        let result = match eval(&self.expr, resolve) {
            Ok(n) => Value::Number(n),
            Err(e) => Value::Error(e),
        };

        *self.cache.borrow_mut() = Some(result.clone());
        result
    }

    /// Drops the cached value; the next `evaluate()` call recomputes.
    pub fn invalidate(&self) {
        *self.cache.borrow_mut() = None;
    }

    /// Canonical textual form with the leading `=` restored.
    pub fn to_text(&self) -> String {
        format!("={}", self.expr)
    }
}

fn collect_refs(expr: &Expression, out: &mut Vec<Position>) {
    match expr {
        Expression::Literal(_) => {}
        Expression::CellRef { col, row } => {
            let pos = Position::from_label(col, *row);
            if pos.is_valid() && !out.contains(&pos) {
                out.push(pos);
            }
        }
        Expression::UnaryOp { operand, .. } => collect_refs(operand, out),
        Expression::BinaryOp { left, right, .. } => {
            collect_refs(left, out);
            collect_refs(right, out);
        }
    }
}

fn eval(
    expr: &Expression,
    resolve: &dyn Fn(Position) -> Result<f64, FormulaError>,
) -> Result<f64, FormulaError> {
    match expr {
        Expression::Literal(n) => Ok(*n),
        Expression::CellRef { col, row } => {
            let pos = Position::from_label(col, *row);
            if !pos.is_valid() {
                return Err(FormulaError::Ref);
            }
            resolve(pos)
        }
        Expression::UnaryOp { op, operand } => {
            let v = eval(operand, resolve)?;
            Ok(match op {
                UnaryOperator::Negate => -v,
                UnaryOperator::Identity => v,
            })
        }
        Expression::BinaryOp { left, op, right } => {
            let l = eval(left, resolve)?;
            let r = eval(right, resolve)?;
            let result = match op {
                BinaryOperator::Add => l + r,
                BinaryOperator::Subtract => l - r,
                BinaryOperator::Multiply => l * r,
                BinaryOperator::Divide => l / r,
            };
            if result.is_finite() {
                Ok(result)
            } else {
                Err(FormulaError::Arithmetic)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_resolver(_: Position) -> Result<f64, FormulaError> {
        Ok(0.0)
    }

    #[test]
    fn evaluates_arithmetic() {
        let formula = Formula::parse("1+2*3").unwrap();
        assert_eq!(formula.evaluate(&zero_resolver), Value::Number(7.0));
    }

    #[test]
    fn caches_after_first_evaluation() {
        let formula = Formula::parse("1+1").unwrap();
        assert_eq!(formula.evaluate(&zero_resolver), Value::Number(2.0));
        // A resolver that always errors would change the result if actually
        // invoked again — proves the second call hit the cache.
        let erroring = |_: Position| -> Result<f64, FormulaError> { Err(FormulaError::Ref) };
        assert_eq!(formula.evaluate(&erroring), Value::Number(2.0));
    }

    #[test]
    fn invalidate_forces_recompute() {
        let formula = Formula::parse("A1").unwrap();
        assert_eq!(formula.evaluate(&|_| Ok(5.0)), Value::Number(5.0));
        formula.invalidate();
        assert_eq!(formula.evaluate(&|_| Ok(9.0)), Value::Number(9.0));
    }

    #[test]
    fn division_by_zero_is_arithmetic_error() {
        let formula = Formula::parse("1/0").unwrap();
        assert_eq!(formula.evaluate(&zero_resolver), Value::Error(FormulaError::Arithmetic));
    }

    #[test]
    fn invalid_reference_is_ref_error() {
        let formula = Formula::parse("ZZZZZZ1").unwrap();
        assert_eq!(formula.evaluate(&zero_resolver), Value::Error(FormulaError::Ref));
    }

    #[test]
    fn referenced_cells_deduplicated_in_order() {
        let formula = Formula::parse("A1+A1+B2").unwrap();
        assert_eq!(
            formula.referenced_cells(),
            vec![Position::from_label("A", 1), Position::from_label("B", 2)]
        );
    }

    #[test]
    fn canonical_text_restores_leading_equals() {
        let formula = Formula::parse("1+2*3").unwrap();
        assert_eq!(formula.to_text(), "=1+2*3");
    }
}
