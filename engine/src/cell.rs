//! FILENAME: core/engine/src/cell.rs
//! PURPOSE: Defines the fundamental data structures for a single spreadsheet cell.
//! CONTEXT: A cell's content is one of three variants (empty, raw text, or a
//! formula); only the formula variant carries a value cache. It is designed
//! to be lightweight since a sheet may hold many of these.

use crate::formula::{Formula, FormulaParseError};
use crate::position::Position;

/// Marks the first byte of a cell's raw input text as "treat literally, do
/// not parse as a formula" (used to store text that would otherwise be
/// mistaken for a formula, e.g. `'=1+1` stores the three characters `=1+1`).
pub const ESCAPE_SIGN: char = '\'';
/// Marks the first byte of a cell's raw input text as a formula.
pub const FORMULA_SIGN: char = '=';

/// Evaluation-time errors a formula can produce. Unlike `FormulaParseError`
/// or `CircularDependencyError`, this is not a `Result::Err` — it's a
/// legitimate `Value` that propagates through dependent formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaError {
    /// A referenced position is out of the grid's bounds.
    Ref,
    /// A referenced cell's text could not be coerced to a number.
    Value,
    /// An arithmetic operation produced a non-finite result.
    Arithmetic,
}

impl std::fmt::Display for FormulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            FormulaError::Ref => "#REF!",
            FormulaError::Value => "#VALUE!",
            FormulaError::Arithmetic => "#ARITHM!",
        };
        write!(f, "{}", tag)
    }
}

impl std::error::Error for FormulaError {}

/// The result of reading a cell: a string, a number, or an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Error(FormulaError),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Error(e) => write!(f, "{}", e),
        }
    }
}

/// A cell's content, independent of the dependency-graph edges the owning
/// sheet maintains for it. Modeled as a tagged enum rather than a trait
/// object hierarchy: the variant set is closed and small, and an enum lets
/// `Cell::value`/`text` stay a plain match with no dynamic dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Empty,
    Text(String),
    Formula(Formula),
}

impl CellContent {
    /// Determines the content a `set_cell(pos, text)` call would install,
    /// per the prefix rules: empty text -> Empty, a leading `=` with more
    /// than one character -> Formula, anything else -> Text. Does not touch
    /// any existing cell — the sheet decides whether to commit this after a
    /// cycle check.
    pub fn for_input(text: &str) -> Result<Self, FormulaParseError> {
        if text.is_empty() {
            Ok(CellContent::Empty)
        } else if text.starts_with(FORMULA_SIGN) && text.len() > 1 {
            let formula = Formula::parse(&text[1..])?;
            Ok(CellContent::Formula(formula))
        } else {
            Ok(CellContent::Text(text.to_string()))
        }
    }

    pub fn referenced_cells(&self) -> Vec<Position> {
        match self {
            CellContent::Formula(f) => f.referenced_cells(),
            _ => Vec::new(),
        }
    }
}

/// The atomic addressable unit of a sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    content: CellContent,
}

impl Cell {
    pub fn empty() -> Self {
        Cell {
            content: CellContent::Empty,
        }
    }

    pub fn with_content(content: CellContent) -> Self {
        Cell { content }
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    pub fn set_content(&mut self, content: CellContent) {
        self.content = content;
    }

    /// The positions this cell's formula (if any) references.
    pub fn referenced_cells(&self) -> Vec<Position> {
        self.content.referenced_cells()
    }

    /// Raw stored text: `""` for Empty, the literal string for Text
    /// (escape marker included), or `"="` + the canonical expression for
    /// Formula.
    pub fn text(&self) -> String {
        match &self.content {
            CellContent::Empty => String::new(),
            CellContent::Text(s) => s.clone(),
            CellContent::Formula(f) => f.to_text(),
        }
    }

    /// Evaluated value. `resolve` implements the sheet's coercion rules for
    /// turning a referenced cell into a number or propagated error; it is
    /// only consulted for the Formula variant.
    pub fn value(&self, resolve: &dyn Fn(Position) -> Result<f64, FormulaError>) -> Value {
        match &self.content {
            CellContent::Empty => Value::Text(String::new()),
            CellContent::Text(s) => match s.strip_prefix(ESCAPE_SIGN) {
                Some(stripped) => Value::Text(stripped.to_string()),
                None => Value::Text(s.clone()),
            },
            CellContent::Formula(f) => f.evaluate(resolve),
        }
    }

    /// Drops the formula cache, if any, so the next `value()` recomputes.
    pub fn invalidate(&self) {
        if let CellContent::Formula(f) = &self.content {
            f.invalidate();
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.content, CellContent::Empty)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_refs(_: Position) -> Result<f64, FormulaError> {
        panic!("resolver should not be called for non-formula content")
    }

    #[test]
    fn empty_input_is_empty_content() {
        let content = CellContent::for_input("").unwrap();
        assert_eq!(content, CellContent::Empty);
    }

    #[test]
    fn single_equals_is_text_not_formula() {
        let content = CellContent::for_input("=").unwrap();
        assert_eq!(content, CellContent::Text("=".to_string()));
    }

    #[test]
    fn leading_equals_with_body_is_formula() {
        let content = CellContent::for_input("=1+1").unwrap();
        assert!(matches!(content, CellContent::Formula(_)));
    }

    #[test]
    fn invalid_formula_body_is_rejected() {
        assert!(CellContent::for_input("=1+").is_err());
    }

    #[test]
    fn plain_text_round_trips() {
        let cell = Cell::with_content(CellContent::for_input("hello").unwrap());
        assert_eq!(cell.text(), "hello");
        assert_eq!(cell.value(&no_refs), Value::Text("hello".to_string()));
    }

    #[test]
    fn escaped_text_strips_leading_quote_in_value_only() {
        let cell = Cell::with_content(CellContent::for_input("'=1+2").unwrap());
        assert_eq!(cell.text(), "'=1+2");
        assert_eq!(cell.value(&no_refs), Value::Text("=1+2".to_string()));
    }

    #[test]
    fn empty_cell_value_and_text_are_empty_string() {
        let cell = Cell::empty();
        assert_eq!(cell.text(), "");
        assert_eq!(cell.value(&no_refs), Value::Text(String::new()));
    }

    #[test]
    fn formula_cell_evaluates_and_caches() {
        let cell = Cell::with_content(CellContent::for_input("=1+2").unwrap());
        assert_eq!(cell.value(&|_| Ok(0.0)), Value::Number(3.0));
        cell.invalidate();
        assert_eq!(cell.value(&|_| Ok(0.0)), Value::Number(3.0));
    }
}
