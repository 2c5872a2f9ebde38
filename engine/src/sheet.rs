//! FILENAME: core/engine/src/sheet.rs
//! PURPOSE: Owns all live cells and the dependency graph between them;
//! the single entry point external code mutates and reads a spreadsheet
//! through.
//! CONTEXT: Every mutation follows build-then-commit: the candidate content
//! is fully constructed and cycle-checked before any existing state is
//! touched, so a failed `set_cell` leaves the sheet byte-for-byte unchanged.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::cell::{Cell, CellContent, FormulaError, Value};
use crate::dependency_graph::{CircularDependencyError, DependencyGraph};
use crate::formula::FormulaParseError;
use crate::position::{Position, Size};

/// A `Position` outside the grid's bounds was passed to a `Sheet` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPositionError(pub Position);

impl std::fmt::Display for InvalidPositionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position out of bounds: ({}, {})", self.0.row, self.0.col)
    }
}

impl std::error::Error for InvalidPositionError {}

/// Everything that can go wrong committing a `set_cell` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SetCellError {
    InvalidPosition(InvalidPositionError),
    Parse(FormulaParseError),
    Circular(CircularDependencyError),
}

impl std::fmt::Display for SetCellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetCellError::InvalidPosition(e) => write!(f, "{}", e),
            SetCellError::Parse(e) => write!(f, "{}", e),
            SetCellError::Circular(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SetCellError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetCellError::InvalidPosition(e) => Some(e),
            SetCellError::Parse(e) => Some(e),
            SetCellError::Circular(e) => Some(e),
        }
    }
}

/// The in-memory spreadsheet: a sparse map of live cells plus the
/// dependency graph tying them together. Not `Sync` — see the crate's
/// concurrency notes; callers must serialize access themselves.
#[derive(Debug, Default)]
pub struct Sheet {
    cells: HashMap<Position, Cell>,
    graph: DependencyGraph,
}

impl Sheet {
    pub fn new() -> Self {
        Sheet {
            cells: HashMap::new(),
            graph: DependencyGraph::new(),
        }
    }

    /// Sets the content of the cell at `pos` from raw input text.
    ///
    /// On success, any cell referenced by the new formula (and previously
    /// absent) is materialized as an Empty cell so the reverse edge has
    /// somewhere to live. On failure (invalid position, parse error, or a
    /// cycle), the cell at `pos` is left exactly as it was.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SetCellError> {
        if !pos.is_valid() {
            return Err(SetCellError::InvalidPosition(InvalidPositionError(pos)));
        }

        let content = CellContent::for_input(text).map_err(SetCellError::Parse)?;
        let new_precedents: std::collections::HashSet<Position> =
            content.referenced_cells().into_iter().collect();

        if let Some(cycle_path) = self.graph.find_cycle(pos, &new_precedents) {
            return Err(SetCellError::Circular(CircularDependencyError { cycle_path }));
        }

        self.graph.set_dependencies(pos, new_precedents.clone());
        for prec in &new_precedents {
            self.cells.entry(*prec).or_insert_with(Cell::empty);
        }
        self.cells.entry(pos).or_insert_with(Cell::empty).set_content(content);

        self.invalidate_transitive(pos);
        Ok(())
    }

    /// Looks up the cell at `pos`, if present.
    pub fn get_cell(&self, pos: Position) -> Result<Option<&Cell>, InvalidPositionError> {
        if !pos.is_valid() {
            return Err(InvalidPositionError(pos));
        }
        Ok(self.cells.get(&pos))
    }

    /// The evaluated value of the cell at `pos` (empty string for an absent
    /// or Empty cell).
    pub fn value_at(&self, pos: Position) -> Result<Value, InvalidPositionError> {
        if !pos.is_valid() {
            return Err(InvalidPositionError(pos));
        }
        Ok(match self.cells.get(&pos) {
            Some(cell) => cell.value(&|p| self.resolve_number(p)),
            None => Value::Text(String::new()),
        })
    }

    /// Resets the cell at `pos` to Empty. If nothing depends on it after
    /// that, it is dropped from storage entirely; otherwise it is kept
    /// (Empty but present) so incoming references stay valid.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), InvalidPositionError> {
        if !pos.is_valid() {
            return Err(InvalidPositionError(pos));
        }

        if self.cells.contains_key(&pos) {
            self.graph.clear_dependencies(pos);
            self.invalidate_transitive(pos);

            if self.graph.is_referenced(pos) {
                self.cells.get_mut(&pos).unwrap().set_content(CellContent::Empty);
            } else {
                self.cells.remove(&pos);
            }
        }

        Ok(())
    }

    /// The minimal bounding box containing every cell with non-empty text.
    pub fn printable_size(&self) -> Size {
        let mut rows = 0;
        let mut cols = 0;
        for (pos, cell) in &self.cells {
            if cell.text().is_empty() {
                continue;
            }
            rows = rows.max(pos.row + 1);
            cols = cols.max(pos.col + 1);
        }
        Size { rows, cols }
    }

    /// Writes the evaluated values of every cell in the printable bounding
    /// box, tab-separated within a row and newline-terminated per row.
    pub fn print_values(&self, out: &mut impl Write) -> io::Result<()> {
        self.print_grid(out, |cell, resolve| cell.value(resolve).to_string())
    }

    /// Writes the raw stored text of every cell in the printable bounding
    /// box, tab-separated within a row and newline-terminated per row.
    pub fn print_texts(&self, out: &mut impl Write) -> io::Result<()> {
        self.print_grid(out, |cell, _| cell.text())
    }

    fn print_grid(
        &self,
        out: &mut impl Write,
        render: impl Fn(&Cell, &dyn Fn(Position) -> Result<f64, FormulaError>) -> String,
    ) -> io::Result<()> {
        let size = self.printable_size();
        let resolve = |p: Position| self.resolve_number(p);

        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    write!(out, "\t")?;
                }
                if let Some(cell) = self.cells.get(&Position::new(row, col)) {
                    write!(out, "{}", render(cell, &resolve))?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// The coercion rules a formula's resolver uses to turn a referenced
    /// cell into a number: missing/Empty -> 0, a number stays a number, an
    /// empty string -> 0, a non-empty non-numeric string -> `Value` error,
    /// and an error cell propagates its own error unchanged.
    fn resolve_number(&self, pos: Position) -> Result<f64, FormulaError> {
        match self.cells.get(&pos) {
            None => Ok(0.0),
            Some(cell) => match cell.value(&|p| self.resolve_number(p)) {
                Value::Number(n) => Ok(n),
                Value::Error(e) => Err(e),
                Value::Text(s) if s.is_empty() => Ok(0.0),
                Value::Text(s) => s.parse::<f64>().map_err(|_| FormulaError::Value),
            },
        }
    }

    /// Clears the formula cache of every transitive dependent of `changed`,
    /// pruning the walk at any cell whose cache is already invalid — its
    /// own dependents must already be invalid by the same argument.
    fn invalidate_transitive(&self, changed: Position) {
        for dependent in self.graph.transitive_dependents(changed) {
            if let Some(cell) = self.cells.get(&dependent) {
                cell.invalidate();
            }
        }
    }
}
