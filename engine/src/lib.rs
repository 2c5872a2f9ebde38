//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the spreadsheet engine.
//! CONTEXT: Re-exports public types and modules for use by other crates.

pub mod cell;
pub mod dependency_graph;
pub mod formula;
pub mod position;
pub mod sheet;

// Re-export commonly used types at the crate root
pub use cell::{Cell, CellContent, FormulaError, Value, ESCAPE_SIGN, FORMULA_SIGN};
pub use dependency_graph::{CircularDependencyError, DependencyGraph};
pub use formula::{Formula, FormulaParseError};
pub use position::{col_to_index, index_to_col, Position, Size, MAX_COLS, MAX_ROWS};
pub use sheet::{InvalidPositionError, SetCellError, Sheet};
