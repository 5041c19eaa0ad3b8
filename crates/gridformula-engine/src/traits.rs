//! Host capability trait and the engine-internal backend seam.
//!
//! `GridHost` is what an embedding application implements; every method has
//! a default, so "no host" is just `struct NoHost; impl GridHost for NoHost {}`.
//! `Backend` is the internal protocol the parser recursion speaks; the
//! evaluating engine and the dependency collector both implement it.

use gridformula_common::{CellRef, FormulaError, RangeRef, Reference, Value};

use crate::dispatch::Operand;

/// The grid position a formula is being evaluated at. Used to resolve
/// sheet-unqualified references and by `ROW()`/`COLUMN()` without arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPos {
    pub sheet: Option<String>,
    pub row: u32,
    pub col: u32,
}

impl CellPos {
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            sheet: None,
            row,
            col,
        }
    }

    pub fn on_sheet<S: Into<String>>(sheet: S, row: u32, col: u32) -> Self {
        Self {
            sheet: Some(sheet.into()),
            row,
            col,
        }
    }
}

/// Everything the engine needs from its embedding environment.
///
/// The engine holds no workbook state; cells, ranges and defined names are
/// resolved through this trait at evaluation time. Defaults model an empty
/// grid with no defined names.
pub trait GridHost {
    /// Value of a single cell. Empty cells are `Value::Blank`.
    fn cell(&self, cell: &CellRef) -> Result<Value, FormulaError> {
        let _ = cell;
        Ok(Value::Blank)
    }

    /// Values of a rectangular block, row-major. Must be rectangular with at
    /// least one row and one column; whole-row/column axes are the host's to
    /// clamp to its used region.
    fn range(&self, range: &RangeRef) -> Result<Vec<Vec<Value>>, FormulaError> {
        let _ = range;
        Ok(vec![vec![Value::Blank]])
    }

    /// Resolve a defined name to a reference, or `None` if unknown.
    fn variable(
        &self,
        name: &str,
        sheet: Option<&str>,
        position: Option<&CellPos>,
    ) -> Option<Reference> {
        let _ = (name, sheet, position);
        None
    }
}

/// A host with no cells and no names.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHost;

impl GridHost for NoHost {}

/// Internal seam between the parser recursion and whoever interprets
/// references: the evaluating engine, or the dependency collector that
/// records them and hands back stubs.
pub(crate) trait Backend {
    fn cell_value(&self, cell: &CellRef) -> Value;

    fn range_value(&self, range: &RangeRef) -> Value;

    fn variable_ref(
        &self,
        name: &str,
        sheet: Option<&str>,
        position: Option<&CellPos>,
    ) -> Operand;

    fn call_function(
        &self,
        name: &str,
        args: Vec<Operand>,
        position: Option<&CellPos>,
    ) -> Operand;
}
