//! Lightweight in-memory grid for unit and integration tests, and for
//! downstream consumers that want a host without wiring one up.

use std::collections::HashMap;

use gridformula_common::{address, CellRef, FormulaError, RangeRef, Reference, Value};

use crate::traits::{CellPos, GridHost};

type CellKey = (String, u32, u32); // (sheet, row, col), 1-based

/// Builder-style host: `with_cell` / `with_cell_a1` / `with_range` /
/// `with_variable`. Sheet-unqualified references resolve to `Sheet1`.
#[derive(Default)]
pub struct TestGrid {
    cells: HashMap<CellKey, Value>,
    variables: HashMap<String, Reference>,
    default_sheet: Option<String>,
}

impl TestGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the sheet unqualified references resolve to (`Sheet1` unless
    /// set).
    pub fn with_default_sheet<S: Into<String>>(mut self, sheet: S) -> Self {
        self.default_sheet = Some(sheet.into());
        self
    }

    pub fn with_cell<S: Into<String>>(mut self, sheet: S, row: u32, col: u32, value: Value) -> Self {
        self.cells.insert((sheet.into(), row, col), value);
        self
    }

    pub fn with_cell_a1<S: Into<String>, A: AsRef<str>>(self, sheet: S, a1: A, value: Value) -> Self {
        let (row, col) = address::parse_cell(a1.as_ref()).expect("bad A1 ref in with_cell_a1");
        self.with_cell(sheet, row, col, value)
    }

    /// Fill a block row-major starting at `(row, col)`.
    pub fn with_range<S: Into<String>>(
        mut self,
        sheet: S,
        row: u32,
        col: u32,
        data: Vec<Vec<Value>>,
    ) -> Self {
        let sheet = sheet.into();
        for (dr, r) in data.into_iter().enumerate() {
            for (dc, value) in r.into_iter().enumerate() {
                self.cells
                    .insert((sheet.clone(), row + dr as u32, col + dc as u32), value);
            }
        }
        self
    }

    pub fn with_variable<S: Into<String>>(mut self, name: S, reference: Reference) -> Self {
        self.variables.insert(name.into(), reference);
        self
    }

    fn sheet_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or_else(|| self.default_sheet.as_deref().unwrap_or("Sheet1"))
    }

    /// Used-region bounds of a sheet: `(max_row, max_col)`.
    fn used_bounds(&self, sheet: &str) -> (u32, u32) {
        let mut max_row = 1;
        let mut max_col = 1;
        for (key, _) in self.cells.iter().filter(|((s, _, _), _)| s == sheet) {
            max_row = max_row.max(key.1);
            max_col = max_col.max(key.2);
        }
        (max_row, max_col)
    }
}

impl GridHost for TestGrid {
    fn cell(&self, cell: &CellRef) -> Result<Value, FormulaError> {
        let sheet = self.sheet_name(cell.sheet.as_deref());
        Ok(self
            .cells
            .get(&(sheet.to_string(), cell.row, cell.col))
            .cloned()
            .unwrap_or(Value::Blank))
    }

    /// Whole-row/column axes clamp to the sheet's used region, so `A:A`
    /// stays test-sized.
    fn range(&self, range: &RangeRef) -> Result<Vec<Vec<Value>>, FormulaError> {
        let sheet = self.sheet_name(range.sheet.as_deref()).to_string();
        let (used_row, used_col) = self.used_bounds(&sheet);

        let (r0, r1) = (
            range.start_row.unwrap_or(1),
            range.end_row.unwrap_or(used_row),
        );
        let (c0, c1) = (
            range.start_col.unwrap_or(1),
            range.end_col.unwrap_or(used_col),
        );
        let (r1, c1) = (r1.max(r0), c1.max(c0));

        let mut rows = Vec::with_capacity((r1 - r0 + 1) as usize);
        for r in r0..=r1 {
            let mut row = Vec::with_capacity((c1 - c0 + 1) as usize);
            for c in c0..=c1 {
                row.push(
                    self.cells
                        .get(&(sheet.clone(), r, c))
                        .cloned()
                        .unwrap_or(Value::Blank),
                );
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn variable(
        &self,
        name: &str,
        _sheet: Option<&str>,
        _position: Option<&CellPos>,
    ) -> Option<Reference> {
        self.variables.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_default_to_blank() {
        let grid = TestGrid::new().with_cell_a1("Sheet1", "B2", Value::Number(5.0));
        assert_eq!(grid.cell(&CellRef::new(2, 2)).unwrap(), Value::Number(5.0));
        assert_eq!(grid.cell(&CellRef::new(9, 9)).unwrap(), Value::Blank);
    }

    #[test]
    fn whole_column_clamps_to_used_region() {
        let grid = TestGrid::new()
            .with_cell_a1("Sheet1", "A1", Value::Number(1.0))
            .with_cell_a1("Sheet1", "A3", Value::Number(3.0));
        let rows = grid.range(&RangeRef::whole_columns(1, 1)).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], Value::Number(1.0));
        assert_eq!(rows[1][0], Value::Blank);
        assert_eq!(rows[2][0], Value::Number(3.0));
    }
}
