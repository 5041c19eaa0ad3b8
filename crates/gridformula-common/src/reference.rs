//! Cell, range and union references.
//!
//! Rows and columns are 1-based. A `RangeRef` axis set to `None` encodes a
//! whole-row or whole-column reference; it expands to `1..=MAX_ROW` /
//! `1..=MAX_COLUMN` when materialized. Constructors normalize ranges so
//! `start <= end` on every bounded axis.

use std::fmt;

use crate::{Value, MAX_COLUMN, MAX_ROW};

/// A single cell address, optionally sheet-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRef {
    pub sheet: Option<String>,
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            sheet: None,
            row,
            col,
        }
    }

    pub fn with_sheet<S: Into<String>>(mut self, sheet: S) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn in_bounds(&self) -> bool {
        (1..=MAX_ROW).contains(&self.row) && (1..=MAX_COLUMN).contains(&self.col)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet_prefix(f, self.sheet.as_deref())?;
        write!(f, "{}{}", crate::address::number_to_column(self.col), self.row)
    }
}

/// A rectangular block of cells, optionally sheet-qualified.
///
/// `start_col == None` means whole-row, `start_row == None` whole-column;
/// both unbounded is a full-sheet reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeRef {
    pub sheet: Option<String>,
    pub start_row: Option<u32>,
    pub start_col: Option<u32>,
    pub end_row: Option<u32>,
    pub end_col: Option<u32>,
}

impl RangeRef {
    /// Build a range, swapping corners so `start <= end` per bounded axis.
    pub fn new(
        start_row: Option<u32>,
        start_col: Option<u32>,
        end_row: Option<u32>,
        end_col: Option<u32>,
    ) -> Self {
        let (start_row, end_row) = normalize_axis(start_row, end_row);
        let (start_col, end_col) = normalize_axis(start_col, end_col);
        Self {
            sheet: None,
            start_row,
            start_col,
            end_row,
            end_col,
        }
    }

    pub fn cells(start: &CellRef, end: &CellRef) -> Self {
        let mut r = Self::new(
            Some(start.row),
            Some(start.col),
            Some(end.row),
            Some(end.col),
        );
        r.sheet = start.sheet.clone();
        r
    }

    pub fn whole_columns(from: u32, to: u32) -> Self {
        Self::new(None, Some(from), None, Some(to))
    }

    pub fn whole_rows(from: u32, to: u32) -> Self {
        Self::new(Some(from), None, Some(to), None)
    }

    pub fn with_sheet<S: Into<String>>(mut self, sheet: S) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Inclusive row span, whole-column axes expanded.
    pub fn row_span(&self) -> (u32, u32) {
        (
            self.start_row.unwrap_or(1),
            self.end_row.unwrap_or(MAX_ROW),
        )
    }

    /// Inclusive column span, whole-row axes expanded.
    pub fn col_span(&self) -> (u32, u32) {
        (
            self.start_col.unwrap_or(1),
            self.end_col.unwrap_or(MAX_COLUMN),
        )
    }

    pub fn rows(&self) -> u32 {
        let (a, b) = self.row_span();
        b - a + 1
    }

    pub fn cols(&self) -> u32 {
        let (a, b) = self.col_span();
        b - a + 1
    }

    pub fn is_single_cell(&self) -> bool {
        self.rows() == 1 && self.cols() == 1
    }

    pub fn top_left(&self) -> CellRef {
        CellRef {
            sheet: self.sheet.clone(),
            row: self.row_span().0,
            col: self.col_span().0,
        }
    }

    pub fn contains(&self, cell: &CellRef) -> bool {
        if self.sheet != cell.sheet {
            return false;
        }
        let (r0, r1) = self.row_span();
        let (c0, c1) = self.col_span();
        (r0..=r1).contains(&cell.row) && (c0..=c1).contains(&cell.col)
    }
}

fn normalize_axis(a: Option<u32>, b: Option<u32>) -> (Option<u32>, Option<u32>) {
    match (a, b) {
        (Some(x), Some(y)) if x > y => (Some(y), Some(x)),
        other => other,
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet_prefix(f, self.sheet.as_deref())?;
        write_corner(f, self.start_row, self.start_col)?;
        f.write_str(":")?;
        write_corner(f, self.end_row, self.end_col)
    }
}

fn write_corner(f: &mut fmt::Formatter<'_>, row: Option<u32>, col: Option<u32>) -> fmt::Result {
    if let Some(c) = col {
        f.write_str(&crate::address::number_to_column(c))?;
    }
    if let Some(r) = row {
        write!(f, "{r}")?;
    }
    Ok(())
}

/// Quote sheet names that need it (`'My Sheet'!A1`).
fn write_sheet_prefix(f: &mut fmt::Formatter<'_>, sheet: Option<&str>) -> fmt::Result {
    if let Some(name) = sheet {
        if name.contains(' ') || name.contains('\'') || name.contains('!') {
            write!(f, "'{}'!", name.replace('\'', "''"))?;
        } else {
            write!(f, "{name}!")?;
        }
    }
    Ok(())
}

/// Either shape a formula reference can take.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reference {
    Cell(CellRef),
    Range(RangeRef),
}

impl Reference {
    pub fn sheet(&self) -> Option<&str> {
        match self {
            Reference::Cell(c) => c.sheet.as_deref(),
            Reference::Range(r) => r.sheet.as_deref(),
        }
    }

    pub fn set_sheet(&mut self, sheet: Option<String>) {
        match self {
            Reference::Cell(c) => c.sheet = sheet,
            Reference::Range(r) => r.sheet = sheet,
        }
    }

    /// Fill in the sheet when the reference is unqualified.
    pub fn with_default_sheet(mut self, sheet: Option<&str>) -> Self {
        if self.sheet().is_none() {
            if let Some(s) = sheet {
                self.set_sheet(Some(s.to_string()));
            }
        }
        self
    }

    /// Inclusive `(rows, cols)` spans of the referenced block.
    pub fn spans(&self) -> ((u32, u32), (u32, u32)) {
        match self {
            Reference::Cell(c) => ((c.row, c.row), (c.col, c.col)),
            Reference::Range(r) => (r.row_span(), r.col_span()),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Cell(c) => write!(f, "{c}"),
            Reference::Range(r) => write!(f, "{r}"),
        }
    }
}

/// An ordered union of references, produced by the comma operator inside
/// parentheses. Holds the value retrieved for each reference at build time,
/// in source order. Always contains at least two entries; single-element
/// unions collapse to their sole expression upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    items: Vec<(Value, Reference)>,
}

impl Collection {
    pub fn new(items: Vec<(Value, Reference)>) -> Self {
        debug_assert!(items.len() >= 2, "unions hold at least two references");
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Reference)> {
        self.items.iter()
    }

    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.items.iter().map(|(_, r)| r)
    }
}
