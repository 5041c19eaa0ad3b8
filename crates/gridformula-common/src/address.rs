//! A1 address helpers: column letters <-> numbers, cell parsing/rendering,
//! and full reference parsing for `INDIRECT`-style lookups.
//!
//! Column names use base-26 with `A = 1`, so `AA = 27` and `XFD = 16384`.

use once_cell::sync::Lazy;

use crate::{CellRef, ErrorKind, FormulaError, RangeRef, Reference, MAX_COLUMN, MAX_ROW};

// Precomputed names for the common columns (A-ZZ = 702).
static COLUMN_LOOKUP: Lazy<Vec<String>> = Lazy::new(|| {
    let mut cols = Vec::with_capacity(702);
    for c in b'A'..=b'Z' {
        cols.push(String::from(c as char));
    }
    for c1 in b'A'..=b'Z' {
        for c2 in b'A'..=b'Z' {
            cols.push(format!("{}{}", c1 as char, c2 as char));
        }
    }
    cols
});

/// Convert a column name (`A`, `bc`, `XFD`) to its 1-based number.
pub fn column_to_number(column: &str) -> Result<u32, FormulaError> {
    let bytes = column.as_bytes();
    if bytes.is_empty() || bytes.len() > 3 {
        return Err(invalid(column));
    }
    let mut result = 0u32;
    for &b in bytes {
        if !b.is_ascii_alphabetic() {
            return Err(invalid(column));
        }
        result = result * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1);
    }
    Ok(result)
}

fn invalid(what: &str) -> FormulaError {
    FormulaError::new(ErrorKind::Name).with_details(format!("Invalid column '{what}'"))
}

/// Convert a 1-based column number to its name (`1 -> A`, `27 -> AA`).
pub fn number_to_column(mut num: u32) -> String {
    if num > 0 && num <= 702 {
        return COLUMN_LOOKUP[(num - 1) as usize].clone();
    }
    let mut result = String::with_capacity(3);
    while num > 0 {
        num -= 1;
        result.insert(0, ((num % 26) as u8 + b'A') as char);
        num /= 26;
    }
    result
}

/// Parse a cell address like `A1` or `$AB$12` into `(row, col)`.
/// `$` anchors are accepted and ignored.
pub fn parse_cell(text: &str) -> Result<(u32, u32), FormulaError> {
    let bytes = text.as_bytes();
    let mut i = 0;

    if i < bytes.len() && bytes[i] == b'$' {
        i += 1;
    }
    let col_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == col_start {
        return Err(invalid_cell(text));
    }
    let col = column_to_number(&text[col_start..i])?;

    if i < bytes.len() && bytes[i] == b'$' {
        i += 1;
    }
    let row_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == row_start || i != bytes.len() || bytes[row_start] == b'0' {
        return Err(invalid_cell(text));
    }
    let row: u32 = text[row_start..i]
        .parse()
        .map_err(|_| invalid_cell(text))?;

    if row > MAX_ROW || col > MAX_COLUMN {
        return Err(invalid_cell(text));
    }
    Ok((row, col))
}

fn invalid_cell(text: &str) -> FormulaError {
    FormulaError::new(ErrorKind::Name).with_details(format!("Invalid cell address '{text}'"))
}

/// Render `(row, col)` in canonical form: uppercase letters, no `$`.
pub fn render_cell(row: u32, col: u32) -> String {
    format!("{}{row}", number_to_column(col))
}

/// Parse a textual reference for `INDIRECT`: an optionally sheet-qualified
/// cell (`A1`, `'My Sheet'!B2`), range (`A1:B3`), whole column (`A:A`) or
/// whole row (`1:3`).
pub fn parse_reference(text: &str) -> Result<Reference, FormulaError> {
    let (sheet, body) = split_sheet(text.trim());
    let mut parts = body.splitn(2, ':');
    let first = parts.next().unwrap_or("");
    match parts.next() {
        None => {
            let (row, col) = parse_cell(first)?;
            let mut cell = CellRef::new(row, col);
            cell.sheet = sheet;
            Ok(Reference::Cell(cell))
        }
        Some(second) => {
            let (sr, sc) = parse_range_part(first)?;
            let (er, ec) = parse_range_part(second)?;
            let mut range = RangeRef::new(sr, sc, er, ec);
            range.sheet = sheet;
            Ok(Reference::Range(range))
        }
    }
}

/// One side of a `:` range: a cell, a bare column name, or a bare row number.
fn parse_range_part(part: &str) -> Result<(Option<u32>, Option<u32>), FormulaError> {
    if let Ok((row, col)) = parse_cell(part) {
        return Ok((Some(row), Some(col)));
    }
    let stripped = part.strip_prefix('$').unwrap_or(part);
    if !stripped.is_empty() && stripped.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Ok((None, Some(column_to_number(stripped)?)));
    }
    if !stripped.is_empty() && stripped.bytes().all(|b| b.is_ascii_digit()) {
        let row: u32 = stripped.parse().map_err(|_| invalid_cell(part))?;
        if (1..=MAX_ROW).contains(&row) {
            return Ok((Some(row), None));
        }
    }
    Err(invalid_cell(part))
}

/// Split an optional `Sheet!` / `'Quoted sheet'!` prefix off a reference.
fn split_sheet(text: &str) -> (Option<String>, &str) {
    if let Some(rest) = text.strip_prefix('\'') {
        // Quoted sheet name; '' is an escaped quote.
        let bytes = rest.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                    i += 2;
                    continue;
                }
                if i + 1 < bytes.len() && bytes[i + 1] == b'!' {
                    let sheet = rest[..i].replace("''", "'");
                    return (Some(sheet), &rest[i + 2..]);
                }
                break;
            }
            i += 1;
        }
        return (None, text);
    }
    match text.find('!') {
        Some(pos) if pos > 0 => (Some(text[..pos].to_string()), &text[pos + 1..]),
        _ => (None, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_are_base_26_from_one() {
        assert_eq!(column_to_number("A").unwrap(), 1);
        assert_eq!(column_to_number("Z").unwrap(), 26);
        assert_eq!(column_to_number("AA").unwrap(), 27);
        assert_eq!(column_to_number("AZ").unwrap(), 52);
        assert_eq!(column_to_number("BA").unwrap(), 53);
        assert_eq!(column_to_number("XFD").unwrap(), 16_384);
        assert!(column_to_number("ABCD").is_err());
        assert!(column_to_number("A1").is_err());
    }

    #[test]
    fn number_to_column_round_trips() {
        for n in [1, 26, 27, 52, 53, 702, 703, MAX_COLUMN] {
            assert_eq!(column_to_number(&number_to_column(n)).unwrap(), n);
        }
    }

    #[test]
    fn parse_cell_accepts_anchors() {
        assert_eq!(parse_cell("A1").unwrap(), (1, 1));
        assert_eq!(parse_cell("Z1").unwrap(), (1, 26));
        assert_eq!(parse_cell("AA1").unwrap(), (1, 27));
        assert_eq!(parse_cell("$B$2").unwrap(), (2, 2));
        assert_eq!(parse_cell("XFD1048576").unwrap(), (MAX_ROW, MAX_COLUMN));
        assert!(parse_cell("A0").is_err());
        assert!(parse_cell("A1048577").is_err());
        assert!(parse_cell("1A").is_err());
    }

    #[test]
    fn render_parse_is_identity_on_canonical_form() {
        for (row, col) in [(1, 1), (2, 28), (MAX_ROW, MAX_COLUMN)] {
            let rendered = render_cell(row, col);
            assert_eq!(parse_cell(&rendered).unwrap(), (row, col));
        }
    }

    #[test]
    fn parse_reference_handles_sheets_and_axes() {
        assert_eq!(
            parse_reference("B2").unwrap(),
            Reference::Cell(CellRef::new(2, 2))
        );
        assert_eq!(
            parse_reference("Sheet2!A1").unwrap(),
            Reference::Cell(CellRef::new(1, 1).with_sheet("Sheet2"))
        );
        assert_eq!(
            parse_reference("'My Sheet'!A1:B2").unwrap(),
            Reference::Range(
                RangeRef::new(Some(1), Some(1), Some(2), Some(2)).with_sheet("My Sheet")
            )
        );
        assert_eq!(
            parse_reference("A:C").unwrap(),
            Reference::Range(RangeRef::whole_columns(1, 3))
        );
        assert_eq!(
            parse_reference("2:4").unwrap(),
            Reference::Range(RangeRef::whole_rows(2, 4))
        );
        assert!(parse_reference("not a ref").is_err());
    }
}
