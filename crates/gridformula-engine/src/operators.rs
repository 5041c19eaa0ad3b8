//! Operator algebra: prefix sign, postfix percent, the infix family, and
//! the two reference combinators (`:` range and whitespace intersection).
//!
//! Every function here returns error *values*, never `Err`: an operator
//! failure is formula data, and the parser keeps consuming tokens.

use gridformula_common::{CellRef, FormulaError, RangeRef, Reference, Value, MAX_ROW};

use crate::dispatch::{extract_ref_value, sanitize_number, Operand};
use crate::traits::{Backend, CellPos};

/// Numeric coercion used by the infix operators.
///
/// Numbers pass through; booleans map to 1/0 unless disabled; decimal
/// strings parse (empty text refuses); blanks are zero; arrays read their
/// top-left element when flagged as arrays, and must be 1x1 otherwise.
pub(crate) fn accept_number(
    value: &Value,
    is_array: bool,
    allow_boolean: bool,
) -> Result<f64, FormulaError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Bool(b) if allow_boolean => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Bool(_) => Err(FormulaError::VALUE.with_details("Boolean not allowed here")),
        Value::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(FormulaError::VALUE.with_details("Cannot convert '' to number"));
            }
            trimmed.parse::<f64>().map_err(|_| {
                FormulaError::VALUE.with_details(format!("Cannot convert '{s}' to number"))
            })
        }
        Value::Blank => Ok(0.0),
        Value::Array(rows) => {
            if !is_array && (rows.len() != 1 || rows[0].len() != 1) {
                return Err(FormulaError::VALUE.with_details("Expected a single value"));
            }
            accept_number(value.first(), false, allow_boolean)
        }
        Value::Error(e) => Err(e.clone()),
    }
}

/// Fold of a prefix `+`/`-` run. With any `-` the operand coerces
/// numerically and the sign parity applies; a bare `+` run leaves the
/// operand untouched (references included).
pub(crate) fn unary(
    operand: Operand,
    negate: bool,
    backend: &dyn Backend,
    position: Option<&CellPos>,
) -> Operand {
    if !negate {
        return operand;
    }
    let (value, is_array) = extract_ref_value(backend, &operand, position);
    if let Value::Error(e) = value {
        return Operand::error(e);
    }
    match accept_number(&value, is_array, true) {
        Ok(n) => Operand::Value(sanitize_number(-n)),
        Err(e) => Operand::error(e),
    }
}

/// Postfix `%`: numeric coercion then division by 100.
pub(crate) fn percent(
    operand: Operand,
    backend: &dyn Backend,
    position: Option<&CellPos>,
) -> Operand {
    let (value, is_array) = extract_ref_value(backend, &operand, position);
    if let Value::Error(e) = value {
        return Operand::error(e);
    }
    match accept_number(&value, is_array, true) {
        Ok(n) => Operand::Value(sanitize_number(n / 100.0)),
        Err(e) => Operand::error(e),
    }
}

/// All infix operators. Both operands are resolved first (so the dependency
/// collector sees every reference), then the left operand's error wins, then
/// the right's.
pub(crate) fn infix(
    op: &str,
    left: Operand,
    right: Operand,
    backend: &dyn Backend,
    position: Option<&CellPos>,
) -> Operand {
    let (lv, la) = extract_ref_value(backend, &left, position);
    let (rv, ra) = extract_ref_value(backend, &right, position);
    if let Value::Error(e) = lv {
        return Operand::error(e);
    }
    if let Value::Error(e) = rv {
        return Operand::error(e);
    }
    let result = match op {
        "+" | "-" | "*" | "/" | "^" => math(op, &lv, la, &rv, ra),
        "&" => concat(&lv, la, &rv, ra),
        "=" | "<>" | "<" | "<=" | ">" | ">=" => compare(op, &lv, la, &rv, ra),
        _ => Value::Error(FormulaError::VALUE.with_details(format!("Unknown operator '{op}'"))),
    };
    Operand::Value(result)
}

fn math(op: &str, lv: &Value, la: bool, rv: &Value, ra: bool) -> Value {
    let a = match accept_number(lv, la, true) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let b = match accept_number(rv, ra, true) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    if op == "/" && b == 0.0 {
        return Value::Error(FormulaError::DIV0);
    }
    let n = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => a / b,
        "^" => a.powf(b),
        _ => unreachable!("math dispatch covers all arms"),
    };
    sanitize_number(n)
}

fn concat(lv: &Value, la: bool, rv: &Value, ra: bool) -> Value {
    let l = stringify(lv, la);
    let r = stringify(rv, ra);
    match (l, r) {
        (Ok(a), Ok(b)) => Value::Text(format!("{a}{b}")),
        (Err(e), _) | (_, Err(e)) => Value::Error(e),
    }
}

fn stringify(v: &Value, is_array: bool) -> Result<String, FormulaError> {
    let v = if is_array || matches!(v, Value::Array(_)) {
        v.first()
    } else {
        v
    };
    match v {
        Value::Blank => Ok(String::new()),
        Value::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Text(s) => Ok(s.clone()),
        Value::Error(e) => Err(e.clone()),
        Value::Array(_) => Err(FormulaError::VALUE),
    }
}

/// Comparison over the Excel type lattice.
///
/// Blanks compare as zero; arrays compare by their top-left element. Same
/// type compares values; across types the ordering is
/// `bool > text > number`, with cross-type `=` always false and `<>` always
/// true.
fn compare(op: &str, lv: &Value, la: bool, rv: &Value, ra: bool) -> Value {
    let l = comparable(lv, la);
    let r = comparable(rv, ra);

    let ordering = match (&l, &r) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => {
            // Cross-type: rank by kind only.
            let rank = |v: &Value| match v {
                Value::Bool(_) => 3u8,
                Value::Text(_) => 2,
                _ => 1,
            };
            return Value::Bool(match op {
                "=" => false,
                "<>" => true,
                "<" => rank(&l) < rank(&r),
                "<=" => rank(&l) <= rank(&r),
                ">" => rank(&l) > rank(&r),
                ">=" => rank(&l) >= rank(&r),
                _ => unreachable!("comparison dispatch covers all arms"),
            });
        }
    };

    let Some(ord) = ordering else {
        return Value::Error(FormulaError::VALUE);
    };
    Value::Bool(match op {
        "=" => ord.is_eq(),
        "<>" => !ord.is_eq(),
        "<" => ord.is_lt(),
        "<=" => ord.is_le(),
        ">" => ord.is_gt(),
        ">=" => ord.is_ge(),
        _ => unreachable!("comparison dispatch covers all arms"),
    })
}

fn comparable(v: &Value, is_array: bool) -> Value {
    let v = if is_array || matches!(v, Value::Array(_)) {
        v.first().clone()
    } else {
        v.clone()
    };
    match v {
        Value::Blank => Value::Number(0.0),
        other => other,
    }
}

/* ───────────────────── reference combinators ───────────────────── */

/// The `:` operator: the smallest range covering every operand.
///
/// Bare numbers promote to whole-row references and bare columns arrive as
/// whole-column ranges, so `1:3`, `A:C` and `A1:B2:C3` all land here.
pub(crate) fn range_of(operands: Vec<Operand>) -> Operand {
    // Axis spans; None = unbounded (covers the full axis).
    let mut rows: Option<(u32, u32)> = None;
    let mut cols: Option<(u32, u32)> = None;
    let mut sheet: Option<String> = None;
    let mut seeded = false;

    for op in operands {
        let (r, c, s) = match op {
            Operand::Ref(Reference::Cell(cell)) => (
                Some((cell.row, cell.row)),
                Some((cell.col, cell.col)),
                cell.sheet,
            ),
            Operand::Ref(Reference::Range(range)) => {
                let r = range.start_row.map(|_| range.row_span());
                let c = range.start_col.map(|_| range.col_span());
                (r, c, range.sheet)
            }
            Operand::Value(Value::Number(n)) => {
                // A bare number names a whole row.
                if n.fract() != 0.0 || n < 1.0 || n > MAX_ROW as f64 {
                    return Operand::error(
                        FormulaError::VALUE.with_details(format!("Invalid row number {n}")),
                    );
                }
                let row = n as u32;
                (Some((row, row)), None, None)
            }
            Operand::Value(Value::Error(e)) => return Operand::error(e),
            _ => {
                return Operand::error(
                    FormulaError::VALUE.with_details("Range operands must be references"),
                );
            }
        };
        if sheet.is_none() {
            sheet = s;
        }
        if !seeded {
            rows = r;
            cols = c;
            seeded = true;
        } else {
            rows = merge_axis(rows, r);
            cols = merge_axis(cols, c);
        }
    }

    let mut range = RangeRef::new(
        rows.map(|(a, _)| a),
        cols.map(|(a, _)| a),
        rows.map(|(_, b)| b),
        cols.map(|(_, b)| b),
    );
    range.sheet = sheet;
    Operand::Ref(Reference::Range(range))
}

/// Covering union of two axis spans; unbounded swallows bounded.
fn merge_axis(a: Option<(u32, u32)>, b: Option<(u32, u32)>) -> Option<(u32, u32)> {
    match (a, b) {
        (Some((a0, a1)), Some((b0, b1))) => Some((a0.min(b0), a1.max(b1))),
        _ => None,
    }
}

/// `(rows, cols)` structural openness of a reference: whether the axis is a
/// whole-row/whole-column hole rather than an explicit span. Cells are
/// always bounded.
fn unbounded_axes(reference: &Reference) -> (bool, bool) {
    match reference {
        Reference::Cell(_) => (false, false),
        Reference::Range(r) => (
            r.start_row.is_none() && r.end_row.is_none(),
            r.start_col.is_none() && r.end_col.is_none(),
        ),
    }
}

/// The whitespace intersection operator: shrink a bounding box across the
/// operand list.
///
/// Disjoint operands or differing sheets give `#NULL!`; an axis on which
/// *every* operand is structurally unbounded (whole rows crossed with whole
/// rows, or whole columns with whole columns) cannot be represented and
/// gives `#ERROR!`. A 1x1 result collapses to a cell reference.
pub(crate) fn intersect(operands: Vec<Operand>) -> Operand {
    let mut refs = Vec::with_capacity(operands.len());
    for op in operands {
        match op {
            Operand::Ref(r) => refs.push(r),
            Operand::Value(Value::Error(e)) => return Operand::error(e),
            _ => {
                return Operand::error(
                    FormulaError::VALUE.with_details("Intersection operands must be references"),
                );
            }
        }
    }

    let sheet = refs[0].sheet().map(str::to_string);
    let ((mut r0, mut r1), (mut c0, mut c1)) = refs[0].spans();
    let (mut rows_unbounded, mut cols_unbounded) = unbounded_axes(&refs[0]);
    for r in &refs[1..] {
        if r.sheet() != sheet.as_deref() {
            return Operand::error(FormulaError::NULL);
        }
        let ((sr, er), (sc, ec)) = r.spans();
        r0 = r0.max(sr);
        r1 = r1.min(er);
        c0 = c0.max(sc);
        c1 = c1.min(ec);
        if r0 > r1 || c0 > c1 {
            return Operand::error(FormulaError::NULL);
        }
        let (ru, cu) = unbounded_axes(r);
        rows_unbounded &= ru;
        cols_unbounded &= cu;
    }

    // An explicit A1:XFD1 is bounded even though it spans the sheet; only
    // structurally open axes on every operand are unrepresentable.
    if rows_unbounded || cols_unbounded {
        return Operand::error(
            FormulaError::ERROR.with_details("Cannot intersect whole rows with whole rows"),
        );
    }

    if r0 == r1 && c0 == c1 {
        let mut cell = CellRef::new(r0, c0);
        cell.sheet = sheet;
        return Operand::Ref(Reference::Cell(cell));
    }
    let mut range = RangeRef::new(Some(r0), Some(c0), Some(r1), Some(c1));
    range.sheet = sheet;
    Operand::Ref(Reference::Range(range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NoHost;
    use crate::FormulaEngine;
    use gridformula_common::ErrorKind;

    fn eng() -> FormulaEngine {
        FormulaEngine::new(NoHost)
    }

    #[test]
    fn accept_number_matrix() {
        assert_eq!(accept_number(&Value::Number(2.5), false, true).unwrap(), 2.5);
        assert_eq!(accept_number(&Value::Bool(true), false, true).unwrap(), 1.0);
        assert!(accept_number(&Value::Bool(true), false, false).is_err());
        assert_eq!(
            accept_number(&Value::Text(" 3.5 ".into()), false, true).unwrap(),
            3.5
        );
        assert!(accept_number(&Value::Text("".into()), false, true).is_err());
        assert_eq!(accept_number(&Value::Blank, false, true).unwrap(), 0.0);

        let arr = Value::Array(vec![vec![Value::Number(7.0), Value::Number(8.0)]]);
        assert_eq!(accept_number(&arr, true, true).unwrap(), 7.0);
        assert!(accept_number(&arr, false, true).is_err());
    }

    #[test]
    fn math_basics() {
        let e = eng();
        let r = infix(
            "+",
            Value::Number(2.0).into(),
            Value::Number(3.0).into(),
            &e,
            None,
        );
        assert_eq!(r, Operand::Value(Value::Number(5.0)));

        let r = infix(
            "/",
            Value::Number(1.0).into(),
            Value::Number(0.0).into(),
            &e,
            None,
        );
        assert_eq!(r, Operand::error(FormulaError::DIV0));
    }

    #[test]
    fn left_error_wins() {
        let e = eng();
        let r = infix(
            "+",
            Operand::error(FormulaError::NA),
            Operand::error(FormulaError::REF),
            &e,
            None,
        );
        assert_eq!(r, Operand::error(FormulaError::NA));
        let r = infix(
            "+",
            Value::Number(1.0).into(),
            Operand::error(FormulaError::REF),
            &e,
            None,
        );
        assert_eq!(r, Operand::error(FormulaError::REF));
    }

    #[test]
    fn cross_type_comparison() {
        let e = eng();
        let cases = [
            ("=", Value::Number(1.0), Value::Text("1".into()), false),
            ("<>", Value::Number(1.0), Value::Text("1".into()), true),
            (">", Value::Bool(false), Value::Text("zzz".into()), true),
            ("<", Value::Number(9.0), Value::Text("a".into()), true),
        ];
        for (op, l, r, expected) in cases {
            let out = infix(op, l.clone().into(), r.clone().into(), &e, None);
            assert_eq!(
                out,
                Operand::Value(Value::Bool(expected)),
                "{l:?} {op} {r:?}"
            );
        }
    }

    #[test]
    fn concat_serializes_booleans() {
        let e = eng();
        let r = infix(
            "&",
            Value::Text("abc".into()).into(),
            Value::Bool(true).into(),
            &e,
            None,
        );
        assert_eq!(r, Operand::Value(Value::Text("abcTRUE".into())));

        let r = infix("&", Value::Blank.into(), Value::Number(15.0).into(), &e, None);
        assert_eq!(r, Operand::Value(Value::Text("15".into())));
    }

    #[test]
    fn range_of_promotes_rows_and_columns() {
        let r = range_of(vec![
            Operand::Value(Value::Number(1.0)),
            Operand::Value(Value::Number(3.0)),
        ]);
        assert_eq!(
            r,
            Operand::Ref(Reference::Range(RangeRef::whole_rows(1, 3)))
        );

        let r = range_of(vec![
            Operand::Ref(Reference::Range(RangeRef::whole_columns(1, 1))),
            Operand::Value(Value::Number(2.0)),
        ]);
        // Whole column crossed with whole row covers the sheet.
        assert_eq!(
            r,
            Operand::Ref(Reference::Range(RangeRef::new(None, None, None, None)))
        );
    }

    #[test]
    fn range_of_covers_cells() {
        let r = range_of(vec![
            Operand::Ref(Reference::Cell(CellRef::new(3, 2))),
            Operand::Ref(Reference::Cell(CellRef::new(1, 4))),
        ]);
        assert_eq!(
            r,
            Operand::Ref(Reference::Range(RangeRef::new(
                Some(1),
                Some(2),
                Some(3),
                Some(4)
            )))
        );
    }

    #[test]
    fn intersection_overlaps_and_rejects() {
        let a1c3 = Operand::Ref(Reference::Range(RangeRef::new(
            Some(1),
            Some(1),
            Some(3),
            Some(3),
        )));
        let b2d4 = Operand::Ref(Reference::Range(RangeRef::new(
            Some(2),
            Some(2),
            Some(4),
            Some(4),
        )));
        let out = intersect(vec![a1c3, b2d4]);
        assert_eq!(
            out,
            Operand::Ref(Reference::Range(RangeRef::new(
                Some(2),
                Some(2),
                Some(3),
                Some(3)
            )))
        );

        // Disjoint boxes are #NULL!.
        let a = Operand::Ref(Reference::Cell(CellRef::new(1, 1)));
        let b = Operand::Ref(Reference::Cell(CellRef::new(5, 5)));
        assert_eq!(intersect(vec![a, b]), Operand::error(FormulaError::NULL));

        // Whole column x whole column has no bounded row axis.
        let c1 = Operand::Ref(Reference::Range(RangeRef::whole_columns(1, 1)));
        let c2 = Operand::Ref(Reference::Range(RangeRef::whole_columns(1, 2)));
        let out = intersect(vec![c1, c2]);
        assert!(matches!(
            out,
            Operand::Value(Value::Error(e)) if e.kind() == ErrorKind::Error
        ));
    }

    #[test]
    fn explicit_sheet_wide_spans_stay_bounded() {
        // A1:XFD1 reaches the sheet edge but is structurally bounded, so
        // crossing it with a whole row is a valid intersection.
        let row = Operand::Ref(Reference::Range(RangeRef::whole_rows(1, 1)));
        let edge = Operand::Ref(Reference::Range(RangeRef::new(
            Some(1),
            Some(1),
            Some(1),
            Some(gridformula_common::MAX_COLUMN),
        )));
        let out = intersect(vec![row, edge]);
        assert_eq!(
            out,
            Operand::Ref(Reference::Range(RangeRef::new(
                Some(1),
                Some(1),
                Some(1),
                Some(gridformula_common::MAX_COLUMN),
            )))
        );
    }

    #[test]
    fn intersection_collapses_to_cell() {
        let col = Operand::Ref(Reference::Range(RangeRef::whole_columns(1, 1)));
        let row = Operand::Ref(Reference::Range(RangeRef::whole_rows(2, 2)));
        assert_eq!(
            intersect(vec![col, row]),
            Operand::Ref(Reference::Cell(CellRef::new(2, 1)))
        );
    }

    #[test]
    fn differing_sheets_do_not_intersect() {
        let a = Operand::Ref(Reference::Cell(CellRef::new(1, 1).with_sheet("One")));
        let b = Operand::Ref(Reference::Cell(CellRef::new(1, 1).with_sheet("Two")));
        assert_eq!(intersect(vec![a, b]), Operand::error(FormulaError::NULL));
    }
}
