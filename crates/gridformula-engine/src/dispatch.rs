//! Run-time shapes and the reference/value dispatch layer.
//!
//! `Operand` is what grammar productions return: a plain value, a reference
//! that has not been read yet, a union, or an omitted argument. The helpers
//! here move between those shapes: `retrieve_ref` reads through the backend,
//! `extract_ref_value` is the operator-facing resolution step, and
//! `check_result` applies the final collapse rules of a `parse` call.

use gridformula_common::{CellRef, Collection, FormulaError, Reference, Value};

use crate::traits::{Backend, CellPos};

/// A value in flight through the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Ref(Reference),
    Union(Collection),
    /// A hole in an argument list, distinct from literal blank or zero.
    Omitted,
}

impl Operand {
    pub fn error(e: FormulaError) -> Self {
        Operand::Value(Value::Error(e))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Operand::Ref(_))
    }

    /// The error inside, if this operand already carries one.
    pub fn as_error(&self) -> Option<&FormulaError> {
        match self {
            Operand::Value(Value::Error(e)) => Some(e),
            _ => None,
        }
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

/// Fill the evaluation position's sheet into an unqualified reference.
pub(crate) fn stamp(reference: &Reference, position: Option<&CellPos>) -> Reference {
    reference
        .clone()
        .with_default_sheet(position.and_then(|p| p.sheet.as_deref()))
}

/// Read a reference through the backend: cells give scalars, ranges give
/// rectangular arrays.
pub(crate) fn retrieve_ref(
    backend: &dyn Backend,
    reference: &Reference,
    position: Option<&CellPos>,
) -> Value {
    match stamp(reference, position) {
        Reference::Cell(c) => backend.cell_value(&c),
        Reference::Range(r) => backend.range_value(&r),
    }
}

/// Resolve an operand for an operator: `(value, is_array)`.
///
/// References are read through the backend (so the dependency collector sees
/// them even when the operator later fails); unions are not operator
/// material and collapse to `#VALUE!`.
pub(crate) fn extract_ref_value(
    backend: &dyn Backend,
    operand: &Operand,
    position: Option<&CellPos>,
) -> (Value, bool) {
    match operand {
        Operand::Value(v) => (v.clone(), matches!(v, Value::Array(_))),
        Operand::Ref(r) => {
            let v = retrieve_ref(backend, r, position);
            let is_array = matches!(r, Reference::Range(_)) || matches!(v, Value::Array(_));
            (v, is_array)
        }
        Operand::Union(_) => (
            Value::Error(FormulaError::VALUE.with_details("Union is only valid as an argument")),
            false,
        ),
        Operand::Omitted => (Value::Blank, false),
    }
}

/// Final collapse of a `parse` result.
///
/// Numbers are sanitized (`NaN -> #VALUE!`, infinities -> `#NUM!`, `-0 -> 0`).
/// With `allow_return_array` any reference dereferences as-is; without it a
/// single-cell reference dereferences, a range whose columns collapse reads
/// its top cell, and any other array collapses to its top-left element.
/// A surviving union is `#VALUE!` either way.
pub(crate) fn check_result(
    backend: &dyn Backend,
    operand: Operand,
    allow_return_array: bool,
    position: Option<&CellPos>,
) -> Value {
    match operand {
        Operand::Omitted => Value::Blank,
        Operand::Union(_) => {
            Value::Error(FormulaError::VALUE.with_details("Union is only valid as an argument"))
        }
        Operand::Ref(r) => {
            if allow_return_array {
                return finish_value(retrieve_ref(backend, &r, position), true);
            }
            match stamp(&r, position) {
                Reference::Cell(c) => finish_value(backend.cell_value(&c), false),
                Reference::Range(rg) => {
                    if rg.start_col.is_some() && rg.start_col == rg.end_col {
                        // Column-collapsed range: the top cell stands in.
                        let cell = CellRef {
                            sheet: rg.sheet.clone(),
                            row: rg.row_span().0,
                            col: rg.col_span().0,
                        };
                        finish_value(backend.cell_value(&cell), false)
                    } else {
                        finish_value(backend.range_value(&rg), false)
                    }
                }
            }
        }
        Operand::Value(v) => finish_value(v, allow_return_array),
    }
}

fn finish_value(v: Value, allow_array: bool) -> Value {
    match v {
        Value::Number(n) => sanitize_number(n),
        Value::Array(_) if !allow_array => {
            let first = v.into_scalar();
            match first {
                Value::Number(n) => sanitize_number(n),
                other => other,
            }
        }
        other => other,
    }
}

/// NaN -> `#VALUE!`, +/-infinity -> `#NUM!`, negative zero collapses to zero.
pub(crate) fn sanitize_number(n: f64) -> Value {
    if n.is_nan() {
        Value::Error(FormulaError::VALUE)
    } else if n.is_infinite() {
        Value::Error(FormulaError::NUM)
    } else if n == 0.0 {
        Value::Number(0.0)
    } else {
        Value::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_negative_zero() {
        assert_eq!(sanitize_number(-0.0), Value::Number(0.0));
        assert!(matches!(
            sanitize_number(-0.0),
            Value::Number(n) if n.is_sign_positive()
        ));
        assert_eq!(sanitize_number(f64::NAN), Value::Error(FormulaError::VALUE));
        assert_eq!(
            sanitize_number(f64::INFINITY),
            Value::Error(FormulaError::NUM)
        );
    }
}
