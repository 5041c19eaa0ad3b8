//! Canonical argument coercion for built-ins and user functions.
//!
//! `accept` collapses one argument to a coerced scalar; `accept_matrix` /
//! `accept_flat` cover array-shaped parameters; `flatten_params` walks every
//! element of every argument, which is how the aggregate functions consume
//! mixed scalars, ranges and unions.

use gridformula_common::{FormulaError, Value};

use crate::functions::Arg;

/// Scalar coercion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Number,
    /// Like `Number` but booleans are `#VALUE!`.
    NumberNoBoolean,
    Text,
    Boolean,
}

/// Coerce one argument to a scalar of the requested type.
///
/// Missing or omitted arguments take `default`, or `#N/A` without one.
/// Errors re-raise; arrays collapse to their top-left element first.
pub fn accept(
    arg: Option<&Arg>,
    ty: Option<ValueType>,
    default: Option<Value>,
) -> Result<Value, FormulaError> {
    let value = match arg {
        None => return missing(default),
        Some(a) if a.omitted => return missing(default),
        Some(a) if a.union.is_some() => {
            return Err(FormulaError::VALUE.with_details("Union not allowed here"));
        }
        Some(a) => a.value.clone(),
    };
    coerce_scalar(value, ty)
}

fn missing(default: Option<Value>) -> Result<Value, FormulaError> {
    default.ok_or_else(|| FormulaError::NA.with_details("Argument missing"))
}

/// `accept` for values already in hand (criteria cells, derefed args).
pub fn coerce_scalar(value: Value, ty: Option<ValueType>) -> Result<Value, FormulaError> {
    if let Value::Error(e) = value {
        return Err(e);
    }
    let value = value.into_scalar();
    if let Value::Error(e) = value {
        return Err(e);
    }
    let Some(ty) = ty else {
        return Ok(value);
    };
    match ty {
        ValueType::Number => Ok(Value::Number(to_number(&value, true)?)),
        ValueType::NumberNoBoolean => Ok(Value::Number(to_number(&value, false)?)),
        ValueType::Text => Ok(Value::Text(to_text(&value))),
        ValueType::Boolean => Ok(Value::Bool(to_boolean(&value)?)),
    }
}

fn to_number(value: &Value, allow_boolean: bool) -> Result<f64, FormulaError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Bool(b) if allow_boolean => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Bool(_) => Err(FormulaError::VALUE.with_details("Boolean not allowed here")),
        Value::Blank => Ok(0.0),
        Value::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            FormulaError::VALUE.with_details(format!("Cannot convert '{s}' to number"))
        }),
        _ => Err(FormulaError::VALUE),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Blank => String::new(),
        _ => value.to_string(),
    }
}

fn to_boolean(value: &Value) -> Result<bool, FormulaError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::Blank => Ok(false),
        Value::Text(_) => Err(FormulaError::VALUE.with_details("Text is not a boolean")),
        _ => Err(FormulaError::VALUE),
    }
}

/// An argument as a rectangular block. Scalars wrap to `[[x]]` only when
/// `allow_single_value`; unions are never array material.
pub fn accept_matrix(
    arg: Option<&Arg>,
    allow_single_value: bool,
) -> Result<Vec<Vec<Value>>, FormulaError> {
    let arg = match arg {
        None => return Err(FormulaError::NA.with_details("Argument missing")),
        Some(a) if a.omitted => return Err(FormulaError::NA.with_details("Argument missing")),
        Some(a) => a,
    };
    if arg.union.is_some() {
        return Err(FormulaError::VALUE.with_details("Union is not an array"));
    }
    match &arg.value {
        Value::Error(e) => Err(e.clone()),
        Value::Array(rows) => Ok(rows.clone()),
        scalar if allow_single_value => Ok(vec![vec![scalar.clone()]]),
        _ => Err(FormulaError::VALUE.with_details("Expected an array")),
    }
}

/// `accept_matrix` flattened row-major.
pub fn accept_flat(
    arg: Option<&Arg>,
    allow_single_value: bool,
) -> Result<Vec<Value>, FormulaError> {
    Ok(accept_matrix(arg, allow_single_value)?
        .into_iter()
        .flatten()
        .collect())
}

/// Shape of the element a `flatten_params` hook is looking at.
#[derive(Debug, Clone, Copy)]
pub struct ParamInfo {
    /// The element came from a literal argument, not a reference.
    pub is_literal: bool,
    pub is_cell_ref: bool,
    pub is_range_ref: bool,
    pub omitted: bool,
}

/// Walk every element of every argument, in order, calling
/// `hook(value, info)`.
///
/// Literal scalars are pre-coerced per `ty`; elements coming out of ranges
/// and arrays are handed over raw, so hooks can skip text in ranges while
/// still coercing `SUM(1, "2")`. Unions flatten only when `allow_union`.
/// Omitted arguments call the hook with `default` when one is given.
pub fn flatten_params<F>(
    args: &[Arg],
    ty: Option<ValueType>,
    allow_union: bool,
    default: Option<&Value>,
    min_size: usize,
    mut hook: F,
) -> Result<(), FormulaError>
where
    F: FnMut(&Value, &ParamInfo) -> Result<(), FormulaError>,
{
    if args.len() < min_size {
        return Err(FormulaError::NA.with_details("Too few arguments"));
    }
    for arg in args {
        if arg.omitted {
            if let Some(d) = default {
                hook(
                    d,
                    &ParamInfo {
                        is_literal: true,
                        is_cell_ref: false,
                        is_range_ref: false,
                        omitted: true,
                    },
                )?;
            }
            continue;
        }
        if let Some(union) = &arg.union {
            if !allow_union {
                return Err(FormulaError::VALUE.with_details("Union not allowed here"));
            }
            let info = ParamInfo {
                is_literal: false,
                is_cell_ref: false,
                is_range_ref: true,
                omitted: false,
            };
            for (value, _reference) in union.iter() {
                each_element(value, &info, &mut hook)?;
            }
            continue;
        }
        let info = ParamInfo {
            is_literal: arg.is_literal() && !arg.is_array,
            is_cell_ref: arg.is_cell_ref,
            is_range_ref: arg.is_range_ref,
            omitted: false,
        };
        if info.is_literal {
            let coerced = coerce_scalar(arg.value.clone(), ty)?;
            hook(&coerced, &info)?;
        } else {
            each_element(&arg.value, &info, &mut hook)?;
        }
    }
    Ok(())
}

fn each_element<F>(value: &Value, info: &ParamInfo, hook: &mut F) -> Result<(), FormulaError>
where
    F: FnMut(&Value, &ParamInfo) -> Result<(), FormulaError>,
{
    match value {
        Value::Array(rows) => {
            for row in rows {
                for cell in row {
                    hook(cell, info)?;
                }
            }
            Ok(())
        }
        scalar => hook(scalar, info),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(v: Value) -> Arg {
        Arg::from_value(v)
    }

    #[test]
    fn accept_defaults_and_missing() {
        assert_eq!(
            accept(None, Some(ValueType::Number), Some(Value::Number(7.0))).unwrap(),
            Value::Number(7.0)
        );
        let err = accept(None, Some(ValueType::Number), None).unwrap_err();
        assert_eq!(err, FormulaError::NA.with_details("Argument missing"));
    }

    #[test]
    fn accept_coercions() {
        let n = accept(Some(&lit(Value::Text("3.5".into()))), Some(ValueType::Number), None);
        assert_eq!(n.unwrap(), Value::Number(3.5));

        let t = accept(Some(&lit(Value::Bool(true))), Some(ValueType::Text), None);
        assert_eq!(t.unwrap(), Value::Text("TRUE".into()));

        let b = accept(Some(&lit(Value::Text("yes".into()))), Some(ValueType::Boolean), None);
        assert!(b.is_err());

        let nb = accept(
            Some(&lit(Value::Bool(true))),
            Some(ValueType::NumberNoBoolean),
            None,
        );
        assert!(nb.is_err());
    }

    #[test]
    fn accept_collapses_arrays() {
        let arr = lit(Value::Array(vec![vec![Value::Number(9.0), Value::Number(8.0)]]));
        assert_eq!(
            accept(Some(&arr), Some(ValueType::Number), None).unwrap(),
            Value::Number(9.0)
        );
    }

    #[test]
    fn accept_matrix_wraps_scalars_only_when_allowed() {
        let s = lit(Value::Number(1.0));
        assert_eq!(accept_matrix(Some(&s), true).unwrap(), vec![vec![Value::Number(1.0)]]);
        assert!(accept_matrix(Some(&s), false).is_err());
    }

    #[test]
    fn flatten_coerces_literals_but_not_range_elements() {
        let mut seen = Vec::new();
        let range_arg = Arg {
            is_range_ref: true,
            ..lit(Value::Array(vec![vec![
                Value::Number(1.0),
                Value::Text("skip me".into()),
            ]]))
        };
        flatten_params(
            &[lit(Value::Text("4".into())), range_arg],
            Some(ValueType::Number),
            false,
            None,
            1,
            |v, info| {
                seen.push((v.clone(), info.is_literal));
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(
            seen,
            vec![
                (Value::Number(4.0), true),
                (Value::Number(1.0), false),
                (Value::Text("skip me".into()), false),
            ]
        );
    }

    #[test]
    fn flatten_enforces_min_size() {
        let err = flatten_params(&[], None, false, None, 1, |_, _| Ok(())).unwrap_err();
        assert_eq!(err.kind(), gridformula_common::ErrorKind::Na);
    }
}
