//! Criteria aggregates: `SUMIF`, `AVERAGEIF`, `COUNTIF`, `COUNTBLANK`.
//!
//! `SUMIF`/`AVERAGEIF` are no-deref context functions: the test range and
//! the optional sum range stay references until the aggregate walks them,
//! aligned cell-for-cell.

use gridformula_common::{FormulaError, Value};

use crate::args::accept_matrix;
use crate::criteria::Criteria;
use crate::dispatch::Operand;
use crate::functions::{Arg, FnAttrs, FnCtx, FnResult, FunctionRegistry};

pub(crate) fn install(reg: &mut FunctionRegistry) {
    let ctx_raw = FnAttrs::NULL_AS_ZERO | FnAttrs::NEEDS_CONTEXT | FnAttrs::NO_DEREF;
    reg.builtin_fn("SUMIF", ctx_raw, sumif);
    reg.builtin_fn("AVERAGEIF", ctx_raw, averageif);
    reg.builtin_fn("COUNTIF", FnAttrs::NULL_AS_ZERO, countif);
    reg.builtin_fn("COUNTBLANK", FnAttrs::NULL_AS_ZERO, countblank);
}

/// Materialize a raw range argument as a matrix.
fn ctx_matrix(ctx: &FnCtx<'_>, arg: Option<&Arg>) -> Result<Vec<Vec<Value>>, FormulaError> {
    let arg = arg.ok_or_else(|| FormulaError::NA.with_details("Argument missing"))?;
    if arg.union.is_some() {
        return Err(FormulaError::VALUE.with_details("Union not allowed here"));
    }
    let value = ctx.dereference(arg);
    match value {
        Value::Error(e) => Err(e),
        Value::Array(rows) => Ok(rows),
        scalar => Ok(vec![vec![scalar]]),
    }
}

fn ctx_criteria(ctx: &FnCtx<'_>, arg: Option<&Arg>) -> Result<Criteria, FormulaError> {
    let arg = arg.ok_or_else(|| FormulaError::NA.with_details("Argument missing"))?;
    let value = ctx.dereference(arg).into_scalar();
    Ok(Criteria::from_value(&value))
}

/// Walk `(test cell, paired cell)` over the criteria range, pairing by
/// offset with the sum range when one is given.
fn fold_if<F>(
    ctx: &FnCtx<'_>,
    args: &[Arg],
    mut f: F,
) -> Result<(), FormulaError>
where
    F: FnMut(&Value, Option<&Value>),
{
    let test = ctx_matrix(ctx, args.first())?;
    let criteria = ctx_criteria(ctx, args.get(1))?;
    let paired = match args.get(2).filter(|a| !a.omitted) {
        Some(a) => Some(ctx_matrix(ctx, Some(a))?),
        None => None,
    };

    for (i, row) in test.iter().enumerate() {
        for (j, cell) in row.iter().enumerate() {
            if !criteria.matches(cell) {
                continue;
            }
            match &paired {
                None => f(cell, None),
                Some(rows) => {
                    let pair = rows.get(i).and_then(|r| r.get(j));
                    f(cell, Some(pair.unwrap_or(&Value::Blank)));
                }
            }
        }
    }
    Ok(())
}

fn sumif(ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut total = 0.0;
    fold_if(ctx, args, |cell, paired| {
        let v = paired.unwrap_or(cell);
        if let Value::Number(n) = v {
            total += n;
        }
    })?;
    Ok(Operand::Value(Value::Number(total)))
}

fn averageif(ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut total = 0.0;
    let mut count = 0u64;
    fold_if(ctx, args, |cell, paired| {
        let v = paired.unwrap_or(cell);
        if let Value::Number(n) = v {
            total += n;
            count += 1;
        }
    })?;
    if count == 0 {
        return Err(FormulaError::DIV0);
    }
    Ok(Operand::Value(Value::Number(total / count as f64)))
}

fn countif(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let test = accept_matrix(args.first(), true)?;
    let criteria = Criteria::from_value(
        &args
            .get(1)
            .map(|a| a.value.clone().into_scalar())
            .unwrap_or(Value::Blank),
    );
    let count = test
        .iter()
        .flatten()
        .filter(|cell| criteria.matches(cell))
        .count();
    Ok(Operand::Value(Value::Number(count as f64)))
}

fn countblank(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let block = accept_matrix(args.first(), true)?;
    let count = block
        .iter()
        .flatten()
        .filter(|cell| matches!(cell, Value::Blank) || matches!(cell, Value::Text(s) if s.is_empty()))
        .count();
    Ok(Operand::Value(Value::Number(count as f64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_grid::TestGrid;
    use crate::FormulaEngine;

    fn engine() -> FormulaEngine {
        FormulaEngine::new(
            TestGrid::new()
                .with_range(
                    "Sheet1",
                    1,
                    1,
                    vec![
                        vec![Value::Text("apples".into()), Value::Number(10.0)],
                        vec![Value::Text("pears".into()), Value::Number(20.0)],
                        vec![Value::Text("apricots".into()), Value::Number(30.0)],
                        vec![Value::Blank, Value::Number(40.0)],
                    ],
                )
                .with_range(
                    "Sheet1",
                    1,
                    3,
                    vec![
                        vec![Value::Number(5.0)],
                        vec![Value::Number(15.0)],
                        vec![Value::Number(25.0)],
                    ],
                ),
        )
    }

    fn eval(formula: &str) -> Value {
        engine().parse(formula, None, false)
    }

    #[test]
    fn sumif_with_numbers() {
        assert_eq!(eval("=SUMIF(C1:C3,\">10\")"), Value::Number(40.0));
        assert_eq!(eval("=SUMIF(C1:C3,\"<=5\")"), Value::Number(5.0));
    }

    #[test]
    fn sumif_with_sum_range() {
        assert_eq!(eval("=SUMIF(A1:A3,\"a*\",B1:B3)"), Value::Number(40.0));
        assert_eq!(eval("=SUMIF(A1:A3,\"pears\",B1:B3)"), Value::Number(20.0));
    }

    #[test]
    fn averageif_counts_matches() {
        assert_eq!(eval("=AVERAGEIF(C1:C3,\">0\")"), Value::Number(15.0));
        assert!(eval("=AVERAGEIF(C1:C3,\">999\")").is_error());
    }

    #[test]
    fn countif_and_countblank() {
        assert_eq!(eval("=COUNTIF(A1:A3,\"a*\")"), Value::Number(2.0));
        assert_eq!(eval("=COUNTIF(C1:C3,\">10\")"), Value::Number(2.0));
        assert_eq!(eval("=COUNTBLANK(A1:A4)"), Value::Number(1.0));
    }

    #[test]
    fn criteria_can_come_from_cells() {
        // The criteria argument may itself be a reference.
        let e = FormulaEngine::new(
            TestGrid::new()
                .with_cell_a1("Sheet1", "A1", Value::Number(1.0))
                .with_cell_a1("Sheet1", "A2", Value::Number(5.0))
                .with_cell_a1("Sheet1", "B1", Value::Text(">2".into())),
        );
        assert_eq!(e.parse("=SUMIF(A1:A2,B1)", None, false), Value::Number(5.0));
    }
}
