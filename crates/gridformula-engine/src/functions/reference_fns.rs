//! Reference built-ins: position probes (`ROW`, `COLUMN`, `ROWS`,
//! `COLUMNS`) and the reference factories (`INDEX`, `CHOOSE`, `INDIRECT`,
//! `OFFSET`) whose results flow back into the reference algebra.

use gridformula_common::{
    address, CellRef, FormulaError, RangeRef, Reference, Value, MAX_COLUMN, MAX_ROW,
};

use crate::args::{accept, coerce_scalar, ValueType};
use crate::dispatch::Operand;
use crate::functions::{Arg, FnAttrs, FnCtx, FnResult, FunctionRegistry};

pub(crate) fn install(reg: &mut FunctionRegistry) {
    let raw = FnAttrs::NULL_AS_ZERO | FnAttrs::NEEDS_CONTEXT | FnAttrs::NO_DEREF;
    reg.builtin_fn("ROW", raw, row_fn);
    reg.builtin_fn("ROWS", raw, rows_fn);
    reg.builtin_fn("COLUMN", raw, column_fn);
    reg.builtin_fn("COLUMNS", raw, columns_fn);
    reg.builtin_fn("INDEX", raw, index_fn);
    reg.builtin_fn(
        "CHOOSE",
        FnAttrs::NULL_AS_ZERO | FnAttrs::NEEDS_CONTEXT,
        choose_fn,
    );
    reg.builtin_fn(
        "INDIRECT",
        FnAttrs::NEEDS_CONTEXT,
        indirect_fn,
    );
    // OFFSET needs the raw reference of its anchor alongside the value.
    reg.builtin_fn(
        "OFFSET",
        FnAttrs::NULL_AS_ZERO | FnAttrs::NEEDS_CONTEXT | FnAttrs::PRESERVE_REF,
        offset_fn,
    );
}

/// Numeric coercion for a possibly-raw argument.
fn ctx_number(ctx: &FnCtx<'_>, arg: Option<&Arg>) -> Result<f64, FormulaError> {
    let arg = arg.ok_or_else(|| FormulaError::NA.with_details("Argument missing"))?;
    if arg.omitted {
        return Ok(0.0);
    }
    match coerce_scalar(ctx.dereference(arg), Some(ValueType::Number))? {
        Value::Number(n) => Ok(n),
        _ => Err(FormulaError::VALUE),
    }
}

fn arg_reference(args: &[Arg], idx: usize) -> Result<Reference, FormulaError> {
    args.get(idx)
        .and_then(|a| a.reference.clone())
        .ok_or_else(|| FormulaError::VALUE.with_details("Expected a reference"))
}

fn row_fn(ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let row = match args.first().filter(|a| !a.omitted) {
        Some(_) => arg_reference(args, 0)?.spans().0 .0,
        None => {
            ctx.position
                .ok_or_else(|| {
                    FormulaError::VALUE.with_details("ROW() needs an evaluation position")
                })?
                .row
        }
    };
    Ok(Operand::Value(Value::Number(row as f64)))
}

fn column_fn(ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let col = match args.first().filter(|a| !a.omitted) {
        Some(_) => arg_reference(args, 0)?.spans().1 .0,
        None => {
            ctx.position
                .ok_or_else(|| {
                    FormulaError::VALUE.with_details("COLUMN() needs an evaluation position")
                })?
                .col
        }
    };
    Ok(Operand::Value(Value::Number(col as f64)))
}

fn rows_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let ((r0, r1), _) = arg_reference(args, 0)?.spans();
    Ok(Operand::Value(Value::Number((r1 - r0 + 1) as f64)))
}

fn columns_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let (_, (c0, c1)) = arg_reference(args, 0)?.spans();
    Ok(Operand::Value(Value::Number((c1 - c0 + 1) as f64)))
}

/// `INDEX(block, row, [col])` — returns a cell reference inside a
/// referenced block, or a value from an array literal.
fn index_fn(ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let row = ctx_number(ctx, args.get(1))?.trunc() as i64;
    let col = match args.get(2).filter(|a| !a.omitted) {
        Some(a) => ctx_number(ctx, Some(a))?.trunc() as i64,
        None => 1,
    };
    if row < 1 || col < 1 {
        return Err(FormulaError::VALUE.with_details("INDEX positions are 1-based"));
    }

    let first = args
        .first()
        .ok_or_else(|| FormulaError::NA.with_details("Argument missing"))?;
    if let Some(reference) = &first.reference {
        let ((r0, r1), (c0, c1)) = reference.spans();
        let row = r0 as i64 + row - 1;
        let col = c0 as i64 + col - 1;
        if row > r1 as i64 || col > c1 as i64 {
            return Err(FormulaError::REF);
        }
        let mut cell = CellRef::new(row as u32, col as u32);
        cell.sheet = reference.sheet().map(str::to_string);
        return Ok(Operand::Ref(Reference::Cell(cell)));
    }
    // Array literal input.
    if let Value::Array(rows) = &first.value {
        let cell = rows
            .get((row - 1) as usize)
            .and_then(|r| r.get((col - 1) as usize))
            .ok_or(FormulaError::REF)?;
        return Ok(Operand::Value(cell.clone()));
    }
    Err(FormulaError::VALUE.with_details("INDEX needs a range or array"))
}

fn choose_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let k = match accept(args.first(), Some(ValueType::Number), None)? {
        Value::Number(n) => n.trunc() as i64,
        _ => return Err(FormulaError::VALUE),
    };
    if k < 1 || (k as usize) >= args.len() {
        return Err(FormulaError::VALUE.with_details("CHOOSE index out of range"));
    }
    Ok(Operand::Value(args[k as usize].value.clone()))
}

fn indirect_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let text = match accept(args.first(), Some(ValueType::Text), None)? {
        Value::Text(s) => s,
        _ => return Err(FormulaError::VALUE),
    };
    match address::parse_reference(&text) {
        Ok(reference) => Ok(Operand::Ref(reference)),
        Err(_) => Err(FormulaError::REF.with_details(format!("Cannot resolve '{text}'"))),
    }
}

/// `OFFSET(ref, rows, cols, [height], [width])`.
fn offset_fn(ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let base = arg_reference(args, 0)?;
    let drow = ctx_number(ctx, args.get(1))?.trunc() as i64;
    let dcol = ctx_number(ctx, args.get(2))?.trunc() as i64;
    let ((r0, r1), (c0, c1)) = base.spans();

    let height = match args.get(3).filter(|a| !a.omitted) {
        Some(a) => ctx_number(ctx, Some(a))?.trunc() as i64,
        None => (r1 - r0 + 1) as i64,
    };
    let width = match args.get(4).filter(|a| !a.omitted) {
        Some(a) => ctx_number(ctx, Some(a))?.trunc() as i64,
        None => (c1 - c0 + 1) as i64,
    };
    if height < 1 || width < 1 {
        return Err(FormulaError::REF);
    }

    let new_r0 = r0 as i64 + drow;
    let new_c0 = c0 as i64 + dcol;
    let new_r1 = new_r0 + height - 1;
    let new_c1 = new_c0 + width - 1;
    if new_r0 < 1 || new_c0 < 1 || new_r1 > MAX_ROW as i64 || new_c1 > MAX_COLUMN as i64 {
        return Err(FormulaError::REF);
    }

    let sheet = base.sheet().map(str::to_string);
    if new_r0 == new_r1 && new_c0 == new_c1 {
        let mut cell = CellRef::new(new_r0 as u32, new_c0 as u32);
        cell.sheet = sheet;
        return Ok(Operand::Ref(Reference::Cell(cell)));
    }
    let mut range = RangeRef::new(
        Some(new_r0 as u32),
        Some(new_c0 as u32),
        Some(new_r1 as u32),
        Some(new_c1 as u32),
    );
    range.sheet = sheet;
    Ok(Operand::Ref(Reference::Range(range)))
}
