//! Math built-ins: aggregates over mixed scalars/ranges/unions, plus the
//! scalar helpers.
//!
//! Aggregates follow Excel's range rules: text and booleans inside ranges
//! are skipped, while literal arguments coerce (`SUM(1,"4")` is 5 and
//! `SUM("x")` is `#VALUE!`). Errors anywhere propagate.

use gridformula_common::{FormulaError, Value};

use crate::args::{accept, flatten_params, ValueType};
use crate::dispatch::{sanitize_number, Operand};
use crate::functions::{Arg, FnAttrs, FnCtx, FnResult, FunctionRegistry};

pub(crate) fn install(reg: &mut FunctionRegistry) {
    let agg = FnAttrs::NULL_AS_ZERO;
    reg.builtin_fn("SUM", agg, sum);
    reg.builtin_fn("PRODUCT", agg, product);
    reg.builtin_fn("AVERAGE", agg, average);
    reg.builtin_fn("MIN", agg, min);
    reg.builtin_fn("MAX", agg, max);
    reg.builtin_fn("COUNT", agg, count);
    reg.builtin_fn("COUNTA", agg, counta);
    reg.builtin_fn("ABS", agg, abs);
    reg.builtin_fn("INT", agg, int);
    reg.builtin_fn("MOD", agg, mod_fn);
    reg.builtin_fn("POWER", agg, power);
    reg.builtin_fn("SQRT", agg, sqrt);
    reg.builtin_fn("ROUND", agg, round);
    reg.builtin_fn("ROUNDUP", agg, roundup);
    reg.builtin_fn("ROUNDDOWN", agg, rounddown);
}

fn num(n: f64) -> FnResult {
    Ok(Operand::Value(sanitize_number(n)))
}

/// Walk the numeric elements of every argument: literals coerce, range
/// elements that are not numbers are skipped, errors propagate.
fn for_each_number<F>(args: &[Arg], mut f: F) -> Result<(), FormulaError>
where
    F: FnMut(f64),
{
    flatten_params(
        args,
        Some(ValueType::Number),
        true,
        Some(&Value::Number(0.0)),
        1,
        |value, info| {
            match value {
                Value::Number(n) => f(*n),
                Value::Error(e) => return Err(e.clone()),
                // Text/booleans/blanks inside ranges do not aggregate.
                _ if !info.is_literal => {}
                Value::Bool(b) => f(if *b { 1.0 } else { 0.0 }),
                _ => {}
            }
            Ok(())
        },
    )
}

fn sum(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut total = 0.0;
    for_each_number(args, |n| total += n)?;
    num(total)
}

fn product(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut product = 1.0;
    let mut seen = false;
    for_each_number(args, |n| {
        product *= n;
        seen = true;
    })?;
    num(if seen { product } else { 0.0 })
}

fn average(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut total = 0.0;
    let mut count = 0u64;
    for_each_number(args, |n| {
        total += n;
        count += 1;
    })?;
    if count == 0 {
        return Err(FormulaError::DIV0);
    }
    num(total / count as f64)
}

fn min(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut best = f64::INFINITY;
    let mut seen = false;
    for_each_number(args, |n| {
        best = best.min(n);
        seen = true;
    })?;
    num(if seen { best } else { 0.0 })
}

fn max(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut best = f64::NEG_INFINITY;
    let mut seen = false;
    for_each_number(args, |n| {
        best = best.max(n);
        seen = true;
    })?;
    num(if seen { best } else { 0.0 })
}

/// Counts numbers; literal text that parses as a number counts too, and so
/// do literal booleans. Errors inside ranges do not abort a COUNT.
fn count(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut count = 0u64;
    flatten_params(args, None, true, None, 1, |value, info| {
        match value {
            Value::Number(_) => count += 1,
            Value::Bool(_) if info.is_literal => count += 1,
            Value::Text(s) if info.is_literal && s.trim().parse::<f64>().is_ok() => count += 1,
            _ => {}
        }
        Ok(())
    })?;
    num(count as f64)
}

fn counta(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut count = 0u64;
    flatten_params(args, None, true, None, 1, |value, _info| {
        if !value.is_blank() {
            count += 1;
        }
        Ok(())
    })?;
    num(count as f64)
}

fn one_number(args: &[Arg]) -> Result<f64, FormulaError> {
    match accept(args.first(), Some(ValueType::Number), None)? {
        Value::Number(n) => Ok(n),
        _ => Err(FormulaError::VALUE),
    }
}

fn two_numbers(args: &[Arg]) -> Result<(f64, f64), FormulaError> {
    let a = one_number(args)?;
    let b = match accept(args.get(1), Some(ValueType::Number), None)? {
        Value::Number(n) => n,
        _ => return Err(FormulaError::VALUE),
    };
    Ok((a, b))
}

fn abs(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    num(one_number(args)?.abs())
}

fn int(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    num(one_number(args)?.floor())
}

/// Result takes the divisor's sign, as Excel defines it.
fn mod_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let (n, d) = two_numbers(args)?;
    if d == 0.0 {
        return Err(FormulaError::DIV0);
    }
    num(n - d * (n / d).floor())
}

fn power(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let (base, exp) = two_numbers(args)?;
    num(base.powf(exp))
}

fn sqrt(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let n = one_number(args)?;
    if n < 0.0 {
        return Err(FormulaError::NUM);
    }
    num(n.sqrt())
}

/// Half-away-from-zero, digits may be negative.
fn round_with(args: &[Arg], f: impl Fn(f64) -> f64) -> FnResult {
    let n = one_number(args)?;
    let digits = match accept(args.get(1), Some(ValueType::Number), Some(Value::Number(0.0)))? {
        Value::Number(d) => d.trunc() as i32,
        _ => return Err(FormulaError::VALUE),
    };
    let factor = 10f64.powi(digits);
    num(f(n * factor) / factor)
}

fn round(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    round_with(args, f64::round)
}

fn roundup(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    round_with(args, |x| x.abs().ceil() * x.signum())
}

fn rounddown(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    round_with(args, f64::trunc)
}
