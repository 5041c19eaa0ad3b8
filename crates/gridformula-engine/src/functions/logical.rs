//! Logical built-ins.
//!
//! `IF` is a context function that sees raw references: the branch it picks
//! is handed back as-is, so `=SUM(IF(TRUE,A1:A3,B1:B3))` keeps working as a
//! reference expression.

use gridformula_common::{ErrorKind, FormulaError, Value};

use crate::args::flatten_params;
use crate::dispatch::Operand;
use crate::functions::{Arg, FnAttrs, FnCtx, FnResult, FunctionRegistry};

pub(crate) fn install(reg: &mut FunctionRegistry) {
    reg.builtin_fn("TRUE", FnAttrs::NULL_AS_ZERO, true_fn);
    reg.builtin_fn("FALSE", FnAttrs::NULL_AS_ZERO, false_fn);
    reg.builtin_fn("NOT", FnAttrs::NULL_AS_ZERO, not_fn);
    reg.builtin_fn("AND", FnAttrs::NULL_AS_ZERO, and_fn);
    reg.builtin_fn("OR", FnAttrs::NULL_AS_ZERO, or_fn);
    reg.builtin_fn("XOR", FnAttrs::NULL_AS_ZERO, xor_fn);
    reg.builtin_fn(
        "IF",
        FnAttrs::NULL_AS_ZERO | FnAttrs::NEEDS_CONTEXT | FnAttrs::NO_DEREF,
        if_fn,
    );
    reg.builtin_fn("IFS", FnAttrs::NULL_AS_ZERO, ifs_fn);
    reg.builtin_fn("IFERROR", FnAttrs::empty(), iferror);
    reg.builtin_fn("IFNA", FnAttrs::empty(), ifna);
}

fn true_fn(_ctx: &FnCtx<'_>, _args: &[Arg]) -> FnResult {
    Ok(Operand::Value(Value::Bool(true)))
}

fn false_fn(_ctx: &FnCtx<'_>, _args: &[Arg]) -> FnResult {
    Ok(Operand::Value(Value::Bool(false)))
}

/// Excel truthiness: booleans as-is, numbers non-zero, blanks false, text
/// refuses, errors re-raise.
fn truthy(value: &Value) -> Result<bool, FormulaError> {
    match value.first() {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::Blank => Ok(false),
        Value::Error(e) => Err(e.clone()),
        _ => Err(FormulaError::VALUE.with_details("Expected a logical value")),
    }
}

fn not_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let value = args
        .first()
        .map(|a| a.value.clone())
        .ok_or_else(|| FormulaError::NA.with_details("Argument missing"))?;
    Ok(Operand::Value(Value::Bool(!truthy(&value)?)))
}

/// Shared walk for AND/OR/XOR: booleans and numbers count, range text and
/// blanks are ignored, literal text refuses, errors propagate.
fn fold_logical<F>(args: &[Arg], mut f: F) -> Result<u64, FormulaError>
where
    F: FnMut(bool),
{
    let mut seen = 0u64;
    flatten_params(args, None, true, None, 1, |value, info| {
        match value {
            Value::Bool(b) => {
                f(*b);
                seen += 1;
            }
            Value::Number(n) => {
                f(*n != 0.0);
                seen += 1;
            }
            Value::Error(e) => return Err(e.clone()),
            Value::Text(s) if info.is_literal => {
                if s.eq_ignore_ascii_case("TRUE") {
                    f(true);
                    seen += 1;
                } else if s.eq_ignore_ascii_case("FALSE") {
                    f(false);
                    seen += 1;
                } else {
                    return Err(
                        FormulaError::VALUE.with_details(format!("'{s}' is not a logical value"))
                    );
                }
            }
            _ => {}
        }
        Ok(())
    })?;
    Ok(seen)
}

fn and_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut all = true;
    let seen = fold_logical(args, |b| all &= b)?;
    if seen == 0 {
        return Err(FormulaError::VALUE);
    }
    Ok(Operand::Value(Value::Bool(all)))
}

fn or_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut any = false;
    let seen = fold_logical(args, |b| any |= b)?;
    if seen == 0 {
        return Err(FormulaError::VALUE);
    }
    Ok(Operand::Value(Value::Bool(any)))
}

fn xor_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut acc = false;
    let seen = fold_logical(args, |b| acc ^= b)?;
    if seen == 0 {
        return Err(FormulaError::VALUE);
    }
    Ok(Operand::Value(Value::Bool(acc)))
}

fn if_fn(ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let cond_arg = args
        .first()
        .ok_or_else(|| FormulaError::NA.with_details("Argument missing"))?;
    let cond = truthy(&ctx.dereference(cond_arg))?;
    let picked = if cond { args.get(1) } else { args.get(2) };
    Ok(match picked {
        // A two-argument IF whose condition fails yields FALSE.
        None => Operand::Value(Value::Bool(false)),
        Some(arg) => branch_operand(arg),
    })
}

/// Hand a branch back unevaluated when it is a raw reference.
fn branch_operand(arg: &Arg) -> Operand {
    match (&arg.reference, arg.resolved) {
        (Some(r), false) => Operand::Ref(r.clone()),
        _ => Operand::Value(arg.value.clone()),
    }
}

fn ifs_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    if args.len() < 2 {
        return Err(FormulaError::NA.with_details("IFS needs condition/value pairs"));
    }
    for pair in args.chunks(2) {
        let [cond, value] = pair else {
            return Err(FormulaError::NA.with_details("IFS needs condition/value pairs"));
        };
        if truthy(&cond.value)? {
            return Ok(Operand::Value(value.value.clone()));
        }
    }
    Err(FormulaError::new(ErrorKind::Na))
}

fn iferror(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let value = args
        .first()
        .map(|a| a.value.clone())
        .ok_or_else(|| FormulaError::NA.with_details("Argument missing"))?;
    if value.is_error() {
        let fallback = args.get(1).map_or(Value::Text(String::new()), |a| a.value.clone());
        return Ok(Operand::Value(fallback));
    }
    Ok(Operand::Value(value))
}

fn ifna(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let value = args
        .first()
        .map(|a| a.value.clone())
        .ok_or_else(|| FormulaError::NA.with_details("Argument missing"))?;
    if matches!(&value, Value::Error(e) if e.kind() == ErrorKind::Na) {
        let fallback = args.get(1).map_or(Value::Text(String::new()), |a| a.value.clone());
        return Ok(Operand::Value(fallback));
    }
    Ok(Operand::Value(value))
}
