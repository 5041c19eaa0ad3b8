//! Information built-ins: the preserve-ref family.
//!
//! These inspect their argument's value *and* its raw reference, so they
//! can tell a blank cell from a literal empty string and answer `ISREF`.

use gridformula_common::{ErrorKind, FormulaError, Value};

use crate::dispatch::Operand;
use crate::functions::{Arg, FnAttrs, FnCtx, FnResult, FunctionRegistry};

pub(crate) fn install(reg: &mut FunctionRegistry) {
    let info = FnAttrs::PRESERVE_REF;
    reg.builtin_fn("ISBLANK", info, isblank);
    reg.builtin_fn("ISERR", info, iserr);
    reg.builtin_fn("ISERROR", info, iserror);
    reg.builtin_fn("ISNA", info, isna);
    reg.builtin_fn("ISNUMBER", info, isnumber);
    reg.builtin_fn("ISTEXT", info, istext);
    reg.builtin_fn("ISNONTEXT", info, isnontext);
    reg.builtin_fn("ISLOGICAL", info, islogical);
    reg.builtin_fn("ISREF", info, isref);
    reg.builtin_fn("NA", FnAttrs::empty(), na);
    reg.builtin_fn("N", info, n_fn);
    reg.builtin_fn("TYPE", info, type_fn);
}

fn first_value(args: &[Arg]) -> Value {
    args.first()
        .map(|a| a.value.first().clone())
        .unwrap_or(Value::Blank)
}

fn bool_result(b: bool) -> FnResult {
    Ok(Operand::Value(Value::Bool(b)))
}

fn isblank(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    // Only a truly empty cell is blank; "" is text.
    bool_result(matches!(first_value(args), Value::Blank) && !args.is_empty())
}

fn iserr(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    bool_result(matches!(
        first_value(args),
        Value::Error(e) if e.kind() != ErrorKind::Na
    ))
}

fn iserror(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    bool_result(first_value(args).is_error())
}

fn isna(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    bool_result(matches!(
        first_value(args),
        Value::Error(e) if e.kind() == ErrorKind::Na
    ))
}

fn isnumber(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    bool_result(matches!(first_value(args), Value::Number(_)))
}

fn istext(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    bool_result(matches!(first_value(args), Value::Text(_)))
}

fn isnontext(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    bool_result(!matches!(first_value(args), Value::Text(_)))
}

fn islogical(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    bool_result(matches!(first_value(args), Value::Bool(_)))
}

fn isref(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let is_ref = args
        .first()
        .map(|a| a.reference.is_some() || a.union.is_some())
        .unwrap_or(false);
    bool_result(is_ref)
}

fn na(_ctx: &FnCtx<'_>, _args: &[Arg]) -> FnResult {
    Ok(Operand::Value(Value::Error(FormulaError::NA)))
}

fn n_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let v = match first_value(args) {
        Value::Number(n) => Value::Number(n),
        Value::Bool(b) => Value::Number(if b { 1.0 } else { 0.0 }),
        Value::Error(e) => Value::Error(e),
        _ => Value::Number(0.0),
    };
    Ok(Operand::Value(v))
}

fn type_fn(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let code = match args.first().map(|a| &a.value) {
        Some(Value::Array(_)) => 64.0,
        Some(Value::Error(_)) => 16.0,
        Some(Value::Bool(_)) => 4.0,
        Some(Value::Text(_)) => 2.0,
        _ => 1.0,
    };
    Ok(Operand::Value(Value::Number(code)))
}
