//! Text built-ins. All positions and lengths are character-based.

use gridformula_common::{FormulaError, Value};

use crate::args::{accept, ValueType};
use crate::dispatch::Operand;
use crate::functions::{Arg, FnAttrs, FnCtx, FnResult, FunctionRegistry};

pub(crate) fn install(reg: &mut FunctionRegistry) {
    let t = FnAttrs::empty();
    reg.builtin_fn("LEN", t, len);
    reg.builtin_fn("UPPER", t, upper);
    reg.builtin_fn("LOWER", t, lower);
    reg.builtin_fn("TRIM", t, trim);
    reg.builtin_fn("LEFT", t, left);
    reg.builtin_fn("RIGHT", t, right);
    reg.builtin_fn("MID", t, mid);
    reg.builtin_fn("CONCATENATE", t, concatenate);
    reg.builtin_fn("EXACT", t, exact);
}

fn text_arg(args: &[Arg], idx: usize) -> Result<String, FormulaError> {
    match accept(args.get(idx), Some(ValueType::Text), None)? {
        Value::Text(s) => Ok(s),
        _ => Err(FormulaError::VALUE),
    }
}

fn count_arg(args: &[Arg], idx: usize, default: f64) -> Result<usize, FormulaError> {
    match accept(args.get(idx), Some(ValueType::Number), Some(Value::Number(default)))? {
        Value::Number(n) if n >= 0.0 => Ok(n.trunc() as usize),
        _ => Err(FormulaError::VALUE.with_details("Lengths must be non-negative")),
    }
}

fn len(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let s = text_arg(args, 0)?;
    Ok(Operand::Value(Value::Number(s.chars().count() as f64)))
}

fn upper(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    Ok(Operand::Value(Value::Text(text_arg(args, 0)?.to_uppercase())))
}

fn lower(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    Ok(Operand::Value(Value::Text(text_arg(args, 0)?.to_lowercase())))
}

/// Excel TRIM: strip ends and collapse interior runs of spaces.
fn trim(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let s = text_arg(args, 0)?;
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok(Operand::Value(Value::Text(collapsed)))
}

fn left(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let s = text_arg(args, 0)?;
    let n = count_arg(args, 1, 1.0)?;
    Ok(Operand::Value(Value::Text(s.chars().take(n).collect())))
}

fn right(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let s = text_arg(args, 0)?;
    let n = count_arg(args, 1, 1.0)?;
    let len = s.chars().count();
    Ok(Operand::Value(Value::Text(
        s.chars().skip(len.saturating_sub(n)).collect(),
    )))
}

fn mid(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let s = text_arg(args, 0)?;
    let start = match accept(args.get(1), Some(ValueType::Number), None)? {
        Value::Number(n) if n >= 1.0 => n.trunc() as usize,
        _ => return Err(FormulaError::VALUE.with_details("MID start is 1-based")),
    };
    let count = count_arg(args, 2, 0.0)?;
    Ok(Operand::Value(Value::Text(
        s.chars().skip(start - 1).take(count).collect(),
    )))
}

fn concatenate(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let mut out = String::new();
    for idx in 0..args.len() {
        out.push_str(&text_arg(args, idx)?);
    }
    Ok(Operand::Value(Value::Text(out)))
}

fn exact(_ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
    let a = text_arg(args, 0)?;
    let b = text_arg(args, 1)?;
    Ok(Operand::Value(Value::Bool(a == b)))
}
