//! Function-call protocol: attribute flags, argument shaping, the registry,
//! and the built-in families.

pub mod info;
pub mod logical;
pub mod math;
pub mod reference_fns;
pub mod stats;
pub mod text;

use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use gridformula_common::{Collection, FormulaError, Reference, Value};

use crate::dispatch::{retrieve_ref, stamp, Operand};
use crate::traits::{Backend, CellPos};

bitflags! {
    /// Per-function protocol flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FnAttrs: u8 {
        /// Omitted arguments arrive as `0` instead of `""`.
        const NULL_AS_ZERO  = 0b0001;
        /// Information family: guaranteed to see the raw reference of every
        /// reference argument alongside its value.
        const PRESERVE_REF  = 0b0010;
        /// Receives the evaluation context and may re-enter the engine.
        const NEEDS_CONTEXT = 0b0100;
        /// Reference arguments are not read through the host at all; the
        /// function works on the raw references.
        const NO_DEREF      = 0b1000;
    }
}

/// A shaped function argument.
///
/// `value` is the dereferenced payload unless the function is `NO_DEREF`
/// (then `resolved` is false and the reference has not been read).
/// `reference` is populated only for `PRESERVE_REF` and `NO_DEREF`
/// functions; everything else sees just the value plus the shape flags.
/// `omitted` marks holes in the argument list, already substituted with the
/// family default (`0` or `""`).
#[derive(Debug, Clone)]
pub struct Arg {
    pub value: Value,
    pub reference: Option<Reference>,
    pub union: Option<Collection>,
    pub is_array: bool,
    pub is_cell_ref: bool,
    pub is_range_ref: bool,
    pub omitted: bool,
    /// Whether `value` already holds the dereferenced data.
    pub resolved: bool,
}

impl Arg {
    /// A plain literal argument; handy for tests and user functions.
    pub fn from_value(value: Value) -> Self {
        Arg {
            is_array: matches!(value, Value::Array(_)),
            value,
            reference: None,
            union: None,
            is_cell_ref: false,
            is_range_ref: false,
            omitted: false,
            resolved: true,
        }
    }

    pub fn is_literal(&self) -> bool {
        !self.is_cell_ref && !self.is_range_ref && self.union.is_none() && !self.omitted
    }

    /// The error inside this argument's value, if any.
    pub fn as_error(&self) -> Option<&FormulaError> {
        self.value.as_error()
    }
}

/// Evaluation context handed to context functions. Allows reading through
/// references (`SUMIF`, `OFFSET`) and re-entering reference parsing
/// (`INDIRECT`), and exposes the formula's grid position.
pub struct FnCtx<'a> {
    pub(crate) backend: &'a dyn Backend,
    pub position: Option<&'a CellPos>,
}

impl<'a> FnCtx<'a> {
    pub(crate) fn new(backend: &'a dyn Backend, position: Option<&'a CellPos>) -> Self {
        FnCtx { backend, position }
    }

    /// Read a reference through the host: cells give scalars, ranges give
    /// rectangular arrays.
    pub fn retrieve(&self, reference: &Reference) -> Value {
        retrieve_ref(self.backend, reference, self.position)
    }

    /// Value of an argument, reading through its reference if it has not
    /// been resolved yet.
    pub fn dereference(&self, arg: &Arg) -> Value {
        if arg.union.is_some() {
            return Value::Error(
                FormulaError::VALUE.with_details("Union is only valid as an argument"),
            );
        }
        match (&arg.reference, arg.resolved) {
            (Some(r), false) => self.retrieve(r),
            _ => arg.value.clone(),
        }
    }
}

/// What a function returns: usually a value, but reference functions
/// (`INDEX`, `OFFSET`, `INDIRECT`) hand back references that flow on into
/// the reference algebra.
pub type FnResult = Result<Operand, FormulaError>;

type BuiltinFn = fn(&FnCtx<'_>, &[Arg]) -> FnResult;
type UserFn = Arc<dyn Fn(&FnCtx<'_>, &[Arg]) -> FnResult + Send + Sync>;

#[derive(Clone)]
enum FnImpl {
    Builtin(BuiltinFn),
    User(UserFn),
}

/// A registered function: its implementation plus protocol flags.
#[derive(Clone)]
pub struct FunctionDef {
    attrs: FnAttrs,
    call: FnImpl,
}

impl FunctionDef {
    pub fn attrs(&self) -> FnAttrs {
        self.attrs
    }

    pub(crate) fn invoke(&self, ctx: &FnCtx<'_>, args: &[Arg]) -> FnResult {
        match &self.call {
            FnImpl::Builtin(f) => f(ctx, args),
            FnImpl::User(f) => f(ctx, args),
        }
    }
}

/// Case-insensitive function registry, installed at engine construction and
/// read-only afterwards.
pub struct FunctionRegistry {
    map: FxHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Registry with every built-in family installed.
    pub fn builtin() -> Self {
        let mut reg = FunctionRegistry {
            map: FxHashMap::default(),
        };
        math::install(&mut reg);
        stats::install(&mut reg);
        logical::install(&mut reg);
        info::install(&mut reg);
        reference_fns::install(&mut reg);
        text::install(&mut reg);
        reg
    }

    /// An empty registry (no built-ins).
    pub fn empty() -> Self {
        FunctionRegistry {
            map: FxHashMap::default(),
        }
    }

    pub(crate) fn builtin_fn(&mut self, name: &str, attrs: FnAttrs, f: BuiltinFn) {
        self.map.insert(
            name.to_uppercase(),
            FunctionDef {
                attrs,
                call: FnImpl::Builtin(f),
            },
        );
    }

    /// Register a user function with explicit attributes.
    pub fn register<F>(&mut self, name: &str, attrs: FnAttrs, f: F)
    where
        F: Fn(&FnCtx<'_>, &[Arg]) -> FnResult + Send + Sync + 'static,
    {
        self.map.insert(
            name.to_uppercase(),
            FunctionDef {
                attrs,
                call: FnImpl::User(Arc::new(f)),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.map.get(&name.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Shape raw operands into `Arg`s per the protocol:
/// omitted holes become `0`/`""`, references are stamped with the current
/// sheet and (unless `NO_DEREF`) read through the host, unions pass through
/// for the few functions that flatten them. Only `PRESERVE_REF` and
/// `NO_DEREF` functions see the raw reference; all others get the
/// dereferenced value plus the shape flags.
pub(crate) fn shape_args(
    raw: Vec<Operand>,
    attrs: FnAttrs,
    ctx: &FnCtx<'_>,
) -> Vec<Arg> {
    raw.into_iter()
        .map(|operand| match operand {
            Operand::Omitted => Arg {
                value: if attrs.contains(FnAttrs::NULL_AS_ZERO) {
                    Value::Number(0.0)
                } else {
                    Value::Text(String::new())
                },
                reference: None,
                union: None,
                is_array: false,
                is_cell_ref: false,
                is_range_ref: false,
                omitted: true,
                resolved: true,
            },
            Operand::Value(v) => Arg::from_value(v),
            Operand::Union(c) => Arg {
                value: Value::Blank,
                reference: None,
                union: Some(c),
                is_array: false,
                is_cell_ref: false,
                is_range_ref: false,
                omitted: false,
                resolved: true,
            },
            Operand::Ref(r) => {
                let stamped = stamp(&r, ctx.position);
                let is_cell_ref = matches!(stamped, Reference::Cell(_));
                let is_range_ref = !is_cell_ref;
                if attrs.contains(FnAttrs::NO_DEREF) {
                    Arg {
                        value: Value::Blank,
                        reference: Some(stamped),
                        union: None,
                        is_array: false,
                        is_cell_ref,
                        is_range_ref,
                        omitted: false,
                        resolved: false,
                    }
                } else {
                    let value = ctx.retrieve(&stamped);
                    let reference = attrs
                        .contains(FnAttrs::PRESERVE_REF)
                        .then_some(stamped);
                    Arg {
                        is_array: is_range_ref || matches!(value, Value::Array(_)),
                        value,
                        reference,
                        union: None,
                        is_cell_ref,
                        is_range_ref,
                        omitted: false,
                        resolved: true,
                    }
                }
            }
        })
        .collect()
}
