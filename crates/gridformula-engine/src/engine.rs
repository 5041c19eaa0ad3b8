//! The evaluating engine.
//!
//! Holds the host and the function registry; everything else is
//! per-evaluation state inside the parser session. The probe log gives the
//! engine interior mutability, which keeps it `!Sync` — concurrent parses on
//! one instance are ruled out by the type system.

use std::cell::RefCell;

use gridformula_common::{CellRef, FormulaError, RangeRef, Value};

use crate::dispatch::{check_result, Operand};
use crate::functions::{shape_args, Arg, FnAttrs, FnCtx, FnResult, FunctionRegistry};
use crate::parser::Session;
use crate::traits::{Backend, CellPos, GridHost};

pub struct FormulaEngine {
    host: Box<dyn GridHost>,
    registry: FunctionRegistry,
    /// `Some` in probe mode: unknown function names land here and calls to
    /// them evaluate to `0`.
    probe_log: Option<RefCell<Vec<String>>>,
}

impl FormulaEngine {
    /// Engine with the built-in function library installed.
    pub fn new(host: impl GridHost + 'static) -> Self {
        FormulaEngine {
            host: Box::new(host),
            registry: FunctionRegistry::builtin(),
            probe_log: None,
        }
    }

    /// Compatibility-probe engine: unknown functions evaluate to `0` and
    /// their names are recorded instead of raising `#NAME?`.
    pub fn probe(host: impl GridHost + 'static) -> Self {
        FormulaEngine {
            host: Box::new(host),
            registry: FunctionRegistry::builtin(),
            probe_log: Some(RefCell::new(Vec::new())),
        }
    }

    /// Register a plain user function.
    pub fn with_function<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[Arg]) -> Result<Value, FormulaError> + Send + Sync + 'static,
    {
        self.registry.register(name, FnAttrs::empty(), move |_ctx, args| {
            f(args).map(Operand::Value)
        });
        self
    }

    /// Register a context-taking user function; it may re-enter the engine
    /// through the context and return references.
    pub fn with_ctx_function<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&FnCtx<'_>, &[Arg]) -> FnResult + Send + Sync + 'static,
    {
        self.registry
            .register(name, FnAttrs::NEEDS_CONTEXT, f);
        self
    }

    /// Registry access for registrations that need explicit attributes.
    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    /// Evaluate a formula. A leading `=` is accepted and skipped.
    ///
    /// Never panics on formula input: lexer, parser and host failures all
    /// come back as `Value::Error` (empty input included, as `#ERROR!`).
    /// `allow_return_array` keeps range/array results two-dimensional
    /// instead of collapsing them to a single cell.
    pub fn parse(
        &self,
        formula: &str,
        position: Option<&CellPos>,
        allow_return_array: bool,
    ) -> Value {
        match Session::run(formula, self, position) {
            Ok(operand) => check_result(self, operand, allow_return_array, position),
            Err(e) => Value::Error(e),
        }
    }

    /// Async twin of [`parse`](Self::parse).
    ///
    /// The engine has one synchronous core; host capabilities are
    /// synchronous traits, so this wrapper awaits nothing today but keeps
    /// the public contract awaitable.
    pub async fn parse_async(
        &self,
        formula: &str,
        position: Option<&CellPos>,
        allow_return_array: bool,
    ) -> Value {
        self.parse(formula, position, allow_return_array)
    }

    /// Unknown function names seen so far, in probe mode. Empty otherwise.
    pub fn unknown_functions(&self) -> Vec<String> {
        self.probe_log
            .as_ref()
            .map(|log| log.borrow().clone())
            .unwrap_or_default()
    }
}

impl Backend for FormulaEngine {
    fn cell_value(&self, cell: &CellRef) -> Value {
        match self.host.cell(cell) {
            Ok(v) => v,
            Err(e) => Value::Error(e),
        }
    }

    fn range_value(&self, range: &RangeRef) -> Value {
        match self.host.range(range) {
            Ok(rows) => {
                if !Value::is_rectangular(&rows) {
                    return Value::Error(
                        FormulaError::ERROR.with_details("Host returned a ragged range"),
                    );
                }
                Value::Array(rows)
            }
            Err(e) => Value::Error(e),
        }
    }

    fn variable_ref(
        &self,
        name: &str,
        sheet: Option<&str>,
        position: Option<&CellPos>,
    ) -> Operand {
        match self.host.variable(name, sheet, position) {
            Some(reference) => Operand::Ref(reference),
            None => Operand::error(
                FormulaError::NAME.with_details(format!("Unknown name '{name}'")),
            ),
        }
    }

    fn call_function(
        &self,
        name: &str,
        args: Vec<Operand>,
        position: Option<&CellPos>,
    ) -> Operand {
        let Some(def) = self.registry.get(name) else {
            if let Some(log) = &self.probe_log {
                log.borrow_mut().push(name.to_string());
                return Operand::Value(Value::Number(0.0));
            }
            return Operand::error(
                FormulaError::NAME.with_details(format!("Function {name} is not implemented.")),
            );
        };
        let ctx = FnCtx::new(self, position);
        let shaped = shape_args(args, def.attrs(), &ctx);
        match def.invoke(&ctx, &shaped) {
            Ok(operand) => operand,
            // A raised FormulaError becomes the call's value.
            Err(e) => Operand::error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_grid::TestGrid;
    use gridformula_common::ErrorKind;

    #[test]
    fn probe_mode_stubs_unknown_functions() {
        let engine = FormulaEngine::probe(TestGrid::new());
        assert_eq!(engine.parse("=MYSTERY(1,2)+5", None, false), Value::Number(5.0));
        assert_eq!(engine.unknown_functions(), vec!["MYSTERY".to_string()]);
    }

    #[test]
    fn unknown_function_raises_name_error() {
        let engine = FormulaEngine::new(TestGrid::new());
        let v = engine.parse("=MYSTERY(1)", None, false);
        let err = v.as_error().expect("should be an error");
        assert_eq!(err.kind(), ErrorKind::Name);
        assert_eq!(
            err.details(),
            Some("Function MYSTERY is not implemented.")
        );
    }

    #[test]
    fn xlfn_prefix_is_stripped() {
        let engine = FormulaEngine::new(TestGrid::new());
        assert_eq!(engine.parse("=_xlfn.SUM(1,2)", None, false), Value::Number(3.0));
    }

    #[test]
    fn empty_input_is_an_error_value() {
        let engine = FormulaEngine::new(TestGrid::new());
        assert_eq!(
            engine.parse("", None, false).as_error().map(|e| e.kind()),
            Some(ErrorKind::Error)
        );
        assert_eq!(
            engine.parse("=", None, false).as_error().map(|e| e.kind()),
            Some(ErrorKind::Error)
        );
    }

    #[test]
    fn parse_async_matches_sync() {
        let engine = FormulaEngine::new(TestGrid::new());
        let fut = engine.parse_async("=1+2*3", None, false);
        assert_eq!(block_on_ready(fut), Value::Number(7.0));
    }

    /// Poll a ready future once; the async wrapper never actually suspends.
    fn block_on_ready<F: std::future::Future>(fut: F) -> F::Output {
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn noop_raw() -> RawWaker {
            fn clone(_: *const ()) -> RawWaker {
                noop_raw()
            }
            fn noop(_: *const ()) {}
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
            RawWaker::new(std::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(noop_raw()) };
        let mut cx = Context::from_waker(&waker);
        let mut fut = std::pin::pin!(fut);
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(v) => v,
            Poll::Pending => unreachable!("the engine's async wrapper is immediately ready"),
        }
    }
}
