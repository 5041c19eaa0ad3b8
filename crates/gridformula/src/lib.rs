//! Meta crate re-exporting the gridformula public surface: the evaluating
//! engine, the dependency parser, the value/reference/error vocabulary and
//! the helper modules.
//!
//! ```
//! use gridformula::{FormulaEngine, TestGrid, Value};
//!
//! let grid = TestGrid::new().with_cell_a1("Sheet1", "A1", Value::Number(40.0));
//! let engine = FormulaEngine::new(grid);
//! assert_eq!(engine.parse("=A1+2", None, false), Value::Number(42.0));
//! ```

pub use gridformula_common::{
    address, CellRef, Collection, ErrorKind, FormulaError, RangeRef, Reference, Value, MAX_COLUMN,
    MAX_ROW,
};

pub use gridformula_engine::{
    args, criteria, Arg, CellPos, DependencyParser, FnAttrs, FnCtx, FormulaEngine,
    FunctionRegistry, GridHost, NoHost, Operand, TestGrid,
};
