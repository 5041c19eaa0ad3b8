//! gridformula-engine: lexing, parsing and evaluation of Excel-dialect
//! formulas over a host-provided grid.
//!
//! The parser evaluates as it descends; there is no persistent AST. Two
//! front doors share the recursion:
//!
//! - [`FormulaEngine`] computes a [`Value`] for a formula, resolving cells,
//!   ranges and names through a [`GridHost`].
//! - [`DependencyParser`] runs the same grammar against a recording backend
//!   and returns the references a formula touches, without computing.

pub mod args;
pub mod criteria;
pub mod dep;
pub mod dispatch;
pub mod engine;
pub mod functions;
pub mod operators;
pub mod parser;
pub mod test_grid;
pub mod tokenizer;
pub mod traits;

pub use dep::DependencyParser;
pub use dispatch::Operand;
pub use engine::FormulaEngine;
pub use functions::{Arg, FnAttrs, FnCtx, FunctionRegistry};
pub use test_grid::TestGrid;
pub use traits::{CellPos, GridHost, NoHost};

pub use gridformula_common::{
    address, CellRef, Collection, ErrorKind, FormulaError, RangeRef, Reference, Value, MAX_COLUMN,
    MAX_ROW,
};
