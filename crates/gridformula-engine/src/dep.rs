//! Dependency mode: run the same parser recursion against a recording
//! backend and report which references a formula touches, without computing
//! anything.
//!
//! Retrievals return stubs (`0` / `[[0]]`), every function call is replaced
//! by "resolve the arguments, return 0", and recorded references are
//! deduplicated: exact repeats and cells inside an already-recorded range
//! are skipped.

use std::cell::RefCell;

use gridformula_common::{CellRef, FormulaError, RangeRef, Reference, Value};

use crate::dispatch::{check_result, extract_ref_value, Operand};
use crate::parser::Session;
use crate::traits::{Backend, CellPos};

type VariableResolver =
    dyn Fn(&str, Option<&str>, Option<&CellPos>) -> Option<Reference> + Send + Sync;

/// Extracts the references a single formula depends on.
#[derive(Default)]
pub struct DependencyParser {
    resolver: Option<Box<VariableResolver>>,
}

impl DependencyParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve defined names through a callback; names it resolves are
    /// recorded as dependencies too.
    pub fn with_variable_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Option<&str>, Option<&CellPos>) -> Option<Reference> + Send + Sync + 'static,
    {
        self.resolver = Some(Box::new(f));
        self
    }

    /// References the formula touches, in discovery order, deduplicated.
    ///
    /// With `ignore_error`, malformed input yields whatever was collected
    /// before the failure instead of the syntax error.
    pub fn parse(
        &self,
        formula: &str,
        position: &CellPos,
        ignore_error: bool,
    ) -> Result<Vec<Reference>, FormulaError> {
        let collector = Collector {
            resolver: self.resolver.as_deref(),
            refs: RefCell::new(Vec::new()),
        };
        match Session::run(formula, &collector, Some(position)) {
            Ok(operand) => {
                // Resolve a trailing bare reference so it is recorded too.
                let _ = check_result(&collector, operand, true, Some(position));
                Ok(collector.refs.into_inner())
            }
            Err(_) if ignore_error => Ok(collector.refs.into_inner()),
            Err(e) => Err(e),
        }
    }
}

struct Collector<'a> {
    resolver: Option<&'a VariableResolver>,
    refs: RefCell<Vec<Reference>>,
}

impl Collector<'_> {
    fn record(&self, reference: Reference) {
        let mut refs = self.refs.borrow_mut();
        if refs.contains(&reference) {
            return;
        }
        if let Reference::Cell(cell) = &reference {
            let covered = refs.iter().any(|existing| match existing {
                Reference::Range(range) => range.contains(cell),
                Reference::Cell(_) => false,
            });
            if covered {
                return;
            }
        }
        refs.push(reference);
    }
}

impl Backend for Collector<'_> {
    fn cell_value(&self, cell: &CellRef) -> Value {
        self.record(Reference::Cell(cell.clone()));
        Value::Number(0.0)
    }

    fn range_value(&self, range: &RangeRef) -> Value {
        self.record(Reference::Range(range.clone()));
        Value::Array(vec![vec![Value::Number(0.0)]])
    }

    fn variable_ref(
        &self,
        name: &str,
        sheet: Option<&str>,
        position: Option<&CellPos>,
    ) -> Operand {
        if let Some(resolver) = self.resolver {
            if let Some(reference) = resolver(name, sheet, position) {
                let stamped = reference
                    .with_default_sheet(position.and_then(|p| p.sheet.as_deref()));
                self.record(stamped);
            }
        }
        Operand::Value(Value::Number(0.0))
    }

    fn call_function(
        &self,
        _name: &str,
        args: Vec<Operand>,
        position: Option<&CellPos>,
    ) -> Operand {
        // Traverse every argument so referenced ranges are recorded.
        for arg in &args {
            let _ = extract_ref_value(self, arg, position);
        }
        Operand::Value(Value::Number(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> CellPos {
        CellPos::on_sheet("Sheet1", 1, 1)
    }

    fn cell(sheet: &str, row: u32, col: u32) -> Reference {
        Reference::Cell(CellRef::new(row, col).with_sheet(sheet))
    }

    #[test]
    fn records_cells_and_ranges() {
        let deps = DependencyParser::new()
            .parse("=A1+Sheet2!B2:C3", &pos(), false)
            .unwrap();
        assert_eq!(
            deps,
            vec![
                cell("Sheet1", 1, 1),
                Reference::Range(
                    RangeRef::new(Some(2), Some(2), Some(3), Some(3)).with_sheet("Sheet2")
                ),
            ]
        );
    }

    #[test]
    fn dedupes_exact_repeats() {
        let deps = DependencyParser::new().parse("=A1+A1", &pos(), false).unwrap();
        assert_eq!(deps, vec![cell("Sheet1", 1, 1)]);
    }

    #[test]
    fn dedupes_cells_covered_by_ranges() {
        // SUM's range is recorded during parsing, before the infix fold
        // resolves the bare cells; both cells then fall inside it.
        let deps = DependencyParser::new()
            .parse("=SUM(A1:B2)+A1+B2", &pos(), false)
            .unwrap();
        assert_eq!(
            deps,
            vec![Reference::Range(
                RangeRef::new(Some(1), Some(1), Some(2), Some(2)).with_sheet("Sheet1")
            )]
        );
    }

    #[test]
    fn traverses_function_arguments_and_unions() {
        let deps = DependencyParser::new()
            .parse("=WHATEVER((C1,D4),B9)", &pos(), false)
            .unwrap();
        assert_eq!(
            deps,
            vec![
                cell("Sheet1", 1, 3),
                cell("Sheet1", 4, 4),
                cell("Sheet1", 9, 2),
            ]
        );
    }

    #[test]
    fn variables_resolve_through_the_callback() {
        let parser = DependencyParser::new().with_variable_resolver(|name, _sheet, _pos| {
            (name == "total").then(|| Reference::Cell(CellRef::new(10, 1)))
        });
        let deps = parser.parse("=total*2+unknown", &pos(), false).unwrap();
        assert_eq!(deps, vec![cell("Sheet1", 10, 1)]);
    }

    #[test]
    fn ignore_error_returns_partial_results() {
        let parser = DependencyParser::new();
        assert!(parser.parse("=SUM(A1:B2)+", &pos(), false).is_err());
        let deps = parser.parse("=SUM(A1:B2)+", &pos(), true).unwrap();
        assert_eq!(
            deps,
            vec![Reference::Range(
                RangeRef::new(Some(1), Some(1), Some(2), Some(2)).with_sheet("Sheet1")
            )]
        );
    }

    #[test]
    fn bare_reference_is_recorded() {
        let deps = DependencyParser::new().parse("=B7", &pos(), false).unwrap();
        assert_eq!(deps, vec![cell("Sheet1", 7, 2)]);
    }
}
