//! End-to-end evaluation scenarios over an in-memory grid.

use gridformula_engine::{
    CellPos, CellRef, DependencyParser, ErrorKind, FormulaEngine, FormulaError, RangeRef,
    Reference, TestGrid, Value,
};

fn n(v: f64) -> Value {
    Value::Number(v)
}

fn t(s: &str) -> Value {
    Value::Text(s.into())
}

#[test]
fn division_by_zero() {
    let engine = FormulaEngine::new(TestGrid::new());
    assert_eq!(engine.parse("=1/0", None, false), Value::Error(FormulaError::DIV0));
}

#[test]
fn concat_serializes_booleans() {
    let engine = FormulaEngine::new(TestGrid::new());
    assert_eq!(engine.parse("=\"abc\"&TRUE", None, false), t("abcTRUE"));
}

#[test]
fn sum_coerces_literal_strings() {
    let engine = FormulaEngine::new(TestGrid::new());
    assert_eq!(engine.parse("=SUM(1,2,3,\"4\")", None, false), n(10.0));
}

#[test]
fn sum_over_a_range() {
    let grid = TestGrid::new().with_range(
        "Sheet1",
        1,
        1,
        vec![vec![n(1.0), n(2.0)], vec![n(3.0), n(4.0)]],
    );
    let engine = FormulaEngine::new(grid);
    assert_eq!(engine.parse("=SUM(A1:B2)", None, false), n(10.0));
}

#[test]
fn intersection_delivers_the_overlap() {
    // A1:C3 and B2:D4 overlap in B2:C3; every overlap cell holds 10.
    let grid = TestGrid::new()
        .with_cell_a1("Sheet1", "B2", n(10.0))
        .with_cell_a1("Sheet1", "B3", n(10.0))
        .with_cell_a1("Sheet1", "C2", n(10.0))
        .with_cell_a1("Sheet1", "C3", n(10.0));
    let engine = FormulaEngine::new(grid);
    assert_eq!(engine.parse("=A1:C3 B2:D4", None, false), n(10.0));
    assert_eq!(engine.parse("=SUM(A1:C3 B2:D4)", None, false), n(40.0));
}

#[test]
fn disjoint_intersection_is_null() {
    let engine = FormulaEngine::new(TestGrid::new());
    assert_eq!(
        engine.parse("=A1:B2 C3:D4", None, false),
        Value::Error(FormulaError::NULL)
    );
}

#[test]
fn unions_flatten_through_sum() {
    let grid = TestGrid::new()
        .with_cell_a1("Sheet1", "A1", n(1.0))
        .with_cell_a1("Sheet1", "C3", n(2.0));
    let engine = FormulaEngine::new(grid);
    assert_eq!(engine.parse("=SUM((A1,C3))", None, false), n(3.0));
    // A bare union is only valid as an argument.
    assert_eq!(
        engine
            .parse("=(A1,C3)", None, false)
            .as_error()
            .map(|e| e.kind()),
        Some(ErrorKind::Value)
    );
}

#[test]
fn quoted_sheet_references() {
    let grid = TestGrid::new().with_cell_a1("My Sheet", "A1", n(5.0));
    let engine = FormulaEngine::new(grid);
    assert_eq!(engine.parse("='My Sheet'!A1 + 2", None, false), n(7.0));
}

#[test]
fn if_with_cell_condition() {
    let grid = TestGrid::new().with_cell_a1("Sheet1", "A1", n(-3.0));
    let engine = FormulaEngine::new(grid);
    assert_eq!(
        engine.parse("=IF(A1>0,\"pos\",\"nonpos\")", None, false),
        t("nonpos")
    );
}

#[test]
fn trailing_operator_reports_caret_position() {
    let engine = FormulaEngine::new(TestGrid::new());
    let v = engine.parse("=1+", None, false);
    let err = v.as_error().expect("syntax error expected");
    assert_eq!(err.kind(), ErrorKind::Error);
    let details = err.details().expect("details expected");
    assert!(details.contains("1:3"), "details: {details}");
    assert!(details.contains('^'), "details: {details}");
}

#[test]
fn dependencies_for_mixed_formula() {
    let pos = CellPos::on_sheet("Sheet1", 1, 1);
    let deps = DependencyParser::new()
        .parse("=A1+Sheet2!B2:C3", &pos, false)
        .unwrap();
    assert_eq!(
        deps,
        vec![
            Reference::Cell(CellRef::new(1, 1).with_sheet("Sheet1")),
            Reference::Range(
                RangeRef::new(Some(2), Some(2), Some(3), Some(3)).with_sheet("Sheet2")
            ),
        ]
    );
}

#[test]
fn whole_column_aggregates() {
    let grid = TestGrid::new()
        .with_cell_a1("Sheet1", "A1", n(1.0))
        .with_cell_a1("Sheet1", "A5", n(9.0));
    let engine = FormulaEngine::new(grid);
    assert_eq!(engine.parse("=SUM(A:A)", None, false), n(10.0));
    assert_eq!(engine.parse("=SUM(1:1)", None, false), n(1.0));
}

#[test]
fn row_number_promotion_in_ranges() {
    let grid = TestGrid::new()
        .with_cell_a1("Sheet1", "B1", n(2.0))
        .with_cell_a1("Sheet1", "C2", n(3.0));
    let engine = FormulaEngine::new(grid);
    assert_eq!(engine.parse("=SUM(1:2)", None, false), n(5.0));
}

#[test]
fn array_results_stay_arrays_when_allowed() {
    let engine = FormulaEngine::new(TestGrid::new());
    assert_eq!(
        engine.parse("={1,2;3,4}", None, true),
        Value::Array(vec![vec![n(1.0), n(2.0)], vec![n(3.0), n(4.0)]])
    );
    // Without allow_return_array the top-left element stands in.
    assert_eq!(engine.parse("={1,2;3,4}", None, false), n(1.0));
}

#[test]
fn range_results_collapse_when_arrays_are_disallowed() {
    let grid = TestGrid::new().with_range(
        "Sheet1",
        1,
        1,
        vec![vec![n(1.0), n(2.0)], vec![n(3.0), n(4.0)]],
    );
    let engine = FormulaEngine::new(grid);
    // Columns collapse: the top cell stands in.
    assert_eq!(engine.parse("=A1:A2", None, false), n(1.0));
    assert_eq!(
        engine.parse("=A1:B2", None, true),
        Value::Array(vec![vec![n(1.0), n(2.0)], vec![n(3.0), n(4.0)]])
    );
}

#[test]
fn variables_resolve_through_the_host() {
    let grid = TestGrid::new()
        .with_cell_a1("Sheet1", "J10", n(99.0))
        .with_variable("total", Reference::Cell(CellRef::new(10, 10)));
    let engine = FormulaEngine::new(grid);
    assert_eq!(engine.parse("=total+1", None, false), n(100.0));
    let v = engine.parse("=missing_name+1", None, false);
    assert_eq!(v.as_error().map(|e| e.kind()), Some(ErrorKind::Name));
}

#[test]
fn adjacent_atoms_without_whitespace_are_syntax_errors() {
    let engine = FormulaEngine::new(TestGrid::new());
    let v = engine.parse("=(1)(2)", None, false);
    assert_eq!(v.as_error().map(|e| e.kind()), Some(ErrorKind::Error));
    let v = engine.parse("=\"a\"5", None, false);
    assert_eq!(v.as_error().map(|e| e.kind()), Some(ErrorKind::Error));
    // With whitespace the same shape becomes an (invalid) intersection.
    let v = engine.parse("=(1) (2)", None, false);
    assert_eq!(v.as_error().map(|e| e.kind()), Some(ErrorKind::Value));
}

#[test]
fn cell_followed_by_paren_is_a_function_lookup() {
    // Function wins the longest-match tie, so `A1(` names a function.
    let engine = FormulaEngine::new(TestGrid::new());
    let v = engine.parse("=A1(B2)", None, false);
    assert_eq!(v.as_error().map(|e| e.kind()), Some(ErrorKind::Name));
}

#[test]
fn errors_flow_through_function_arguments() {
    let engine = FormulaEngine::new(TestGrid::new());
    // The error is captured into the argument list, not short-circuited.
    assert_eq!(engine.parse("=ISERROR(1/0)", None, false), Value::Bool(true));
    assert_eq!(engine.parse("=IFERROR(#REF!,7)", None, false), n(7.0));
    assert_eq!(
        engine.parse("=SUM(1/0,1)", None, false),
        Value::Error(FormulaError::DIV0)
    );
}

#[test]
fn out_of_grid_cells_read_as_names() {
    let engine = FormulaEngine::new(TestGrid::new());
    let v = engine.parse("=A1048577", None, false);
    assert_eq!(v.as_error().map(|e| e.kind()), Some(ErrorKind::Name));
}

#[test]
fn percent_and_nested_calls() {
    let engine = FormulaEngine::new(TestGrid::new());
    assert_eq!(engine.parse("=50%", None, false), n(0.5));
    assert_eq!(engine.parse("=-50%", None, false), n(-0.5));
    assert_eq!(engine.parse("=ROUND(SUM(1.2,2.3),0)", None, false), n(4.0));
}
