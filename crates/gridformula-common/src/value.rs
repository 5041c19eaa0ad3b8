//! The runtime value model.
//!
//! `Value` is what a formula produces and what hosts store in cells. The
//! engine-internal shapes (references, unions, omitted arguments) live in
//! the engine crate; an error is never silently wrapped inside an array.

use std::fmt;

use crate::FormulaError;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// An empty cell or the result of referencing one.
    Blank,
    Number(f64),
    Bool(bool),
    Text(String),
    /// Rectangular 2-D block; every row has the same length >= 1.
    Array(Vec<Vec<Value>>),
    Error(FormulaError),
}

impl Value {
    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Blank)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_error(&self) -> Option<&FormulaError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// `(rows, cols)` of an array value; scalars are 1x1.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Value::Array(rows) => (rows.len(), rows.first().map_or(0, Vec::len)),
            _ => (1, 1),
        }
    }

    /// Top-left element of an array, or the value itself.
    pub fn first(&self) -> &Value {
        static BLANK: Value = Value::Blank;
        match self {
            Value::Array(rows) => rows.first().and_then(|r| r.first()).unwrap_or(&BLANK),
            other => other,
        }
    }

    /// Collapse an array to its top-left element, passing scalars through.
    pub fn into_scalar(self) -> Value {
        match self {
            Value::Array(rows) => rows
                .into_iter()
                .next()
                .and_then(|r| r.into_iter().next())
                .unwrap_or(Value::Blank),
            other => other,
        }
    }

    /// Whether a 2-D block satisfies the array invariant (rectangular, >= 1x1).
    pub fn is_rectangular(rows: &[Vec<Value>]) -> bool {
        match rows.first() {
            None => false,
            Some(first) => !first.is_empty() && rows.iter().all(|r| r.len() == first.len()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<FormulaError> for Value {
    fn from(e: FormulaError) -> Self {
        Value::Error(e)
    }
}

/// Excel-facing rendering: booleans as `TRUE`/`FALSE`, blanks as empty text,
/// errors by their code.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Blank => Ok(()),
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Text(s) => f.write_str(s),
            Value::Error(e) => write!(f, "{e}"),
            Value::Array(rows) => {
                f.write_str("{")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    for (j, cell) in row.iter().enumerate() {
                        if j > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{cell}")?;
                    }
                }
                f.write_str("}")
            }
        }
    }
}
