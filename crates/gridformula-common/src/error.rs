//! Excel-style error representation.
//!
//! - **`ErrorKind`**    : the canonical set of Excel error codes
//! - **`FormulaError`** : a kind plus an optional details string
//!
//! Detail-less errors are available as associated constants
//! (`FormulaError::DIV0`, ...). Equality is structural, so constructing the
//! same code twice yields `==`-equal values; no singleton table is needed.

use std::{error::Error, fmt};

/// All recognised Excel error codes, plus `#ERROR!` for lexer/parser/host
/// failures.
///
/// Names are CamelCase while `Display` renders them exactly as Excel shows
/// them (`#DIV/0!`, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    Na,
    Error,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl ErrorKind {
    /// The `#...!` code as Excel renders it.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Null => "#NULL!",
            Self::Div0 => "#DIV/0!",
            Self::Value => "#VALUE!",
            Self::Ref => "#REF!",
            Self::Name => "#NAME?",
            Self::Num => "#NUM!",
            Self::Na => "#N/A",
            Self::Error => "#ERROR!",
        }
    }

    /// Parse an error code token (`#DIV/0!`, `#N/A`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "#NULL!" => Some(Self::Null),
            "#DIV/0!" => Some(Self::Div0),
            "#VALUE!" => Some(Self::Value),
            "#REF!" => Some(Self::Ref),
            "#NAME?" => Some(Self::Name),
            "#NUM!" => Some(Self::Num),
            "#N/A" => Some(Self::Na),
            "#ERROR!" => Some(Self::Error),
            _ => None,
        }
    }
}

/// The error value that flows through formula evaluation.
///
/// `details` carries the human-readable explanation: syntax errors include a
/// `line:col` location and a caret diagram, host failures the original
/// message. Hosts render the error by its `kind` code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormulaError {
    pub kind: ErrorKind,
    pub details: Option<String>,
}

impl FormulaError {
    pub const NULL: FormulaError = FormulaError::new(ErrorKind::Null);
    pub const DIV0: FormulaError = FormulaError::new(ErrorKind::Div0);
    pub const VALUE: FormulaError = FormulaError::new(ErrorKind::Value);
    pub const REF: FormulaError = FormulaError::new(ErrorKind::Ref);
    pub const NAME: FormulaError = FormulaError::new(ErrorKind::Name);
    pub const NUM: FormulaError = FormulaError::new(ErrorKind::Num);
    pub const NA: FormulaError = FormulaError::new(ErrorKind::Na);
    pub const ERROR: FormulaError = FormulaError::new(ErrorKind::Error);

    /// Basic constructor (no details).
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            details: None,
        }
    }

    /// Attach a human-readable explanation.
    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Code plus details, for logs and diagnostics.
    pub fn verbose(&self) -> String {
        match &self.details {
            Some(d) => format!("{}: {d}", self.kind),
            None => self.kind.to_string(),
        }
    }
}

impl From<ErrorKind> for FormulaError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Renders the bare `#...!` code; hosts display errors this way.
impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Error for FormulaError {}

impl PartialEq<str> for FormulaError {
    fn eq(&self, other: &str) -> bool {
        self.kind.code() == other
    }
}

impl PartialEq<&str> for FormulaError {
    fn eq(&self, other: &&str) -> bool {
        self.kind.code() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_like_excel() {
        assert_eq!(ErrorKind::Div0.to_string(), "#DIV/0!");
        assert_eq!(ErrorKind::Na.to_string(), "#N/A");
        assert_eq!(FormulaError::NAME.to_string(), "#NAME?");
    }

    #[test]
    fn detail_less_errors_are_stable() {
        assert_eq!(FormulaError::DIV0, FormulaError::DIV0);
        assert_eq!(FormulaError::new(ErrorKind::Div0), FormulaError::DIV0);
        assert_ne!(FormulaError::DIV0, FormulaError::VALUE);
    }

    #[test]
    fn details_do_not_change_the_code() {
        let e = FormulaError::REF.with_details("deleted range");
        assert_eq!(e, "#REF!");
        assert_eq!(e.verbose(), "#REF!: deleted range");
    }

    #[test]
    fn parse_round_trips() {
        for kind in [
            ErrorKind::Null,
            ErrorKind::Div0,
            ErrorKind::Value,
            ErrorKind::Ref,
            ErrorKind::Name,
            ErrorKind::Num,
            ErrorKind::Na,
            ErrorKind::Error,
        ] {
            assert_eq!(ErrorKind::parse(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::parse("#BOGUS!"), None);
    }
}
