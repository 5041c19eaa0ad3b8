//! Criteria strings for the `*IF` family, and Excel wildcard patterns.
//!
//! A criteria is an optional comparison prefix (`=`, `<>`, `<=`, `>=`, `<`,
//! `>`) followed by a literal: `TRUE`/`FALSE` parse as booleans, `#...!`
//! codes as errors, numeric text as numbers, anything else as text. Text
//! under `=`/`<>` with unescaped wildcards matches as a pattern.

use regex::Regex;

use gridformula_common::{ErrorKind, FormulaError, Value};

pub mod wildcard {
    //! `*` matches any run, `?` any single character; `~*`, `~?` and `~~`
    //! escape the literals. Compiled to an anchored, case-insensitive regex.

    use super::*;

    /// Whether the pattern contains an unescaped `*` or `?`.
    pub fn has_wildcard(pattern: &str) -> bool {
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '~' => {
                    // Escapes the next character.
                    chars.next();
                }
                '*' | '?' => return true,
                _ => {}
            }
        }
        false
    }

    /// Compile a wildcard pattern into an anchored case-insensitive regex.
    pub fn to_regex(pattern: &str) -> Result<Regex, FormulaError> {
        let mut out = String::with_capacity(pattern.len() + 8);
        out.push_str("(?i)^");
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '*' => out.push_str(".*"),
                '?' => out.push('.'),
                '~' => {
                    if let Some(next) = chars.next() {
                        out.push_str(&regex::escape(&next.to_string()));
                    }
                }
                other => out.push_str(&regex::escape(&other.to_string())),
            }
        }
        out.push('$');
        Regex::new(&out)
            .map_err(|e| FormulaError::new(ErrorKind::Value).with_details(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
enum Target {
    Number(f64),
    Bool(bool),
    Error(FormulaError),
    Text(String),
    Pattern(Regex),
}

/// A parsed criteria, ready to test cell values.
#[derive(Debug, Clone)]
pub struct Criteria {
    op: CmpOp,
    target: Target,
}

impl Criteria {
    /// Parse a criteria string like `">=10"`, `"<>done"`, `"a*"`.
    pub fn parse(text: &str) -> Self {
        let (op, rest) = split_op(text);
        let target = if rest.eq_ignore_ascii_case("TRUE") {
            Target::Bool(true)
        } else if rest.eq_ignore_ascii_case("FALSE") {
            Target::Bool(false)
        } else if let Some(kind) = rest.starts_with('#').then(|| ErrorKind::parse(rest)).flatten()
        {
            Target::Error(FormulaError::new(kind))
        } else if let Ok(n) = rest.trim().parse::<f64>() {
            Target::Number(n)
        } else if matches!(op, CmpOp::Eq | CmpOp::Ne) && wildcard::has_wildcard(rest) {
            match wildcard::to_regex(rest) {
                Ok(re) => Target::Pattern(re),
                Err(_) => Target::Text(rest.to_string()),
            }
        } else {
            Target::Text(rest.to_string())
        };
        Criteria { op, target }
    }

    /// Build a criteria from an arbitrary value: text parses as a criteria
    /// string, everything else is an equality test.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Text(s) => Self::parse(s),
            Value::Number(n) => Criteria {
                op: CmpOp::Eq,
                target: Target::Number(*n),
            },
            Value::Bool(b) => Criteria {
                op: CmpOp::Eq,
                target: Target::Bool(*b),
            },
            Value::Error(e) => Criteria {
                op: CmpOp::Eq,
                target: Target::Error(e.clone()),
            },
            _ => Criteria {
                op: CmpOp::Eq,
                target: Target::Text(String::new()),
            },
        }
    }

    /// Test one cell value against the criteria.
    pub fn matches(&self, value: &Value) -> bool {
        match &self.target {
            Target::Number(n) => match value {
                Value::Number(v) => cmp_f64(self.op, *v, *n),
                _ => matches!(self.op, CmpOp::Ne),
            },
            Target::Bool(b) => match value {
                Value::Bool(v) => cmp_ord(self.op, v.cmp(b)),
                _ => matches!(self.op, CmpOp::Ne),
            },
            Target::Error(e) => match value {
                Value::Error(v) => cmp_matches_eq(self.op, v.kind() == e.kind()),
                _ => matches!(self.op, CmpOp::Ne),
            },
            Target::Text(t) => match value {
                Value::Text(v) => {
                    cmp_ord(self.op, lower(v).cmp(&lower(t)))
                }
                // Empty-text criteria also match blanks.
                Value::Blank if t.is_empty() => matches!(self.op, CmpOp::Eq),
                _ => matches!(self.op, CmpOp::Ne),
            },
            Target::Pattern(re) => match value {
                Value::Text(v) => cmp_matches_eq(self.op, re.is_match(v)),
                _ => matches!(self.op, CmpOp::Ne),
            },
        }
    }
}

fn split_op(text: &str) -> (CmpOp, &str) {
    if let Some(rest) = text.strip_prefix("<>") {
        return (CmpOp::Ne, rest);
    }
    if let Some(rest) = text.strip_prefix("<=") {
        return (CmpOp::Le, rest);
    }
    if let Some(rest) = text.strip_prefix(">=") {
        return (CmpOp::Ge, rest);
    }
    if let Some(rest) = text.strip_prefix('<') {
        return (CmpOp::Lt, rest);
    }
    if let Some(rest) = text.strip_prefix('>') {
        return (CmpOp::Gt, rest);
    }
    if let Some(rest) = text.strip_prefix('=') {
        return (CmpOp::Eq, rest);
    }
    (CmpOp::Eq, text)
}

fn cmp_f64(op: CmpOp, a: f64, b: f64) -> bool {
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }
}

fn cmp_ord(op: CmpOp, ord: std::cmp::Ordering) -> bool {
    match op {
        CmpOp::Eq => ord.is_eq(),
        CmpOp::Ne => !ord.is_eq(),
        CmpOp::Lt => ord.is_lt(),
        CmpOp::Le => ord.is_le(),
        CmpOp::Gt => ord.is_gt(),
        CmpOp::Ge => ord.is_ge(),
    }
}

/// Only `=`/`<>` are meaningful for pattern and error targets.
fn cmp_matches_eq(op: CmpOp, hit: bool) -> bool {
    match op {
        CmpOp::Ne => !hit,
        _ => hit,
    }
}

fn lower(s: &str) -> String {
    s.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_translation() {
        assert!(wildcard::has_wildcard("a*"));
        assert!(wildcard::has_wildcard("a?c"));
        assert!(!wildcard::has_wildcard("plain"));
        assert!(!wildcard::has_wildcard("tilde ~* escapes"));

        let re = wildcard::to_regex("a*e").unwrap();
        assert!(re.is_match("apple"));
        assert!(re.is_match("ae"));
        assert!(!re.is_match("apples"));

        let re = wildcard::to_regex("c?t").unwrap();
        assert!(re.is_match("cat"));
        assert!(!re.is_match("cart"));

        let re = wildcard::to_regex("2~*2").unwrap();
        assert!(re.is_match("2*2"));
        assert!(!re.is_match("242"));
    }

    #[test]
    fn criteria_operators() {
        let c = Criteria::parse(">=10");
        assert!(c.matches(&Value::Number(10.0)));
        assert!(!c.matches(&Value::Number(9.0)));
        assert!(!c.matches(&Value::Text("10".into())));

        let c = Criteria::parse("<>done");
        assert!(c.matches(&Value::Text("pending".into())));
        assert!(!c.matches(&Value::Text("DONE".into())));
        assert!(c.matches(&Value::Number(4.0)));
    }

    #[test]
    fn criteria_literals() {
        assert!(Criteria::parse("TRUE").matches(&Value::Bool(true)));
        assert!(Criteria::parse("#N/A").matches(&Value::Error(FormulaError::NA)));
        assert!(Criteria::parse("5").matches(&Value::Number(5.0)));
        assert!(Criteria::parse("abc").matches(&Value::Text("ABC".into())));
    }

    #[test]
    fn criteria_wildcards() {
        let c = Criteria::parse("a*");
        assert!(c.matches(&Value::Text("alpha".into())));
        assert!(!c.matches(&Value::Text("beta".into())));
        assert!(!c.matches(&Value::Number(1.0)));
    }

    #[test]
    fn from_value_non_text() {
        let c = Criteria::from_value(&Value::Number(3.0));
        assert!(c.matches(&Value::Number(3.0)));
        assert!(!c.matches(&Value::Number(4.0)));
    }
}
