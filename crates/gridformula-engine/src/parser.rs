//! Evaluating recursive-descent parser.
//!
//! Productions return `Operand`s directly; there is no AST. Value-level
//! failures (coercion, `#DIV/0!`, unknown names) travel as error *values*
//! and parsing continues; only malformed input produces `Err`, which the
//! engine surfaces as `#ERROR!` with a caret diagram.
//!
//! Grammar, outermost first:
//!
//! ```text
//! formula    := intersect ( infix-op intersect )*     -- flattened, then re-precedenced
//! intersect  := range ( SPACE_GAP range )*            -- gap = whitespace between spans
//! range      := percent ( ":" percent )*
//! percent    := unary ("%")?
//! unary      := ("+"|"-")* atom
//! atom       := (Sheet|SheetQuoted)? referenceItem
//!             | "(" formula ("," formula)* ")"
//!             | constant | functionCall | constantArray
//! ```

use smallvec::SmallVec;

use gridformula_common::{
    address, CellRef, Collection, FormulaError, RangeRef, Reference, Value,
};

use crate::dispatch::{retrieve_ref, Operand};
use crate::operators;
use crate::tokenizer::{SyntaxError, Token, TokenKind, Tokenizer};
use crate::traits::{Backend, CellPos};

/// Fold order for the flattened infix list.
const PRECEDENCE: [&[&str]; 5] = [
    &["^"],
    &["*", "/"],
    &["+", "-"],
    &["&"],
    &["=", "<>", "<=", ">=", "<", ">"],
];

pub(crate) struct Session<'s> {
    src: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    backend: &'s dyn Backend,
    position: Option<&'s CellPos>,
}

impl<'s> Session<'s> {
    /// Tokenize and evaluate a formula against a backend. `Err` means the
    /// input was malformed; every in-formula failure is an error value.
    pub(crate) fn run(
        src: &'s str,
        backend: &'s dyn Backend,
        position: Option<&'s CellPos>,
    ) -> Result<Operand, FormulaError> {
        let tokens = Tokenizer::tokenize(src).map_err(|e| e.into_formula_error(src))?;
        if tokens.is_empty() {
            return Err(FormulaError::ERROR.with_details("Empty formula"));
        }
        let mut session = Session {
            src,
            tokens,
            pos: 0,
            backend,
            position,
        };
        let result = session.parse_formula()?;
        if session.pos < session.tokens.len() {
            return Err(session.unexpected("Unexpected token"));
        }
        Ok(result)
    }

    /* ───────────────────── token cursor ───────────────────── */

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn bump(&mut self) -> &Token {
        let t = &self.tokens[self.pos];
        self.pos += 1;
        t
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), FormulaError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    /// Syntax error at the current token (or just past the last one).
    fn unexpected(&self, what: &str) -> FormulaError {
        let offset = match self.tokens.get(self.pos) {
            Some(t) => t.start,
            // Ran off the end: point at the last token.
            None => self.tokens.last().map_or(0, |t| t.start),
        };
        SyntaxError::new(offset, what).into_formula_error(self.src)
    }

    /* ───────────────────── productions ───────────────────── */

    fn parse_formula(&mut self) -> Result<Operand, FormulaError> {
        let mut values: SmallVec<[Operand; 4]> = SmallVec::new();
        let mut ops: SmallVec<[&'static str; 4]> = SmallVec::new();
        values.push(self.parse_intersect()?);
        while let Some(op) = self.peek_infix() {
            self.pos += 1;
            values.push(self.parse_intersect()?);
            ops.push(op);
        }
        if ops.is_empty() {
            return Ok(values.pop().expect("one operand parsed"));
        }

        // Re-precedence the flattened list: fold each class left-to-right,
        // rewriting values[i], values[i+1] and deleting the operator.
        for class in PRECEDENCE {
            let mut i = 0;
            while i < ops.len() {
                if class.contains(&ops[i]) {
                    let left = std::mem::replace(&mut values[i], Operand::Omitted);
                    let right = values.remove(i + 1);
                    values[i] =
                        operators::infix(ops[i], left, right, self.backend, self.position);
                    ops.remove(i);
                } else {
                    i += 1;
                }
            }
        }
        Ok(values.pop().expect("fold leaves one operand"))
    }

    fn peek_infix(&self) -> Option<&'static str> {
        Some(match self.peek_kind()? {
            TokenKind::Pow => "^",
            TokenKind::Mul => "*",
            TokenKind::Div => "/",
            TokenKind::Add => "+",
            TokenKind::Sub => "-",
            TokenKind::Concat => "&",
            TokenKind::Eq => "=",
            TokenKind::Ne => "<>",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            _ => return None,
        })
    }

    fn parse_intersect(&mut self) -> Result<Operand, FormulaError> {
        let first = self.parse_range_expr()?;
        if !self.gap_before_range_start() {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.gap_before_range_start() {
            items.push(self.parse_range_expr()?);
        }
        Ok(operators::intersect(items))
    }

    /// The intersection branch is taken only when the next token can start a
    /// range production *and* whitespace separated it from the previous one.
    /// Adjacent atoms without whitespace are a syntax error upstream.
    fn gap_before_range_start(&self) -> bool {
        if self.pos == 0 {
            return false;
        }
        let Some(t) = self.peek() else {
            return false;
        };
        let starts_range = matches!(
            t.kind,
            TokenKind::Cell
                | TokenKind::Column
                | TokenKind::Name
                | TokenKind::Sheet
                | TokenKind::SheetQuoted
                | TokenKind::Function
                | TokenKind::RefError
                | TokenKind::OpenParen
        );
        starts_range && t.start > self.tokens[self.pos - 1].end
    }

    fn parse_range_expr(&mut self) -> Result<Operand, FormulaError> {
        let first = self.parse_percent()?;
        if self.peek_kind() != Some(TokenKind::Colon) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Colon) {
            items.push(self.parse_percent()?);
        }
        Ok(operators::range_of(items))
    }

    fn parse_percent(&mut self) -> Result<Operand, FormulaError> {
        let operand = self.parse_unary()?;
        if self.eat(TokenKind::Percent) {
            Ok(operators::percent(operand, self.backend, self.position))
        } else {
            Ok(operand)
        }
    }

    fn parse_unary(&mut self) -> Result<Operand, FormulaError> {
        let mut signed = false;
        let mut negate = false;
        loop {
            match self.peek_kind() {
                Some(TokenKind::Add) => {
                    signed = true;
                }
                Some(TokenKind::Sub) => {
                    signed = true;
                    negate = !negate;
                }
                _ => break,
            }
            self.pos += 1;
        }
        let atom = self.parse_atom()?;
        if signed {
            Ok(operators::unary(atom, negate, self.backend, self.position))
        } else {
            Ok(atom)
        }
    }

    fn parse_atom(&mut self) -> Result<Operand, FormulaError> {
        let Some(kind) = self.peek_kind() else {
            return Err(self.unexpected("Unexpected end of formula"));
        };
        match kind {
            TokenKind::Sheet | TokenKind::SheetQuoted => {
                let sheet = self.bump().text.clone();
                self.parse_reference_item(Some(sheet))
            }
            TokenKind::Cell | TokenKind::Column | TokenKind::Name | TokenKind::RefError => {
                self.parse_reference_item(None)
            }
            TokenKind::Number => {
                let text = self.bump().text.clone();
                let n: f64 = text
                    .parse()
                    .map_err(|_| self.unexpected("Invalid number"))?;
                Ok(Operand::Value(Value::Number(n)))
            }
            TokenKind::Text => {
                let text = self.bump().text.clone();
                Ok(Operand::Value(Value::Text(text)))
            }
            TokenKind::Boolean => {
                let b = self.bump().text.eq_ignore_ascii_case("TRUE");
                Ok(Operand::Value(Value::Bool(b)))
            }
            TokenKind::ErrLiteral => {
                let text = self.bump().text.clone();
                let kind = gridformula_common::ErrorKind::parse(&text)
                    .unwrap_or(gridformula_common::ErrorKind::Error);
                Ok(Operand::error(FormulaError::new(kind)))
            }
            TokenKind::Function => self.parse_function_call(),
            TokenKind::OpenParen => self.parse_paren(),
            TokenKind::OpenBrace => self.parse_array_literal(),
            _ => Err(self.unexpected("Unexpected token")),
        }
    }

    /// `referenceItem := Cell | Column | Name | RefError`, with an optional
    /// sheet already consumed.
    fn parse_reference_item(&mut self, sheet: Option<String>) -> Result<Operand, FormulaError> {
        let Some(kind) = self.peek_kind() else {
            return Err(self.unexpected("Expected a reference"));
        };
        match kind {
            TokenKind::Cell => {
                let text = self.bump().text.clone();
                match address::parse_cell(&text) {
                    Ok((row, col)) => {
                        let mut cell = CellRef::new(row, col);
                        cell.sheet = sheet;
                        Ok(Operand::Ref(Reference::Cell(cell)))
                    }
                    // Out-of-grid addresses read as unknown names.
                    Err(e) => Ok(Operand::error(e)),
                }
            }
            TokenKind::Column => {
                let text = self.bump().text.clone();
                match address::column_to_number(&text) {
                    Ok(col) => {
                        let mut range = RangeRef::whole_columns(col, col);
                        range.sheet = sheet;
                        Ok(Operand::Ref(Reference::Range(range)))
                    }
                    Err(e) => Ok(Operand::error(e)),
                }
            }
            TokenKind::Name => {
                let name = self.bump().text.clone();
                Ok(self
                    .backend
                    .variable_ref(&name, sheet.as_deref(), self.position))
            }
            TokenKind::RefError => {
                self.pos += 1;
                Ok(Operand::error(FormulaError::REF))
            }
            _ => Err(self.unexpected("Expected a reference")),
        }
    }

    /// `(` formula (`,` formula)* `)` — grouping, or a union when commas
    /// appear. Union members must be references; their values are read at
    /// build time, in source order.
    fn parse_paren(&mut self) -> Result<Operand, FormulaError> {
        self.expect(TokenKind::OpenParen, "Expected '('")?;
        let first = self.parse_formula()?;
        if self.peek_kind() != Some(TokenKind::Comma) {
            self.expect(TokenKind::CloseParen, "Expected ')'")?;
            return Ok(first);
        }

        let mut members = vec![first];
        while self.eat(TokenKind::Comma) {
            members.push(self.parse_formula()?);
        }
        self.expect(TokenKind::CloseParen, "Expected ')'")?;

        let mut items = Vec::with_capacity(members.len());
        for member in members {
            match member {
                Operand::Ref(r) => {
                    let value = retrieve_ref(self.backend, &r, self.position);
                    items.push((value, r));
                }
                Operand::Value(Value::Error(e)) => return Ok(Operand::error(e)),
                _ => {
                    return Ok(Operand::error(
                        FormulaError::VALUE.with_details("Union members must be references"),
                    ));
                }
            }
        }
        Ok(Operand::Union(Collection::new(items)))
    }

    /// `NAME(` args `)`. Empty slots between commas (and a leading or
    /// trailing comma) are omitted arguments; `NAME()` is zero arguments.
    fn parse_function_call(&mut self) -> Result<Operand, FormulaError> {
        let mut name = self.bump().text.to_uppercase();
        if let Some(stripped) = name.strip_prefix("_XLFN.") {
            name = stripped.to_string();
        }

        let mut args: Vec<Operand> = Vec::new();
        if !self.eat(TokenKind::CloseParen) {
            loop {
                match self.peek_kind() {
                    Some(TokenKind::Comma) | Some(TokenKind::CloseParen) => {
                        args.push(Operand::Omitted);
                    }
                    _ => args.push(self.parse_formula()?),
                }
                if self.eat(TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::CloseParen, "Expected ',' or ')'")?;
                break;
            }
        }
        Ok(self.backend.call_function(&name, args, self.position))
    }

    /// `{…;…}`: rows split by `;`, cells by `,`; cells are signed numbers,
    /// strings, booleans or error literals — no references, no operators.
    fn parse_array_literal(&mut self) -> Result<Operand, FormulaError> {
        self.expect(TokenKind::OpenBrace, "Expected '{'")?;
        let mut rows: Vec<Vec<Value>> = Vec::new();
        let mut current: Vec<Value> = Vec::new();
        loop {
            current.push(self.parse_array_element()?);
            match self.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.pos += 1;
                }
                Some(TokenKind::Semicolon) => {
                    self.pos += 1;
                    rows.push(std::mem::take(&mut current));
                }
                Some(TokenKind::CloseBrace) => {
                    self.pos += 1;
                    rows.push(current);
                    break;
                }
                _ => return Err(self.unexpected("Expected ',', ';' or '}' in array")),
            }
        }
        if !Value::is_rectangular(&rows) {
            return Ok(Operand::error(
                FormulaError::VALUE.with_details("Array rows must have equal length"),
            ));
        }
        Ok(Operand::Value(Value::Array(rows)))
    }

    fn parse_array_element(&mut self) -> Result<Value, FormulaError> {
        let mut negate = false;
        while matches!(self.peek_kind(), Some(TokenKind::Add) | Some(TokenKind::Sub)) {
            if self.bump().kind == TokenKind::Sub {
                negate = !negate;
            }
        }
        let Some(kind) = self.peek_kind() else {
            return Err(self.unexpected("Unexpected end of array"));
        };
        match kind {
            TokenKind::Number => {
                let text = self.bump().text.clone();
                let n: f64 = text
                    .parse()
                    .map_err(|_| self.unexpected("Invalid number"))?;
                Ok(Value::Number(if negate { -n } else { n }))
            }
            TokenKind::Text if !negate => Ok(Value::Text(self.bump().text.clone())),
            TokenKind::Boolean if !negate => {
                let b = self.bump().text.eq_ignore_ascii_case("TRUE");
                Ok(Value::Bool(b))
            }
            TokenKind::ErrLiteral if !negate => {
                let text = self.bump().text.clone();
                let kind = gridformula_common::ErrorKind::parse(&text)
                    .unwrap_or(gridformula_common::ErrorKind::Error);
                Ok(Value::Error(FormulaError::new(kind)))
            }
            TokenKind::RefError if !negate => {
                self.pos += 1;
                Ok(Value::Error(FormulaError::REF))
            }
            _ => Err(self.unexpected("Array cells must be constants")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_grid::TestGrid;
    use crate::FormulaEngine;
    use gridformula_common::ErrorKind;

    fn run(formula: &str) -> Result<Operand, FormulaError> {
        let engine = FormulaEngine::new(TestGrid::new());
        Session::run(formula, &engine, None)
    }

    #[test]
    fn bare_references_stay_references() {
        assert_eq!(
            run("=B2").unwrap(),
            Operand::Ref(Reference::Cell(CellRef::new(2, 2)))
        );
        assert_eq!(
            run("=AB").unwrap(),
            Operand::Ref(Reference::Range(RangeRef::whole_columns(28, 28)))
        );
    }

    #[test]
    fn sheet_prefix_lands_on_the_range() {
        let op = run("=Sheet2!B2:C3").unwrap();
        let Operand::Ref(Reference::Range(range)) = op else {
            panic!("expected a range, got {op:?}");
        };
        assert_eq!(range.sheet.as_deref(), Some("Sheet2"));
        assert_eq!(range.row_span(), (2, 3));
        assert_eq!(range.col_span(), (2, 3));
    }

    #[test]
    fn union_members_must_be_references() {
        let op = run("=(A1,C3)").unwrap();
        assert!(matches!(op, Operand::Union(ref c) if c.len() == 2));

        let op = run("=(A1,1+1)").unwrap();
        assert!(matches!(
            op,
            Operand::Value(Value::Error(ref e)) if e.kind() == ErrorKind::Value
        ));
    }

    #[test]
    fn single_member_parens_are_grouping() {
        assert_eq!(run("=(1+2)*3").unwrap(), Operand::Value(Value::Number(9.0)));
    }

    #[test]
    fn argument_holes_are_omitted_not_empty() {
        let engine = FormulaEngine::new(TestGrid::new());
        // `()` is zero arguments, and aggregates want at least one.
        assert!(engine.parse("=COUNTA()", None, false).is_error());
        // Holes are omitted arguments and take the family default.
        assert_eq!(engine.parse("=SUM(,1)", None, false), Value::Number(1.0));
        assert_eq!(engine.parse("=SUM(1,,2)", None, false), Value::Number(3.0));
    }

    #[test]
    fn leftover_tokens_are_syntax_errors() {
        // A number cannot start an intersection, so `1 2` never joins up.
        assert!(run("=1 2").is_err());
        assert!(run("=)").is_err());
        assert!(run("=1)").is_err());
        assert!(run("={1,2").is_err());
    }

    #[test]
    fn array_literals_parse_constants_only() {
        assert_eq!(
            run("={1,-2;\"x\",TRUE}").unwrap(),
            Operand::Value(Value::Array(vec![
                vec![Value::Number(1.0), Value::Number(-2.0)],
                vec![Value::Text("x".into()), Value::Bool(true)],
            ]))
        );
        assert!(run("={A1}").is_err());
        assert!(run("={1+2}").is_err());
    }

    #[test]
    fn range_over_function_results() {
        // INDEX returns a reference, so `INDEX(...):B2` is a valid range.
        let op = run("=INDEX(A1:B2,1,1):B2").unwrap();
        assert_eq!(
            op,
            Operand::Ref(Reference::Range(RangeRef::new(
                Some(1),
                Some(1),
                Some(2),
                Some(2)
            )))
        );
    }
}
