//! Byte-dispatch tokenizer for Excel-dialect formulas.
//!
//! Tokens carry byte spans into the original input (a leading `=` is skipped
//! but still counted), so the parser can detect the whitespace gaps that
//! drive the implicit intersection operator. Whitespace itself is not
//! emitted.
//!
//! Classification is longest-match; where two classes match the same length
//! the tie-break order is: sheet, function, error literal, cell, boolean,
//! column, name. A 1-3 letter run therefore lexes as a `Column`, and
//! `A1!B2` is a reference on a sheet called `A1`.

use std::fmt;

use gridformula_common::{ErrorKind, FormulaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Number,
    /// Double-quoted string literal; `text` holds the unescaped content.
    Text,
    Boolean,
    /// One of the non-`#REF!` error literals.
    ErrLiteral,
    RefError,
    /// `A1`-style cell address (anchors allowed).
    Cell,
    /// 1-3 letter column name (anchor allowed).
    Column,
    Name,
    /// Unquoted sheet prefix; `text` holds the name without the `!`.
    Sheet,
    /// Quoted sheet prefix; `text` holds the unescaped name.
    SheetQuoted,
    /// A quoted string not followed by `!`; lexes but never parses.
    SingleQuoted,
    /// Function-call opener; `text` holds the bare name, the `(` is consumed.
    Function,
    Comma,
    Colon,
    Semicolon,
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    At,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Percent,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offsets into the original input, `=` marker included.
    pub start: usize,
    pub end: usize,
    /// Token payload; for quoted/derived classes this is the cooked form.
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, start: usize, end: usize, text: impl Into<String>) -> Self {
        Token {
            kind,
            start,
            end,
            text: text.into(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?} {:?} @{}..{}>", self.kind, self.text, self.start, self.end)
    }
}

/// Lexical or syntactic failure with the byte offset it points at.
#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        SyntaxError {
            offset,
            message: message.into(),
        }
    }

    /// Render as `#ERROR!` with a `line:col` location and a caret line.
    pub fn into_formula_error(self, src: &str) -> FormulaError {
        FormulaError::new(ErrorKind::Error).with_details(caret_details(src, self.offset, &self.message))
    }
}

/// `"{msg} at {line}:{col}\n{source line}\n{caret}"`, columns counted in
/// characters.
pub(crate) fn caret_details(src: &str, offset: usize, message: &str) -> String {
    let offset = offset.min(src.len());
    let line_start = src[..offset].rfind('\n').map_or(0, |p| p + 1);
    let line_no = src[..offset].matches('\n').count() + 1;
    let line_end = src[line_start..]
        .find('\n')
        .map_or(src.len(), |p| line_start + p);
    let line_text = &src[line_start..line_end];
    let col = src[line_start..offset].chars().count() + 1;
    format!(
        "{message} at {line_no}:{col}\n{line_text}\n{caret:>width$}",
        caret = '^',
        width = col
    )
}

const ERROR_LITERALS: &[(&str, bool)] = &[
    ("#NULL!", false),
    ("#DIV/0!", false),
    ("#VALUE!", false),
    ("#REF!", true),
    ("#NAME?", false),
    ("#NUM!", false),
    ("#N/A", false),
];

pub struct Tokenizer<'a> {
    src: &'a str,
    offset: usize,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    /// Tokenize a formula. A single leading `=` is treated as the formula
    /// marker and skipped; its byte still counts toward spans.
    pub fn tokenize(src: &'a str) -> Result<Vec<Token>, SyntaxError> {
        let mut t = Tokenizer {
            src,
            offset: usize::from(src.as_bytes().first() == Some(&b'=')),
            tokens: Vec::with_capacity(src.len() / 2),
        };
        t.run()?;
        Ok(t.tokens)
    }

    fn run(&mut self) -> Result<(), SyntaxError> {
        while let Some(b) = self.current() {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.offset += 1,
                b'"' => self.scan_string()?,
                b'\'' => self.scan_quoted()?,
                b'#' => self.scan_error_literal()?,
                b'0'..=b'9' => self.scan_number(),
                b'$' | b'_' | b'A'..=b'Z' | b'a'..=b'z' => self.scan_word()?,
                _ if b >= 0x80 => self.scan_word()?,
                _ => self.scan_operator()?,
            }
        }
        Ok(())
    }

    #[inline]
    fn current(&self) -> Option<u8> {
        self.src.as_bytes().get(self.offset).copied()
    }

    #[inline]
    fn peek(&self, ahead: usize) -> Option<u8> {
        self.src.as_bytes().get(self.offset + ahead).copied()
    }

    fn push(&mut self, kind: TokenKind, start: usize, text: impl Into<String>) {
        self.tokens.push(Token::new(kind, start, self.offset, text));
    }

    /// `"(""|[^"])*"`; the cooked text has `""` collapsed to `"`.
    fn scan_string(&mut self) -> Result<(), SyntaxError> {
        let start = self.offset;
        self.offset += 1;
        let mut text = String::new();
        loop {
            match self.current() {
                Some(b'"') => {
                    if self.peek(1) == Some(b'"') {
                        text.push('"');
                        self.offset += 2;
                    } else {
                        self.offset += 1;
                        self.push(TokenKind::Text, start, text);
                        return Ok(());
                    }
                }
                Some(_) => {
                    let ch = self.char_at(self.offset);
                    text.push(ch);
                    self.offset += ch.len_utf8();
                }
                None => {
                    return Err(SyntaxError::new(start, "Unterminated string literal"));
                }
            }
        }
    }

    /// `'...'` with `''` escapes; followed by `!` it is a sheet prefix.
    fn scan_quoted(&mut self) -> Result<(), SyntaxError> {
        let start = self.offset;
        self.offset += 1;
        let mut text = String::new();
        loop {
            match self.current() {
                Some(b'\'') => {
                    if self.peek(1) == Some(b'\'') {
                        text.push('\'');
                        self.offset += 2;
                    } else {
                        self.offset += 1;
                        if self.current() == Some(b'!') {
                            self.offset += 1;
                            self.push(TokenKind::SheetQuoted, start, text);
                        } else {
                            self.push(TokenKind::SingleQuoted, start, text);
                        }
                        return Ok(());
                    }
                }
                Some(_) => {
                    let ch = self.char_at(self.offset);
                    text.push(ch);
                    self.offset += ch.len_utf8();
                }
                None => {
                    return Err(SyntaxError::new(start, "Unterminated quoted name"));
                }
            }
        }
    }

    fn scan_error_literal(&mut self) -> Result<(), SyntaxError> {
        let start = self.offset;
        let rest = &self.src[self.offset..];
        for &(code, is_ref) in ERROR_LITERALS {
            if rest.starts_with(code) {
                self.offset += code.len();
                let kind = if is_ref {
                    TokenKind::RefError
                } else {
                    TokenKind::ErrLiteral
                };
                self.push(kind, start, code);
                return Ok(());
            }
        }
        Err(SyntaxError::new(start, "Invalid error literal"))
    }

    /// `[0-9]+[.]?[0-9]*([eE][+-][0-9]+)?`; the exponent needs an explicit
    /// sign, otherwise the `e` starts the next token.
    fn scan_number(&mut self) {
        let start = self.offset;
        while matches!(self.current(), Some(b'0'..=b'9')) {
            self.offset += 1;
        }
        if self.current() == Some(b'.') {
            self.offset += 1;
            while matches!(self.current(), Some(b'0'..=b'9')) {
                self.offset += 1;
            }
        }
        if matches!(self.current(), Some(b'e') | Some(b'E'))
            && matches!(self.peek(1), Some(b'+') | Some(b'-'))
            && matches!(self.peek(2), Some(b'0'..=b'9'))
        {
            self.offset += 2;
            while matches!(self.current(), Some(b'0'..=b'9')) {
                self.offset += 1;
            }
        }
        let text = self.src[start..self.offset].to_string();
        self.push(TokenKind::Number, start, text);
    }

    /// Identifier-shaped run: sheet prefix, function opener, cell, boolean,
    /// column or name, in that tie-break order.
    fn scan_word(&mut self) -> Result<(), SyntaxError> {
        let start = self.offset;
        while let Some(b) = self.current() {
            let ident = b.is_ascii_alphanumeric()
                || matches!(b, b'_' | b'.' | b'?' | b'$')
                || b >= 0x80;
            if !ident {
                break;
            }
            if b >= 0x80 {
                self.offset += self.char_at(self.offset).len_utf8();
            } else {
                self.offset += 1;
            }
        }
        let run = &self.src[start..self.offset];

        // Sheet prefix: the run ends at '!' and fits the sheet charset.
        if self.current() == Some(b'!') && is_sheet_name(run) {
            self.offset += 1;
            self.push(TokenKind::Sheet, start, run.to_string());
            return Ok(());
        }

        // Function opener: NAME( with the name charset.
        if self.current() == Some(b'(') && is_function_name(run) {
            self.offset += 1;
            self.push(TokenKind::Function, start, run.to_string());
            return Ok(());
        }

        if let Some((letters, digits)) = split_cell(run) {
            let text = format!("{letters}{digits}");
            self.push(TokenKind::Cell, start, text);
            return Ok(());
        }
        if run.eq_ignore_ascii_case("TRUE") || run.eq_ignore_ascii_case("FALSE") {
            self.push(TokenKind::Boolean, start, run.to_string());
            return Ok(());
        }
        if let Some(letters) = as_column(run) {
            self.push(TokenKind::Column, start, letters.to_string());
            return Ok(());
        }
        if is_name(run) {
            self.push(TokenKind::Name, start, run.to_string());
            return Ok(());
        }
        Err(SyntaxError::new(start, format!("Unexpected token '{run}'")))
    }

    fn scan_operator(&mut self) -> Result<(), SyntaxError> {
        let start = self.offset;
        let b = self.src.as_bytes()[self.offset];

        // Two-character comparisons first.
        if let Some(next) = self.peek(1) {
            let two = match (b, next) {
                (b'<', b'>') => Some(TokenKind::Ne),
                (b'<', b'=') => Some(TokenKind::Le),
                (b'>', b'=') => Some(TokenKind::Ge),
                _ => None,
            };
            if let Some(kind) = two {
                let text = self.src[start..start + 2].to_string();
                self.offset += 2;
                self.push(kind, start, text);
                return Ok(());
            }
        }

        let kind = match b {
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            b'(' => TokenKind::OpenParen,
            b')' => TokenKind::CloseParen,
            b'{' => TokenKind::OpenBrace,
            b'}' => TokenKind::CloseBrace,
            b'[' => TokenKind::OpenBracket,
            b']' => TokenKind::CloseBracket,
            b'@' => TokenKind::At,
            b'+' => TokenKind::Add,
            b'-' => TokenKind::Sub,
            b'*' => TokenKind::Mul,
            b'/' => TokenKind::Div,
            b'^' => TokenKind::Pow,
            b'&' => TokenKind::Concat,
            b'%' => TokenKind::Percent,
            b'=' => TokenKind::Eq,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            _ => {
                return Err(SyntaxError::new(
                    start,
                    format!("Unexpected character '{}'", self.char_at(start)),
                ));
            }
        };
        let text = self.src[start..start + 1].to_string();
        self.offset += 1;
        self.push(kind, start, text);
        Ok(())
    }

    fn char_at(&self, offset: usize) -> char {
        self.src[offset..].chars().next().unwrap_or('\u{FFFD}')
    }
}

/// `[A-Za-z_.\d-￿]+` -- no `$`, no `?`.
fn is_sheet_name(run: &str) -> bool {
    !run.is_empty()
        && run
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || !c.is_ascii())
}

/// `[A-Za-z_][A-Za-z_0-9.]*`
fn is_function_name(run: &str) -> bool {
    let mut chars = run.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// `[$]?[A-Za-z]{1,3}[$]?[1-9][0-9]*` -> `(letters, digits)` with anchors
/// stripped.
fn split_cell(run: &str) -> Option<(&str, &str)> {
    let bytes = run.as_bytes();
    let mut i = 0;
    if bytes.first() == Some(&b'$') {
        i = 1;
    }
    let letters_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let letters = &run[letters_start..i];
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let digits = &run[digits_start..i];
    if digits.is_empty() || digits.starts_with('0') || i != bytes.len() {
        return None;
    }
    Some((letters, digits))
}

/// `[$]?[A-Za-z]{1,3}` -> letters with the anchor stripped.
fn as_column(run: &str) -> Option<&str> {
    let body = run.strip_prefix('$').unwrap_or(run);
    if (1..=3).contains(&body.len()) && body.bytes().all(|b| b.is_ascii_alphabetic()) {
        Some(body)
    } else {
        None
    }
}

/// `[a-zA-Z_][a-zA-Z0-9_.?]*`
fn is_name(run: &str) -> bool {
    let mut chars = run.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '?'))
}
