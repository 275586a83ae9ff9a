//! A small S-expression parser for schematic documents.
//!
//! Atoms keep their source [`Span`] (byte offsets) so that loaders can
//! point at the exact location of a structurally invalid record, and
//! [`ParseError`] carries the byte offset where parsing failed.

use std::fmt;

use thiserror::Error;

/// Byte span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// The kind of S-expression value.
#[derive(Debug, Clone, PartialEq)]
pub enum SexprKind {
    /// An unquoted identifier.
    Symbol(String),
    /// Quoted text.
    String(String),
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    F64(f64),
    /// A list of S-expressions.
    List(Vec<Sexpr>),
}

/// An S-expression value with its source span.
#[derive(Debug, Clone)]
pub struct Sexpr {
    pub kind: SexprKind,
    pub span: Span,
}

impl PartialEq for Sexpr {
    fn eq(&self, other: &Self) -> bool {
        // Spans are ignored when comparing trees.
        self.kind == other.kind
    }
}

impl Sexpr {
    pub fn with_span(kind: SexprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Get the atom text if this is a symbol or string.
    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::Symbol(s) | SexprKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the symbol name if this is a symbol.
    pub fn as_sym(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Get the string content if this is a string literal.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer value if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match &self.kind {
            SexprKind::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the list items if this is a list.
    pub fn as_list(&self) -> Option<&[Sexpr]> {
        match &self.kind {
            SexprKind::List(items) => Some(items),
            _ => None,
        }
    }

    /// The tag of a list node, i.e. its first element when that element is
    /// a symbol.
    pub fn tag(&self) -> Option<&str> {
        self.as_list()?.first()?.as_sym()
    }

    /// Find the first direct child list `(name ...)`.
    pub fn find_list(&self, name: &str) -> Option<&[Sexpr]> {
        find_child_list(self.as_list()?, name)
    }

    /// Find all direct child lists `(name ...)`.
    pub fn find_all_lists(&self, name: &str) -> Vec<&[Sexpr]> {
        self.as_list()
            .map(|items| find_all_child_lists(items, name))
            .unwrap_or_default()
    }
}

/// Find a direct child list `(name ...)` within a list of [`Sexpr`] nodes.
pub fn find_child_list<'a>(items: &'a [Sexpr], name: &str) -> Option<&'a [Sexpr]> {
    items
        .iter()
        .filter_map(Sexpr::as_list)
        .find(|list| list.first().and_then(Sexpr::as_sym) == Some(name))
}

/// Find all direct child lists `(name ...)` within a list of [`Sexpr`] nodes.
pub fn find_all_child_lists<'a>(items: &'a [Sexpr], name: &str) -> Vec<&'a [Sexpr]> {
    items
        .iter()
        .filter_map(Sexpr::as_list)
        .filter(|list| list.first().and_then(Sexpr::as_sym) == Some(name))
        .collect()
}

/// What went wrong while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedEof,
    UnexpectedChar(char),
    UnclosedList,
    UnterminatedString,
    EmptyAtom,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::UnexpectedEof => write!(f, "unexpected end of input"),
            ParseErrorKind::UnexpectedChar(ch) => write!(f, "unexpected character '{ch}'"),
            ParseErrorKind::UnclosedList => write!(f, "unclosed list"),
            ParseErrorKind::UnterminatedString => write!(f, "unterminated string"),
            ParseErrorKind::EmptyAtom => write!(f, "empty atom"),
        }
    }
}

/// A parse failure together with the byte offset it occurred at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} at byte {offset}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

/// Parser over a single input string.
pub struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Parser {
            input,
            chars: input.char_indices().peekable(),
            pos: 0,
        }
    }

    /// Parse a single S-expression from the input.
    pub fn parse(&mut self) -> Result<Sexpr, ParseError> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return Err(self.error(ParseErrorKind::UnexpectedEof));
        }
        if self.peek() == Some('(') {
            self.parse_list()
        } else {
            self.parse_atom()
        }
    }

    /// Parse every S-expression in the input.
    pub fn parse_all(&mut self) -> Result<Vec<Sexpr>, ParseError> {
        let mut out = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek().is_none() {
                break;
            }
            out.push(self.parse()?);
        }
        Ok(out)
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            offset: self.pos,
        }
    }

    fn parse_list(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        self.expect('(')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(ParseError {
                        kind: ParseErrorKind::UnclosedList,
                        offset: start,
                    });
                }
                Some(')') => {
                    self.advance();
                    break;
                }
                Some(_) => items.push(self.parse()?),
            }
        }
        Ok(Sexpr::with_span(
            SexprKind::List(items),
            Span::new(start, self.pos),
        ))
    }

    fn parse_atom(&mut self) -> Result<Sexpr, ParseError> {
        if self.peek() == Some('"') {
            return self.parse_string();
        }

        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' {
                break;
            }
            self.advance();
        }
        if self.pos == start {
            return Err(self.error(ParseErrorKind::EmptyAtom));
        }

        let atom = &self.input[start..self.pos];
        let span = Span::new(start, self.pos);

        // Coordinates in schematic documents are integers, so try i64 first.
        if let Ok(n) = atom.parse::<i64>() {
            Ok(Sexpr::with_span(SexprKind::Int(n), span))
        } else if let Ok(x) = atom.parse::<f64>() {
            Ok(Sexpr::with_span(SexprKind::F64(x), span))
        } else {
            Ok(Sexpr::with_span(SexprKind::Symbol(atom.to_string()), span))
        }
    }

    fn parse_string(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        self.expect('"')?;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(ParseError {
                        kind: ParseErrorKind::UnterminatedString,
                        offset: start,
                    });
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('r') => text.push('\r'),
                        Some(ch) => text.push(ch),
                        None => {
                            return Err(ParseError {
                                kind: ParseErrorKind::UnterminatedString,
                                offset: start,
                            });
                        }
                    }
                    self.advance();
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }
        Ok(Sexpr::with_span(
            SexprKind::String(text),
            Span::new(start, self.pos),
        ))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == ';' {
                // Comment until end of line.
                while let Some(ch) = self.peek() {
                    self.advance();
                    if ch == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn advance(&mut self) {
        if let Some((pos, ch)) = self.chars.next() {
            self.pos = pos + ch.len_utf8();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(ParseErrorKind::UnexpectedChar(ch))),
            None => Err(self.error(ParseErrorKind::UnexpectedEof)),
        }
    }
}

/// Parse a string into a single S-expression.
pub fn parse(input: &str) -> Result<Sexpr, ParseError> {
    log::trace!("parsing S-expression from {} bytes", input.len());
    Parser::new(input).parse()
}

/// Parse a string into all of its top-level S-expressions.
pub fn parse_all(input: &str) -> Result<Vec<Sexpr>, ParseError> {
    Parser::new(input).parse_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_atoms() {
        assert_eq!(parse("wire").unwrap().kind, SexprKind::Symbol("wire".into()));
        assert_eq!(parse("-40").unwrap().kind, SexprKind::Int(-40));
        assert_eq!(parse("2.54").unwrap().kind, SexprKind::F64(2.54));
        assert_eq!(
            parse("\"ETH_RX0\"").unwrap().kind,
            SexprKind::String("ETH_RX0".into())
        );
    }

    #[test]
    fn parse_nested_list() {
        let sx = parse("(wire (xy 10 20) (xy 30 20))").unwrap();
        assert_eq!(sx.tag(), Some("wire"));
        let points = sx.find_all_lists("xy");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0][1].as_int(), Some(10));
        assert_eq!(points[1][1].as_int(), Some(30));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            parse(r#""a\"b\nc""#).unwrap().kind,
            SexprKind::String("a\"b\nc".into())
        );
    }

    #[test]
    fn comments_are_skipped() {
        let all = parse_all("; top\n(a 1) ; trailing\n(b 2)\n").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].tag(), Some("a"));
        assert_eq!(all[1].tag(), Some("b"));
    }

    #[test]
    fn error_carries_offset() {
        let err = parse("(junction (at 1 2)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnclosedList);
        assert_eq!(err.offset, 0);

        let err = parse("  \"open").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn spans_cover_source() {
        let input = r#"(label "RXD" (at 4 8))"#;
        let sx = parse(input).unwrap();
        assert_eq!(sx.span, Span::new(0, input.len()));
        let name = &sx.as_list().unwrap()[1];
        assert_eq!(&input[name.span.start..name.span.end], "\"RXD\"");
    }

    #[test]
    fn find_child_list_picks_first() {
        let sx = parse("(sheet (wire (xy 0 0) (xy 1 0)) (wire (xy 5 5) (xy 6 5)))").unwrap();
        let first = sx.find_list("wire").unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(sx.find_all_lists("wire").len(), 2);
    }
}
