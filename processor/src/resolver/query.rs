//! `@Query` SQL scanning.
//!
//! The scanner splits SQL at `:name` placeholders. String literals, quoted
//! identifiers and comments are copied through untouched, so a `:word`
//! inside `'...'` or `-- ...` is never taken for a placeholder. Positional
//! (`?`, `?NNN`) and `@name`/`$name` placeholders are rejected: every
//! argument must be bound by name so the generated accessor can check it
//! against the function's parameters.

use std::sync::LazyLock;

use kabin_core::{BindingError, RawQuerySpec, SqlSegment, StatementKind};
use regex::Regex;

/// Leading keyword, after any whitespace and comments.
static LEADING_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?:\s+|--[^\n]*(?:\n|$)|/\*.*?\*/)*([A-Za-z]+)")
        .expect("static regex must compile")
});

/// Parses `sql` into text and placeholder segments.
///
/// # Examples
///
/// ```
/// use kabin_core::{SqlSegment, StatementKind};
/// use kabin_processor::parse_query;
///
/// let query = parse_query("SELECT * FROM User WHERE name = :name AND note <> ':skip'").unwrap();
/// assert_eq!(query.bindings, vec!["name".to_string()]);
/// assert_eq!(query.statement, StatementKind::Select);
/// assert_eq!(query.segments[1], SqlSegment::Parameter("name".to_string()));
/// ```
pub fn parse_query(sql: &str) -> Result<RawQuerySpec, BindingError> {
    let mut scanner = Scanner::new(sql);
    scanner.run()?;
    Ok(RawQuerySpec {
        sql: sql.to_string(),
        segments: scanner.segments,
        bindings: scanner.bindings,
        statement: statement_kind(sql),
    })
}

/// Classifies a statement by its leading keyword.
pub fn statement_kind(sql: &str) -> StatementKind {
    let Some(keyword) = LEADING_KEYWORD
        .captures(sql)
        .and_then(|captures| captures.get(1))
    else {
        return StatementKind::Other;
    };
    match keyword.as_str().to_ascii_uppercase().as_str() {
        "SELECT" | "WITH" | "VALUES" | "PRAGMA" | "EXPLAIN" => StatementKind::Select,
        "INSERT" | "REPLACE" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        _ => StatementKind::Other,
    }
}

struct Scanner<'a> {
    sql: &'a str,
    bytes: &'a [u8],
    position: usize,
    text_start: usize,
    segments: Vec<SqlSegment>,
    bindings: Vec<String>,
}

impl<'a> Scanner<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            sql,
            bytes: sql.as_bytes(),
            position: 0,
            text_start: 0,
            segments: Vec::new(),
            bindings: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.position + offset).copied()
    }

    fn run(&mut self) -> Result<(), BindingError> {
        while let Some(byte) = self.peek(0) {
            match byte {
                b'\'' => self.skip_quoted(b'\'', "string literal")?,
                b'"' => self.skip_quoted(b'"', "quoted identifier")?,
                b'`' => self.skip_quoted(b'`', "quoted identifier")?,
                b'[' => self.skip_until(b"]", "quoted identifier")?,
                b'-' if self.peek(1) == Some(b'-') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => {
                    self.position += 2;
                    self.skip_until(b"*/", "block comment")?;
                }
                b':' if self.peek(1).is_some_and(is_identifier_start) => self.placeholder(),
                b'?' => {
                    if self.peek(1).is_some_and(|next| next.is_ascii_digit()) {
                        let end = self.identifier_end(self.position + 1);
                        return Err(BindingError::UnsupportedPlaceholder(
                            self.sql[self.position..end].to_string(),
                        ));
                    }
                    return Err(BindingError::AnonymousPlaceholder(self.position));
                }
                b'@' | b'$' if self.peek(1).is_some_and(is_identifier_start) => {
                    let end = self.identifier_end(self.position + 1);
                    return Err(BindingError::UnsupportedPlaceholder(
                        self.sql[self.position..end].to_string(),
                    ));
                }
                _ => self.position += 1,
            }
        }
        self.flush_text(self.position);
        Ok(())
    }

    /// Skips a literal opened at the current position. A doubled closing
    /// quote is an escaped quote.
    fn skip_quoted(&mut self, quote: u8, what: &'static str) -> Result<(), BindingError> {
        self.position += 1;
        loop {
            match self.peek(0) {
                None => return Err(BindingError::Unterminated(what)),
                Some(byte) if byte == quote => {
                    self.position += 1;
                    if self.peek(0) == Some(quote) {
                        self.position += 1;
                    } else {
                        return Ok(());
                    }
                }
                Some(_) => self.position += 1,
            }
        }
    }

    fn skip_until(&mut self, terminator: &[u8], what: &'static str) -> Result<(), BindingError> {
        let rest = &self.bytes[self.position..];
        match rest
            .windows(terminator.len())
            .position(|window| window == terminator)
        {
            Some(offset) => {
                self.position += offset + terminator.len();
                Ok(())
            }
            None => Err(BindingError::Unterminated(what)),
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(byte) = self.peek(0) {
            self.position += 1;
            if byte == b'\n' {
                break;
            }
        }
    }

    fn placeholder(&mut self) {
        self.flush_text(self.position);
        let start = self.position + 1;
        let end = self.identifier_end(start);
        let name = self.sql[start..end].to_string();
        self.segments.push(SqlSegment::Parameter(name.clone()));
        self.bindings.push(name);
        self.position = end;
        self.text_start = end;
    }

    fn identifier_end(&self, start: usize) -> usize {
        let mut end = start;
        while self
            .bytes
            .get(end)
            .is_some_and(|byte| byte.is_ascii_alphanumeric() || *byte == b'_')
        {
            end += 1;
        }
        end
    }

    fn flush_text(&mut self, end: usize) {
        if end > self.text_start {
            self.segments
                .push(SqlSegment::Text(self.sql[self.text_start..end].to_string()));
        }
        self.text_start = end;
    }
}

fn is_identifier_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}
