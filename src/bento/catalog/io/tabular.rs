//! Lenient reader for the comma-separated catalog export.
//!
//! The export is not strict CSV: a trailing `tags` list may appear unquoted,
//! quotes may be escaped either by doubling or with a backslash, and rows may
//! be short. The reader never fails on a malformed line; only a missing or
//! incomplete header is fatal.

use std::collections::BTreeMap;
use std::str::Lines;

use tracing::debug;

use crate::bento::catalog::error::ParseError;
use crate::bento::catalog::model::{REQUIRED_COLUMNS, Row};

/// Header name → cell value for one data line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line number in the source text.
    pub line: usize,
    pub fields: BTreeMap<String, String>,
}

impl Record {
    /// Returns the value for `column`, or an empty string when absent.
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or_default()
    }

    /// Converts the record into a [`Row`], splitting the `tags` cell.
    pub fn to_row(&self) -> Row {
        Row {
            line: self.line,
            category: self.get("category").to_string(),
            subcategory: self.get("subcategory").to_string(),
            title: self.get("title").to_string(),
            description: self.get("description").to_string(),
            url: self.get("url").to_string(),
            tags: self.fields.get("tags").map(|raw| split_tags(raw)).unwrap_or_default(),
        }
    }
}

/// A parsed header plus the body text it applies to.
///
/// [`records`](TabularDocument::records) walks the body lazily and can be
/// called any number of times; each call starts again from the first data line.
#[derive(Debug, Clone)]
pub struct TabularDocument<'a> {
    headers: Vec<String>,
    body: &'a str,
    body_line: usize,
}

impl<'a> TabularDocument<'a> {
    /// Reads the header line and validates the required columns.
    pub fn parse(source: &'a str) -> Result<Self, ParseError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let mut offset = 0;
        let mut line_number = 0;
        for line in source.split_inclusive('\n') {
            line_number += 1;
            offset += line.len();
            if line.trim().is_empty() {
                continue;
            }
            let headers = split_line(line.trim_end_matches(['\r', '\n']), line_number);
            return Self::with_headers(headers, &source[offset..], line_number);
        }
        Err(ParseError::MissingHeader)
    }

    fn with_headers(
        headers: Vec<String>,
        body: &'a str,
        header_line: usize,
    ) -> Result<Self, ParseError> {
        let headers: Vec<String> = headers.into_iter().map(|h| h.to_lowercase()).collect();
        validate_headers(&headers)?;
        Ok(Self {
            headers,
            body,
            body_line: header_line + 1,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Iterates the data lines in source order, skipping blank lines.
    pub fn records(&self) -> Records<'_> {
        Records {
            headers: &self.headers,
            lines: self.body.lines(),
            next_line: self.body_line,
        }
    }

    /// Convenience wrapper collecting every record as a [`Row`].
    pub fn rows(&self) -> Vec<Row> {
        self.records().map(|record| record.to_row()).collect()
    }
}

/// Lazy iterator over the data lines of a [`TabularDocument`].
#[derive(Debug, Clone)]
pub struct Records<'a> {
    headers: &'a [String],
    lines: Lines<'a>,
    next_line: usize,
}

impl Iterator for Records<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            let line = self.lines.next()?;
            let line_number = self.next_line;
            self.next_line += 1;
            if line.trim().is_empty() {
                continue;
            }
            let values = split_line(line, line_number);
            return Some(build_record(self.headers, values, line_number));
        }
    }
}

/// Checks that every required column is present in `headers`.
pub fn validate_headers(headers: &[String]) -> Result<(), ParseError> {
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header == column) {
            return Err(ParseError::MissingColumn(column.to_string()));
        }
    }
    Ok(())
}

/// Zips header names with cell values.
///
/// Short rows are padded with empty strings. Surplus values are folded,
/// comma-joined, into the last column so an unquoted trailing tag list stays
/// in one cell.
pub fn build_record(headers: &[String], mut values: Vec<String>, line: usize) -> Record {
    if headers.is_empty() {
        return Record {
            line,
            fields: BTreeMap::new(),
        };
    }

    let last = headers.len() - 1;
    if values.len() > headers.len() {
        let surplus: Vec<String> = values.drain(last..).collect();
        values.push(surplus.join(","));
    }
    values.resize(headers.len(), String::new());

    let fields = headers.iter().cloned().zip(values).collect();
    Record { line, fields }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Unquoted,
    Quoted,
}

/// Splits a single line into trimmed field values.
pub fn split_line(line: &str, line_number: usize) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut state = QuoteState::Unquoted;
    let mut was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match (ch, state) {
            ('\\', _) if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            ('"', QuoteState::Quoted) if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            ('"', QuoteState::Quoted) => state = QuoteState::Unquoted,
            ('"', QuoteState::Unquoted) => {
                state = QuoteState::Quoted;
                was_quoted = true;
            }
            (',', QuoteState::Unquoted) => {
                fields.push(finish_field(&mut current, was_quoted));
                was_quoted = false;
            }
            (other, _) => current.push(other),
        }
    }

    if state == QuoteState::Quoted {
        debug!(line = line_number, "unterminated quote, flushing partial field");
    }
    fields.push(finish_field(&mut current, was_quoted));
    fields
}

// Quoted fields already lost their delimiters in the state machine; what is
// left of their quotes is content.
fn finish_field(current: &mut String, was_quoted: bool) -> String {
    let field = std::mem::take(current);
    let field = field.trim();
    if was_quoted {
        field.to_string()
    } else {
        strip_wrapping_quotes(field).to_string()
    }
}

fn strip_wrapping_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Splits a tags cell on commas, dropping empty entries.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
