//! Minimal CSV writer and reader for admin exports.
//!
//! # Invariants
//! - Header comes from the first row's columns, in order.
//! - Values containing `,` `"` `\r` or `\n` are quoted; inner quotes doubled.
//! - Null values serialize to empty fields.
//! - Records are joined by `\n` without a trailing newline.

use super::ExportRow;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Serializes `rows` to CSV text. Empty input yields an empty string.
pub fn to_csv(rows: &[ExportRow]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let columns = first.columns().collect::<Vec<_>>();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        columns
            .iter()
            .map(|column| escape_field(column))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in rows {
        lines.push(
            columns
                .iter()
                .map(|column| row.get(column).map(escape_field).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}

/// Escapes one field value.
pub fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Parse failure for malformed CSV text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvParseError {
    /// A quoted field was not closed before end of input.
    UnterminatedQuote { record: usize },
    /// A closing quote was followed by something other than `,` or a newline.
    UnexpectedCharAfterQuote { record: usize, found: char },
}

impl Display for CsvParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnterminatedQuote { record } => {
                write!(f, "unterminated quoted field in record {record}")
            }
            Self::UnexpectedCharAfterQuote { record, found } => {
                write!(f, "unexpected `{found}` after closing quote in record {record}")
            }
        }
    }
}

impl Error for CsvParseError {}

/// Parses CSV text produced by `to_csv` back into records of fields.
///
/// Accepts both `\n` and `\r\n` record separators outside quotes.
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>, CsvParseError> {
    let mut records = Vec::new();
    if text.is_empty() {
        return Ok(records);
    }

    let mut record = Vec::new();
    let mut field = String::new();
    let mut chars = text.chars().peekable();
    let mut in_quotes = false;
    let mut after_quote = false;

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                    after_quote = true;
                }
            } else {
                field.push(ch);
            }
            continue;
        }

        match ch {
            '"' if field.is_empty() && !after_quote => in_quotes = true,
            ',' => {
                record.push(std::mem::take(&mut field));
                after_quote = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                after_quote = false;
            }
            other if after_quote => {
                return Err(CsvParseError::UnexpectedCharAfterQuote {
                    record: records.len(),
                    found: other,
                });
            }
            other => field.push(other),
        }
    }

    if in_quotes {
        return Err(CsvParseError::UnterminatedQuote {
            record: records.len(),
        });
    }
    record.push(field);
    records.push(record);
    Ok(records)
}
