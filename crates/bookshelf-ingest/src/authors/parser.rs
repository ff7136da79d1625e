//! Dump line parser
//!
//! # Format
//! ```text
//! type \t key \t revision \t last_modified \t json
//! /type/author \t /authors/OL23919A \t 12 \t 2021-10-04T10:31:24.585472 \t {"name": "J.K. Rowling", ...}
//! ```
//!
//! Columns past the fifth are ignored. The JSON column is not decoded here.

use super::models::{ParsedRecord, RawLine};
use super::DUMP_COLUMNS;

/// Characters of a malformed line kept in log output
pub const RAW_EXCERPT_CHARS: usize = 120;

/// A line with fewer than five tab-separated columns
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Line {line_number}: expected at least {expected} fields, got {found}")]
pub struct MalformedLine {
    pub line_number: usize,
    pub expected: usize,
    pub found: usize,
    pub raw: String,
}

impl MalformedLine {
    /// The start of the offending line, cut to [`RAW_EXCERPT_CHARS`] characters
    pub fn raw_excerpt(&self) -> &str {
        match self.raw.char_indices().nth(RAW_EXCERPT_CHARS) {
            Some((cut, _)) => &self.raw[..cut],
            None => &self.raw,
        }
    }
}

/// Split a dump line into its columns
pub fn parse_line(line: &RawLine) -> Result<ParsedRecord<'_>, MalformedLine> {
    let mut fields = line.text.split('\t');

    match (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) {
        (
            Some(record_type),
            Some(key),
            Some(revision),
            Some(last_modified),
            Some(raw_payload),
        ) => Ok(ParsedRecord {
            line_number: line.number,
            record_type,
            key,
            revision,
            last_modified,
            raw_payload,
        }),
        _ => Err(MalformedLine {
            line_number: line.number,
            expected: DUMP_COLUMNS,
            found: line.text.split('\t').count(),
            raw: line.text.clone(),
        }),
    }
}
