//! Author payload normalization
//!
//! Turns an author [`ParsedRecord`] into the [`NewAuthor`] row written by the
//! sink. Field rules:
//!
//! | Column            | Source                                                        |
//! |-------------------|---------------------------------------------------------------|
//! | `olid`            | key column minus `/authors/`                                  |
//! | `name`            | `name`, or `"Unknown"`                                        |
//! | `birth_date`      | `created.value` when it parses as a timestamp                 |
//! | `alternate_names` | `alternate_names` when it is an array (strings only)          |
//! | `link`            | `https://openlibrary.org` + `key`, or `/authors/<olid>`       |
//! | `rating_count`    | 0                                                             |
//! | `average_rating`  | 0.0                                                           |
//! | `gender`          | `unspecified`                                                 |
//! | `image_url`       | covers URL for `photos[0]`                                    |
//! | `about`           | `bio`, else `wikipedia_excerpt`; either may be `{"value": ..}` |

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use super::models::{Gender, NewAuthor, ParsedRecord};
use super::{AUTHOR_KEY_PREFIX, COVERS_URL, OPEN_LIBRARY_URL, UNKNOWN_AUTHOR_NAME};

/// Why an author record could not be normalized
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Line {line_number}: invalid JSON payload: {source}")]
    PayloadDecode {
        line_number: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line_number}: payload is not a JSON object")]
    NotAnObject { line_number: usize },

    #[error("Line {line_number}: record has an empty key")]
    MissingIdentifier { line_number: usize },
}

impl NormalizeError {
    pub fn line_number(&self) -> usize {
        match self {
            NormalizeError::PayloadDecode { line_number, .. }
            | NormalizeError::NotAnObject { line_number }
            | NormalizeError::MissingIdentifier { line_number } => *line_number,
        }
    }
}

/// Build a [`NewAuthor`] from an author record
pub fn normalize_author(record: &ParsedRecord<'_>) -> Result<NewAuthor, NormalizeError> {
    let line_number = record.line_number;

    let payload: Value = serde_json::from_str(record.raw_payload)
        .map_err(|source| NormalizeError::PayloadDecode {
            line_number,
            source,
        })?;
    let Value::Object(payload) = payload else {
        return Err(NormalizeError::NotAnObject { line_number });
    };

    let olid = author_identifier(record.key);
    if olid.is_empty() {
        return Err(NormalizeError::MissingIdentifier { line_number });
    }

    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_AUTHOR_NAME)
        .to_string();

    let birth_date = payload
        .get("created")
        .and_then(|created| created.get("value"))
        .and_then(Value::as_str)
        .and_then(|raw| {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                debug!(line = line_number, value = raw, "Unparseable created timestamp");
            }
            parsed
        });

    let alternate_names = payload
        .get("alternate_names")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let link = match payload.get("key").and_then(Value::as_str) {
        Some(key) if !key.is_empty() => format!("{}{}", OPEN_LIBRARY_URL, key),
        _ => format!("{}{}{}", OPEN_LIBRARY_URL, AUTHOR_KEY_PREFIX, olid),
    };

    Ok(NewAuthor {
        olid: olid.to_string(),
        name,
        birth_date,
        alternate_names,
        link,
        rating_count: 0,
        average_rating: 0.0,
        gender: Gender::Unspecified,
        image_url: image_url(&payload),
        about: about_text(&payload),
    })
}

/// Stored identifier: the key column without its `/authors/` prefix
pub fn author_identifier(key: &str) -> &str {
    let key = key.trim();
    key.strip_prefix(AUTHOR_KEY_PREFIX).unwrap_or(key)
}

fn image_url(payload: &Map<String, Value>) -> Option<String> {
    let photo_id = match payload.get("photos")?.as_array()?.first()? {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => return None,
    };

    Some(format!("{}/a/id/{}-L.jpg", COVERS_URL, photo_id))
}

/// `bio` wins whenever it is set, even if no text can be pulled out of it;
/// `wikipedia_excerpt` is only consulted when `bio` is absent or empty.
fn about_text(payload: &Map<String, Value>) -> String {
    ["bio", "wikipedia_excerpt"]
        .iter()
        .find_map(|field| payload.get(*field).filter(|value| is_set(value)))
        .and_then(text_of)
        .unwrap_or_default()
        .to_string()
}

/// Text fields appear either flat (`"bio": "..."`) or typed
/// (`"bio": {"type": "/type/text", "value": "..."}`).
fn text_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(text) => Some(text),
        Value::Object(typed) => typed.get("value").and_then(Value::as_str),
        _ => None,
    }
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Accepts RFC 3339, the dump's naive `2008-04-01T03:28:50.625462` (taken as
/// UTC) and bare dates.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
