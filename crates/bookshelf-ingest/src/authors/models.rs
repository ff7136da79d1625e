//! Data models for author imports
//!
//! The import path moves data through three shapes:
//! [`RawLine`] (as read) → [`ParsedRecord`] (columns split, payload still
//! opaque) → [`NewAuthor`] (the row handed to the sink). [`Author`] is the
//! stored row returned by the read path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AUTHOR_RECORD_TYPE;

/// One line of the dump, before any splitting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based position in the file, blank lines included
    pub number: usize,
    pub text: String,
}

impl RawLine {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    /// Whitespace-only lines are not records and are not counted as seen
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// The five dump columns, borrowed from the line they came from
///
/// `raw_payload` is left undecoded so that non-author rows can be dropped
/// without paying for JSON parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedRecord<'a> {
    pub line_number: usize,
    pub record_type: &'a str,
    pub key: &'a str,
    pub revision: &'a str,
    pub last_modified: &'a str,
    pub raw_payload: &'a str,
}

impl ParsedRecord<'_> {
    pub fn is_author(&self) -> bool {
        self.record_type == AUTHOR_RECORD_TYPE
    }
}

/// Author gender, stored as the `author_gender` Postgres enum
///
/// The dump carries no gender information, so imports always write
/// [`Gender::Unspecified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "author_gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unspecified,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unspecified => "unspecified",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "unspecified" | "others" => Ok(Gender::Unspecified),
            other => Err(format!("Unknown gender: {}", other)),
        }
    }
}

/// Creation shape of an author row, as produced by the normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuthor {
    /// Open Library id with the `/authors/` prefix removed, e.g. `OL23919A`
    pub olid: String,
    pub name: String,
    pub birth_date: Option<DateTime<Utc>>,
    pub alternate_names: Vec<String>,
    pub link: String,
    pub rating_count: i32,
    pub average_rating: f64,
    pub gender: Gender,
    pub image_url: Option<String>,
    pub about: String,
}

/// A stored author row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Author {
    pub id: i64,
    pub uuid: Uuid,
    pub olid: String,
    pub name: String,
    pub birth_date: Option<DateTime<Utc>>,
    pub alternate_names: Vec<String>,
    pub link: String,
    pub rating_count: i32,
    pub average_rating: f64,
    pub gender: Gender,
    pub image_url: Option<String>,
    pub about: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorUpdate {
    pub name: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
    pub alternate_names: Option<Vec<String>>,
    pub link: Option<String>,
    pub rating_count: Option<i32>,
    pub average_rating: Option<f64>,
    pub gender: Option<Gender>,
    pub image_url: Option<String>,
    pub about: Option<String>,
}

impl AuthorUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.birth_date.is_none()
            && self.alternate_names.is_none()
            && self.link.is_none()
            && self.rating_count.is_none()
            && self.average_rating.is_none()
            && self.gender.is_none()
            && self.image_url.is_none()
            && self.about.is_none()
    }
}

/// Default page size for author searches
pub const DEFAULT_SEARCH_TAKE: i64 = 50;

/// Filters for [`AuthorStore::search`](super::AuthorStore::search)
///
/// `name` and `about` match case-insensitive substrings, `alternate_name`
/// must equal one element of the stored list. Unset filters match everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSearchParams {
    pub name: Option<String>,
    pub alternate_name: Option<String>,
    pub about: Option<String>,
    pub take: i64,
    pub skip: i64,
}

impl Default for AuthorSearchParams {
    fn default() -> Self {
        Self {
            name: None,
            alternate_name: None,
            about: None,
            take: DEFAULT_SEARCH_TAKE,
            skip: 0,
        }
    }
}

impl AuthorSearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_alternate_name(mut self, alternate_name: impl Into<String>) -> Self {
        self.alternate_name = Some(alternate_name.into());
        self
    }

    pub fn with_about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn with_take(mut self, take: i64) -> Self {
        self.take = take;
        self
    }

    pub fn with_skip(mut self, skip: i64) -> Self {
        self.skip = skip;
        self
    }
}
