//! Bulk sink boundary
//!
//! The pipeline only needs one call from the store: insert a batch, skip rows
//! whose `olid` already exists, and say how many rows were written.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::models::NewAuthor;

/// Destination for normalized author batches
#[async_trait]
pub trait AuthorSink: Send + Sync {
    /// Insert `authors`, silently skipping existing identifiers
    ///
    /// Returns the number of rows actually written (at most `authors.len()`).
    /// Any error means nothing from this batch should be considered written.
    async fn bulk_insert(&self, authors: &[NewAuthor]) -> Result<u64, SinkError>;
}

#[async_trait]
impl<S: AuthorSink + ?Sized> AuthorSink for Arc<S> {
    async fn bulk_insert(&self, authors: &[NewAuthor]) -> Result<u64, SinkError> {
        (**self).bulk_insert(authors).await
    }
}

/// A batch submission that failed for a reason other than duplicates
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Batch rejected: {0}")]
    Rejected(String),
}

/// What to do with the members of a batch whose submission failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFailurePolicy {
    /// Count every member as an error and move on
    #[default]
    FailWholeBatch,
    /// Resubmit members one at a time so only the bad rows are lost
    RetryPerRecord,
}

impl std::str::FromStr for BatchFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail_whole_batch" | "fail" | "batch" => Ok(BatchFailurePolicy::FailWholeBatch),
            "retry_per_record" | "retry" | "record" => Ok(BatchFailurePolicy::RetryPerRecord),
            other => Err(format!("Unknown batch failure policy: {}", other)),
        }
    }
}
