//! Import configuration
//!
//! Loaded from environment variables (after `.env`), then overridden by CLI
//! flags through the `with_*` builders.

use anyhow::Context;
use bookshelf_common::{BookshelfError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::authors::BatchFailurePolicy;

/// Batch size for library callers
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Batch size used by the `import-authors` command when none is given
pub const DEFAULT_CLI_BATCH_SIZE: usize = 50;

pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 30;

/// Read-ahead buffer for the dump file
pub const DEFAULT_READ_BUFFER_BYTES: usize = 256 * 1024;

/// Batch size for the database-free `scan` command
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 10_000;

/// Upper bound on batch size; larger batches only grow memory
pub const MAX_BATCH_SIZE: usize = 100_000;

/// Author import configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportConfig {
    /// Entities per bulk insert
    pub batch_size: usize,
    /// Seconds between progress reports
    pub report_interval_secs: u64,
    /// Read-ahead buffer capacity in bytes
    pub read_buffer_bytes: usize,
    /// Stop after this many non-blank lines (sampling runs)
    pub parse_limit: Option<u64>,
    /// What to do with a batch the sink rejects
    pub failure_policy: BatchFailurePolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            report_interval_secs: DEFAULT_REPORT_INTERVAL_SECS,
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            parse_limit: None,
            failure_policy: BatchFailurePolicy::default(),
        }
    }
}

impl ImportConfig {
    /// Load from `IMPORT_*` environment variables, falling back to defaults
    ///
    /// Unset variables use defaults; set but unparseable ones are errors.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let retry_per_record: bool = env_parse("IMPORT_RETRY_PER_RECORD")?.unwrap_or(false);
        let failure_policy = if retry_per_record {
            BatchFailurePolicy::RetryPerRecord
        } else {
            defaults.failure_policy
        };

        let config = Self {
            batch_size: env_parse("IMPORT_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            report_interval_secs: env_parse("IMPORT_REPORT_INTERVAL_SECS")?
                .unwrap_or(defaults.report_interval_secs),
            read_buffer_bytes: env_parse("IMPORT_READ_BUFFER_BYTES")?
                .unwrap_or(defaults.read_buffer_bytes),
            parse_limit: env_parse("IMPORT_PARSE_LIMIT")?,
            failure_policy,
        };

        config
            .validate()
            .context("Invalid import configuration")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(BookshelfError::config("batch size must be greater than 0"));
        }
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(BookshelfError::config(format!(
                "batch size {} exceeds maximum {}",
                self.batch_size, MAX_BATCH_SIZE
            )));
        }
        if self.report_interval_secs == 0 {
            return Err(BookshelfError::config(
                "report interval must be at least 1 second",
            ));
        }
        if self.read_buffer_bytes == 0 {
            return Err(BookshelfError::config(
                "read buffer must be greater than 0 bytes",
            ));
        }
        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_report_interval_secs(mut self, secs: u64) -> Self {
        self.report_interval_secs = secs;
        self
    }

    pub fn with_read_buffer_bytes(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes;
        self
    }

    pub fn with_parse_limit(mut self, limit: Option<u64>) -> Self {
        self.parse_limit = limit;
        self
    }

    pub fn with_failure_policy(mut self, policy: BatchFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

fn env_parse<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| BookshelfError::parse(format!("{}={:?}: {}", name, value, e)))
            .with_context(|| format!("Failed to parse {}", name)),
        Err(_) => Ok(None),
    }
}
