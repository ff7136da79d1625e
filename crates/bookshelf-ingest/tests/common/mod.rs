//! Shared helpers for bookshelf-ingest integration tests
//!
//! - [`RecordingSink`]: in-memory sink that remembers every batch and skips
//!   identifiers it has already stored, like the Postgres sink does
//! - dump fixtures written to temp files
//! - [`FailingReader`]: stream that breaks after serving its bytes
//! - [`TestDb`]: throwaway PostgreSQL container with migrations applied

#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use bookshelf_ingest::authors::{AuthorSink, NewAuthor, SinkError};
use bookshelf_ingest::config::ImportConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashSet;
use std::io::Write;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context as TaskContext, Poll};
use tempfile::NamedTempFile;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::io::{AsyncRead, ReadBuf};

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bookshelf_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Recording sink
// ============================================================================

#[derive(Default)]
struct SinkState {
    batch_sizes: Vec<usize>,
    olids: HashSet<String>,
    stored: Vec<NewAuthor>,
}

/// In-memory [`AuthorSink`] with scripted failures
#[derive(Default)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
    /// 1-based call numbers that fail outright
    failing_calls: HashSet<usize>,
    /// Any batch containing one of these identifiers fails
    rejected_olids: HashSet<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_call(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    pub fn rejecting_olid(mut self, olid: &str) -> Self {
        self.rejected_olids.insert(olid.to_string());
        self
    }

    /// Size of every batch submitted, in call order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().batch_sizes.clone()
    }

    /// Every row accepted so far, in insertion order
    pub fn stored(&self) -> Vec<NewAuthor> {
        self.state.lock().unwrap().stored.clone()
    }
}

#[async_trait]
impl AuthorSink for RecordingSink {
    async fn bulk_insert(&self, authors: &[NewAuthor]) -> Result<u64, SinkError> {
        let mut state = self.state.lock().unwrap();
        state.batch_sizes.push(authors.len());
        let call = state.batch_sizes.len();

        if self.failing_calls.contains(&call) {
            return Err(SinkError::Rejected(format!("scripted failure on call {}", call)));
        }
        if let Some(bad) = authors
            .iter()
            .find(|author| self.rejected_olids.contains(&author.olid))
        {
            return Err(SinkError::Rejected(format!("rejected {}", bad.olid)));
        }

        let mut inserted = 0;
        for author in authors {
            if state.olids.insert(author.olid.clone()) {
                state.stored.push(author.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

// ============================================================================
// Dump fixtures
// ============================================================================

/// A well-formed author line with identifier `OL{n}A`
pub fn author_line(n: usize) -> String {
    format!(
        "/type/author\t/authors/OL{n}A\t3\t2021-10-04T10:31:24.585472\t{{\"name\": \"Author {n}\", \"key\": \"/authors/OL{n}A\", \"created\": {{\"type\": \"/type/datetime\", \"value\": \"2008-04-01T03:28:50.625462\"}}}}"
    )
}

pub fn author_lines(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(author_line).collect()
}

/// Write `lines` joined by `\n` (with a trailing newline) to a temp file
pub fn write_dump<S: AsRef<str>>(lines: &[S]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line.as_ref()).unwrap();
    }
    file.flush().unwrap();
    file
}

pub fn write_raw_dump(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

/// Serves `data`, then fails every further read
pub struct FailingReader {
    data: Vec<u8>,
    position: usize,
}

impl FailingReader {
    /// The given lines, each `\n`-terminated, followed by a read error
    pub fn after_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut data = Vec::new();
        for line in lines {
            data.extend_from_slice(line.as_ref().as_bytes());
            data.push(b'\n');
        }
        Self { data, position: 0 }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let remaining = &self.data[self.position..];
        if remaining.is_empty() {
            return Poll::Ready(Err(std::io::Error::other("device went away")));
        }
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        self.position += n;
        Poll::Ready(Ok(()))
    }
}

pub fn test_config(batch_size: usize) -> ImportConfig {
    ImportConfig::default()
        .with_batch_size(batch_size)
        .with_read_buffer_bytes(4096)
}

// ============================================================================
// PostgreSQL container
// ============================================================================

/// PostgreSQL container with the workspace migrations applied
///
/// The container stops when this value is dropped.
pub struct TestDb {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestDb {
    pub async fn start() -> Result<Self> {
        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;
        let conn_string = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&conn_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }
}
