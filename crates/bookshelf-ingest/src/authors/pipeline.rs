//! Author import pipeline
//!
//! One sequential pass: read a line, parse it, drop non-author rows,
//! normalize, batch, and hand full batches to the sink. At most one bulk
//! insert is in flight; per-line and per-batch failures are counted and the
//! run keeps going. Only failing to open the dump ends the run early.

use bookshelf_common::memory::format_bytes;
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::batcher::Batcher;
use super::models::{NewAuthor, RawLine};
use super::normalizer::normalize_author;
use super::parser::parse_line;
use super::sink::{AuthorSink, BatchFailurePolicy};
use super::source::LineSource;
use super::stats::{ProgressReporter, RunStats};
use super::Result;
use crate::config::ImportConfig;

/// Lifecycle of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    /// Pulling lines from the source
    Running,
    /// Input exhausted, flushing the last partial batch
    Draining,
    Done,
    /// The dump could not be opened
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::Running => "running",
            PipelineState::Draining => "draining",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Streams an author dump into an [`AuthorSink`]
pub struct AuthorImportPipeline<S> {
    config: ImportConfig,
    sink: S,
    state: PipelineState,
}

impl<S: AuthorSink> AuthorImportPipeline<S> {
    /// Create a pipeline; fails if `config` does not validate
    pub fn new(config: ImportConfig, sink: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink,
            state: PipelineState::Idle,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Import every author record in the dump at `path`
    ///
    /// Returns [`AuthorImportError::FileNotFound`](super::AuthorImportError::FileNotFound)
    /// if the dump cannot be opened; every other failure is reflected in the
    /// returned [`RunStats`].
    pub async fn run(&mut self, path: impl AsRef<Path>) -> Result<RunStats> {
        let path = path.as_ref();
        self.state = PipelineState::Idle;

        let source = match LineSource::open(path, self.config.read_buffer_bytes).await {
            Ok(source) => source,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Cannot open author dump");
                self.state = PipelineState::Failed;
                return Err(e);
            },
        };

        self.run_source(source).await
    }

    /// Import every author record from an opened source
    ///
    /// A read error part way through ends input: the open batch is still
    /// flushed and [`RunStats::input_truncated`] is set.
    pub async fn run_source(&mut self, mut source: LineSource) -> Result<RunStats> {
        info!(
            path = %source.path().display(),
            size = %format_bytes(source.file_size()),
            batch_size = self.config.batch_size,
            failure_policy = ?self.config.failure_policy,
            parse_limit = ?self.config.parse_limit,
            "Starting author import"
        );

        self.state = PipelineState::Running;
        let mut stats = RunStats::new();
        let mut reporter = ProgressReporter::new(self.config.report_interval());
        let mut batcher = Batcher::new(self.config.batch_size);

        loop {
            if let Some(limit) = self.config.parse_limit {
                if stats.lines_seen >= limit {
                    info!(limit, "Parse limit reached, stopping");
                    break;
                }
            }

            let line = match source.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!(
                        line = source.lines_read() + 1,
                        error = %e,
                        "Read failed, treating as end of input"
                    );
                    stats.input_truncated = true;
                    break;
                },
            };

            if let Some(batch) = route_line(&line, &mut stats, &mut batcher) {
                self.flush(batch, &mut stats).await;
            }

            reporter.tick(&stats);
        }

        self.state = PipelineState::Draining;
        if let Some(batch) = batcher.finish() {
            self.flush(batch, &mut stats).await;
        }

        reporter.finish(&stats);
        self.state = PipelineState::Done;
        Ok(stats)
    }

    async fn flush(&self, batch: Vec<NewAuthor>, stats: &mut RunStats) {
        stats.batches_flushed += 1;
        let batch_number = stats.batches_flushed;
        let size = batch.len() as u64;

        match self.sink.bulk_insert(&batch).await {
            Ok(inserted) => {
                let inserted = inserted.min(size);
                stats.records_imported += inserted;
                stats.records_duplicate += size - inserted;
                debug!(
                    batch = batch_number,
                    size,
                    inserted,
                    duplicates = size - inserted,
                    "Batch imported"
                );
            },
            Err(e) => {
                stats.batches_failed += 1;
                error!(batch = batch_number, size, error = %e, "Batch insert failed");

                match self.config.failure_policy {
                    BatchFailurePolicy::FailWholeBatch => {
                        stats.records_errored += size;
                    },
                    BatchFailurePolicy::RetryPerRecord => {
                        self.retry_per_record(batch_number, &batch, stats).await;
                    },
                }
            },
        }
    }

    async fn retry_per_record(&self, batch_number: u64, batch: &[NewAuthor], stats: &mut RunStats) {
        let mut recovered = 0u64;

        for author in batch {
            match self.sink.bulk_insert(std::slice::from_ref(author)).await {
                Ok(0) => stats.records_duplicate += 1,
                Ok(_) => {
                    stats.records_imported += 1;
                    recovered += 1;
                },
                Err(e) => {
                    stats.records_errored += 1;
                    warn!(batch = batch_number, olid = %author.olid, error = %e, "Record insert failed");
                },
            }
        }

        info!(
            batch = batch_number,
            size = batch.len(),
            recovered,
            "Retried failed batch record by record"
        );
    }
}

/// Account for one line and push its entity, if any, into the open batch
///
/// Returns a full batch that must be flushed.
fn route_line(
    line: &RawLine,
    stats: &mut RunStats,
    batcher: &mut Batcher<NewAuthor>,
) -> Option<Vec<NewAuthor>> {
    stats.bytes_read += line.text.len() as u64;

    if line.is_blank() {
        stats.blank_lines += 1;
        return None;
    }
    stats.lines_seen += 1;

    let record = match parse_line(line) {
        Ok(record) => record,
        Err(malformed) => {
            stats.malformed_lines += 1;
            warn!(
                line = malformed.line_number,
                fields = malformed.found,
                raw = %malformed.raw_excerpt(),
                "Malformed line skipped"
            );
            return None;
        },
    };

    if !record.is_author() {
        stats.skipped_records += 1;
        return None;
    }

    match normalize_author(&record) {
        Ok(author) => {
            stats.records_normalized += 1;
            batcher.push(author)
        },
        Err(e) => {
            stats.records_errored += 1;
            warn!(line = e.line_number(), error = %e, "Author record rejected");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authors::sink::SinkError;
    use async_trait::async_trait;

    struct NullSink;

    #[async_trait]
    impl AuthorSink for NullSink {
        async fn bulk_insert(&self, authors: &[NewAuthor]) -> std::result::Result<u64, SinkError> {
            Ok(authors.len() as u64)
        }
    }

    const ADA: &str = "/type/author\t/authors/OL1A\t1\t2020-01-01\t{\"name\":\"Ada\"}";

    #[test]
    fn test_route_line_outcomes() {
        let mut stats = RunStats::new();
        let mut batcher = Batcher::new(10);

        let lines = [
            RawLine::new(1, ADA),
            RawLine::new(2, ""),
            RawLine::new(3, "a\tb\tc"),
            RawLine::new(4, "/type/edition\tkey\t1\tdate\t{}"),
            RawLine::new(5, "/type/author\t/authors/OL2A\t1\tdate\t{not json"),
        ];
        for line in &lines {
            assert!(route_line(line, &mut stats, &mut batcher).is_none());
        }

        assert_eq!(stats.lines_seen, 4);
        assert_eq!(stats.blank_lines, 1);
        assert_eq!(stats.records_normalized, 1);
        assert_eq!(stats.malformed_lines, 1);
        assert_eq!(stats.skipped_records, 1);
        assert_eq!(stats.records_errored, 1);
        assert_eq!(batcher.len(), 1);
    }

    #[test]
    fn test_route_line_returns_full_batch() {
        let mut stats = RunStats::new();
        let mut batcher = Batcher::new(2);

        assert!(route_line(&RawLine::new(1, ADA), &mut stats, &mut batcher).is_none());
        let batch = route_line(&RawLine::new(2, ADA), &mut stats, &mut batcher).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ImportConfig::default().with_batch_size(0);
        assert!(AuthorImportPipeline::new(config, NullSink).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_fails_pipeline() {
        let mut pipeline = AuthorImportPipeline::new(ImportConfig::default(), NullSink).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let result = pipeline.run("/nonexistent/authors.txt").await;
        assert!(matches!(
            result,
            Err(crate::authors::AuthorImportError::FileNotFound { .. })
        ));
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Draining.to_string(), "draining");
    }
}
