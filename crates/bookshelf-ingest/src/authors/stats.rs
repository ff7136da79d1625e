//! Run statistics and progress reporting

use bookshelf_common::memory::{format_bytes, memory_summary};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Counters for one import run
///
/// Every line that is not blank lands in exactly one of imported, duplicate,
/// errored, skipped or malformed, see [`RunStats::is_balanced`].
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Non-blank lines pulled from the source
    pub lines_seen: u64,
    /// Whitespace-only lines, not part of `lines_seen`
    pub blank_lines: u64,
    /// Author records that made it into a batch
    pub records_normalized: u64,
    /// Rows the sink reported as written
    pub records_imported: u64,
    /// Batch members the sink skipped because the identifier already existed
    pub records_duplicate: u64,
    /// Decode failures plus members of failed batches
    pub records_errored: u64,
    /// Lines with too few columns
    pub malformed_lines: u64,
    /// Well-formed records of a type other than author
    pub skipped_records: u64,
    /// Batches submitted to the sink, failed ones included
    pub batches_flushed: u64,
    pub batches_failed: u64,
    /// Bytes of line text read (terminators excluded)
    pub bytes_read: u64,
    /// Input ended on a read error rather than end of file
    pub input_truncated: bool,
    pub started_at: Instant,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            lines_seen: 0,
            blank_lines: 0,
            records_normalized: 0,
            records_imported: 0,
            records_duplicate: 0,
            records_errored: 0,
            malformed_lines: 0,
            skipped_records: 0,
            batches_flushed: 0,
            batches_failed: 0,
            bytes_read: 0,
            input_truncated: false,
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Lines per second over the whole run
    pub fn average_rate(&self) -> f64 {
        rate(self.lines_seen, self.elapsed())
    }

    /// Lines with a final outcome
    pub fn lines_accounted(&self) -> u64 {
        self.records_imported
            + self.records_duplicate
            + self.records_errored
            + self.skipped_records
            + self.malformed_lines
    }

    /// True once every seen line has exactly one outcome
    ///
    /// Only holds between batches: normalized records waiting in the open
    /// batch are seen but not yet accounted.
    pub fn is_balanced(&self) -> bool {
        self.lines_seen == self.lines_accounted()
    }
}

fn rate(lines: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        lines as f64 / secs
    } else {
        0.0
    }
}

/// Logs throughput and memory on a fixed wall-clock interval
///
/// Purely observational: nothing it does changes what the pipeline does.
#[derive(Debug)]
pub struct ProgressReporter {
    interval: Duration,
    last_report: Instant,
    lines_at_last_report: u64,
    reports: u64,
}

impl ProgressReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: Instant::now(),
            lines_at_last_report: 0,
            reports: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Interval reports logged so far
    pub fn reports(&self) -> u64 {
        self.reports
    }

    /// Log a progress line if the interval has elapsed since the last one
    ///
    /// Returns whether a report was logged.
    pub fn tick(&mut self, stats: &RunStats) -> bool {
        let since_last = self.last_report.elapsed();
        if since_last < self.interval {
            return false;
        }

        let lines = stats.lines_seen.saturating_sub(self.lines_at_last_report);
        info!(
            lines = stats.lines_seen,
            imported = stats.records_imported,
            errored = stats.records_errored,
            rate = %format!("{:.0} lines/s", rate(lines, since_last)),
            memory = %memory_summary(),
            "Import progress"
        );

        self.last_report = Instant::now();
        self.lines_at_last_report = stats.lines_seen;
        self.reports += 1;
        true
    }

    /// Log the final totals
    pub fn finish(&self, stats: &RunStats) {
        let elapsed = stats.elapsed();
        info!(
            lines = stats.lines_seen,
            blank = stats.blank_lines,
            imported = stats.records_imported,
            duplicates = stats.records_duplicate,
            errored = stats.records_errored,
            malformed = stats.malformed_lines,
            skipped = stats.skipped_records,
            batches = stats.batches_flushed,
            batches_failed = stats.batches_failed,
            read = %format_bytes(stats.bytes_read),
            elapsed = %format!("{:.2}s", elapsed.as_secs_f64()),
            rate = %format!("{:.0} lines/s", stats.average_rate()),
            memory = %memory_summary(),
            truncated = stats.input_truncated,
            "Import finished"
        );
    }
}
