//! Database-free dump scan
//!
//! Reads a dump in large batches and logs, for each batch, its line range,
//! the first and last record, and the record-type distribution. Useful for
//! sizing a dump before importing it.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use super::batcher::Batcher;
use super::parser::parse_line;
use super::source::LineSource;
use super::stats::{ProgressReporter, RunStats};
use super::Result;
use crate::config::MAX_BATCH_SIZE;
use bookshelf_common::memory::{format_bytes, memory_summary};
use bookshelf_common::BookshelfError;

/// Totals for a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Non-blank lines
    pub lines: u64,
    pub blank_lines: u64,
    pub malformed_lines: u64,
    pub batches: u64,
    /// Record count per type column value
    pub type_counts: BTreeMap<String, u64>,
    pub input_truncated: bool,
}

impl ScanSummary {
    /// Records of the given type, e.g. `/type/author`
    pub fn count_of(&self, record_type: &str) -> u64 {
        self.type_counts.get(record_type).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
struct ScannedRecord {
    line_number: usize,
    record_type: String,
    key: String,
    payload: String,
}

/// Scan the dump at `path` in batches of `batch_size` records
///
/// `batch_size` must be between 1 and [`MAX_BATCH_SIZE`].
pub async fn scan_file(
    path: impl AsRef<Path>,
    batch_size: usize,
    read_buffer_bytes: usize,
    report_interval: Duration,
) -> Result<ScanSummary> {
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        return Err(BookshelfError::config(format!(
            "scan batch size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, batch_size
        ))
        .into());
    }

    let path = path.as_ref();
    let mut source = LineSource::open(path, read_buffer_bytes).await?;

    info!(
        path = %path.display(),
        size = %format_bytes(source.file_size()),
        batch_size,
        memory = %memory_summary(),
        "Starting dump scan"
    );

    let mut stats = RunStats::new();
    let mut reporter = ProgressReporter::new(report_interval);
    let mut batcher = Batcher::new(batch_size);
    let mut summary = ScanSummary::default();

    loop {
        let line = match source.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Read failed, ending scan early");
                summary.input_truncated = true;
                break;
            },
        };
        stats.bytes_read += line.text.len() as u64;

        if line.is_blank() {
            summary.blank_lines += 1;
            continue;
        }
        stats.lines_seen += 1;

        let full = match parse_line(&line) {
            Ok(record) => batcher.push(ScannedRecord {
                line_number: record.line_number,
                record_type: record.record_type.to_string(),
                key: record.key.to_string(),
                payload: record.raw_payload.to_string(),
            }),
            Err(malformed) => {
                warn!(
                    line = malformed.line_number,
                    fields = malformed.found,
                    raw = %malformed.raw_excerpt(),
                    "Line has fewer than 5 fields"
                );
                stats.malformed_lines += 1;
                None
            },
        };

        if let Some(batch) = full {
            summary.batches += 1;
            summarize_batch(summary.batches, &batch, &mut summary.type_counts);
        }

        reporter.tick(&stats);
    }

    if let Some(batch) = batcher.finish() {
        summary.batches += 1;
        summarize_batch(summary.batches, &batch, &mut summary.type_counts);
    }

    summary.lines = stats.lines_seen;
    summary.malformed_lines = stats.malformed_lines;

    info!(
        lines = summary.lines,
        blank = summary.blank_lines,
        malformed = summary.malformed_lines,
        batches = summary.batches,
        read = %format_bytes(stats.bytes_read),
        elapsed = %format!("{:.2}s", stats.elapsed().as_secs_f64()),
        rate = %format!("{:.2} lines/s", stats.average_rate()),
        memory = %memory_summary(),
        "Dump scan finished"
    );

    Ok(summary)
}

fn summarize_batch(number: u64, batch: &[ScannedRecord], totals: &mut BTreeMap<String, u64>) {
    let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
        return;
    };

    info!(
        batch = number,
        first_line = first.line_number,
        last_line = last.line_number,
        "Scanning batch"
    );
    for (label, record) in [("first", first), ("last", last)] {
        info!(
            position = label,
            record_type = %record.record_type,
            key = %record.key,
            name = %payload_name(&record.payload),
            "Batch boundary record"
        );
    }

    let mut distribution: BTreeMap<&str, u64> = BTreeMap::new();
    for record in batch {
        *distribution.entry(record.record_type.as_str()).or_default() += 1;
    }
    info!(batch = number, distribution = ?distribution, "Type distribution");

    for (record_type, count) in distribution {
        *totals.entry(record_type.to_string()).or_default() += count;
    }
}

/// The payload's `name`, or `N/A` when absent or undecodable
fn payload_name(payload: &str) -> String {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .and_then(|value| value.get("name").and_then(|n| n.as_str()).map(str::to_string))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "N/A".to_string())
}
