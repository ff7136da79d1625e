// Open Library Author Import Module
//
// Streams an Open Library author dump (5-column TSV with a JSON payload in the
// last column) into the `authors` table.
//
// Stages, one pass, strictly in order:
// - Source: buffered line reader with bounded read-ahead
// - Parse: tab split + column count check, payload left undecoded
// - Normalize: JSON payload -> NewAuthor
// - Batch: fixed-size batches handed to the sink
// - Sink: skip-duplicate bulk insert (PostgreSQL in production)
// - Stats: counters, interval progress logs and the final summary
//
// Dump files: https://openlibrary.org/developers/dumps (ol_dump_authors_*.txt, ~10GB)

pub mod batcher;
pub mod models;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod scan;
pub mod sink;
pub mod source;
pub mod stats;
pub mod storage;

// Re-export main types
pub use batcher::Batcher;
pub use models::{
    Author, AuthorSearchParams, AuthorUpdate, Gender, NewAuthor, ParsedRecord, RawLine,
};
pub use normalizer::{normalize_author, NormalizeError};
pub use parser::{parse_line, MalformedLine};
pub use pipeline::{AuthorImportPipeline, PipelineState};
pub use scan::{scan_file, ScanSummary};
pub use sink::{AuthorSink, BatchFailurePolicy, SinkError};
pub use source::{DumpReader, LineSource};
pub use stats::{ProgressReporter, RunStats};
pub use storage::{AuthorStore, PgAuthorStorage};

/// Record type column value for author rows
pub const AUTHOR_RECORD_TYPE: &str = "/type/author";

/// Prefix stripped from the key column to get the stored identifier
pub const AUTHOR_KEY_PREFIX: &str = "/authors/";

/// Origin for canonical author links
pub const OPEN_LIBRARY_URL: &str = "https://openlibrary.org";

/// Origin for author photos
pub const COVERS_URL: &str = "https://covers.openlibrary.org";

/// Name used when the payload carries none
pub const UNKNOWN_AUTHOR_NAME: &str = "Unknown";

/// Number of tab-separated columns in a dump line
pub const DUMP_COLUMNS: usize = 5;

/// Result type for author import operations
pub type Result<T> = std::result::Result<T, AuthorImportError>;

/// Errors that abort an import or store operation
///
/// Per-line and per-batch problems never surface here; they are counted in
/// [`RunStats`] and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum AuthorImportError {
    #[error("File not found or not readable: {path}")]
    FileNotFound {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] bookshelf_common::BookshelfError),
}
