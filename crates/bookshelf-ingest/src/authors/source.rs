//! Line source for dump files
//!
//! Reads one logical line at a time through a fixed-size buffer, so memory
//! stays proportional to the longest line rather than the file. `\n`, `\r\n`
//! and a lone `\r` all end a line.

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, warn};

use super::models::RawLine;
use super::{AuthorImportError, Result};

/// Byte stream a [`LineSource`] reads from
pub type DumpReader = Box<dyn AsyncRead + Send + Unpin>;

/// Sequential reader over the lines of a dump file
///
/// Not seekable; to read again, open a new source.
pub struct LineSource {
    path: PathBuf,
    reader: BufReader<DumpReader>,
    file_size: u64,
    line_number: usize,
    /// Last line ended with `\r`; a following `\n` belongs to it
    skip_lf: bool,
}

impl LineSource {
    /// Open `path` for reading
    ///
    /// Fails with [`AuthorImportError::FileNotFound`] when the path is missing,
    /// is not a regular file, or cannot be opened.
    pub async fn open(path: impl AsRef<Path>, buffer_capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let not_found = |source: std::io::Error| AuthorImportError::FileNotFound {
            path: path.clone(),
            source,
        };

        let metadata = tokio::fs::metadata(&path).await.map_err(not_found)?;
        if !metadata.is_file() {
            return Err(not_found(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        let file = File::open(&path).await.map_err(not_found)?;
        debug!(path = %path.display(), buffer_capacity, "Opened dump file");

        let mut source = Self::from_reader(path, Box::new(file), buffer_capacity);
        source.file_size = metadata.len();
        Ok(source)
    }

    /// Read lines from an already open stream
    ///
    /// `label` names the stream in logs. The size is unknown and reported as 0.
    pub fn from_reader(
        label: impl Into<PathBuf>,
        reader: DumpReader,
        buffer_capacity: usize,
    ) -> Self {
        Self {
            path: label.into(),
            reader: BufReader::with_capacity(buffer_capacity.max(1), reader),
            file_size: 0,
            line_number: 0,
            skip_lf: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file when it was opened, 0 for streams
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of lines returned so far
    pub fn lines_read(&self) -> usize {
        self.line_number
    }

    /// Next line without its terminator, or `None` at end of file
    ///
    /// Invalid UTF-8 is replaced with U+FFFD rather than failing the run.
    pub async fn next_line(&mut self) -> Result<Option<RawLine>> {
        let Some(bytes) = self.read_segment().await? else {
            return Ok(None);
        };

        self.line_number += 1;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(line = self.line_number, "Invalid UTF-8, replacing bad bytes");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            },
        };

        Ok(Some(RawLine::new(self.line_number, text)))
    }

    async fn read_segment(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let mut started = false;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(started.then_some(line));
            }

            let mut start = 0;
            if self.skip_lf {
                self.skip_lf = false;
                if available[0] == b'\n' {
                    start = 1;
                }
            }

            match available[start..]
                .iter()
                .position(|&b| b == b'\n' || b == b'\r')
            {
                Some(offset) => {
                    let end = start + offset;
                    line.extend_from_slice(&available[start..end]);
                    self.skip_lf = available[end] == b'\r';
                    self.reader.consume(end + 1);
                    return Ok(Some(line));
                },
                None => {
                    started |= available.len() > start;
                    line.extend_from_slice(&available[start..]);
                    let consumed = available.len();
                    self.reader.consume(consumed);
                },
            }
        }
    }
}
