//! Row sources consumed by the ingestion pipeline.
//!
//! A source is a sequential stream of raw rows, each a mapping from
//! field name to string value. Turning a row into a record is the
//! pluggable parser's job, not the source's.

use crate::errors::SourceError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::warn;

/// One raw row: field name to string value.
pub type RawRow = HashMap<String, String>;

/// A sequential stream of raw rows.
#[async_trait]
pub trait RowSource: Send {
    /// Opens the source. Failure here is fatal to the whole run.
    async fn open(&mut self) -> Result<(), SourceError>;

    /// Returns the next row, or `None` at end of stream.
    ///
    /// A mid-stream error is a hard I/O failure and aborts the run.
    async fn next_row(&mut self) -> Result<Option<RawRow>, SourceError>;

    /// Best-effort row count for progress estimation.
    ///
    /// `None` when no estimate is available; estimation failure is
    /// never fatal.
    fn estimated_rows(&self) -> Option<usize> {
        None
    }
}

/// An in-memory source over pre-built rows.
#[derive(Debug, Default)]
pub struct InMemoryRowSource {
    rows: VecDeque<RawRow>,
    total: usize,
}

impl InMemoryRowSource {
    /// Creates a source over the given rows.
    #[must_use]
    pub fn new(rows: Vec<RawRow>) -> Self {
        let total = rows.len();
        Self {
            rows: rows.into(),
            total,
        }
    }
}

#[async_trait]
impl RowSource for InMemoryRowSource {
    async fn open(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn next_row(&mut self) -> Result<Option<RawRow>, SourceError> {
        Ok(self.rows.pop_front())
    }

    fn estimated_rows(&self) -> Option<usize> {
        Some(self.total)
    }
}

/// A source reading one JSON object per line from a file.
///
/// Non-string JSON values are stringified. A line that is not valid
/// JSON is surfaced as a row with a single `_raw` field so the parser
/// can reject it as a per-row failure rather than aborting the run.
#[derive(Debug)]
pub struct JsonlRowSource {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    estimate: Option<usize>,
    line_index: usize,
}

impl JsonlRowSource {
    /// Creates a source for the given path. Nothing is read until
    /// [`RowSource::open`].
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lines: None,
            estimate: None,
            line_index: 0,
        }
    }
}

#[async_trait]
impl RowSource for JsonlRowSource {
    async fn open(&mut self) -> Result<(), SourceError> {
        // Pre-scan for the progress estimate; failure only disables it.
        self.estimate = count_rows(&self.path).await;

        let file = File::open(&self.path).await.map_err(SourceError::Io)?;
        self.lines = Some(BufReader::new(file).lines());
        Ok(())
    }

    async fn next_row(&mut self) -> Result<Option<RawRow>, SourceError> {
        let Some(lines) = self.lines.as_mut() else {
            return Err(SourceError::Read("source not opened".to_string()));
        };

        loop {
            let Some(line) = lines.next_line().await.map_err(SourceError::Io)? else {
                return Ok(None);
            };
            self.line_index += 1;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<HashMap<String, serde_json::Value>>(&line) {
                Ok(object) => {
                    let row = object
                        .into_iter()
                        .map(|(field, value)| {
                            let text = match value {
                                serde_json::Value::String(s) => s,
                                other => other.to_string(),
                            };
                            (field, text)
                        })
                        .collect();
                    return Ok(Some(row));
                }
                Err(error) => {
                    warn!(
                        path = %self.path.display(),
                        line = self.line_index,
                        error = %error,
                        "line is not valid JSON, passing through as raw"
                    );
                    let mut row = RawRow::new();
                    row.insert("_raw".to_string(), line);
                    return Ok(Some(row));
                }
            }
        }
    }

    fn estimated_rows(&self) -> Option<usize> {
        self.estimate
    }
}

/// Streams the file once, line by line, counting non-empty lines.
///
/// Never holds more than one line in memory. Returns `None` on any I/O
/// failure; the estimate is best-effort.
async fn count_rows(path: &Path) -> Option<usize> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(error) => {
            warn!(path = %path.display(), error = %error, "row count pre-scan failed");
            return None;
        }
    };

    let mut lines = BufReader::new(file).lines();
    let mut count = 0usize;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !line.trim().is_empty() {
                    count += 1;
                }
            }
            Ok(None) => return Some(count),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "row count pre-scan failed");
                return None;
            }
        }
    }
}
