//! Byte-offset cursor over a growing log file.
//!
//! Reads only the bytes appended since the last poll and detects when
//! the file shrinks underneath it.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::error::WatcherError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Outcome of a single [`TailCursor::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// The file does not exist right now.
    Missing,
    /// Nothing new to read.
    Unchanged {
        /// Offset before a reset, if the file shrank during this poll.
        truncated_from: Option<u64>,
    },
    /// New bytes were consumed.
    Read(Chunk),
}

/// Text consumed by one poll, spanning `start..end` in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start: u64,
    pub end: u64,
    /// Offset before a reset, if the file shrank during this poll.
    pub truncated_from: Option<u64>,
}

/// Tracks how much of a log file has been consumed.
///
/// Position only moves forward, except for the reset to zero that
/// happens when the file is observed to be shorter than the position.
#[derive(Debug)]
pub struct TailCursor {
    path: PathBuf,
    position: u64,
}

impl TailCursor {
    /// Create a cursor at the current end of `path`, or at 0 if the file
    /// does not exist yet. Pre-existing content is never re-read.
    ///
    /// # Errors
    ///
    /// Returns an error if metadata exists but cannot be read.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, WatcherError> {
        let path = path.into();
        let position = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Log file does not exist yet");
                0
            }
            Err(e) => return Err(WatcherError::from_io(&path, e)),
        };
        tracing::info!(path = %path.display(), position, "Tail cursor positioned");
        Ok(Self { path, position })
    }

    /// Create a cursor at an explicit offset.
    #[must_use]
    pub fn starting_at(path: impl Into<PathBuf>, position: u64) -> Self {
        Self {
            path: path.into(),
            position,
        }
    }

    /// Bytes already consumed.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check the file once and consume any newly appended bytes.
    ///
    /// The read stops at the length observed when the poll started; bytes
    /// appended during the read are left for the next poll. If the file is
    /// shorter than the current position it is treated as rotated: the
    /// position resets to 0 and reading resumes from the start. Content
    /// written before the rotation may therefore be read twice.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be opened or read.
    pub async fn poll(&mut self) -> Result<Poll, WatcherError> {
        let mut file = match File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Poll::Missing),
            Err(e) => return Err(WatcherError::from_io(&self.path, e)),
        };

        let len = file.metadata().await?.len();

        let truncated_from = if len < self.position {
            tracing::warn!(
                path = %self.path.display(),
                old_offset = self.position,
                new_len = len,
                "Log file truncated, resetting offset to 0"
            );
            let previous = self.position;
            self.position = 0;
            Some(previous)
        } else {
            None
        };

        if len == self.position {
            return Ok(Poll::Unchanged { truncated_from });
        }

        let start = self.position;
        file.seek(SeekFrom::Start(start)).await?;

        let mut buf = Vec::with_capacity(usize::try_from(len - start).unwrap_or(0));
        file.take(len - start).read_to_end(&mut buf).await?;

        let end = start + buf.len() as u64;
        self.position = end;

        let bytes = if start == 0 {
            buf.strip_prefix(UTF8_BOM).unwrap_or(&buf[..])
        } else {
            &buf[..]
        };

        Ok(Poll::Read(Chunk {
            text: String::from_utf8_lossy(bytes).into_owned(),
            start,
            end,
            truncated_from,
        }))
    }

    /// Move the cursor back to the beginning of the file.
    pub fn reset(&mut self) {
        self.position = 0;
    }
}
