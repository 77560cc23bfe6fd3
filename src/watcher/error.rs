//! Watcher error types.

use std::path::{Path, PathBuf};

/// Errors that can occur while tailing the event log.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// Permission denied accessing file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatcherError {
    /// Classify an I/O error raised while accessing `path`.
    pub(crate) fn from_io(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied(path.to_path_buf())
        } else {
            Self::Io(err)
        }
    }
}
