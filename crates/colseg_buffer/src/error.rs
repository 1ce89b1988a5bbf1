//! Error types for buffer operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur while acquiring or writing buffers.
#[derive(Debug, Error)]
pub enum BufferError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backing file could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        /// The file that failed to open.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The requested range extends beyond the end of the backing file.
    #[error("range out of bounds in {path}: offset {offset}, len {len}, file size {size}")]
    RangeOutOfBounds {
        /// The backing file.
        path: PathBuf,
        /// The requested offset.
        offset: u64,
        /// The requested length.
        len: u64,
        /// The actual file size.
        size: u64,
    },
}

impl BufferError {
    /// Creates an open error for the given path.
    pub fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }
}
