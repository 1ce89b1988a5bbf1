//! Error types for colseg core.

use colseg_buffer::BufferError;
use colseg_codec::{CodecError, IndexKind};
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while loading, building or converting segments.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage could not be read or written.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] IoFailure),

    /// Segment data failed structural validation.
    #[error("corrupt segment{}: {message}", location(.column, .kind))]
    CorruptSegment {
        /// Column the corrupt data belongs to, if known.
        column: Option<String>,
        /// Index kind the corrupt data belongs to, if known.
        kind: Option<IndexKind>,
        /// What was wrong.
        message: String,
    },

    /// The segment was written in a layout this engine does not read.
    #[error("unsupported segment format: {found}")]
    UnsupportedFormat {
        /// The version found on disk.
        found: String,
    },

    /// The index cannot be removed.
    #[error("cannot remove {kind} index of column {column}: {reason}")]
    IndexRemovalUnsupported {
        /// The column.
        column: String,
        /// The index kind.
        kind: IndexKind,
        /// Why the removal was refused.
        reason: String,
    },

    /// Building an index failed.
    #[error("failed to build {kind} index of column {column}: {message}")]
    IndexBuild {
        /// The column.
        column: String,
        /// The index kind.
        kind: IndexKind,
        /// What went wrong.
        message: String,
        /// True if bytes were written to the staging area before the failure.
        /// The staging area is always discarded.
        partial_writes: bool,
    },

    /// Another process holds the segment open for writing.
    #[error("segment locked: another process has write access")]
    SegmentLocked,

    /// The operation was cancelled before publish.
    #[error("operation cancelled")]
    Cancelled,

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// No segment with this name is hosted.
    #[error("segment not found: {name}")]
    SegmentNotFound {
        /// The segment name.
        name: String,
    },
}

/// Underlying cause of an [`CoreError::IoFailure`].
#[derive(Debug, Error)]
pub enum IoFailure {
    /// Buffer acquisition or data file write failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// Other file system error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn location(column: &Option<String>, kind: &Option<IndexKind>) -> String {
    match (column, kind) {
        (Some(column), Some(kind)) => format!(" ({column}/{kind})"),
        (Some(column), None) => format!(" (column {column})"),
        (None, Some(kind)) => format!(" ({kind})"),
        (None, None) => String::new(),
    }
}

impl CoreError {
    /// Creates a corruption error without a location.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptSegment {
            column: None,
            kind: None,
            message: message.into(),
        }
    }

    /// Creates a corruption error for one column index.
    pub fn corrupt_index(column: &str, kind: IndexKind, message: impl Into<String>) -> Self {
        Self::CorruptSegment {
            column: Some(column.to_string()),
            kind: Some(kind),
            message: message.into(),
        }
    }

    /// Creates a removal refusal.
    pub fn removal_unsupported(column: &str, kind: IndexKind, reason: impl Into<String>) -> Self {
        Self::IndexRemovalUnsupported {
            column: column.to_string(),
            kind,
            reason: reason.into(),
        }
    }

    /// Creates an index build failure.
    pub fn index_build(
        column: &str,
        kind: IndexKind,
        message: impl Into<String>,
        partial_writes: bool,
    ) -> Self {
        Self::IndexBuild {
            column: column.to_string(),
            kind,
            message: message.into(),
            partial_writes,
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for storage failures.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, Self::IoFailure(_))
    }
}

impl From<io::Error> for CoreError {
    fn from(e: io::Error) -> Self {
        Self::IoFailure(IoFailure::Io(e))
    }
}

impl From<BufferError> for CoreError {
    fn from(e: BufferError) -> Self {
        Self::IoFailure(IoFailure::Buffer(e))
    }
}

impl From<CodecError> for CoreError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Corrupt {
                column,
                kind,
                message,
            } => Self::CorruptSegment {
                column,
                kind,
                message,
            },
            CodecError::UnsupportedVersion { found } => Self::UnsupportedFormat { found },
            CodecError::MissingIndex { column, kind } => Self::corrupt_index(
                &column,
                kind,
                "index is listed but cannot be found",
            ),
            CodecError::Unsupported { layout, message } => {
                Self::invalid_operation(format!("{layout}: {message}"))
            }
            CodecError::InvalidInput { message } => Self::invalid_operation(message),
            CodecError::Buffer(e) => e.into(),
            CodecError::Io(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_errors_map_onto_taxonomy() {
        let err: CoreError = CodecError::corrupt_index("userId", IndexKind::Forward, "bad").into();
        assert!(matches!(
            err,
            CoreError::CorruptSegment { kind: Some(IndexKind::Forward), .. }
        ));

        let err: CoreError = CodecError::UnsupportedVersion {
            found: "v4".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::UnsupportedFormat { ref found } if found == "v4"));

        let err: CoreError = CodecError::Io(io::Error::other("disk gone")).into();
        assert!(err.is_io());
    }

    #[test]
    fn messages_name_column_and_kind() {
        let err = CoreError::removal_unsupported("country", IndexKind::Forward, "forward indices are required");
        assert_eq!(
            err.to_string(),
            "cannot remove forward index of column country: forward indices are required"
        );
        let err = CoreError::corrupt_index("userId", IndexKind::Dictionary, "count mismatch");
        assert_eq!(
            err.to_string(),
            "corrupt segment (userId/dictionary): count mismatch"
        );
    }
}
