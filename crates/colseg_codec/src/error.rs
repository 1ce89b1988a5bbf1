//! Error types for the codec crate.

use crate::types::IndexKind;
use colseg_buffer::BufferError;
use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while reading or writing segment files.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Structural validation failed.
    #[error("corrupt segment data{}: {message}", location(.column, .kind))]
    Corrupt {
        /// Column the corrupt data belongs to, if known.
        column: Option<String>,
        /// Index kind the corrupt data belongs to, if known.
        kind: Option<IndexKind>,
        /// What was wrong.
        message: String,
    },

    /// The segment was written by a newer engine.
    #[error("unsupported segment format version: {found}")]
    UnsupportedVersion {
        /// The version string found on disk.
        found: String,
    },

    /// An index that should exist is not present.
    #[error("index {kind} not present for column {column}")]
    MissingIndex {
        /// The column.
        column: String,
        /// The index kind.
        kind: IndexKind,
    },

    /// The layout does not support the requested operation.
    #[error("unsupported by layout {layout}: {message}")]
    Unsupported {
        /// The layout version.
        layout: String,
        /// Description of the operation.
        message: String,
    },

    /// Input data does not describe a valid segment.
    #[error("invalid segment definition: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// Buffer acquisition or file writing failed.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn location(column: &Option<String>, kind: &Option<IndexKind>) -> String {
    match (column, kind) {
        (Some(column), Some(kind)) => format!(" in {column}/{kind}"),
        (Some(column), None) => format!(" in column {column}"),
        (None, Some(kind)) => format!(" in {kind}"),
        (None, None) => String::new(),
    }
}

impl CodecError {
    /// Creates a segment-level corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            column: None,
            kind: None,
            message: message.into(),
        }
    }

    /// Creates a corruption error for one column index.
    pub fn corrupt_index(column: &str, kind: IndexKind, message: impl Into<String>) -> Self {
        Self::Corrupt {
            column: Some(column.to_string()),
            kind: Some(kind),
            message: message.into(),
        }
    }

    /// Creates a corruption error for a column.
    pub fn corrupt_column(column: &str, message: impl Into<String>) -> Self {
        Self::Corrupt {
            column: Some(column.to_string()),
            kind: None,
            message: message.into(),
        }
    }

    /// Creates a missing index error.
    pub fn missing_index(column: &str, kind: IndexKind) -> Self {
        Self::MissingIndex {
            column: column.to_string(),
            kind,
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(layout: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Unsupported {
            layout: layout.to_string(),
            message: message.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Attaches a column and index kind to a corruption error that has none.
    #[must_use]
    pub fn at(self, column: &str, kind: IndexKind) -> Self {
        match self {
            Self::Corrupt {
                column: None,
                kind: None,
                message,
            } => Self::corrupt_index(column, kind, message),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_message_names_location() {
        let err = CodecError::corrupt_index("userId", IndexKind::Forward, "bad size");
        assert_eq!(
            err.to_string(),
            "corrupt segment data in userId/forward: bad size"
        );

        let err = CodecError::corrupt("bad magic");
        assert_eq!(err.to_string(), "corrupt segment data: bad magic");
    }

    #[test]
    fn at_only_fills_missing_location() {
        let err = CodecError::corrupt("truncated").at("country", IndexKind::Inverted);
        assert!(matches!(
            err,
            CodecError::Corrupt { column: Some(ref c), kind: Some(IndexKind::Inverted), .. } if c == "country"
        ));

        let err = CodecError::corrupt_index("a", IndexKind::Dictionary, "x")
            .at("b", IndexKind::Forward);
        assert!(matches!(
            err,
            CodecError::Corrupt { column: Some(ref c), kind: Some(IndexKind::Dictionary), .. } if c == "a"
        ));
    }
}
