//! # colseg Testkit
//!
//! Test utilities for colseg.
//!
//! This crate provides:
//! - Segment fixtures in temporary directories
//! - Property-based generators for column data
//! - Index builders that fail or block on demand, for atomicity and
//!   isolation tests
//! - Concurrent reader helpers for stress tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use colseg_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_segment() {
//!     let segment = TempSegment::user_country(FormatVersion::V3, 1_000);
//!     let dir = segment.open_rw();
//!     // ... pipeline operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod builders;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builders::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use colseg_core::{
        CancellationToken, CoreError, DataType, FormatVersion, IndexKind, IndexLoader,
        IndexingConfig, LoaderConfig, OpenMode, SegmentDirectory, Value,
    };
}

pub use builders::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
