//! # colseg Buffer
//!
//! Buffer management for colseg segments.
//!
//! This crate owns every byte of column data that a loaded segment exposes.
//! Buffers are **opaque byte ranges** - the crate does not interpret the
//! index formats stored in them.
//!
//! ## Design Principles
//!
//! - A [`Region`] names a byte range of a file (`path`, `offset`, `len`)
//! - [`BufferManager::acquire`] returns a reference-counted [`Buffer`]
//! - Concurrent acquires of the same region share one mapping
//! - The backing memory is unmapped or freed exactly once, when the last
//!   handle is released
//! - A handle stays readable for its whole lifetime, even if the file it was
//!   loaded from is replaced or deleted
//!
//! ## Example
//!
//! ```rust,no_run
//! use colseg_buffer::{BufferConfig, BufferManager, Region};
//! use std::path::Path;
//!
//! let manager = BufferManager::new(BufferConfig::default());
//! let region = Region::new(Path::new("segment/columns.psf"), 0, 128);
//! let buffer = manager.acquire(&region).unwrap();
//! assert_eq!(buffer.len(), 128);
//! buffer.release();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod manager;
mod region;
mod stats;

pub use error::{BufferError, BufferResult};
pub use file::{sync_directory, write_file_atomic, AppendFile};
pub use manager::{BackingMode, Buffer, BufferConfig, BufferManager};
pub use region::Region;
pub use stats::BufferStats;
