//! # colseg Core
//!
//! Segment lifecycle for colseg.
//!
//! This crate provides:
//! - Segment directories with atomic, generation-based publishing
//! - Snapshot readers over the live index set
//! - The index diff and build pipeline ([`IndexLoader`])
//! - Legacy to consolidated layout conversion
//! - A host for the set of segments a process serves ([`SegmentHost`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use colseg_core::{
//!     CancellationToken, IndexKind, IndexLoader, IndexingConfig, LoaderConfig, OpenMode,
//!     SegmentDirectory,
//! };
//! use std::path::Path;
//!
//! let dir = SegmentDirectory::open(Path::new("segments/events"), OpenMode::ReadWrite, Default::default())?;
//! let loader = IndexLoader::new(LoaderConfig::default())?;
//! let config = IndexingConfig::new()
//!     .column("country", [IndexKind::Dictionary, IndexKind::Forward, IndexKind::Inverted]);
//! let report = loader.reconcile(&dir, &config, &CancellationToken::new())?;
//! println!("added {:?}", report.added);
//! # Ok::<(), colseg_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod container;
mod converter;
mod creator;
mod directory;
mod error;
mod host;
mod loader;
mod plan;
mod staging;

pub use config::{IndexingConfig, LoaderConfig};
pub use container::ColumnIndexContainer;
pub use converter::{convert_into, ConversionReport};
pub use creator::{ColumnSpec, ColumnValues, SegmentCreator, SegmentLayout};
pub use directory::{BuildGuard, OpenMode, SegmentDirectory, SegmentReader};
pub use error::{CoreError, CoreResult, IoFailure};
pub use host::SegmentHost;
pub use loader::{
    CancellationToken, CompactionReport, DefaultIndexBuilder, IndexBuilder, IndexLoader,
    LoadReport,
};
pub use plan::{ColumnPlan, IndexPlan};
pub use staging::StagingArea;

pub use colseg_buffer::{BackingMode, BufferConfig, BufferManager};
pub use colseg_codec::{DataType, FormatVersion, IndexKind, Value};
