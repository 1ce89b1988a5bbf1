//! # colseg Codec
//!
//! On-disk segment formats for colseg.
//!
//! A segment is a set of per-column indices plus a small amount of metadata.
//! This crate defines:
//!
//! - The segment data model ([`SegmentMetadata`], [`ColumnMetadata`],
//!   [`IndexKind`], [`FormatVersion`])
//! - Byte-level codecs for each index kind ([`index`])
//! - The framing shared by every persisted index ([`blob`])
//! - One [`FormatCodec`] per on-disk layout, selected with [`codec_for`]
//!
//! ## Layouts
//!
//! | version | layout | files |
//! |---------|--------|-------|
//! | `v1` | legacy | one file per (column, index kind), no checksums |
//! | `v2` | legacy | as `v1`, with checksums and null-value vectors |
//! | `v3` | consolidated | `columns.psf` addressed by `index_map` |
//!
//! ## Write Ordering
//!
//! Writers always persist index bytes before the index map that points at
//! them, and the index map before `metadata.properties`. A crash at any point
//! leaves the referencing structures pointing only at complete data.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bits;
pub mod blob;
mod crc;
mod creation;
mod error;
pub mod format;
pub mod index;
mod index_map;
mod metadata;
mod types;

pub use blob::{decode_blob, encode_blob, BlobFrame, IndexHeader};
pub use crc::{compute_crc32, Crc32};
pub use creation::CreationMeta;
pub use error::{CodecError, CodecResult};
pub use format::{
    codec_for, detect_version, read_creation_meta, read_metadata, write_creation_meta,
    write_metadata, FormatCodec, SegmentWriter, CREATION_META_FILE, DATA_FILE, INDEX_MAP_FILE,
    METADATA_FILE,
};
pub use index_map::{IndexLocation, IndexMap};
pub use metadata::{validate_column_name, ColumnMetadata, SegmentMetadata};
pub use types::{DataType, FormatVersion, IndexKind, Value};
