//! Per-version segment layouts.
//!
//! Every layout implements [`FormatCodec`] for reading and hands out a
//! [`SegmentWriter`] for producing a new representation. The layout of an
//! existing segment is found with [`detect_version`] and its codec with
//! [`codec_for`].

mod consolidated;
mod legacy;

pub use consolidated::{ConsolidatedCodec, BLOB_ALIGNMENT};
pub use legacy::{legacy_file_name, LegacyCodec};

use crate::blob::{decode_blob, encode_blob};
use crate::creation::CreationMeta;
use crate::crc::Crc32;
use crate::error::{CodecError, CodecResult};
use crate::index_map::IndexMap;
use crate::metadata::{parse_properties, ColumnMetadata, SegmentMetadata};
use crate::types::{FormatVersion, IndexKind};
use colseg_buffer::{write_file_atomic, Buffer, BufferManager, Region};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::ops::Range;
use std::path::Path;

/// Segment metadata file.
pub const METADATA_FILE: &str = "metadata.properties";

/// Creation time and data checksum file.
pub const CREATION_META_FILE: &str = "creation.meta";

/// Index map of a consolidated segment.
pub const INDEX_MAP_FILE: &str = "index_map";

/// Data file of a consolidated segment.
pub const DATA_FILE: &str = "columns.psf";

static V1: LegacyCodec = LegacyCodec::new(FormatVersion::V1);
static V2: LegacyCodec = LegacyCodec::new(FormatVersion::V2);
static V3: ConsolidatedCodec = ConsolidatedCodec;

/// Returns the codec for a layout version.
#[must_use]
pub fn codec_for(version: FormatVersion) -> &'static dyn FormatCodec {
    match version {
        FormatVersion::V1 => &V1,
        FormatVersion::V2 => &V2,
        FormatVersion::V3 => &V3,
    }
}

/// Reads the layout version recorded in a segment's metadata.
///
/// # Errors
///
/// Returns `UnsupportedVersion` for versions newer than this engine and
/// `Corrupt` or `Io` if the metadata cannot be read.
pub fn detect_version(dir: &Path) -> CodecResult<FormatVersion> {
    let text = fs::read_to_string(dir.join(METADATA_FILE))?;
    let props = parse_properties(&text)?;
    props
        .get("segment.index.version")
        .ok_or_else(|| CodecError::corrupt("missing metadata key segment.index.version"))?
        .parse()
}

/// Reads and validates `metadata.properties`.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read and `Corrupt` or
/// `UnsupportedVersion` if it does not decode.
pub fn read_metadata(dir: &Path) -> CodecResult<SegmentMetadata> {
    let text = fs::read_to_string(dir.join(METADATA_FILE))?;
    SegmentMetadata::decode(&text)
}

/// Validates and atomically writes `metadata.properties`.
///
/// # Errors
///
/// Returns an error if the metadata is inconsistent or the write fails.
pub fn write_metadata(dir: &Path, metadata: &SegmentMetadata) -> CodecResult<()> {
    metadata.validate()?;
    write_file_atomic(&dir.join(METADATA_FILE), metadata.encode().as_bytes())?;
    Ok(())
}

/// Reads `creation.meta`.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read and `Corrupt` if it does not decode.
pub fn read_creation_meta(dir: &Path) -> CodecResult<CreationMeta> {
    CreationMeta::decode(&fs::read(dir.join(CREATION_META_FILE))?)
}

/// Atomically writes `creation.meta`.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn write_creation_meta(dir: &Path, meta: &CreationMeta) -> CodecResult<()> {
    write_file_atomic(&dir.join(CREATION_META_FILE), &meta.encode())?;
    Ok(())
}

/// An acquired, validated index blob.
#[derive(Debug, Clone)]
pub struct IndexBlob {
    buffer: Buffer,
    payload: Range<usize>,
}

impl IndexBlob {
    /// The payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.payload.clone()]
    }

    /// The whole framed blob.
    #[must_use]
    pub fn framed(&self) -> &[u8] {
        &self.buffer
    }

    /// The underlying buffer handle.
    #[must_use]
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}

/// Read side of an on-disk layout.
pub trait FormatCodec: fmt::Debug + Send + Sync {
    /// The layout version this codec reads and writes.
    fn version(&self) -> FormatVersion;

    /// Reads the metadata of a representation in this layout.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the metadata names a different layout.
    fn read_metadata(&self, dir: &Path) -> CodecResult<SegmentMetadata> {
        let metadata = read_metadata(dir)?;
        if metadata.version != self.version() {
            return Err(CodecError::corrupt(format!(
                "metadata declares {} but was read as {}",
                metadata.version,
                self.version()
            )));
        }
        Ok(metadata)
    }

    /// Reads the index map and checks it against `metadata` and the files
    /// on disk.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if an index is missing, unlisted, out of bounds or
    /// overlapping.
    fn read_index_map(&self, dir: &Path, metadata: &SegmentMetadata) -> CodecResult<IndexMap>;

    /// Acquires and validates the blob of one column index.
    ///
    /// Only the framing is validated here; payload structure is checked by
    /// the per-kind decoders.
    ///
    /// # Errors
    ///
    /// Returns `MissingIndex` if the index is not mapped, `Buffer` if the
    /// bytes cannot be acquired and `Corrupt` if the frame is invalid.
    fn read_column_index(
        &self,
        buffers: &BufferManager,
        dir: &Path,
        metadata: &SegmentMetadata,
        index_map: &IndexMap,
        column: &str,
        kind: IndexKind,
    ) -> CodecResult<IndexBlob> {
        let location = index_map
            .get(column, kind)
            .ok_or_else(|| CodecError::missing_index(column, kind))?;
        let region = Region::new(&dir.join(&location.file), location.offset, location.len);
        let buffer = buffers.acquire(&region)?;
        let frame = decode_blob(&buffer, self.version(), kind, column, metadata.total_docs)?;
        Ok(IndexBlob {
            buffer,
            payload: frame.payload,
        })
    }

    /// True if this layout can store `kind`.
    fn supports_kind(&self, kind: IndexKind) -> bool;

    /// True if `kind` can be dropped by editing the index map alone.
    fn supports_in_place_removal(&self, kind: IndexKind) -> bool;

    /// Starts an empty representation in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout's files cannot be created.
    fn create_writer(&self, dir: &Path) -> CodecResult<Box<dyn SegmentWriter>>;

    /// Starts a representation in `dir` that already holds every index of
    /// the representation in `source_dir`. Files of the source are never
    /// modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the source files cannot be linked or copied.
    fn inherit_writer(
        &self,
        dir: &Path,
        source_dir: &Path,
        source_map: &IndexMap,
    ) -> CodecResult<Box<dyn SegmentWriter>>;

    /// Files holding index bytes, in checksum order.
    fn data_files(&self, index_map: &IndexMap) -> BTreeSet<String> {
        index_map.iter().map(|(_, _, loc)| loc.file.clone()).collect()
    }

    /// CRC32 over the full contents of every data file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if a file cannot be read.
    fn data_checksum(&self, dir: &Path, index_map: &IndexMap) -> CodecResult<u32> {
        let mut crc = Crc32::new();
        let mut chunk = vec![0u8; 64 * 1024];
        for name in self.data_files(index_map) {
            let mut file = match File::open(dir.join(&name)) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            loop {
                let n = file.read(&mut chunk)?;
                if n == 0 {
                    break;
                }
                crc.update(&chunk[..n]);
            }
        }
        Ok(crc.finish())
    }
}

/// Write side of an on-disk layout.
///
/// A writer owns one not-yet-visible representation directory. Index bytes
/// become reachable only through the map returned by [`finish`].
///
/// [`finish`]: SegmentWriter::finish
pub trait SegmentWriter: Send {
    /// The layout being written.
    fn version(&self) -> FormatVersion;

    /// Frames and persists one index payload, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` if the layout cannot hold `kind` and `Buffer`
    /// or `Io` if the write fails.
    fn write_column_index(
        &mut self,
        column: &ColumnMetadata,
        kind: IndexKind,
        num_docs: u32,
        payload: &[u8],
    ) -> CodecResult<()>;

    /// Drops one index from the representation.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` if the layout cannot drop `kind` in place and
    /// `MissingIndex` if it is not present.
    fn remove_column_index(&mut self, column: &str, kind: IndexKind) -> CodecResult<()>;

    /// The locations written or inherited so far.
    fn index_map(&self) -> &IndexMap;

    /// Index bytes written through this writer, excluding inherited ones.
    fn bytes_written(&self) -> u64;

    /// Makes every index durable and persists the index map.
    ///
    /// # Errors
    ///
    /// Returns an error if syncing or writing the map fails.
    fn finish(self: Box<Self>) -> CodecResult<IndexMap>;
}

/// Frames a payload for `version`, rejecting kinds the layout cannot hold.
pub(crate) fn frame_for(
    codec: &dyn FormatCodec,
    column: &str,
    kind: IndexKind,
    num_docs: u32,
    payload: &[u8],
) -> CodecResult<Vec<u8>> {
    if !codec.supports_kind(kind) {
        return Err(CodecError::unsupported(
            codec.version(),
            format!("cannot store {kind} index for column {column}"),
        ));
    }
    Ok(encode_blob(codec.version(), kind, num_docs, payload))
}
