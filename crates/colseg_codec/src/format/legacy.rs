//! Legacy multi-file layouts (`v1`, `v2`).
//!
//! Each (column, index kind) lives in its own file next to
//! `metadata.properties`. There is no index map file; the map is
//! synthesized from the metadata and file sizes.

use super::{frame_for, FormatCodec, SegmentWriter};
use crate::error::{CodecError, CodecResult};
use crate::index::ForwardLayout;
use crate::index_map::{IndexLocation, IndexMap};
use crate::metadata::{ColumnMetadata, SegmentMetadata};
use crate::types::{FormatVersion, IndexKind};
use colseg_buffer::{sync_directory, write_file_atomic};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Returns the legacy file name of one column index.
#[must_use]
pub fn legacy_file_name(column: &ColumnMetadata, kind: IndexKind) -> String {
    let name = &column.name;
    match kind {
        IndexKind::Dictionary => format!("{name}.dict"),
        IndexKind::Forward => match ForwardLayout::for_column(column, 0) {
            ForwardLayout::SingleValue { .. } => format!("{name}.sv.fwd"),
            ForwardLayout::MultiValue { .. } => format!("{name}.mv.fwd"),
            ForwardLayout::RawFixed { .. } | ForwardLayout::RawString { .. } => {
                format!("{name}.sv.raw.fwd")
            }
        },
        IndexKind::Inverted => format!("{name}.bitmap.inv"),
        IndexKind::NullValueVector => format!("{name}.bitmap.nullvalue"),
    }
}

/// Codec for the `v1` and `v2` layouts.
#[derive(Debug, Clone, Copy)]
pub struct LegacyCodec {
    version: FormatVersion,
}

impl LegacyCodec {
    pub(super) const fn new(version: FormatVersion) -> Self {
        Self { version }
    }
}

impl FormatCodec for LegacyCodec {
    fn version(&self) -> FormatVersion {
        self.version
    }

    fn read_index_map(&self, dir: &Path, metadata: &SegmentMetadata) -> CodecResult<IndexMap> {
        let mut map = IndexMap::new();
        for column in &metadata.columns {
            for &kind in &column.indexes {
                let file = legacy_file_name(column, kind);
                let len = match fs::metadata(dir.join(&file)) {
                    Ok(meta) => meta.len(),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        return Err(CodecError::corrupt_index(
                            &column.name,
                            kind,
                            format!("index file {file} is missing"),
                        ));
                    }
                    Err(e) => return Err(e.into()),
                };
                map.insert(&column.name, kind, IndexLocation::new(file, 0, len));
            }
        }
        Ok(map)
    }

    fn supports_kind(&self, kind: IndexKind) -> bool {
        kind != IndexKind::NullValueVector || self.version.has_checksums()
    }

    fn supports_in_place_removal(&self, _kind: IndexKind) -> bool {
        false
    }

    fn create_writer(&self, dir: &Path) -> CodecResult<Box<dyn SegmentWriter>> {
        fs::create_dir_all(dir)?;
        Ok(Box::new(LegacyWriter {
            codec: *self,
            dir: dir.to_path_buf(),
            map: IndexMap::new(),
            bytes_written: 0,
        }))
    }

    fn inherit_writer(
        &self,
        dir: &Path,
        source_dir: &Path,
        source_map: &IndexMap,
    ) -> CodecResult<Box<dyn SegmentWriter>> {
        fs::create_dir_all(dir)?;
        let mut map = IndexMap::new();
        for (column, kind, location) in source_map.iter() {
            link_or_copy(&source_dir.join(&location.file), &dir.join(&location.file))?;
            map.insert(column, kind, location.clone());
        }
        Ok(Box::new(LegacyWriter {
            codec: *self,
            dir: dir.to_path_buf(),
            map,
            bytes_written: 0,
        }))
    }
}

/// Index files are immutable once written, so a hard link shares them safely.
fn link_or_copy(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => Ok(()),
        Err(_) => fs::copy(from, to).map(|_| ()),
    }
}

struct LegacyWriter {
    codec: LegacyCodec,
    dir: PathBuf,
    map: IndexMap,
    bytes_written: u64,
}

impl SegmentWriter for LegacyWriter {
    fn version(&self) -> FormatVersion {
        self.codec.version
    }

    fn write_column_index(
        &mut self,
        column: &ColumnMetadata,
        kind: IndexKind,
        num_docs: u32,
        payload: &[u8],
    ) -> CodecResult<()> {
        let blob = frame_for(&self.codec, &column.name, kind, num_docs, payload)?;
        let file = legacy_file_name(column, kind);
        // Rename over the target so an inherited hard link is replaced, not
        // rewritten.
        write_file_atomic(&self.dir.join(&file), &blob)?;
        self.bytes_written += blob.len() as u64;
        self.map
            .insert(&column.name, kind, IndexLocation::new(file, 0, blob.len() as u64));
        Ok(())
    }

    fn remove_column_index(&mut self, column: &str, kind: IndexKind) -> CodecResult<()> {
        Err(CodecError::unsupported(
            self.codec.version,
            format!("cannot remove {kind} index of column {column} in place"),
        ))
    }

    fn index_map(&self) -> &IndexMap {
        &self.map
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn finish(self: Box<Self>) -> CodecResult<IndexMap> {
        sync_directory(&self.dir)?;
        Ok(self.map)
    }
}
