//! Consolidated single-file layout (`v3`).
//!
//! All index blobs are appended to `columns.psf` at 8-byte aligned offsets.
//! `index_map` records where each blob lives; bytes not referenced by the
//! map are dead and reclaimed only by compaction.

use super::{frame_for, FormatCodec, SegmentWriter, DATA_FILE, INDEX_MAP_FILE};
use crate::error::{CodecError, CodecResult};
use crate::index_map::{IndexLocation, IndexMap};
use crate::metadata::{ColumnMetadata, SegmentMetadata};
use crate::types::{FormatVersion, IndexKind};
use colseg_buffer::{write_file_atomic, AppendFile};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

/// Alignment of every blob in the data file.
pub const BLOB_ALIGNMENT: u64 = 8;

/// Codec for the `v3` layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolidatedCodec;

impl FormatCodec for ConsolidatedCodec {
    fn version(&self) -> FormatVersion {
        FormatVersion::V3
    }

    fn read_index_map(&self, dir: &Path, metadata: &SegmentMetadata) -> CodecResult<IndexMap> {
        let map = match fs::read_to_string(dir.join(INDEX_MAP_FILE)) {
            Ok(text) => IndexMap::decode(&text, DATA_FILE)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => return Err(e.into()),
        };
        map.check_matches(metadata)?;

        if !map.is_empty() {
            let size = match fs::metadata(dir.join(DATA_FILE)) {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(CodecError::corrupt(format!("{DATA_FILE} is missing")));
                }
                Err(e) => return Err(e.into()),
            };
            map.check_ranges(DATA_FILE, size)?;
        }
        Ok(map)
    }

    fn supports_kind(&self, _kind: IndexKind) -> bool {
        true
    }

    fn supports_in_place_removal(&self, kind: IndexKind) -> bool {
        matches!(kind, IndexKind::Inverted | IndexKind::NullValueVector)
    }

    fn create_writer(&self, dir: &Path) -> CodecResult<Box<dyn SegmentWriter>> {
        fs::create_dir_all(dir)?;
        let data = AppendFile::create(&dir.join(DATA_FILE))?;
        Ok(Box::new(ConsolidatedWriter {
            dir: dir.to_path_buf(),
            data,
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
        let target = dir.join(DATA_FILE);
        // The live data file may be mapped by readers; append to a copy.
        let data = match fs::copy(source_dir.join(DATA_FILE), &target) {
            Ok(_) => AppendFile::open(&target)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound && source_map.is_empty() => {
                AppendFile::create(&target)?
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Box::new(ConsolidatedWriter {
            dir: dir.to_path_buf(),
            data,
            map: source_map.clone(),
            bytes_written: 0,
        }))
    }

    fn data_files(&self, _index_map: &IndexMap) -> BTreeSet<String> {
        [DATA_FILE.to_string()].into()
    }
}

struct ConsolidatedWriter {
    dir: std::path::PathBuf,
    data: AppendFile,
    map: IndexMap,
    bytes_written: u64,
}

impl SegmentWriter for ConsolidatedWriter {
    fn version(&self) -> FormatVersion {
        FormatVersion::V3
    }

    fn write_column_index(
        &mut self,
        column: &ColumnMetadata,
        kind: IndexKind,
        num_docs: u32,
        payload: &[u8],
    ) -> CodecResult<()> {
        let blob = frame_for(&ConsolidatedCodec, &column.name, kind, num_docs, payload)?;
        self.data.pad_to(BLOB_ALIGNMENT)?;
        let offset = self.data.append(&blob)?;
        self.bytes_written += blob.len() as u64;
        self.map.insert(
            &column.name,
            kind,
            IndexLocation::new(DATA_FILE, offset, blob.len() as u64),
        );
        Ok(())
    }

    fn remove_column_index(&mut self, column: &str, kind: IndexKind) -> CodecResult<()> {
        if !ConsolidatedCodec.supports_in_place_removal(kind) {
            return Err(CodecError::unsupported(
                FormatVersion::V3,
                format!("{kind} index of column {column} cannot be removed in place"),
            ));
        }
        self.map
            .remove(column, kind)
            .map(|_| ())
            .ok_or_else(|| CodecError::missing_index(column, kind))
    }

    fn index_map(&self) -> &IndexMap {
        &self.map
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn finish(mut self: Box<Self>) -> CodecResult<IndexMap> {
        self.data.sync()?;
        write_file_atomic(&self.dir.join(INDEX_MAP_FILE), self.map.encode().as_bytes())?;
        Ok(self.map)
    }
}
