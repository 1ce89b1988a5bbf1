//! Staging areas: fully built, not yet visible segment representations.

use crate::error::{CoreError, CoreResult};
use colseg_codec::{
    codec_for, write_creation_meta, write_metadata, CodecError, CreationMeta, FormatCodec,
    FormatVersion, IndexKind, IndexMap, SegmentMetadata, SegmentWriter,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix of staging directory names.
pub(crate) const STAGING_PREFIX: &str = "staging-";

/// A representation being built in a private directory.
///
/// Readers never see a staging area. It becomes the live representation only
/// through [`BuildGuard::publish`](crate::BuildGuard::publish); dropping it
/// without publishing removes the directory.
pub struct StagingArea {
    path: PathBuf,
    metadata: SegmentMetadata,
    codec: &'static dyn FormatCodec,
    writer: Option<Box<dyn SegmentWriter>>,
    published: bool,
}

impl std::fmt::Debug for StagingArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingArea")
            .field("path", &self.path)
            .field("version", &self.metadata.version)
            .field("published", &self.published)
            .finish_non_exhaustive()
    }
}

impl StagingArea {
    /// Starts a staging area holding every index of the source.
    pub(crate) fn inherit(
        path: PathBuf,
        source_dir: &Path,
        source_metadata: &SegmentMetadata,
        source_map: &IndexMap,
    ) -> CoreResult<Self> {
        let codec = codec_for(source_metadata.version);
        let mut staging = Self::empty_shell(path, source_metadata.clone(), codec);
        staging.writer = Some(codec.inherit_writer(&staging.path, source_dir, source_map)?);
        Ok(staging)
    }

    /// Starts an empty staging area in `version` for the source's columns.
    pub(crate) fn empty(
        path: PathBuf,
        source_metadata: &SegmentMetadata,
        version: FormatVersion,
    ) -> CoreResult<Self> {
        let codec = codec_for(version);
        let mut metadata = source_metadata.clone();
        metadata.version = version;
        for column in &mut metadata.columns {
            column.indexes.clear();
        }
        let mut staging = Self::empty_shell(path, metadata, codec);
        staging.writer = Some(codec.create_writer(&staging.path)?);
        Ok(staging)
    }

    fn empty_shell(
        path: PathBuf,
        metadata: SegmentMetadata,
        codec: &'static dyn FormatCodec,
    ) -> Self {
        Self {
            path,
            metadata,
            codec,
            writer: None,
            published: false,
        }
    }

    /// Directory of the staging area.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata as it will be published.
    #[must_use]
    pub fn metadata(&self) -> &SegmentMetadata {
        &self.metadata
    }

    /// Layout being written.
    #[must_use]
    pub fn version(&self) -> FormatVersion {
        self.metadata.version
    }

    /// Index bytes written so far, excluding inherited ones.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.writer.as_ref().map_or(0, |w| w.bytes_written())
    }

    fn writer(&mut self) -> CoreResult<&mut Box<dyn SegmentWriter>> {
        self.writer
            .as_mut()
            .ok_or_else(|| CoreError::invalid_operation("staging area already finished"))
    }

    /// Writes one index payload and lists it in the staged metadata.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for an unknown column or a kind the layout
    /// cannot hold, and `IoFailure` if the write fails.
    pub fn write_index(&mut self, column: &str, kind: IndexKind, payload: &[u8]) -> CoreResult<()> {
        let num_docs = self.metadata.total_docs;
        let column_meta = self
            .metadata
            .column(column)
            .cloned()
            .ok_or_else(|| CoreError::invalid_operation(format!("unknown column {column}")))?;
        self.writer()?
            .write_column_index(&column_meta, kind, num_docs, payload)?;
        if let Some(c) = self.metadata.column_mut(column) {
            c.indexes.insert(kind);
        }
        Ok(())
    }

    /// Drops one index from the staged representation.
    ///
    /// # Errors
    ///
    /// Returns `IndexRemovalUnsupported` if the index is absent or the
    /// layout cannot drop it in place.
    pub fn remove_index(&mut self, column: &str, kind: IndexKind) -> CoreResult<()> {
        self.writer()?
            .remove_column_index(column, kind)
            .map_err(|e| match e {
                CodecError::Unsupported { message, .. } => {
                    CoreError::removal_unsupported(column, kind, message)
                }
                CodecError::MissingIndex { .. } => {
                    CoreError::removal_unsupported(column, kind, "index is not present")
                }
                other => other.into(),
            })?;
        if let Some(c) = self.metadata.column_mut(column) {
            c.indexes.remove(&kind);
        }
        Ok(())
    }

    /// Persists data, index map, creation record and metadata, in that order.
    pub(crate) fn finish(&mut self) -> CoreResult<IndexMap> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| CoreError::invalid_operation("staging area already finished"))?;
        let map = writer.finish()?;
        map.check_matches(&self.metadata)?;

        let data_crc = self.codec.data_checksum(&self.path, &map)?;
        write_creation_meta(&self.path, &CreationMeta::new(now_millis(), data_crc))?;
        write_metadata(&self.path, &self.metadata)?;
        Ok(map)
    }

    /// Hands the directory over to the caller; it is no longer removed on drop.
    pub(crate) fn mark_published(&mut self) {
        self.published = true;
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        // Close data files before removing the directory.
        self.writer = None;
        match fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "discarded staging area"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove staging area"
            ),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use colseg_codec::{ColumnMetadata, DataType};
    use tempfile::TempDir;

    fn metadata() -> SegmentMetadata {
        SegmentMetadata {
            name: "s".to_string(),
            total_docs: 2,
            version: FormatVersion::V3,
            creation_time: 0,
            columns: vec![ColumnMetadata::raw("score", DataType::Int, 2, 2)],
        }
    }

    #[test]
    fn dropped_staging_is_removed() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("staging-test");
        let mut staging = StagingArea::empty(path.clone(), &metadata(), FormatVersion::V3).unwrap();
        staging.write_index("score", IndexKind::Forward, &[0; 8]).unwrap();
        assert!(path.exists());
        assert!(staging.bytes_written() > 0);
        drop(staging);
        assert!(!path.exists());
    }

    #[test]
    fn finish_writes_metadata_last() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("staging-test");
        let mut staging = StagingArea::empty(path.clone(), &metadata(), FormatVersion::V3).unwrap();
        staging.write_index("score", IndexKind::Forward, &[0; 8]).unwrap();
        let map = staging.finish().unwrap();
        assert_eq!(map.len(), 1);
        assert!(path.join(colseg_codec::METADATA_FILE).exists());
        assert!(path.join(colseg_codec::CREATION_META_FILE).exists());

        staging.mark_published();
        drop(staging);
        assert!(path.exists());
    }

    #[test]
    fn unknown_column_rejected() {
        let root = TempDir::new().unwrap();
        let mut staging =
            StagingArea::empty(root.path().join("staging-x"), &metadata(), FormatVersion::V3).unwrap();
        assert!(matches!(
            staging.write_index("nope", IndexKind::Forward, b""),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn missing_index_removal_refused() {
        let root = TempDir::new().unwrap();
        let mut staging =
            StagingArea::empty(root.path().join("staging-x"), &metadata(), FormatVersion::V3).unwrap();
        assert!(matches!(
            staging.remove_index("score", IndexKind::NullValueVector),
            Err(CoreError::IndexRemovalUnsupported { .. })
        ));
    }
}
