//! Segment fixtures and helpers.
//!
//! Provides temporary segments, the standard `userId`/`country` scenario
//! and a few directory inspection helpers.

use colseg_buffer::BufferManager;
use colseg_core::{
    ColumnSpec, DataType, FormatVersion, IndexKind, IndexLoader, IndexingConfig, LoaderConfig,
    OpenMode, SegmentCreator, SegmentDirectory, SegmentLayout, Value,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Countries used by the standard scenario; `"null"` is the string null
/// placeholder.
pub const COUNTRIES: [&str; 6] = ["us", "de", "fr", "jp", "br", "null"];

/// `userId` of document `doc` in the standard scenario.
pub fn user_id(doc: u32) -> Value {
    Value::Long(1_000_000 + i64::from(doc) * 3)
}

/// `country` of document `doc` in the standard scenario.
pub fn country(doc: u32) -> Value {
    Value::from(COUNTRIES[(doc as usize * 7 + doc as usize / 3) % COUNTRIES.len()])
}

/// The standard scenario: `userId` with dictionary and forward indices,
/// `country` with dictionary, forward and inverted indices.
pub fn user_country_segment(name: &str, docs: u32, version: FormatVersion) -> SegmentCreator {
    SegmentCreator::new(name, version)
        .creation_time(1_700_000_000_000)
        .column(ColumnSpec::single(
            "userId",
            DataType::Long,
            (0..docs).map(user_id).collect(),
        ))
        .column(
            ColumnSpec::single("country", DataType::String, (0..docs).map(country).collect())
                .with_index(IndexKind::Inverted),
        )
}

/// Config that adds an inverted index on `userId` and leaves `country` as is.
pub fn user_id_inverted() -> IndexingConfig {
    IndexingConfig::new()
        .column(
            "userId",
            [IndexKind::Dictionary, IndexKind::Forward, IndexKind::Inverted],
        )
        .column(
            "country",
            [IndexKind::Dictionary, IndexKind::Forward, IndexKind::Inverted],
        )
}

/// A loader with two build threads.
pub fn loader() -> IndexLoader {
    IndexLoader::new(LoaderConfig::new().build_threads(2)).expect("Failed to create loader")
}

/// A segment in a temporary directory, removed on drop.
pub struct TempSegment {
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
    path: PathBuf,
}

impl TempSegment {
    /// Writes a segment with `creator`.
    pub fn create(creator: &SegmentCreator) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("segment");
        creator.create(&path).expect("Failed to create segment");
        Self {
            _temp_dir: temp_dir,
            path,
        }
    }

    /// The standard scenario in a bare layout.
    pub fn user_country(version: FormatVersion, docs: u32) -> Self {
        Self::create(&user_country_segment("events", docs, version))
    }

    /// The standard scenario already in the generation layout.
    pub fn user_country_generations(version: FormatVersion, docs: u32) -> Self {
        Self::create(&user_country_segment("events", docs, version).layout(SegmentLayout::Generation))
    }

    /// Segment root directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the segment for building.
    pub fn open_rw(&self) -> SegmentDirectory {
        SegmentDirectory::open(&self.path, OpenMode::ReadWrite, BufferManager::default())
            .expect("Failed to open segment read-write")
    }

    /// Opens the segment read-only.
    pub fn open_ro(&self) -> SegmentDirectory {
        SegmentDirectory::open(&self.path, OpenMode::ReadOnly, BufferManager::default())
            .expect("Failed to open segment read-only")
    }

    /// Names of staging directories currently present.
    pub fn staging_dirs(&self) -> Vec<String> {
        entries_with_prefix(&self.path, "staging-")
    }

    /// Names of generation directories currently present.
    pub fn generation_dirs(&self) -> Vec<String> {
        entries_with_prefix(&self.path, "gen-")
    }
}

/// A directory holding several segments, for host tests.
pub struct TempSegmentRoot {
    dir: TempDir,
}

impl TempSegmentRoot {
    /// Creates an empty root.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Writes a segment named `name` with `creator`.
    pub fn add(&self, name: &str, creator: &SegmentCreator) -> PathBuf {
        let path = self.dir.path().join(name);
        creator.create(&path).expect("Failed to create segment");
        path
    }

    /// Root directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TempSegmentRoot {
    fn default() -> Self {
        Self::new()
    }
}

fn entries_with_prefix(dir: &Path, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to list segment directory")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(prefix))
        .collect();
    names.sort();
    names
}

/// Flips one byte of a file in place.
pub fn corrupt_byte(path: &Path, offset: u64) {
    let mut data = fs::read(path).expect("Failed to read file");
    let i = usize::try_from(offset).expect("offset fits usize");
    data[i] ^= 0xFF;
    fs::write(path, data).expect("Failed to write file");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_is_deterministic() {
        assert_eq!(user_id(5), Value::Long(1_000_015));
        assert_eq!(country(0), Value::from("us"));
        assert_eq!(country(1), country(1));
    }

    #[test]
    fn scenario_uses_every_country() {
        let seen: std::collections::BTreeSet<Value> = (0..12).map(country).collect();
        assert_eq!(seen.len(), COUNTRIES.len());
        assert!(seen.contains(&Value::from("null")));
    }

    #[test]
    fn temp_segment_opens() {
        let segment = TempSegment::user_country(FormatVersion::V3, 100);
        let dir = segment.open_ro();
        assert_eq!(dir.reader().metadata().total_docs, 100);
        assert!(segment.staging_dirs().is_empty());
        assert!(segment.generation_dirs().is_empty());
    }
}
