//! Loader and indexing configuration.

use colseg_buffer::{BackingMode, BufferConfig};
use colseg_codec::{FormatVersion, IndexKind, SegmentMetadata};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Configuration of an [`IndexLoader`](crate::IndexLoader) and the
/// [`SegmentHost`](crate::SegmentHost) built on it.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Worker threads for per-column index builds.
    pub build_threads: usize,

    /// Worker threads for loading segments in parallel.
    pub load_threads: usize,

    /// Layout used when an indexing config names no target version.
    pub default_target_version: Option<FormatVersion>,

    /// How index bytes are brought into memory.
    pub buffer_mode: BackingMode,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            build_threads: 4,
            load_threads: 2,
            default_target_version: None,
            buffer_mode: BackingMode::Mmap,
        }
    }
}

impl LoaderConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of index build threads (at least 1).
    #[must_use]
    pub const fn build_threads(mut self, threads: usize) -> Self {
        self.build_threads = if threads == 0 { 1 } else { threads };
        self
    }

    /// Sets the number of segment load threads (at least 1).
    #[must_use]
    pub const fn load_threads(mut self, threads: usize) -> Self {
        self.load_threads = if threads == 0 { 1 } else { threads };
        self
    }

    /// Sets the layout segments are converted to by default.
    #[must_use]
    pub const fn default_target_version(mut self, version: Option<FormatVersion>) -> Self {
        self.default_target_version = version;
        self
    }

    /// Sets the buffer backing mode.
    #[must_use]
    pub const fn buffer_mode(mut self, mode: BackingMode) -> Self {
        self.buffer_mode = mode;
        self
    }

    /// Buffer manager configuration derived from this config.
    #[must_use]
    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig::new().mode(self.buffer_mode)
    }
}

/// Desired index set of a segment.
///
/// Columns not named here keep whatever indices they have.
///
/// ```json
/// {
///   "columns": { "userId": ["dictionary", "forward", "inverted"] },
///   "target_version": "v3"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Desired index kinds per column.
    #[serde(default)]
    pub columns: BTreeMap<String, BTreeSet<IndexKind>>,

    /// Layout the segment should end up in; `None` keeps the current one.
    #[serde(default)]
    pub target_version: Option<FormatVersion>,
}

impl IndexingConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Describes the indices a segment currently has.
    #[must_use]
    pub fn from_metadata(metadata: &SegmentMetadata) -> Self {
        Self {
            columns: metadata
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.indexes.clone()))
                .collect(),
            target_version: None,
        }
    }

    /// Sets the desired index kinds of one column.
    #[must_use]
    pub fn column(mut self, name: &str, kinds: impl IntoIterator<Item = IndexKind>) -> Self {
        self.columns.insert(name.to_string(), kinds.into_iter().collect());
        self
    }

    /// Sets the target layout.
    #[must_use]
    pub const fn target_version(mut self, version: FormatVersion) -> Self {
        self.target_version = Some(version);
        self
    }
}
