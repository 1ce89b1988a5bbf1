//! Named byte ranges.

use std::fmt;
use std::path::{Path, PathBuf};

/// A byte range of a file that can be acquired as a [`crate::Buffer`].
///
/// Two regions are the same region when path, offset and length all match;
/// acquires of the same region share one backing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    /// The backing file.
    pub path: PathBuf,
    /// Offset of the first byte.
    pub offset: u64,
    /// Length in bytes.
    pub len: u64,
}

impl Region {
    /// Creates a region.
    #[must_use]
    pub fn new(path: &Path, offset: u64, len: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            offset,
            len,
        }
    }

    /// Returns the offset one past the last byte, or `None` on overflow.
    #[must_use]
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.len)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..+{}]", self.path.display(), self.offset, self.len)
    }
}
