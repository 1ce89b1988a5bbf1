//! File writing primitives used when building segments.

use crate::error::{BufferError, BufferResult};
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An append-only data file.
///
/// Every append returns the offset where the data landed, so callers can
/// record byte ranges before publishing a pointer to them.
///
/// # Durability
///
/// - `flush()` pushes buffered data to the OS
/// - `sync()` calls `File::sync_all()` so the data is on disk
///
/// # Example
///
/// ```no_run
/// use colseg_buffer::AppendFile;
/// use std::path::Path;
///
/// let mut file = AppendFile::create(Path::new("columns.psf")).unwrap();
/// let offset = file.append(b"index bytes").unwrap();
/// file.sync().unwrap();
/// assert_eq!(offset, 0);
/// ```
#[derive(Debug)]
pub struct AppendFile {
    path: PathBuf,
    file: File,
    size: u64,
}

impl AppendFile {
    /// Creates a new, empty file, truncating any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> BufferResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| BufferError::open(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size: 0,
        })
    }

    /// Opens an existing file for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open(path: &Path) -> BufferResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| BufferError::open(path, e))?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current size, which is where the next append will land.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Appends data and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    pub fn append(&mut self, data: &[u8]) -> BufferResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.size += data.len() as u64;

        Ok(offset)
    }

    /// Appends zero bytes until the size is a multiple of `alignment`.
    ///
    /// Returns the new size.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    pub fn pad_to(&mut self, alignment: u64) -> BufferResult<u64> {
        if alignment <= 1 {
            return Ok(self.size);
        }
        let rem = self.size % alignment;
        if rem != 0 {
            let padding = vec![0u8; (alignment - rem) as usize];
            self.append(&padding)?;
        }
        Ok(self.size)
    }

    /// Flushes buffered writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> BufferResult<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Syncs all data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> BufferResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Replaces `path` with `data` atomically.
///
/// Uses the write-then-rename pattern:
/// 1. Write to a sibling temporary file
/// 2. Sync the temporary file
/// 3. Rename it over `path`
/// 4. Sync the parent directory so the rename is durable
///
/// # Errors
///
/// Returns an error if any step fails; `path` is then left untouched.
pub fn write_file_atomic(path: &Path, data: &[u8]) -> BufferResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!("{file_name}.tmp"));

    let mut file = File::create(&temp_path).map_err(|e| BufferError::open(&temp_path, e))?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    if let Some(parent) = path.parent() {
        sync_directory(parent)?;
    }
    Ok(())
}

/// Syncs a directory so that entry creations, renames and deletions in it
/// are durable.
///
/// On Windows directory fsync is not supported; NTFS journaling covers
/// metadata durability, so this is a no-op there.
#[cfg(unix)]
pub fn sync_directory(path: &Path) -> BufferResult<()> {
    let dir = File::open(path).map_err(|e| BufferError::open(path, e))?;
    dir.sync_all()?;
    Ok(())
}

/// Syncs a directory so that entry creations, renames and deletions in it
/// are durable.
#[cfg(not(unix))]
pub fn sync_directory(_path: &Path) -> BufferResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_returns_offsets() {
        let dir = tempdir().unwrap();
        let mut file = AppendFile::create(&dir.path().join("data.bin")).unwrap();

        assert_eq!(file.append(b"hello").unwrap(), 0);
        assert_eq!(file.append(b" world").unwrap(), 5);
        assert_eq!(file.size(), 11);
        file.sync().unwrap();

        assert_eq!(fs::read(file.path()).unwrap(), b"hello world");
    }

    #[test]
    fn empty_append_keeps_offset() {
        let dir = tempdir().unwrap();
        let mut file = AppendFile::create(&dir.path().join("data.bin")).unwrap();
        file.append(b"x").unwrap();

        assert_eq!(file.append(b"").unwrap(), 1);
        assert_eq!(file.size(), 1);
    }

    #[test]
    fn pad_to_alignment() {
        let dir = tempdir().unwrap();
        let mut file = AppendFile::create(&dir.path().join("data.bin")).unwrap();
        file.append(b"abc").unwrap();

        assert_eq!(file.pad_to(8).unwrap(), 8);
        assert_eq!(file.pad_to(8).unwrap(), 8);
        assert_eq!(file.append(b"z").unwrap(), 8);
    }

    #[test]
    fn open_continues_at_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        {
            let mut file = AppendFile::create(&path).unwrap();
            file.append(b"persistent").unwrap();
            file.sync().unwrap();
        }

        let mut file = AppendFile::open(&path).unwrap();
        assert_eq!(file.size(), 10);
        assert_eq!(file.append(b"!").unwrap(), 10);
    }

    #[test]
    fn open_missing_fails() {
        let dir = tempdir().unwrap();
        let result = AppendFile::open(&dir.path().join("absent"));
        assert!(matches!(result, Err(BufferError::Open { .. })));
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.properties");

        write_file_atomic(&path, b"first").unwrap();
        write_file_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("metadata.properties.tmp").exists());
    }
}
