//! Segment directory management.
//!
//! This module owns the file system layout of one segment:
//!
//! ```text
//! <root>/
//! ├─ LOCK                # Advisory lock held by a read-write open
//! ├─ CURRENT             # Name of the live generation directory
//! ├─ gen-000003/         # Live representation
//! │  ├─ metadata.properties
//! │  ├─ creation.meta
//! │  └─ columns.psf, index_map (v3) or one file per index (v1, v2)
//! └─ staging-<uuid>/     # Representation being built
//! ```
//!
//! A segment delivered without `CURRENT` keeps its files directly in `<root>`
//! ("bare" layout). The first publish moves it to the generation layout and
//! retires the bare files.
//!
//! Publishing swaps `CURRENT` with a rename, so a crash leaves either the old
//! or the new generation live. Readers hold a snapshot of the generation they
//! started with; a superseded generation is deleted when its last snapshot
//! is dropped.
//!
//! Every open generation holds a shared lock on its `metadata.properties`,
//! in any process and any open mode. A generation is only deleted under an
//! exclusive lock on that file; one still pinned by another handle is left
//! for the next sweep, which runs on every publish and read-write open.
//! Read-only handles follow `CURRENT` when they take a new snapshot.

use crate::container::ColumnIndexContainer;
use crate::error::{CoreError, CoreResult, IoFailure};
use crate::staging::{StagingArea, STAGING_PREFIX};
use colseg_buffer::{sync_directory, write_file_atomic, BufferManager};
use colseg_codec::format::{legacy_file_name, IndexBlob};
use colseg_codec::{
    codec_for, detect_version, read_creation_meta, FormatCodec, FormatVersion, IndexKind,
    IndexMap, SegmentMetadata, CREATION_META_FILE, DATA_FILE, INDEX_MAP_FILE, METADATA_FILE,
};
use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const LOCK_FILE: &str = "LOCK";
pub(crate) const CURRENT_FILE: &str = "CURRENT";
const GENERATION_PREFIX: &str = "gen-";

/// How a segment directory is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Reads only; never takes the `LOCK` or modifies files.
    ReadOnly,
    /// Exclusive writer; builds and publishes new generations.
    ReadWrite,
}

/// How many times an open retries when the generation it resolved is
/// deleted underneath it.
const RESOLVE_ATTEMPTS: usize = 4;

/// One on-disk representation of the segment.
#[derive(Debug)]
struct Generation {
    dir: PathBuf,
    /// 0 for a bare segment.
    number: u64,
    retired: AtomicBool,
    /// Shared lock on the generation's metadata file.
    pin: Option<File>,
}

impl Generation {
    /// Pins the generation in `dir`.
    ///
    /// Fails with `NotFound` or `WouldBlock` if the generation is gone or
    /// being deleted.
    fn pin(dir: PathBuf, number: u64) -> io::Result<Self> {
        let file = File::open(dir.join(METADATA_FILE))?;
        file.try_lock_shared()
            .map_err(|_| io::Error::new(io::ErrorKind::WouldBlock, "generation is being removed"))?;
        Ok(Self {
            dir,
            number,
            retired: AtomicBool::new(false),
            pin: Some(file),
        })
    }

    fn name(&self) -> String {
        generation_name(self.number)
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        self.pin = None;
        if !self.retired.load(Ordering::Acquire) {
            return;
        }
        match remove_generation(&self.dir, self.number) {
            Ok(true) => tracing::debug!(dir = %self.dir.display(), "removed superseded generation"),
            Ok(false) => tracing::debug!(
                dir = %self.dir.display(),
                "superseded generation still pinned; leaving it for the next sweep"
            ),
            Err(e) => tracing::warn!(
                dir = %self.dir.display(),
                error = %e,
                "failed to remove superseded generation"
            ),
        }
    }
}

/// The live metadata/index-map pair and the columns loaded from it.
struct LiveState {
    generation: Arc<Generation>,
    metadata: SegmentMetadata,
    index_map: IndexMap,
    codec: &'static dyn FormatCodec,
    columns: Mutex<HashMap<String, Arc<ColumnIndexContainer>>>,
}

impl LiveState {
    /// Resolves `CURRENT` and loads the generation it names, retrying if a
    /// concurrent publish removes it first.
    fn open(root: &Path) -> CoreResult<Self> {
        let mut attempt = 1;
        loop {
            match resolve_current(root).and_then(Self::load) {
                Err(e) if attempt < RESOLVE_ATTEMPTS && is_vanished(&e) => {
                    tracing::debug!(root = %root.display(), attempt, "generation vanished while opening; retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn load(generation: Generation) -> CoreResult<Self> {
        let dir = &generation.dir;
        let version = detect_version(dir)?;
        let codec = codec_for(version);
        let metadata = codec.read_metadata(dir)?;
        let index_map = codec.read_index_map(dir, &metadata)?;
        Ok(Self {
            generation: Arc::new(generation),
            metadata,
            index_map,
            codec,
            columns: Mutex::new(HashMap::new()),
        })
    }
}

/// A segment on disk, opened for reading or for building new generations.
///
/// # Thread Safety
///
/// `SegmentDirectory` is `Send + Sync`. Any number of threads may take
/// [`reader`](Self::reader) snapshots while one build runs; builds are
/// serialized by [`begin_build`](Self::begin_build).
pub struct SegmentDirectory {
    root: PathBuf,
    mode: OpenMode,
    buffers: BufferManager,
    live: RwLock<Arc<LiveState>>,
    build_lock: Mutex<()>,
    _lock_file: Option<File>,
}

impl std::fmt::Debug for SegmentDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let live = self.live.read();
        f.debug_struct("SegmentDirectory")
            .field("root", &self.root)
            .field("mode", &self.mode)
            .field("generation", &live.generation.name())
            .field("version", &live.metadata.version)
            .finish_non_exhaustive()
    }
}

impl SegmentDirectory {
    /// Opens a segment.
    ///
    /// A read-write open takes the segment's `LOCK` and removes staging and
    /// generation directories left behind by an interrupted build.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `SegmentNotFound` if `root` holds no segment
    /// - `SegmentLocked` if another writer holds the lock
    /// - `UnsupportedFormat` if the segment was written by a newer engine
    /// - `CorruptSegment` if metadata and index map disagree
    pub fn open(root: &Path, mode: OpenMode, buffers: BufferManager) -> CoreResult<Self> {
        if !root.is_dir() {
            return Err(CoreError::SegmentNotFound {
                name: root.display().to_string(),
            });
        }

        let lock_file = match mode {
            OpenMode::ReadOnly => None,
            OpenMode::ReadWrite => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(root.join(LOCK_FILE))?;
                if file.try_lock_exclusive().is_err() {
                    return Err(CoreError::SegmentLocked);
                }
                Some(file)
            }
        };

        let state = LiveState::open(root)?;
        if mode == OpenMode::ReadWrite {
            sweep(root, state.generation.number)?;
        }

        tracing::debug!(
            root = %root.display(),
            generation = %state.generation.name(),
            version = %state.metadata.version,
            "opened segment"
        );

        Ok(Self {
            root: root.to_path_buf(),
            mode,
            buffers,
            live: RwLock::new(Arc::new(state)),
            build_lock: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Root directory of the segment.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// How the directory was opened.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// The buffer manager index bytes are acquired through.
    #[must_use]
    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    /// Takes a snapshot of the live representation.
    ///
    /// The snapshot is unaffected by later publishes and keeps its
    /// generation's files on disk until it is dropped. A read-only directory
    /// first moves to the generation `CURRENT` names, if that changed; if
    /// the move fails it keeps serving the generation it has.
    #[must_use]
    pub fn reader(&self) -> SegmentReader {
        if self.mode == OpenMode::ReadOnly {
            if let Err(e) = self.refresh() {
                tracing::warn!(root = %self.root.display(), error = %e, "failed to follow CURRENT");
            }
        }
        SegmentReader {
            state: Arc::clone(&self.live.read()),
            buffers: self.buffers.clone(),
        }
    }

    /// Moves a read-only directory to the generation `CURRENT` names.
    ///
    /// Returns whether the live generation changed. A read-write directory
    /// publishes its own generations and never moves.
    ///
    /// # Errors
    ///
    /// Returns the open error of the new generation; the directory then
    /// keeps its current one.
    pub fn refresh(&self) -> CoreResult<bool> {
        if self.mode == OpenMode::ReadWrite {
            return Ok(false);
        }
        let current = match fs::read_to_string(self.root.join(CURRENT_FILE)) {
            Ok(text) => parse_generation(text.trim()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let live_number = self.live.read().generation.number;
        if current.map_or(true, |n| n <= live_number) {
            return Ok(false);
        }

        let state = Arc::new(LiveState::open(&self.root)?);
        let mut live = self.live.write();
        if state.generation.number <= live.generation.number {
            return Ok(false);
        }
        tracing::debug!(
            root = %self.root.display(),
            from = %live.generation.name(),
            to = %state.generation.name(),
            "following published generation"
        );
        *live = state;
        Ok(true)
    }

    /// Starts a build, waiting for any build already running.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for a read-only directory.
    pub fn begin_build(&self) -> CoreResult<BuildGuard<'_>> {
        if self.mode != OpenMode::ReadWrite {
            return Err(CoreError::invalid_operation(
                "segment is open read-only",
            ));
        }
        let guard = self.build_lock.lock();
        let base = self.reader();
        Ok(BuildGuard {
            dir: self,
            _guard: guard,
            base,
        })
    }
}

/// Exclusive right to publish the next generation of a segment.
///
/// The guard captures the live state when the build starts; since builds
/// are serialized, that state is still live when the build publishes.
pub struct BuildGuard<'a> {
    dir: &'a SegmentDirectory,
    _guard: MutexGuard<'a, ()>,
    base: SegmentReader,
}

impl std::fmt::Debug for BuildGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildGuard")
            .field("root", &self.dir.root)
            .field("base", &self.base.generation())
            .finish_non_exhaustive()
    }
}

impl BuildGuard<'_> {
    /// Snapshot of the representation the build starts from.
    #[must_use]
    pub fn base(&self) -> &SegmentReader {
        &self.base
    }

    fn staging_path(&self) -> PathBuf {
        self.dir
            .root
            .join(format!("{STAGING_PREFIX}{}", Uuid::new_v4()))
    }

    /// Creates a staging area holding every index of the base.
    ///
    /// # Errors
    ///
    /// Returns `IoFailure` if the base files cannot be linked or copied.
    pub fn stage(&self) -> CoreResult<StagingArea> {
        let state = &self.base.state;
        StagingArea::inherit(
            self.staging_path(),
            &state.generation.dir,
            &state.metadata,
            &state.index_map,
        )
    }

    /// Creates an empty staging area in `version` for the base's columns.
    ///
    /// # Errors
    ///
    /// Returns `IoFailure` if the staging directory cannot be created.
    pub fn stage_empty(&self, version: FormatVersion) -> CoreResult<StagingArea> {
        StagingArea::empty(self.staging_path(), &self.base.state.metadata, version)
    }

    /// Makes a staging area the live representation.
    ///
    /// Finishes the staging area, renames it to the next generation,
    /// replaces `CURRENT`, then swaps the in-memory state. Readers that
    /// already hold a snapshot keep the old generation until they drop it.
    ///
    /// # Errors
    ///
    /// Returns an error if any step before the `CURRENT` swap fails; the
    /// live representation is then unchanged and the staging area removed.
    pub fn publish(self, mut staging: StagingArea) -> CoreResult<SegmentReader> {
        let root = &self.dir.root;
        let index_map = staging.finish()?;
        let metadata = staging.metadata().clone();

        let old = Arc::clone(&self.base.state);
        let number = old.generation.number + 1;
        let gen_dir = root.join(generation_name(number));
        if gen_dir.exists() {
            // Left over from a publish that failed after its rename.
            fs::remove_dir_all(&gen_dir)?;
        }

        fs::rename(staging.path(), &gen_dir)?;
        staging.mark_published();
        drop(staging);

        let swap = Generation::pin(gen_dir.clone(), number).map_err(CoreError::from).and_then(|generation| {
            write_file_atomic(&root.join(CURRENT_FILE), generation_name(number).as_bytes())?;
            Ok(generation)
        });
        let generation = match swap {
            Ok(generation) => generation,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&gen_dir) {
                    tracing::warn!(dir = %gen_dir.display(), error = %cleanup, "failed to remove unpublished generation");
                }
                return Err(e);
            }
        };

        let state = Arc::new(LiveState {
            generation: Arc::new(generation),
            codec: codec_for(metadata.version),
            metadata,
            index_map,
            columns: Mutex::new(HashMap::new()),
        });

        *self.dir.live.write() = Arc::clone(&state);
        old.generation.retired.store(true, Ordering::Release);
        drop(old);
        if let Err(e) = sweep(root, number) {
            tracing::warn!(root = %root.display(), error = %e, "failed to sweep superseded generations");
        }

        tracing::info!(
            segment = %state.metadata.name,
            generation = %state.generation.name(),
            version = %state.metadata.version,
            "published segment generation"
        );

        Ok(SegmentReader {
            state,
            buffers: self.dir.buffers.clone(),
        })
    }
}

/// A point-in-time view of a segment.
///
/// Cloning is cheap. Columns are loaded on first access and cached for the
/// lifetime of the generation.
#[derive(Clone)]
pub struct SegmentReader {
    state: Arc<LiveState>,
    buffers: BufferManager,
}

impl std::fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("segment", &self.state.metadata.name)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl SegmentReader {
    /// Segment metadata.
    #[must_use]
    pub fn metadata(&self) -> &SegmentMetadata {
        &self.state.metadata
    }

    /// Index locations.
    #[must_use]
    pub fn index_map(&self) -> &IndexMap {
        &self.state.index_map
    }

    /// Layout version.
    #[must_use]
    pub fn version(&self) -> FormatVersion {
        self.state.metadata.version
    }

    /// Codec of the representation.
    #[must_use]
    pub fn codec(&self) -> &'static dyn FormatCodec {
        self.state.codec
    }

    /// Directory holding the representation's files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.state.generation.dir
    }

    /// Name of the generation, `gen-000000` for a bare segment.
    #[must_use]
    pub fn generation(&self) -> String {
        self.state.generation.name()
    }

    /// Loads (or returns the cached) indices of one column.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for an unknown column and
    /// `CorruptSegment` or `IoFailure` if an index cannot be loaded.
    pub fn column(&self, name: &str) -> CoreResult<Arc<ColumnIndexContainer>> {
        if let Some(column) = self.state.columns.lock().get(name) {
            return Ok(Arc::clone(column));
        }

        let column_meta = self
            .state
            .metadata
            .column(name)
            .ok_or_else(|| CoreError::invalid_operation(format!("unknown column {name}")))?;
        let container = Arc::new(ColumnIndexContainer::load(
            self.state.codec,
            &self.buffers,
            self.dir(),
            &self.state.metadata,
            &self.state.index_map,
            column_meta,
        )?);

        // Another thread may have loaded it meanwhile; keep the first.
        let mut columns = self.state.columns.lock();
        let entry = columns
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&container));
        Ok(Arc::clone(entry))
    }

    /// Loads and validates every column.
    ///
    /// # Errors
    ///
    /// Returns the first load failure.
    pub fn load_all(&self) -> CoreResult<Vec<Arc<ColumnIndexContainer>>> {
        self.state
            .metadata
            .columns
            .iter()
            .map(|c| self.column(&c.name))
            .collect()
    }

    /// Acquires the framed blob of one index without decoding it.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSegment` if the index is not mapped or its frame is
    /// invalid.
    pub fn read_blob(&self, column: &str, kind: IndexKind) -> CoreResult<IndexBlob> {
        Ok(self.state.codec.read_column_index(
            &self.buffers,
            self.dir(),
            &self.state.metadata,
            &self.state.index_map,
            column,
            kind,
        )?)
    }

    /// Recomputes the data checksum and compares it with `creation.meta`.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSegment` on mismatch or if the record is missing.
    pub fn verify_checksum(&self) -> CoreResult<()> {
        let record = read_creation_meta(self.dir())?;
        let actual = self
            .state
            .codec
            .data_checksum(self.dir(), &self.state.index_map)?;
        if record.data_crc != actual {
            return Err(CoreError::corrupt(format!(
                "data checksum mismatch: expected {:08x}, got {actual:08x}",
                record.data_crc
            )));
        }
        Ok(())
    }
}

pub(crate) fn generation_name(number: u64) -> String {
    format!("{GENERATION_PREFIX}{number:06}")
}

fn parse_generation(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(GENERATION_PREFIX)?;
    if digits.len() < 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn resolve_current(root: &Path) -> CoreResult<Generation> {
    let (dir, number) = match fs::read_to_string(root.join(CURRENT_FILE)) {
        Ok(text) => {
            let name = text.trim();
            let number = parse_generation(name).ok_or_else(|| {
                CoreError::corrupt(format!("CURRENT names invalid generation {name:?}"))
            })?;
            let dir = root.join(name);
            if !dir.is_dir() {
                return Err(CoreError::corrupt(format!(
                    "CURRENT names missing generation {name}"
                )));
            }
            (dir, number)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if !root.join(METADATA_FILE).exists() {
                // A first publish may have retired the bare files meanwhile.
                if root.join(CURRENT_FILE).exists() {
                    return Err(io::Error::new(io::ErrorKind::NotFound, "bare segment was retired").into());
                }
                return Err(CoreError::SegmentNotFound {
                    name: root.display().to_string(),
                });
            }
            (root.to_path_buf(), 0)
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Generation::pin(dir, number)?)
}

/// True for the errors a concurrent removal of the resolved generation causes.
fn is_vanished(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::IoFailure(IoFailure::Io(e))
            if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::WouldBlock)
    )
}

/// Removes staging areas, superseded generations and retired bare files
/// that no handle pins any more.
fn sweep(root: &Path, live_number: u64) -> CoreResult<()> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !entry.path().is_dir() {
            continue;
        }
        let result = if name.starts_with(STAGING_PREFIX) {
            fs::remove_dir_all(entry.path()).map(|()| true)
        } else {
            match parse_generation(&name) {
                Some(number) if number != live_number => remove_generation(&entry.path(), number),
                _ => continue,
            }
        };
        match result {
            Ok(true) => tracing::debug!(dir = %name, "removed orphaned directory"),
            Ok(false) => tracing::debug!(dir = %name, "orphaned generation still pinned"),
            Err(e) => tracing::warn!(dir = %name, error = %e, "failed to remove orphaned directory"),
        }
    }
    if live_number > 0 && root.join(METADATA_FILE).exists() {
        match remove_generation(root, 0) {
            Ok(true) => tracing::debug!(root = %root.display(), "removed retired bare files"),
            Ok(false) => {}
            Err(e) => tracing::warn!(root = %root.display(), error = %e, "failed to remove retired bare files"),
        }
    }
    Ok(())
}

/// Deletes a generation unless another handle pins it.
///
/// Returns false if it is pinned. Generation 0 is the bare layout in the
/// segment root.
fn remove_generation(dir: &Path, number: u64) -> io::Result<bool> {
    // Held until the files are gone so no handle can pin them meanwhile.
    let _claim = match File::open(dir.join(METADATA_FILE)) {
        Ok(file) => {
            if file.try_lock_exclusive().is_err() {
                return Ok(false);
            }
            Some(file)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };
    if number == 0 {
        remove_bare_files(dir)?;
    } else {
        fs::remove_dir_all(dir)?;
    }
    Ok(true)
}

/// Removes the files of a bare segment from `root`.
///
/// Metadata goes first so an interrupted removal never leaves metadata
/// pointing at deleted index files.
fn remove_bare_files(root: &Path) -> io::Result<()> {
    let index_files: Vec<String> = match colseg_codec::read_metadata(root) {
        Ok(metadata) => metadata
            .columns
            .iter()
            .flat_map(|c| c.indexes.iter().map(move |&k| legacy_file_name(c, k)))
            .collect(),
        Err(_) => Vec::new(),
    };

    let fixed = [METADATA_FILE, CREATION_META_FILE, INDEX_MAP_FILE, DATA_FILE];
    for name in fixed.iter().copied().chain(index_files.iter().map(String::as_str)) {
        match fs::remove_file(root.join(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    sync_directory(root).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use colseg_buffer::BufferConfig;
    use colseg_codec::index::forward::encode_raw;
    use colseg_codec::{write_metadata, ColumnMetadata, DataType, Value};
    use tempfile::TempDir;

    fn write_bare(root: &Path, version: FormatVersion) {
        let metadata = SegmentMetadata {
            name: "seg".to_string(),
            total_docs: 3,
            version,
            creation_time: 1,
            columns: vec![ColumnMetadata::raw("score", DataType::Int, 3, 3)],
        };
        let codec = codec_for(version);
        let mut writer = codec.create_writer(root).unwrap();
        let payload = encode_raw(DataType::Int, &[Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap();
        writer
            .write_column_index(&metadata.columns[0], IndexKind::Forward, 3, &payload)
            .unwrap();
        writer.finish().unwrap();
        write_metadata(root, &metadata).unwrap();
    }

    fn buffers() -> BufferManager {
        BufferManager::new(BufferConfig::default())
    }

    #[test]
    fn open_bare_segment() {
        let root = TempDir::new().unwrap();
        write_bare(root.path(), FormatVersion::V2);
        let dir = SegmentDirectory::open(root.path(), OpenMode::ReadOnly, buffers()).unwrap();
        let reader = dir.reader();
        assert_eq!(reader.generation(), "gen-000000");
        assert_eq!(reader.column("score").unwrap().value(2), Some(Value::Int(3)));
    }

    #[test]
    fn empty_directory_is_not_a_segment() {
        let root = TempDir::new().unwrap();
        let err = SegmentDirectory::open(root.path(), OpenMode::ReadOnly, buffers()).unwrap_err();
        assert!(matches!(err, CoreError::SegmentNotFound { .. }));
    }

    #[test]
    fn second_writer_is_locked_out() {
        let root = TempDir::new().unwrap();
        write_bare(root.path(), FormatVersion::V3);
        let _dir = SegmentDirectory::open(root.path(), OpenMode::ReadWrite, buffers()).unwrap();
        let err = SegmentDirectory::open(root.path(), OpenMode::ReadWrite, buffers()).unwrap_err();
        assert!(matches!(err, CoreError::SegmentLocked));
        assert!(SegmentDirectory::open(root.path(), OpenMode::ReadOnly, buffers()).is_ok());
    }

    #[test]
    fn read_only_cannot_build() {
        let root = TempDir::new().unwrap();
        write_bare(root.path(), FormatVersion::V3);
        let dir = SegmentDirectory::open(root.path(), OpenMode::ReadOnly, buffers()).unwrap();
        assert!(dir.begin_build().is_err());
    }

    #[test]
    fn publish_moves_to_generation_layout() {
        let root = TempDir::new().unwrap();
        write_bare(root.path(), FormatVersion::V3);
        let dir = SegmentDirectory::open(root.path(), OpenMode::ReadWrite, buffers()).unwrap();
        let before = dir.reader();

        let build = dir.begin_build().unwrap();
        let staging = build.stage().unwrap();
        let after = build.publish(staging).unwrap();

        assert_eq!(after.generation(), "gen-000001");
        assert_eq!(
            fs::read_to_string(root.path().join(CURRENT_FILE)).unwrap(),
            "gen-000001"
        );
        // The old snapshot still reads; the bare files go once it drops.
        assert_eq!(before.column("score").unwrap().value(0), Some(Value::Int(1)));
        assert!(root.path().join(METADATA_FILE).exists());
        drop(before);
        assert!(!root.path().join(METADATA_FILE).exists());

        drop(dir);
        let reopened = SegmentDirectory::open(root.path(), OpenMode::ReadOnly, buffers()).unwrap();
        assert_eq!(reopened.reader().generation(), "gen-000001");
        reopened.reader().verify_checksum().unwrap();
    }

    #[test]
    fn superseded_generation_removed_after_last_reader() {
        let root = TempDir::new().unwrap();
        write_bare(root.path(), FormatVersion::V2);
        let dir = SegmentDirectory::open(root.path(), OpenMode::ReadWrite, buffers()).unwrap();

        for _ in 0..2 {
            let build = dir.begin_build().unwrap();
            let staging = build.stage().unwrap();
            build.publish(staging).unwrap();
        }
        let held = dir.reader();
        assert_eq!(held.generation(), "gen-000002");

        let build = dir.begin_build().unwrap();
        let staging = build.stage().unwrap();
        build.publish(staging).unwrap();

        assert!(!root.path().join("gen-000001").exists());
        assert!(root.path().join("gen-000002").exists());
        drop(held);
        assert!(!root.path().join("gen-000002").exists());
        assert!(root.path().join("gen-000003").exists());
    }

    #[test]
    fn orphans_removed_on_open() {
        let root = TempDir::new().unwrap();
        write_bare(root.path(), FormatVersion::V3);
        fs::create_dir(root.path().join("staging-leftover")).unwrap();
        fs::create_dir(root.path().join("gen-000007")).unwrap();

        let _dir = SegmentDirectory::open(root.path(), OpenMode::ReadWrite, buffers()).unwrap();
        assert!(!root.path().join("staging-leftover").exists());
        assert!(!root.path().join("gen-000007").exists());
    }

    #[test]
    fn dropped_staging_leaves_live_untouched() {
        let root = TempDir::new().unwrap();
        write_bare(root.path(), FormatVersion::V3);
        let dir = SegmentDirectory::open(root.path(), OpenMode::ReadWrite, buffers()).unwrap();

        let build = dir.begin_build().unwrap();
        let mut staging = build.stage().unwrap();
        staging
            .write_index("score", IndexKind::NullValueVector, &[])
            .unwrap();
        let staging_path = staging.path().to_path_buf();
        drop(staging);
        drop(build);

        assert!(!staging_path.exists());
        let reader = dir.reader();
        assert_eq!(reader.generation(), "gen-000000");
        assert!(!reader.metadata().columns[0].has_index(IndexKind::NullValueVector));
    }

    #[test]
    fn read_only_handle_pins_and_follows() {
        let root = TempDir::new().unwrap();
        write_bare(root.path(), FormatVersion::V2);
        let ro = SegmentDirectory::open(root.path(), OpenMode::ReadOnly, buffers()).unwrap();
        let early = ro.reader();
        let rw = SegmentDirectory::open(root.path(), OpenMode::ReadWrite, buffers()).unwrap();

        let build = rw.begin_build().unwrap();
        let staging = build.stage().unwrap();
        build.publish(staging).unwrap();

        // The read-only handle still pins the bare files.
        assert!(root.path().join(METADATA_FILE).exists());
        assert_eq!(early.column("score").unwrap().value(1), Some(Value::Int(2)));

        assert!(ro.refresh().unwrap());
        let follower = ro.reader();
        assert_eq!(follower.generation(), "gen-000001");
        assert_eq!(follower.column("score").unwrap().value(2), Some(Value::Int(3)));
        assert!(!ro.refresh().unwrap());

        drop(early);
        let build = rw.begin_build().unwrap();
        let staging = build.stage().unwrap();
        build.publish(staging).unwrap();
        assert!(!root.path().join(METADATA_FILE).exists());
        // gen-000001 stays while the follower holds it.
        assert!(root.path().join("gen-000001").exists());
        drop(follower);
        drop(ro);

        let build = rw.begin_build().unwrap();
        let staging = build.stage().unwrap();
        build.publish(staging).unwrap();
        assert!(!root.path().join("gen-000001").exists());
        assert!(!root.path().join("gen-000002").exists());
        assert!(root.path().join("gen-000003").exists());
    }

    #[test]
    fn corrupt_current_rejected() {
        let root = TempDir::new().unwrap();
        write_bare(root.path(), FormatVersion::V3);
        fs::write(root.path().join(CURRENT_FILE), "gen-000009").unwrap();
        let err = SegmentDirectory::open(root.path(), OpenMode::ReadOnly, buffers()).unwrap_err();
        assert!(matches!(err, CoreError::CorruptSegment { .. }));
    }
}
