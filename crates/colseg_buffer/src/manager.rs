//! The buffer manager and its handles.

use crate::error::{BufferError, BufferResult};
use crate::region::Region;
use crate::stats::{BufferStats, Counters};
use bytes::Bytes;
use memmap2::{Mmap, MmapOptions};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Deref;
use std::sync::Arc;
use std::time::SystemTime;

/// How acquired regions are backed in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackingMode {
    /// Map the region read-only into the address space.
    #[default]
    Mmap,
    /// Read the region into a heap allocation.
    Heap,
}

/// Configuration for a [`BufferManager`].
#[derive(Debug, Clone, Default)]
pub struct BufferConfig {
    /// Backing used for newly acquired regions.
    pub mode: BackingMode,
}

impl BufferConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backing mode.
    #[must_use]
    pub const fn mode(mut self, mode: BackingMode) -> Self {
        self.mode = mode;
        self
    }
}

enum Backing {
    Mapped(Mmap),
    Heap(Bytes),
}

impl Backing {
    fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Mapped(map) => map,
            Backing::Heap(bytes) => bytes,
        }
    }
}

/// Distinguishes a file from a later one created at the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FileId {
    dev: u64,
    ino: u64,
    len: u64,
    modified: Option<SystemTime>,
}

impl FileId {
    fn of(meta: &Metadata) -> Self {
        #[cfg(unix)]
        let (dev, ino) = {
            use std::os::unix::fs::MetadataExt;
            (meta.dev(), meta.ino())
        };
        #[cfg(not(unix))]
        let (dev, ino) = (0, 0);
        Self {
            dev,
            ino,
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }
}

type SlotKey = (Region, FileId);

struct Slot {
    key: SlotKey,
    backing: Arc<Backing>,
    refs: usize,
}

/// Arena of live backings. Slots are addressed by id; `by_region` lets
/// concurrent acquires of one region of one file find the slot that is
/// already loaded.
#[derive(Default)]
struct Table {
    next_id: u64,
    slots: HashMap<u64, Slot>,
    by_region: HashMap<SlotKey, u64>,
}

struct Shared {
    config: BufferConfig,
    table: Mutex<Table>,
    counters: Counters,
}

impl Shared {
    fn retain(&self, id: u64) {
        let mut table = self.table.lock();
        if let Some(slot) = table.slots.get_mut(&id) {
            slot.refs += 1;
        }
        self.counters.record_acquire();
    }

    fn release(&self, id: u64) {
        let mut table = self.table.lock();
        self.counters.record_release();

        let Some(slot) = table.slots.get_mut(&id) else {
            return;
        };
        slot.refs -= 1;
        if slot.refs > 0 {
            return;
        }

        if let Some(slot) = table.slots.remove(&id) {
            if table.by_region.get(&slot.key) == Some(&id) {
                table.by_region.remove(&slot.key);
            }
            self.counters.record_unload(slot.backing.as_slice().len() as u64);
        }
    }
}

/// Owns the memory behind every acquired region.
///
/// The manager is cheap to clone; clones share one slot table.
///
/// # Thread Safety
///
/// Acquire and release may be called from any thread. Loading a region
/// happens outside the table lock; if two threads race to load the same
/// region, the first one to publish its slot wins and the other adopts it.
///
/// A slot belongs to one file. If the file at a region's path is replaced,
/// the next acquire loads the new file while older handles keep the old
/// bytes.
#[derive(Clone)]
pub struct BufferManager {
    shared: Arc<Shared>,
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}

impl BufferManager {
    /// Creates a buffer manager.
    #[must_use]
    pub fn new(config: BufferConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                table: Mutex::new(Table::default()),
                counters: Counters::default(),
            }),
        }
    }

    /// Returns the configured backing mode.
    #[must_use]
    pub fn mode(&self) -> BackingMode {
        self.shared.config.mode
    }

    /// Acquires a handle on `region`, loading it if no handle is live.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The backing file is missing or unreadable
    /// - The range extends beyond the end of the file
    pub fn acquire(&self, region: &Region) -> BufferResult<Buffer> {
        let meta = fs::metadata(&region.path).map_err(|e| BufferError::open(&region.path, e))?;
        let key = (region.clone(), FileId::of(&meta));
        if let Some(buffer) = self.share_existing(&key) {
            return Ok(buffer);
        }

        let (backing, file) = load(region, self.shared.config.mode)?;
        let backing = Arc::new(backing);
        let key = (region.clone(), file);

        let mut table = self.shared.table.lock();
        if let Some(&id) = table.by_region.get(&key) {
            // Lost the race; adopt the slot that got there first.
            if let Some(slot) = table.slots.get_mut(&id) {
                slot.refs += 1;
                let backing = Arc::clone(&slot.backing);
                self.shared.counters.record_acquire();
                return Ok(self.handle(id, region, backing));
            }
        }

        let id = table.next_id;
        table.next_id += 1;
        table.slots.insert(
            id,
            Slot {
                key: key.clone(),
                backing: Arc::clone(&backing),
                refs: 1,
            },
        );
        table.by_region.insert(key, id);
        self.shared
            .counters
            .record_load(backing.as_slice().len() as u64);
        self.shared.counters.record_acquire();

        Ok(self.handle(id, region, backing))
    }

    /// Releases a handle. Equivalent to dropping it.
    pub fn release(&self, buffer: Buffer) {
        buffer.release();
    }

    /// Returns the number of regions currently backed in memory.
    #[must_use]
    pub fn resident_regions(&self) -> usize {
        self.shared.table.lock().slots.len()
    }

    /// Returns a snapshot of the manager counters.
    #[must_use]
    pub fn stats(&self) -> BufferStats {
        let regions = self.resident_regions();
        self.shared.counters.snapshot(regions)
    }

    fn share_existing(&self, key: &SlotKey) -> Option<Buffer> {
        let mut table = self.shared.table.lock();
        let id = *table.by_region.get(key)?;
        let slot = table.slots.get_mut(&id)?;
        slot.refs += 1;
        let backing = Arc::clone(&slot.backing);
        self.shared.counters.record_acquire();
        Some(self.handle(id, &key.0, backing))
    }

    fn handle(&self, id: u64, region: &Region, backing: Arc<Backing>) -> Buffer {
        Buffer {
            id,
            region: region.clone(),
            backing,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferManager")
            .field("mode", &self.shared.config.mode)
            .field("resident_regions", &self.resident_regions())
            .finish_non_exhaustive()
    }
}

fn load(region: &Region, mode: BackingMode) -> BufferResult<(Backing, FileId)> {
    let mut file = File::open(&region.path).map_err(|e| BufferError::open(&region.path, e))?;
    let meta = file.metadata()?;
    let id = FileId::of(&meta);
    let size = meta.len();

    let out_of_bounds = || BufferError::RangeOutOfBounds {
        path: region.path.clone(),
        offset: region.offset,
        len: region.len,
        size,
    };
    let end = region.end().ok_or_else(out_of_bounds)?;
    if end > size {
        return Err(out_of_bounds());
    }
    let len = usize::try_from(region.len).map_err(|_| out_of_bounds())?;

    if len == 0 {
        return Ok((Backing::Heap(Bytes::new()), id));
    }

    let backing = match mode {
        BackingMode::Mmap => Backing::Mapped(map_region(&file, region.offset, len)?),
        BackingMode::Heap => {
            file.seek(SeekFrom::Start(region.offset))?;
            let mut data = vec![0u8; len];
            file.read_exact(&mut data)?;
            Backing::Heap(Bytes::from(data))
        }
    };
    Ok((backing, id))
}

#[allow(unsafe_code)]
fn map_region(file: &File, offset: u64, len: usize) -> io::Result<Mmap> {
    // SAFETY: segment files are written once, synced, and never modified in
    // place afterwards; new content always goes to a new file.
    unsafe { MmapOptions::new().offset(offset).len(len).map(file) }
}

/// A reference-counted handle on an acquired region.
///
/// Cloning a handle increments the region's count; dropping (or
/// [`Buffer::release`]) decrements it.
pub struct Buffer {
    id: u64,
    region: Region,
    backing: Arc<Backing>,
    shared: Arc<Shared>,
}

impl Buffer {
    /// Returns the region this handle was acquired for.
    #[must_use]
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Returns the bytes of the region.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        self.backing.as_slice()
    }

    /// Returns true if the region is backed by a memory map.
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        matches!(*self.backing, Backing::Mapped(_))
    }

    /// Releases this handle.
    pub fn release(self) {
        drop(self);
    }
}

impl Clone for Buffer {
    fn clone(&self) -> Self {
        self.shared.retain(self.id);
        Self {
            id: self.id,
            region: self.region.clone(),
            backing: Arc::clone(&self.backing),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.shared.release(self.id);
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("region", &self.region)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;
    use tempfile::tempdir;

    fn write_file(path: &std::path::Path, data: &[u8]) {
        let mut file = File::create(path).unwrap();
        file.write_all(data).unwrap();
        file.sync_all().unwrap();
    }

    fn managers() -> [BufferManager; 2] {
        [
            BufferManager::new(BufferConfig::new().mode(BackingMode::Mmap)),
            BufferManager::new(BufferConfig::new().mode(BackingMode::Heap)),
        ]
    }

    #[test]
    fn acquire_reads_region() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_file(&path, b"hello columnar world");

        for manager in managers() {
            let buffer = manager.acquire(&Region::new(&path, 6, 8)).unwrap();
            assert_eq!(buffer.as_slice(), b"columnar");
            assert_eq!(buffer.is_mapped(), manager.mode() == BackingMode::Mmap);
        }
    }

    #[test]
    fn same_region_shares_one_backing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_file(&path, &[7u8; 64]);

        let manager = BufferManager::new(BufferConfig::default());
        let region = Region::new(&path, 0, 64);

        let a = manager.acquire(&region).unwrap();
        let b = manager.acquire(&region).unwrap();
        assert_eq!(manager.resident_regions(), 1);
        assert_eq!(a.as_slice().as_ptr(), b.as_slice().as_ptr());

        let stats = manager.stats();
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.acquires, 2);
    }

    #[test]
    fn backing_freed_after_last_release() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_file(&path, &[1u8; 32]);

        let manager = BufferManager::new(BufferConfig::default());
        let region = Region::new(&path, 0, 32);

        let a = manager.acquire(&region).unwrap();
        let b = a.clone();
        manager.release(a);
        assert_eq!(manager.resident_regions(), 1);

        b.release();
        assert_eq!(manager.resident_regions(), 0);

        let stats = manager.stats();
        assert_eq!(stats.unloads, 1);
        assert_eq!(stats.resident_bytes, 0);
        assert_eq!(stats.releases, 2);
    }

    #[test]
    fn reacquire_after_release_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_file(&path, b"abcdef");

        let manager = BufferManager::new(BufferConfig::default());
        let region = Region::new(&path, 0, 6);

        manager.acquire(&region).unwrap().release();
        let again = manager.acquire(&region).unwrap();
        assert_eq!(again.as_slice(), b"abcdef");
        assert_eq!(manager.stats().loads, 2);
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempdir().unwrap();
        let manager = BufferManager::new(BufferConfig::default());
        let result = manager.acquire(&Region::new(&dir.path().join("absent"), 0, 1));
        assert!(matches!(result, Err(BufferError::Open { .. })));
    }

    #[test]
    fn range_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_file(&path, b"short");

        for manager in managers() {
            let result = manager.acquire(&Region::new(&path, 2, 10));
            assert!(matches!(
                result,
                Err(BufferError::RangeOutOfBounds { size: 5, .. })
            ));
        }
    }

    #[test]
    fn overflowing_range_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_file(&path, b"x");

        let manager = BufferManager::new(BufferConfig::default());
        let result = manager.acquire(&Region::new(&path, u64::MAX, 2));
        assert!(matches!(result, Err(BufferError::RangeOutOfBounds { .. })));
    }

    #[test]
    fn empty_region_is_heap_backed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_file(&path, b"abc");

        let manager = BufferManager::new(BufferConfig::default());
        let buffer = manager.acquire(&Region::new(&path, 3, 0)).unwrap();
        assert!(buffer.is_empty());
        assert!(!buffer.is_mapped());
    }

    #[test]
    fn handle_survives_file_removal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_file(&path, b"still readable");

        for manager in managers() {
            let buffer = manager.acquire(&Region::new(&path, 0, 14)).unwrap();
            #[cfg(unix)]
            std::fs::remove_file(&path).unwrap();
            assert_eq!(buffer.as_slice(), b"still readable");
            drop(buffer);
            if !path.exists() {
                write_file(&path, b"still readable");
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn replaced_file_gets_new_slot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_file(&path, b"old contents");

        for manager in managers() {
            let region = Region::new(&path, 0, 3);
            let old = manager.acquire(&region).unwrap();
            assert_eq!(old.as_slice(), b"old");

            std::fs::remove_file(&path).unwrap();
            write_file(&path, b"new contents, longer");

            let new = manager.acquire(&region).unwrap();
            assert_eq!(new.as_slice(), b"new");
            assert_eq!(old.as_slice(), b"old");
            assert_eq!(manager.resident_regions(), 2);

            drop(old);
            assert_eq!(manager.acquire(&region).unwrap().as_slice(), b"new");
            drop(new);
            assert_eq!(manager.resident_regions(), 0);
            write_file(&path, b"old contents");
        }
    }

    #[test]
    fn concurrent_acquires_share_slot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_file(&path, &[3u8; 4096]);

        let manager = BufferManager::new(BufferConfig::default());
        let region = Region::new(&path, 0, 4096);
        let keep = manager.acquire(&region).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                let region = region.clone();
                thread::spawn(move || {
                    let buffer = manager.acquire(&region).unwrap();
                    buffer.iter().map(|&b| u64::from(b)).sum::<u64>()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 3 * 4096);
        }
        assert_eq!(manager.resident_regions(), 1);
        assert_eq!(manager.stats().loads, 1);
        drop(keep);
        assert_eq!(manager.resident_regions(), 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn acquired_bytes_match_file(
                data in prop::collection::vec(any::<u8>(), 1..2048),
                start in 0usize..2048,
                len in 0usize..2048,
                heap in any::<bool>(),
            ) {
                let start = start % data.len();
                let len = len % (data.len() - start + 1);

                let dir = tempdir().unwrap();
                let path = dir.path().join("data.bin");
                write_file(&path, &data);

                let mode = if heap { BackingMode::Heap } else { BackingMode::Mmap };
                let manager = BufferManager::new(BufferConfig::new().mode(mode));
                let buffer = manager
                    .acquire(&Region::new(&path, start as u64, len as u64))
                    .unwrap();
                prop_assert_eq!(buffer.as_slice(), &data[start..start + len]);
            }
        }
    }
}
