//! Buffer manager counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of buffer manager activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Total number of `acquire` calls that returned a handle.
    pub acquires: u64,
    /// Total number of handle releases (explicit or on drop).
    pub releases: u64,
    /// Number of backings created (file mapped or loaded).
    pub loads: u64,
    /// Number of backings freed after their last handle was released.
    pub unloads: u64,
    /// Bytes currently held by live backings.
    pub resident_bytes: u64,
    /// Number of live backings.
    pub resident_regions: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    acquires: AtomicU64,
    releases: AtomicU64,
    loads: AtomicU64,
    unloads: AtomicU64,
    resident_bytes: AtomicU64,
}

impl Counters {
    pub(crate) fn record_acquire(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self, bytes: u64) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.resident_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_unload(&self, bytes: u64) {
        self.unloads.fetch_add(1, Ordering::Relaxed);
        self.resident_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, resident_regions: usize) -> BufferStats {
        BufferStats {
            acquires: self.acquires.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            unloads: self.unloads.load(Ordering::Relaxed),
            resident_bytes: self.resident_bytes.load(Ordering::Relaxed),
            resident_regions: resident_regions as u64,
        }
    }
}
