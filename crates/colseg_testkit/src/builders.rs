//! Index builders with injected behaviour.

use colseg_core::{ColumnIndexContainer, CoreError, CoreResult, DefaultIndexBuilder, IndexBuilder, IndexKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

/// Fails builds of one column (and optionally one kind), delegating the rest.
#[derive(Debug, Clone)]
pub struct FailingIndexBuilder {
    column: String,
    kind: Option<IndexKind>,
}

impl FailingIndexBuilder {
    /// Fails every build of `column`.
    pub fn column(column: &str) -> Self {
        Self {
            column: column.to_string(),
            kind: None,
        }
    }

    /// Fails only builds of `kind` on `column`.
    pub fn index(column: &str, kind: IndexKind) -> Self {
        Self {
            column: column.to_string(),
            kind: Some(kind),
        }
    }
}

impl IndexBuilder for FailingIndexBuilder {
    fn build(&self, source: &ColumnIndexContainer, kind: IndexKind) -> CoreResult<Vec<u8>> {
        if source.name() == self.column && self.kind.map_or(true, |k| k == kind) {
            return Err(CoreError::index_build(source.name(), kind, "injected build failure", false));
        }
        DefaultIndexBuilder.build(source, kind)
    }
}

/// Pauses the first build until the test releases it.
///
/// The test calls [`wait_until_building`](Self::wait_until_building), makes
/// its observations while the pipeline is mid-build, then calls
/// [`release`](Self::release).
#[derive(Debug, Clone)]
pub struct GatedIndexBuilder {
    entered: Arc<Barrier>,
    released: Arc<Barrier>,
    calls: Arc<AtomicUsize>,
}

impl GatedIndexBuilder {
    /// Creates a closed gate.
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Barrier::new(2)),
            released: Arc::new(Barrier::new(2)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Blocks until a build has reached the gate.
    pub fn wait_until_building(&self) {
        self.entered.wait();
    }

    /// Lets the gated build continue.
    pub fn release(&self) {
        self.released.wait();
    }

    /// Number of builds run so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for GatedIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder for GatedIndexBuilder {
    fn build(&self, source: &ColumnIndexContainer, kind: IndexKind) -> CoreResult<Vec<u8>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.wait();
            self.released.wait();
        }
        DefaultIndexBuilder.build(source, kind)
    }
}
