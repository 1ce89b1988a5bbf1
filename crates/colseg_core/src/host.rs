//! The set of segments served by one process.

use crate::config::{IndexingConfig, LoaderConfig};
use crate::directory::{OpenMode, SegmentDirectory, SegmentReader};
use crate::error::{CoreError, CoreResult};
use crate::loader::{CancellationToken, IndexLoader, LoadReport};
use colseg_buffer::BufferManager;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Hosts segments stored under one root directory.
///
/// Each segment lives in `<root>/<name>`. A segment joins the serving set
/// once its first load succeeds. Later loads rebuild it in place; if a
/// rebuild fails, the segment keeps serving its previous generation.
///
/// # Thread Safety
///
/// All methods take `&self`. Loads of different segments run concurrently;
/// loads of the same segment are serialized by its directory.
pub struct SegmentHost {
    root: PathBuf,
    buffers: BufferManager,
    loader: IndexLoader,
    load_pool: rayon::ThreadPool,
    segments: RwLock<HashMap<String, Arc<SegmentDirectory>>>,
    unavailable: RwLock<BTreeMap<String, String>>,
    /// Serializes loads of one segment name.
    loading: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for SegmentHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentHost")
            .field("root", &self.root)
            .field("serving", &self.serving())
            .finish_non_exhaustive()
    }
}

impl SegmentHost {
    /// Creates a host with no segments loaded.
    ///
    /// # Errors
    ///
    /// Returns `SegmentNotFound` if `root` is not a directory and
    /// `InvalidOperation` if a worker pool cannot be started.
    pub fn new(root: &Path, config: LoaderConfig) -> CoreResult<Self> {
        if !root.is_dir() {
            return Err(CoreError::SegmentNotFound {
                name: root.display().to_string(),
            });
        }
        let load_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.load_threads.max(1))
            .thread_name(|i| format!("colseg-load-{i}"))
            .build()
            .map_err(|e| CoreError::invalid_operation(format!("load pool: {e}")))?;
        Ok(Self {
            root: root.to_path_buf(),
            buffers: BufferManager::new(config.buffer_config()),
            loader: IndexLoader::new(config)?,
            load_pool,
            segments: RwLock::new(HashMap::new()),
            unavailable: RwLock::new(BTreeMap::new()),
            loading: Mutex::new(HashMap::new()),
        })
    }

    /// Root directory holding the segments.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Buffer manager shared by every hosted segment.
    #[must_use]
    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    /// The index loader used for every segment.
    #[must_use]
    pub fn loader(&self) -> &IndexLoader {
        &self.loader
    }

    /// Loads a segment, or rebuilds it if already serving, so that its
    /// indices match `config`.
    ///
    /// Concurrent loads of the same name run one after another; a later
    /// load sees the segment the earlier one put in the serving set.
    ///
    /// # Errors
    ///
    /// Returns the open or pipeline error. A segment that was not serving
    /// is then reported by [`unavailable`](Self::unavailable); one that was
    /// keeps serving unchanged.
    pub fn load_segment(&self, name: &str, config: &IndexingConfig) -> CoreResult<LoadReport> {
        let name_lock = self.name_lock(name);
        let _loading = name_lock.lock();

        let existing = self.segments.read().get(name).cloned();
        let serving = existing.is_some();

        let result = match existing {
            Some(dir) => self.reconcile(&dir, config).map(|report| (dir, report)),
            None => self.open(name).and_then(|dir| {
                let report = self.reconcile(&dir, config)?;
                Ok((dir, report))
            }),
        };

        match result {
            Ok((dir, report)) => {
                self.segments.write().insert(name.to_string(), dir);
                self.unavailable.write().remove(name);
                tracing::info!(
                    segment = %name,
                    generation = %report.generation,
                    published = report.published,
                    "segment serving"
                );
                Ok(report)
            }
            Err(e) if serving => {
                tracing::warn!(segment = %name, error = %e, "rebuild failed; previous generation keeps serving");
                Err(e)
            }
            Err(e) => {
                tracing::warn!(segment = %name, error = %e, "segment unavailable");
                self.unavailable.write().insert(name.to_string(), e.to_string());
                Err(e)
            }
        }
    }

    /// Loads several segments in parallel on the load pool.
    ///
    /// Results are returned in input order.
    pub fn load_segments(
        &self,
        batch: &[(String, IndexingConfig)],
    ) -> Vec<(String, CoreResult<LoadReport>)> {
        self.load_pool.install(|| {
            batch
                .par_iter()
                .map(|(name, config)| (name.clone(), self.load_segment(name, config)))
                .collect()
        })
    }

    /// Stops serving a segment, optionally deleting its files.
    ///
    /// Readers taken before removal stay valid until dropped. Returns
    /// whether the segment was serving.
    ///
    /// # Errors
    ///
    /// Returns `IoFailure` if the files cannot be deleted.
    pub fn remove_segment(&self, name: &str, delete_files: bool) -> CoreResult<bool> {
        let name_lock = self.name_lock(name);
        let _loading = name_lock.lock();

        let removed = self.segments.write().remove(name);
        self.unavailable.write().remove(name);
        let was_serving = removed.is_some();
        // Release the directory lock before deleting.
        drop(removed);

        if delete_files {
            match fs::remove_dir_all(self.root.join(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!(segment = %name, delete_files, was_serving, "segment removed");
        Ok(was_serving)
    }

    /// A snapshot of a serving segment.
    ///
    /// # Errors
    ///
    /// Returns `SegmentNotFound` if the segment is not serving.
    pub fn reader(&self, name: &str) -> CoreResult<SegmentReader> {
        self.segments
            .read()
            .get(name)
            .map(|dir| dir.reader())
            .ok_or_else(|| CoreError::SegmentNotFound {
                name: name.to_string(),
            })
    }

    /// Names of serving segments, sorted.
    #[must_use]
    pub fn serving(&self) -> Vec<String> {
        let mut names: Vec<String> = self.segments.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Segments whose first load failed, with the error.
    #[must_use]
    pub fn unavailable(&self) -> BTreeMap<String, String> {
        self.unavailable.read().clone()
    }

    fn name_lock(&self, name: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.loading.lock().entry(name.to_string()).or_default())
    }

    fn open(&self, name: &str) -> CoreResult<Arc<SegmentDirectory>> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(CoreError::invalid_operation(format!("invalid segment name {name:?}")));
        }
        let dir = SegmentDirectory::open(&self.root.join(name), OpenMode::ReadWrite, self.buffers.clone())?;
        Ok(Arc::new(dir))
    }

    fn reconcile(&self, dir: &SegmentDirectory, config: &IndexingConfig) -> CoreResult<LoadReport> {
        self.loader.reconcile(dir, config, &CancellationToken::new())
    }
}
