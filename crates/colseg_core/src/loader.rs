//! The index diff and build pipeline.
//!
//! A pipeline run takes a segment from its live index set to the set an
//! [`IndexingConfig`] asks for:
//!
//! 1. Diff the live metadata against the config ([`IndexPlan`])
//! 2. Stage a new representation, converting the layout if needed
//! 3. Build missing indices from the live ones, one column per worker
//! 4. Drop unwanted indices from the staged index map
//! 5. Publish
//!
//! Nothing is visible to readers before step 5. Any failure drops the
//! staging area and leaves the live segment exactly as it was.

use crate::config::{IndexingConfig, LoaderConfig};
use crate::container::ColumnIndexContainer;
use crate::converter::convert_into;
use crate::directory::{SegmentDirectory, SegmentReader};
use crate::error::{CoreError, CoreResult};
use crate::plan::{ColumnPlan, IndexPlan};
use colseg_codec::format::BLOB_ALIGNMENT;
use colseg_codec::index::inverted::{bitmaps_from_ids, encode_inverted};
use colseg_codec::index::null_vector::encode_null_vector;
use colseg_codec::{FormatVersion, IndexKind, DATA_FILE};
use rayon::prelude::*;
use roaring::RoaringBitmap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation of a pipeline run.
///
/// Cancellation is honoured at every step before publish. Once publishing
/// has started the run completes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns `Cancelled` once cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if the token fired.
    pub fn check(&self) -> CoreResult<()> {
        if self.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Builds an index payload for one column from the indices it already has.
pub trait IndexBuilder: Send + Sync {
    /// Returns the payload of `kind` for the column in `source`.
    ///
    /// # Errors
    ///
    /// Returns `IndexBuild` if the index cannot be derived.
    fn build(&self, source: &ColumnIndexContainer, kind: IndexKind) -> CoreResult<Vec<u8>>;
}

/// Builds inverted indices and null-value vectors.
///
/// Dictionaries and forward indices hold the column's data and cannot be
/// derived from anything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIndexBuilder;

impl IndexBuilder for DefaultIndexBuilder {
    fn build(&self, source: &ColumnIndexContainer, kind: IndexKind) -> CoreResult<Vec<u8>> {
        match kind {
            IndexKind::Inverted => build_inverted(source),
            IndexKind::NullValueVector => build_null_vector(source),
            IndexKind::Dictionary | IndexKind::Forward => Err(CoreError::index_build(
                source.name(),
                kind,
                "cannot be derived from other indices; regenerate the segment",
                false,
            )),
        }
    }
}

fn build_inverted(source: &ColumnIndexContainer) -> CoreResult<Vec<u8>> {
    let fail = |message: &str| CoreError::index_build(source.name(), IndexKind::Inverted, message, false);

    let dictionary_encoded = source
        .forward_layout()
        .is_some_and(|l| l.is_dictionary_encoded());
    if !dictionary_encoded || source.dictionary().is_none() {
        return Err(fail("requires a dictionary and a dictionary-encoded forward index"));
    }

    let mut docs = Vec::with_capacity(source.num_docs() as usize);
    for doc in 0..source.num_docs() {
        let ids = source
            .dict_ids(doc)
            .ok_or_else(|| fail(&format!("forward index has no entry for document {doc}")))?;
        docs.push((doc, ids));
    }
    let bitmaps = bitmaps_from_ids(source.metadata().cardinality, docs);
    encode_inverted(&bitmaps).map_err(|e| fail(&e.to_string()))
}

fn build_null_vector(source: &ColumnIndexContainer) -> CoreResult<Vec<u8>> {
    let fail =
        |message: &str| CoreError::index_build(source.name(), IndexKind::NullValueVector, message, false);
    let layout = source
        .forward_layout()
        .ok_or_else(|| fail("requires a forward index"))?;
    let placeholder = source.metadata().data_type.null_placeholder();

    let mut nulls = RoaringBitmap::new();
    if layout.is_dictionary_encoded() {
        let null_id = source
            .dictionary()
            .ok_or_else(|| fail("requires a dictionary"))?
            .index_of(&placeholder);
        if let Some(null_id) = null_id {
            for doc in 0..source.num_docs() {
                let ids = source
                    .dict_ids(doc)
                    .ok_or_else(|| fail(&format!("forward index has no entry for document {doc}")))?;
                if ids.contains(&null_id) {
                    nulls.insert(doc);
                }
            }
        }
    } else {
        for doc in 0..source.num_docs() {
            if source.value(doc).as_ref() == Some(&placeholder) {
                nulls.insert(doc);
            }
        }
    }
    encode_null_vector(&nulls).map_err(|e| fail(&e.to_string()))
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Segment name.
    pub segment: String,
    /// True if a new generation was published.
    pub published: bool,
    /// Live generation after the run.
    pub generation: String,
    /// Layout after the run.
    pub version: FormatVersion,
    /// Layout before the run, if it changed.
    pub converted_from: Option<FormatVersion>,
    /// Indices built.
    pub added: Vec<(String, IndexKind)>,
    /// Indices dropped.
    pub removed: Vec<(String, IndexKind)>,
    /// Index kinds present per column after the run.
    pub present: BTreeMap<String, BTreeSet<IndexKind>>,
}

impl LoadReport {
    fn new(reader: &SegmentReader, plan: Option<&IndexPlan>) -> Self {
        let metadata = reader.metadata();
        Self {
            segment: metadata.name.clone(),
            published: plan.is_some(),
            generation: reader.generation(),
            version: metadata.version,
            converted_from: plan
                .filter(|p| p.needs_conversion())
                .map(|p| p.source_version),
            added: plan
                .map(|p| p.additions().map(|(c, k)| (c.to_string(), k)).collect())
                .unwrap_or_default(),
            removed: plan
                .map(|p| p.removals().map(|(c, k)| (c.to_string(), k)).collect())
                .unwrap_or_default(),
            present: metadata
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.indexes.clone()))
                .collect(),
        }
    }
}

/// Outcome of a compaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    /// Segment name.
    pub segment: String,
    /// True if a new generation was published.
    pub published: bool,
    /// Data file size before compaction.
    pub bytes_before: u64,
    /// Data file size after compaction.
    pub bytes_after: u64,
}

/// Runs the pipeline against segment directories.
pub struct IndexLoader {
    config: LoaderConfig,
    builder: Arc<dyn IndexBuilder>,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for IndexLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexLoader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IndexLoader {
    /// Creates a loader using [`DefaultIndexBuilder`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the worker pool cannot be started.
    pub fn new(config: LoaderConfig) -> CoreResult<Self> {
        Self::with_builder(config, Arc::new(DefaultIndexBuilder))
    }

    /// Creates a loader with a custom index builder.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the worker pool cannot be started.
    pub fn with_builder(config: LoaderConfig, builder: Arc<dyn IndexBuilder>) -> CoreResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.build_threads.max(1))
            .thread_name(|i| format!("colseg-build-{i}"))
            .build()
            .map_err(|e| CoreError::invalid_operation(format!("build pool: {e}")))?;
        Ok(Self {
            config,
            builder,
            pool,
        })
    }

    /// The loader configuration.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Brings a segment to the index set and layout `config` describes.
    ///
    /// # Errors
    ///
    /// Returns the plan's policy errors, `IndexBuild` if an index cannot be
    /// built, `Cancelled` if `cancel` fires before publish, and load, write
    /// or publish errors otherwise. On error the live segment is unchanged.
    pub fn reconcile(
        &self,
        dir: &SegmentDirectory,
        config: &IndexingConfig,
        cancel: &CancellationToken,
    ) -> CoreResult<LoadReport> {
        self.run(dir, cancel, |_| Ok(config.clone()))
    }

    /// Drops one index.
    ///
    /// # Errors
    ///
    /// Returns `IndexRemovalUnsupported` if the index is absent or cannot be
    /// removed in place, and `CorruptSegment` if a remaining index depends
    /// on it.
    pub fn remove_index(
        &self,
        dir: &SegmentDirectory,
        column: &str,
        kind: IndexKind,
    ) -> CoreResult<LoadReport> {
        self.run(dir, &CancellationToken::new(), |base| {
            let meta = base
                .metadata()
                .column(column)
                .ok_or_else(|| CoreError::removal_unsupported(column, kind, "segment has no such column"))?;
            if !meta.has_index(kind) {
                return Err(CoreError::removal_unsupported(column, kind, "index is not present"));
            }
            let mut kinds = meta.indexes.clone();
            kinds.remove(&kind);
            Ok(IndexingConfig::new()
                .column(column, kinds)
                .target_version(base.version()))
        })
    }

    /// Converts a segment to `target` without changing its index set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for conversions other than legacy to `v3`.
    pub fn convert(&self, dir: &SegmentDirectory, target: FormatVersion) -> CoreResult<LoadReport> {
        self.run(dir, &CancellationToken::new(), |_| {
            Ok(IndexingConfig::new().target_version(target))
        })
    }

    fn run<F>(&self, dir: &SegmentDirectory, cancel: &CancellationToken, make_config: F) -> CoreResult<LoadReport>
    where
        F: FnOnce(&SegmentReader) -> CoreResult<IndexingConfig>,
    {
        let build = dir.begin_build()?;
        let base = build.base().clone();
        let config = make_config(&base)?;
        let plan = IndexPlan::diff(base.metadata(), &config, self.config.default_target_version)?;

        if plan.is_noop() {
            tracing::debug!(segment = %base.metadata().name, "index set already matches");
            return Ok(LoadReport::new(&base, None));
        }
        tracing::debug!(
            segment = %base.metadata().name,
            from = %plan.source_version,
            to = %plan.target_version,
            add = plan.additions().count(),
            remove = plan.removals().count(),
            "planned index changes"
        );
        cancel.check()?;

        let mut staging = if plan.needs_conversion() {
            let mut staging = build.stage_empty(plan.target_version)?;
            let report = convert_into(&base, &mut staging, cancel)?;
            tracing::info!(
                segment = %base.metadata().name,
                from = %report.source_version,
                to = %report.target_version,
                indexes = report.indexes,
                "converted segment layout"
            );
            staging
        } else {
            build.stage()?
        };

        let built = self
            .build_indexes(&base, &plan, cancel)
            .map_err(|e| with_partial_writes(e, staging.bytes_written() > 0))?;

        for (column, kind, payload) in &built {
            cancel.check()?;
            if let Err(e) = staging.write_index(column, *kind, payload) {
                let partial = staging.bytes_written() > 0;
                return Err(match e {
                    CoreError::IoFailure(_) => e,
                    other => CoreError::index_build(column, *kind, other.to_string(), partial),
                });
            }
        }

        for (column, kind) in plan.removals() {
            staging.remove_index(column, kind)?;
        }

        cancel.check()?;
        let reader = build.publish(staging)?;
        let report = LoadReport::new(&reader, Some(&plan));
        tracing::info!(
            segment = %report.segment,
            generation = %report.generation,
            added = report.added.len(),
            removed = report.removed.len(),
            "reconciled segment indexes"
        );
        Ok(report)
    }

    fn build_indexes(
        &self,
        base: &SegmentReader,
        plan: &IndexPlan,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<(String, IndexKind, Vec<u8>)>> {
        let columns: Vec<&ColumnPlan> = plan.columns.iter().filter(|c| !c.to_add.is_empty()).collect();
        let results: Vec<CoreResult<Vec<(String, IndexKind, Vec<u8>)>>> = self.pool.install(|| {
            columns
                .par_iter()
                .map(|change| self.build_column(base, change, cancel))
                .collect()
        });

        let mut built = Vec::new();
        for result in results {
            built.extend(result?);
        }
        Ok(built)
    }

    fn build_column(
        &self,
        base: &SegmentReader,
        change: &ColumnPlan,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<(String, IndexKind, Vec<u8>)>> {
        let source = base.column(&change.column)?;
        change
            .to_add
            .iter()
            .map(|&kind| {
                cancel.check()?;
                let payload = self.builder.build(&source, kind)?;
                tracing::debug!(column = %change.column, %kind, bytes = payload.len(), "built index");
                Ok((change.column.clone(), kind, payload))
            })
            .collect()
    }

    /// Rewrites a `v3` segment's data file without unreferenced bytes.
    ///
    /// Legacy segments and segments without dead bytes are left alone.
    ///
    /// # Errors
    ///
    /// Returns load, write or publish errors; the live segment is then
    /// unchanged.
    pub fn compact(&self, dir: &SegmentDirectory) -> CoreResult<CompactionReport> {
        let build = dir.begin_build()?;
        let base = build.base().clone();
        let segment = base.metadata().name.clone();

        if !base.version().is_consolidated() {
            return Ok(CompactionReport {
                segment,
                published: false,
                bytes_before: 0,
                bytes_after: 0,
            });
        }

        let bytes_before = match fs::metadata(base.dir().join(DATA_FILE)) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        let bytes_after = compacted_size(&base);
        if bytes_after >= bytes_before {
            return Ok(CompactionReport {
                segment,
                published: false,
                bytes_before,
                bytes_after: bytes_before,
            });
        }

        let mut staging = build.stage_empty(FormatVersion::V3)?;
        for (column, kind, _) in base.index_map().iter() {
            let blob = base.read_blob(column, kind)?;
            staging.write_index(column, kind, blob.payload())?;
        }
        build.publish(staging)?;

        tracing::info!(
            segment = %segment,
            bytes_before,
            bytes_after,
            "compacted segment data file"
        );
        Ok(CompactionReport {
            segment,
            published: true,
            bytes_before,
            bytes_after,
        })
    }
}

/// Size of a data file holding only the mapped blobs, in map order.
fn compacted_size(reader: &SegmentReader) -> u64 {
    reader
        .index_map()
        .iter()
        .fold(0u64, |size, (_, _, loc)| size.next_multiple_of(BLOB_ALIGNMENT) + loc.len)
}

fn with_partial_writes(error: CoreError, partial: bool) -> CoreError {
    match error {
        CoreError::IndexBuild {
            column,
            kind,
            message,
            ..
        } => CoreError::IndexBuild {
            column,
            kind,
            message,
            partial_writes: partial,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creator::{ColumnSpec, SegmentCreator};
    use crate::directory::OpenMode;
    use colseg_buffer::BufferManager;
    use colseg_codec::{DataType, Value};
    use tempfile::TempDir;

    use IndexKind::{Dictionary, Forward, Inverted, NullValueVector};

    const COUNTRIES: [&str; 4] = ["us", "fr", "de", "us"];

    fn create(root: &std::path::Path, version: FormatVersion) {
        SegmentCreator::new("events", version)
            .creation_time(1)
            .column(ColumnSpec::single(
                "country",
                DataType::String,
                COUNTRIES.iter().map(|&c| Value::from(c)).collect(),
            ))
            .column(
                ColumnSpec::single(
                    "score",
                    DataType::Int,
                    vec![1.into(), i32::MIN.into(), 3.into(), 4.into()],
                )
                .raw(),
            )
            .create(root)
            .unwrap();
    }

    fn open(root: &std::path::Path) -> SegmentDirectory {
        SegmentDirectory::open(root, OpenMode::ReadWrite, BufferManager::default()).unwrap()
    }

    fn loader() -> IndexLoader {
        IndexLoader::new(LoaderConfig::new().build_threads(2)).unwrap()
    }

    fn staging_dirs(root: &std::path::Path) -> usize {
        fs::read_dir(root)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("staging-")
            })
            .count()
    }

    struct FailingBuilder;

    impl IndexBuilder for FailingBuilder {
        fn build(&self, source: &ColumnIndexContainer, kind: IndexKind) -> CoreResult<Vec<u8>> {
            Err(CoreError::index_build(source.name(), kind, "injected failure", false))
        }
    }

    #[test]
    fn adds_inverted_index() {
        let root = TempDir::new().unwrap();
        create(root.path(), FormatVersion::V3);
        let dir = open(root.path());
        let before = dir.reader();

        let config = IndexingConfig::new().column("country", [Dictionary, Forward, Inverted]);
        let report = loader().reconcile(&dir, &config, &CancellationToken::new()).unwrap();
        assert!(report.published);
        assert_eq!(report.added, vec![("country".to_string(), Inverted)]);
        assert_eq!(report.generation, "gen-000001");

        let after = dir.reader();
        let us = after
            .column("country")
            .unwrap()
            .doc_ids(&Value::from("us"))
            .unwrap()
            .unwrap();
        assert_eq!(us.iter().collect::<Vec<_>>(), vec![0, 3]);
        after.verify_checksum().unwrap();

        // The earlier snapshot still sees the old index set.
        assert!(!before.metadata().column("country").unwrap().has_index(Inverted));
        assert_eq!(before.column("country").unwrap().value(1), Some(Value::from("fr")));
    }

    #[test]
    fn matching_config_publishes_nothing() {
        let root = TempDir::new().unwrap();
        create(root.path(), FormatVersion::V3);
        let dir = open(root.path());
        let config = IndexingConfig::from_metadata(dir.reader().metadata());
        let report = loader().reconcile(&dir, &config, &CancellationToken::new()).unwrap();
        assert!(!report.published);
        assert_eq!(report.generation, "gen-000000");
    }

    #[test]
    fn null_vector_on_raw_column() {
        let root = TempDir::new().unwrap();
        create(root.path(), FormatVersion::V2);
        let dir = open(root.path());
        let config = IndexingConfig::new().column("score", [Forward, NullValueVector]);
        loader().reconcile(&dir, &config, &CancellationToken::new()).unwrap();

        let score = dir.reader().column("score").unwrap();
        assert_eq!(score.null_docs().unwrap().iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn converts_legacy_segment_by_default() {
        let root = TempDir::new().unwrap();
        create(root.path(), FormatVersion::V1);
        let dir = open(root.path());
        let loader =
            IndexLoader::new(LoaderConfig::new().default_target_version(Some(FormatVersion::V3))).unwrap();

        let config = IndexingConfig::new().column("country", [Dictionary, Forward, Inverted]);
        let report = loader.reconcile(&dir, &config, &CancellationToken::new()).unwrap();
        assert_eq!(report.version, FormatVersion::V3);
        assert_eq!(report.converted_from, Some(FormatVersion::V1));

        let reader = dir.reader();
        let country = reader.column("country").unwrap();
        for (doc, expected) in COUNTRIES.iter().enumerate() {
            assert_eq!(country.value(doc as u32), Some(Value::from(*expected)));
        }
        assert!(country.doc_ids(&Value::from("de")).unwrap().is_some());
        assert_eq!(reader.column("score").unwrap().value(3), Some(Value::Int(4)));
    }

    #[test]
    fn failed_build_leaves_segment_unchanged() {
        let root = TempDir::new().unwrap();
        create(root.path(), FormatVersion::V3);
        let dir = open(root.path());
        let loader = IndexLoader::with_builder(LoaderConfig::new(), Arc::new(FailingBuilder)).unwrap();

        let config = IndexingConfig::new().column("country", [Dictionary, Forward, Inverted]);
        let err = loader.reconcile(&dir, &config, &CancellationToken::new()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::IndexBuild { ref column, kind: Inverted, partial_writes: false, .. } if column == "country"
        ));
        assert_eq!(dir.reader().generation(), "gen-000000");
        assert!(!dir.reader().metadata().column("country").unwrap().has_index(Inverted));
        assert_eq!(staging_dirs(root.path()), 0);
    }

    #[test]
    fn cancelled_run_publishes_nothing() {
        let root = TempDir::new().unwrap();
        create(root.path(), FormatVersion::V3);
        let dir = open(root.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let config = IndexingConfig::new().column("country", [Dictionary, Forward, Inverted]);
        let err = loader().reconcile(&dir, &config, &cancel).unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
        assert_eq!(dir.reader().generation(), "gen-000000");
        assert_eq!(staging_dirs(root.path()), 0);
    }

    #[test]
    fn dictionary_cannot_be_built() {
        let root = TempDir::new().unwrap();
        create(root.path(), FormatVersion::V3);
        let dir = open(root.path());
        let config = IndexingConfig::new().column("score", [Dictionary, Forward]);
        let err = loader().reconcile(&dir, &config, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, CoreError::IndexBuild { kind: Dictionary, .. }));
    }

    #[test]
    fn remove_then_compact() {
        let root = TempDir::new().unwrap();
        create(root.path(), FormatVersion::V3);
        let dir = open(root.path());
        let loader = loader();

        let config = IndexingConfig::new().column("country", [Dictionary, Forward, Inverted]);
        loader.reconcile(&dir, &config, &CancellationToken::new()).unwrap();

        let report = loader.remove_index(&dir, "country", Inverted).unwrap();
        assert_eq!(report.removed, vec![("country".to_string(), Inverted)]);
        let reader = dir.reader();
        assert!(reader.column("country").unwrap().doc_ids(&Value::from("us")).unwrap().is_none());

        let compaction = loader.compact(&dir).unwrap();
        assert!(compaction.published);
        assert!(compaction.bytes_after < compaction.bytes_before);
        assert_eq!(dir.reader().column("country").unwrap().value(0), Some(Value::from("us")));
        dir.reader().verify_checksum().unwrap();

        assert!(!loader.compact(&dir).unwrap().published);
    }

    #[test]
    fn removing_absent_index_refused() {
        let root = TempDir::new().unwrap();
        create(root.path(), FormatVersion::V3);
        let dir = open(root.path());
        let err = loader().remove_index(&dir, "country", Inverted).unwrap_err();
        assert!(matches!(err, CoreError::IndexRemovalUnsupported { .. }));
        let err = loader().remove_index(&dir, "missing", Inverted).unwrap_err();
        assert!(matches!(err, CoreError::IndexRemovalUnsupported { .. }));
    }

    #[test]
    fn legacy_removal_refused() {
        let root = TempDir::new().unwrap();
        SegmentCreator::new("s", FormatVersion::V2)
            .column(
                ColumnSpec::single("a", DataType::Int, vec![1.into(), 2.into()]).with_index(Inverted),
            )
            .create(root.path())
            .unwrap();
        let dir = open(root.path());
        let err = loader().remove_index(&dir, "a", Inverted).unwrap_err();
        assert!(matches!(err, CoreError::IndexRemovalUnsupported { .. }));
        assert!(dir.reader().metadata().column("a").unwrap().has_index(Inverted));
    }

    #[test]
    fn explicit_conversion() {
        let root = TempDir::new().unwrap();
        create(root.path(), FormatVersion::V2);
        let dir = open(root.path());
        let report = loader().convert(&dir, FormatVersion::V3).unwrap();
        assert!(report.published);
        assert!(report.added.is_empty());
        assert!(root.path().join("gen-000001").join(DATA_FILE).exists());

        let err = loader().convert(&dir, FormatVersion::V2).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }
}
