//! Index diff between a segment and its desired configuration.

use crate::config::IndexingConfig;
use crate::error::{CoreError, CoreResult};
use colseg_codec::{codec_for, FormatVersion, IndexKind, SegmentMetadata};
use std::collections::BTreeSet;

/// Changes to one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    /// Column name.
    pub column: String,
    /// Kinds to build.
    pub to_add: BTreeSet<IndexKind>,
    /// Kinds to drop.
    pub to_remove: BTreeSet<IndexKind>,
}

/// Everything a pipeline run has to do to a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPlan {
    /// Layout of the live segment.
    pub source_version: FormatVersion,
    /// Layout after the run.
    pub target_version: FormatVersion,
    /// Per-column changes, for configured columns with changes only.
    pub columns: Vec<ColumnPlan>,
}

impl IndexPlan {
    /// Diffs the live metadata against a configuration.
    ///
    /// Only columns named in `config` are considered. The plan is checked
    /// against the removal policy before it is returned, so a plan that
    /// comes back `Ok` can be staged.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `IndexBuild` for a column the segment does not have
    /// - `InvalidOperation` for a conversion other than legacy to `v3`
    /// - `IndexRemovalUnsupported` for removing a forward index, or any index
    ///   on a layout that cannot drop it in place
    /// - `CorruptSegment` for removing a dictionary that a remaining forward
    ///   or inverted index depends on
    pub fn diff(
        metadata: &SegmentMetadata,
        config: &IndexingConfig,
        default_target: Option<FormatVersion>,
    ) -> CoreResult<Self> {
        let source_version = metadata.version;
        let target_version = config
            .target_version
            .or(default_target)
            .unwrap_or(source_version);

        if target_version != source_version && !target_version.is_consolidated() {
            return Err(CoreError::invalid_operation(format!(
                "cannot convert {source_version} segment to {target_version}; only conversion to {} is supported",
                FormatVersion::V3
            )));
        }

        let mut columns = Vec::new();
        for (name, desired) in &config.columns {
            let column = metadata.column(name).ok_or_else(|| {
                let kind = desired.iter().next().copied().unwrap_or(IndexKind::Forward);
                CoreError::index_build(name, kind, "segment has no such column", false)
            })?;
            let to_add: BTreeSet<IndexKind> = desired.difference(&column.indexes).copied().collect();
            let to_remove: BTreeSet<IndexKind> =
                column.indexes.difference(desired).copied().collect();
            if !to_add.is_empty() || !to_remove.is_empty() {
                columns.push(ColumnPlan {
                    column: name.clone(),
                    to_add,
                    to_remove,
                });
            }
        }

        let plan = Self {
            source_version,
            target_version,
            columns,
        };
        plan.check_removals(metadata)?;
        Ok(plan)
    }

    fn check_removals(&self, metadata: &SegmentMetadata) -> CoreResult<()> {
        let codec = codec_for(self.target_version);
        for change in &self.columns {
            let Some(column) = metadata.column(&change.column) else {
                continue;
            };
            let remaining: BTreeSet<IndexKind> = column
                .indexes
                .union(&change.to_add)
                .filter(|k| !change.to_remove.contains(k))
                .copied()
                .collect();

            for &kind in &change.to_remove {
                match kind {
                    IndexKind::Forward => {
                        return Err(CoreError::removal_unsupported(
                            &change.column,
                            kind,
                            "forward indices are required by every column",
                        ));
                    }
                    IndexKind::Dictionary
                        if remaining.contains(&IndexKind::Forward)
                            || remaining.contains(&IndexKind::Inverted) =>
                    {
                        return Err(CoreError::corrupt_index(
                            &change.column,
                            kind,
                            "configuration removes the dictionary but keeps indices that depend on it",
                        ));
                    }
                    _ if !codec.supports_in_place_removal(kind) => {
                        return Err(CoreError::removal_unsupported(
                            &change.column,
                            kind,
                            format!("{} layout cannot remove indices in place", self.target_version),
                        ));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// True if the run changes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.columns.is_empty() && !self.needs_conversion()
    }

    /// True if the segment changes layout.
    #[must_use]
    pub fn needs_conversion(&self) -> bool {
        self.source_version != self.target_version
    }

    /// Every (column, kind) to build.
    pub fn additions(&self) -> impl Iterator<Item = (&str, IndexKind)> {
        self.columns
            .iter()
            .flat_map(|c| c.to_add.iter().map(move |&k| (c.column.as_str(), k)))
    }

    /// Every (column, kind) to drop.
    pub fn removals(&self) -> impl Iterator<Item = (&str, IndexKind)> {
        self.columns
            .iter()
            .flat_map(|c| c.to_remove.iter().map(move |&k| (c.column.as_str(), k)))
    }
}
