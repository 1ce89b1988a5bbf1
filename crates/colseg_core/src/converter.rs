//! Legacy to consolidated layout conversion.
//!
//! Every index payload is copied verbatim; only its frame (version byte and
//! checksum) and its location change. Document order, cardinalities and
//! surrogate ids are therefore preserved exactly.

use crate::directory::SegmentReader;
use crate::error::{CoreError, CoreResult};
use crate::loader::CancellationToken;
use crate::staging::StagingArea;
use colseg_codec::FormatVersion;
use serde::Serialize;

/// Summary of one conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    /// Layout converted from.
    pub source_version: FormatVersion,
    /// Layout converted to.
    pub target_version: FormatVersion,
    /// Number of index blobs copied.
    pub indexes: usize,
    /// Payload bytes copied.
    pub payload_bytes: u64,
}

/// Copies every index of `source` into an empty staging area.
///
/// Each column is loaded and validated before its payloads are copied, so a
/// corrupt source fails the conversion instead of being carried over.
///
/// # Errors
///
/// Returns `InvalidOperation` unless converting a legacy segment into a
/// `v3` staging area, `Cancelled` if `cancel` fires, and load or write
/// errors otherwise.
pub fn convert_into(
    source: &SegmentReader,
    staging: &mut StagingArea,
    cancel: &CancellationToken,
) -> CoreResult<ConversionReport> {
    let source_version = source.version();
    let target_version = staging.version();
    if source_version.is_consolidated() || !target_version.is_consolidated() {
        return Err(CoreError::invalid_operation(format!(
            "cannot convert {source_version} to {target_version}; only legacy to {} is supported",
            FormatVersion::V3
        )));
    }

    let mut report = ConversionReport {
        source_version,
        target_version,
        indexes: 0,
        payload_bytes: 0,
    };

    for column in &source.metadata().columns {
        cancel.check()?;
        let container = source.column(&column.name)?;
        for kind in container.kinds() {
            let payload = container
                .payload(kind)
                .ok_or_else(|| CoreError::corrupt_index(&column.name, kind, "index not loaded"))?;
            staging.write_index(&column.name, kind, payload)?;
            report.indexes += 1;
            report.payload_bytes += payload.len() as u64;
        }
    }

    tracing::debug!(
        segment = %source.metadata().name,
        from = %source_version,
        to = %target_version,
        indexes = report.indexes,
        "copied index payloads"
    );
    Ok(report)
}
