//! Index removal semantics.

use colseg_core::{CancellationToken, CoreError, FormatVersion, IndexKind, IndexingConfig};
use colseg_testkit::prelude::*;

use IndexKind::{Dictionary, Forward, Inverted, NullValueVector};

#[test]
fn inverted_removed_in_place_on_v3() {
    let segment = TempSegment::user_country(FormatVersion::V3, 400);
    let dir = segment.open_rw();
    let size_before = std::fs::metadata(segment.path().join("columns.psf")).unwrap().len();

    let report = loader().remove_index(&dir, "country", Inverted).unwrap();
    assert_eq!(report.removed, vec![("country".to_string(), Inverted)]);

    let reader = dir.reader();
    assert!(!reader.metadata().column("country").unwrap().has_index(Inverted));
    assert!(reader.index_map().get("country", Inverted).is_none());
    // Removal edits the index map only; the data file keeps its bytes.
    let data = reader.dir().join("columns.psf");
    assert_eq!(std::fs::metadata(data).unwrap().len(), size_before);
    check_user_country(&reader).unwrap();
}

#[test]
fn null_vector_removed_by_config() {
    let segment = TempSegment::user_country(FormatVersion::V3, 100);
    let dir = segment.open_rw();
    let loader = loader();
    let with = IndexingConfig::new().column("userId", [Dictionary, Forward, NullValueVector]);
    loader.reconcile(&dir, &with, &CancellationToken::new()).unwrap();
    assert!(dir.reader().metadata().column("userId").unwrap().has_index(NullValueVector));

    let without = IndexingConfig::new().column("userId", [Dictionary, Forward]);
    let report = loader.reconcile(&dir, &without, &CancellationToken::new()).unwrap();
    assert_eq!(report.removed, vec![("userId".to_string(), NullValueVector)]);
    assert!(dir.reader().column("userId").unwrap().null_docs().is_none());
}

#[test]
fn forward_removal_is_unsupported() {
    let segment = TempSegment::user_country(FormatVersion::V3, 50);
    let dir = segment.open_rw();
    let err = loader().remove_index(&dir, "userId", Forward).unwrap_err();
    assert!(matches!(
        err,
        CoreError::IndexRemovalUnsupported { ref column, kind: Forward, .. } if column == "userId"
    ));
    assert_eq!(dir.reader().generation(), "gen-000000");
}

#[test]
fn dictionary_removal_with_dependents_is_rejected() {
    let segment = TempSegment::user_country(FormatVersion::V3, 50);
    let dir = segment.open_rw();
    let err = loader().remove_index(&dir, "country", Dictionary).unwrap_err();
    assert!(matches!(
        err,
        CoreError::CorruptSegment { kind: Some(Dictionary), .. }
    ));
    let metadata = dir.reader().metadata().clone();
    assert!(metadata.column("country").unwrap().has_index(Dictionary));
    assert!(metadata.column("country").unwrap().has_index(Inverted));
}

#[test]
fn absent_index_removal_is_unsupported() {
    let segment = TempSegment::user_country(FormatVersion::V3, 50);
    let dir = segment.open_rw();
    let err = loader().remove_index(&dir, "userId", Inverted).unwrap_err();
    assert!(matches!(err, CoreError::IndexRemovalUnsupported { kind: Inverted, .. }));
}

#[test]
fn legacy_layouts_refuse_removal() {
    for version in [FormatVersion::V1, FormatVersion::V2] {
        let segment = TempSegment::user_country(version, 50);
        let dir = segment.open_rw();
        let err = loader().remove_index(&dir, "country", Inverted).unwrap_err();
        assert!(
            matches!(err, CoreError::IndexRemovalUnsupported { kind: Inverted, .. }),
            "{version}: {err}"
        );
        assert!(dir.reader().metadata().column("country").unwrap().has_index(Inverted));
        assert!(segment.staging_dirs().is_empty());
    }
}

#[test]
fn legacy_removal_through_conversion() {
    let segment = TempSegment::user_country(FormatVersion::V2, 200);
    let dir = segment.open_rw();
    let config = IndexingConfig::new()
        .column("country", [Dictionary, Forward])
        .target_version(FormatVersion::V3);
    let report = loader().reconcile(&dir, &config, &CancellationToken::new()).unwrap();
    assert_eq!(report.converted_from, Some(FormatVersion::V2));
    assert_eq!(report.removed, vec![("country".to_string(), Inverted)]);
    assert!(!dir.reader().metadata().column("country").unwrap().has_index(Inverted));
    check_user_country(&dir.reader()).unwrap();
}

#[test]
fn compaction_reclaims_removed_bytes() {
    let segment = TempSegment::user_country(FormatVersion::V3, 2_000);
    let dir = segment.open_rw();
    let loader = loader();
    loader.remove_index(&dir, "country", Inverted).unwrap();

    let report = loader.compact(&dir).unwrap();
    assert!(report.published);
    assert!(report.bytes_after < report.bytes_before);
    let reader = dir.reader();
    assert_eq!(
        std::fs::metadata(reader.dir().join("columns.psf")).unwrap().len(),
        report.bytes_after
    );
    check_user_country(&reader).unwrap();
    reader.verify_checksum().unwrap();
}
