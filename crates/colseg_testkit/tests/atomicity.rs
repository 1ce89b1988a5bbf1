//! Failed or cancelled runs leave the live segment untouched.

use colseg_core::{
    CancellationToken, CoreError, FormatVersion, IndexKind, IndexLoader, IndexingConfig,
    LoaderConfig,
};
use colseg_testkit::prelude::*;
use std::fs;
use std::sync::Arc;

use IndexKind::{Dictionary, Forward, Inverted, NullValueVector};

fn failing_loader(builder: FailingIndexBuilder, target: Option<FormatVersion>) -> IndexLoader {
    IndexLoader::with_builder(
        LoaderConfig::default().default_target_version(target),
        Arc::new(builder),
    )
    .unwrap()
}

#[test]
fn build_failure_reports_column_and_kind() {
    let segment = TempSegment::user_country(FormatVersion::V3, 1_000);
    let dir = segment.open_rw();
    let before = dir.reader().metadata().clone();

    let loader = failing_loader(FailingIndexBuilder::column("userId"), None);
    let err = loader
        .reconcile(&dir, &user_id_inverted(), &CancellationToken::new())
        .unwrap_err();
    match err {
        CoreError::IndexBuild {
            column,
            kind,
            partial_writes,
            ..
        } => {
            assert_eq!(column, "userId");
            assert_eq!(kind, Inverted);
            assert!(!partial_writes);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(dir.reader().metadata(), &before);
    assert_eq!(dir.reader().generation(), "gen-000000");
    assert!(segment.staging_dirs().is_empty());
    assert!(segment.generation_dirs().is_empty());
}

#[test]
fn failure_after_conversion_reports_partial_writes() {
    let segment = TempSegment::user_country(FormatVersion::V2, 500);
    let dir = segment.open_rw();

    let loader = failing_loader(FailingIndexBuilder::index("userId", Inverted), Some(FormatVersion::V3));
    let err = loader
        .reconcile(&dir, &user_id_inverted(), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::IndexBuild { partial_writes: true, .. }
    ));
    assert_eq!(dir.reader().version(), FormatVersion::V2);
    assert!(segment.staging_dirs().is_empty());
    check_user_country(&dir.reader()).unwrap();
}

#[test]
fn layout_rejecting_index_is_build_error() {
    let segment = TempSegment::user_country(FormatVersion::V1, 200);
    let dir = segment.open_rw();
    let config = IndexingConfig::new().column("country", [Dictionary, Forward, Inverted, NullValueVector]);
    let err = loader().reconcile(&dir, &config, &CancellationToken::new()).unwrap_err();
    assert!(matches!(
        err,
        CoreError::IndexBuild { kind: NullValueVector, .. }
    ));
    assert!(segment.staging_dirs().is_empty());
}

#[test]
fn cancellation_discards_staging() {
    let segment = TempSegment::user_country(FormatVersion::V1, 200);
    let dir = segment.open_rw();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let loader = IndexLoader::new(LoaderConfig::default().default_target_version(Some(FormatVersion::V3))).unwrap();
    let err = loader.reconcile(&dir, &user_id_inverted(), &cancel).unwrap_err();
    assert!(matches!(err, CoreError::Cancelled));
    assert_eq!(dir.reader().version(), FormatVersion::V1);
    assert!(segment.staging_dirs().is_empty());
}

#[test]
fn leftovers_of_a_crash_are_cleaned_on_open() {
    let segment = TempSegment::user_country_generations(FormatVersion::V3, 200);
    fs::create_dir(segment.path().join("staging-crashed")).unwrap();
    fs::write(segment.path().join("staging-crashed").join("columns.psf"), b"partial").unwrap();
    fs::create_dir(segment.path().join("gen-000007")).unwrap();

    let dir = segment.open_rw();
    assert!(segment.staging_dirs().is_empty());
    assert_eq!(segment.generation_dirs(), vec!["gen-000001".to_string()]);
    check_user_country(&dir.reader()).unwrap();

    loader().reconcile(&dir, &user_id_inverted(), &CancellationToken::new()).unwrap();
    assert_eq!(dir.reader().generation(), "gen-000002");
}

#[test]
fn corrupt_blob_is_detected() {
    let segment = TempSegment::user_country(FormatVersion::V3, 300);
    let location = segment
        .open_ro()
        .reader()
        .index_map()
        .get("country", Forward)
        .cloned()
        .unwrap();
    corrupt_byte(
        &segment.path().join(&location.file),
        location.offset + colseg_codec::blob::HEADER_SIZE as u64 + 1,
    );

    let dir = segment.open_ro();
    let err = dir.reader().column("country").unwrap_err();
    match err {
        CoreError::CorruptSegment { column, kind, .. } => {
            assert_eq!(column.as_deref(), Some("country"));
            assert_eq!(kind, Some(Forward));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(dir.reader().column("userId").is_ok());
    assert!(dir.reader().verify_checksum().is_err());
}

#[test]
fn second_writer_is_locked_out() {
    let segment = TempSegment::user_country(FormatVersion::V3, 10);
    let _dir = segment.open_rw();
    let err = colseg_core::SegmentDirectory::open(
        segment.path(),
        colseg_core::OpenMode::ReadWrite,
        Default::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::SegmentLocked));
}
