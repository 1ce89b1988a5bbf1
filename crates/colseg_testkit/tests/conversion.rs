//! Legacy to consolidated conversion fidelity.

use colseg_core::{
    CoreError, DataType, FormatVersion, IndexKind, SegmentCreator, Value, ColumnSpec,
};
use colseg_testkit::prelude::*;

fn mixed_segment(version: FormatVersion) -> SegmentCreator {
    let docs = 300u32;
    let mut creator = SegmentCreator::new("mixed", version)
        .column(
            ColumnSpec::multi(
                "tags",
                DataType::String,
                (0..docs)
                    .map(|d| (0..d % 4).map(|t| Value::from(format!("t{}", (d + t) % 9))).collect())
                    .collect(),
            )
            .with_index(IndexKind::Inverted),
        )
        .column(
            ColumnSpec::single(
                "price",
                DataType::Double,
                (0..docs).map(|d| Value::Double(f64::from(d) * 0.25)).collect(),
            )
            .raw(),
        );
    if version != FormatVersion::V1 {
        creator = creator.column(
            ColumnSpec::single(
                "rank",
                DataType::Int,
                (0..docs)
                    .map(|d| if d % 10 == 0 { Value::Int(i32::MIN) } else { Value::Int((d % 50) as i32) })
                    .collect(),
            )
            .with_index(IndexKind::NullValueVector),
        );
    }
    creator
}

#[test]
fn conversion_preserves_every_value() {
    for version in [FormatVersion::V1, FormatVersion::V2] {
        let segment = TempSegment::create(&mixed_segment(version));
        let dir = segment.open_rw();

        let before = dir.reader();
        let before_metadata = before.metadata().clone();
        let before_columns = before.load_all().unwrap();

        let report = loader().convert(&dir, FormatVersion::V3).unwrap();
        assert_eq!(report.converted_from, Some(version));
        assert!(report.added.is_empty() && report.removed.is_empty());

        let after = dir.reader();
        assert_eq!(after.version(), FormatVersion::V3);
        assert_eq!(after.metadata().total_docs, before_metadata.total_docs);
        assert_eq!(
            after.metadata().present_indexes(),
            before_metadata.present_indexes()
        );

        for old in &before_columns {
            let new = after.column(old.name()).unwrap();
            assert_eq!(new.metadata().cardinality, old.metadata().cardinality);
            for kind in old.kinds() {
                assert_eq!(new.payload(kind), old.payload(kind), "{}/{kind}", old.name());
            }
            for doc in 0..before_metadata.total_docs {
                assert_eq!(new.values(doc), old.values(doc));
                assert_eq!(new.dict_ids(doc), old.dict_ids(doc));
            }
        }
        after.verify_checksum().unwrap();
    }
}

#[test]
fn converted_null_vector_survives() {
    let segment = TempSegment::create(&mixed_segment(FormatVersion::V2));
    let dir = segment.open_rw();
    loader().convert(&dir, FormatVersion::V3).unwrap();

    let rank = dir.reader().column("rank").unwrap();
    let expected: Vec<u32> = (0..300).filter(|d| d % 10 == 0).collect();
    assert_eq!(rank.null_docs().unwrap().iter().collect::<Vec<_>>(), expected);
}

#[test]
fn downgrade_is_refused() {
    let segment = TempSegment::user_country(FormatVersion::V3, 20);
    let dir = segment.open_rw();
    for target in [FormatVersion::V1, FormatVersion::V2] {
        let err = loader().convert(&dir, target).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }
    assert_eq!(dir.reader().generation(), "gen-000000");
}

#[test]
fn converting_v3_is_noop() {
    let segment = TempSegment::user_country(FormatVersion::V3, 20);
    let dir = segment.open_rw();
    let report = loader().convert(&dir, FormatVersion::V3).unwrap();
    assert!(!report.published);
}
