//! Property tests: generated segments read back exactly, in every layout,
//! and survive index builds and conversion unchanged.

use colseg_core::{
    CancellationToken, ColumnSpec, ColumnValues, FormatVersion, IndexKind, IndexingConfig,
    SegmentReader, Value,
};
use colseg_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn expected_values(spec: &ColumnSpec, doc: usize) -> Vec<Value> {
    match &spec.values {
        ColumnValues::Single(values) => vec![values[doc].clone()],
        ColumnValues::Multi(docs) => docs[doc].clone(),
    }
}

fn check_case(case: &SegmentCase, reader: &SegmentReader) -> Result<(), TestCaseError> {
    prop_assert_eq!(reader.metadata().total_docs, case.docs);
    for spec in &case.columns {
        let column = reader
            .column(&spec.name)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        for doc in 0..case.docs {
            prop_assert_eq!(column.values(doc), Some(expected_values(spec, doc as usize)));
        }

        if spec.dictionary {
            let distinct: BTreeSet<Value> = (0..case.docs as usize)
                .flat_map(|d| expected_values(spec, d))
                .collect();
            prop_assert_eq!(column.metadata().cardinality as usize, distinct.len());
        }

        if let Some(value) = (0..case.docs as usize).flat_map(|d| expected_values(spec, d)).next() {
            if let Some(hits) = column
                .doc_ids(&value)
                .map_err(|e| TestCaseError::fail(e.to_string()))?
            {
                let expected: Vec<u32> = (0..case.docs)
                    .filter(|&d| expected_values(spec, d as usize).contains(&value))
                    .collect();
                prop_assert_eq!(hits.iter().collect::<Vec<_>>(), expected);
            }
        }

        if let Some(nulls) = column.null_docs() {
            let placeholder = spec.data_type.null_placeholder();
            let expected: Vec<u32> = (0..case.docs)
                .filter(|&d| expected_values(spec, d as usize).contains(&placeholder))
                .collect();
            prop_assert_eq!(nulls.iter().collect::<Vec<_>>(), expected);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn generated_segments_read_back(case in segment_case_strategy()) {
        let segment = TempSegment::create(&case.creator());
        let dir = segment.open_ro();
        let reader = dir.reader();
        check_case(&case, &reader)?;
        reader.verify_checksum().map_err(|e| TestCaseError::fail(e.to_string()))?;
    }

    #[test]
    fn builds_and_conversion_preserve_data(case in segment_case_strategy()) {
        let segment = TempSegment::create(&case.creator());
        let dir = segment.open_rw();

        // Every dictionary column gets an inverted index, and the segment
        // ends up consolidated.
        let mut config = IndexingConfig::new().target_version(FormatVersion::V3);
        for spec in case.columns.iter().filter(|c| c.dictionary) {
            let mut kinds = spec.indexes.clone();
            kinds.insert(IndexKind::Inverted);
            config = config.column(&spec.name, kinds);
        }
        let report = loader()
            .reconcile(&dir, &config, &CancellationToken::new())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(report.version, FormatVersion::V3);

        let reader = dir.reader();
        for spec in case.columns.iter().filter(|c| c.dictionary) {
            prop_assert!(reader.metadata().column(&spec.name).unwrap().has_index(IndexKind::Inverted));
        }
        check_case(&case, &reader)?;
        reader.verify_checksum().map_err(|e| TestCaseError::fail(e.to_string()))?;
    }
}
