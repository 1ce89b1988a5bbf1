//! Property-based test generators using proptest.
//!
//! Values are drawn from small domains so that dictionaries see repeats and
//! inverted indices have non-trivial bitmaps.

use colseg_core::{ColumnSpec, ColumnValues, DataType, FormatVersion, IndexKind, SegmentCreator, Value};
use proptest::prelude::*;

/// Strategy for layout versions.
pub fn format_version_strategy() -> impl Strategy<Value = FormatVersion> {
    prop_oneof![
        Just(FormatVersion::V1),
        Just(FormatVersion::V2),
        Just(FormatVersion::V3),
    ]
}

/// Strategy for column data types.
pub fn data_type_strategy() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::Int),
        Just(DataType::Long),
        Just(DataType::Float),
        Just(DataType::Double),
        Just(DataType::String),
    ]
}

/// Strategy for values of one type, occasionally the null placeholder.
pub fn value_strategy(data_type: DataType) -> BoxedStrategy<Value> {
    let values = match data_type {
        DataType::Int => (-20i32..20).prop_map(Value::Int).boxed(),
        DataType::Long => (-500i64..500).prop_map(Value::Long).boxed(),
        DataType::Float => (-40i32..40).prop_map(|v| Value::Float(v as f32 / 4.0)).boxed(),
        DataType::Double => (-40i32..40).prop_map(|v| Value::Double(f64::from(v) / 8.0)).boxed(),
        DataType::String => prop::string::string_regex("[a-d]{0,3}")
            .expect("Invalid regex")
            .prop_map(Value::String)
            .boxed(),
    };
    prop_oneof![9 => values, 1 => Just(data_type.null_placeholder())].boxed()
}

/// Shape of a generated column before it is named.
#[derive(Debug, Clone)]
struct ColumnShape {
    data_type: DataType,
    values: ColumnValues,
    raw: bool,
    inverted: bool,
    null_vector: bool,
}

fn column_shape_strategy(docs: usize) -> impl Strategy<Value = ColumnShape> {
    data_type_strategy().prop_flat_map(move |data_type| {
        let single = prop::collection::vec(value_strategy(data_type), docs).prop_map(ColumnValues::Single);
        let multi = prop::collection::vec(prop::collection::vec(value_strategy(data_type), 1..4), docs)
            .prop_map(ColumnValues::Multi);
        (
            prop_oneof![3 => single, 1 => multi],
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(move |(values, raw, inverted, null_vector)| ColumnShape {
                data_type,
                raw: raw && matches!(values, ColumnValues::Single(_)),
                values,
                inverted,
                null_vector,
            })
    })
}

/// A generated segment.
#[derive(Debug, Clone)]
pub struct SegmentCase {
    /// Layout version.
    pub version: FormatVersion,
    /// Number of documents.
    pub docs: u32,
    /// Columns, named `c0`, `c1`, ...
    pub columns: Vec<ColumnSpec>,
}

impl SegmentCase {
    /// A creator for this case.
    pub fn creator(&self) -> SegmentCreator {
        self.columns
            .iter()
            .cloned()
            .fold(SegmentCreator::new("generated", self.version).creation_time(1), SegmentCreator::column)
    }
}

/// Strategy for whole segments with 1 to 3 columns and 1 to 59 documents.
pub fn segment_case_strategy() -> impl Strategy<Value = SegmentCase> {
    (format_version_strategy(), 1usize..60).prop_flat_map(|(version, docs)| {
        prop::collection::vec(column_shape_strategy(docs), 1..4).prop_map(move |shapes| {
            let columns = shapes
                .into_iter()
                .enumerate()
                .map(|(i, shape)| {
                    let name = format!("c{i}");
                    let mut spec = match shape.values {
                        ColumnValues::Single(values) => ColumnSpec::single(name, shape.data_type, values),
                        ColumnValues::Multi(values) => ColumnSpec::multi(name, shape.data_type, values),
                    };
                    if shape.raw {
                        spec = spec.raw();
                    } else if shape.inverted {
                        spec = spec.with_index(IndexKind::Inverted);
                    }
                    if shape.null_vector && version != FormatVersion::V1 {
                        spec = spec.with_index(IndexKind::NullValueVector);
                    }
                    spec
                })
                .collect();
            SegmentCase {
                version,
                docs: docs as u32,
                columns,
            }
        })
    })
}
