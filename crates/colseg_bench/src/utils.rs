//! Benchmark utilities.

use colseg_core::{DataType, Value};

/// Deterministic values with `cardinality` distinct entries.
pub fn generate_values(data_type: DataType, count: u32, cardinality: u32) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let v = i.wrapping_mul(2_654_435_761) % cardinality.max(1);
            match data_type {
                DataType::Int => Value::Int(v as i32),
                DataType::Long => Value::Long(i64::from(v) * 1_000),
                DataType::Float => Value::Float(v as f32 / 2.0),
                DataType::Double => Value::Double(f64::from(v) / 2.0),
                DataType::String => Value::String(format!("value-{v:06}")),
            }
        })
        .collect()
}

/// Surrogate ids of `count` documents over `cardinality` entries.
pub fn generate_ids(count: u32, cardinality: u32) -> Vec<u32> {
    (0..count)
        .map(|i| i.wrapping_mul(2_654_435_761) % cardinality.max(1))
        .collect()
}
