//! Dictionary payload: value ↔ surrogate id mapping.
//!
//! ```text
//! | flags (1) | count (4) | values |
//! ```
//!
//! Fixed-width values are stored back to back. String values are stored as
//! an offset table of `count + 1` entries followed by the UTF-8 bytes.
//! Flag bit 0 marks a sorted dictionary, whose values must be strictly
//! increasing so that ids can be found by binary search.

use super::{check_offsets, read_u32, write_offset_table};
use crate::error::{CodecError, CodecResult};
use crate::types::{DataType, IndexKind, Value};

const FLAG_SORTED: u8 = 0x01;
const PREFIX_LEN: usize = 5;

/// A decoded dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    data_type: DataType,
    sorted: bool,
    values: Vec<Value>,
}

impl Dictionary {
    /// Builds a sorted dictionary of the distinct `values`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a value is not of `data_type`.
    pub fn sorted(data_type: DataType, values: impl IntoIterator<Item = Value>) -> CodecResult<Self> {
        let mut values: Vec<Value> = values.into_iter().collect();
        check_types(data_type, &values)?;
        values.sort();
        values.dedup();
        Ok(Self {
            data_type,
            sorted: true,
            values,
        })
    }

    /// Wraps distinct values in the given id order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for mistyped or duplicate values.
    pub fn unsorted(data_type: DataType, values: Vec<Value>) -> CodecResult<Self> {
        check_types(data_type, &values)?;
        let mut seen: Vec<&Value> = values.iter().collect();
        seen.sort();
        if seen.windows(2).any(|w| w[0] == w[1]) {
            return Err(CodecError::invalid_input("duplicate dictionary value"));
        }
        Ok(Self {
            data_type,
            sorted: false,
            values,
        })
    }

    /// Value type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// True if ids follow value order.
    #[must_use]
    pub const fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the dictionary has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value for a surrogate id.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Value> {
        self.values.get(id as usize)
    }

    /// Surrogate id of a value.
    #[must_use]
    pub fn index_of(&self, value: &Value) -> Option<u32> {
        let pos = if self.sorted {
            self.values.binary_search(value).ok()?
        } else {
            self.values.iter().position(|v| v == value)?
        };
        u32::try_from(pos).ok()
    }

    /// Values in id order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Encodes the dictionary payload.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the dictionary is too large to encode.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let count = u32::try_from(self.values.len())
            .map_err(|_| CodecError::invalid_input("dictionary has too many entries"))?;
        let mut buf = Vec::new();
        buf.push(if self.sorted { FLAG_SORTED } else { 0 });
        buf.extend_from_slice(&count.to_le_bytes());

        if self.data_type.fixed_width().is_some() {
            for value in &self.values {
                value.write_fixed(&mut buf);
            }
        } else {
            let strings: Vec<&[u8]> = self
                .values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.as_bytes(),
                    _ => &[],
                })
                .collect();
            write_offset_table(&mut buf, strings.iter().copied())
                .map_err(CodecError::invalid_input)?;
        }
        Ok(buf)
    }

    /// Decodes and validates a dictionary payload.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the entry count differs from `cardinality`, the
    /// size does not match the entries, a string is not UTF-8, or a sorted
    /// dictionary is out of order.
    pub fn decode(
        column: &str,
        data_type: DataType,
        cardinality: u32,
        payload: &[u8],
    ) -> CodecResult<Self> {
        let corrupt = |message: String| CodecError::corrupt_index(column, IndexKind::Dictionary, message);

        if payload.len() < PREFIX_LEN {
            return Err(corrupt(format!("payload is only {} bytes", payload.len())));
        }
        let sorted = payload[0] & FLAG_SORTED != 0;
        let count = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
        if count != cardinality {
            return Err(corrupt(format!(
                "{count} entries but cardinality is {cardinality}"
            )));
        }
        let body = &payload[PREFIX_LEN..];
        let count = count as usize;

        let values = match data_type.fixed_width() {
            Some(width) => {
                let expected = count as u64 * width as u64;
                if body.len() as u64 != expected {
                    return Err(corrupt(format!(
                        "{} value bytes for {count} entries of width {width}",
                        body.len()
                    )));
                }
                body.chunks_exact(width)
                    .map(|chunk| Value::read_fixed(data_type, chunk))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| corrupt("undecodable value".to_string()))?
            }
            None => {
                let table_len = (count + 1) * 4;
                if body.len() < table_len {
                    return Err(corrupt("string offset table truncated".to_string()));
                }
                let strings = &body[table_len..];
                check_offsets(body, count, strings.len() as u64).map_err(corrupt)?;
                let mut values = Vec::with_capacity(count);
                for i in 0..count {
                    let (start, end) = match (read_u32(body, i), read_u32(body, i + 1)) {
                        (Some(s), Some(e)) => (s as usize, e as usize),
                        _ => return Err(corrupt("string offset table truncated".to_string())),
                    };
                    let text = std::str::from_utf8(&strings[start..end])
                        .map_err(|_| corrupt(format!("entry {i} is not UTF-8")))?;
                    values.push(Value::String(text.to_string()));
                }
                values
            }
        };

        if sorted {
            if let Some(i) = values.windows(2).position(|w| w[0] >= w[1]) {
                return Err(corrupt(format!(
                    "sorted dictionary out of order at entry {}",
                    i + 1
                )));
            }
        }

        Ok(Self {
            data_type,
            sorted,
            values,
        })
    }
}

fn check_types(data_type: DataType, values: &[Value]) -> CodecResult<()> {
    match values.iter().find(|v| v.data_type() != data_type) {
        Some(v) => Err(CodecError::invalid_input(format!(
            "value {v} is {} in a {data_type} dictionary",
            v.data_type()
        ))),
        None => Ok(()),
    }
}
