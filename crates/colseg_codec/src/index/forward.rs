//! Forward index payloads: per-document values in document order.
//!
//! | layout | payload |
//! |--------|---------|
//! | dictionary, single-value | `num_docs` ids packed at `bits` each |
//! | dictionary, multi-value | `(num_docs + 1)` u32 entry offsets, then `total_entries` packed ids |
//! | raw fixed width | `num_docs` little-endian values |
//! | raw string | `(num_docs + 1)` u32 byte offsets, then UTF-8 bytes |

use super::{check_offsets, read_u32, write_offset_table};
use crate::bits::{packed_len, read_packed, BitPacker};
use crate::error::{CodecError, CodecResult};
use crate::metadata::ColumnMetadata;
use crate::types::{DataType, IndexKind, Value};

/// Shape of a forward index payload, derived from column metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardLayout {
    /// One packed surrogate id per document.
    SingleValue {
        /// Bits per id.
        bits: u8,
        /// Document count.
        num_docs: u32,
    },
    /// Variable number of packed ids per document.
    MultiValue {
        /// Bits per id.
        bits: u8,
        /// Document count.
        num_docs: u32,
        /// Total ids across all documents.
        total_entries: u64,
    },
    /// One fixed-width raw value per document.
    RawFixed {
        /// Value type.
        data_type: DataType,
        /// Document count.
        num_docs: u32,
    },
    /// One raw string per document.
    RawString {
        /// Document count.
        num_docs: u32,
    },
}

impl ForwardLayout {
    /// Derives the layout for a column of a segment with `num_docs` documents.
    #[must_use]
    pub fn for_column(column: &ColumnMetadata, num_docs: u32) -> Self {
        if column.has_dictionary {
            if column.single_value {
                Self::SingleValue {
                    bits: column.bits_per_element,
                    num_docs,
                }
            } else {
                Self::MultiValue {
                    bits: column.bits_per_element,
                    num_docs,
                    total_entries: column.total_entries,
                }
            }
        } else if column.data_type.fixed_width().is_some() {
            Self::RawFixed {
                data_type: column.data_type,
                num_docs,
            }
        } else {
            Self::RawString { num_docs }
        }
    }

    /// Number of documents.
    #[must_use]
    pub const fn num_docs(&self) -> u32 {
        match *self {
            Self::SingleValue { num_docs, .. }
            | Self::MultiValue { num_docs, .. }
            | Self::RawFixed { num_docs, .. }
            | Self::RawString { num_docs } => num_docs,
        }
    }

    /// True for dictionary-encoded layouts.
    #[must_use]
    pub const fn is_dictionary_encoded(&self) -> bool {
        matches!(self, Self::SingleValue { .. } | Self::MultiValue { .. })
    }

    /// Validates a payload against this layout.
    ///
    /// Checks the exact payload size and, for dictionary-encoded layouts,
    /// that every id is below `cardinality`.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` naming `column` on the first violation.
    pub fn validate(&self, column: &str, payload: &[u8], cardinality: u32) -> CodecResult<()> {
        let corrupt = |message: String| CodecError::corrupt_index(column, IndexKind::Forward, message);
        let actual = payload.len() as u64;

        match *self {
            Self::SingleValue { bits, num_docs } => {
                let expected = packed_len(u64::from(num_docs), bits);
                if actual != expected {
                    return Err(corrupt(format!(
                        "payload is {actual} bytes, expected {expected} for {num_docs} documents at {bits} bits"
                    )));
                }
                check_ids(payload, bits, u64::from(num_docs), cardinality).map_err(corrupt)
            }
            Self::MultiValue {
                bits,
                num_docs,
                total_entries,
            } => {
                let table_len = (u64::from(num_docs) + 1) * 4;
                let expected = table_len + packed_len(total_entries, bits);
                if actual != expected {
                    return Err(corrupt(format!(
                        "payload is {actual} bytes, expected {expected} for {total_entries} entries"
                    )));
                }
                let table_len = table_len as usize;
                check_offsets(&payload[..table_len], num_docs as usize, total_entries)
                    .map_err(corrupt)?;
                check_ids(&payload[table_len..], bits, total_entries, cardinality).map_err(corrupt)
            }
            Self::RawFixed {
                data_type,
                num_docs,
            } => {
                let width = data_type.fixed_width().unwrap_or(0) as u64;
                let expected = u64::from(num_docs) * width;
                if actual != expected {
                    return Err(corrupt(format!(
                        "payload is {actual} bytes, expected {expected}"
                    )));
                }
                Ok(())
            }
            Self::RawString { num_docs } => {
                let table_len = (u64::from(num_docs) + 1) * 4;
                if actual < table_len {
                    return Err(corrupt("string offset table truncated".to_string()));
                }
                let body = &payload[table_len as usize..];
                check_offsets(payload, num_docs as usize, body.len() as u64).map_err(corrupt)?;
                std::str::from_utf8(body)
                    .map(|_| ())
                    .map_err(|_| corrupt("string values are not UTF-8".to_string()))
            }
        }
    }

    /// Surrogate id of a single-valued document.
    #[must_use]
    pub fn dict_id(&self, payload: &[u8], doc: u32) -> Option<u32> {
        match *self {
            Self::SingleValue { bits, num_docs } if doc < num_docs => {
                read_packed(payload, bits, u64::from(doc))
            }
            _ => None,
        }
    }

    /// Surrogate ids of a document, for either dictionary layout.
    #[must_use]
    pub fn dict_ids(&self, payload: &[u8], doc: u32) -> Option<Vec<u32>> {
        match *self {
            Self::SingleValue { .. } => self.dict_id(payload, doc).map(|id| vec![id]),
            Self::MultiValue { bits, num_docs, .. } if doc < num_docs => {
                let table_len = (num_docs as usize + 1) * 4;
                let start = read_u32(payload, doc as usize)?;
                let end = read_u32(payload, doc as usize + 1)?;
                let packed = payload.get(table_len..)?;
                (start..end)
                    .map(|i| read_packed(packed, bits, u64::from(i)))
                    .collect()
            }
            _ => None,
        }
    }

    /// Raw value of a document.
    #[must_use]
    pub fn raw_value(&self, payload: &[u8], doc: u32) -> Option<Value> {
        match *self {
            Self::RawFixed {
                data_type,
                num_docs,
            } if doc < num_docs => {
                let width = data_type.fixed_width()?;
                let start = doc as usize * width;
                Value::read_fixed(data_type, payload.get(start..start + width)?)
            }
            Self::RawString { num_docs } if doc < num_docs => {
                let body = payload.get((num_docs as usize + 1) * 4..)?;
                let start = read_u32(payload, doc as usize)? as usize;
                let end = read_u32(payload, doc as usize + 1)? as usize;
                let text = std::str::from_utf8(body.get(start..end)?).ok()?;
                Some(Value::String(text.to_string()))
            }
            _ => None,
        }
    }
}

fn check_ids(packed: &[u8], bits: u8, count: u64, cardinality: u32) -> Result<(), String> {
    for i in 0..count {
        let id = read_packed(packed, bits, i).ok_or_else(|| format!("id {i} truncated"))?;
        if id >= cardinality {
            return Err(format!(
                "id {id} at position {i} is not below cardinality {cardinality}"
            ));
        }
    }
    Ok(())
}

/// Encodes a single-valued dictionary forward index.
#[must_use]
pub fn encode_single_value(ids: &[u32], bits: u8) -> Vec<u8> {
    let mut packer = BitPacker::new(bits, ids.len());
    for &id in ids {
        packer.push(id);
    }
    packer.finish()
}

/// Encodes a multi-valued dictionary forward index.
///
/// # Errors
///
/// Returns `InvalidInput` if the entry count overflows the offset table.
pub fn encode_multi_value(docs: &[Vec<u32>], bits: u8) -> CodecResult<Vec<u8>> {
    let total: usize = docs.iter().map(Vec::len).sum();
    let mut buf = Vec::with_capacity((docs.len() + 1) * 4 + packed_len(total as u64, bits) as usize);

    let mut offset = 0u32;
    buf.extend_from_slice(&offset.to_le_bytes());
    for ids in docs {
        offset = u32::try_from(ids.len())
            .ok()
            .and_then(|n| offset.checked_add(n))
            .ok_or_else(|| CodecError::invalid_input("too many multi-value entries"))?;
        buf.extend_from_slice(&offset.to_le_bytes());
    }

    let mut packer = BitPacker::new(bits, total);
    for &id in docs.iter().flatten() {
        packer.push(id);
    }
    buf.extend_from_slice(&packer.finish());
    Ok(buf)
}

/// Encodes a raw single-valued forward index.
///
/// # Errors
///
/// Returns `InvalidInput` if a value is not of `data_type`.
pub fn encode_raw(data_type: DataType, values: &[Value]) -> CodecResult<Vec<u8>> {
    if let Some(v) = values.iter().find(|v| v.data_type() != data_type) {
        return Err(CodecError::invalid_input(format!(
            "value {v} is not {data_type}"
        )));
    }
    let mut buf = Vec::new();
    match data_type.fixed_width() {
        Some(_) => {
            for value in values {
                value.write_fixed(&mut buf);
            }
        }
        None => {
            let strings: Vec<&[u8]> = values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.as_bytes(),
                    _ => &[],
                })
                .collect();
            write_offset_table(&mut buf, strings.iter().copied())
                .map_err(CodecError::invalid_input)?;
        }
    }
    Ok(buf)
}
