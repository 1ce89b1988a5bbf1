//! Inverted index payload: surrogate id → document bitmap.
//!
//! ```text
//! | (cardinality + 1) u32 offsets | serialized roaring bitmaps |
//! ```

use super::{check_offsets, read_u32};
use crate::error::{CodecError, CodecResult};
use crate::types::IndexKind;
use roaring::RoaringBitmap;

/// Encodes one bitmap per surrogate id, in id order.
///
/// # Errors
///
/// Returns `InvalidInput` if the serialized bitmaps overflow the offset table.
pub fn encode_inverted(bitmaps: &[RoaringBitmap]) -> CodecResult<Vec<u8>> {
    let mut body = Vec::new();
    let mut offsets = Vec::with_capacity(bitmaps.len() + 1);
    offsets.push(0u32);
    for bitmap in bitmaps {
        bitmap.serialize_into(&mut body)?;
        let end = u32::try_from(body.len())
            .map_err(|_| CodecError::invalid_input("inverted index exceeds 4 GiB"))?;
        offsets.push(end);
    }

    let mut buf = Vec::with_capacity(offsets.len() * 4 + body.len());
    for offset in offsets {
        buf.extend_from_slice(&offset.to_le_bytes());
    }
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Shape of an inverted index payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvertedLayout {
    /// Number of bitmaps.
    pub cardinality: u32,
}

impl InvertedLayout {
    /// Creates a layout for a column of the given cardinality.
    #[must_use]
    pub const fn new(cardinality: u32) -> Self {
        Self { cardinality }
    }

    fn table_len(&self) -> usize {
        (self.cardinality as usize + 1) * 4
    }

    /// Validates a payload: offset table, that every bitmap deserializes to
    /// exactly its byte range, and that every document id is below `num_docs`.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` naming `column` on the first violation.
    pub fn validate(&self, column: &str, payload: &[u8], num_docs: u32) -> CodecResult<()> {
        let corrupt = |message: String| CodecError::corrupt_index(column, IndexKind::Inverted, message);

        let table_len = self.table_len();
        if payload.len() < table_len {
            return Err(corrupt(format!(
                "payload is {} bytes, offset table alone needs {table_len}",
                payload.len()
            )));
        }
        let body_len = (payload.len() - table_len) as u64;
        check_offsets(payload, self.cardinality as usize, body_len).map_err(corrupt)?;

        for id in 0..self.cardinality {
            let bitmap = self
                .doc_ids(payload, id)
                .map_err(|_| corrupt(format!("bitmap for id {id} does not decode")))?;
            if let Some(max) = bitmap.max() {
                if max >= num_docs {
                    return Err(corrupt(format!(
                        "bitmap for id {id} contains document {max} of {num_docs}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Decodes the bitmap of one surrogate id.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the id is out of range or its bytes do not hold
    /// exactly one bitmap.
    pub fn doc_ids(&self, payload: &[u8], id: u32) -> CodecResult<RoaringBitmap> {
        let range = self
            .range(payload, id)
            .ok_or_else(|| CodecError::corrupt(format!("no bitmap for id {id}")))?;
        let bytes = &payload[range];
        let bitmap = RoaringBitmap::deserialize_from(bytes)
            .map_err(|e| CodecError::corrupt(format!("bitmap for id {id}: {e}")))?;
        if bitmap.serialized_size() != bytes.len() {
            return Err(CodecError::corrupt(format!(
                "bitmap for id {id} has trailing bytes"
            )));
        }
        Ok(bitmap)
    }

    fn range(&self, payload: &[u8], id: u32) -> Option<std::ops::Range<usize>> {
        if id >= self.cardinality {
            return None;
        }
        let base = self.table_len();
        let start = base + read_u32(payload, id as usize)? as usize;
        let end = base + read_u32(payload, id as usize + 1)? as usize;
        (start <= end && end <= payload.len()).then_some(start..end)
    }
}

/// Builds one bitmap per surrogate id from `(doc, ids)` pairs.
#[must_use]
pub fn bitmaps_from_ids<I>(cardinality: u32, docs: I) -> Vec<RoaringBitmap>
where
    I: IntoIterator<Item = (u32, Vec<u32>)>,
{
    let mut bitmaps = vec![RoaringBitmap::new(); cardinality as usize];
    for (doc, ids) in docs {
        for id in ids {
            if let Some(bitmap) = bitmaps.get_mut(id as usize) {
                bitmap.insert(doc);
            }
        }
    }
    bitmaps
}
