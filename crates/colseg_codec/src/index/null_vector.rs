//! Null-value vector payload: one serialized roaring bitmap of null documents.

use crate::error::{CodecError, CodecResult};
use crate::types::IndexKind;
use roaring::RoaringBitmap;

/// Encodes a null-value vector.
///
/// # Errors
///
/// Returns `Io` if serialization fails.
pub fn encode_null_vector(nulls: &RoaringBitmap) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(nulls.serialized_size());
    nulls.serialize_into(&mut buf)?;
    Ok(buf)
}

/// Decodes and validates a null-value vector.
///
/// # Errors
///
/// Returns `Corrupt` if the payload is not exactly one bitmap or names a
/// document at or beyond `num_docs`.
pub fn decode_null_vector(column: &str, payload: &[u8], num_docs: u32) -> CodecResult<RoaringBitmap> {
    let corrupt =
        |message: String| CodecError::corrupt_index(column, IndexKind::NullValueVector, message);

    let bitmap = RoaringBitmap::deserialize_from(payload)
        .map_err(|e| corrupt(format!("bitmap does not decode: {e}")))?;
    if bitmap.serialized_size() != payload.len() {
        return Err(corrupt("bitmap has trailing bytes".to_string()));
    }
    if let Some(max) = bitmap.max() {
        if max >= num_docs {
            return Err(corrupt(format!(
                "null document {max} is not below total {num_docs}"
            )));
        }
    }
    Ok(bitmap)
}
