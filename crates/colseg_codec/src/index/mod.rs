//! Payload codecs for each index kind.
//!
//! Payloads are the bytes inside a [`blob`](crate::blob) frame. Decoders
//! borrow the payload slice and validate its exact size before handing out
//! values, so a layout can be validated once and then read without copying.

pub mod dictionary;
pub mod forward;
pub mod inverted;
pub mod null_vector;

pub use dictionary::Dictionary;
pub use forward::ForwardLayout;
pub use inverted::InvertedLayout;

/// Reads the `index`-th little-endian `u32` of `data`.
pub(crate) fn read_u32(data: &[u8], index: usize) -> Option<u32> {
    let start = index.checked_mul(4)?;
    let bytes = data.get(start..start + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Validates an offset table of `count + 1` entries at the start of `data`.
///
/// Offsets must start at zero, never decrease, and the last one must equal
/// `body_len`. Returns a message describing the first violation.
pub(crate) fn check_offsets(data: &[u8], count: usize, body_len: u64) -> Result<(), String> {
    let mut prev = 0u32;
    for i in 0..=count {
        let offset = read_u32(data, i).ok_or_else(|| "offset table truncated".to_string())?;
        if i == 0 && offset != 0 {
            return Err(format!("first offset is {offset}, expected 0"));
        }
        if offset < prev {
            return Err(format!("offset {i} decreases ({offset} < {prev})"));
        }
        prev = offset;
    }
    if u64::from(prev) != body_len {
        return Err(format!(
            "offsets cover {prev} bytes but {body_len} bytes follow the table"
        ));
    }
    Ok(())
}

/// Appends an offset table followed by the concatenated items.
pub(crate) fn write_offset_table<'a>(
    buf: &mut Vec<u8>,
    items: impl ExactSizeIterator<Item = &'a [u8]> + Clone,
) -> Result<(), String> {
    let mut offset = 0u32;
    buf.extend_from_slice(&offset.to_le_bytes());
    for item in items.clone() {
        let len = u32::try_from(item.len()).map_err(|_| "item too large".to_string())?;
        offset = offset
            .checked_add(len)
            .ok_or_else(|| "offset table overflows u32".to_string())?;
        buf.extend_from_slice(&offset.to_le_bytes());
    }
    for item in items {
        buf.extend_from_slice(item);
    }
    Ok(())
}
