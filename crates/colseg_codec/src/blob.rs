//! Framing shared by every persisted index.
//!
//! ```text
//! | magic "CSIX" (4) | version (1) | kind (1) | reserved (2) | num_docs (4) | payload_len (8) | payload (N) | crc32 (4, v2+) |
//! ```
//!
//! The CRC covers header and payload. The same frame is used for a legacy
//! index file and for a range of the consolidated data file, so the format
//! converter can move payloads between layouts without touching them.

use crate::crc::compute_crc32;
use crate::error::{CodecError, CodecResult};
use crate::types::{FormatVersion, IndexKind};
use std::ops::Range;

/// Magic bytes at the start of every index blob.
pub const BLOB_MAGIC: [u8; 4] = *b"CSIX";

/// Size of the fixed blob header.
pub const HEADER_SIZE: usize = 20;

/// Size of the CRC footer for layouts that carry one.
pub const CRC_SIZE: usize = 4;

/// Decoded blob header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// Layout version the blob was written for.
    pub version: FormatVersion,
    /// Index kind of the payload.
    pub kind: IndexKind,
    /// Document count of the segment at write time.
    pub num_docs: u32,
    /// Payload length in bytes.
    pub payload_len: u64,
}

/// A validated blob: its header and where the payload sits in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobFrame {
    /// The decoded header.
    pub header: IndexHeader,
    /// Byte range of the payload within the decoded slice.
    pub payload: Range<usize>,
}

/// Returns the full blob size for a payload of `payload_len` bytes.
#[must_use]
pub fn blob_len(version: FormatVersion, payload_len: usize) -> usize {
    let footer = if version.has_checksums() { CRC_SIZE } else { 0 };
    HEADER_SIZE + payload_len + footer
}

/// Frames a payload.
#[must_use]
pub fn encode_blob(
    version: FormatVersion,
    kind: IndexKind,
    num_docs: u32,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(blob_len(version, payload.len()));

    buf.extend_from_slice(&BLOB_MAGIC);
    buf.push(version.as_u8());
    buf.push(kind.code());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&num_docs.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(payload);

    if version.has_checksums() {
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
    }

    buf
}

/// Validates a blob read from a segment.
///
/// Checks magic, that the version matches the segment's layout, the index
/// kind, the document count, that the payload length accounts for every byte
/// of `data`, and the CRC where the layout has one.
///
/// # Errors
///
/// Returns `Corrupt` naming `column` and `kind` on any mismatch.
pub fn decode_blob(
    data: &[u8],
    version: FormatVersion,
    kind: IndexKind,
    column: &str,
    num_docs: u32,
) -> CodecResult<BlobFrame> {
    let corrupt = |message: String| CodecError::corrupt_index(column, kind, message);

    if data.len() < HEADER_SIZE {
        return Err(corrupt(format!(
            "blob too short for header: {} bytes",
            data.len()
        )));
    }
    if data[0..4] != BLOB_MAGIC {
        return Err(corrupt("invalid blob magic".to_string()));
    }

    let found_version = data[4];
    if found_version != version.as_u8() {
        return Err(corrupt(format!(
            "blob version {found_version} does not match segment version {version}"
        )));
    }

    let found_kind = IndexKind::from_code(data[5]);
    if found_kind != Some(kind) {
        return Err(corrupt(format!("blob kind code {} is not {kind}", data[5])));
    }

    let blob_docs = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    if blob_docs != num_docs {
        return Err(corrupt(format!(
            "document count {blob_docs} does not match metadata total {num_docs}"
        )));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&data[12..20]);
    let payload_len = u64::from_le_bytes(len_bytes);

    let expected = usize::try_from(payload_len)
        .ok()
        .map(|len| blob_len(version, len))
        .ok_or_else(|| corrupt(format!("payload length {payload_len} overflows")))?;
    if expected != data.len() {
        return Err(corrupt(format!(
            "blob is {} bytes but header declares {expected}",
            data.len()
        )));
    }

    let payload_end = HEADER_SIZE + payload_len as usize;
    if version.has_checksums() {
        let stored = u32::from_le_bytes([
            data[payload_end],
            data[payload_end + 1],
            data[payload_end + 2],
            data[payload_end + 3],
        ]);
        let actual = compute_crc32(&data[..payload_end]);
        if stored != actual {
            return Err(corrupt(format!(
                "checksum mismatch: expected {stored:08x}, got {actual:08x}"
            )));
        }
    }

    Ok(BlobFrame {
        header: IndexHeader {
            version,
            kind,
            num_docs,
            payload_len,
        },
        payload: HEADER_SIZE..payload_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_and_validate() {
        for version in [FormatVersion::V1, FormatVersion::V2, FormatVersion::V3] {
            let blob = encode_blob(version, IndexKind::Forward, 100, b"payload");
            assert_eq!(blob.len(), blob_len(version, 7));

            let frame = decode_blob(&blob, version, IndexKind::Forward, "c", 100).unwrap();
            assert_eq!(&blob[frame.payload.clone()], b"payload");
            assert_eq!(frame.header.payload_len, 7);
        }
    }

    #[test]
    fn wrong_kind_rejected() {
        let blob = encode_blob(FormatVersion::V3, IndexKind::Forward, 10, b"x");
        let err = decode_blob(&blob, FormatVersion::V3, IndexKind::Inverted, "c", 10).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Corrupt { kind: Some(IndexKind::Inverted), .. }
        ));
    }

    #[test]
    fn doc_count_mismatch_rejected() {
        let blob = encode_blob(FormatVersion::V2, IndexKind::Dictionary, 10, b"x");
        assert!(decode_blob(&blob, FormatVersion::V2, IndexKind::Dictionary, "c", 11).is_err());
    }

    #[test]
    fn version_mismatch_rejected() {
        let blob = encode_blob(FormatVersion::V2, IndexKind::Dictionary, 10, b"x");
        assert!(decode_blob(&blob, FormatVersion::V3, IndexKind::Dictionary, "c", 10).is_err());
    }

    #[test]
    fn truncated_blob_rejected() {
        let blob = encode_blob(FormatVersion::V3, IndexKind::Forward, 10, b"payload");
        let truncated = &blob[..blob.len() - 1];
        assert!(decode_blob(truncated, FormatVersion::V3, IndexKind::Forward, "c", 10).is_err());
        assert!(decode_blob(&blob[..5], FormatVersion::V3, IndexKind::Forward, "c", 10).is_err());
    }

    #[test]
    fn flipped_bit_fails_checksum() {
        let mut blob = encode_blob(FormatVersion::V3, IndexKind::Forward, 10, b"payload");
        blob[HEADER_SIZE + 2] ^= 0x01;
        let err = decode_blob(&blob, FormatVersion::V3, IndexKind::Forward, "c", 10).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn v1_has_no_checksum() {
        let mut blob = encode_blob(FormatVersion::V1, IndexKind::Forward, 10, b"payload");
        blob[HEADER_SIZE + 2] ^= 0x01;
        assert!(decode_blob(&blob, FormatVersion::V1, IndexKind::Forward, "c", 10).is_ok());
    }
}
