//! The `creation.meta` record.
//!
//! ```text
//! | magic "CSCM" (4) | version (2) | creation_time (8) | data_crc (4) |
//! ```

use crate::error::{CodecError, CodecResult};

const MAGIC: [u8; 4] = *b"CSCM";
const VERSION: u16 = 1;

/// Encoded size of a creation record.
pub const CREATION_META_SIZE: usize = 18;

/// Creation time and data checksum of one segment representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreationMeta {
    /// Creation timestamp in milliseconds since the Unix epoch.
    pub creation_time: u64,
    /// CRC32 over every index byte of the representation.
    pub data_crc: u32,
}

impl CreationMeta {
    /// Creates a record.
    #[must_use]
    pub const fn new(creation_time: u64, data_crc: u32) -> Self {
        Self {
            creation_time,
            data_crc,
        }
    }

    /// Encodes the record.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(CREATION_META_SIZE);
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&self.creation_time.to_le_bytes());
        buf.extend_from_slice(&self.data_crc.to_le_bytes());
        buf
    }

    /// Decodes a record.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` on a size, magic or version mismatch.
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        if data.len() != CREATION_META_SIZE {
            return Err(CodecError::corrupt(format!(
                "creation.meta is {} bytes, expected {CREATION_META_SIZE}",
                data.len()
            )));
        }
        if data[0..4] != MAGIC {
            return Err(CodecError::corrupt("invalid creation.meta magic"));
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != VERSION {
            return Err(CodecError::corrupt(format!(
                "unknown creation.meta version {version}"
            )));
        }

        let mut time = [0u8; 8];
        time.copy_from_slice(&data[6..14]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&data[14..18]);

        Ok(Self {
            creation_time: u64::from_le_bytes(time),
            data_crc: u32::from_le_bytes(crc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let meta = CreationMeta::new(1_700_000_000_000, 0xDEAD_BEEF);
        let bytes = meta.encode();
        assert_eq!(bytes.len(), CREATION_META_SIZE);
        assert_eq!(CreationMeta::decode(&bytes).unwrap(), meta);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = CreationMeta::new(1, 2).encode();
        bytes[0] = b'X';
        assert!(CreationMeta::decode(&bytes).is_err());
        assert!(CreationMeta::decode(&bytes[..10]).is_err());
    }
}
