//! Fixed-bit packing of surrogate ids.
//!
//! Values are laid out back to back, least significant bit first, so value
//! `i` occupies bits `[i * bits, (i + 1) * bits)` of the packed buffer.

/// Returns the number of bits needed to store ids `0..cardinality`.
///
/// Always at least 1.
#[must_use]
pub fn bits_required(cardinality: u32) -> u8 {
    if cardinality <= 1 {
        return 1;
    }
    (32 - (cardinality - 1).leading_zeros()) as u8
}

/// Returns the byte length of `count` values packed at `bits` each.
#[must_use]
pub fn packed_len(count: u64, bits: u8) -> u64 {
    (count * u64::from(bits)).div_ceil(8)
}

/// Packs values into a byte buffer.
#[derive(Debug)]
pub struct BitPacker {
    buf: Vec<u8>,
    bits: u8,
    acc: u64,
    acc_bits: u32,
}

impl BitPacker {
    /// Creates a packer for values of `bits` width (1..=32).
    #[must_use]
    pub fn new(bits: u8, capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(packed_len(capacity as u64, bits) as usize),
            bits,
            acc: 0,
            acc_bits: 0,
        }
    }

    /// Appends a value. Bits above the configured width are dropped.
    pub fn push(&mut self, value: u32) {
        let mask = if self.bits >= 32 {
            u64::from(u32::MAX)
        } else {
            (1u64 << self.bits) - 1
        };
        self.acc |= (u64::from(value) & mask) << self.acc_bits;
        self.acc_bits += u32::from(self.bits);
        while self.acc_bits >= 8 {
            self.buf.push(self.acc as u8);
            self.acc >>= 8;
            self.acc_bits -= 8;
        }
    }

    /// Returns the packed bytes.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        if self.acc_bits > 0 {
            self.buf.push(self.acc as u8);
        }
        self.buf
    }
}

/// Reads value `index` from a packed buffer.
///
/// Returns `None` if the value extends past the end of `data`.
#[must_use]
pub fn read_packed(data: &[u8], bits: u8, index: u64) -> Option<u32> {
    let bit_offset = index.checked_mul(u64::from(bits))?;
    let first = usize::try_from(bit_offset / 8).ok()?;
    let shift = (bit_offset % 8) as u32;
    let needed = (shift + u32::from(bits)).div_ceil(8) as usize;
    let window = data.get(first..first + needed)?;

    let mut word = 0u64;
    for (i, &byte) in window.iter().enumerate() {
        word |= u64::from(byte) << (8 * i);
    }
    let mask = if bits >= 32 {
        u64::from(u32::MAX)
    } else {
        (1u64 << bits) - 1
    };
    Some(((word >> shift) & mask) as u32)
}
