//! Core type definitions for segment data.

use crate::error::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// On-disk layout version of a segment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FormatVersion {
    /// Legacy multi-file layout without checksums.
    #[serde(rename = "v1")]
    V1,
    /// Legacy multi-file layout with checksums and null-value vectors.
    #[serde(rename = "v2")]
    V2,
    /// Consolidated single-file layout addressed by an index map.
    #[serde(rename = "v3")]
    V3,
}

impl FormatVersion {
    /// The newest layout this engine understands.
    pub const LATEST: Self = Self::V3;

    /// Returns the numeric version.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }

    /// Returns the textual form (`v1`, `v2`, `v3`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }

    /// Parses a numeric version.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedVersion` for versions newer than [`Self::LATEST`]
    /// and `Corrupt` for zero.
    pub fn from_u8(value: u8) -> CodecResult<Self> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            0 => Err(CodecError::corrupt("format version 0")),
            other => Err(CodecError::UnsupportedVersion {
                found: format!("v{other}"),
            }),
        }
    }

    /// Returns true for the consolidated single-file layout.
    #[must_use]
    pub const fn is_consolidated(self) -> bool {
        matches!(self, Self::V3)
    }

    /// Returns true if index blobs carry a CRC footer.
    #[must_use]
    pub const fn has_checksums(self) -> bool {
        !matches!(self, Self::V1)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatVersion {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let number: u32 = digits
            .parse()
            .map_err(|_| CodecError::corrupt(format!("invalid format version: {s:?}")))?;
        match u8::try_from(number) {
            Ok(n) => Self::from_u8(n),
            Err(_) => Err(CodecError::UnsupportedVersion {
                found: trimmed.to_string(),
            }),
        }
    }
}

/// Kind of per-column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Sorted or unsorted value → surrogate id mapping.
    Dictionary,
    /// Per-document surrogate ids or raw values.
    Forward,
    /// Surrogate id → document ids.
    Inverted,
    /// Bitmap of documents whose value is null.
    NullValueVector,
}

impl IndexKind {
    /// Every index kind, in canonical order.
    pub const ALL: [Self; 4] = [
        Self::Dictionary,
        Self::Forward,
        Self::Inverted,
        Self::NullValueVector,
    ];

    /// Returns the textual name used in metadata and index maps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dictionary => "dictionary",
            Self::Forward => "forward",
            Self::Inverted => "inverted",
            Self::NullValueVector => "null_value_vector",
        }
    }

    /// Returns the byte code stored in blob headers.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Dictionary => 1,
            Self::Forward => 2,
            Self::Inverted => 3,
            Self::NullValueVector => 4,
        }
    }

    /// Decodes a blob header kind code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Dictionary),
            2 => Some(Self::Forward),
            3 => Some(Self::Inverted),
            4 => Some(Self::NullValueVector),
            _ => None,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| CodecError::corrupt(format!("unknown index kind: {s:?}")))
    }
}

/// Logical type of a column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    String,
}

impl DataType {
    /// Returns the encoded width for fixed-width types.
    #[must_use]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Int | Self::Float => Some(4),
            Self::Long | Self::Double => Some(8),
            Self::String => None,
        }
    }

    /// Returns the textual name used in metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "INT",
            Self::Long => "LONG",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::String => "STRING",
        }
    }

    /// Returns the placeholder stored for null values of this type.
    #[must_use]
    pub fn null_placeholder(self) -> Value {
        match self {
            Self::Int => Value::Int(i32::MIN),
            Self::Long => Value::Long(i64::MIN),
            Self::Float => Value::Float(f32::NEG_INFINITY),
            Self::Double => Value::Double(f64::NEG_INFINITY),
            Self::String => Value::String("null".to_string()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "INT" => Ok(Self::Int),
            "LONG" => Ok(Self::Long),
            "FLOAT" => Ok(Self::Float),
            "DOUBLE" => Ok(Self::Double),
            "STRING" => Ok(Self::String),
            other => Err(CodecError::corrupt(format!("unknown data type: {other:?}"))),
        }
    }
}

/// A single column value.
///
/// Values of one type are totally ordered; floats use IEEE total ordering so
/// that dictionaries containing NaN still sort deterministically.
#[derive(Debug, Clone)]
pub enum Value {
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// UTF-8 string.
    String(String),
}

impl Value {
    /// Returns the type of this value.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Int(_) => DataType::Int,
            Self::Long(_) => DataType::Long,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::String(_) => DataType::String,
        }
    }

    /// Appends the fixed-width little-endian encoding.
    ///
    /// Strings are variable width and are not written.
    pub(crate) fn write_fixed(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Int(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Self::Long(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Self::Float(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Self::Double(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Self::String(_) => {}
        }
    }

    /// Decodes a fixed-width value from exactly `width` bytes.
    pub(crate) fn read_fixed(data_type: DataType, bytes: &[u8]) -> Option<Self> {
        match data_type {
            DataType::Int => Some(Self::Int(i32::from_le_bytes(bytes.try_into().ok()?))),
            DataType::Long => Some(Self::Long(i64::from_le_bytes(bytes.try_into().ok()?))),
            DataType::Float => Some(Self::Float(f32::from_le_bytes(bytes.try_into().ok()?))),
            DataType::Double => Some(Self::Double(f64::from_le_bytes(bytes.try_into().ok()?))),
            DataType::String => None,
        }
    }

    const fn type_rank(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Long(_) => 1,
            Self::Float(_) => 2,
            Self::Double(_) => 3,
            Self::String(_) => 4,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Long(a), Self::Long(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Double(a), Self::Double(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_version_parsing() {
        assert_eq!("v3".parse::<FormatVersion>().unwrap(), FormatVersion::V3);
        assert_eq!("1".parse::<FormatVersion>().unwrap(), FormatVersion::V1);
        assert!(matches!(
            "v4".parse::<FormatVersion>(),
            Err(CodecError::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            "v999".parse::<FormatVersion>(),
            Err(CodecError::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            "vx".parse::<FormatVersion>(),
            Err(CodecError::Corrupt { .. })
        ));
    }

    #[test]
    fn index_kind_names_round_trip() {
        for kind in IndexKind::ALL {
            assert_eq!(kind.as_str().parse::<IndexKind>().unwrap(), kind);
            assert_eq!(IndexKind::from_code(kind.code()), Some(kind));
        }
        assert!("bloom".parse::<IndexKind>().is_err());
    }

    #[test]
    fn serde_names_match_text_form() {
        let json = serde_json::to_string(&IndexKind::NullValueVector).unwrap();
        assert_eq!(json, "\"null_value_vector\"");
        let json = serde_json::to_string(&FormatVersion::V2).unwrap();
        assert_eq!(json, "\"v2\"");
    }

    #[test]
    fn float_values_totally_ordered() {
        let mut values = vec![
            Value::Double(2.5),
            Value::Double(f64::NEG_INFINITY),
            Value::Double(-1.0),
        ];
        values.sort();
        assert_eq!(values[0], Value::Double(f64::NEG_INFINITY));
        assert_eq!(values[2], Value::Double(2.5));
    }

    #[test]
    fn fixed_width_round_trip() {
        let value = Value::Long(-42);
        let mut buf = Vec::new();
        value.write_fixed(&mut buf);
        assert_eq!(buf.len(), 8);
        assert_eq!(Value::read_fixed(DataType::Long, &buf), Some(value));
    }
}
