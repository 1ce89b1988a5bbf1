//! Index map: where each (column, index kind) blob lives.
//!
//! Consolidated segments persist the map as text, one pair of lines per entry:
//!
//! ```text
//! userId.forward.size = 8774
//! userId.forward.startOffset = 1048
//! ```
//!
//! Legacy segments have no map file; their codec synthesizes one with one
//! whole-file entry per index file.

use crate::error::{CodecError, CodecResult};
use crate::metadata::{parse_properties, SegmentMetadata};
use crate::types::IndexKind;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// Location of one index blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexLocation {
    /// File name relative to the segment representation directory.
    pub file: String,
    /// Byte offset of the blob.
    pub offset: u64,
    /// Blob length in bytes.
    pub len: u64,
}

impl IndexLocation {
    /// Creates a location.
    #[must_use]
    pub fn new(file: impl Into<String>, offset: u64, len: u64) -> Self {
        Self {
            file: file.into(),
            offset,
            len,
        }
    }

    /// Returns the end offset, or `None` on overflow.
    #[must_use]
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.len)
    }
}

/// Mapping from (column, index kind) to blob location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMap {
    entries: BTreeMap<(String, IndexKind), IndexLocation>,
}

impl IndexMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a location, replacing any previous one.
    pub fn insert(&mut self, column: &str, kind: IndexKind, location: IndexLocation) {
        self.entries.insert((column.to_string(), kind), location);
    }

    /// Drops an entry, returning its location.
    pub fn remove(&mut self, column: &str, kind: IndexKind) -> Option<IndexLocation> {
        self.entries.remove(&(column.to_string(), kind))
    }

    /// Looks up an entry.
    #[must_use]
    pub fn get(&self, column: &str, kind: IndexKind) -> Option<&IndexLocation> {
        self.entries.get(&(column.to_string(), kind))
    }

    /// Iterates entries in (column, kind) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, IndexKind, &IndexLocation)> {
        self.entries
            .iter()
            .map(|((column, kind), loc)| (column.as_str(), *kind, loc))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes referenced by the map.
    #[must_use]
    pub fn referenced_bytes(&self) -> u64 {
        self.entries.values().map(|loc| loc.len).sum()
    }

    /// Encodes the map as text.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut lines = BTreeMap::new();
        for ((column, kind), loc) in &self.entries {
            lines.insert(format!("{column}.{kind}.size"), loc.len);
            lines.insert(format!("{column}.{kind}.startOffset"), loc.offset);
        }
        let mut out = String::new();
        for (key, value) in lines {
            let _ = writeln!(out, "{key} = {value}");
        }
        out
    }

    /// Decodes index map text; every entry points into `file`.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` for malformed lines or entries missing a size or
    /// offset.
    pub fn decode(text: &str, file: &str) -> CodecResult<Self> {
        let mut offsets: BTreeMap<(String, IndexKind), u64> = BTreeMap::new();
        let mut sizes: BTreeMap<(String, IndexKind), u64> = BTreeMap::new();

        for (key, value) in parse_properties(text)? {
            let mut parts = key.rsplitn(3, '.');
            let (Some(field), Some(kind), Some(column)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(CodecError::corrupt(format!("invalid index map key {key:?}")));
            };
            let kind: IndexKind = kind.parse()?;
            let number: u64 = value.parse().map_err(|_| {
                CodecError::corrupt_index(column, kind, format!("invalid index map value {value:?}"))
            })?;
            let slot = (column.to_string(), kind);
            match field {
                "startOffset" => offsets.insert(slot, number),
                "size" => sizes.insert(slot, number),
                other => {
                    return Err(CodecError::corrupt_index(
                        column,
                        kind,
                        format!("unknown index map field {other:?}"),
                    ))
                }
            };
        }

        let mut map = Self::new();
        for (slot, offset) in offsets {
            let len = sizes.remove(&slot).ok_or_else(|| {
                CodecError::corrupt_index(&slot.0, slot.1, "index map entry has no size")
            })?;
            map.entries.insert(slot, IndexLocation::new(file, offset, len));
        }
        if let Some(((column, kind), _)) = sizes.into_iter().next() {
            return Err(CodecError::corrupt_index(
                &column,
                kind,
                "index map entry has no start offset",
            ));
        }
        Ok(map)
    }

    /// Checks that the entries are exactly the indices the metadata lists.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` naming the first disagreeing (column, kind).
    pub fn check_matches(&self, metadata: &SegmentMetadata) -> CodecResult<()> {
        let present = metadata.present_indexes();
        let mapped: BTreeSet<(String, IndexKind)> = self.entries.keys().cloned().collect();

        if let Some((column, kind)) = present.difference(&mapped).next() {
            return Err(CodecError::corrupt_index(
                column,
                *kind,
                "index listed in metadata is missing from the index map",
            ));
        }
        if let Some((column, kind)) = mapped.difference(&present).next() {
            return Err(CodecError::corrupt_index(
                column,
                *kind,
                "index map entry is not listed in metadata",
            ));
        }
        Ok(())
    }

    /// Checks that every entry in `file` lies within `file_size` bytes and
    /// that no two entries overlap.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` naming the offending (column, kind).
    pub fn check_ranges(&self, file: &str, file_size: u64) -> CodecResult<()> {
        let mut ranges: Vec<(u64, u64, &str, IndexKind)> = Vec::new();
        for ((column, kind), loc) in &self.entries {
            if loc.file != file {
                continue;
            }
            let end = loc
                .end()
                .filter(|&end| end <= file_size)
                .ok_or_else(|| {
                    CodecError::corrupt_index(
                        column,
                        *kind,
                        format!(
                            "range {}+{} exceeds file size {file_size}",
                            loc.offset, loc.len
                        ),
                    )
                })?;
            ranges.push((loc.offset, end, column, *kind));
        }

        ranges.sort_unstable_by_key(|&(start, end, _, _)| (start, end));
        for pair in ranges.windows(2) {
            let (_, prev_end, prev_column, prev_kind) = pair[0];
            let (start, _, column, kind) = pair[1];
            if start < prev_end {
                return Err(CodecError::corrupt_index(
                    column,
                    kind,
                    format!("range overlaps {prev_column}/{prev_kind}"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ColumnMetadata;
    use crate::types::{DataType, FormatVersion};

    fn sample() -> IndexMap {
        let mut map = IndexMap::new();
        map.insert("user.id", IndexKind::Dictionary, IndexLocation::new("columns.psf", 0, 100));
        map.insert("user.id", IndexKind::Forward, IndexLocation::new("columns.psf", 104, 50));
        map.insert("country", IndexKind::Inverted, IndexLocation::new("columns.psf", 160, 40));
        map
    }

    #[test]
    fn text_round_trip_with_dotted_column() {
        let map = sample();
        let text = map.encode();
        assert!(text.contains("user.id.forward.startOffset = 104"));
        assert_eq!(IndexMap::decode(&text, "columns.psf").unwrap(), map);
    }

    #[test]
    fn missing_size_is_corrupt() {
        let err = IndexMap::decode("a.forward.startOffset = 8\n", "columns.psf").unwrap_err();
        assert!(matches!(err, CodecError::Corrupt { kind: Some(IndexKind::Forward), .. }));
        assert!(IndexMap::decode("a.forward.size = 8\n", "columns.psf").is_err());
        assert!(IndexMap::decode("a.bloom.size = 8\n", "columns.psf").is_err());
    }

    #[test]
    fn ranges_checked() {
        let map = sample();
        assert!(map.check_ranges("columns.psf", 200).is_ok());
        assert!(map.check_ranges("columns.psf", 199).is_err());

        let mut overlapping = sample();
        overlapping.insert("country", IndexKind::Forward, IndexLocation::new("columns.psf", 90, 10));
        let err = overlapping.check_ranges("columns.psf", 500).unwrap_err();
        assert!(err.to_string().contains("overlaps"));
    }

    #[test]
    fn entries_must_match_metadata() {
        let mut column = ColumnMetadata::dictionary_encoded("user.id", DataType::Int, true, 4, 10);
        column.indexes.insert(IndexKind::Inverted);
        let metadata = SegmentMetadata {
            name: "s".to_string(),
            total_docs: 10,
            version: FormatVersion::V3,
            creation_time: 0,
            columns: vec![column],
        };

        let mut map = IndexMap::new();
        map.insert("user.id", IndexKind::Dictionary, IndexLocation::new("f", 0, 1));
        map.insert("user.id", IndexKind::Forward, IndexLocation::new("f", 8, 1));
        let err = map.check_matches(&metadata).unwrap_err();
        assert!(matches!(err, CodecError::Corrupt { kind: Some(IndexKind::Inverted), .. }));

        map.insert("user.id", IndexKind::Inverted, IndexLocation::new("f", 16, 1));
        assert!(map.check_matches(&metadata).is_ok());

        map.insert("user.id", IndexKind::NullValueVector, IndexLocation::new("f", 24, 1));
        assert!(map.check_matches(&metadata).is_err());
    }
}
