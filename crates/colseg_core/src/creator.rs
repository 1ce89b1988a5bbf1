//! Writing new segments from column values.
//!
//! Segment generation proper is not this crate's job; the creator exists so
//! that tools and tests can produce well-formed segments in any layout.

use crate::directory::{generation_name, CURRENT_FILE};
use crate::error::{CoreError, CoreResult};
use crate::staging::now_millis;
use colseg_buffer::write_file_atomic;
use colseg_codec::index::forward::{encode_multi_value, encode_raw, encode_single_value};
use colseg_codec::index::inverted::{bitmaps_from_ids, encode_inverted};
use colseg_codec::index::null_vector::encode_null_vector;
use colseg_codec::index::Dictionary;
use colseg_codec::{
    codec_for, write_creation_meta, write_metadata, ColumnMetadata, CreationMeta, DataType,
    FormatVersion, IndexKind, SegmentMetadata, Value, METADATA_FILE,
};
use roaring::RoaringBitmap;
use std::collections::BTreeSet;
use std::path::Path;

/// Values of one column, one entry per document.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    /// One value per document.
    Single(Vec<Value>),
    /// Any number of values per document.
    Multi(Vec<Vec<Value>>),
}

impl ColumnValues {
    fn num_docs(&self) -> usize {
        match self {
            Self::Single(values) => values.len(),
            Self::Multi(docs) => docs.len(),
        }
    }
}

/// One column to write.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Value type.
    pub data_type: DataType,
    /// Per-document values.
    pub values: ColumnValues,
    /// Dictionary-encode the values.
    pub dictionary: bool,
    /// Index kinds to write.
    pub indexes: BTreeSet<IndexKind>,
}

impl ColumnSpec {
    /// A dictionary-encoded single-valued column.
    #[must_use]
    pub fn single(name: impl Into<String>, data_type: DataType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            data_type,
            values: ColumnValues::Single(values),
            dictionary: true,
            indexes: [IndexKind::Dictionary, IndexKind::Forward].into(),
        }
    }

    /// A dictionary-encoded multi-valued column.
    #[must_use]
    pub fn multi(name: impl Into<String>, data_type: DataType, values: Vec<Vec<Value>>) -> Self {
        Self {
            name: name.into(),
            data_type,
            values: ColumnValues::Multi(values),
            dictionary: true,
            indexes: [IndexKind::Dictionary, IndexKind::Forward].into(),
        }
    }

    /// Stores values raw, with only a forward index.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.dictionary = false;
        self.indexes = [IndexKind::Forward].into();
        self
    }

    /// Adds an index kind.
    #[must_use]
    pub fn with_index(mut self, kind: IndexKind) -> Self {
        self.indexes.insert(kind);
        self
    }
}

/// Where the creator puts the representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentLayout {
    /// Files directly in the segment root, as segments are delivered.
    #[default]
    Bare,
    /// A first generation directory named by `CURRENT`.
    Generation,
}

/// Builder for new segments.
///
/// ```rust,ignore
/// SegmentCreator::new("events", FormatVersion::V3)
///     .column(ColumnSpec::single("country", DataType::String, countries))
///     .create(&root)?;
/// ```
#[derive(Debug, Clone)]
pub struct SegmentCreator {
    name: String,
    version: FormatVersion,
    creation_time: Option<u64>,
    layout: SegmentLayout,
    columns: Vec<ColumnSpec>,
}

impl SegmentCreator {
    /// Starts a segment in `version`.
    #[must_use]
    pub fn new(name: impl Into<String>, version: FormatVersion) -> Self {
        Self {
            name: name.into(),
            version,
            creation_time: None,
            layout: SegmentLayout::Bare,
            columns: Vec::new(),
        }
    }

    /// Fixes the recorded creation time; defaults to now.
    #[must_use]
    pub fn creation_time(mut self, millis: u64) -> Self {
        self.creation_time = Some(millis);
        self
    }

    /// Chooses the on-disk layout.
    #[must_use]
    pub fn layout(mut self, layout: SegmentLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Writes the segment under `root` and returns its metadata.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `root` already holds a segment, the
    /// columns disagree on document count, or a column cannot be encoded
    /// with the requested indices. Returns `IoFailure` if writing fails.
    pub fn create(&self, root: &Path) -> CoreResult<SegmentMetadata> {
        if root.join(METADATA_FILE).exists() || root.join(CURRENT_FILE).exists() {
            return Err(CoreError::invalid_operation(format!(
                "{} already holds a segment",
                root.display()
            )));
        }

        let num_docs = self.num_docs()?;
        let creation_time = self.creation_time.unwrap_or_else(now_millis);

        let mut metadata = SegmentMetadata {
            name: self.name.clone(),
            total_docs: num_docs,
            version: self.version,
            creation_time,
            columns: Vec::with_capacity(self.columns.len()),
        };
        let mut payloads = Vec::new();
        for spec in &self.columns {
            let (column, column_payloads) = encode_column(spec)?;
            metadata.columns.push(column);
            payloads.push(column_payloads);
        }
        metadata
            .validate()
            .map_err(|e| CoreError::invalid_operation(e.to_string()))?;

        let dir = match self.layout {
            SegmentLayout::Bare => root.to_path_buf(),
            SegmentLayout::Generation => root.join(generation_name(1)),
        };
        let codec = codec_for(self.version);
        let mut writer = codec.create_writer(&dir)?;
        for (column, column_payloads) in metadata.columns.iter().zip(&payloads) {
            for (kind, payload) in column_payloads {
                writer
                    .write_column_index(column, *kind, num_docs, payload)
                    .map_err(|e| match e {
                        colseg_codec::CodecError::Unsupported { message, .. } => {
                            CoreError::invalid_operation(message)
                        }
                        other => other.into(),
                    })?;
            }
        }
        let map = writer.finish()?;
        let data_crc = codec.data_checksum(&dir, &map)?;
        write_creation_meta(&dir, &CreationMeta::new(creation_time, data_crc))?;
        write_metadata(&dir, &metadata)?;

        if self.layout == SegmentLayout::Generation {
            write_file_atomic(&root.join(CURRENT_FILE), generation_name(1).as_bytes())?;
        }

        tracing::debug!(
            segment = %metadata.name,
            version = %metadata.version,
            docs = num_docs,
            columns = metadata.columns.len(),
            "created segment"
        );
        Ok(metadata)
    }

    fn num_docs(&self) -> CoreResult<u32> {
        let mut counts = self.columns.iter().map(|c| (c.name.as_str(), c.values.num_docs()));
        let Some((_, first)) = counts.next() else {
            return Ok(0);
        };
        if let Some((name, n)) = counts.find(|&(_, n)| n != first) {
            return Err(CoreError::invalid_operation(format!(
                "column {name} has {n} documents, expected {first}"
            )));
        }
        u32::try_from(first)
            .map_err(|_| CoreError::invalid_operation(format!("{first} documents exceed the segment limit")))
    }
}

type Payloads = Vec<(IndexKind, Vec<u8>)>;

fn encode_column(spec: &ColumnSpec) -> CoreResult<(ColumnMetadata, Payloads)> {
    let invalid = |e: colseg_codec::CodecError| {
        CoreError::invalid_operation(format!("column {}: {e}", spec.name))
    };
    let placeholder = spec.data_type.null_placeholder();

    if !spec.dictionary {
        let ColumnValues::Single(values) = &spec.values else {
            return Err(CoreError::invalid_operation(format!(
                "column {}: multi-valued columns must be dictionary-encoded",
                spec.name
            )));
        };
        let distinct: BTreeSet<&Value> = values.iter().collect();
        let mut column = ColumnMetadata::raw(
            spec.name.clone(),
            spec.data_type,
            distinct.len() as u32,
            values.len() as u32,
        );
        column.indexes = spec.indexes.clone();

        let mut payloads = Vec::new();
        for &kind in &spec.indexes {
            let payload = match kind {
                IndexKind::Forward => encode_raw(spec.data_type, values).map_err(invalid)?,
                IndexKind::NullValueVector => {
                    let nulls: RoaringBitmap = (0u32..)
                        .zip(values)
                        .filter(|(_, v)| **v == placeholder)
                        .map(|(doc, _)| doc)
                        .collect();
                    encode_null_vector(&nulls).map_err(invalid)?
                }
                IndexKind::Dictionary | IndexKind::Inverted => {
                    return Err(CoreError::invalid_operation(format!(
                        "column {}: raw columns cannot have a {kind} index",
                        spec.name
                    )));
                }
            };
            payloads.push((kind, payload));
        }
        return Ok((column, payloads));
    }

    let docs: Vec<&[Value]> = match &spec.values {
        ColumnValues::Single(values) => values.iter().map(std::slice::from_ref).collect(),
        ColumnValues::Multi(docs) => docs.iter().map(Vec::as_slice).collect(),
    };
    let dictionary = Dictionary::sorted(spec.data_type, docs.iter().flat_map(|d| d.iter().cloned()))
        .map_err(invalid)?;
    let ids: Vec<Vec<u32>> = docs
        .iter()
        .map(|doc| {
            doc.iter()
                .filter_map(|v| dictionary.index_of(v))
                .collect()
        })
        .collect();

    let single_value = matches!(spec.values, ColumnValues::Single(_));
    let total_entries: u64 = ids.iter().map(|d| d.len() as u64).sum();
    let mut column = ColumnMetadata::dictionary_encoded(
        spec.name.clone(),
        spec.data_type,
        single_value,
        dictionary.len() as u32,
        total_entries,
    );
    column.indexes = spec.indexes.clone();
    let bits = column.bits_per_element;

    let mut payloads = Vec::new();
    for &kind in &spec.indexes {
        let payload = match kind {
            IndexKind::Dictionary => dictionary.encode().map_err(invalid)?,
            IndexKind::Forward if single_value => {
                let flat: Vec<u32> = ids.iter().flatten().copied().collect();
                encode_single_value(&flat, bits)
            }
            IndexKind::Forward => encode_multi_value(&ids, bits).map_err(invalid)?,
            IndexKind::Inverted => {
                let bitmaps = bitmaps_from_ids(column.cardinality, (0u32..).zip(ids.iter().cloned()));
                encode_inverted(&bitmaps).map_err(invalid)?
            }
            IndexKind::NullValueVector => {
                let nulls: RoaringBitmap = match dictionary.index_of(&placeholder) {
                    Some(null_id) => (0u32..)
                        .zip(&ids)
                        .filter(|(_, d)| d.contains(&null_id))
                        .map(|(doc, _)| doc)
                        .collect(),
                    None => RoaringBitmap::new(),
                };
                encode_null_vector(&nulls).map_err(invalid)?
            }
        };
        payloads.push((kind, payload));
    }
    Ok((column, payloads))
}
