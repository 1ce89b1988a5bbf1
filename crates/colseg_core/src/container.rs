//! Per-column index access.

use crate::error::{CoreError, CoreResult};
use colseg_buffer::BufferManager;
use colseg_codec::format::IndexBlob;
use colseg_codec::index::null_vector::decode_null_vector;
use colseg_codec::index::{Dictionary, ForwardLayout, InvertedLayout};
use colseg_codec::{ColumnMetadata, FormatCodec, IndexKind, IndexMap, SegmentMetadata, Value};
use roaring::RoaringBitmap;
use std::path::Path;

/// The indices of one column, validated and backed by buffer handles.
///
/// Forward and inverted indices are read straight from their buffers. The
/// dictionary and null-value vector are small and decoded up front.
#[derive(Debug)]
pub struct ColumnIndexContainer {
    column: ColumnMetadata,
    num_docs: u32,
    dictionary: Option<(IndexBlob, Dictionary)>,
    forward: Option<(IndexBlob, ForwardLayout)>,
    inverted: Option<(IndexBlob, InvertedLayout)>,
    null_vector: Option<(IndexBlob, RoaringBitmap)>,
}

impl ColumnIndexContainer {
    /// Acquires and validates every index the column lists.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSegment` naming the column and kind if any index
    /// fails validation, or `IoFailure` if its bytes cannot be acquired.
    pub(crate) fn load(
        codec: &dyn FormatCodec,
        buffers: &BufferManager,
        dir: &Path,
        metadata: &SegmentMetadata,
        index_map: &IndexMap,
        column: &ColumnMetadata,
    ) -> CoreResult<Self> {
        let name = column.name.as_str();
        let num_docs = metadata.total_docs;
        let blob = |kind| -> CoreResult<IndexBlob> {
            Ok(codec.read_column_index(buffers, dir, metadata, index_map, name, kind)?)
        };

        let mut container = Self {
            column: column.clone(),
            num_docs,
            dictionary: None,
            forward: None,
            inverted: None,
            null_vector: None,
        };

        for &kind in &column.indexes {
            let index = blob(kind)?;
            match kind {
                IndexKind::Dictionary => {
                    let dict = Dictionary::decode(
                        name,
                        column.data_type,
                        column.cardinality,
                        index.payload(),
                    )?;
                    container.dictionary = Some((index, dict));
                }
                IndexKind::Forward => {
                    let layout = ForwardLayout::for_column(column, num_docs);
                    layout.validate(name, index.payload(), column.cardinality)?;
                    container.forward = Some((index, layout));
                }
                IndexKind::Inverted => {
                    let layout = InvertedLayout::new(column.cardinality);
                    layout.validate(name, index.payload(), num_docs)?;
                    container.inverted = Some((index, layout));
                }
                IndexKind::NullValueVector => {
                    let nulls = decode_null_vector(name, index.payload(), num_docs)?;
                    container.null_vector = Some((index, nulls));
                }
            }
        }

        Ok(container)
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.column.name
    }

    /// Column descriptor.
    #[must_use]
    pub fn metadata(&self) -> &ColumnMetadata {
        &self.column
    }

    /// Number of documents in the segment.
    #[must_use]
    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    /// Index kinds loaded for this column.
    #[must_use]
    pub fn kinds(&self) -> Vec<IndexKind> {
        IndexKind::ALL
            .into_iter()
            .filter(|&k| self.blob(k).is_some())
            .collect()
    }

    /// The acquired blob of one index.
    #[must_use]
    pub fn blob(&self, kind: IndexKind) -> Option<&IndexBlob> {
        match kind {
            IndexKind::Dictionary => self.dictionary.as_ref().map(|(b, _)| b),
            IndexKind::Forward => self.forward.as_ref().map(|(b, _)| b),
            IndexKind::Inverted => self.inverted.as_ref().map(|(b, _)| b),
            IndexKind::NullValueVector => self.null_vector.as_ref().map(|(b, _)| b),
        }
    }

    /// Payload bytes of one index.
    #[must_use]
    pub fn payload(&self, kind: IndexKind) -> Option<&[u8]> {
        self.blob(kind).map(IndexBlob::payload)
    }

    /// The dictionary, if present.
    #[must_use]
    pub fn dictionary(&self) -> Option<&Dictionary> {
        self.dictionary.as_ref().map(|(_, d)| d)
    }

    /// The forward index layout, if present.
    #[must_use]
    pub fn forward_layout(&self) -> Option<ForwardLayout> {
        self.forward.as_ref().map(|(_, l)| *l)
    }

    /// Surrogate ids of a document.
    #[must_use]
    pub fn dict_ids(&self, doc: u32) -> Option<Vec<u32>> {
        let (blob, layout) = self.forward.as_ref()?;
        layout.dict_ids(blob.payload(), doc)
    }

    /// Values of a document, decoded through the dictionary if the column
    /// has one.
    #[must_use]
    pub fn values(&self, doc: u32) -> Option<Vec<Value>> {
        let (blob, layout) = self.forward.as_ref()?;
        if layout.is_dictionary_encoded() {
            let dict = self.dictionary()?;
            layout
                .dict_ids(blob.payload(), doc)?
                .into_iter()
                .map(|id| dict.get(id).cloned())
                .collect()
        } else {
            layout.raw_value(blob.payload(), doc).map(|v| vec![v])
        }
    }

    /// Value of a single-valued document.
    #[must_use]
    pub fn value(&self, doc: u32) -> Option<Value> {
        if !self.column.single_value {
            return None;
        }
        self.values(doc)?.into_iter().next()
    }

    /// Documents containing `value`, answered from the inverted index.
    ///
    /// Returns `Ok(None)` if the column has no inverted index.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSegment` if the bitmap does not decode.
    pub fn doc_ids(&self, value: &Value) -> CoreResult<Option<RoaringBitmap>> {
        let Some((blob, layout)) = self.inverted.as_ref() else {
            return Ok(None);
        };
        let Some(id) = self.dictionary().and_then(|d| d.index_of(value)) else {
            return Ok(Some(RoaringBitmap::new()));
        };
        layout
            .doc_ids(blob.payload(), id)
            .map(Some)
            .map_err(|e| CoreError::from(e.at(self.name(), IndexKind::Inverted)))
    }

    /// Null documents, if the column has a null-value vector.
    #[must_use]
    pub fn null_docs(&self) -> Option<&RoaringBitmap> {
        self.null_vector.as_ref().map(|(_, n)| n)
    }
}
