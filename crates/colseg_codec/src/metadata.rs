//! Segment and column metadata, persisted as `metadata.properties`.

use crate::bits::bits_required;
use crate::error::{CodecError, CodecResult};
use crate::types::{DataType, FormatVersion, IndexKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// Descriptor of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,
    /// Value type.
    pub data_type: DataType,
    /// False for multi-valued columns.
    pub single_value: bool,
    /// True if values are dictionary-encoded.
    pub has_dictionary: bool,
    /// Number of distinct values.
    pub cardinality: u32,
    /// Bits per packed surrogate id; 0 for raw columns.
    pub bits_per_element: u8,
    /// Total number of values across all documents.
    pub total_entries: u64,
    /// Index kinds present for this column.
    pub indexes: BTreeSet<IndexKind>,
}

impl ColumnMetadata {
    /// Describes a dictionary-encoded column with dictionary and forward indices.
    #[must_use]
    pub fn dictionary_encoded(
        name: impl Into<String>,
        data_type: DataType,
        single_value: bool,
        cardinality: u32,
        total_entries: u64,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            single_value,
            has_dictionary: true,
            cardinality,
            bits_per_element: bits_required(cardinality),
            total_entries,
            indexes: [IndexKind::Dictionary, IndexKind::Forward].into(),
        }
    }

    /// Describes a single-valued raw column with only a forward index.
    #[must_use]
    pub fn raw(
        name: impl Into<String>,
        data_type: DataType,
        cardinality: u32,
        total_docs: u32,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            single_value: true,
            has_dictionary: false,
            cardinality,
            bits_per_element: 0,
            total_entries: u64::from(total_docs),
            indexes: [IndexKind::Forward].into(),
        }
    }

    /// Returns true if `kind` is present.
    #[must_use]
    pub fn has_index(&self, kind: IndexKind) -> bool {
        self.indexes.contains(&kind)
    }

    fn validate(&self, total_docs: u32, version: FormatVersion) -> CodecResult<()> {
        validate_column_name(&self.name)?;
        let corrupt = |message: String| CodecError::corrupt_column(&self.name, message);

        if self.has_dictionary {
            if !(1..=32).contains(&self.bits_per_element)
                || self.bits_per_element < bits_required(self.cardinality)
            {
                return Err(corrupt(format!(
                    "{} bits per element cannot address cardinality {}",
                    self.bits_per_element, self.cardinality
                )));
            }
            let needs_dictionary = self.has_index(IndexKind::Forward)
                || self.has_index(IndexKind::Inverted);
            if needs_dictionary && !self.has_index(IndexKind::Dictionary) {
                return Err(corrupt(
                    "forward or inverted index present without its dictionary".to_string(),
                ));
            }
        } else {
            if !self.single_value {
                return Err(corrupt("multi-valued column without dictionary".to_string()));
            }
            if self.has_index(IndexKind::Dictionary) || self.has_index(IndexKind::Inverted) {
                return Err(corrupt(
                    "raw column lists dictionary or inverted index".to_string(),
                ));
            }
        }

        if self.single_value && self.total_entries != u64::from(total_docs) {
            return Err(corrupt(format!(
                "single-valued column has {} entries for {total_docs} documents",
                self.total_entries
            )));
        }

        if version == FormatVersion::V1 && self.has_index(IndexKind::NullValueVector) {
            return Err(corrupt("v1 segments have no null-value vectors".to_string()));
        }

        Ok(())
    }
}

/// Immutable descriptor of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    /// Segment name.
    pub name: String,
    /// Number of documents.
    pub total_docs: u32,
    /// On-disk layout version.
    pub version: FormatVersion,
    /// Creation timestamp in milliseconds since the Unix epoch.
    pub creation_time: u64,
    /// Columns in schema order.
    pub columns: Vec<ColumnMetadata>,
}

impl SegmentMetadata {
    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a column by name for modification.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnMetadata> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Returns every present (column, kind) pair.
    #[must_use]
    pub fn present_indexes(&self) -> BTreeSet<(String, IndexKind)> {
        self.columns
            .iter()
            .flat_map(|c| c.indexes.iter().map(move |&k| (c.name.clone(), k)))
            .collect()
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a bad column name and `Corrupt` for
    /// inconsistent column descriptors.
    pub fn validate(&self) -> CodecResult<()> {
        if self.name.trim().is_empty() || self.name.contains(['\n', '\r']) {
            return Err(CodecError::invalid_input(format!(
                "invalid segment name: {:?}",
                self.name
            )));
        }
        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(CodecError::corrupt_column(&column.name, "duplicate column"));
            }
            column.validate(self.total_docs, self.version)?;
        }
        Ok(())
    }

    /// Encodes the metadata as sorted `key = value` lines.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut props = BTreeMap::new();
        props.insert("segment.name".to_string(), self.name.clone());
        props.insert("segment.total.docs".to_string(), self.total_docs.to_string());
        props.insert(
            "segment.index.version".to_string(),
            self.version.to_string(),
        );
        props.insert(
            "segment.creation.time".to_string(),
            self.creation_time.to_string(),
        );
        props.insert(
            "segment.column.names".to_string(),
            self.columns
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
        );

        for c in &self.columns {
            let key = |suffix: &str| format!("column.{}.{suffix}", c.name);
            props.insert(key("data.type"), c.data_type.to_string());
            props.insert(key("single.value"), c.single_value.to_string());
            props.insert(key("has.dictionary"), c.has_dictionary.to_string());
            props.insert(key("cardinality"), c.cardinality.to_string());
            props.insert(key("bits.per.element"), c.bits_per_element.to_string());
            props.insert(key("total.number.of.entries"), c.total_entries.to_string());
            props.insert(
                key("indexes"),
                c.indexes
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }

        let mut out = String::new();
        for (key, value) in &props {
            let _ = writeln!(out, "{key} = {value}");
        }
        out
    }

    /// Decodes `metadata.properties` text.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedVersion` if the segment was written by a newer
    /// engine and `Corrupt` for missing or malformed entries.
    pub fn decode(text: &str) -> CodecResult<Self> {
        let props = parse_properties(text)?;

        let version: FormatVersion = prop(&props, "segment.index.version", None)?.parse()?;
        let name = prop(&props, "segment.name", None)?.to_string();
        let total_docs = parse_num(
            prop(&props, "segment.total.docs", None)?,
            "segment.total.docs",
        )?;
        let creation_time = parse_num(
            prop(&props, "segment.creation.time", None)?,
            "segment.creation.time",
        )?;

        let names = prop(&props, "segment.column.names", None)?;
        let mut columns = Vec::new();
        for column in names.split(',').filter(|n| !n.is_empty()) {
            let key = |suffix: &str| format!("column.{column}.{suffix}");
            let field = |suffix: &str| prop(&props, &key(suffix), Some(column));

            let indexes = field("indexes")?
                .split(',')
                .filter(|k| !k.is_empty())
                .map(str::parse)
                .collect::<CodecResult<BTreeSet<IndexKind>>>()?;

            columns.push(ColumnMetadata {
                name: column.to_string(),
                data_type: field("data.type")?.parse()?,
                single_value: parse_bool(field("single.value")?, &key("single.value"))?,
                has_dictionary: parse_bool(field("has.dictionary")?, &key("has.dictionary"))?,
                cardinality: parse_num(field("cardinality")?, &key("cardinality"))?,
                bits_per_element: parse_num(field("bits.per.element")?, &key("bits.per.element"))?,
                total_entries: parse_num(
                    field("total.number.of.entries")?,
                    &key("total.number.of.entries"),
                )?,
                indexes,
            });
        }

        let metadata = Self {
            name,
            total_docs,
            version,
            creation_time,
            columns,
        };
        metadata.validate().map_err(|e| match e {
            CodecError::InvalidInput { message } => CodecError::corrupt(message),
            other => other,
        })?;
        Ok(metadata)
    }
}

/// Checks that a column name can be stored in metadata and index maps.
///
/// # Errors
///
/// Returns `InvalidInput` for empty names or names containing `,`, `=` or
/// whitespace.
pub fn validate_column_name(name: &str) -> CodecResult<()> {
    if name.is_empty() {
        return Err(CodecError::invalid_input("empty column name"));
    }
    if name.chars().any(|c| c == ',' || c == '=' || c.is_whitespace()) {
        return Err(CodecError::invalid_input(format!(
            "column name {name:?} contains a reserved character"
        )));
    }
    Ok(())
}

pub(crate) fn parse_properties(text: &str) -> CodecResult<BTreeMap<String, String>> {
    let mut props = BTreeMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            CodecError::corrupt(format!("line {}: expected key = value", lineno + 1))
        })?;
        props.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(props)
}

fn prop<'a>(
    props: &'a BTreeMap<String, String>,
    key: &str,
    column: Option<&str>,
) -> CodecResult<&'a str> {
    props.get(key).map(String::as_str).ok_or_else(|| {
        let message = format!("missing metadata key {key}");
        match column {
            Some(column) => CodecError::corrupt_column(column, message),
            None => CodecError::corrupt(message),
        }
    })
}

fn parse_num<T: std::str::FromStr>(value: &str, key: &str) -> CodecResult<T> {
    value
        .parse()
        .map_err(|_| CodecError::corrupt(format!("invalid number for {key}: {value:?}")))
}

fn parse_bool(value: &str, key: &str) -> CodecResult<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(CodecError::corrupt(format!(
            "invalid boolean for {key}: {other:?}"
        ))),
    }
}
