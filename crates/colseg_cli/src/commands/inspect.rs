//! Inspect command implementation.

use colseg_core::{IndexKind, OpenMode, SegmentReader};
use serde::Serialize;
use std::path::Path;

/// Segment inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Segment directory.
    pub path: String,
    /// Segment name.
    pub name: String,
    /// Layout version.
    pub version: String,
    /// Live generation.
    pub generation: String,
    /// Number of documents.
    pub total_docs: u32,
    /// Creation timestamp (ms since epoch).
    pub creation_time: u64,
    /// Bytes referenced by the index map.
    pub index_bytes: u64,
    /// Per-column details.
    pub columns: Vec<ColumnInfo>,
}

/// Details of one column.
#[derive(Debug, Serialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Value type.
    pub data_type: String,
    /// False for multi-valued columns.
    pub single_value: bool,
    /// Dictionary-encoded.
    pub dictionary: bool,
    /// Distinct values.
    pub cardinality: u32,
    /// Bits per packed id.
    pub bits_per_element: u8,
    /// Present indices and where they are stored.
    pub indexes: Vec<IndexInfo>,
}

/// Location of one index.
#[derive(Debug, Serialize)]
pub struct IndexInfo {
    /// Index kind.
    pub kind: IndexKind,
    /// File holding the blob.
    pub file: String,
    /// Blob offset.
    pub offset: u64,
    /// Blob length including framing.
    pub len: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dir = super::open(path, OpenMode::ReadOnly)?;
    let result = inspect(path, &dir.reader());

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn inspect(path: &Path, reader: &SegmentReader) -> InspectResult {
    let metadata = reader.metadata();
    let index_map = reader.index_map();
    let columns = metadata
        .columns
        .iter()
        .map(|c| ColumnInfo {
            name: c.name.clone(),
            data_type: c.data_type.to_string(),
            single_value: c.single_value,
            dictionary: c.has_dictionary,
            cardinality: c.cardinality,
            bits_per_element: c.bits_per_element,
            indexes: c
                .indexes
                .iter()
                .filter_map(|&kind| {
                    index_map.get(&c.name, kind).map(|loc| IndexInfo {
                        kind,
                        file: loc.file.clone(),
                        offset: loc.offset,
                        len: loc.len,
                    })
                })
                .collect(),
        })
        .collect();

    InspectResult {
        path: path.display().to_string(),
        name: metadata.name.clone(),
        version: metadata.version.to_string(),
        generation: reader.generation(),
        total_docs: metadata.total_docs,
        creation_time: metadata.creation_time,
        index_bytes: index_map.referenced_bytes(),
        columns,
    }
}

fn print_text_output(result: &InspectResult) {
    println!("Segment: {}", result.name);
    println!("  Path:        {}", result.path);
    println!("  Version:     {}", result.version);
    println!("  Generation:  {}", result.generation);
    println!("  Documents:   {}", result.total_docs);
    println!("  Created:     {}", result.creation_time);
    println!("  Index bytes: {}", result.index_bytes);
    println!();

    for column in &result.columns {
        println!(
            "Column {} ({}, {}, {})",
            column.name,
            column.data_type,
            if column.single_value { "single" } else { "multi" },
            if column.dictionary { "dictionary" } else { "raw" },
        );
        println!("  Cardinality: {}", column.cardinality);
        if column.dictionary {
            println!("  Bits:        {}", column.bits_per_element);
        }
        for index in &column.indexes {
            println!(
                "  {:<18} {} @ {} ({} bytes)",
                index.kind.as_str(),
                index.file,
                index.offset,
                index.len
            );
        }
    }
}
