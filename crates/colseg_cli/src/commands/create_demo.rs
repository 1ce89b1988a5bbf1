//! Create-demo command implementation.

use colseg_core::{ColumnSpec, DataType, FormatVersion, IndexKind, SegmentCreator, Value};
use std::path::Path;
use tracing::info;

const COUNTRIES: [&str; 8] = ["us", "de", "fr", "jp", "br", "in", "ca", "null"];

/// Builds the demo segment description.
///
/// `userId` is unique per document; `country` repeats from a small set and
/// carries an inverted index; `score` is raw with a null every 97 documents.
pub fn demo_segment(name: &str, docs: u32, version: FormatVersion) -> SegmentCreator {
    let user_ids = (0..docs).map(|i| Value::Long(10_000 + i64::from(i))).collect();
    let countries = (0..docs)
        .map(|i| Value::from(COUNTRIES[(i as usize * 31 + i as usize / 7) % COUNTRIES.len()]))
        .collect();
    let scores = (0..docs)
        .map(|i| {
            if i % 97 == 0 {
                Value::Int(i32::MIN)
            } else {
                Value::Int((i % 1000) as i32)
            }
        })
        .collect();

    SegmentCreator::new(name, version)
        .column(ColumnSpec::single("userId", DataType::Long, user_ids))
        .column(
            ColumnSpec::single("country", DataType::String, countries).with_index(IndexKind::Inverted),
        )
        .column(ColumnSpec::single("score", DataType::Int, scores).raw())
}

/// Runs the create-demo command.
pub fn run(path: &Path, docs: u32, version: FormatVersion) -> Result<(), Box<dyn std::error::Error>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "demo".to_string());
    info!("Writing {} demo documents to {:?}", docs, path);
    let metadata = demo_segment(&name, docs, version).create(path)?;
    println!(
        "Created {} segment {} with {} documents at {}",
        metadata.version,
        metadata.name,
        metadata.total_docs,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use colseg_core::{BufferManager, OpenMode, SegmentDirectory};
    use tempfile::TempDir;

    #[test]
    fn demo_segment_is_readable() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("demo");
        demo_segment("demo", 500, FormatVersion::V2).create(&path).unwrap();

        let dir = SegmentDirectory::open(&path, OpenMode::ReadOnly, BufferManager::default()).unwrap();
        let reader = dir.reader();
        assert_eq!(reader.metadata().total_docs, 500);
        assert_eq!(reader.column("userId").unwrap().value(7), Some(Value::Long(10_007)));
        assert_eq!(reader.column("score").unwrap().value(97), Some(Value::Int(i32::MIN)));
        reader.verify_checksum().unwrap();
    }
}
