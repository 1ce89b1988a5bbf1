//! CLI command implementations.

pub mod compact;
pub mod convert;
pub mod create_demo;
pub mod inspect;
pub mod reload;
pub mod remove_index;
pub mod verify;

use colseg_core::{BufferManager, IndexLoader, LoaderConfig, LoadReport, OpenMode, SegmentDirectory};
use std::path::Path;

/// Opens a segment directory with a fresh buffer manager.
pub fn open(path: &Path, mode: OpenMode) -> Result<SegmentDirectory, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No segment found at {}", path.display()).into());
    }
    Ok(SegmentDirectory::open(path, mode, BufferManager::default())?)
}

/// Creates a loader with default settings.
pub fn loader() -> Result<IndexLoader, Box<dyn std::error::Error>> {
    Ok(IndexLoader::new(LoaderConfig::default())?)
}

/// Prints a pipeline report.
pub fn print_report(report: &LoadReport) {
    if !report.published {
        println!("Segment {} unchanged ({})", report.segment, report.generation);
        return;
    }
    println!("Published {} as {}", report.segment, report.generation);
    if let Some(from) = report.converted_from {
        println!("  Converted:  {from} -> {}", report.version);
    }
    for (column, kind) in &report.added {
        println!("  Added:      {column}.{kind}");
    }
    for (column, kind) in &report.removed {
        println!("  Removed:    {column}.{kind}");
    }
}
