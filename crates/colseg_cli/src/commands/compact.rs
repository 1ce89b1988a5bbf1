//! Compact command implementation.

use colseg_core::OpenMode;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting segment at {}", path.display());
    println!();

    let dir = super::open(path, OpenMode::ReadWrite)?;
    let report = super::loader()?.compact(&dir)?;

    if !report.published {
        println!("Nothing to reclaim");
        return Ok(());
    }
    let saved = report.bytes_before - report.bytes_after;
    println!("  Size before: {} bytes", report.bytes_before);
    println!("  Size after:  {} bytes", report.bytes_after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        saved,
        if report.bytes_before > 0 {
            (saved as f64 / report.bytes_before as f64) * 100.0
        } else {
            0.0
        }
    );
    Ok(())
}
