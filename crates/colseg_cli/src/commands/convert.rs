//! Convert command implementation.

use colseg_core::{FormatVersion, OpenMode};
use std::path::Path;
use tracing::info;

/// Runs the convert command.
pub fn run(path: &Path, target: FormatVersion) -> Result<(), Box<dyn std::error::Error>> {
    info!("Converting {:?} to {}", path, target);
    let dir = super::open(path, OpenMode::ReadWrite)?;
    let report = super::loader()?.convert(&dir, target)?;
    super::print_report(&report);
    Ok(())
}
