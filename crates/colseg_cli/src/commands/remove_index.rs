//! Remove-index command implementation.

use colseg_core::{IndexKind, OpenMode};
use std::path::Path;
use tracing::info;

/// Runs the remove-index command.
pub fn run(path: &Path, column: &str, kind: IndexKind) -> Result<(), Box<dyn std::error::Error>> {
    info!("Removing {}.{} from {:?}", column, kind, path);
    let dir = super::open(path, OpenMode::ReadWrite)?;
    let report = super::loader()?.remove_index(&dir, column, kind)?;
    super::print_report(&report);
    Ok(())
}
