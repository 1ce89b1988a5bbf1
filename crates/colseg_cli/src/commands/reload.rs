//! Reload command implementation.

use colseg_core::{CancellationToken, IndexingConfig, OpenMode};
use std::fs;
use std::path::Path;
use tracing::info;

/// Runs the reload command.
pub fn run(path: &Path, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(config_path)
        .map_err(|e| format!("cannot read {}: {e}", config_path.display()))?;
    let config: IndexingConfig = serde_json::from_str(&text)?;
    info!("Reconciling {:?} with {} configured columns", path, config.columns.len());

    let dir = super::open(path, OpenMode::ReadWrite)?;
    let report = super::loader()?.reconcile(&dir, &config, &CancellationToken::new())?;
    super::print_report(&report);
    Ok(())
}
