//! Verify command implementation.

use colseg_core::OpenMode;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Columns checked.
    pub columns_checked: usize,
    /// Indices validated.
    pub indexes_checked: usize,
    /// Errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying segment at {}", path.display());
    println!();

    let dir = super::open(path, OpenMode::ReadOnly)?;
    let reader = dir.reader();
    let mut result = VerifyResult::default();

    for column in &reader.metadata().columns {
        result.columns_checked += 1;
        match reader.column(&column.name) {
            Ok(container) => result.indexes_checked += container.kinds().len(),
            Err(e) => result.errors.push(format!("column {}: {e}", column.name)),
        }
    }

    if let Err(e) = reader.verify_checksum() {
        result.errors.push(e.to_string());
    }

    println!("  Columns checked: {}", result.columns_checked);
    println!("  Indexes checked: {}", result.indexes_checked);
    for error in &result.errors {
        println!("  Error: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Segment verification passed");
        Ok(())
    } else {
        println!("✗ Segment verification failed");
        Err("Verification failed".into())
    }
}
