//! colseg CLI
//!
//! Command-line tools for colseg segment maintenance.
//!
//! # Commands
//!
//! - `inspect` - Display segment metadata and index layout
//! - `verify` - Validate every index and the data checksum
//! - `reload` - Bring a segment's indices in line with a JSON config
//! - `convert` - Convert a legacy segment to the consolidated layout
//! - `remove-index` - Drop one index
//! - `compact` - Reclaim bytes of removed indices
//! - `create-demo` - Write a sample segment

mod commands;

use clap::{Parser, Subcommand};
use colseg_core::{FormatVersion, IndexKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// colseg command-line segment tools.
#[derive(Parser)]
#[command(name = "colseg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display segment metadata and index layout
    Inspect {
        /// Segment directory
        segment: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate every index and the data checksum
    Verify {
        /// Segment directory
        segment: PathBuf,
    },

    /// Bring a segment's indices in line with a JSON indexing config
    Reload {
        /// Segment directory
        segment: PathBuf,

        /// Indexing config file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Convert a legacy segment to the consolidated layout
    Convert {
        /// Segment directory
        segment: PathBuf,

        /// Target layout
        #[arg(short, long, default_value = "v3")]
        target: FormatVersion,
    },

    /// Drop one index
    RemoveIndex {
        /// Segment directory
        segment: PathBuf,

        /// Column name
        column: String,

        /// Index kind (dictionary, forward, inverted, null_value_vector)
        kind: IndexKind,
    },

    /// Reclaim bytes of removed indices
    Compact {
        /// Segment directory
        segment: PathBuf,
    },

    /// Write a sample segment with userId and country columns
    CreateDemo {
        /// Segment directory to create
        segment: PathBuf,

        /// Number of documents
        #[arg(short, long, default_value = "10000")]
        docs: u32,

        /// Layout version (v1, v2, v3)
        #[arg(long = "layout", default_value = "v3")]
        version: FormatVersion,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { segment, format } => commands::inspect::run(&segment, &format)?,
        Commands::Verify { segment } => commands::verify::run(&segment)?,
        Commands::Reload { segment, config } => commands::reload::run(&segment, &config)?,
        Commands::Convert { segment, target } => commands::convert::run(&segment, target)?,
        Commands::RemoveIndex {
            segment,
            column,
            kind,
        } => commands::remove_index::run(&segment, &column, kind)?,
        Commands::Compact { segment } => commands::compact::run(&segment)?,
        Commands::CreateDemo {
            segment,
            docs,
            version,
        } => commands::create_demo::run(&segment, docs, version)?,
    }

    Ok(())
}
