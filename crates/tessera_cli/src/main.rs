//! Tessera CLI
//!
//! Command-line tools for Tessera databases and trace files.
//!
//! # Commands
//!
//! - `pragma` - Show or change database pragmas
//! - `checkpoint` - Fold the write-ahead log back into the database
//! - `timeline` - Load a trace file and query its intervals

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Tessera command-line tools.
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show database settings, or read or write a single pragma
    Pragma {
        /// Pragma name, e.g. `journal_mode` or `main.locking_mode`
        key: Option<String>,

        /// New value; the pragma is read back and compared after writing
        value: Option<String>,
    },

    /// Fold the write-ahead log back into the database
    Checkpoint {
        /// Also truncate the log file to zero bytes
        #[arg(short, long)]
        truncate: bool,
    },

    /// Load a trace file and query its intervals
    Timeline {
        /// Trace file to load
        trace: PathBuf,

        /// Time to run the searches at
        #[arg(short, long)]
        at: Option<i64>,

        /// Selection group to look for around `--at`
        #[arg(short, long)]
        selection: Option<i32>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Pragma { key, value } => {
            let path = cli.path.ok_or("Database path required for pragma")?;
            commands::pragma::run(&path, key.as_deref(), value.as_deref(), cli.format)?;
        }
        Commands::Checkpoint { truncate } => {
            let path = cli.path.ok_or("Database path required for checkpoint")?;
            commands::checkpoint::run(&path, truncate, cli.format)?;
        }
        Commands::Timeline {
            trace,
            at,
            selection,
        } => {
            commands::timeline::run(&trace, at, selection, cli.format)?;
        }
        Commands::Version => {
            println!("Tessera CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Tessera Core v{}", tessera_core::VERSION);
        }
    }

    Ok(())
}
