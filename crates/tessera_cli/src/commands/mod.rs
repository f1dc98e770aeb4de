//! CLI command implementations.

pub mod checkpoint;
pub mod pragma;
pub mod timeline;

use clap::ValueEnum;
use serde::Serialize;
use tessera_core::{DatabaseError, IoError};
use thiserror::Error;

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Errors reported by the commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A database operation failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Reading or writing a file failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// The result could not be serialized.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),

    /// The arguments do not make sense together.
    #[error("{0}")]
    Usage(String),
}

/// Result type for commands.
pub type CommandResult<T = ()> = Result<T, CommandError>;

/// Prints `result` as JSON, or through `text` for the text format.
pub fn print<T: Serialize>(
    result: &T,
    format: OutputFormat,
    text: impl FnOnce(&T),
) -> CommandResult {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => text(result),
    }
    Ok(())
}
