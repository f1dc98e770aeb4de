//! Checkpoint command implementation.

use super::{print, CommandResult, OutputFormat};
use serde::Serialize;
use std::path::Path;
use tessera_core::IoError;
use tessera_sqlite::{Backend, BackendConfig};

/// Checkpoint result.
#[derive(Debug, Serialize)]
pub struct CheckpointResult {
    /// Database path.
    pub path: String,
    /// Checkpoint mode that ran.
    pub mode: &'static str,
    /// Frames in the log, `-1` outside WAL mode.
    pub log_frames: i64,
    /// Frames copied back, `-1` outside WAL mode.
    pub checkpointed_frames: i64,
}

/// Runs the checkpoint command.
pub fn run(path: &Path, truncate: bool, format: OutputFormat) -> CommandResult {
    let result = checkpoint(path, truncate)?;
    print(&result, format, |result| {
        if result.log_frames < 0 {
            println!("{}: not in WAL mode, nothing to do", result.path);
        } else {
            println!(
                "{}: {} checkpoint copied {} of {} frames",
                result.path, result.mode, result.checkpointed_frames, result.log_frames
            );
        }
    })
}

/// Checkpoints the database at `path`, truncating the log if asked to.
pub fn checkpoint(path: &Path, truncate: bool) -> CommandResult<CheckpointResult> {
    if !path.exists() {
        return Err(IoError::not_found(path).into());
    }
    let backend = Backend::open_with_config(path, BackendConfig::new())?;
    let (mode, outcome) = if truncate {
        ("TRUNCATE", backend.wal_checkpoint_full()?)
    } else {
        ("FULL", backend.checkpoint_full_wal_log()?)
    };

    Ok(CheckpointResult {
        path: path.display().to_string(),
        mode,
        log_frames: outcome.log_frames,
        checkpointed_frames: outcome.checkpointed_frames,
    })
}
