//! Failure taxonomy for Tessera.
//!
//! Two families are defined here:
//! - [`IoError`] for file-level input/output (trace files and other on-disk inputs)
//! - [`DatabaseError`] for the embedded SQL backend
//!
//! Both are plain values. Only [`DatabaseError::Busy`] is meant to be caught and
//! retried; everything else reports a logic or environment failure that retrying
//! would not fix.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for file input/output.
pub type IoResult<T> = Result<T, IoError>;

/// Result type for database backend operations.
pub type DbResult<T> = Result<T, DatabaseError>;

/// Errors raised while reading or writing files.
#[derive(Debug, Error)]
pub enum IoError {
    /// Generic input/output failure.
    #[error("I/O failure: {message}")]
    Failure {
        /// Description of the failure.
        message: String,
    },

    /// The file does not exist.
    #[error("file not found: {}", .path.display())]
    FileNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The file could not be created.
    #[error("unable to create file: {}", .path.display())]
    FileCreation {
        /// Path that was being created.
        path: PathBuf,
    },

    /// Writing to the file failed.
    #[error("writing to file failed: {}:{line}", .path.display())]
    FileWrite {
        /// File being written.
        path: PathBuf,
        /// 1-based line at which the write failed.
        line: usize,
    },

    /// Reading from the file failed.
    #[error("reading from file failed: {}:{line}", .path.display())]
    FileRead {
        /// File being read.
        path: PathBuf,
        /// 1-based line at which the read failed.
        line: usize,
    },

    /// The file content does not follow the expected format.
    #[error("malformed file {}:{line}: {message}", .path.display())]
    MalformedFile {
        /// File being parsed.
        path: PathBuf,
        /// 1-based line of the offending content.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// The file declares a format version this build cannot handle.
    #[error("unable to handle file version {version}: {}:{line}", .path.display())]
    UnsupportedFileVersion {
        /// Declared version.
        version: u32,
        /// File being parsed.
        path: PathBuf,
        /// 1-based line of the version declaration.
        line: usize,
    },
}

impl IoError {
    /// Creates a generic failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// Creates a file-not-found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates a malformed file error.
    pub fn malformed(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::MalformedFile {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Returns the path the error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Failure { .. } => None,
            Self::FileNotFound { path }
            | Self::FileCreation { path }
            | Self::FileWrite { path, .. }
            | Self::FileRead { path, .. }
            | Self::MalformedFile { path, .. }
            | Self::UnsupportedFileVersion { path, .. } => Some(path),
        }
    }

    /// Returns the 1-based line the error refers to, if any.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::FileWrite { line, .. }
            | Self::FileRead { line, .. }
            | Self::MalformedFile { line, .. }
            | Self::UnsupportedFileVersion { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Errors raised by the database backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// An operation needed an open database handle but none is held.
    #[error("database is not open: {context}")]
    NotOpen {
        /// Operation that was attempted.
        context: String,
    },

    /// `open` was called while a handle is already held.
    #[error("database cannot be opened because it is already open")]
    AlreadyOpen,

    /// `close` was called while no handle is held.
    #[error("database is not open so it cannot be closed")]
    AlreadyClosed,

    /// The engine reported lock contention and the retry budget ran out.
    #[error("database is busy: {context}")]
    Busy {
        /// Operation that could not complete.
        context: String,
    },

    /// The database file path is empty.
    #[error("database cannot be opened because the file path is empty")]
    PathEmpty,

    /// The directory containing the database file does not exist.
    #[error("database cannot be opened because of wrong file path: {}", .path.display())]
    PathInvalid {
        /// Rejected path.
        path: PathBuf,
    },

    /// A pragma was written but reading it back yields a different value.
    #[error("pragma {key} was not set: requested '{requested}', database reports '{actual}'")]
    PragmaValueRejected {
        /// Pragma name.
        key: String,
        /// Value that was written.
        requested: String,
        /// Value read back from the database.
        actual: String,
    },

    /// A pragma value read from the database is outside the known table.
    #[error("pragma {key} has unrecognized value '{value}'")]
    UnrecognizedPragmaValue {
        /// Pragma name.
        key: String,
        /// Value read from the database.
        value: String,
    },

    /// A pragma key is not a plain (optionally schema-qualified) identifier.
    #[error("invalid pragma key '{key}'")]
    InvalidPragmaKey {
        /// Rejected key.
        key: String,
    },

    /// Any other engine failure, carrying the engine's own message.
    #[error("{context}: {message} (code {code})")]
    Engine {
        /// Operation that failed.
        context: String,
        /// Extended engine result code, `-1` when the failure did not come from the engine.
        code: i32,
        /// Engine error message.
        message: String,
    },
}

impl DatabaseError {
    /// Creates a not-open error.
    pub fn not_open(context: impl Into<String>) -> Self {
        Self::NotOpen {
            context: context.into(),
        }
    }

    /// Creates a busy error.
    pub fn busy(context: impl Into<String>) -> Self {
        Self::Busy {
            context: context.into(),
        }
    }

    /// Creates an invalid path error.
    pub fn path_invalid(path: impl Into<PathBuf>) -> Self {
        Self::PathInvalid { path: path.into() }
    }

    /// Creates an engine error.
    pub fn engine(context: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self::Engine {
            context: context.into(),
            code,
            message: message.into(),
        }
    }

    /// Returns true for the one kind callers may retry.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}
