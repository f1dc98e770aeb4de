//! # Tessera SQLite
//!
//! Session backend for a single embedded SQLite connection.
//!
//! This crate provides:
//! - Open/close lifecycle with fail-fast accessors while closed
//! - Pragma writes verified by reading them back (journal mode, locking mode, mmap size)
//! - Busy handler registration and a bounded, injectable retry loop for busy statements
//! - WAL checkpoints, session change counters, and row change notifications
//! - A name-keyed blob cache built on top of the backend

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod blob_cache;
mod busy;
mod change_feed;
mod config;
mod native;
mod retry;
mod stats;

pub use backend::{Backend, TransactionKind, WalCheckpoint};
pub use blob_cache::BlobCache;
pub use busy::{default_busy_handler, fail_fast_busy_handler, BusyHandler, DEFAULT_BUSY_SLEEP};
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind};
pub use config::{BackendConfig, JournalMode, LockingMode, OpenMode};
pub use retry::{
    classify, engine_error, is_busy_error, Attempt, Backoff, ExponentialBackoff, FixedBackoff,
    RetryPolicy,
};
pub use stats::{BackendStats, StatsSnapshot};

// Re-export the failure taxonomy for convenience.
pub use tessera_core::{DatabaseError, DbResult};

// Callers of `Backend::transaction` and `Backend::with_retry` work with engine types.
pub use rusqlite;
