//! # Tessera Core
//!
//! Shared foundation for the Tessera crates.
//!
//! This crate provides:
//! - The failure taxonomy used by the storage backend and file loaders
//! - Interned identifiers for names that are compared far more often than printed

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod intern;

pub use error::{DatabaseError, DbResult, IoError, IoResult};
pub use intern::Id;

/// Tessera version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
