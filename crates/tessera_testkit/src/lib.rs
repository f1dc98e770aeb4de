//! # Tessera Testkit
//!
//! Test utilities for Tessera.
//!
//! This crate provides:
//! - Backend fixtures over temporary files and in-memory databases
//! - A lock holder for provoking busy contention between connections
//! - Ready-made interval stores and aggregators
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tessera_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_backend() {
//!     with_temp_backend(|backend| {
//!         backend.execute("CREATE TABLE t(x)").unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

#[cfg(test)]
mod properties;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
