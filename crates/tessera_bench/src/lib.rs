//! Benchmarks for Tessera.
//!
//! The benchmarks live under `benches/`; this library holds their shared input
//! generators.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
