//! # Tessera Timeline
//!
//! Indexes nested time intervals for timeline views.
//!
//! This crate provides:
//! - [`IntervalStore`]: start- and end-ordered indexes with parent nesting
//! - Time searches (`first_index`, `last_index`, `best_index`) and selection navigation
//! - Row layout for expanded and collapsed display
//! - [`Aggregator`]: stacks stores and navigates across them in time order
//! - Plain-text trace file loading and writing
//!
//! ## Example
//!
//! ```rust
//! use tessera_timeline::{IntervalStore, ModelId};
//!
//! let mut store = IntervalStore::new(ModelId::new(0));
//! store.insert(0, 10, 1);
//! store.insert(2, 3, 2);
//! store.compute_nesting();
//!
//! assert_eq!(store.parent_index(1), Some(0));
//! assert_eq!(store.first_index(4), Some(0));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod aggregator;
mod events;
mod interval;
mod layout;
mod store;
pub mod trace_file;

pub use aggregator::{Aggregator, SharedStore, StoreItem};
pub use events::StoreEvent;
pub use interval::{Interval, IntervalId, ModelId};
pub use layout::{RowLayout, DEFAULT_ROW_HEIGHT};
pub use store::IntervalStore;
pub use trace_file::{read_trace, write_trace};

// Re-export the I/O failure taxonomy used by the trace loader.
pub use tessera_core::{IoError, IoResult};
