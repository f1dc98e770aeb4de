//! Interval values and handles.

use std::fmt;

/// Identifier of a store, handed out by the aggregator once per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u32);

impl ModelId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

/// Stable handle to an interval.
///
/// Unlike a position, a handle does not move when other intervals are inserted in
/// front of it. Handles from before a [`clear`](crate::IntervalStore::clear) are
/// rejected afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalId {
    pub(crate) slot: usize,
    pub(crate) generation: u32,
}

/// A time range `[start, start + duration)` tagged with a selection group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    /// Start time in ticks.
    pub start: i64,
    /// Duration in ticks.
    pub duration: i64,
    /// Caller-assigned selection group.
    pub selection_id: i32,
}

impl Interval {
    /// Creates an interval.
    #[must_use]
    pub const fn new(start: i64, duration: i64, selection_id: i32) -> Self {
        Self {
            start,
            duration,
            selection_id,
        }
    }

    /// End time in ticks, saturating at the bounds of `i64`.
    #[must_use]
    pub const fn end(&self) -> i64 {
        self.start.saturating_add(self.duration)
    }

    /// Returns true if `other` lies completely inside `self`.
    #[must_use]
    pub const fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && self.end() >= other.end()
    }
}
