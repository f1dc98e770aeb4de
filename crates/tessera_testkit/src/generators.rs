//! Property-based test generators using proptest.
//!
//! Provides strategies for generating intervals, timestamps and backend settings.

use proptest::prelude::*;
use std::collections::BTreeMap;
use tessera_sqlite::{JournalMode, LockingMode};
use tessera_timeline::Interval;

/// Largest start time produced by the interval strategies.
pub const MAX_START: i64 = 10_000;

/// Largest duration produced by the interval strategies.
pub const MAX_DURATION: i64 = 500;

/// Strategy for generating a single interval.
pub fn interval_strategy() -> impl Strategy<Value = Interval> {
    (0..=MAX_START, 0..=MAX_DURATION, 0i32..8)
        .prop_map(|(start, duration, selection)| Interval::new(start, duration, selection))
}

/// Strategy for generating a batch of intervals in arbitrary order.
pub fn interval_batch_strategy(
    min_len: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<Interval>> {
    prop::collection::vec(interval_strategy(), min_len..max_len)
}

/// Strategy for generating a batch of intervals in ascending start order, the way a
/// profiler delivers them.
pub fn chronological_batch_strategy(
    min_len: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<Interval>> {
    interval_batch_strategy(min_len, max_len).prop_map(|mut intervals| {
        intervals.sort_by_key(|interval| interval.start);
        intervals
    })
}

/// Largest start time produced by [`two_phase_batch_strategy`].
pub const CROWDED_MAX_START: i64 = 40;

/// Strategy for generating intervals crowded into a short time range, each flagged
/// with whether it is inserted in two phases.
///
/// Two-phase intervals are inserted with a zero duration and completed right away,
/// so they sort behind same-start intervals of any length.
pub fn two_phase_batch_strategy(
    min_len: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<(Interval, bool)>> {
    let interval = (0..=CROWDED_MAX_START, 0..=CROWDED_MAX_START, 0i32..4)
        .prop_map(|(start, duration, selection)| Interval::new(start, duration, selection));
    prop::collection::vec((interval, any::<bool>()), min_len..max_len)
}

/// Strategy for generating a query time, including times before and after every
/// generated interval.
pub fn timestamp_strategy() -> impl Strategy<Value = i64> {
    -10..=(MAX_START + MAX_DURATION + 10)
}

/// Strategy for generating distinct start times spread over up to `stores` stores.
///
/// Maps each start time to the position of the store that holds it.
pub fn distinct_starts_strategy(
    stores: usize,
    max_len: usize,
) -> impl Strategy<Value = BTreeMap<i64, usize>> {
    prop::collection::btree_map(0..=MAX_START, 0..stores.max(1), 1..max_len.max(2))
}

/// Strategy for generating journal modes.
pub fn journal_mode_strategy() -> impl Strategy<Value = JournalMode> {
    prop::sample::select(JournalMode::ALL.to_vec())
}

/// Strategy for generating locking modes that issue a pragma.
pub fn locking_mode_strategy() -> impl Strategy<Value = LockingMode> {
    prop_oneof![Just(LockingMode::Normal), Just(LockingMode::Exclusive)]
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
