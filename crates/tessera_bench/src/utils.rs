//! Benchmark utilities.

use rand::Rng;
use tessera_timeline::{Interval, IntervalStore, ModelId};

/// Generate random blob data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate intervals in ascending start order, the way a profiler delivers them.
///
/// Roughly one in four intervals starts inside its predecessor, so the result nests.
pub fn chronological_intervals(count: usize) -> Vec<Interval> {
    let mut rng = rand::thread_rng();
    let mut start = 0i64;
    (0..count)
        .map(|_| {
            start += rng.gen_range(0..40);
            let duration = if rng.gen_ratio(1, 4) {
                rng.gen_range(50..400)
            } else {
                rng.gen_range(1..30)
            };
            Interval::new(start, duration, rng.gen_range(0..16))
        })
        .collect()
}

/// Generate intervals in random start order.
pub fn shuffled_intervals(count: usize) -> Vec<Interval> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            Interval::new(
                rng.gen_range(0..(count as i64 * 20).max(1)),
                rng.gen_range(1..100),
                rng.gen_range(0..16),
            )
        })
        .collect()
}

/// Build a store from `intervals` with nesting computed.
pub fn build_store(intervals: &[Interval]) -> IntervalStore {
    let mut store = IntervalStore::new(ModelId::new(0));
    for interval in intervals {
        store.insert(interval.start, interval.duration, interval.selection_id);
    }
    store.compute_nesting();
    store
}
