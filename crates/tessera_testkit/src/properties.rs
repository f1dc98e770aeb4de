//! Property tests over the backend and the interval store.

use crate::fixtures::{scenarios, TestBackend};
use crate::generators::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use tessera_timeline::{Aggregator, IntervalStore, ModelId, StoreItem};

fn aggregator_from(starts: &BTreeMap<i64, usize>, stores: usize) -> Aggregator {
    let mut per_store: Vec<Vec<i64>> = vec![Vec::new(); stores];
    for (&start, &store) in starts {
        per_store[store].push(start);
    }
    let slices: Vec<&[i64]> = per_store.iter().map(Vec::as_slice).collect();
    scenarios::aggregator_with(&slices)
}

fn item_start(aggregator: &Aggregator, item: StoreItem) -> i64 {
    aggregator
        .store(item.store)
        .map(|store| store.read().start_time(item.item))
        .unwrap_or(i64::MIN)
}

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn end_index_tracks_start_index(batch in interval_batch_strategy(0, 100)) {
        let mut store = IntervalStore::new(ModelId::new(0));
        for interval in &batch {
            store.insert(interval.start, interval.duration, interval.selection_id);
            prop_assert_eq!(store.count(), store.ended_count());
        }
        prop_assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn start_index_is_sorted_and_handles_resolve(batch in interval_batch_strategy(0, 100)) {
        let store = scenarios::store_from(&batch);
        let intervals: Vec<_> = store.iter().collect();
        let sorted = intervals.windows(2).all(|pair| {
            pair[0].start < pair[1].start
                || (pair[0].start == pair[1].start && pair[0].duration >= pair[1].duration)
        });
        prop_assert!(sorted);
        for index in 0..store.count() {
            let id = store.id_at(index).unwrap();
            prop_assert_eq!(store.index_of(id), Some(index));
        }
    }

    #[test]
    fn parents_contain_their_children(batch in interval_batch_strategy(0, 100)) {
        let store = scenarios::store_from(&batch);
        for index in 0..store.count() {
            if let Some(parent) = store.parent_index(index) {
                prop_assert!(parent < index);
                prop_assert!(store.interval(parent).contains(&store.interval(index)));
            }
        }
    }

    #[test]
    fn parents_of_two_phase_intervals_are_top_level_and_cover_them(
        batch in two_phase_batch_strategy(0, 60),
    ) {
        let store = scenarios::two_phase_store(&batch);
        for index in 0..store.count() {
            let Some(parent) = store.parent_index(index) else {
                continue;
            };
            let child = store.interval(index);
            let outer = store.interval(parent);
            prop_assert!(parent < index);
            prop_assert_eq!(store.parent_index(parent), None);
            prop_assert!(outer.start <= child.start);

            // Same-start ties parent the lower index even when it ends first. Its
            // same-start children then stand in for it as the container.
            let tied = outer.start == child.start && outer.end() < child.end();
            let covered = outer.contains(&child)
                || (0..index).any(|sibling| {
                    store.parent_index(sibling) == Some(parent)
                        && store.start_time(sibling) == outer.start
                        && store.interval(sibling).contains(&child)
                });
            prop_assert!(tied || covered);
        }
    }

    #[test]
    fn last_index_is_the_last_start_before(
        batch in interval_batch_strategy(0, 100),
        time in timestamp_strategy(),
    ) {
        let store = scenarios::store_from(&batch);
        let expected = (0..store.count()).rev().find(|&i| store.start_time(i) < time);
        prop_assert_eq!(store.last_index(time), expected);
    }

    #[test]
    fn first_index_no_parents_has_the_lowest_later_end(
        batch in interval_batch_strategy(0, 100),
        time in timestamp_strategy(),
    ) {
        let store = scenarios::store_from(&batch);
        let lowest_end = (0..store.count())
            .map(|i| store.end_time(i))
            .filter(|&end| end > time)
            .min();
        let found = store.first_index_no_parents(time);
        prop_assert_eq!(found.map(|i| store.end_time(i)), lowest_end);
    }

    #[test]
    fn first_index_resolves_to_a_top_level_interval(
        batch in interval_batch_strategy(1, 100),
        time in timestamp_strategy(),
    ) {
        let store = scenarios::store_from(&batch);
        if let Some(index) = store.first_index(time) {
            prop_assert_eq!(store.parent_index(index), None);
        }
    }

    #[test]
    fn best_index_is_in_range(
        batch in interval_batch_strategy(0, 100),
        time in timestamp_strategy(),
    ) {
        let store = scenarios::store_from(&batch);
        match store.best_index(time) {
            Some(index) => prop_assert!(index < store.count()),
            None => prop_assert!(store.is_empty()),
        }
    }

    #[test]
    fn next_item_by_selection_finds_the_group(
        batch in interval_batch_strategy(1, 60),
        selection in 0i32..8,
        time in timestamp_strategy(),
    ) {
        let store = scenarios::store_from(&batch);
        let in_group = (0..store.count()).any(|i| store.selection_id(i) == selection);
        let next = store.next_item_by_selection_id(selection, time, None);
        let prev = store.prev_item_by_selection_id(selection, time, None);
        prop_assert_eq!(next.is_some(), in_group);
        prop_assert_eq!(prev.is_some(), in_group);
        if let Some(index) = next {
            prop_assert_eq!(store.selection_id(index), selection);
        }
    }

    #[test]
    fn next_item_cycles_through_all_stores(starts in distinct_starts_strategy(4, 40)) {
        let aggregator = aggregator_from(&starts, 4);
        let total = starts.len();

        let mut seen = HashSet::new();
        let mut previous_start = i64::MIN;
        let mut selection: Option<StoreItem> = None;
        for _ in 0..total {
            let next = aggregator
                .next_item(selection.map(|s| s.store), selection.map(|s| s.item), -1)
                .unwrap();
            let start = item_start(&aggregator, next);
            prop_assert!(start > previous_start);
            prop_assert!(seen.insert(next));
            previous_start = start;
            selection = Some(next);
        }

        let wrapped = aggregator
            .next_item(selection.map(|s| s.store), selection.map(|s| s.item), -1)
            .unwrap();
        prop_assert_eq!(item_start(&aggregator, wrapped), *starts.keys().next().unwrap());
    }

    #[test]
    fn prev_item_cycles_backwards(starts in distinct_starts_strategy(4, 40)) {
        let aggregator = aggregator_from(&starts, 4);
        let total = starts.len();

        let mut previous_start = i64::MAX;
        let mut selection: Option<StoreItem> = None;
        for _ in 0..total {
            let prev = aggregator
                .prev_item(
                    selection.map(|s| s.store),
                    selection.map(|s| s.item),
                    MAX_START + 1,
                )
                .unwrap();
            let start = item_start(&aggregator, prev);
            prop_assert!(start < previous_start);
            previous_start = start;
            selection = Some(prev);
        }
        prop_assert_eq!(previous_start, *starts.keys().next().unwrap());
    }
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn journal_mode_round_trips(mode in journal_mode_strategy()) {
        let backend = TestBackend::file();
        backend.set_journal_mode(mode).unwrap();
        prop_assert_eq!(backend.journal_mode().unwrap(), mode);
    }

    #[test]
    fn locking_mode_round_trips(mode in locking_mode_strategy()) {
        let backend = TestBackend::file();
        backend.set_locking_mode(mode).unwrap();
        prop_assert_eq!(backend.locking_mode().unwrap(), mode);
    }
}
