//! Aggregator over several interval stores.
//!
//! The aggregator stacks its stores vertically and navigates across them in time
//! order. Stores are shared: the aggregator holds references, and a store stays
//! usable after it is removed.

use crate::events::StoreEvent;
use crate::interval::ModelId;
use crate::store::IntervalStore;
use parking_lot::{RwLock, RwLockReadGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::debug;

/// A store shared between the aggregator and its producers.
pub type SharedStore = Arc<RwLock<IntervalStore>>;

/// Position of an item across the aggregator: store position and item position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreItem {
    /// Position of the store in the aggregator.
    pub store: usize,
    /// Position of the interval in that store.
    pub item: usize,
}

impl StoreItem {
    /// Creates a store item reference.
    #[must_use]
    pub const fn new(store: usize, item: usize) -> Self {
        Self { store, item }
    }
}

struct Registered {
    store: SharedStore,
    events: Receiver<StoreEvent>,
}

impl Registered {
    fn new(store: SharedStore) -> Self {
        let events = store.write().subscribe();
        Self { store, events }
    }
}

/// Ordered collection of stores.
///
/// Store notifications queue up until the aggregator looks at them. Both
/// [`height`](Self::height) and [`take_height_changed`](Self::take_height_changed)
/// fold the queue into a single flag, so an owner that keeps reading heights never
/// builds up a backlog.
#[derive(Default)]
pub struct Aggregator {
    stores: Vec<Registered>,
    next_model_id: u32,
    height_changed: AtomicBool,
}

impl Aggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next model id. Ids are never reused.
    pub fn generate_model_id(&mut self) -> ModelId {
        let id = ModelId::new(self.next_model_id);
        self.next_model_id += 1;
        id
    }

    /// Creates a store with a fresh model id. The store is not registered yet.
    pub fn new_store(&mut self, display_name: impl Into<String>) -> SharedStore {
        let mut store = IntervalStore::new(self.generate_model_id());
        store.set_display_name(display_name);
        Arc::new(RwLock::new(store))
    }

    /// Appends a store.
    pub fn add_store(&mut self, store: SharedStore) {
        let model_id = store.read().model_id();
        self.stores.push(Registered::new(store));
        debug!(model = %model_id, stores = self.stores.len(), "store added");
    }

    /// Replaces the registered stores. Returns false if `stores` is the current list.
    pub fn set_stores(&mut self, stores: Vec<SharedStore>) -> bool {
        let unchanged = stores.len() == self.stores.len()
            && stores
                .iter()
                .zip(&self.stores)
                .all(|(new, old)| Arc::ptr_eq(new, &old.store));
        if unchanged {
            return false;
        }
        self.stores = stores.into_iter().map(Registered::new).collect();
        debug!(stores = self.stores.len(), "stores replaced");
        true
    }

    /// Removes all stores.
    pub fn clear(&mut self) {
        self.stores.clear();
    }

    /// Number of registered stores.
    #[must_use]
    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    /// The store at `index`.
    #[must_use]
    pub fn store(&self, index: usize) -> Option<&SharedStore> {
        self.stores.get(index).map(|registered| &registered.store)
    }

    /// Registered stores in order.
    pub fn stores(&self) -> impl Iterator<Item = &SharedStore> + '_ {
        self.stores.iter().map(|registered| &registered.store)
    }

    /// Position of the store created with `model_id`.
    #[must_use]
    pub fn store_index_by_id(&self, model_id: ModelId) -> Option<usize> {
        self.stores
            .iter()
            .position(|registered| registered.store.read().model_id() == model_id)
    }

    /// Sum of all store heights.
    #[must_use]
    pub fn height(&self) -> i32 {
        self.collect_events();
        self.store_offset(self.stores.len())
    }

    /// Sum of the heights of the stores before `index`.
    #[must_use]
    pub fn store_offset(&self, index: usize) -> i32 {
        self.stores
            .iter()
            .take(index)
            .map(|registered| registered.store.read().height())
            .sum()
    }

    /// Reports whether any store height moved since the last call.
    pub fn take_height_changed(&self) -> bool {
        self.collect_events();
        self.height_changed.swap(false, Ordering::Relaxed)
    }

    fn collect_events(&self) {
        let moved = self
            .stores
            .iter()
            .flat_map(|registered| registered.events.try_iter())
            .filter(|event| event.affects_height())
            .count()
            > 0;
        if moved {
            self.height_changed.store(true, Ordering::Relaxed);
        }
    }

    fn read_all(&self) -> Vec<RwLockReadGuard<'_, IntervalStore>> {
        self.stores
            .iter()
            .map(|registered| registered.store.read())
            .collect()
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// The item following the selection in time across all stores.
    ///
    /// With a selected item, navigation continues from its start time; otherwise from
    /// `time`. Items starting at the same time are visited in store order. When
    /// nothing starts later, navigation wraps to the earliest item of all stores.
    #[must_use]
    pub fn next_item(
        &self,
        selected_store: Option<usize>,
        selected_item: Option<usize>,
        time: i64,
    ) -> Option<StoreItem> {
        let stores = self.read_all();
        let time = match (selected_store, selected_item) {
            (Some(store), Some(item)) => stores.get(store).map_or(time, |s| s.start_time(item)),
            _ => time,
        };
        let before_selection = |i: usize| selected_store.is_some_and(|selected| i < selected);
        let after_selection = |i: usize| selected_store.map_or(true, |selected| i > selected);

        let candidates: Vec<Option<usize>> = stores
            .iter()
            .enumerate()
            .map(|(i, store)| {
                let count = store.count();
                if count == 0 {
                    return None;
                }
                if selected_store == Some(i) {
                    return Some(selected_item.map_or(0, |item| item + 1) % count);
                }
                let mut index = if store.start_time(0) >= time {
                    0
                } else {
                    store.last_index(time).map_or(0, |last| (last + 1) % count)
                };
                if before_selection(i) && store.start_time(index) == time {
                    index = (index + 1) % count;
                }
                Some(index)
            })
            .collect();

        let mut best: Option<(StoreItem, i64)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            let Some(item) = *candidate else { continue };
            let start = stores[i].start_time(item);
            let qualifies = start > time || (start == time && after_selection(i));
            if qualifies && best.map_or(true, |(_, best_start)| start < best_start) {
                best = Some((StoreItem::new(i, item), start));
            }
        }
        if let Some((found, _)) = best {
            return Some(found);
        }

        let mut earliest: Option<(usize, i64)> = None;
        for (i, store) in stores.iter().enumerate() {
            if store.is_empty() {
                continue;
            }
            let start = store.start_time(0);
            if earliest.map_or(true, |(_, earliest_start)| start < earliest_start) {
                earliest = Some((i, start));
            }
        }
        earliest.map(|(store, _)| StoreItem::new(store, 0))
    }

    /// The item preceding the selection in time across all stores.
    ///
    /// Mirrors [`next_item`](Self::next_item): items starting at the same time are
    /// visited in reverse store order, and navigation wraps to the latest item.
    #[must_use]
    pub fn prev_item(
        &self,
        selected_store: Option<usize>,
        selected_item: Option<usize>,
        time: i64,
    ) -> Option<StoreItem> {
        let stores = self.read_all();
        let time = match (selected_store, selected_item) {
            (Some(store), Some(item)) => stores.get(store).map_or(time, |s| s.start_time(item)),
            _ => time,
        };
        let before_selection = |i: usize| selected_store.is_some_and(|selected| i < selected);

        let candidates: Vec<Option<usize>> = stores
            .iter()
            .enumerate()
            .map(|(i, store)| {
                let count = store.count();
                let index = if selected_store == Some(i) {
                    match selected_item {
                        Some(item) if item > 0 => Some(item - 1),
                        _ => count.checked_sub(1),
                    }
                } else {
                    match store.last_index(time) {
                        None => count.checked_sub(1),
                        Some(last)
                            if before_selection(i)
                                && last + 1 < count
                                && store.start_time(last + 1) == time =>
                        {
                            Some(last + 1)
                        }
                        Some(last) => Some(last),
                    }
                };
                index.filter(|&index| index < count)
            })
            .collect();

        let mut best: Option<(StoreItem, i64)> = None;
        for (i, candidate) in candidates.iter().enumerate().rev() {
            let Some(item) = *candidate else { continue };
            let start = stores[i].start_time(item);
            let qualifies = start < time || (start == time && before_selection(i));
            if qualifies && best.map_or(true, |(_, best_start)| start > best_start) {
                best = Some((StoreItem::new(i, item), start));
            }
        }
        if let Some((found, _)) = best {
            return Some(found);
        }

        let mut latest: Option<(StoreItem, i64)> = None;
        for (i, store) in stores.iter().enumerate() {
            let Some(last) = store.count().checked_sub(1) else {
                continue;
            };
            let start = store.start_time(last);
            if latest.map_or(true, |(_, latest_start)| start > latest_start) {
                latest = Some((StoreItem::new(i, last), start));
            }
        }
        latest.map(|(found, _)| found)
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("stores", &self.stores.len())
            .field("next_model_id", &self.next_model_id)
            .field("height_changed", &self.height_changed.load(Ordering::Relaxed))
            .finish()
    }
}
