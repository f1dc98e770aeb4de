//! Interval store.
//!
//! Intervals live in a slot arena and are never removed individually. Two indexes
//! refer into the arena by [`IntervalId`]:
//!
//! - the start index, sorted by start time; an interval's position here is its
//!   externally visible index
//! - the end index, sorted by end time, for "first interval ending after T" queries
//!
//! Because both indexes and the parent links hold handles instead of positions,
//! inserting in the middle shifts nothing that would need renumbering. A position is
//! recovered from a handle by binary search on the start time plus a scan over the
//! intervals sharing that start.
//!
//! Positions passed to the accessors must be below [`IntervalStore::count`]; anything
//! else panics.

use crate::events::{StoreEvent, Subscribers};
use crate::interval::{Interval, IntervalId, ModelId};
use crate::layout::RowLayout;
use std::fmt;
use std::sync::mpsc::Receiver;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
struct Slot {
    interval: Interval,
    parent: Option<IntervalId>,
    ended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EndEntry {
    end: i64,
    id: IntervalId,
}

/// Ordered, nested intervals of one timeline row group.
pub struct IntervalStore {
    model_id: ModelId,
    display_name: String,
    tooltip: String,
    expanded: bool,
    hidden: bool,
    layout: RowLayout,
    slots: Vec<Slot>,
    generation: u32,
    starts: Vec<IntervalId>,
    ends: Vec<EndEntry>,
    nesting_current: bool,
    subscribers: Subscribers,
}

impl IntervalStore {
    /// Creates an empty store.
    ///
    /// Stores registered with an aggregator should get their id from
    /// [`Aggregator::new_store`](crate::Aggregator::new_store).
    #[must_use]
    pub fn new(model_id: ModelId) -> Self {
        Self {
            model_id,
            display_name: String::new(),
            tooltip: String::new(),
            expanded: false,
            hidden: false,
            layout: RowLayout::new(),
            slots: Vec::new(),
            generation: 0,
            starts: Vec::new(),
            ends: Vec::new(),
            nesting_current: true,
            subscribers: Subscribers::default(),
        }
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Inserts a complete interval and returns its position.
    ///
    /// Intervals are expected in roughly ascending start order, so the insertion
    /// point is searched from the tail. Among equal starts, longer intervals come
    /// first; equal start and duration keep insertion order.
    pub fn insert(&mut self, start: i64, duration: i64, selection_id: i32) -> usize {
        let interval = Interval::new(start, duration, selection_id);
        let (index, id) = self.push_start(interval, true);
        self.push_end(id, interval.end());
        index
    }

    /// Inserts an interval whose end is not known yet and returns its position.
    ///
    /// Until [`insert_end`](Self::insert_end) completes it, the interval has zero
    /// duration and is absent from the end index.
    pub fn insert_start(&mut self, start: i64, selection_id: i32) -> usize {
        self.push_start(Interval::new(start, 0, selection_id), false).0
    }

    /// Completes the interval at `index` with its duration.
    ///
    /// Completing an interval again replaces its end.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub fn insert_end(&mut self, index: usize, duration: i64) {
        let id = self.starts[index];
        self.complete(id, duration);
    }

    /// Completes the interval behind `id`. Returns false for a stale handle.
    pub fn insert_end_by_id(&mut self, id: IntervalId, duration: i64) -> bool {
        if self.slot(id).is_none() {
            return false;
        }
        self.complete(id, duration);
        true
    }

    fn push_start(&mut self, interval: Interval, ended: bool) -> (usize, IntervalId) {
        let id = IntervalId {
            slot: self.slots.len(),
            generation: self.generation,
        };
        self.slots.push(Slot {
            interval,
            parent: None,
            ended,
        });

        let mut index = self.starts.len();
        while index > 0 {
            let prev = self.interval_of(self.starts[index - 1]);
            if prev.start < interval.start
                || (prev.start == interval.start && prev.duration >= interval.duration)
            {
                break;
            }
            index -= 1;
        }
        self.starts.insert(index, id);
        self.nesting_current = false;
        (index, id)
    }

    fn push_end(&mut self, id: IntervalId, end: i64) {
        let mut index = self.ends.len();
        while index > 0 && self.ends[index - 1].end > end {
            index -= 1;
        }
        self.ends.insert(index, EndEntry { end, id });
    }

    fn complete(&mut self, id: IntervalId, duration: i64) {
        if self.slots[id.slot].ended {
            if let Some(old) = self.ends.iter().rposition(|entry| entry.id == id) {
                self.ends.remove(old);
            }
        }
        let slot = &mut self.slots[id.slot];
        slot.interval.duration = duration;
        slot.ended = true;
        let end = slot.interval.end();
        self.push_end(id, end);
        self.nesting_current = false;
    }

    // =========================================================================
    // Nesting
    // =========================================================================

    /// Assigns every interval its parent.
    ///
    /// One pass over the start index keeps a list of intervals that have not ended
    /// yet. An interval whose start equals an earlier, shorter interval's start is
    /// parented to the earlier one even though it is not contained in it: queries for
    /// the first interval at a time then resolve to the lowest position among the
    /// intervals sharing that start.
    pub fn compute_nesting(&mut self) {
        let mut active: Vec<IntervalId> = Vec::new();

        for position in 0..self.starts.len() {
            let current_id = self.starts[position];
            let current = self.interval_of(current_id);
            let mut parent = None;
            let mut becomes_active = true;

            // Ended candidates are compacted out in one pass over the scanned prefix.
            let mut read = 0;
            let mut write = 0;
            while let Some(&candidate_id) = active.get(read) {
                read += 1;
                let candidate = self.slots[candidate_id.slot];
                let candidate_end = candidate.interval.end();
                if candidate_end < current.start {
                    continue;
                }
                active[write] = candidate_id;
                write += 1;

                if candidate_end >= current.end() {
                    parent = Some(candidate.parent.unwrap_or(candidate_id));
                    becomes_active = false;
                    break;
                }
                if candidate.interval.start == current.start {
                    parent = Some(candidate_id);
                    break;
                }
            }
            active.drain(write..read);
            if becomes_active {
                active.push(current_id);
            }

            self.slots[current_id.slot].parent = parent;
        }

        self.nesting_current = true;
        debug!(
            model = %self.model_id,
            intervals = self.starts.len(),
            open_parents = active.len(),
            "nesting computed"
        );
        self.emit(StoreEvent::ContentChanged);
        self.emit(StoreEvent::HeightChanged);
    }

    /// Returns false if intervals were inserted since the last
    /// [`compute_nesting`](Self::compute_nesting).
    #[must_use]
    pub fn is_nesting_current(&self) -> bool {
        self.nesting_current
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of intervals, complete or not.
    #[must_use]
    pub fn count(&self) -> usize {
        self.starts.len()
    }

    /// Returns true if the store holds no intervals.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Number of entries in the end index.
    #[must_use]
    pub fn ended_count(&self) -> usize {
        self.ends.len()
    }

    /// Number of intervals started with [`insert_start`](Self::insert_start) and not
    /// completed yet.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.starts.len() - self.ends.len()
    }

    /// Returns true if the interval at `index` still waits for its end.
    #[must_use]
    pub fn is_pending(&self, index: usize) -> bool {
        !self.slots[self.starts[index].slot].ended
    }

    /// The interval at `index`.
    #[must_use]
    pub fn interval(&self, index: usize) -> Interval {
        self.interval_of(self.starts[index])
    }

    /// Start time of the interval at `index`.
    #[must_use]
    pub fn start_time(&self, index: usize) -> i64 {
        self.interval(index).start
    }

    /// End time of the interval at `index`.
    #[must_use]
    pub fn end_time(&self, index: usize) -> i64 {
        self.interval(index).end()
    }

    /// Duration of the interval at `index`.
    #[must_use]
    pub fn duration(&self, index: usize) -> i64 {
        self.interval(index).duration
    }

    /// Selection group of the interval at `index`.
    #[must_use]
    pub fn selection_id(&self, index: usize) -> i32 {
        self.interval(index).selection_id
    }

    /// Position of the parent of the interval at `index`, as of the last nesting pass.
    #[must_use]
    pub fn parent_index(&self, index: usize) -> Option<usize> {
        self.slots[self.starts[index].slot]
            .parent
            .and_then(|parent| self.index_of(parent))
    }

    /// Handle of the interval at `index`.
    #[must_use]
    pub fn id_at(&self, index: usize) -> Option<IntervalId> {
        self.starts.get(index).copied()
    }

    /// Current position of the interval behind `id`.
    #[must_use]
    pub fn index_of(&self, id: IntervalId) -> Option<usize> {
        let start = self.slot(id)?.interval.start;
        let first = self
            .starts
            .partition_point(|&other| self.interval_of(other).start < start);
        self.starts[first..]
            .iter()
            .take_while(|&&other| self.interval_of(other).start == start)
            .position(|&other| other == id)
            .map(|offset| first + offset)
    }

    /// The interval behind `id`, or `None` for a stale handle.
    #[must_use]
    pub fn get(&self, id: IntervalId) -> Option<Interval> {
        self.slot(id).map(|slot| slot.interval)
    }

    /// Intervals in start order.
    pub fn iter(&self) -> impl Iterator<Item = Interval> + '_ {
        self.starts.iter().map(|&id| self.interval_of(id))
    }

    fn slot(&self, id: IntervalId) -> Option<&Slot> {
        if id.generation != self.generation {
            return None;
        }
        self.slots.get(id.slot)
    }

    fn interval_of(&self, id: IntervalId) -> Interval {
        self.slots[id.slot].interval
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Position of the interval with the lowest end strictly after `time`.
    #[must_use]
    pub fn first_index_no_parents(&self, time: i64) -> Option<usize> {
        let found = self.ends.partition_point(|entry| entry.end <= time);
        self.ends
            .get(found)
            .and_then(|entry| self.index_of(entry.id))
    }

    /// Like [`first_index_no_parents`](Self::first_index_no_parents), resolved to the
    /// match's parent if it has one.
    #[must_use]
    pub fn first_index(&self, time: i64) -> Option<usize> {
        let index = self.first_index_no_parents(time)?;
        Some(self.parent_index(index).unwrap_or(index))
    }

    /// Position of the last interval starting strictly before `time`.
    #[must_use]
    pub fn last_index(&self, time: i64) -> Option<usize> {
        self.starts
            .partition_point(|&id| self.interval_of(id).start < time)
            .checked_sub(1)
    }

    /// Rough position of the interval around `time`.
    ///
    /// Averages the start-index and end-index positions for `time`. Close to the
    /// right answer, not guaranteed to be it.
    #[must_use]
    pub fn best_index(&self, time: i64) -> Option<usize> {
        if self.starts.is_empty() {
            return None;
        }
        let start = self
            .starts
            .partition_point(|&id| self.interval_of(id).start < time)
            .saturating_sub(1);
        if self.ends.is_empty() {
            return Some(start);
        }
        let end_entry = self
            .ends
            .partition_point(|entry| entry.end < time)
            .min(self.ends.len() - 1);
        let end = self.index_of(self.ends[end_entry].id).unwrap_or(start);
        Some((start + end) / 2)
    }

    /// First position after `current` satisfying `matches`, wrapping around once.
    ///
    /// Without a current position the scan starts at the first interval ending after
    /// `time`.
    pub fn next_item_matching(
        &self,
        mut matches: impl FnMut(usize) -> bool,
        time: i64,
        current: Option<usize>,
    ) -> Option<usize> {
        let count = self.count();
        if count == 0 {
            return None;
        }
        let first = match current {
            Some(index) => Some(index + 1),
            None => self.first_index_no_parents(time),
        }
        .filter(|&index| index < count)
        .unwrap_or(0);

        let mut index = first;
        loop {
            if matches(index) {
                return Some(index);
            }
            index = (index + 1) % count;
            if index == first {
                trace!(model = %self.model_id, "no next item matches");
                return None;
            }
        }
    }

    /// Last position before `current` satisfying `matches`, wrapping around once.
    pub fn prev_item_matching(
        &self,
        mut matches: impl FnMut(usize) -> bool,
        time: i64,
        current: Option<usize>,
    ) -> Option<usize> {
        let count = self.count();
        if count == 0 {
            return None;
        }
        let first = match current {
            Some(index) => index.checked_sub(1),
            None => self.first_index_no_parents(time),
        }
        .filter(|&index| index < count)
        .unwrap_or(count - 1);

        let mut index = first;
        loop {
            if matches(index) {
                return Some(index);
            }
            index = index.checked_sub(1).unwrap_or(count - 1);
            if index == first {
                trace!(model = %self.model_id, "no previous item matches");
                return None;
            }
        }
    }

    /// Next interval in `selection_id`'s group.
    #[must_use]
    pub fn next_item_by_selection_id(
        &self,
        selection_id: i32,
        time: i64,
        current: Option<usize>,
    ) -> Option<usize> {
        self.next_item_matching(|index| self.selection_id(index) == selection_id, time, current)
    }

    /// Previous interval in `selection_id`'s group.
    #[must_use]
    pub fn prev_item_by_selection_id(
        &self,
        selection_id: i32,
        time: i64,
        current: Option<usize>,
    ) -> Option<usize> {
        self.prev_item_matching(|index| self.selection_id(index) == selection_id, time, current)
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Id handed out when the store was created.
    #[must_use]
    pub fn model_id(&self) -> ModelId {
        self.model_id
    }

    /// Name shown in the row header.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Sets the name shown in the row header.
    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = name.into();
    }

    /// Tooltip for the row header.
    #[must_use]
    pub fn tooltip(&self) -> &str {
        &self.tooltip
    }

    /// Sets the tooltip for the row header.
    pub fn set_tooltip(&mut self, tooltip: impl Into<String>) {
        self.tooltip = tooltip.into();
    }

    /// Returns true if rows are shown individually.
    #[must_use]
    pub fn expanded(&self) -> bool {
        self.expanded
    }

    /// Expands or collapses the store.
    pub fn set_expanded(&mut self, expanded: bool) {
        if self.expanded != expanded {
            self.expanded = expanded;
            self.emit(StoreEvent::ExpandedChanged);
            self.emit(StoreEvent::HeightChanged);
        }
    }

    /// Returns true if the store takes no vertical space.
    #[must_use]
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Hides or shows the store.
    pub fn set_hidden(&mut self, hidden: bool) {
        if self.hidden != hidden {
            self.hidden = hidden;
            self.emit(StoreEvent::HiddenChanged);
            self.emit(StoreEvent::HeightChanged);
        }
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// The row layout.
    #[must_use]
    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// Number of rows in the current mode.
    #[must_use]
    pub fn row_count(&self) -> usize {
        if self.expanded {
            self.layout.expanded_row_count()
        } else {
            self.layout.collapsed_row_count()
        }
    }

    /// Number of rows while expanded.
    #[must_use]
    pub fn expanded_row_count(&self) -> usize {
        self.layout.expanded_row_count()
    }

    /// Sets the number of rows while expanded.
    pub fn set_expanded_row_count(&mut self, rows: usize) {
        if self.layout.expanded_row_count() != rows {
            self.layout.set_expanded_row_count(rows);
            if self.expanded {
                self.emit(StoreEvent::HeightChanged);
            }
        }
    }

    /// Number of rows while collapsed.
    #[must_use]
    pub fn collapsed_row_count(&self) -> usize {
        self.layout.collapsed_row_count()
    }

    /// Sets the number of rows while collapsed.
    pub fn set_collapsed_row_count(&mut self, rows: usize) {
        if self.layout.collapsed_row_count() != rows {
            self.layout.set_collapsed_row_count(rows);
            if !self.expanded {
                self.emit(StoreEvent::HeightChanged);
            }
        }
    }

    /// Top offset of `row` in the current mode.
    #[must_use]
    pub fn row_offset(&self, row: usize) -> i32 {
        if self.expanded {
            self.layout.expanded_row_offset(row)
        } else {
            self.layout.collapsed_row_offset(row)
        }
    }

    /// Height of `row` in the current mode.
    #[must_use]
    pub fn row_height(&self, row: usize) -> i32 {
        if self.expanded {
            self.layout.expanded_row_height(row)
        } else {
            self.layout.collapsed_row_height(row)
        }
    }

    /// Resizes an expanded row.
    pub fn set_expanded_row_height(&mut self, row: usize, height: i32) {
        if self.layout.set_expanded_row_height(row, height) {
            self.emit(StoreEvent::HeightChanged);
        }
    }

    /// Rendered height; zero while hidden or empty.
    #[must_use]
    pub fn height(&self) -> i32 {
        if self.hidden || self.is_empty() {
            0
        } else {
            self.layout.height(self.expanded)
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Drops all intervals and resets rows and display state.
    ///
    /// Handles taken before the call no longer resolve.
    pub fn clear(&mut self) {
        self.layout.reset();
        self.set_expanded(false);
        self.set_hidden(false);
        self.slots.clear();
        self.starts.clear();
        self.ends.clear();
        self.generation = self.generation.wrapping_add(1);
        self.nesting_current = true;
        self.emit(StoreEvent::ContentChanged);
        self.emit(StoreEvent::HeightChanged);
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        self.subscribers.subscribe()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn emit(&mut self, event: StoreEvent) {
        self.subscribers.emit(event);
    }
}

impl fmt::Debug for IntervalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalStore")
            .field("model_id", &self.model_id)
            .field("display_name", &self.display_name)
            .field("count", &self.count())
            .field("pending", &self.pending_count())
            .field("expanded", &self.expanded)
            .field("hidden", &self.hidden)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DEFAULT_ROW_HEIGHT;

    fn store() -> IntervalStore {
        IntervalStore::new(ModelId::new(0))
    }

    /// `(0,10,1)`, `(2,3,2)`, `(5,1,3)` with nesting computed.
    fn nested_store() -> IntervalStore {
        let mut store = store();
        assert_eq!(store.insert(0, 10, 1), 0);
        assert_eq!(store.insert(2, 3, 2), 1);
        assert_eq!(store.insert(5, 1, 3), 2);
        store.compute_nesting();
        store
    }

    fn drain(rx: &Receiver<StoreEvent>) -> Vec<StoreEvent> {
        rx.try_iter().collect()
    }

    // ==================== Insertion ====================

    #[test]
    fn chronological_inserts_nest_under_the_enclosing_interval() {
        let store = nested_store();
        assert_eq!(store.parent_index(0), None);
        assert_eq!(store.parent_index(1), Some(0));
        assert_eq!(store.parent_index(2), Some(0));
        assert_eq!(store.count(), store.ended_count());
    }

    #[test]
    fn out_of_order_insert_lands_in_start_order() {
        let mut store = store();
        store.insert(10, 1, 0);
        store.insert(20, 1, 0);
        assert_eq!(store.insert(15, 1, 0), 1);
        assert_eq!(store.insert(0, 1, 0), 0);

        let starts: Vec<i64> = store.iter().map(|interval| interval.start).collect();
        assert_eq!(starts, vec![0, 10, 15, 20]);
    }

    #[test]
    fn equal_starts_put_longer_intervals_first() {
        let mut store = store();
        assert_eq!(store.insert(5, 2, 1), 0);
        assert_eq!(store.insert(5, 8, 2), 0);
        assert_eq!(store.insert(5, 2, 3), 2);

        assert_eq!(store.selection_id(0), 2);
        assert_eq!(store.selection_id(1), 1);
        assert_eq!(store.selection_id(2), 3);
    }

    #[test]
    fn handles_survive_inserts_in_front() {
        let mut store = store();
        store.insert(10, 5, 1);
        let id = store.id_at(0).unwrap();

        store.insert(0, 1, 2);
        store.insert(5, 1, 3);
        assert_eq!(store.index_of(id), Some(2));
        assert_eq!(store.get(id), Some(Interval::new(10, 5, 1)));
    }

    #[test]
    fn two_phase_insert() {
        let mut store = store();
        let index = store.insert_start(4, 7);
        assert_eq!(store.pending_count(), 1);
        assert!(store.is_pending(index));
        assert_eq!(store.duration(index), 0);
        assert_eq!(store.first_index_no_parents(0), None);

        store.insert_end(index, 6);
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.end_time(index), 10);
        assert_eq!(store.first_index_no_parents(9), Some(0));
    }

    #[test]
    fn completing_twice_replaces_the_end() {
        let mut store = store();
        let index = store.insert_start(0, 1);
        store.insert_end(index, 5);
        store.insert_end(index, 20);

        assert_eq!(store.ended_count(), 1);
        assert_eq!(store.first_index_no_parents(10), Some(0));
    }

    #[test]
    fn insert_end_by_id_rejects_stale_handles() {
        let mut store = store();
        store.insert_start(0, 1);
        let id = store.id_at(0).unwrap();
        store.clear();

        assert!(!store.insert_end_by_id(id, 3));
        assert_eq!(store.get(id), None);
        assert_eq!(store.index_of(id), None);
    }

    #[test]
    fn ends_past_the_time_range_saturate() {
        let mut store = store();
        store.insert(0, 10, 1);
        assert_eq!(store.insert(i64::MAX - 1, 5, 2), 1);
        let pending = store.insert_start(i64::MAX - 2, 3);
        assert_eq!(pending, 1);
        store.insert_end(pending, i64::MAX);
        store.compute_nesting();

        assert_eq!(store.end_time(1), i64::MAX);
        assert_eq!(store.end_time(2), i64::MAX);
        assert_eq!(store.first_index_no_parents(10), Some(2));
        assert_eq!(store.first_index(10), Some(1));
        assert_eq!(store.first_index_no_parents(i64::MAX), None);
        assert_eq!(store.parent_index(2), Some(1));
    }

    #[test]
    fn insertion_marks_nesting_stale() {
        let mut store = nested_store();
        assert!(store.is_nesting_current());
        store.insert(7, 1, 4);
        assert!(!store.is_nesting_current());
        store.compute_nesting();
        assert!(store.is_nesting_current());
    }

    // ==================== Nesting ====================

    #[test]
    fn same_start_tie_parents_the_lower_index() {
        let mut store = store();
        let short = store.insert_start(0, 1);
        let long = store.insert_start(0, 2);
        assert_eq!((short, long), (0, 1));
        store.insert_end(short, 5);
        store.insert_end(long, 10);
        store.compute_nesting();

        // The shorter interval keeps the lower index and becomes the parent.
        assert_eq!(store.parent_index(1), Some(0));
        assert_eq!(store.first_index(7), Some(0));
        assert_eq!(store.first_index_no_parents(7), Some(1));
    }

    #[test]
    fn overlapping_intervals_drop_out_of_the_active_list() {
        let mut store = store();
        for (start, duration) in [(0, 10), (5, 10), (12, 10), (16, 2), (17, 1), (30, 1)] {
            store.insert(start, duration, 0);
        }
        store.compute_nesting();

        let parents: Vec<Option<usize>> =
            (0..store.count()).map(|i| store.parent_index(i)).collect();
        assert_eq!(parents, vec![None, None, None, Some(2), Some(2), None]);
    }

    #[test]
    fn deep_nesting_flattens_to_the_outermost_parent() {
        let mut store = store();
        store.insert(0, 100, 0);
        store.insert(10, 50, 0);
        store.insert(20, 10, 0);
        store.compute_nesting();

        assert_eq!(store.parent_index(1), Some(0));
        assert_eq!(store.parent_index(2), Some(0));
    }

    #[test]
    fn disjoint_intervals_are_top_level() {
        let mut store = store();
        store.insert(0, 5, 0);
        store.insert(10, 5, 0);
        store.insert(12, 10, 0);
        store.compute_nesting();

        assert_eq!(store.parent_index(0), None);
        assert_eq!(store.parent_index(1), None);
        assert_eq!(store.parent_index(2), None);
    }

    // ==================== Search ====================

    #[test]
    fn first_index_resolves_through_the_parent() {
        let store = nested_store();
        assert_eq!(store.first_index(6), Some(0));
        assert_eq!(store.first_index_no_parents(6), Some(0));
        assert_eq!(store.first_index_no_parents(4), Some(1));
        assert_eq!(store.first_index(4), Some(0));
        assert_eq!(store.first_index_no_parents(10), None);
    }

    #[test]
    fn last_index_is_strictly_before() {
        let store = nested_store();
        assert_eq!(store.last_index(0), None);
        assert_eq!(store.last_index(1), Some(0));
        assert_eq!(store.last_index(5), Some(1));
        assert_eq!(store.last_index(6), Some(2));
        assert_eq!(store.last_index(100), Some(2));
    }

    #[test]
    fn best_index_stays_near_the_time() {
        let store = nested_store();
        assert_eq!(store.best_index(6), Some(2));
        assert_eq!(store.best_index(-5), Some(0));
        assert_eq!(store.best_index(1000), Some(1));
    }

    #[test]
    fn best_index_without_ends_uses_the_start_search() {
        let mut store = store();
        store.insert_start(0, 1);
        store.insert_start(10, 1);
        assert_eq!(store.best_index(20), Some(1));
    }

    #[test]
    fn empty_store_finds_nothing() {
        let store = store();
        assert_eq!(store.first_index(0), None);
        assert_eq!(store.first_index_no_parents(0), None);
        assert_eq!(store.last_index(0), None);
        assert_eq!(store.best_index(0), None);
        assert_eq!(store.next_item_by_selection_id(1, 0, None), None);
        assert_eq!(store.prev_item_by_selection_id(1, 0, None), None);
    }

    #[test]
    fn next_item_wraps_around() {
        let mut store = nested_store();
        store.insert(12, 2, 2);

        assert_eq!(store.next_item_by_selection_id(2, 0, None), Some(1));
        assert_eq!(store.next_item_by_selection_id(2, 0, Some(1)), Some(3));
        assert_eq!(store.next_item_by_selection_id(2, 0, Some(3)), Some(1));
        assert_eq!(store.next_item_by_selection_id(9, 0, None), None);
    }

    #[test]
    fn prev_item_wraps_around() {
        let mut store = nested_store();
        store.insert(12, 2, 2);

        assert_eq!(store.prev_item_by_selection_id(2, 0, Some(3)), Some(1));
        assert_eq!(store.prev_item_by_selection_id(2, 0, Some(1)), Some(3));
        assert_eq!(store.prev_item_by_selection_id(2, 0, None), Some(1));
        assert_eq!(store.prev_item_by_selection_id(9, 0, Some(2)), None);
    }

    #[test]
    fn matching_visits_every_item_once() {
        let store = nested_store();
        let mut visited = Vec::new();
        let found = store.next_item_matching(
            |index| {
                visited.push(index);
                false
            },
            0,
            Some(0),
        );
        assert_eq!(found, None);
        assert_eq!(visited, vec![1, 2, 0]);
    }

    // ==================== Rows and events ====================

    #[test]
    fn height_is_zero_when_hidden_or_empty() {
        let mut store = store();
        assert_eq!(store.height(), 0);

        store.insert(0, 1, 0);
        assert_eq!(store.height(), DEFAULT_ROW_HEIGHT);

        store.set_hidden(true);
        assert_eq!(store.height(), 0);
    }

    #[test]
    fn rows_follow_the_mode() {
        let mut store = store();
        store.insert(0, 1, 0);
        store.set_collapsed_row_count(2);
        store.set_expanded_row_count(3);
        store.set_expanded_row_height(1, 60);

        assert_eq!(store.row_count(), 2);
        assert_eq!(store.row_height(1), DEFAULT_ROW_HEIGHT);
        assert_eq!(store.height(), 2 * DEFAULT_ROW_HEIGHT);

        store.set_expanded(true);
        assert_eq!(store.row_count(), 3);
        assert_eq!(store.row_height(1), 60);
        assert_eq!(store.row_offset(2), 90);
        assert_eq!(store.height(), 120);
    }

    #[test]
    fn display_changes_are_announced() {
        let mut store = store();
        let events = store.subscribe();

        store.set_expanded(true);
        store.set_expanded(true);
        store.set_hidden(true);
        assert_eq!(
            drain(&events),
            vec![
                StoreEvent::ExpandedChanged,
                StoreEvent::HeightChanged,
                StoreEvent::HiddenChanged,
                StoreEvent::HeightChanged,
            ]
        );

        store.set_expanded_row_height(0, 50);
        store.set_expanded_row_height(0, 50);
        assert_eq!(drain(&events), vec![StoreEvent::HeightChanged]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut store = nested_store();
        store.set_expanded(true);
        store.set_expanded_row_count(4);
        let events = store.subscribe();

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.ended_count(), 0);
        assert!(!store.expanded());
        assert_eq!(store.expanded_row_count(), 1);
        assert_eq!(
            drain(&events),
            vec![
                StoreEvent::ExpandedChanged,
                StoreEvent::HeightChanged,
                StoreEvent::ContentChanged,
                StoreEvent::HeightChanged,
            ]
        );

        assert_eq!(store.insert(3, 1, 0), 0);
    }

    #[test]
    fn metadata() {
        let mut store = IntervalStore::new(ModelId::new(7));
        store.set_display_name("Animations");
        store.set_tooltip("frame timings");
        assert_eq!(store.model_id(), ModelId::new(7));
        assert_eq!(store.display_name(), "Animations");
        assert_eq!(store.tooltip(), "frame timings");
        assert!(format!("{store:?}").contains("Animations"));
    }
}
