//! Timeline command implementation.

use super::{print, CommandResult, OutputFormat};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tessera_timeline::{read_trace, IntervalStore, ModelId};

/// Summary of a loaded trace.
#[derive(Debug, Serialize)]
pub struct TimelineReport {
    /// Trace file path.
    pub trace: String,
    /// Number of intervals.
    pub intervals: usize,
    /// Intervals without a parent.
    pub top_level: usize,
    /// Earliest start time.
    pub first_start: Option<i64>,
    /// Latest end time.
    pub last_end: Option<i64>,
    /// Interval count per selection group.
    pub selections: BTreeMap<i32, usize>,
    /// Searches at a point in time, if one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<TimeQuery>,
}

/// Search results at one point in time.
#[derive(Debug, Serialize)]
pub struct TimeQuery {
    /// Time searched at.
    pub at: i64,
    /// First interval ending after `at`, resolved to its parent.
    pub first_index: Option<usize>,
    /// First interval ending after `at`.
    pub first_index_no_parents: Option<usize>,
    /// Last interval starting before `at`.
    pub last_index: Option<usize>,
    /// Estimated interval around `at`.
    pub best_index: Option<usize>,
    /// Next interval of the requested selection group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_in_selection: Option<ItemSummary>,
    /// Previous interval of the requested selection group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_in_selection: Option<ItemSummary>,
}

/// One interval.
#[derive(Debug, Serialize)]
pub struct ItemSummary {
    /// Position in start order.
    pub index: usize,
    /// Start time.
    pub start: i64,
    /// Duration.
    pub duration: i64,
    /// Selection group.
    pub selection_id: i32,
    /// Position of the parent interval.
    pub parent: Option<usize>,
}

impl ItemSummary {
    fn new(store: &IntervalStore, index: usize) -> Self {
        let interval = store.interval(index);
        Self {
            index,
            start: interval.start,
            duration: interval.duration,
            selection_id: interval.selection_id,
            parent: store.parent_index(index),
        }
    }
}

/// Runs the timeline command.
pub fn run(
    trace: &Path,
    at: Option<i64>,
    selection: Option<i32>,
    format: OutputFormat,
) -> CommandResult {
    let report = analyze(trace, at, selection)?;
    print(&report, format, print_report)
}

/// Loads `trace` and runs the requested searches.
pub fn analyze(trace: &Path, at: Option<i64>, selection: Option<i32>) -> CommandResult<TimelineReport> {
    let mut store = IntervalStore::new(ModelId::new(0));
    if let Some(name) = trace.file_name() {
        store.set_display_name(name.to_string_lossy());
    }
    read_trace(trace, &mut store)?;

    let mut selections = BTreeMap::new();
    for interval in store.iter() {
        *selections.entry(interval.selection_id).or_insert(0) += 1;
    }

    let query = (at.is_some() || selection.is_some()).then(|| {
        let at = at.unwrap_or(0);
        let item = |index: Option<usize>| index.map(|index| ItemSummary::new(&store, index));
        TimeQuery {
            at,
            first_index: store.first_index(at),
            first_index_no_parents: store.first_index_no_parents(at),
            last_index: store.last_index(at),
            best_index: store.best_index(at),
            next_in_selection: selection
                .and_then(|id| item(store.next_item_by_selection_id(id, at, None))),
            prev_in_selection: selection
                .and_then(|id| item(store.prev_item_by_selection_id(id, at, None))),
        }
    });

    Ok(TimelineReport {
        trace: trace.display().to_string(),
        intervals: store.count(),
        top_level: (0..store.count())
            .filter(|&index| store.parent_index(index).is_none())
            .count(),
        first_start: store.iter().map(|interval| interval.start).min(),
        last_end: store.iter().map(|interval| interval.end()).max(),
        selections,
        query,
    })
}

fn print_report(report: &TimelineReport) {
    println!("Trace: {}", report.trace);
    println!("  Intervals: {} ({} top level)", report.intervals, report.top_level);
    if let (Some(first), Some(last)) = (report.first_start, report.last_end) {
        println!("  Span:      {first} .. {last}");
    }
    for (selection, count) in &report.selections {
        println!("  Selection {selection}: {count}");
    }

    let Some(query) = &report.query else {
        return;
    };
    let show = |index: Option<usize>| index.map_or_else(|| "-".to_string(), |i| i.to_string());
    println!("At {}:", query.at);
    println!("  first index:            {}", show(query.first_index));
    println!("  first index (no parents): {}", show(query.first_index_no_parents));
    println!("  last index:             {}", show(query.last_index));
    println!("  best index:             {}", show(query.best_index));
    for (label, item) in [
        ("next", &query.next_in_selection),
        ("previous", &query.prev_in_selection),
    ] {
        if let Some(item) = item {
            println!(
                "  {label} in selection: #{} start {} duration {}",
                item.index, item.start, item.duration
            );
        }
    }
}
