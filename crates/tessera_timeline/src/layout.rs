//! Row layout of a store.
//!
//! A store is drawn as a number of rows. Collapsed, every row has the default
//! height. Expanded, rows can be made taller individually; the layout keeps the
//! cumulative bottom offset of each row that was ever sized, and rows past the last
//! sized one fall back to the default height.

/// Height of a row that was never resized.
pub const DEFAULT_ROW_HEIGHT: i32 = 30;

/// Row counts and expanded row offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    expanded_row_count: usize,
    collapsed_row_count: usize,
    /// Bottom offset of each sized row, ascending.
    row_offsets: Vec<i32>,
}

impl Default for RowLayout {
    fn default() -> Self {
        Self {
            expanded_row_count: 1,
            collapsed_row_count: 1,
            row_offsets: Vec::new(),
        }
    }
}

impl RowLayout {
    /// Creates a layout with one row in each mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows while expanded.
    #[must_use]
    pub fn expanded_row_count(&self) -> usize {
        self.expanded_row_count
    }

    /// Number of rows while collapsed.
    #[must_use]
    pub fn collapsed_row_count(&self) -> usize {
        self.collapsed_row_count
    }

    /// Sets the expanded row count, forgetting sizes of rows beyond it.
    pub fn set_expanded_row_count(&mut self, rows: usize) {
        if self.expanded_row_count != rows {
            self.row_offsets.truncate(rows);
            self.expanded_row_count = rows;
        }
    }

    /// Sets the collapsed row count.
    pub fn set_collapsed_row_count(&mut self, rows: usize) {
        self.collapsed_row_count = rows;
    }

    /// Height of a collapsed row.
    #[must_use]
    pub fn collapsed_row_height(&self, _row: usize) -> i32 {
        DEFAULT_ROW_HEIGHT
    }

    /// Top offset of a collapsed row.
    #[must_use]
    pub fn collapsed_row_offset(&self, row: usize) -> i32 {
        rows_to_pixels(row)
    }

    /// Height of an expanded row.
    #[must_use]
    pub fn expanded_row_height(&self, row: usize) -> i32 {
        match self.row_offsets.get(row) {
            Some(bottom) => bottom - self.expanded_row_offset(row),
            None => DEFAULT_ROW_HEIGHT,
        }
    }

    /// Top offset of an expanded row.
    #[must_use]
    pub fn expanded_row_offset(&self, row: usize) -> i32 {
        if row == 0 {
            return 0;
        }
        let sized = self.row_offsets.len();
        if sized >= row {
            self.row_offsets[row - 1]
        } else if let Some(last) = self.row_offsets.last() {
            last + rows_to_pixels(row - sized)
        } else {
            rows_to_pixels(row)
        }
    }

    /// Resizes an expanded row. Heights below [`DEFAULT_ROW_HEIGHT`] are raised to it.
    ///
    /// Returns true if the layout changed.
    pub fn set_expanded_row_height(&mut self, row: usize, height: i32) -> bool {
        let height = height.max(DEFAULT_ROW_HEIGHT);

        let mut next_offset = self.row_offsets.last().copied().unwrap_or(0);
        while self.row_offsets.len() <= row {
            next_offset += DEFAULT_ROW_HEIGHT;
            self.row_offsets.push(next_offset);
        }

        let top = if row > 0 { self.row_offsets[row - 1] } else { 0 };
        let difference = height - (self.row_offsets[row] - top);
        if difference == 0 {
            return false;
        }
        for offset in &mut self.row_offsets[row..] {
            *offset += difference;
        }
        true
    }

    /// Total height in the given mode, ignoring whether the store is hidden or empty.
    #[must_use]
    pub fn height(&self, expanded: bool) -> i32 {
        if !expanded {
            return rows_to_pixels(self.collapsed_row_count);
        }
        match self.row_offsets.last() {
            None => rows_to_pixels(self.expanded_row_count),
            Some(last) => {
                let unsized_rows = to_i32(self.expanded_row_count) - to_i32(self.row_offsets.len());
                last + unsized_rows * DEFAULT_ROW_HEIGHT
            }
        }
    }

    /// Resets to one row in each mode with no sized rows.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn rows_to_pixels(rows: usize) -> i32 {
    to_i32(rows).saturating_mul(DEFAULT_ROW_HEIGHT)
}
