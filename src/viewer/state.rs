//! Viewer state: terminal layout and the scrolled item grid.

use crate::config::{MAX_COLUMNS, MIN_COLUMNS};

/// Terminal lines per grid row: id, url, gap.
pub(super) const ROW_HEIGHT: u16 = 3;

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Layout {
    pub term_cols: u16,
    pub grid_lines: u16, // 画像グリッド領域の高さ (= term_rows - 1)
    pub status_row: u16, // ステータスバーの行 (= term_rows - 1)
}

impl Layout {
    /// Grid rows that fit on screen (at least 1).
    pub(super) fn visible_rows(&self) -> usize {
        ((self.grid_lines / ROW_HEIGHT) as usize).max(1)
    }
}

pub(super) fn compute_layout(term_cols: u16, term_rows: u16) -> Layout {
    Layout {
        term_cols,
        grid_lines: term_rows.saturating_sub(1),
        status_row: term_rows.saturating_sub(1),
    }
}

// ---------------------------------------------------------------------------
// GridView
// ---------------------------------------------------------------------------

/// Selection and scroll position over the item grid, in grid rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct GridView {
    pub columns: u16,
    pub scroll_row: usize,
    pub selected: usize,
}

impl GridView {
    pub(super) fn new(columns: u16) -> Self {
        Self {
            columns: columns.clamp(MIN_COLUMNS, MAX_COLUMNS),
            scroll_row: 0,
            selected: 0,
        }
    }

    fn cols(&self) -> usize {
        self.columns as usize
    }

    pub(super) fn row_count(&self, len: usize) -> usize {
        len.div_ceil(self.cols())
    }

    pub(super) fn row_of(&self, idx: usize) -> usize {
        idx / self.cols()
    }

    /// Whether the last item's row lies inside the scrolled window.
    pub(super) fn last_item_visible(&self, len: usize, visible_rows: usize) -> bool {
        if len == 0 {
            return false;
        }
        let last_row = self.row_of(len - 1);
        (self.scroll_row..self.scroll_row + visible_rows).contains(&last_row)
    }

    /// Clamp selection to `len` and scroll so the selected row is visible.
    pub(super) fn settle(&mut self, len: usize, visible_rows: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
        let row = self.row_of(self.selected);
        if row < self.scroll_row {
            self.scroll_row = row;
        } else if row >= self.scroll_row + visible_rows {
            self.scroll_row = row + 1 - visible_rows;
        }
        let max_scroll = self.row_count(len).saturating_sub(visible_rows);
        self.scroll_row = self.scroll_row.min(max_scroll);
    }

    pub(super) fn set_columns(&mut self, columns: u16) {
        self.columns = columns.clamp(MIN_COLUMNS, MAX_COLUMNS);
    }

    /// Back to the top, used when the result set was reset.
    pub(super) fn reset(&mut self) {
        self.scroll_row = 0;
        self.selected = 0;
    }
}

/// Why a viewer session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ExitReason {
    Quit,
    SwitchLibrary(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_reserves_status_row() {
        let layout = compute_layout(120, 31);
        assert_eq!(layout.status_row, 30);
        assert_eq!(layout.grid_lines, 30);
        assert_eq!(layout.visible_rows(), 10);
    }

    #[test]
    fn tiny_terminal_still_shows_a_row() {
        assert_eq!(compute_layout(10, 2).visible_rows(), 1);
    }

    #[test]
    fn row_math() {
        let grid = GridView::new(4);
        assert_eq!(grid.row_count(0), 0);
        assert_eq!(grid.row_count(4), 1);
        assert_eq!(grid.row_count(5), 2);
        assert_eq!(grid.row_of(7), 1);
    }

    #[test]
    fn last_item_visibility() {
        let mut grid = GridView::new(4);
        assert!(!grid.last_item_visible(0, 5));
        // 20 items = 5 rows, all visible
        assert!(grid.last_item_visible(20, 5));
        // 40 items = 10 rows, only rows 0..5 visible
        assert!(!grid.last_item_visible(40, 5));
        grid.scroll_row = 5;
        assert!(grid.last_item_visible(40, 5));
    }

    #[test]
    fn settle_scrolls_to_selection() {
        let mut grid = GridView::new(4);
        grid.selected = 30; // row 7
        grid.settle(40, 5);
        assert_eq!(grid.scroll_row, 3);
        grid.selected = 2;
        grid.settle(40, 5);
        assert_eq!(grid.scroll_row, 0);
    }

    #[test]
    fn settle_clamps_selection() {
        let mut grid = GridView::new(4);
        grid.selected = 100;
        grid.settle(10, 5);
        assert_eq!(grid.selected, 9);
        grid.settle(0, 5);
        assert_eq!(grid.selected, 0);
        assert_eq!(grid.scroll_row, 0);
    }

    #[test]
    fn columns_clamped() {
        let mut grid = GridView::new(0);
        assert_eq!(grid.columns, MIN_COLUMNS);
        grid.set_columns(50);
        assert_eq!(grid.columns, MAX_COLUMNS);
    }
}
