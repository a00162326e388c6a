//! Grid state for the result surface.
//!
//! `GridModel` owns everything the grid view needs besides the rows
//! themselves: viewport geometry, the cached visible window, column layout,
//! and the row detail selection. It reads the store and never mutates it.

use quarry_core::GridConfig;

use super::columns::ColumnLayout;
use super::window::{visible_window, VisibleWindow};
use crate::pagination::ResultStore;

/// Placeholder shown before any query has run.
pub const NO_QUERY_MESSAGE: &str = "Run a query to see results here";

/// Placeholder shown when a query returned no rows.
pub const NO_ROWS_MESSAGE: &str = "No records found";

// =============================================================================
// Grid View State
// =============================================================================

/// What the result surface should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridView {
    /// A run is outstanding.
    Loading,
    /// No header: nothing has run.
    EmptyNoQuery,
    /// Header but no rows.
    EmptyNoRows,
    /// Rows to virtualize.
    Populated { show_load_more: bool },
}

impl GridView {
    /// Placeholder text for the empty states.
    pub fn placeholder(self) -> Option<&'static str> {
        match self {
            GridView::EmptyNoQuery => Some(NO_QUERY_MESSAGE),
            GridView::EmptyNoRows => Some(NO_ROWS_MESSAGE),
            _ => None,
        }
    }
}

/// Key/value view of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDetail {
    /// 1-based row number as shown in the `#` column.
    pub row_number: usize,
    /// `(header[i], row[i])` pairs in column order.
    pub fields: Vec<(String, String)>,
}

// =============================================================================
// Grid Model
// =============================================================================

/// Virtualization, layout, and detail state of the result grid.
#[derive(Debug)]
pub struct GridModel {
    config: GridConfig,
    layout: ColumnLayout,
    scroll_top: f32,
    viewport_width: f32,
    viewport_height: f32,
    row_count: usize,
    window: VisibleWindow,
    /// Store generation the cached state belongs to.
    generation: u64,
    detail: Option<usize>,
}

impl GridModel {
    pub fn new(config: GridConfig) -> Self {
        let layout = ColumnLayout::new(
            config.default_column_width,
            config.min_column_width,
            config.index_column_width,
        );
        Self {
            config,
            layout,
            scroll_top: 0.0,
            viewport_width: 0.0,
            viewport_height: 0.0,
            row_count: 0,
            window: VisibleWindow::default(),
            generation: 0,
            detail: None,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut ColumnLayout {
        &mut self.layout
    }

    pub fn window(&self) -> VisibleWindow {
        self.window
    }

    pub fn scroll_top(&self) -> f32 {
        self.scroll_top
    }

    pub fn viewport_width(&self) -> f32 {
        self.viewport_width
    }

    pub fn row_height(&self) -> f32 {
        self.config.row_height
    }

    /// Total height of all loaded rows.
    pub fn content_height(&self) -> f32 {
        self.row_count as f32 * self.config.row_height
    }

    // -------------------------------------------------------------------------
    // Recompute Triggers
    // -------------------------------------------------------------------------

    /// Scroll event from the host. Returns false when the offset did not move.
    pub fn on_scroll(&mut self, scroll_top: f32) -> bool {
        let scroll_top = scroll_top.max(0.0);
        if scroll_top == self.scroll_top {
            return false;
        }
        self.scroll_top = scroll_top;
        self.recompute();
        true
    }

    /// Observed-size callback from the host.
    pub fn on_resize(&mut self, width: f32, height: f32) {
        self.viewport_width = width.max(0.0);
        self.viewport_height = height.max(0.0);
        self.recompute();
    }

    /// Pick up store changes: replaced rows, appended rows, new header.
    ///
    /// Returns true when the rows were replaced, so the host can scroll to top.
    pub fn sync(&mut self, store: &ResultStore) -> bool {
        let replaced = store.generation() != self.generation;
        if replaced {
            self.generation = store.generation();
            self.detail = None;
            self.scroll_top = 0.0;
            if self.layout.sync_header(store.header()) {
                tracing::debug!(columns = store.header().len(), "Column layout reset");
            }
        }

        let grew = store.row_count() != self.row_count;
        self.row_count = store.row_count();
        if replaced || grew {
            self.recompute();
        }
        replaced
    }

    fn recompute(&mut self) {
        self.window = visible_window(
            self.row_count,
            self.scroll_top,
            self.viewport_height,
            self.config.row_height,
            self.config.overscan,
        );
    }

    // -------------------------------------------------------------------------
    // View State
    // -------------------------------------------------------------------------

    /// Which surface to show.
    pub fn view(&self, loading: bool, store: &ResultStore) -> GridView {
        if loading {
            GridView::Loading
        } else if !store.has_header() {
            GridView::EmptyNoQuery
        } else if store.row_count() == 0 {
            GridView::EmptyNoRows
        } else {
            GridView::Populated {
                show_load_more: store.has_more(),
            }
        }
    }

    /// Whether the window has reached close enough to the loaded end to page.
    pub fn wants_more(&self, store: &ResultStore) -> bool {
        store.has_more()
            && !store.is_loading_more()
            && self.row_count > 0
            && self.window.end + self.config.load_more_threshold >= self.row_count
    }

    // -------------------------------------------------------------------------
    // Row Detail
    // -------------------------------------------------------------------------

    /// Open the detail view for a row of the current result.
    pub fn open_detail(&mut self, row: usize) -> bool {
        if row >= self.row_count {
            return false;
        }
        self.detail = Some(row);
        true
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    pub fn detail_row(&self) -> Option<usize> {
        self.detail
    }

    /// Key/value pairs of the selected row.
    pub fn detail(&self, store: &ResultStore) -> Option<RowDetail> {
        if store.generation() != self.generation {
            return None;
        }
        let index = self.detail?;
        let row = store.row(index)?;
        Some(RowDetail {
            row_number: index + 1,
            fields: store
                .header()
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
