//! Visible row window for fixed-height virtualization.

/// Rows to materialize, plus the blank space standing in for the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VisibleWindow {
    /// First materialized row.
    pub first: usize,
    /// One past the last materialized row.
    pub end: usize,
    /// Height reserved above `first`.
    pub leading_spacer: f32,
    /// Height reserved below `end`.
    pub trailing_spacer: f32,
}

impl VisibleWindow {
    /// Number of materialized rows.
    pub fn len(&self) -> usize {
        self.end - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.first
    }

    pub fn contains(&self, row: usize) -> bool {
        (self.first..self.end).contains(&row)
    }

    pub fn rows(&self) -> std::ops::Range<usize> {
        self.first..self.end
    }
}

/// Compute which rows to materialize for a scroll position.
///
/// The window is `[floor(scroll_top / h) - overscan, ceil((scroll_top + viewport) / h) + overscan)`
/// clamped to the row count, so it never holds more than
/// `ceil(viewport / h) + 2 * overscan + 1` rows.
pub fn visible_window(
    row_count: usize,
    scroll_top: f32,
    viewport_height: f32,
    row_height: f32,
    overscan: usize,
) -> VisibleWindow {
    if row_count == 0 || !(row_height > 0.0) {
        return VisibleWindow::default();
    }

    let scroll_top = if scroll_top.is_finite() { scroll_top.max(0.0) } else { 0.0 };
    let viewport_height = if viewport_height.is_finite() {
        viewport_height.max(0.0)
    } else {
        0.0
    };

    let first_visible = (scroll_top / row_height).floor() as usize;
    let last_visible = ((scroll_top + viewport_height) / row_height).ceil() as usize;

    let first = first_visible.saturating_sub(overscan).min(row_count);
    let end = last_visible
        .saturating_add(overscan)
        .min(row_count)
        .max(first);

    VisibleWindow {
        first,
        end,
        leading_spacer: first as f32 * row_height,
        trailing_spacer: (row_count - end) as f32 * row_height,
    }
}

/// Upper bound on materialized rows for a viewport.
pub fn max_window_len(viewport_height: f32, row_height: f32, overscan: usize) -> usize {
    if !(row_height > 0.0) {
        return 0;
    }
    (viewport_height.max(0.0) / row_height).ceil() as usize + 2 * overscan + 1
}
