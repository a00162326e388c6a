//! Column geometry for the result grid.
//!
//! Stored widths change only through an explicit resize or drag. Fill and
//! stretch are applied to rendered widths and never written back.

// =============================================================================
// Column Layout
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct ColumnWidth {
    id: String,
    width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnDrag {
    column: usize,
    origin_x: f32,
    origin_width: f32,
}

/// Per-column widths for the current header set.
///
/// The pinned row-number column is not part of the stored widths; its width
/// is fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    columns: Vec<ColumnWidth>,
    default_width: f32,
    min_width: f32,
    index_width: f32,
    drag: Option<ColumnDrag>,
}

impl ColumnLayout {
    pub fn new(default_width: f32, min_width: f32, index_width: f32) -> Self {
        let min_width = min_width.max(1.0);
        Self {
            columns: Vec::new(),
            default_width: default_width.max(min_width),
            min_width,
            index_width: index_width.max(0.0),
            drag: None,
        }
    }

    /// Reset to default widths when the header set changes.
    ///
    /// Returns true when the layout was reset.
    pub fn sync_header(&mut self, header: &[String]) -> bool {
        let unchanged = self.columns.len() == header.len()
            && self
                .columns
                .iter()
                .zip(header)
                .all(|(column, name)| &column.id == name);
        if unchanged {
            return false;
        }

        self.columns = header
            .iter()
            .map(|id| ColumnWidth {
                id: id.clone(),
                width: self.default_width,
            })
            .collect();
        self.drag = None;
        true
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_width(&self) -> f32 {
        self.index_width
    }

    pub fn min_width(&self) -> f32 {
        self.min_width
    }

    /// Stored width of a column.
    pub fn width(&self, column: usize) -> Option<f32> {
        self.columns.get(column).map(|c| c.width)
    }

    /// Stored width of a column by name.
    pub fn width_of(&self, id: &str) -> Option<f32> {
        self.columns.iter().find(|c| c.id == id).map(|c| c.width)
    }

    /// Set one column's width, clamped to the minimum.
    pub fn resize(&mut self, column: usize, width: f32) -> bool {
        let min_width = self.min_width;
        match self.columns.get_mut(column) {
            Some(entry) if width.is_finite() => {
                entry.width = width.max(min_width);
                true
            }
            _ => false,
        }
    }

    // -------------------------------------------------------------------------
    // Drag Resize
    // -------------------------------------------------------------------------

    /// Start dragging the trailing edge of `column`.
    pub fn begin_drag(&mut self, column: usize, pointer_x: f32) -> bool {
        let Some(origin_width) = self.width(column) else {
            return false;
        };
        self.drag = Some(ColumnDrag {
            column,
            origin_x: pointer_x,
            origin_width,
        });
        true
    }

    /// Follow the pointer during a drag.
    pub fn drag_to(&mut self, pointer_x: f32) -> bool {
        let Some(drag) = self.drag else {
            return false;
        };
        self.resize(drag.column, drag.origin_width + (pointer_x - drag.origin_x))
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Column being dragged, if any.
    pub fn dragging(&self) -> Option<usize> {
        self.drag.map(|d| d.column)
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    /// Widths to render at `viewport_width`.
    pub fn render_widths(&self, viewport_width: f32) -> RenderedColumns {
        let mut columns: Vec<RenderedColumn> = self
            .columns
            .iter()
            .map(|c| RenderedColumn {
                width: c.width,
                fill: false,
            })
            .collect();

        let stored_total: f32 = self.index_width + self.columns.iter().map(|c| c.width).sum::<f32>();
        let extra = (viewport_width - stored_total).max(0.0);

        if columns.len() == 1 {
            columns[0].fill = true;
            columns[0].width += extra;
        } else if let Some(last) = columns.last_mut() {
            last.width += extra;
        }

        let total = self.index_width + columns.iter().map(|c| c.width).sum::<f32>();
        RenderedColumns {
            index: self.index_width,
            columns,
            total,
        }
    }
}

/// Width a data column is drawn at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedColumn {
    pub width: f32,
    /// The only data column; it takes the remaining space.
    pub fill: bool,
}

/// Rendered geometry of a grid row.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedColumns {
    /// Pinned row-number column width.
    pub index: f32,
    pub columns: Vec<RenderedColumn>,
    /// Total row width, including the row-number column.
    pub total: f32,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn layout(names: &[&str]) -> ColumnLayout {
        let mut layout = ColumnLayout::new(100.0, 40.0, 40.0);
        layout.sync_header(&header(names));
        layout
    }

    #[test]
    fn test_sync_header_resets_on_change() {
        let mut layout = layout(&["a", "b"]);
        layout.resize(0, 250.0);

        assert!(!layout.sync_header(&header(&["a", "b"])));
        assert_eq!(layout.width(0), Some(250.0));

        assert!(layout.sync_header(&header(&["a", "c"])));
        assert_eq!(layout.width(0), Some(100.0));
        assert_eq!(layout.width_of("c"), Some(100.0));
    }

    #[test]
    fn test_resize_touches_one_column() {
        let mut layout = layout(&["a", "b", "c"]);
        assert!(layout.resize(1, 180.0));

        assert_eq!(layout.width(0), Some(100.0));
        assert_eq!(layout.width(1), Some(180.0));
        assert_eq!(layout.width(2), Some(100.0));
    }

    #[test]
    fn test_resize_clamps_to_minimum() {
        let mut layout = layout(&["a", "b"]);
        layout.resize(0, 5.0);
        assert_eq!(layout.width(0), Some(40.0));
        assert!(!layout.resize(7, 200.0));
        assert!(!layout.resize(0, f32::NAN));
    }

    #[test]
    fn test_drag_follows_pointer_from_origin() {
        let mut layout = layout(&["a", "b"]);
        assert!(layout.begin_drag(0, 500.0));
        assert_eq!(layout.dragging(), Some(0));

        layout.drag_to(530.0);
        assert_eq!(layout.width(0), Some(130.0));
        layout.drag_to(480.0);
        assert_eq!(layout.width(0), Some(80.0));
        assert_eq!(layout.width(1), Some(100.0));

        layout.end_drag();
        assert!(!layout.drag_to(900.0));
        assert_eq!(layout.width(0), Some(80.0));
    }

    #[test]
    fn test_stretch_only_changes_rendered_last_column() {
        let layout = layout(&["a", "b", "c"]);
        let rendered = layout.render_widths(1_000.0);

        assert_eq!(rendered.columns[0].width, 100.0);
        assert_eq!(rendered.columns[1].width, 100.0);
        assert_eq!(rendered.columns[2].width, 1_000.0 - 40.0 - 200.0);
        assert_eq!(rendered.total, 1_000.0);
        assert_eq!(layout.width(2), Some(100.0));
    }

    #[test]
    fn test_no_stretch_when_overflowing() {
        let layout = layout(&["a", "b", "c"]);
        let rendered = layout.render_widths(200.0);
        assert_eq!(rendered.columns[2].width, 100.0);
        assert_eq!(rendered.total, 340.0);
    }

    #[test]
    fn test_single_column_fills() {
        let layout = layout(&["only"]);
        let rendered = layout.render_widths(600.0);

        assert!(rendered.columns[0].fill);
        assert_eq!(rendered.columns[0].width, 560.0);
        assert_eq!(layout.width(0), Some(100.0));
    }

    #[test]
    fn test_viewport_growth_never_mutates_storage() {
        let mut layout = layout(&["a", "b"]);
        layout.resize(0, 120.0);
        let before = layout.clone();

        for width in [100.0, 400.0, 2_000.0] {
            layout.render_widths(width);
        }
        assert_eq!(layout, before);
    }
}
