//! Virtualized, resizable-column result grid model.
//!
//! GPUI-independent: the view layer feeds scroll and size events in and
//! renders whatever window and widths come out.

mod columns;
mod model;
mod window;

pub use columns::{ColumnLayout, RenderedColumn, RenderedColumns};
pub use model::{GridModel, GridView, RowDetail, NO_QUERY_MESSAGE, NO_ROWS_MESSAGE};
pub use window::{max_window_len, visible_window, VisibleWindow};
