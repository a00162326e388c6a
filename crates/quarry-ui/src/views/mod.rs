//! UI views for the Quarry console.
//!
//! Views are stateful GPUI components that manage focus and emit events.

mod console_panel;
mod query_editor;
mod result_grid;

pub use console_panel::{ConsolePanel, ResultsTab};
pub use query_editor::{QueryEditor, QueryEditorEvent};
pub use result_grid::ResultGrid;
