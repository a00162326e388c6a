//! GPUI-independent model of the Quarry console.
//!
//! This crate holds everything between the editor and the engine that can be
//! tested without a window:
//! - ExecutionController for the run/cancel lifecycle
//! - ResultStore for accumulated rows and pagination
//! - GridModel for virtualization, column layout, and row detail
//! - DropPrompt for turning dropped files into query text
//! - TextBuffer and the EditorSurface boundary

pub mod drop;
pub mod editor;
pub mod execution;
pub mod grid;
pub mod pagination;

#[cfg(test)]
pub mod mock;

pub use drop::{DropAnchor, DropCandidate, DropChoice, DropOption, DropPrompt, FileKind};
pub use editor::{effective_query, EditorSurface, TextBuffer};
pub use execution::{ExecutionController, PendingRun, RunRejected, RunTicket, Toggle};
pub use grid::{ColumnLayout, GridModel, GridView, RenderedColumns, RowDetail, VisibleWindow};
pub use pagination::{
    LoadMoreOutcome, LoadMoreSkip, LoadMoreTicket, PaginationCursor, ResultStore,
};
