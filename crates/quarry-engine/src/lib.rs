//! SQLite query engine for Quarry.
//!
//! The connection lives on its own thread (see [`SqliteRuntime`]); the
//! [`SqliteEngine`] front implements `QueryEngine` with cancellation and
//! timeouts. Files can be queried through `read_csv('...')` style calls.
//! [`HistoryStore`] records finished runs.

mod engine;
mod files;
mod history;
mod runtime;
mod session;

pub use engine::{SqliteEngine, DEFAULT_TIMEOUT};
pub use history::{HistoryEntry, HistoryError, HistoryStore, HISTORY_FILE};
pub use runtime::SqliteRuntime;
pub use session::{unique_header, Session, ROWS_AFFECTED};
