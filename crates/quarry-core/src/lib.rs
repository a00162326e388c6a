//! Core types for the Quarry SQL console.
//!
//! This crate contains shared data structures that are used across all Quarry crates:
//! - Query results and the engine contract
//! - Run lifecycle states
//! - Configuration types
//! - Error types
//! - SQL formatting

mod config;
mod engine;
mod error;
mod format;
mod result;
mod state;

pub use config::{
    config_dir, config_file_path, data_dir, ensure_data_dir, AppConfig, AppearanceConfig,
    GridConfig, KeyBindingConfig, QueryConfig, ThemeMode,
};
pub use engine::{CancelToken, PageRequest, QueryEngine};
pub use error::{ConfigError, EngineError, PaginationError, ShapeError};
pub use format::format_sql;
pub use result::{format_query_time, QueryResult, INSTANT_QUERY_TIME, NO_QUERY_TIME};
pub use state::ExecutionState;
