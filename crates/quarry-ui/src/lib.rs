//! GPUI frontend for the Quarry SQL console.
//!
//! This crate provides the native user interface:
//! - ConsolePanel for the editor, toolbar, results and history
//! - QueryEditor, a multi-line SQL editor with IME support
//! - ResultGrid, the virtualized result grid
//! - Configurable keybindings and theming

pub mod actions;
pub mod keymap;
pub mod theme;
pub mod views;
pub mod window;

// Re-export commonly used types
pub use theme::{Appearance, Theme, ThemeExt, ThemeSettings};
pub use views::{ConsolePanel, QueryEditor, QueryEditorEvent, ResultGrid, ResultsTab};
pub use window::run_console;
