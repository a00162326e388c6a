//! Window management for the Quarry console.

use std::sync::Arc;

use gpui::{
    px, size, App, AppContext, Bounds, TitlebarOptions, WindowBounds, WindowKind, WindowOptions,
};

use quarry_core::{AppConfig, QueryEngine};
use quarry_engine::HistoryStore;

use crate::keymap::apply_keybindings;
use crate::theme::{is_dark_appearance, Theme, ThemeSettings};
use crate::views::ConsolePanel;

// =============================================================================
// Window Configuration
// =============================================================================

/// Default window dimensions.
pub const DEFAULT_WIDTH: f32 = 1100.0;
pub const DEFAULT_HEIGHT: f32 = 760.0;

const WINDOW_TITLE: &str = "Quarry";

/// Create window options for the console.
///
/// Bounds are filled in once the display is known.
fn create_window_options() -> WindowOptions {
    WindowOptions {
        window_bounds: None,
        titlebar: Some(TitlebarOptions {
            title: Some(WINDOW_TITLE.into()),
            ..Default::default()
        }),
        focus: true,
        show: true,
        kind: WindowKind::Normal,
        is_movable: true,
        ..Default::default()
    }
}

/// Open the console window. Returns false when the window could not be created.
fn open_console(
    config: &AppConfig,
    engine: Arc<dyn QueryEngine>,
    history: Arc<HistoryStore>,
    cx: &mut App,
) -> bool {
    let window_size = size(px(DEFAULT_WIDTH), px(DEFAULT_HEIGHT));
    let bounds = Bounds::centered(None, window_size, cx);
    let options = WindowOptions {
        window_bounds: Some(WindowBounds::Windowed(bounds)),
        ..create_window_options()
    };

    let settings = ThemeSettings::from_mode(config.appearance.theme);
    let result = cx.open_window(options, |window, cx| {
        let theme = Theme::from_settings(&settings, is_dark_appearance(window.appearance()));
        cx.set_global(settings.clone());
        cx.set_global(theme);

        cx.new(|cx| ConsolePanel::new(config, engine, history, window, cx))
    });

    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::error!("Failed to open console window: {}", e);
            false
        }
    }
}

// =============================================================================
// App Entry Point
// =============================================================================

/// Run the console application until the last window closes.
pub fn run_console(config: AppConfig, engine: Arc<dyn QueryEngine>, history: Arc<HistoryStore>) {
    gpui::Application::new().run(move |cx| {
        apply_keybindings(&config.keymap, cx);

        if !open_console(&config, engine, history, cx) {
            cx.quit();
            return;
        }

        cx.on_window_closed(|cx| {
            if cx.windows().is_empty() {
                cx.quit();
            }
        })
        .detach();

        cx.activate(true);
        tracing::info!("Console window opened");
    });
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_options() {
        let options = create_window_options();
        assert!(options.titlebar.is_some());
        assert!(options.show);
        assert!(matches!(options.kind, WindowKind::Normal));
        assert!(options.is_movable);
    }
}
