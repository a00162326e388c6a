//! Centralized actions for the Quarry console.
//!
//! Actions are dispatched by GPUI's key binding system. Config files refer to
//! them by the snake_case names in `action_from_name`.

use gpui::actions;

// =============================================================================
// Console Actions
// =============================================================================

actions!(
    quarry,
    [ToggleRun, FormatQuery, ClearQuery, LoadMore, CloseDetail, Dismiss,]
);

// =============================================================================
// Text Editing Actions
// =============================================================================

actions!(
    quarry,
    [
        Backspace,
        Delete,
        MoveLeft,
        MoveRight,
        MoveUp,
        MoveDown,
        SelectLeft,
        SelectRight,
        TextSelectAll,
        Home,
        End,
        Copy,
        Paste,
        Cut,
        Newline,
    ]
);

// =============================================================================
// Action Lookup
// =============================================================================

/// Look up an action by name for GPUI registration.
pub fn action_from_name(name: &str) -> Option<Box<dyn gpui::Action>> {
    match name {
        // Console
        "toggle_run" => Some(Box::new(ToggleRun)),
        "format_query" => Some(Box::new(FormatQuery)),
        "clear_query" => Some(Box::new(ClearQuery)),
        "load_more" => Some(Box::new(LoadMore)),
        "close_detail" => Some(Box::new(CloseDetail)),
        "dismiss" => Some(Box::new(Dismiss)),

        // Text editing
        "backspace" => Some(Box::new(Backspace)),
        "delete" => Some(Box::new(Delete)),
        "move_left" => Some(Box::new(MoveLeft)),
        "move_right" => Some(Box::new(MoveRight)),
        "move_up" => Some(Box::new(MoveUp)),
        "move_down" => Some(Box::new(MoveDown)),
        "select_left" => Some(Box::new(SelectLeft)),
        "select_right" => Some(Box::new(SelectRight)),
        "text_select_all" => Some(Box::new(TextSelectAll)),
        "home" => Some(Box::new(Home)),
        "end" => Some(Box::new(End)),
        "copy" => Some(Box::new(Copy)),
        "paste" => Some(Box::new(Paste)),
        "cut" => Some(Box::new(Cut)),
        "newline" => Some(Box::new(Newline)),

        _ => None,
    }
}

/// Get all available action names.
pub fn available_actions() -> &'static [&'static str] {
    &[
        // Console
        "toggle_run",
        "format_query",
        "clear_query",
        "load_more",
        "close_detail",
        "dismiss",
        // Text editing
        "backspace",
        "delete",
        "move_left",
        "move_right",
        "move_up",
        "move_down",
        "select_left",
        "select_right",
        "text_select_all",
        "home",
        "end",
        "copy",
        "paste",
        "cut",
        "newline",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_name() {
        assert!(action_from_name("toggle_run").is_some());
        assert!(action_from_name("newline").is_some());
        assert!(action_from_name("submit").is_none());
    }

    #[test]
    fn test_every_available_action_resolves() {
        for name in available_actions() {
            assert!(action_from_name(name).is_some(), "{} has no action", name);
        }
    }
}
