//! GPUI keybinding registration.
//!
//! Default bindings come first, then bindings from `config.toml`. A user
//! binding for the same key and context replaces the default; GPUI's
//! last-wins ordering covers everything else.
//!
//! Contexts: `Console` (whole panel), `QueryEditor`, `ResultGrid`.

use std::rc::Rc;

#[cfg(test)]
use gpui::Keystroke;
use gpui::{App, DummyKeyboardMapper, KeyBinding, KeyBindingContextPredicate};

use quarry_core::KeyBindingConfig;

use crate::actions::action_from_name;

/// Context used when a binding does not name one.
pub const DEFAULT_CONTEXT: &str = "Console";

/// (key, action, context)
const DEFAULT_BINDINGS: &[(&str, &str, &str)] = &[
    // Console
    ("secondary+enter", "toggle_run", "Console"),
    ("secondary+shift+f", "format_query", "Console"),
    ("secondary+shift+k", "clear_query", "Console"),
    ("escape", "dismiss", "Console"),
    // Result grid
    ("escape", "close_detail", "ResultGrid"),
    ("secondary+l", "load_more", "ResultGrid"),
    // Text editing
    ("backspace", "backspace", "QueryEditor"),
    ("delete", "delete", "QueryEditor"),
    ("left", "move_left", "QueryEditor"),
    ("right", "move_right", "QueryEditor"),
    ("up", "move_up", "QueryEditor"),
    ("down", "move_down", "QueryEditor"),
    ("shift+left", "select_left", "QueryEditor"),
    ("shift+right", "select_right", "QueryEditor"),
    ("secondary+a", "text_select_all", "QueryEditor"),
    ("home", "home", "QueryEditor"),
    ("end", "end", "QueryEditor"),
    ("secondary+c", "copy", "QueryEditor"),
    ("secondary+v", "paste", "QueryEditor"),
    ("secondary+x", "cut", "QueryEditor"),
    ("enter", "newline", "QueryEditor"),
];

// =============================================================================
// Keystroke Parsing
// =============================================================================

/// Convert user-friendly keystroke to GPUI format.
///
/// Users write: "ctrl+n" or "cmd+shift+z"
/// GPUI expects: "ctrl-n" or "cmd-shift-z"
fn normalize_keystroke(s: &str) -> String {
    s.trim().to_lowercase().replace('+', "-")
}

/// Parse keystroke string to GPUI Keystroke.
#[cfg(test)]
fn parse_keystroke(s: &str) -> Result<Keystroke, String> {
    let normalized = normalize_keystroke(s);
    Keystroke::parse(&normalized).map_err(|e| format!("Invalid keystroke '{}': {:?}", s, e))
}

// =============================================================================
// Binding Merge
// =============================================================================

/// The built-in bindings.
pub fn default_bindings() -> Vec<KeyBindingConfig> {
    DEFAULT_BINDINGS
        .iter()
        .map(|(key, action, context)| KeyBindingConfig {
            key: key.to_string(),
            action: action.to_string(),
            context: Some(context.to_string()),
        })
        .collect()
}

fn binding_slot(binding: &KeyBindingConfig) -> (String, String) {
    (
        normalize_keystroke(&binding.key),
        binding
            .context
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
    )
}

/// Defaults followed by user bindings, minus defaults the user replaced.
pub fn merged_bindings(user: &[KeyBindingConfig]) -> Vec<KeyBindingConfig> {
    let overridden: Vec<(String, String)> = user.iter().map(binding_slot).collect();

    default_bindings()
        .into_iter()
        .filter(|binding| !overridden.contains(&binding_slot(binding)))
        .chain(user.iter().cloned())
        .collect()
}

// =============================================================================
// Apply Keybindings
// =============================================================================

/// Register the default and configured bindings with GPUI.
pub fn apply_keybindings(user: &[KeyBindingConfig], cx: &mut App) {
    let bindings = merged_bindings(user);
    let count = bindings.len();

    for binding in bindings {
        apply_binding(binding, cx);
    }

    tracing::info!(
        bindings = count,
        user = user.len(),
        "Keybindings registered"
    );
}

/// Apply a single binding to GPUI.
fn apply_binding(binding: KeyBindingConfig, cx: &mut App) {
    let context = binding.context.as_deref().unwrap_or(DEFAULT_CONTEXT);
    let context_predicate = KeyBindingContextPredicate::parse(context).ok().map(Rc::new);
    let keystroke = normalize_keystroke(&binding.key);

    let Some(action) = action_from_name(&binding.action) else {
        tracing::warn!("Unknown action: {}", binding.action);
        return;
    };

    match KeyBinding::load(
        &keystroke,
        action,
        context_predicate,
        false, // use_key_equivalents
        None,  // action_input
        &DummyKeyboardMapper,
    ) {
        Ok(key_binding) => {
            cx.bind_keys([key_binding]);
            tracing::debug!(
                "Registered binding: {} -> {} (context: {})",
                binding.key,
                binding.action,
                context
            );
        }
        Err(e) => {
            tracing::warn!("Failed to create binding for '{}': {:?}", binding.key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(key: &str, action: &str, context: Option<&str>) -> KeyBindingConfig {
        KeyBindingConfig {
            key: key.to_string(),
            action: action.to_string(),
            context: context.map(str::to_string),
        }
    }

    #[test]
    fn test_normalize_keystroke() {
        assert_eq!(normalize_keystroke("ctrl+n"), "ctrl-n");
        assert_eq!(normalize_keystroke("Cmd+Shift+Z"), "cmd-shift-z");
        assert_eq!(normalize_keystroke("ctrl-n"), "ctrl-n");
    }

    #[test]
    fn test_parse_default_keystrokes() {
        for (key, _, _) in DEFAULT_BINDINGS {
            assert!(parse_keystroke(key).is_ok(), "{} does not parse", key);
        }
    }

    #[test]
    fn test_console_defaults() {
        let lines: Vec<String> = default_bindings()
            .into_iter()
            .filter(|b| b.context.as_deref() == Some("Console"))
            .map(|b| format!("{} -> {}", b.key, b.action))
            .collect();
        insta::assert_snapshot!(lines.join("\n"), @r"
        secondary+enter -> toggle_run
        secondary+shift+f -> format_query
        secondary+shift+k -> clear_query
        escape -> dismiss
        ");
    }

    #[test]
    fn test_default_actions_exist() {
        for binding in default_bindings() {
            assert!(action_from_name(&binding.action).is_some());
        }
    }

    #[test]
    fn test_user_binding_replaces_default_slot() {
        let merged = merged_bindings(&[user("secondary-enter", "format_query", None)]);

        let for_slot: Vec<_> = merged
            .iter()
            .filter(|b| binding_slot(b) == ("secondary-enter".to_string(), "Console".to_string()))
            .collect();
        assert_eq!(for_slot.len(), 1);
        assert_eq!(for_slot[0].action, "format_query");
    }

    #[test]
    fn test_user_binding_in_other_context_keeps_default() {
        let merged = merged_bindings(&[user("escape", "clear_query", Some("QueryEditor"))]);
        assert_eq!(merged.len(), DEFAULT_BINDINGS.len() + 1);
        assert_eq!(merged.last().map(|b| b.action.as_str()), Some("clear_query"));
    }
}
