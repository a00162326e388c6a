//! Theme system for the Quarry console.
//!
//! Provides a two-layer theming system:
//! - `ThemeSettings`: User-configurable preferences (from config.toml)
//! - `Theme`: Computed colors derived from settings + system appearance

use gpui::{hsla, px, App, Global, Hsla, Pixels, SharedString, WindowAppearance};
use quarry_core::ThemeMode;

// =============================================================================
// Theme Settings (User-Configurable)
// =============================================================================

/// User-configurable theme settings.
#[derive(Debug, Clone)]
pub struct ThemeSettings {
    /// Light, dark, or follow system.
    pub appearance: Appearance,
    /// Accent hue (0.0-1.0). Default is teal (180/360).
    pub accent_hue: f32,
    /// UI font family.
    pub font_family: SharedString,
    /// Font family for the editor and grid cells.
    pub mono_font_family: SharedString,
    /// Base font size.
    pub font_size: Pixels,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            appearance: Appearance::System,
            accent_hue: 180.0 / 360.0,
            font_family: "Inter".into(),
            mono_font_family: "JetBrains Mono".into(),
            font_size: px(14.0),
        }
    }
}

impl ThemeSettings {
    /// Settings for a configured theme mode.
    pub fn from_mode(mode: ThemeMode) -> Self {
        Self {
            appearance: mode.into(),
            ..Default::default()
        }
    }
}

impl Global for ThemeSettings {}

/// Appearance mode preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Appearance {
    Light,
    Dark,
    #[default]
    System,
}

impl From<ThemeMode> for Appearance {
    fn from(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Light => Appearance::Light,
            ThemeMode::Dark => Appearance::Dark,
            ThemeMode::System => Appearance::System,
        }
    }
}

/// Whether the window's system appearance is dark.
pub fn is_dark_appearance(appearance: WindowAppearance) -> bool {
    matches!(
        appearance,
        WindowAppearance::Dark | WindowAppearance::VibrantDark
    )
}

// =============================================================================
// Theme (Computed)
// =============================================================================

/// The active theme with computed colors.
///
/// Access via `cx.theme()` in render methods.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Whether this is a dark theme.
    pub is_dark: bool,

    // -------------------------------------------------------------------------
    // Background Colors
    // -------------------------------------------------------------------------
    /// Main window background.
    pub background: Hsla,
    /// Elevated surface (editor, popovers).
    pub surface: Hsla,
    /// Surface when hovered.
    pub surface_hover: Hsla,
    /// Dimmed backdrop behind modal overlays.
    pub backdrop: Hsla,

    // -------------------------------------------------------------------------
    // Text Colors
    // -------------------------------------------------------------------------
    /// Primary text color.
    pub text: Hsla,
    /// Secondary/muted text.
    pub text_muted: Hsla,
    /// Placeholder text in inputs.
    pub text_placeholder: Hsla,
    /// Text on accent-colored buttons.
    pub text_on_accent: Hsla,

    // -------------------------------------------------------------------------
    // Interactive Colors
    // -------------------------------------------------------------------------
    /// Selected text background.
    pub selection: Hsla,
    /// Accent color for focus rings, primary buttons.
    pub accent: Hsla,

    // -------------------------------------------------------------------------
    // Grid Colors
    // -------------------------------------------------------------------------
    /// Column header row background.
    pub grid_header: Hsla,
    /// Background of every other row.
    pub grid_stripe: Hsla,
    /// Cell separator lines.
    pub grid_line: Hsla,

    // -------------------------------------------------------------------------
    // Semantic Colors
    // -------------------------------------------------------------------------
    /// Success state.
    pub success: Hsla,
    /// Warning state.
    pub warning: Hsla,
    /// Error state.
    pub error: Hsla,

    // -------------------------------------------------------------------------
    // Border Colors
    // -------------------------------------------------------------------------
    /// Subtle border.
    pub border: Hsla,
    /// Focused border (derived from accent).
    pub border_focused: Hsla,

    // -------------------------------------------------------------------------
    // Typography
    // -------------------------------------------------------------------------
    pub font_family: SharedString,
    pub mono_font_family: SharedString,
    pub font_size: Pixels,
    /// Small font size (tabs, metadata).
    pub font_size_small: Pixels,

    // -------------------------------------------------------------------------
    // Spacing
    // -------------------------------------------------------------------------
    /// Base spacing unit.
    pub spacing: Pixels,
    /// Border radius for rounded elements.
    pub radius: Pixels,
    /// Height of toolbar buttons and tabs.
    pub control_height: Pixels,
    /// Height of the column header row.
    pub header_height: Pixels,
}

impl Theme {
    /// Create a theme from settings and system appearance.
    pub fn from_settings(settings: &ThemeSettings, system_is_dark: bool) -> Self {
        let is_dark = match settings.appearance {
            Appearance::Dark => true,
            Appearance::Light => false,
            Appearance::System => system_is_dark,
        };

        let palette = if is_dark {
            Palette::dark(settings.accent_hue)
        } else {
            Palette::light(settings.accent_hue)
        };

        let base_size: f32 = settings.font_size.into();

        Self {
            is_dark,

            // Backgrounds
            background: palette.bg_base,
            surface: palette.bg_elevated,
            surface_hover: palette.bg_hover,
            backdrop: hsla(0.0, 0.0, 0.0, if is_dark { 0.55 } else { 0.35 }),

            // Text
            text: palette.fg_primary,
            text_muted: palette.fg_secondary,
            text_placeholder: palette.fg_tertiary,
            text_on_accent: hsla(0.0, 0.0, 1.0, 1.0),

            // Interactive
            selection: palette.accent.with_alpha(if is_dark { 0.3 } else { 0.2 }),
            accent: palette.accent,

            // Grid
            grid_header: palette.bg_elevated,
            grid_stripe: palette.bg_stripe,
            grid_line: palette.border.with_alpha(palette.border.a * 0.6),

            // Semantic
            success: palette.success,
            warning: palette.warning,
            error: palette.error,

            // Borders
            border: palette.border,
            border_focused: palette.accent,

            // Typography
            font_family: settings.font_family.clone(),
            mono_font_family: settings.mono_font_family.clone(),
            font_size: settings.font_size,
            font_size_small: px(base_size - 2.0),

            // Spacing
            spacing: px(8.0),
            radius: px(6.0),
            control_height: px(28.0),
            header_height: px(32.0),
        }
    }

    /// Create default dark theme.
    pub fn dark() -> Self {
        Self::from_settings(&ThemeSettings::default(), true)
    }

    /// Create default light theme.
    pub fn light() -> Self {
        Self::from_settings(&ThemeSettings::default(), false)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Global for Theme {}

// =============================================================================
// Palette (Internal)
// =============================================================================

/// Internal color palette for deriving theme colors.
struct Palette {
    bg_base: Hsla,
    bg_elevated: Hsla,
    bg_hover: Hsla,
    bg_stripe: Hsla,
    fg_primary: Hsla,
    fg_secondary: Hsla,
    fg_tertiary: Hsla,
    accent: Hsla,
    border: Hsla,
    success: Hsla,
    warning: Hsla,
    error: Hsla,
}

impl Palette {
    fn dark(accent_hue: f32) -> Self {
        Self {
            bg_base: hsla(220.0 / 360.0, 0.12, 0.11, 1.0),
            bg_elevated: hsla(220.0 / 360.0, 0.12, 0.15, 1.0),
            bg_hover: hsla(0.0, 0.0, 1.0, 0.08),
            bg_stripe: hsla(0.0, 0.0, 1.0, 0.03),
            fg_primary: hsla(0.0, 0.0, 0.92, 1.0),
            fg_secondary: hsla(0.0, 0.0, 0.62, 1.0),
            fg_tertiary: hsla(0.0, 0.0, 0.42, 1.0),
            accent: hsla(accent_hue, 0.65, 0.45, 1.0),
            border: hsla(0.0, 0.0, 1.0, 0.12),
            success: hsla(140.0 / 360.0, 0.60, 0.50, 1.0),
            warning: hsla(40.0 / 360.0, 0.90, 0.50, 1.0),
            error: hsla(0.0, 0.75, 0.58, 1.0),
        }
    }

    fn light(accent_hue: f32) -> Self {
        Self {
            bg_base: hsla(0.0, 0.0, 0.99, 1.0),
            bg_elevated: hsla(220.0 / 360.0, 0.14, 0.96, 1.0),
            bg_hover: hsla(0.0, 0.0, 0.0, 0.06),
            bg_stripe: hsla(0.0, 0.0, 0.0, 0.025),
            fg_primary: hsla(0.0, 0.0, 0.10, 1.0),
            fg_secondary: hsla(0.0, 0.0, 0.42, 1.0),
            fg_tertiary: hsla(0.0, 0.0, 0.62, 1.0),
            accent: hsla(accent_hue, 0.70, 0.36, 1.0),
            border: hsla(0.0, 0.0, 0.0, 0.12),
            success: hsla(140.0 / 360.0, 0.60, 0.36, 1.0),
            warning: hsla(40.0 / 360.0, 0.90, 0.42, 1.0),
            error: hsla(0.0, 0.75, 0.45, 1.0),
        }
    }
}

// =============================================================================
// Hsla Extension
// =============================================================================

/// Extension trait for Hsla alpha modification.
trait HslaExt {
    fn with_alpha(self, a: f32) -> Hsla;
}

impl HslaExt for Hsla {
    fn with_alpha(self, a: f32) -> Hsla {
        Hsla { a, ..self }
    }
}

// =============================================================================
// Theme Extensions
// =============================================================================

/// Extension trait for convenient theme access.
pub trait ThemeExt {
    /// Get the current theme.
    fn theme(&self) -> &Theme;
}

impl ThemeExt for App {
    fn theme(&self) -> &Theme {
        self.global::<Theme>()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ThemeSettings::default();
        assert_eq!(settings.appearance, Appearance::System);
    }

    #[test]
    fn test_mode_conversion() {
        assert_eq!(ThemeSettings::from_mode(ThemeMode::Dark).appearance, Appearance::Dark);
        assert_eq!(ThemeSettings::from_mode(ThemeMode::Light).appearance, Appearance::Light);
        assert_eq!(ThemeSettings::from_mode(ThemeMode::System).appearance, Appearance::System);
    }

    #[test]
    fn test_appearance_override() {
        let theme = Theme::from_settings(&ThemeSettings::from_mode(ThemeMode::Dark), false);
        assert!(theme.is_dark);

        let theme = Theme::from_settings(&ThemeSettings::from_mode(ThemeMode::Light), true);
        assert!(!theme.is_dark);
    }

    #[test]
    fn test_system_follows_window() {
        let settings = ThemeSettings::default();
        assert!(Theme::from_settings(&settings, true).is_dark);
        assert!(!Theme::from_settings(&settings, false).is_dark);
        assert!(is_dark_appearance(WindowAppearance::VibrantDark));
        assert!(!is_dark_appearance(WindowAppearance::Light));
    }

    #[test]
    fn test_selection_alpha_differs_by_mode() {
        let settings = ThemeSettings::default();
        let dark = Theme::from_settings(&settings, true);
        let light = Theme::from_settings(&settings, false);
        assert!(dark.selection.a > light.selection.a);
    }

    #[test]
    fn test_font_size_derivation() {
        let settings = ThemeSettings {
            font_size: px(16.0),
            ..Default::default()
        };
        let theme = Theme::from_settings(&settings, true);
        let small: f32 = theme.font_size_small.into();
        assert!((small - 14.0).abs() < 0.001);
    }
}
