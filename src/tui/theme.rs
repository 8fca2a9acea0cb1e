//! TUI color semantics and style constants.
//!
//! Color semantics:
//! - Green: domestic waste series, first chart series
//! - Yellow: no-data notices
//! - Red: errors shown in place of a view
//! - Cyan: interactive elements (focused control, links)
//! - Dim: captions, secondary series, key hints

use ratatui::style::{Color, Modifier, Style};

// ============================================================================
// SEMANTIC STYLES
// ============================================================================

/// Primary series bars: green.
pub const STYLE_SERIES: Style = Style::new().fg(Color::Green);

/// Empty result notice: yellow.
pub const STYLE_WARNING: Style = Style::new().fg(Color::Yellow);

/// View or selection error: red.
pub const STYLE_DANGER: Style = Style::new().fg(Color::Red);

/// Interactive element / keybinding hint: cyan.
pub const STYLE_INTERACTIVE: Style = Style::new().fg(Color::Cyan);

/// De-emphasized text: dark gray.
pub const STYLE_DIM: Style = Style::new().fg(Color::DarkGray);

/// Important text: bold.
pub const STYLE_IMPORTANT: Style = Style::new().add_modifier(Modifier::BOLD);

// ============================================================================
// UI ELEMENT STYLES
// ============================================================================

/// Title bar / header.
pub const STYLE_TITLE: Style = Style::new().fg(Color::White).add_modifier(Modifier::BOLD);

/// Committed menu option or selector value.
pub const STYLE_SELECTED: Style = Style::new().fg(Color::Black).bg(Color::LightRed);

/// Cursor in the focused control (not yet committed).
pub const STYLE_CURSOR: Style = Style::new().add_modifier(Modifier::REVERSED);

/// Chart caption.
pub const STYLE_CAPTION: Style = Style::new()
    .fg(Color::DarkGray)
    .add_modifier(Modifier::ITALIC);

/// Footer / help line.
pub const STYLE_HELP: Style = Style::new().fg(Color::DarkGray);

/// Bar style for the n-th series of a chart.
pub fn series_style(n: usize) -> Style {
    match n {
        0 => STYLE_SERIES,
        1 => STYLE_DIM,
        _ => STYLE_INTERACTIVE,
    }
}

/// Terminal glyph for a menu icon id. Unknown ids draw nothing.
pub fn icon_glyph(icon: &str) -> &'static str {
    match icon {
        "house" => "⌂",
        "info-square" => "ℹ",
        "people" => "☺",
        "pie-chart-fill" => "◔",
        "bar-chart-fill" | "bar-chart-line-fill" => "▇",
        "bar-chart-line" => "▃",
        "clipboard2-check-fill" => "✓",
        _ => "",
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_styles_have_expected_colors() {
        assert_eq!(STYLE_SERIES.fg, Some(Color::Green));
        assert_eq!(STYLE_WARNING.fg, Some(Color::Yellow));
        assert_eq!(STYLE_DANGER.fg, Some(Color::Red));
        assert_eq!(STYLE_INTERACTIVE.fg, Some(Color::Cyan));
        assert_eq!(STYLE_DIM.fg, Some(Color::DarkGray));
    }

    #[test]
    fn cursor_style_is_reversed() {
        assert!(STYLE_CURSOR.add_modifier.contains(Modifier::REVERSED));
    }

    #[test]
    fn series_styles_follow_domestic_then_non_domestic() {
        assert_eq!(series_style(0), STYLE_SERIES);
        assert_eq!(series_style(1), STYLE_DIM);
    }

    #[test]
    fn placeholder_icon_has_no_glyph() {
        assert_eq!(icon_glyph("-"), "");
        assert_eq!(icon_glyph("house"), "⌂");
    }
}
