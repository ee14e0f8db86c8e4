//! Consistent color theme and styling for terminal output.

use console::Style;
use std::io::IsTerminal;
use std::sync::LazyLock;

/// Global theme instance for consistent styling across the application.
pub static THEME: LazyLock<Theme> = LazyLock::new(Theme::default);

/// Color theme for terminal output.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Success/positive indicators
    pub success: Style,
    /// Error/failure indicators
    pub error: Style,
    /// Dimmed/secondary text
    pub dim: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            success: Style::new().green().bright(),
            error: Style::new().red().bright(),
            dim: Style::new().dim(),
        }
    }
}

impl Theme {
    /// Format a success message with checkmark.
    pub fn success_with_icon(&self, text: &str) -> String {
        self.with_icon("✓", &self.success, text)
    }

    /// Format an error message with X mark.
    pub fn error_with_icon(&self, text: &str) -> String {
        self.with_icon("✗", &self.error, text)
    }

    fn with_icon(&self, icon: &str, style: &Style, text: &str) -> String {
        if Self::should_disable_colors() {
            format!("{icon} {text}")
        } else {
            format!("{} {}", style.apply_to(icon), style.apply_to(text))
        }
    }

    /// Check if color output should be disabled.
    pub fn should_disable_colors() -> bool {
        std::env::var("NO_COLOR").is_ok() || !std::io::stderr().is_terminal()
    }

    /// Apply theme styling conditionally based on terminal support.
    pub fn apply<T: std::fmt::Display>(&self, style: &Style, text: T) -> String {
        if Self::should_disable_colors() {
            text.to_string()
        } else {
            style.apply_to(text).to_string()
        }
    }
}
