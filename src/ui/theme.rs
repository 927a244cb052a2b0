//! Visual theme and styling.

use console::Style;

/// Styles used for terminal output.
#[derive(Debug, Clone)]
pub struct PreconditionsTheme {
    /// Satisfied preconditions (green).
    pub success: Style,
    /// Unsatisfied preconditions and warnings (orange).
    pub warning: Style,
    /// Evaluation errors (red bold).
    pub error: Style,
    /// Headers (magenta bold).
    pub header: Style,
}

impl Default for PreconditionsTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl PreconditionsTheme {
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            header: Style::new().bold().magenta(),
        }
    }

    /// A theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            header: Style::new(),
        }
    }

    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("○ {}", msg)))
    }

    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    pub fn format_header(&self, title: &str) -> String {
        format!("{}", self.header.apply_to(title))
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors(no_color_flag: bool) -> bool {
    if no_color_flag {
        return false;
    }

    // https://no-color.org/
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    console::Term::stdout().is_term()
}
