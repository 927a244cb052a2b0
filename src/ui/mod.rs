//! User-facing output.
//!
//! - [`UserInterface`] trait so commands can be tested against [`MockUI`]
//! - [`TerminalUI`] for real terminals and pipes
//! - [`Table`] for aligned, box-drawn listings
//!
//! # Example
//!
//! ```
//! use preconditions::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.show_header("Preconditions");
//! ui.success("HAS_DOCKER");
//! assert_eq!(ui.successes(), ["HAS_DOCKER"]);
//! ```

pub mod mock;
pub mod output;
pub mod table;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::OutputMode;
pub use table::Table;
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, PreconditionsTheme};

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Emit machine-readable output (JSON). Never suppressed by the
    /// output mode.
    fn data(&mut self, text: &str);
}
