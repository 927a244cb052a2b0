//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures all
//! interactions for later assertion.
//!
//! # Example
//!
//! ```
//! use preconditions::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.message("3 preconditions");
//! ui.warning("HAS_DOCKER");
//!
//! assert!(ui.has_message("3 preconditions"));
//! assert_eq!(ui.warnings(), ["HAS_DOCKER"]);
//! ```

use super::{OutputMode, UserInterface};

/// Captures every UI call.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    data: Vec<String>,
}

impl MockUI {
    /// Create a new MockUI with Normal output mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new MockUI with a specific output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Machine-readable output, one entry per call.
    pub fn data_lines(&self) -> &[String] {
        &self.data
    }

    /// Check if any message contains the given text.
    pub fn has_message(&self, text: &str) -> bool {
        self.messages.iter().any(|m| m.contains(text))
    }

    /// Check if any warning contains the given text.
    pub fn has_warning(&self, text: &str) -> bool {
        self.warnings.iter().any(|m| m.contains(text))
    }

    /// Check if any error contains the given text.
    pub fn has_error(&self, text: &str) -> bool {
        self.errors.iter().any(|m| m.contains(text))
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn data(&mut self, text: &str) {
        self.data.push(text.to_string());
    }
}
