//! Terminal UI.

use console::Term;
use std::io::Write;

use super::{should_use_colors, OutputMode, PreconditionsTheme, UserInterface};

/// Writes results to stdout and errors to stderr.
pub struct TerminalUI {
    out: Term,
    err: Term,
    theme: PreconditionsTheme,
    mode: OutputMode,
}

impl TerminalUI {
    pub fn new(mode: OutputMode, colors: bool) -> Self {
        let theme = if colors {
            PreconditionsTheme::new()
        } else {
            PreconditionsTheme::plain()
        };

        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            theme,
            mode,
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.err, "{}", self.theme.format_error(msg)).ok();
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn data(&mut self, text: &str) {
        writeln!(self.out, "{}", text).ok();
    }
}

/// Create the terminal UI, honouring `--no-color`, `NO_COLOR` and whether
/// stdout is a TTY.
pub fn create_ui(mode: OutputMode, no_color: bool) -> Box<dyn UserInterface> {
    Box::new(TerminalUI::new(mode, should_use_colors(no_color)))
}
