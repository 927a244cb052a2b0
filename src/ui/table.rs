//! Table rendering for listings and reports.

use console::measure_text_width;

/// A box-drawn table; column widths ignore ANSI styling.
#[derive(Debug)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    widths: Vec<usize>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let widths = headers.iter().map(|h| measure_text_width(h)).collect();

        Self {
            headers,
            rows: Vec::new(),
            widths,
        }
    }

    /// Add a row; cells beyond the header count are dropped.
    pub fn add_row<S: Into<String>>(&mut self, row: impl IntoIterator<Item = S>) {
        let mut row: Vec<String> = row.into_iter().map(Into::into).collect();
        row.truncate(self.headers.len());

        for (width, cell) in self.widths.iter_mut().zip(&row) {
            *width = (*width).max(measure_text_width(cell));
        }

        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut lines = vec![self.border('┌', '┬', '┐'), self.line(&self.headers)];
        lines.push(self.border('├', '┼', '┤'));
        lines.extend(self.rows.iter().map(|row| self.line(row)));
        lines.push(self.border('└', '┴', '┘'));
        lines.join("\n")
    }

    fn border(&self, left: char, mid: char, right: char) -> String {
        let segments: Vec<String> = self.widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}", left, segments.join(&mid.to_string()), right)
    }

    fn line(&self, row: &[String]) -> String {
        let mut s = String::from("│");
        for (i, width) in self.widths.iter().enumerate() {
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            let pad = width - measure_text_width(cell);
            s.push_str(&format!(" {}{} │", cell, " ".repeat(pad)));
        }
        s
    }
}
