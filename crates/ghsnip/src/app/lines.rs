//! Line window selection over fetched file contents.

/// The slice of a file chosen for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineWindow {
    /// First line shown (1-based).
    pub start: usize,
    /// Last line shown. `start - 1` when nothing is shown.
    pub end: usize,
    /// Number of lines in the whole file.
    pub total: usize,
    pub text: String,
    /// The default window cut off lines that follow it.
    pub truncated: bool,
}

impl LineWindow {
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }
}

/// Select lines `line_start..=line_end` from `content`.
///
/// Without an explicit start the window begins at line 1. Without an explicit end it spans
/// at most `max_lines_shown` lines. Ends beyond the file are clamped; a start beyond the file
/// or an inverted range selects nothing.
pub fn select_window(
    content: &str,
    line_start: Option<usize>,
    line_end: Option<usize>,
    max_lines_shown: usize,
) -> LineWindow {
    let lines: Vec<&str> = content.split('\n').collect();
    let total = lines.len();

    let start = line_start.unwrap_or(1).max(1);
    let end = match line_end {
        Some(end) => end.min(total),
        None => start
            .saturating_add(max_lines_shown)
            .saturating_sub(1)
            .min(total),
    };

    if start > total || end < start {
        tracing::debug!(start, end, total, "line window is empty");
        return LineWindow {
            start,
            end: start - 1,
            total,
            text: String::new(),
            truncated: false,
        };
    }

    LineWindow {
        start,
        end,
        total,
        text: lines[start - 1..end].join("\n"),
        truncated: line_end.is_none() && end < total,
    }
}

/// Text of [`select_window`].
pub fn select_lines(
    content: &str,
    line_start: Option<usize>,
    line_end: Option<usize>,
    max_lines_shown: usize,
) -> String {
    select_window(content, line_start, line_end, max_lines_shown).text
}
