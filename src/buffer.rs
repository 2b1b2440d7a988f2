//! Text buffer for one line of the composition surface.
//!
//! A session owns two of these: the reading line (raw phonetic input) and
//! the composing line (converted text). Contexts mutate them through the
//! operations here; the session is the only caller of `commit`, and it pairs
//! every commit with the consuming flush and `finish_commit` in the same
//! protocol step.

use std::ops::Range;

/// One line of in-progress text with a committed region awaiting flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    committed: String,
    cursor: usize,
    highlight: Option<Range<usize>>,
    dirty: bool,
    tool_tip: String,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending (not yet committed) text.
    pub fn composed_text(&self) -> &str {
        &self.text
    }

    /// Committed text awaiting `finish_commit`.
    pub fn committed_text(&self) -> &str {
        &self.committed
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_committed(&self) -> bool {
        !self.committed.is_empty()
    }

    /// Replace the pending text, leaving the committed region alone.
    pub fn set_text(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
        self.cursor = self.text.chars().count();
        self.dirty = true;
    }

    /// Append to the pending text.
    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
        self.cursor = self.text.chars().count();
        self.dirty = true;
    }

    /// Clear the pending text and cursor. The committed region survives so a
    /// pending flush is never lost by a clear.
    pub fn clear(&mut self) {
        if !self.text.is_empty() {
            self.dirty = true;
        }
        self.text.clear();
        self.cursor = 0;
        self.highlight = None;
    }

    /// Freeze the pending text into the committed region.
    ///
    /// The committed region accumulates: committing again before the
    /// previous committed text was consumed by `finish_commit` duplicates it
    /// on the next read. Callers must always follow a true `is_committed()`
    /// with a flush and `finish_commit` before the next commit.
    pub fn commit(&mut self) {
        if !self.text.is_empty() {
            self.committed.push_str(&self.text);
            self.text.clear();
            self.cursor = 0;
            self.highlight = None;
            self.dirty = true;
        }
    }

    /// Commit an explicit string instead of the pending text.
    pub fn commit_string(&mut self, text: &str) {
        self.committed.push_str(text);
        self.dirty = true;
    }

    /// Drop the committed region after the host has consumed it. Calling it
    /// again with nothing committed is a no-op.
    pub fn finish_commit(&mut self) {
        self.committed.clear();
    }

    /// Cursor position in characters within the pending text.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        let len = self.text.chars().count();
        self.cursor = cursor.min(len);
        self.dirty = true;
    }

    /// Highlighted span in characters within the pending text, if any.
    pub fn highlight(&self) -> Option<Range<usize>> {
        self.highlight.clone()
    }

    pub fn set_highlight(&mut self, range: Range<usize>) {
        let len = self.text.chars().count();
        self.highlight = Some(range.start.min(len)..range.end.min(len));
        self.dirty = true;
    }

    /// Whether the host display is stale for this line.
    pub fn should_update(&self) -> bool {
        self.dirty
    }

    /// Mark the line as pushed to the host.
    pub fn finish_update(&mut self) {
        self.dirty = false;
    }

    pub fn tool_tip(&self) -> &str {
        &self.tool_tip
    }

    pub fn set_tool_tip(&mut self, text: &str) {
        self.tool_tip.clear();
        self.tool_tip.push_str(text);
    }

    pub fn clear_tool_tip(&mut self) {
        self.tool_tip.clear();
    }
}
