//! Merges the composing and reading lines into one marked-text view.
//!
//! The host sees a single uncommitted string; the reading line is rendered
//! after the composing line and the selection range covers exactly the
//! reading segment so the host can highlight the in-progress phonetic input.

use std::ops::Range;

use crate::buffer::TextBuffer;

/// One rendered marked-text string plus the selection locating the reading
/// segment inside it. Indices are in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedDisplay {
    pub text: String,
    pub selection: Range<usize>,
}

impl CombinedDisplay {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            selection: 0..0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Combine the two buffers. Ownership stays with the caller.
pub fn combine(composing: &TextBuffer, reading: &TextBuffer) -> CombinedDisplay {
    let composed = composing.composed_text();
    let read = reading.composed_text();

    let mut text = String::with_capacity(composed.len() + read.len());
    text.push_str(composed);
    text.push_str(read);

    let start = composed.chars().count();
    let end = start + read.chars().count();

    CombinedDisplay {
        text,
        selection: start..end,
    }
}
