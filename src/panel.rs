//! Candidate panel: a secondary state machine for multi-candidate selection.
//!
//! While the panel is in control it consumes keys before any context sees
//! them. The panel holds no linguistic logic; contexts fill it with
//! candidates and interpret the selection it reports.

use std::ops::Range;

use tracing::trace;

use crate::key::{FunctionKey, Key};

/// A single conversion candidate offered for disambiguation.
///
/// `explanation` is optional advisory text the UI layer may show next to
/// the candidate (e.g. a character variant note).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub explanation: Option<String>,
}

impl Candidate {
    pub fn new<T: Into<String>>(text: T) -> Self {
        Candidate {
            text: text.into(),
            explanation: None,
        }
    }

    pub fn with_explanation<T: Into<String>, E: Into<String>>(text: T, explanation: E) -> Self {
        Candidate {
            text: text.into(),
            explanation: Some(explanation.into()),
        }
    }
}

/// Paginated candidate storage with a highlight cursor.
#[derive(Debug, Clone)]
pub struct CandidateList {
    candidates: Vec<Candidate>,
    page_size: usize,
    current_page: usize,
    cursor: usize,
}

impl CandidateList {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            candidates: Vec::new(),
            page_size: page_size.max(1),
            current_page: 0,
            cursor: 0,
        }
    }

    pub fn set_candidates(&mut self, candidates: Vec<Candidate>) {
        self.candidates = candidates;
        self.current_page = 0;
        self.cursor = 0;
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn num_pages(&self) -> usize {
        self.candidates.len().div_ceil(self.page_size)
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    fn current_page_range(&self) -> Range<usize> {
        let start = self.current_page * self.page_size;
        let end = (start + self.page_size).min(self.candidates.len());
        start..end
    }

    pub fn current_page_candidates(&self) -> &[Candidate] {
        &self.candidates[self.current_page_range()]
    }

    fn current_page_len(&self) -> usize {
        self.current_page_range().len()
    }

    /// Global index of the highlighted candidate.
    pub fn highlighted_index(&self) -> Option<usize> {
        let index = self.current_page * self.page_size + self.cursor;
        (index < self.candidates.len()).then_some(index)
    }

    pub fn highlight_previous(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    pub fn highlight_next(&mut self) -> bool {
        if self.cursor + 1 < self.current_page_len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn page_up(&mut self) -> bool {
        if self.current_page > 0 {
            self.current_page -= 1;
            self.clamp_cursor();
            true
        } else {
            false
        }
    }

    pub fn page_down(&mut self) -> bool {
        if self.current_page + 1 < self.num_pages() {
            self.current_page += 1;
            self.clamp_cursor();
            true
        } else {
            false
        }
    }

    fn clamp_cursor(&mut self) {
        let len = self.current_page_len();
        if len > 0 && self.cursor >= len {
            self.cursor = len - 1;
        }
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.current_page = 0;
        self.cursor = 0;
    }
}

/// Whether the panel is arbitrating keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Idle,
    InControl,
}

/// Outcome of offering a key to the panel.
///
/// The set is closed by design; callers match exhaustively with no default
/// arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKeyResult {
    /// Panel consumed the key (navigation, paging).
    Handled,
    /// User picked the candidate at this global index.
    CandidateSelected(usize),
    /// User dismissed the panel.
    Canceled,
    /// Key means nothing to the panel; offer it to the context.
    NonCandidatePanelKey,
    /// Key rejected; caller should emit an audible alert.
    Invalid,
}

/// The candidate-selection overlay state machine.
#[derive(Debug, Clone)]
pub struct CandidatePanel {
    list: CandidateList,
    state: PanelState,
    key_labels: Vec<char>,
}

impl CandidatePanel {
    pub fn new(key_labels: &str, page_size: usize) -> Self {
        Self {
            list: CandidateList::with_page_size(page_size.max(1)),
            state: PanelState::Idle,
            key_labels: key_labels.chars().collect(),
        }
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn is_in_control(&self) -> bool {
        self.state == PanelState::InControl
    }

    /// Show the panel with a fresh candidate list and take control of keys.
    pub fn show(&mut self, candidates: Vec<Candidate>) {
        trace!(count = candidates.len(), "candidate panel shown");
        self.list.set_candidates(candidates);
        self.state = PanelState::InControl;
    }

    /// Hide the panel and release control.
    pub fn hide(&mut self) {
        self.state = PanelState::Idle;
    }

    /// Drop all candidates and release control.
    pub fn reset(&mut self) {
        self.list.clear();
        self.state = PanelState::Idle;
    }

    pub fn list(&self) -> &CandidateList {
        &self.list
    }

    // UI-facing accessors: the panel renderer consumes only these.

    pub fn candidate_count(&self) -> usize {
        self.list.len()
    }

    pub fn candidate_at(&self, index: usize) -> Option<&str> {
        self.list.candidates().get(index).map(|c| c.text.as_str())
    }

    pub fn explanation_at(&self, index: usize) -> Option<&str> {
        self.list
            .candidates()
            .get(index)
            .and_then(|c| c.explanation.as_deref())
    }

    pub fn highlighted_index(&self) -> Option<usize> {
        self.list.highlighted_index()
    }

    /// Arbitrate one key while in control.
    ///
    /// A key matching a candidate label wins over any other interpretation,
    /// even if the same character would be a valid compose character for the
    /// context.
    pub fn handle_key(&mut self, key: &Key) -> PanelKeyResult {
        if self.state == PanelState::Idle {
            return PanelKeyResult::NonCandidatePanelKey;
        }

        if let Some(ch) = key.printable_char() {
            if let Some(label_index) = self.key_labels.iter().position(|&l| l == ch) {
                return self.select_on_page(label_index);
            }
        }

        if let Some(func) = key.func() {
            let moved = match func {
                FunctionKey::Left | FunctionKey::Up => self.move_highlight(false),
                FunctionKey::Right | FunctionKey::Down => self.move_highlight(true),
                FunctionKey::PageUp => self.list.page_up(),
                FunctionKey::PageDown => self.list.page_down(),
                _ => return PanelKeyResult::NonCandidatePanelKey,
            };
            return if moved {
                PanelKeyResult::Handled
            } else {
                PanelKeyResult::Invalid
            };
        }

        match key.ascii() {
            // Esc dismisses; Backspace also cancels so the context can take
            // the reading line back.
            Some(27) | Some(8) => {
                self.state = PanelState::Idle;
                PanelKeyResult::Canceled
            }
            // Return selects the highlighted candidate.
            Some(13) => match self.list.highlighted_index() {
                Some(index) => {
                    self.state = PanelState::Idle;
                    PanelKeyResult::CandidateSelected(index)
                }
                None => PanelKeyResult::Invalid,
            },
            // Space pages forward, wrapping to the first page at the end.
            Some(32) => {
                if !self.list.page_down() && self.list.num_pages() > 1 {
                    while self.list.page_up() {}
                }
                PanelKeyResult::Handled
            }
            _ => PanelKeyResult::NonCandidatePanelKey,
        }
    }

    fn move_highlight(&mut self, forward: bool) -> bool {
        if forward {
            if self.list.highlight_next() {
                return true;
            }
            // Crossing the page edge lands on the first candidate of the
            // next page.
            if self.list.page_down() {
                self.list.cursor = 0;
                return true;
            }
            false
        } else {
            if self.list.highlight_previous() {
                return true;
            }
            if self.list.page_up() {
                self.list.cursor = self.list.current_page_len().saturating_sub(1);
                return true;
            }
            false
        }
    }

    fn select_on_page(&mut self, label_index: usize) -> PanelKeyResult {
        let page_start = self.list.current_page() * self.list.page_size;
        let page_len = self.list.current_page_len();
        if label_index < page_len {
            self.state = PanelState::Idle;
            PanelKeyResult::CandidateSelected(page_start + label_index)
        } else {
            PanelKeyResult::Invalid
        }
    }
}
