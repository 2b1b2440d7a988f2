//! The host text-input environment, seen from the engine side.
//!
//! The session talks to the host only through this trait: marked-text
//! pushes, final commits, caret geometry queries and the audible alert. The
//! platform glue implements it over the real input-method kit; tests
//! implement it with a recorder.

use std::ops::Range;

/// Caret bounding rectangle in host screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// One client of the host text-input environment.
pub trait HostClient {
    /// Stable identifier of the client application, used by the per-client
    /// flush-delay policy.
    fn client_id(&self) -> &str;

    /// Push uncommitted composition state. Selection is in characters.
    fn set_marked_text(&mut self, text: &str, selection: Range<usize>);

    /// Commit finalized text. Never called with an empty string.
    fn insert_text(&mut self, text: &str);

    /// Bounding rectangle of the insertion point at a character index, if
    /// the client reports attributes there.
    fn insertion_point_bounds(&mut self, index: usize) -> Option<Rect>;

    /// Audible alert for rejected input.
    fn beep(&mut self);
}
