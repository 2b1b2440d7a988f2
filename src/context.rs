//! Pluggable per-method event handling.
//!
//! An input method module is a black box that creates event handling
//! contexts. A context is long-lived mutable state with explicit session
//! bracketing: every `start_session` is paired with exactly one
//! `stop_session`. [`ContextHandle`] makes that bracket a scoped resource so
//! the stop call is guaranteed on every exit path, including early returns
//! and method switches.

use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::buffer::TextBuffer;
use crate::key::Key;
use crate::panel::CandidatePanel;

/// Per-method state machine consuming keys and mutating the session buffers.
///
/// Implementations hold the linguistic logic; the composition session only
/// routes keys and enforces the commit protocol. All `bool` returns mean
/// "handled": an unhandled key is given back to the host for default
/// processing.
pub trait EventHandlingContext {
    /// Begin a session. Called exactly once before any other method.
    fn start_session(&mut self) {}

    /// End the session. Called exactly once, after which the context is
    /// discarded.
    fn stop_session(&mut self) {}

    /// Consume one key. The context may mutate either buffer, show the
    /// candidate panel, or commit the composing buffer.
    fn handle_key(
        &mut self,
        key: &Key,
        reading: &mut TextBuffer,
        composing: &mut TextBuffer,
        panel: &mut CandidatePanel,
    ) -> bool;

    /// A candidate was chosen while this context had the panel open.
    fn candidate_selected(
        &mut self,
        candidate: &str,
        index: usize,
        reading: &mut TextBuffer,
        composing: &mut TextBuffer,
    ) -> bool;

    /// The candidate panel was dismissed without a selection.
    fn candidate_canceled(&mut self, reading: &mut TextBuffer, composing: &mut TextBuffer);

    /// Offer already-committed text to this context (the associated-phrases
    /// entry point). Returns whether the context wants the next key.
    fn handle_direct_text(
        &mut self,
        _text: &str,
        _reading: &mut TextBuffer,
        _composing: &mut TextBuffer,
        _panel: &mut CandidatePanel,
    ) -> bool {
        false
    }
}

/// A factory for event handling contexts, identified for menu display and
/// preference persistence by the platform glue.
pub trait InputMethodModule {
    fn identifier(&self) -> &str;

    fn localized_name(&self) -> &str {
        self.identifier()
    }

    fn create_context(&self) -> Box<dyn EventHandlingContext>;
}

/// Exclusive-ownership handle over a started context.
///
/// Construction starts the session; dropping the handle stops it. There is
/// no other way to obtain a started context, so the start/stop bracket
/// cannot be unbalanced.
pub struct ContextHandle {
    context: Box<dyn EventHandlingContext>,
}

impl ContextHandle {
    pub fn start(mut context: Box<dyn EventHandlingContext>) -> Self {
        context.start_session();
        debug!("context session started");
        Self { context }
    }
}

impl Deref for ContextHandle {
    type Target = dyn EventHandlingContext;

    fn deref(&self) -> &Self::Target {
        self.context.as_ref()
    }
}

impl DerefMut for ContextHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context.as_mut()
    }
}

impl Drop for ContextHandle {
    fn drop(&mut self) {
        self.context.stop_session();
        debug!("context session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CountingContext {
        starts: Rc<RefCell<u32>>,
        stops: Rc<RefCell<u32>>,
    }

    impl EventHandlingContext for CountingContext {
        fn start_session(&mut self) {
            *self.starts.borrow_mut() += 1;
        }

        fn stop_session(&mut self) {
            *self.stops.borrow_mut() += 1;
        }

        fn handle_key(
            &mut self,
            _key: &Key,
            _reading: &mut TextBuffer,
            _composing: &mut TextBuffer,
            _panel: &mut CandidatePanel,
        ) -> bool {
            false
        }

        fn candidate_selected(
            &mut self,
            _candidate: &str,
            _index: usize,
            _reading: &mut TextBuffer,
            _composing: &mut TextBuffer,
        ) -> bool {
            false
        }

        fn candidate_canceled(&mut self, _reading: &mut TextBuffer, _composing: &mut TextBuffer) {}
    }

    #[test]
    fn handle_brackets_session_exactly_once() {
        let starts = Rc::new(RefCell::new(0));
        let stops = Rc::new(RefCell::new(0));
        {
            let _handle = ContextHandle::start(Box::new(CountingContext {
                starts: starts.clone(),
                stops: stops.clone(),
            }));
            assert_eq!(*starts.borrow(), 1);
            assert_eq!(*stops.borrow(), 0);
        }
        assert_eq!(*starts.borrow(), 1);
        assert_eq!(*stops.borrow(), 1);
    }
}
