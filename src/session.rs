//! Composition session: the orchestrating state machine.
//!
//! The session owns the reading and composing buffers, the candidate panel
//! and the active context(s), and implements the per-key protocol: panel
//! arbitration first, then the associated-phrases fallthrough, then the
//! primary context, then the commit boundary and the display push. One key
//! event is fully processed before the next is accepted; the host's event
//! dispatch serializes calls into this type.

use std::ops::Range;

use anyhow::Result;
use tracing::{debug, trace};

use crate::buffer::TextBuffer;
use crate::combinator::{combine, CombinedDisplay};
use crate::context::ContextHandle;
use crate::host::{HostClient, Rect};
use crate::key::{normalize_key, Key, Modifiers};
use crate::panel::{CandidatePanel, PanelKeyResult};
use crate::registry::ModuleRegistry;

/// Whether the associated-phrases context governs the next key.
///
/// `AwaitingFollowup` is set when the context accepted just-committed text
/// and wants first look at the following key; it drops back to `Idle` the
/// moment the context declines a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociatedPhrasesState {
    Idle,
    AwaitingFollowup,
}

/// Long-lived owner of the composition state for one input session.
pub struct CompositionSession {
    registry: ModuleRegistry,
    reading: TextBuffer,
    composing: TextBuffer,
    panel: CandidatePanel,
    primary: Option<ContextHandle>,
    associated: Option<ContextHandle>,
    associated_state: AssociatedPhrasesState,
    deferred_display: Option<CombinedDisplay>,
}

impl CompositionSession {
    pub fn new(registry: ModuleRegistry) -> Self {
        let panel = CandidatePanel::new(
            &registry.config().select_keys,
            registry.config().page_size,
        );
        Self {
            registry,
            reading: TextBuffer::new(),
            composing: TextBuffer::new(),
            panel,
            primary: None,
            associated: None,
            associated_state: AssociatedPhrasesState::Idle,
            deferred_display: None,
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.registry
    }

    pub fn reading(&self) -> &TextBuffer {
        &self.reading
    }

    pub fn composing(&self) -> &TextBuffer {
        &self.composing
    }

    pub fn panel(&self) -> &CandidatePanel {
        &self.panel
    }

    pub fn associated_state(&self) -> AssociatedPhrasesState {
        self.associated_state
    }

    /// Whether a primary context has been started.
    pub fn is_active(&self) -> bool {
        self.primary.is_some()
    }

    /// Advisory tooltip for the UI layer: the reading line's wins, the
    /// composing line's is the fallback.
    pub fn tool_tip_text(&self) -> &str {
        if !self.reading.tool_tip().is_empty() {
            self.reading.tool_tip()
        } else {
            self.composing.tool_tip()
        }
    }

    // ---- session bracketing ----

    /// Enter `sessionActive`: start a context for the active method if none
    /// is running, and bring the associated-phrases context in line with its
    /// feature toggle.
    pub fn activate(&mut self) {
        if self.primary.is_none() {
            if let Some(module) = self.registry.active_module() {
                debug!(method = module.identifier(), "starting primary context");
                self.primary = Some(ContextHandle::start(module.create_context()));
            }
        }
        self.sync_associated_phrases();
    }

    /// Leave `sessionActive`: stop all contexts, flush pending composed
    /// text to the host, and clear every piece of per-session state.
    pub fn deactivate(&mut self, host: &mut dyn HostClient) {
        debug!("deactivating session");
        self.primary = None;
        self.associated = None;
        self.associated_state = AssociatedPhrasesState::Idle;

        // Reading-line residue would otherwise linger as marked text.
        if !self.reading.is_empty() {
            host.set_marked_text("", 0..0);
        }
        self.composing.commit();
        self.commit_to_host(host);
        self.composing.finish_commit();
        self.composing.clear();
        self.reading.clear();
        self.panel.reset();
        self.deferred_display = None;
    }

    /// Switch the active method: stop and discard the primary context,
    /// flush pending composed text, clear buffers and panel, then start a
    /// context for the newly selected method. The associated-phrases
    /// context is left alone; its lifetime follows only its feature toggle.
    pub fn switch_input_method(
        &mut self,
        identifier: &str,
        host: &mut dyn HostClient,
    ) -> Result<()> {
        self.registry.select(identifier)?;
        debug!(method = identifier, "switching input method");

        self.primary = None;
        self.composing.commit();
        self.commit_to_host(host);
        self.composing.finish_commit();
        self.composing.clear();
        self.reading.clear();
        self.panel.reset();
        host.set_marked_text("", 0..0);

        if let Some(module) = self.registry.active_module() {
            self.primary = Some(ContextHandle::start(module.create_context()));
        }
        Ok(())
    }

    /// Toggle the associated-phrases feature and start or stop its context
    /// accordingly.
    pub fn set_associated_phrases_enabled(&mut self, enabled: bool) {
        self.registry.config_mut().associated_phrases_enabled = enabled;
        self.sync_associated_phrases();
    }

    /// Bring the associated-phrases context in line with the feature
    /// toggle. Always resets the fallthrough state.
    fn sync_associated_phrases(&mut self) {
        let enabled = self.registry.config().associated_phrases_enabled;
        if enabled && self.associated.is_none() {
            if let Some(module) = self.registry.associated_module() {
                debug!("starting associated-phrases context");
                self.associated = Some(ContextHandle::start(module.create_context()));
            }
        } else if !enabled && self.associated.is_some() {
            debug!("stopping associated-phrases context");
            self.associated = None;
        }
        self.associated_state = AssociatedPhrasesState::Idle;
    }

    // ---- key handling ----

    /// Entry point for one raw key-down event from the host.
    pub fn receive_key_event(
        &mut self,
        raw_chars: &str,
        virtual_code: u16,
        modifiers: Modifiers,
        host: &mut dyn HostClient,
    ) -> bool {
        let Some(key) = normalize_key(raw_chars, virtual_code, modifiers) else {
            return false;
        };
        self.handle_key(&key, host)
    }

    /// Process one normalized key through the full protocol.
    pub fn handle_key(&mut self, key: &Key, host: &mut dyn HostClient) -> bool {
        if !self.reading.tool_tip().is_empty() || !self.composing.tool_tip().is_empty() {
            self.reading.clear_tool_tip();
            self.composing.clear_tool_tip();
        }

        // Without a started context every key degrades to unhandled and no
        // buffer is touched.
        if self.primary.is_none() {
            return false;
        }

        let mut handled = false;
        let mut offer_to_contexts = true;

        if self.panel.is_in_control() {
            match self.panel.handle_key(key) {
                PanelKeyResult::Handled => return true,
                PanelKeyResult::CandidateSelected(index) => {
                    let candidate = self
                        .panel
                        .candidate_at(index)
                        .unwrap_or_default()
                        .to_string();
                    trace!(index, candidate = %candidate, "panel selection");
                    handled = self.route_candidate_selected(&candidate, index);
                    offer_to_contexts = false;
                }
                PanelKeyResult::Canceled => {
                    trace!("panel canceled");
                    self.route_candidate_canceled();
                    handled = true;
                    offer_to_contexts = false;
                }
                PanelKeyResult::NonCandidatePanelKey => {}
                PanelKeyResult::Invalid => {
                    host.beep();
                    return true;
                }
            }
        }

        if offer_to_contexts {
            handled = self.offer_key_to_contexts(key);
        }

        self.flush_committed(host);
        self.refresh_display(host);
        handled
    }

    /// Associated-phrases fallthrough, then the primary context.
    fn offer_key_to_contexts(&mut self, key: &Key) -> bool {
        if self.associated_state == AssociatedPhrasesState::AwaitingFollowup {
            if let Some(ctx) = &mut self.associated {
                if ctx.handle_key(key, &mut self.reading, &mut self.composing, &mut self.panel) {
                    // Flag stays set: the context keeps governing.
                    return true;
                }
            }
            // Declined: the same key goes to the primary context in the
            // same cycle; no key is dropped.
            self.associated_state = AssociatedPhrasesState::Idle;
        }

        match &mut self.primary {
            Some(ctx) => {
                ctx.handle_key(key, &mut self.reading, &mut self.composing, &mut self.panel)
            }
            None => false,
        }
    }

    /// Route a panel selection to the governing context's selection entry
    /// point. The general `handle_key` path is never used for selections.
    fn route_candidate_selected(&mut self, candidate: &str, index: usize) -> bool {
        if self.associated_state == AssociatedPhrasesState::AwaitingFollowup {
            self.associated_state = AssociatedPhrasesState::Idle;
            if let Some(ctx) = &mut self.associated {
                return ctx.candidate_selected(
                    candidate,
                    index,
                    &mut self.reading,
                    &mut self.composing,
                );
            }
            return false;
        }
        match &mut self.primary {
            Some(ctx) => {
                ctx.candidate_selected(candidate, index, &mut self.reading, &mut self.composing)
            }
            None => false,
        }
    }

    fn route_candidate_canceled(&mut self) {
        if self.associated_state == AssociatedPhrasesState::AwaitingFollowup {
            self.associated_state = AssociatedPhrasesState::Idle;
            if let Some(ctx) = &mut self.associated {
                ctx.candidate_canceled(&mut self.reading, &mut self.composing);
            }
            return;
        }
        if let Some(ctx) = &mut self.primary {
            ctx.candidate_canceled(&mut self.reading, &mut self.composing);
        }
    }

    /// Selection callback from the candidate UI layer (mouse click or
    /// accessibility action rather than a key).
    pub fn candidate_selected_from_ui(
        &mut self,
        candidate: &str,
        index: usize,
        host: &mut dyn HostClient,
    ) -> bool {
        let handled = self.route_candidate_selected(candidate, index);
        if handled {
            self.panel.hide();
        } else {
            host.beep();
        }
        self.flush_committed(host);
        self.refresh_display(host);
        handled
    }

    // ---- commit boundary ----

    /// The commit boundary: offer just-committed text to the
    /// associated-phrases context, splice its result back if it committed,
    /// then flush to the host and consume the committed region. This is the
    /// single code path pairing `commit` with `finish_commit`.
    fn flush_committed(&mut self, host: &mut dyn HostClient) {
        if !self.composing.is_committed() {
            return;
        }

        let commit_text = self.composing.committed_text().to_string();
        // The feature toggle may flip while a context is still running, so
        // both the context and the preference are checked.
        let feed_associated =
            self.registry.config().associated_phrases_enabled && self.associated.is_some();

        if feed_associated {
            let mut throwaway_reading = TextBuffer::new();
            let mut throwaway_composing = TextBuffer::new();
            let accepted = match &mut self.associated {
                Some(ctx) => ctx.handle_direct_text(
                    &commit_text,
                    &mut throwaway_reading,
                    &mut throwaway_composing,
                    &mut self.panel,
                ),
                None => false,
            };
            self.associated_state = if accepted {
                AssociatedPhrasesState::AwaitingFollowup
            } else {
                AssociatedPhrasesState::Idle
            };

            // A committed throwaway buffer means the suggestion extends the
            // just-committed output; splice it in before the host sees it.
            if throwaway_composing.is_committed() {
                trace!("splicing associated-phrase result into commit");
                self.composing.finish_commit();
                let spliced = throwaway_composing.committed_text().to_string();
                self.composing.set_text(&spliced);
                self.composing.commit();
            }
        }

        self.commit_to_host(host);
        self.composing.finish_commit();
    }

    /// Push committed text to the host, filtered. Empty strings never reach
    /// `insert_text`.
    fn commit_to_host(&mut self, host: &mut dyn HostClient) {
        if !self.composing.is_committed() {
            return;
        }
        let text = self.registry.filtered(self.composing.committed_text());
        if !text.is_empty() {
            debug!(len = text.chars().count(), "committing text to host");
            host.insert_text(&text);
        }
    }

    // ---- display ----

    /// Recompute the combined display and push it if either buffer is
    /// dirty. Clients under the flush-delay policy get the update parked in
    /// a one-slot queue instead; a newer update supersedes an unapplied
    /// older one, so deferred pushes can never reorder against key events.
    fn refresh_display(&mut self, host: &mut dyn HostClient) {
        if !self.composing.should_update() && !self.reading.should_update() {
            return;
        }
        let display = combine(&self.composing, &self.reading);

        let defer = self
            .registry
            .config()
            .flush_delay_clients
            .iter()
            .any(|id| id == host.client_id());
        if defer {
            trace!(client = host.client_id(), "deferring marked-text push");
            self.deferred_display = Some(display);
        } else {
            self.deferred_display = None;
            host.set_marked_text(&display.text, display.selection.clone());
        }

        self.composing.finish_update();
        self.reading.finish_update();
    }

    /// Drain the deferred display slot. The host glue calls this one
    /// scheduling turn after `handle_key` for clients under the flush-delay
    /// policy.
    pub fn take_deferred_display(&mut self) -> Option<CombinedDisplay> {
        self.deferred_display.take()
    }

    /// Caret rectangle for auxiliary-UI placement: probe the insertion
    /// point at the reading segment's start (stepping back one when the
    /// caret sits at the very end), falling back to index 0 when the host
    /// reports nothing there.
    pub fn panel_anchor(&self, host: &mut dyn HostClient) -> Rect {
        let display = combine(&self.composing, &self.reading);
        let total = display.text.chars().count();
        let mut index = display.selection.start;
        if index == total && index > 0 {
            index -= 1;
        }
        host.insertion_point_bounds(index)
            .or_else(|| host.insertion_point_bounds(0))
            .unwrap_or(Rect::new(0.0, 0.0, 16.0, 16.0))
    }

    /// Selection range the UI layer should consider current, without
    /// recombining elsewhere.
    pub fn current_selection(&self) -> Range<usize> {
        combine(&self.composing, &self.reading).selection
    }
}
