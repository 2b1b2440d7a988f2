//! Integration tests for the composition session protocol.
//!
//! These drive a session with a scripted table-based context and a
//! recording host, covering the per-key routing order, the commit boundary,
//! candidate-panel arbitration and the associated-phrases fallthrough.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;

use libcompose::{
    Candidate, CandidatePanel, CompositionSession, Config, EventHandlingContext, HostClient,
    InputMethodModule, Key, Modifiers, ModuleRegistry, PanelState, Rect, TextBuffer,
};
use libcompose::AssociatedPhrasesState;

// ---- recording host ----

#[derive(Default)]
struct RecordingHost {
    id: String,
    marked: Vec<(String, Range<usize>)>,
    inserted: Vec<String>,
    beeps: usize,
    bounds: HashMap<usize, Rect>,
}

impl RecordingHost {
    fn new() -> Self {
        Self {
            id: "com.example.editor".to_string(),
            ..Self::default()
        }
    }

    fn with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

impl HostClient for RecordingHost {
    fn client_id(&self) -> &str {
        &self.id
    }

    fn set_marked_text(&mut self, text: &str, selection: Range<usize>) {
        self.marked.push((text.to_string(), selection));
    }

    fn insert_text(&mut self, text: &str) {
        assert!(!text.is_empty(), "insert_text must never see empty strings");
        self.inserted.push(text.to_string());
    }

    fn insertion_point_bounds(&mut self, index: usize) -> Option<Rect> {
        self.bounds.get(&index).copied()
    }

    fn beep(&mut self) {
        self.beeps += 1;
    }
}

// ---- scripted primary context ----

#[derive(Default)]
struct ContextLog {
    starts: usize,
    stops: usize,
    general_keys: Vec<String>,
    selections: Vec<(String, usize)>,
    cancels: usize,
}

/// Table-based conversion context: printable keys accumulate in the reading
/// line; space converts the reading through a fixed table, committing a
/// single match directly and opening the panel for multiple matches; return
/// moves the reading into the composing line without committing.
struct TableContext {
    table: HashMap<String, Vec<String>>,
    log: Rc<RefCell<ContextLog>>,
}

impl TableContext {
    fn describe(key: &Key) -> String {
        if let Some(ch) = key.printable_char() {
            ch.to_string()
        } else if let Some(code) = key.ascii() {
            format!("#{code}")
        } else {
            format!("{:?}", key.code())
        }
    }
}

impl EventHandlingContext for TableContext {
    fn start_session(&mut self) {
        self.log.borrow_mut().starts += 1;
    }

    fn stop_session(&mut self) {
        self.log.borrow_mut().stops += 1;
    }

    fn handle_key(
        &mut self,
        key: &Key,
        reading: &mut TextBuffer,
        composing: &mut TextBuffer,
        panel: &mut CandidatePanel,
    ) -> bool {
        self.log.borrow_mut().general_keys.push(Self::describe(key));

        match key.ascii() {
            Some(32) => {
                let matches = self.table.get(reading.composed_text()).cloned();
                match matches {
                    Some(texts) if texts.len() == 1 => {
                        composing.set_text(&texts[0]);
                        composing.commit();
                        reading.clear();
                        true
                    }
                    Some(texts) => {
                        panel.show(texts.into_iter().map(Candidate::new).collect());
                        true
                    }
                    None => {
                        if reading.is_empty() {
                            false
                        } else {
                            reading.set_tool_tip("not in table");
                            true
                        }
                    }
                }
            }
            Some(13) => {
                if reading.is_empty() {
                    false
                } else {
                    let raw = reading.composed_text().to_string();
                    composing.append(&raw);
                    reading.clear();
                    true
                }
            }
            Some(27) => {
                if reading.is_empty() {
                    false
                } else {
                    reading.clear();
                    true
                }
            }
            Some(code) if (0x21..0x7F).contains(&code) => {
                reading.append(&(code as char).to_string());
                true
            }
            _ => false,
        }
    }

    fn candidate_selected(
        &mut self,
        candidate: &str,
        index: usize,
        reading: &mut TextBuffer,
        composing: &mut TextBuffer,
    ) -> bool {
        self.log
            .borrow_mut()
            .selections
            .push((candidate.to_string(), index));
        composing.set_text(candidate);
        composing.commit();
        reading.clear();
        true
    }

    fn candidate_canceled(&mut self, reading: &mut TextBuffer, _composing: &mut TextBuffer) {
        self.log.borrow_mut().cancels += 1;
        reading.clear();
    }
}

struct TableModule {
    id: &'static str,
    log: Rc<RefCell<ContextLog>>,
}

impl InputMethodModule for TableModule {
    fn identifier(&self) -> &str {
        self.id
    }

    fn create_context(&self) -> Box<dyn EventHandlingContext> {
        let mut table = HashMap::new();
        table.insert("su3".to_string(), vec!["蘇".to_string()]);
        table.insert(
            "si4".to_string(),
            vec!["四".to_string(), "似".to_string(), "寺".to_string()],
        );
        Box::new(TableContext {
            table,
            log: self.log.clone(),
        })
    }
}

// ---- scripted associated-phrases context ----

#[derive(Default)]
struct PhraseLog {
    direct_texts: Vec<String>,
    keys: Vec<String>,
    stops: usize,
}

/// Associated-phrases context: accepts direct text "蘇" and then claims the
/// key 'x' as a continuation (committing "州"); optionally splices a suffix
/// onto the direct text through the throwaway buffer.
struct PhraseContext {
    splice_suffix: Option<String>,
    log: Rc<RefCell<PhraseLog>>,
}

impl EventHandlingContext for PhraseContext {
    fn stop_session(&mut self) {
        self.log.borrow_mut().stops += 1;
    }

    fn handle_key(
        &mut self,
        key: &Key,
        _reading: &mut TextBuffer,
        composing: &mut TextBuffer,
        _panel: &mut CandidatePanel,
    ) -> bool {
        self.log
            .borrow_mut()
            .keys
            .push(TableContext::describe(key));
        if key.printable_char() == Some('x') {
            composing.set_text("州");
            composing.commit();
            true
        } else {
            false
        }
    }

    fn candidate_selected(
        &mut self,
        candidate: &str,
        _index: usize,
        _reading: &mut TextBuffer,
        composing: &mut TextBuffer,
    ) -> bool {
        composing.set_text(candidate);
        composing.commit();
        true
    }

    fn candidate_canceled(&mut self, _reading: &mut TextBuffer, _composing: &mut TextBuffer) {}

    fn handle_direct_text(
        &mut self,
        text: &str,
        _reading: &mut TextBuffer,
        composing: &mut TextBuffer,
        _panel: &mut CandidatePanel,
    ) -> bool {
        self.log.borrow_mut().direct_texts.push(text.to_string());
        if text != "蘇" {
            return false;
        }
        if let Some(suffix) = &self.splice_suffix {
            composing.set_text(&format!("{text}{suffix}"));
            composing.commit();
        }
        true
    }
}

struct PhraseModule {
    splice_suffix: Option<String>,
    log: Rc<RefCell<PhraseLog>>,
}

impl InputMethodModule for PhraseModule {
    fn identifier(&self) -> &str {
        "phrases"
    }

    fn create_context(&self) -> Box<dyn EventHandlingContext> {
        Box::new(PhraseContext {
            splice_suffix: self.splice_suffix.clone(),
            log: self.log.clone(),
        })
    }
}

// ---- harness ----

struct Harness {
    session: CompositionSession,
    host: RecordingHost,
    log: Rc<RefCell<ContextLog>>,
    phrase_log: Rc<RefCell<PhraseLog>>,
}

fn harness_with(config: Config, splice_suffix: Option<String>) -> Harness {
    let log = Rc::new(RefCell::new(ContextLog::default()));
    let phrase_log = Rc::new(RefCell::new(PhraseLog::default()));
    let mut registry = ModuleRegistry::new(config);
    registry.register(Box::new(TableModule {
        id: "table",
        log: log.clone(),
    }));
    registry.register_associated(Box::new(PhraseModule {
        splice_suffix,
        log: phrase_log.clone(),
    }));
    let mut session = CompositionSession::new(registry);
    session.activate();
    Harness {
        session,
        host: RecordingHost::new(),
        log,
        phrase_log,
    }
}

fn harness() -> Harness {
    harness_with(Config::default(), None)
}

impl Harness {
    fn press(&mut self, ch: char) -> bool {
        let key = Key::ascii_char(ch, Modifiers::none());
        self.session.handle_key(&key, &mut self.host)
    }

    fn press_code(&mut self, code: u8) -> bool {
        let key = Key::with_code(libcompose::KeyCode::Ascii(code), Modifiers::none());
        self.session.handle_key(&key, &mut self.host)
    }

    fn type_str(&mut self, text: &str) {
        for ch in text.chars() {
            assert!(self.press(ch), "key {ch:?} should be handled");
        }
    }
}

// ---- tests ----

#[test]
fn reading_then_commit_end_to_end() {
    let mut h = harness();
    h.type_str("su3");

    // Pending reading only: marked text shows the combined string, nothing
    // inserted yet.
    let (text, selection) = h.host.marked.last().unwrap().clone();
    assert_eq!(text, "su3");
    assert_eq!(selection, 0..3);
    assert!(h.host.inserted.is_empty());

    assert!(h.press(' '));
    assert_eq!(h.host.inserted, ["蘇"]);
    assert!(h.session.reading().is_empty());
    assert!(h.session.composing().is_empty());
    assert!(!h.session.composing().is_committed());

    // The display was cleared exactly once after the commit.
    let (text, _) = h.host.marked.last().unwrap().clone();
    assert_eq!(text, "");
}

#[test]
fn at_most_one_insert_per_key() {
    let mut h = harness();
    for ch in "su3 si4".chars() {
        let before = h.host.inserted.len();
        h.press(ch);
        assert!(h.host.inserted.len() <= before + 1);
    }
}

#[test]
fn keys_unhandled_without_started_context() {
    let registry = ModuleRegistry::new(Config::default());
    let mut session = CompositionSession::new(registry);
    // No activate: no primary context exists.
    let mut host = RecordingHost::new();
    let key = Key::ascii_char('a', Modifiers::none());
    assert!(!session.handle_key(&key, &mut host));
    assert!(host.marked.is_empty());
    assert!(host.inserted.is_empty());
    assert!(session.reading().is_empty());
}

#[test]
fn panel_opens_for_ambiguous_reading() {
    let mut h = harness();
    h.type_str("si4");
    assert!(h.press(' '));
    assert_eq!(h.session.panel().state(), PanelState::InControl);
    assert_eq!(h.session.panel().candidate_count(), 3);
    assert!(h.host.inserted.is_empty());
}

#[test]
fn panel_selection_uses_selection_entry_point_only() {
    let mut h = harness();
    h.type_str("si4");
    h.press(' ');

    let keys_before = h.log.borrow().general_keys.len();
    assert!(h.press('2'));

    // The label key never reached the context's general key path.
    assert_eq!(h.log.borrow().general_keys.len(), keys_before);
    assert_eq!(h.log.borrow().selections, [("似".to_string(), 1)]);
    assert_eq!(h.host.inserted, ["似"]);
    assert_eq!(h.session.panel().state(), PanelState::Idle);
}

#[test]
fn panel_navigation_is_consumed_silently() {
    let mut h = harness();
    h.type_str("si4");
    h.press(' ');

    let keys_before = h.log.borrow().general_keys.len();
    let right = Key::function(libcompose::FunctionKey::Right, Modifiers::none());
    assert!(h.session.handle_key(&right, &mut h.host));
    assert_eq!(h.log.borrow().general_keys.len(), keys_before);
    assert!(h.host.inserted.is_empty());
}

#[test]
fn panel_cancel_notifies_context_and_skips_key_routing() {
    let mut h = harness();
    h.type_str("si4");
    h.press(' ');

    let keys_before = h.log.borrow().general_keys.len();
    assert!(h.press_code(27));
    assert_eq!(h.log.borrow().cancels, 1);
    // Cancel does not re-enter the context key path in the same cycle.
    assert_eq!(h.log.borrow().general_keys.len(), keys_before);
    assert_eq!(h.session.panel().state(), PanelState::Idle);
    assert!(h.session.reading().is_empty());
}

#[test]
fn panel_invalid_key_beeps_and_consumes() {
    let mut h = harness();
    h.type_str("si4");
    h.press(' ');

    let keys_before = h.log.borrow().general_keys.len();
    // Only three candidates: label '7' is out of range.
    assert!(h.press('7'));
    assert_eq!(h.host.beeps, 1);
    assert_eq!(h.log.borrow().general_keys.len(), keys_before);
    assert!(h.session.panel().is_in_control());
}

#[test]
fn candidate_selected_from_ui_routes_and_flushes() {
    let mut h = harness();
    h.type_str("si4");
    h.press(' ');

    assert!(h.session.candidate_selected_from_ui("四", 0, &mut h.host));
    assert_eq!(h.host.inserted, ["四"]);
    assert_eq!(h.session.panel().state(), PanelState::Idle);
    assert_eq!(h.host.beeps, 0);
}

#[test]
fn associated_phrases_armed_after_accepted_commit() {
    let mut config = Config::default();
    config.associated_phrases_enabled = true;
    let mut h = harness_with(config, None);

    h.type_str("su3");
    h.press(' ');
    assert_eq!(h.host.inserted, ["蘇"]);
    assert_eq!(h.phrase_log.borrow().direct_texts, ["蘇"]);
    assert_eq!(
        h.session.associated_state(),
        AssociatedPhrasesState::AwaitingFollowup
    );
}

#[test]
fn associated_phrases_followup_key_goes_to_phrases_first() {
    let mut config = Config::default();
    config.associated_phrases_enabled = true;
    let mut h = harness_with(config, None);

    h.type_str("su3");
    h.press(' ');

    let primary_keys_before = h.log.borrow().general_keys.len();
    assert!(h.press('x'));
    assert_eq!(h.phrase_log.borrow().keys, ["x"]);
    // Primary never saw the key.
    assert_eq!(h.log.borrow().general_keys.len(), primary_keys_before);
    assert_eq!(h.host.inserted, ["蘇", "州"]);
    // The follow-up commit "州" was not accepted as new direct text, so the
    // overlay disarms.
    assert_eq!(h.session.associated_state(), AssociatedPhrasesState::Idle);
}

#[test]
fn associated_phrases_decline_falls_through_same_cycle() {
    let mut config = Config::default();
    config.associated_phrases_enabled = true;
    let mut h = harness_with(config, None);

    h.type_str("su3");
    h.press(' ');
    assert_eq!(
        h.session.associated_state(),
        AssociatedPhrasesState::AwaitingFollowup
    );

    // 's' is declined by the phrase context and must reach the primary
    // context in the same cycle; no key is dropped.
    assert!(h.press('s'));
    assert_eq!(h.phrase_log.borrow().keys, ["s"]);
    assert_eq!(h.log.borrow().general_keys.last().unwrap(), "s");
    assert_eq!(h.session.reading().composed_text(), "s");
    assert_eq!(h.session.associated_state(), AssociatedPhrasesState::Idle);
}

#[test]
fn associated_phrase_splice_extends_commit() {
    let mut config = Config::default();
    config.associated_phrases_enabled = true;
    let mut h = harness_with(config, Some("州".to_string()));

    h.type_str("su3");
    h.press(' ');
    // The suggestion extended the commit before the host saw it, and still
    // exactly one insert happened.
    assert_eq!(h.host.inserted, ["蘇州"]);
    assert!(!h.session.composing().is_committed());
}

#[test]
fn splice_failure_leaves_commit_unchanged() {
    let mut config = Config::default();
    config.associated_phrases_enabled = true;
    let mut h = harness_with(config, None);

    h.type_str("su3");
    h.press(' ');
    assert_eq!(h.host.inserted, ["蘇"]);
}

#[test]
fn disabling_toggle_stops_phrase_context() {
    let mut config = Config::default();
    config.associated_phrases_enabled = true;
    let mut h = harness_with(config, None);
    h.type_str("su3");
    h.press(' ');

    h.session.set_associated_phrases_enabled(false);
    assert_eq!(h.phrase_log.borrow().stops, 1);
    assert_eq!(h.session.associated_state(), AssociatedPhrasesState::Idle);

    // Commits no longer reach the phrase context.
    h.type_str("su3");
    h.press(' ');
    assert_eq!(h.phrase_log.borrow().direct_texts.len(), 1);
}

#[test]
fn method_switch_restarts_context_and_flushes() {
    let log_b = Rc::new(RefCell::new(ContextLog::default()));
    let mut h = harness();
    h.session.registry_mut().register(Box::new(TableModule {
        id: "table-b",
        log: log_b.clone(),
    }));

    // Move pending text into the composing line, then switch: the pending
    // composed text is flushed as a commit.
    h.type_str("su3");
    h.press_code(13);
    assert_eq!(h.session.composing().composed_text(), "su3");

    h.session
        .switch_input_method("table-b", &mut h.host)
        .unwrap();
    assert_eq!(h.host.inserted, ["su3"]);
    assert_eq!(h.log.borrow().stops, 1);
    assert_eq!(log_b.borrow().starts, 1);
    assert!(h.session.reading().is_empty());
    assert!(h.session.composing().is_empty());
    assert_eq!(h.session.panel().state(), PanelState::Idle);

    // Unknown identifiers fail without disturbing the session.
    assert!(h
        .session
        .switch_input_method("missing", &mut h.host)
        .is_err());
}

#[test]
fn deactivate_stops_contexts_and_flushes() {
    let mut config = Config::default();
    config.associated_phrases_enabled = true;
    let mut h = harness_with(config, None);

    h.type_str("su3");
    h.press_code(13);
    h.session.deactivate(&mut h.host);

    assert_eq!(h.host.inserted, ["su3"]);
    assert_eq!(h.log.borrow().stops, 1);
    assert_eq!(h.phrase_log.borrow().stops, 1);
    assert!(!h.session.is_active());
    assert!(h.session.composing().is_empty());
    assert!(!h.session.composing().is_committed());
}

#[test]
fn deferred_display_supersedes_older_state() {
    let mut h = harness();
    h.host = RecordingHost::with_id("com.google.Chrome");

    h.press('s');
    h.press('u');
    // Nothing pushed directly; the one-slot queue holds only the newest
    // state.
    assert!(h.host.marked.is_empty());
    let pending = h.session.take_deferred_display().unwrap();
    assert_eq!(pending.text, "su");
    assert!(h.session.take_deferred_display().is_none());
}

#[test]
fn direct_clients_are_not_deferred() {
    let mut h = harness();
    h.press('s');
    assert_eq!(h.host.marked.last().unwrap().0, "s");
    assert!(h.session.take_deferred_display().is_none());
}

#[test]
fn panel_anchor_falls_back_to_index_zero() {
    let mut h = harness();
    h.type_str("su3");

    // Host reports attributes only at index 0.
    h.host.bounds.insert(0, Rect::new(10.0, 20.0, 1.0, 16.0));
    let rect = h.session.panel_anchor(&mut h.host);
    assert_eq!(rect, Rect::new(10.0, 20.0, 1.0, 16.0));

    // No attributes anywhere: default caret box.
    h.host.bounds.clear();
    let rect = h.session.panel_anchor(&mut h.host);
    assert_eq!(rect, Rect::new(0.0, 0.0, 16.0, 16.0));
}

#[test]
fn control_bracket_reaches_context_remapped() {
    let mut h = harness();
    let consumed = h.session.receive_key_event(
        "\u{1b}",
        0x21,
        Modifiers::control(),
        &mut h.host,
    );
    assert!(consumed);
    assert_eq!(h.log.borrow().general_keys.last().unwrap(), "[");
    assert_eq!(h.session.reading().composed_text(), "[");

    let consumed = h.session.receive_key_event(
        "\u{1b}",
        0x21,
        Modifiers::control_shift(),
        &mut h.host,
    );
    assert!(consumed);
    assert_eq!(h.log.borrow().general_keys.last().unwrap(), "{");
}

#[test]
fn tooltip_cleared_on_next_key() {
    let mut h = harness();
    // A reading with no table entry leaves an advisory tooltip behind.
    h.type_str("zz");
    h.press(' ');
    assert_eq!(h.session.tool_tip_text(), "not in table");

    // The next key clears it before any routing happens.
    h.press('a');
    assert_eq!(h.session.tool_tip_text(), "");
}
