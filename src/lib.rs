//! libcompose
//!
//! Composition engine core for phonetic input methods: the state machine
//! that turns physical key events into committed text, mediated by a
//! pluggable conversion engine, a candidate-selection overlay and an
//! associated-phrases overlay.
//!
//! Public API:
//! - `Key` / `normalize_key` - canonical key values from raw host events
//! - `TextBuffer` - one line of the composition surface
//! - `combine` - merged marked-text view of both lines
//! - `CandidatePanel` - candidate-selection arbitration
//! - `EventHandlingContext` / `ContextHandle` - pluggable per-method state
//! - `ModuleRegistry` - injected module and toggle registry
//! - `CompositionSession` - the orchestrating protocol
//!
//! Rendering, screen geometry, localization, persistence and network I/O
//! live in the platform glue, not here.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

pub mod key;
pub use key::{normalize_key, FunctionKey, Key, KeyCode, Modifiers};

pub mod buffer;
pub use buffer::TextBuffer;

pub mod combinator;
pub use combinator::{combine, CombinedDisplay};

pub mod panel;
pub use panel::{Candidate, CandidateList, CandidatePanel, PanelKeyResult, PanelState};

pub mod context;
pub use context::{ContextHandle, EventHandlingContext, InputMethodModule};

pub mod host;
pub use host::{HostClient, Rect};

pub mod registry;
pub use registry::{ModuleRegistry, ScriptConversion, ScriptConverter};

pub mod session;
pub use session::{AssociatedPhrasesState, CompositionSession};

/// Feature toggles and session-wide settings read by the core.
///
/// Ownership of persistence lives with the platform glue; the core only
/// reads these values and reacts to toggle changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Keys labeling candidates on a panel page. First char selects the
    /// first candidate on the page, and so on.
    pub select_keys: String,

    /// Candidates per panel page.
    pub page_size: usize,

    /// Whether the associated-phrases overlay is active.
    pub associated_phrases_enabled: bool,

    /// Script-conversion filter direction for committed text.
    pub script_conversion: ScriptConversion,

    /// Client identifiers whose marked-text pushes are deferred by one
    /// scheduling turn to work around asynchronous redraw behavior.
    pub flush_delay_clients: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            select_keys: "123456789".to_string(),
            page_size: 9,
            associated_phrases_enabled: false,
            script_conversion: ScriptConversion::Off,
            flush_delay_clients: vec!["com.google.Chrome".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, content).with_context(|| format!("writing config {}", path.display()))
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing config")
    }
}
