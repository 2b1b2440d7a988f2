//! Registry of input method modules and session-wide toggles.
//!
//! The registry replaces ambient global lookup: it is constructed by the
//! platform glue, populated with modules, and handed to the composition
//! session at construction. It also owns the commit-text filter chain
//! (script conversion plus NFC normalization) applied to every string that
//! reaches the host.

use ahash::AHashMap;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::context::InputMethodModule;
use crate::Config;

/// Direction of the script-conversion filter applied to committed text.
///
/// A single enum rather than two booleans, so the directions cannot both be
/// enabled at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptConversion {
    #[default]
    Off,
    TraditionalToSimplified,
    SimplifiedToTraditional,
}

/// External collaborator performing the actual script conversion. The core
/// only routes text through it.
pub trait ScriptConverter {
    fn convert(&self, text: &str, direction: ScriptConversion) -> String;
}

/// Registered modules, the active-method identifier, feature toggles and
/// the commit filter.
pub struct ModuleRegistry {
    modules: AHashMap<String, Box<dyn InputMethodModule>>,
    order: Vec<String>,
    active: Option<String>,
    associated: Option<Box<dyn InputMethodModule>>,
    converter: Option<Box<dyn ScriptConverter>>,
    config: Config,
}

impl ModuleRegistry {
    pub fn new(config: Config) -> Self {
        Self {
            modules: AHashMap::new(),
            order: Vec::new(),
            active: None,
            associated: None,
            converter: None,
            config,
        }
    }

    /// Register a module. The first registered module becomes active.
    pub fn register(&mut self, module: Box<dyn InputMethodModule>) {
        let identifier = module.identifier().to_string();
        if !self.modules.contains_key(&identifier) {
            self.order.push(identifier.clone());
        }
        self.modules.insert(identifier.clone(), module);
        if self.active.is_none() {
            self.active = Some(identifier);
        }
    }

    /// Register the module backing the associated-phrases overlay.
    pub fn register_associated(&mut self, module: Box<dyn InputMethodModule>) {
        self.associated = Some(module);
    }

    pub fn set_converter(&mut self, converter: Box<dyn ScriptConverter>) {
        self.converter = Some(converter);
    }

    /// Registered identifiers in registration order, for menu construction.
    pub fn identifiers(&self) -> &[String] {
        &self.order
    }

    pub fn active_identifier(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Make another registered module the active one.
    pub fn select(&mut self, identifier: &str) -> Result<()> {
        if !self.modules.contains_key(identifier) {
            return Err(anyhow!("unknown input method: {identifier}"));
        }
        self.active = Some(identifier.to_string());
        Ok(())
    }

    pub fn active_module(&self) -> Option<&dyn InputMethodModule> {
        self.active
            .as_deref()
            .and_then(|id| self.modules.get(id))
            .map(|m| m.as_ref())
    }

    pub fn associated_module(&self) -> Option<&dyn InputMethodModule> {
        self.associated.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Apply the commit filter chain: script conversion for the configured
    /// direction, then NFC normalization.
    pub fn filtered(&self, text: &str) -> String {
        let converted = match (self.config.script_conversion, &self.converter) {
            (ScriptConversion::Off, _) | (_, None) => text.to_string(),
            (direction, Some(converter)) => converter.convert(text, direction),
        };
        converted.nfc().collect()
    }
}
