//! Per-chat model selection and thinking toggle.
//!
//! Preferences are keyed by session id, with [`NEW_CHAT_KEY`] standing in for
//! the chat that does not have an id yet. The store is plain owned data held
//! by the application; nothing here is global.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Preference key for the new-chat page before a session id exists.
pub const NEW_CHAT_KEY: &str = "new";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPreferences {
    models: HashMap<String, String>,
    thinking: HashMap<String, bool>,
}

impl SessionPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model_for(&self, key: &str) -> Option<&str> {
        self.models.get(key).map(String::as_str)
    }

    pub fn set_model(&mut self, key: impl Into<String>, model_id: impl Into<String>) {
        self.models.insert(key.into(), model_id.into());
    }

    /// Carry the new-chat selections over to a freshly assigned session id.
    ///
    /// Existing entries for `session_id` win; the new-chat entries are left in
    /// place so the next new chat starts with the same choice.
    pub fn prime_model(&mut self, session_id: &str) {
        if let Some(model) = self.models.get(NEW_CHAT_KEY).cloned() {
            self.models.entry(session_id.to_owned()).or_insert(model);
        }
        if let Some(enabled) = self.thinking.get(NEW_CHAT_KEY).copied() {
            self.thinking.entry(session_id.to_owned()).or_insert(enabled);
        }
    }

    pub fn thinking_enabled_for(&self, key: &str) -> Option<bool> {
        self.thinking.get(key).copied()
    }

    pub fn set_thinking_enabled(&mut self, key: impl Into<String>, enabled: bool) {
        self.thinking.insert(key.into(), enabled);
    }

    pub fn forget(&mut self, key: &str) {
        self.models.remove(key);
        self.thinking.remove(key);
    }

    pub fn clear(&mut self) {
        self.models.clear();
        self.thinking.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.thinking.is_empty()
    }
}
