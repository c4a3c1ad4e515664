//! Static catalog of chat models and their thinking-budget policies.
//!
//! Model identity and provider names are opaque strings forwarded to the
//! backend. The only behavior this crate owns is resolving the thinking budget
//! a request should carry for a given toggle state.

mod catalog;
mod error;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use catalog::builtin_models;
pub use error::RegistryError;

/// How a model exposes its reasoning budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThinkingPolicy {
    /// Whether the user may switch thinking on and off.
    pub toggleable: bool,
    /// Toggle state before the user touches it.
    #[serde(default)]
    pub default_on: bool,
    #[serde(default)]
    pub budget_when_on: u32,
    #[serde(default)]
    pub budget_when_off: u32,
    /// Budget always sent when the policy is not toggleable.
    #[serde(default)]
    pub fixed_budget: Option<u32>,
    #[serde(default)]
    pub min_budget: u32,
    #[serde(default)]
    pub max_budget: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub id: String,
    pub provider: String,
    pub display_name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub thinking_policy: Option<ThinkingPolicy>,
}

impl ModelConfig {
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            display_name: display_name.into(),
            short_name: None,
            is_default: false,
            thinking_policy: None,
        }
    }

    #[must_use]
    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = Some(short_name.into());
        self
    }

    #[must_use]
    pub fn with_thinking_policy(mut self, policy: ThinkingPolicy) -> Self {
        self.thinking_policy = Some(policy);
        self
    }

    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Label for narrow displays.
    pub fn label(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.display_name)
    }

    pub fn supports_thinking_toggle(&self) -> bool {
        self.thinking_policy
            .as_ref()
            .is_some_and(|policy| policy.toggleable)
    }

    /// Toggle state used when the session has no explicit preference.
    pub fn default_thinking_enabled(&self) -> bool {
        self.thinking_policy
            .as_ref()
            .is_some_and(|policy| policy.default_on)
    }

    /// Budget to send for this model.
    ///
    /// Toggleable policies pick the on/off budget, falling back to the
    /// policy default when `enabled` is unset. Fixed policies always send
    /// their fixed budget. Models without a policy send nothing.
    pub fn thinking_budget(&self, enabled: Option<bool>) -> Option<u32> {
        let policy = self.thinking_policy.as_ref()?;
        if policy.toggleable {
            if enabled.unwrap_or(policy.default_on) {
                Some(policy.budget_when_on)
            } else {
                Some(policy.budget_when_off)
            }
        } else {
            policy.fixed_budget
        }
    }
}

/// Immutable list of selectable models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRegistry {
    models: Vec<ModelConfig>,
}

impl ModelRegistry {
    pub fn new(models: Vec<ModelConfig>) -> Result<Self, RegistryError> {
        if models.is_empty() {
            return Err(RegistryError::Empty);
        }
        for (index, model) in models.iter().enumerate() {
            if model.id.trim().is_empty() {
                return Err(RegistryError::BlankId { index });
            }
            if models[..index].iter().any(|other| other.id == model.id) {
                return Err(RegistryError::DuplicateId {
                    id: model.id.clone(),
                });
            }
        }
        Ok(Self { models })
    }

    pub fn builtin() -> Self {
        Self {
            models: builtin_models(),
        }
    }

    /// Parse a JSON array of model entries.
    pub fn from_json(source: &str) -> Result<Self, RegistryError> {
        let models: Vec<ModelConfig> = serde_json::from_str(source)?;
        Self::new(models)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let source = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&source)
    }

    pub fn all(&self) -> &[ModelConfig] {
        &self.models
    }

    pub fn find(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|model| model.id == id)
    }

    /// First model flagged default, else the first entry.
    pub fn default_model(&self) -> &ModelConfig {
        self.models
            .iter()
            .find(|model| model.is_default)
            .unwrap_or(&self.models[0])
    }

    /// Model for `id`, or the default when the id is unknown or unset.
    pub fn resolve(&self, id: Option<&str>) -> &ModelConfig {
        id.and_then(|id| self.find(id))
            .unwrap_or_else(|| self.default_model())
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
