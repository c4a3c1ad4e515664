use serde::{Deserialize, Serialize};

/// Role of one prompt turn sent to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }
}

/// Reasoning budget forwarded to providers that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_thoughts: Option<bool>,
}

impl ThinkingConfig {
    /// Budget-only config; thoughts are requested back whenever the budget is positive.
    pub fn with_budget(thinking_budget: u32) -> Self {
        Self {
            thinking_budget,
            include_thoughts: (thinking_budget > 0).then_some(true),
        }
    }
}

/// Request body for the chat stream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStreamRequest {
    /// Client-assigned session id; authoritative for routing.
    pub chat_id: String,
    pub messages: Vec<Turn>,
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

impl ChatStreamRequest {
    pub fn new(
        chat_id: impl Into<String>,
        system_prompt: &str,
        prompt: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            messages: vec![Turn::system(system_prompt), Turn::user(prompt)],
            provider: provider.into(),
            model: model.into(),
            thinking_config: None,
        }
    }

    pub fn with_thinking_budget(mut self, budget: Option<u32>) -> Self {
        self.thinking_config = budget.map(ThinkingConfig::with_budget);
        self
    }

    /// Text of the final user turn.
    pub fn prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|turn| turn.role == TurnRole::User)
            .map(|turn| turn.content.as_str())
    }
}
