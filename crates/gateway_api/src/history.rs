use serde::Deserialize;

use crate::client::GatewayClient;
use crate::error::GatewayError;
use crate::url::{history_url, ApiRoute};

/// One stored turn as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub chat_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    #[serde(default)]
    messages: Option<Vec<HistoryMessage>>,
}

/// Decode a history body; a missing `messages` array means no history.
pub fn parse_history(body: &str) -> Result<Vec<HistoryMessage>, GatewayError> {
    let parsed: HistoryBody = serde_json::from_str(body)?;
    Ok(parsed.messages.unwrap_or_default())
}

/// Sort sessions most recent first. RFC 3339 timestamps order lexically.
pub fn sort_sessions(sessions: &mut [SessionSummary]) {
    sessions.sort_by(|left, right| right.last_message_at.cmp(&left.last_message_at));
}

impl GatewayClient {
    pub async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryMessage>, GatewayError> {
        let url = history_url(
            &self.config().base_url,
            session_id,
            self.config().history_limit,
        );
        let body: HistoryBody = self.get_json(&url).await?;
        let messages = body.messages.unwrap_or_default();
        tracing::debug!(session_id, count = messages.len(), "loaded history");
        Ok(messages)
    }

    pub async fn fetch_session_list(&self) -> Result<Vec<SessionSummary>, GatewayError> {
        let url = self.endpoint(ApiRoute::ChatSessionList);
        let mut sessions: Vec<SessionSummary> = self.get_json(&url).await?;
        sort_sessions(&mut sessions);
        Ok(sessions)
    }
}
