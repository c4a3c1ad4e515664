use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire shape a provider used to mark reasoning text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtEncoding {
    /// `{"thought": true, "content": "..."}`
    Flag,
    /// `{"thought": "..."}`
    Field,
    /// `{"type": "think", "content": "..."}`
    Typed,
}

/// Token accounting reported at the end of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_tokens: Option<u64>,
}

/// Stream event emitted by the parser after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Content {
        text: String,
    },
    Thought {
        text: String,
        encoding: ThoughtEncoding,
    },
    /// Informational echo of the backend's idea of the session id.
    SessionInfo {
        session_id: String,
    },
    ContentStart,
    UsageSummary {
        usage: UsageSummary,
    },
    StreamEnd,
    Error {
        message: String,
    },
}

/// Map one decoded `data:` payload into zero or more normalized events.
///
/// A single record can carry text alongside a terminal `type` (for example a
/// final `content` with `stream_end`); text is always emitted first.
pub fn normalize_record(value: &Value) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let event_type = value.get("type").and_then(Value::as_str);

    if let Some(message) = error_message(value, event_type) {
        events.push(StreamEvent::Error { message });
        return events;
    }

    push_text_events(value, event_type, &mut events);

    match event_type {
        Some("session_info") | Some("chat_id_update") => {
            if let Some(session_id) = first_str(value, &["sessionId", "session_id", "chatId"]) {
                events.push(StreamEvent::SessionInfo {
                    session_id: session_id.to_owned(),
                });
            }
        }
        Some("content_start") => events.push(StreamEvent::ContentStart),
        Some("usage_summary") => events.push(StreamEvent::UsageSummary {
            usage: usage_summary(value),
        }),
        Some("stream_end") => events.push(StreamEvent::StreamEnd),
        _ => {}
    }

    events
}

fn push_text_events(value: &Value, event_type: Option<&str>, events: &mut Vec<StreamEvent>) {
    if event_type == Some("think") {
        if let Some(text) = first_str(value, &["content", "text", "thought"]).and_then(non_empty) {
            events.push(StreamEvent::Thought {
                text: text.to_owned(),
                encoding: ThoughtEncoding::Typed,
            });
        }
        return;
    }

    let content = value
        .get("content")
        .and_then(Value::as_str)
        .and_then(non_empty);

    match value.get("thought") {
        Some(Value::Bool(true)) => {
            if let Some(text) = content {
                events.push(StreamEvent::Thought {
                    text: text.to_owned(),
                    encoding: ThoughtEncoding::Flag,
                });
            }
            return;
        }
        Some(Value::String(text)) => {
            if let Some(text) = non_empty(text) {
                events.push(StreamEvent::Thought {
                    text: text.to_owned(),
                    encoding: ThoughtEncoding::Field,
                });
            }
        }
        _ => {}
    }

    if let Some(text) = content {
        events.push(StreamEvent::Content {
            text: text.to_owned(),
        });
    }
}

fn error_message(value: &Value, event_type: Option<&str>) -> Option<String> {
    let nested = value.get("error").and_then(|error| match error {
        Value::String(message) => Some(message.clone()),
        Value::Object(_) => Some(
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Stream error from backend")
                .to_owned(),
        ),
        _ => None,
    });

    if nested.is_some() {
        return nested;
    }

    if event_type == Some("error") {
        return Some(
            value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Stream error from backend")
                .to_owned(),
        );
    }

    None
}

fn usage_summary(value: &Value) -> UsageSummary {
    let source = value
        .get("usage")
        .or_else(|| value.get("usageMetadata"))
        .unwrap_or(value);
    UsageSummary {
        input_tokens: first_u64(source, &["inputTokens", "input_tokens", "promptTokenCount"]),
        output_tokens: first_u64(
            source,
            &["outputTokens", "output_tokens", "candidatesTokenCount"],
        ),
        thought_tokens: first_u64(
            source,
            &["thoughtTokens", "thought_tokens", "thoughtsTokenCount"],
        ),
    }
}

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
}

fn first_u64(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_u64))
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
