use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

/// Longest error body kept for display, in characters.
pub const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug)]
pub enum GatewayError {
    InvalidBaseUrl(String),
    InvalidHeader(String),
    Request(reqwest::Error),
    /// Non-2xx response with the extracted, truncated body message.
    Status(StatusCode, String),
    Serde(JsonError),
    InvalidUpload(String),
    Io(std::io::Error),
    /// The caller's cancellation signal was raised.
    Cancelled,
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<ErrorPayloadValue>,
    message: Option<String>,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorPayloadValue {
    Text(String),
    Fields { message: Option<String> },
}

impl GatewayError {
    /// True for the distinguishable cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(status, _) => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl(message) => write!(f, "invalid base url: {message}"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {} {message}", status.as_u16()),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::InvalidUpload(message) => write!(f, "invalid upload: {message}"),
            Self::Io(error) => write!(f, "I/O error: {error}"),
            Self::Cancelled => write!(f, "request was cancelled"),
            Self::Unknown(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(error) => Some(error),
            Self::Serde(error) => Some(error),
            Self::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for GatewayError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

/// Extract a display message from an error response body, truncated to
/// [`MAX_ERROR_BODY_CHARS`].
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    let parsed = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| {
            let nested = match payload.error {
                Some(ErrorPayloadValue::Text(text)) => Some(text),
                Some(ErrorPayloadValue::Fields { message }) => message,
                None => None,
            };
            nested.or(payload.message).or(payload.detail)
        })
        .filter(|message| !message.trim().is_empty());

    let message = match parsed {
        Some(message) => message,
        None if body.is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        None => body.to_string(),
    };

    truncate_chars(&message, MAX_ERROR_BODY_CHARS)
}

/// Truncate on a character boundary, marking the cut with an ellipsis.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &value[..cut]),
        None => value.to_string(),
    }
}
