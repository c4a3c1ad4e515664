/// Default gateway origin used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Backend routes the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRoute {
    AuthCheck,
    AuthRefresh,
    ChatSessionList,
    ChatStream,
    ChatHistoryBase,
    UploadUrl,
    ReadUrl,
}

impl ApiRoute {
    pub fn path(self) -> &'static str {
        match self {
            Self::AuthCheck => "/auth/check",
            Self::AuthRefresh => "/auth/refresh",
            Self::ChatSessionList => "/api/chat/session_list",
            Self::ChatStream => "/api/chat/stream",
            Self::ChatHistoryBase => "/api/chat",
            Self::UploadUrl => "/api/get-upload-url",
            Self::ReadUrl => "/api/get-read-url",
        }
    }
}

/// Normalize a configured origin: trim whitespace and trailing slashes, fall
/// back to [`DEFAULT_BASE_URL`] when empty.
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

/// Join a base URL with a route path.
pub fn endpoint(base_url: &str, route: ApiRoute) -> String {
    format!("{}{}", normalize_base_url(base_url), route.path())
}

/// History endpoint for one session: `{base}/api/chat/{id}/history?limit=N`.
pub fn history_url(base_url: &str, session_id: &str, limit: u32) -> String {
    format!(
        "{}/{}/history?limit={limit}",
        endpoint(base_url, ApiRoute::ChatHistoryBase),
        session_id.trim()
    )
}

/// Read-URL lookup for an uploaded object.
pub fn read_url(base_url: &str, object_key: &str) -> String {
    format!(
        "{}?objectKey={}",
        endpoint(base_url, ApiRoute::ReadUrl),
        encode_query_value(object_key)
    )
}

fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
