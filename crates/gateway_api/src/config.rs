use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_BASE_URL;

/// Default number of history turns requested per session.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Transport configuration for gateway requests.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Origin of the chat backend.
    pub base_url: String,
    /// Value of the `X-Client-Platform` header.
    pub client_platform: String,
    /// Raw `name=value; name2=value2` cookie string seeded into the cookie jar.
    pub session_cookie: Option<String>,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional request timeout.
    pub timeout: Option<Duration>,
    pub history_limit: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_platform: "Web".to_string(),
            session_cookie: None,
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_client_platform(mut self, platform: impl Into<String>) -> Self {
        self.client_platform = platform.into();
        self
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}
