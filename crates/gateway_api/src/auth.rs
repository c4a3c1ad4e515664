//! Cookie-session checks used by the 401 recovery path.

use serde::Deserialize;

use crate::client::GatewayClient;
use crate::error::GatewayError;
use crate::headers::APPLICATION_JSON;
use crate::url::ApiRoute;

/// Result of `GET /auth/check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCheckStatus {
    Authenticated,
    RefreshRequired,
    LoginRequired,
    /// `error` or an unrecognised status, with the backend's reason if any.
    Unknown(Option<String>),
}

#[derive(Debug, Deserialize)]
struct AuthStatusBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl AuthCheckStatus {
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<AuthStatusBody>(body) {
            Ok(parsed) => match parsed.status.as_deref() {
                Some("authenticated") => Self::Authenticated,
                Some("refresh_required") => Self::RefreshRequired,
                Some("login_required") => Self::LoginRequired,
                _ => Self::Unknown(parsed.reason),
            },
            Err(_) => Self::Unknown(None),
        }
    }
}

/// A refresh counts only when the body carries `"status": "Success"`.
pub fn refresh_succeeded(body: &str) -> bool {
    serde_json::from_str::<AuthStatusBody>(body)
        .ok()
        .and_then(|parsed| parsed.status)
        .is_some_and(|status| status == "Success")
}

impl GatewayClient {
    pub async fn check_auth(&self) -> Result<AuthCheckStatus, GatewayError> {
        let response = self
            .http
            .get(self.endpoint(ApiRoute::AuthCheck))
            .headers(self.build_headers(APPLICATION_JSON)?)
            .send()
            .await?;
        let body = response.text().await?;
        let status = AuthCheckStatus::parse(&body);
        tracing::debug!(?status, "auth check");
        Ok(status)
    }

    /// POST `/auth/refresh`. New cookies land in the client's jar.
    pub async fn refresh_session(&self) -> Result<bool, GatewayError> {
        let response = self
            .http
            .post(self.endpoint(ApiRoute::AuthRefresh))
            .headers(self.build_headers(APPLICATION_JSON)?)
            .send()
            .await?;
        let ok = response.status().is_success();
        let body = response.text().await.unwrap_or_default();
        Ok(ok && refresh_succeeded(&body))
    }
}
