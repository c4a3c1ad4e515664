use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::auth::AuthCheckStatus;
use crate::config::GatewayConfig;
use crate::error::{parse_error_message, GatewayError};
use crate::headers::{build_headers, APPLICATION_JSON, EVENT_STREAM};
use crate::payload::ChatStreamRequest;
use crate::url::{endpoint, normalize_base_url, ApiRoute};

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

/// Response body as an owned stream of raw chunks in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, GatewayError>>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct GatewayClient {
    pub(crate) http: Client,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let jar = Arc::new(Jar::default());
        if let Some(cookie) = config.session_cookie.as_deref() {
            let origin = Url::parse(&normalize_base_url(&config.base_url))
                .map_err(|error| GatewayError::InvalidBaseUrl(error.to_string()))?;
            for pair in cookie.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
                jar.add_cookie_str(pair, &origin);
            }
        }

        let mut builder = Client::builder().cookie_provider(jar);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(GatewayError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn endpoint(&self, route: ApiRoute) -> String {
        endpoint(&self.config.base_url, route)
    }

    pub fn build_headers(&self, accept: &str) -> Result<HeaderMap, GatewayError> {
        let headers = build_headers(&self.config, accept, None);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| GatewayError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    GatewayError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_stream_request(
        &self,
        request: &ChatStreamRequest,
    ) -> Result<RequestBuilder, GatewayError> {
        if request.chat_id.trim().is_empty() {
            return Err(GatewayError::Unknown(
                "chat stream request requires a chat id".to_owned(),
            ));
        }

        let headers = self.build_headers(EVENT_STREAM)?;
        Ok(self
            .http
            .post(self.endpoint(ApiRoute::ChatStream))
            .headers(headers)
            .json(request))
    }

    /// Send a request; a 401 runs the auth check and, when the backend asks
    /// for it, one refresh followed by exactly one retry of the request.
    ///
    /// `build` is invoked again for the retry since request builders are
    /// consumed on send.
    pub async fn send_with_auth<B>(
        &self,
        build: B,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, GatewayError>
    where
        B: Fn() -> Result<RequestBuilder, GatewayError>,
    {
        let build = &build;
        retry_unauthorized(
            move || async move { Ok::<_, GatewayError>(build()?.send().await?) },
            |response: &Response| response.status() == StatusCode::UNAUTHORIZED,
            || self.check_auth(),
            || self.refresh_session(),
            cancellation,
        )
        .await
    }

    /// Open the chat stream and hand back the raw body.
    ///
    /// Non-2xx responses become [`GatewayError::Status`] with the body
    /// message truncated for display.
    pub async fn open_stream(
        &self,
        request: &ChatStreamRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ByteStream, GatewayError> {
        let response = self
            .send_with_auth(|| self.build_stream_request(request), cancellation)
            .await?;
        let response = ensure_success(response, cancellation).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(GatewayError::from))
            .boxed())
    }

    pub(crate) async fn get_json<T>(&self, url: &str) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .send_with_auth(
                || Ok(self.http.get(url).headers(self.build_headers(APPLICATION_JSON)?)),
                None,
            )
            .await?;
        let response = ensure_success(response, None).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// The 401 recovery flow, independent of the HTTP types.
///
/// `send` runs once, and once more only when the auth check asks for a
/// refresh and the refresh succeeds. Every other path hands back the first
/// response so the caller reports the original 401.
pub(crate) async fn retry_unauthorized<T, S, SF, C, CF, R, RF>(
    send: S,
    is_unauthorized: impl Fn(&T) -> bool,
    check: C,
    refresh: R,
    cancellation: Option<&CancellationSignal>,
) -> Result<T, GatewayError>
where
    S: Fn() -> SF,
    SF: Future<Output = Result<T, GatewayError>>,
    C: FnOnce() -> CF,
    CF: Future<Output = Result<AuthCheckStatus, GatewayError>>,
    R: FnOnce() -> RF,
    RF: Future<Output = Result<bool, GatewayError>>,
{
    if is_cancelled(cancellation) {
        return Err(GatewayError::Cancelled);
    }

    let response = await_or_cancel(send(), cancellation).await??;
    if !is_unauthorized(&response) {
        return Ok(response);
    }

    tracing::warn!("gateway returned 401, checking auth state");
    match await_or_cancel(check(), cancellation).await? {
        Ok(AuthCheckStatus::RefreshRequired) => {}
        Ok(status) => {
            tracing::warn!(?status, "auth check did not offer a refresh");
            return Ok(response);
        }
        Err(error) => {
            tracing::warn!(%error, "auth check failed; keeping original 401");
            return Ok(response);
        }
    }

    match await_or_cancel(refresh(), cancellation).await? {
        Ok(true) => {
            tracing::debug!("session refreshed, retrying original request once");
            await_or_cancel(send(), cancellation).await?
        }
        Ok(false) => {
            tracing::warn!("session refresh was rejected");
            Ok(response)
        }
        Err(error) => {
            tracing::warn!(%error, "session refresh failed; keeping original 401");
            Ok(response)
        }
    }
}

/// Convert a non-2xx response into [`GatewayError::Status`].
pub(crate) async fn ensure_success(
    response: Response,
    cancellation: Option<&CancellationSignal>,
) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = await_or_cancel(response.text(), cancellation)
        .await?
        .unwrap_or_default();
    Err(GatewayError::Status(status, parse_error_message(status, &body)))
}

pub fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

/// Await `future`, polling the cancellation signal while it is pending.
pub async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, GatewayError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(GatewayError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(GatewayError::Cancelled);
            }
            return Ok(output);
        }
    }
}
