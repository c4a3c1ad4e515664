use std::collections::BTreeMap;

use crate::config::GatewayConfig;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_CLIENT_PLATFORM: &str = "x-client-platform";
pub const HEADER_USER_AGENT: &str = "user-agent";

pub const EVENT_STREAM: &str = "text/event-stream";
pub const APPLICATION_JSON: &str = "application/json";

/// Build a deterministic header map for gateway requests.
///
/// `accept` selects the response media type: event-stream for the chat
/// endpoint, JSON for everything else.
pub fn build_headers(
    config: &GatewayConfig,
    accept: &str,
    user_agent: Option<&str>,
) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    headers.insert(HEADER_ACCEPT.to_owned(), accept.to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        APPLICATION_JSON.to_owned(),
    );

    if let Some(platform) = sanitize_nonempty(&config.client_platform) {
        headers.insert(HEADER_CLIENT_PLATFORM.to_owned(), platform);
    }

    let ua = match (user_agent, config.user_agent.as_deref()) {
        (Some(explicit), _) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        (None, Some(explicit)) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        _ => default_user_agent(),
    };
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    headers
}

fn sanitize_nonempty(value: &str) -> Option<String> {
    Some(value.trim())
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_owned)
}

fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match HostPlatform::detect() {
        Some(host) => format!(
            "stream-chat/{version} ({} {}; {})",
            host.os, host.release, host.arch
        ),
        None => format!("stream-chat/{version}"),
    }
}

/// Kernel name, release and machine of the running host.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HostPlatform {
    os: String,
    release: String,
    arch: String,
}

impl HostPlatform {
    #[cfg(unix)]
    fn detect() -> Option<Self> {
        // SAFETY: `utsname` is plain old data, so the zeroed value is valid and
        // `uname` only writes NUL-terminated strings into it.
        let mut raw: libc::utsname = unsafe { std::mem::zeroed() };
        if unsafe { libc::uname(&mut raw) } != 0 {
            return None;
        }

        let host = Self {
            os: c_field(&raw.sysname).to_lowercase(),
            release: c_field(&raw.release),
            arch: canonical_arch(&c_field(&raw.machine)),
        };
        let complete = [&host.os, &host.release, &host.arch]
            .iter()
            .all(|part| !part.is_empty());
        complete.then_some(host)
    }

    #[cfg(not(unix))]
    fn detect() -> Option<Self> {
        None
    }
}

#[cfg(unix)]
fn c_field(field: &[libc::c_char]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .take_while(|byte| **byte != 0)
        .map(|byte| *byte as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn canonical_arch(arch: &str) -> String {
    let lower = arch.to_ascii_lowercase();
    let canonical = match lower.as_str() {
        "x86_64" | "amd64" => "x64",
        "x86" | "i386" | "i686" => "ia32",
        "aarch64" => "arm64",
        other => other,
    };
    canonical.to_owned()
}
