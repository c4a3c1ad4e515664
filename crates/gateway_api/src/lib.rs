//! Transport-only client primitives for the chat gateway.
//!
//! This crate owns request building, response streaming and line framing for
//! the chat backend, plus the thin collaborators the chat client needs at the
//! boundary: cookie-based auth refresh, history loading and image upload. It
//! contains no session state and no UI coupling.
//!
//! Provider-specific "thinking" encodings are normalized here into a single
//! [`StreamEvent::Thought`] variant so downstream consumers never sniff raw
//! fields.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod history;
pub mod payload;
pub mod sse;
pub mod upload;
pub mod url;

pub use auth::AuthCheckStatus;
pub use client::{await_or_cancel, is_cancelled, ByteStream, CancellationSignal, GatewayClient};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use events::{StreamEvent, ThoughtEncoding, UsageSummary};
pub use history::{HistoryMessage, SessionSummary};
pub use payload::{ChatStreamRequest, ThinkingConfig, Turn, TurnRole};
pub use sse::{ChunkParser, LineParseError, ParsedRecord};
pub use upload::{ImageUpload, UploadedImage};
pub use url::{normalize_base_url, ApiRoute};

pub use reqwest::StatusCode;
