//! Line-oriented terminal client for the streaming chat core.
//!
//! ## Configuration
//!
//! Everything is optional. Set `STREAM_CHAT_CONFIG_PATH` to a UTF-8 JSON file
//! with this shape:
//!
//! ```json
//! {
//!   "base_url": "http://localhost:8000",
//!   "session_cookie": "access_token=...; refresh_token=...",
//!   "system_prompt": "You are a helpful assistant.",
//!   "timeout_sec": 120,
//!   "default_model": "gpt-4.1",
//!   "handoff_delay_ms": 50,
//!   "models": [{ "id": "gpt-4.1", "provider": "azure", "display_name": "GPT-4.1" }]
//! }
//! ```
//!
//! Contract notes:
//! - `timeout_sec` must be > 0 when provided.
//! - `default_model` must name an entry of `models` (or of the built-in list).
//! - Unknown JSON fields are rejected.
//!
//! `STREAM_CHAT_BASE_URL`, `STREAM_CHAT_COOKIE` and `STREAM_CHAT_SYSTEM_PROMPT`
//! override the file. `STREAM_CHAT_LOG` takes a `tracing` filter directive
//! (default `warn`); logs go to stderr.

pub mod app;
pub mod commands;
pub mod config;
pub mod render;

pub use app::{ChatApp, ChatBackend};
pub use config::{CliConfig, ConfigError};
