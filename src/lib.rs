//! Streaming chat session core.
//!
//! A [`StreamRuntime`] owns the one in-flight response stream and the visible
//! message list. The [`NavigationReconciler`] keeps that state coherent across
//! route changes, so exactly one assistant response is ever composed per chat
//! session, even under rapid navigation, model switches and aborts.
//!
//! Transport, framing and event normalization live in `gateway_api`; this
//! crate turns the normalized events into message state.

pub mod controller;
pub mod message;
pub mod navigation;
pub mod runtime;
pub mod thought;
pub mod transport;

pub use controller::{
    Progress, StreamCompletion, StreamController, StreamHandle, StreamId, StreamOutcome,
    StreamPhase,
};
pub use message::{messages_from_history, Message, Role, SessionId};
pub use navigation::{
    ChatPhase, HandoffState, NavigationReconciler, NavigationRequest, Route, SendReceipt,
    SendRejected, StreamHost, DEFAULT_HANDOFF_DELAY,
};
pub use runtime::{ControllerSnapshot, StreamRuntime, DEFAULT_SYSTEM_PROMPT};
pub use thought::ThoughtAssembler;
pub use transport::StreamTransport;
