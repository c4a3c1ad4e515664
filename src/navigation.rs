//! Route changes reconciled against the live stream.
//!
//! The reconciler decides, on every landing, whether loaded history or the
//! controller's live context is shown, and runs the new-chat send flow that
//! hands a streaming session over to its permanent route.

use std::time::Duration;

use model_registry::ModelConfig;
use session_prefs::{SessionPreferences, NEW_CHAT_KEY};
use thiserror::Error;

use crate::controller::StreamCompletion;
use crate::message::{Message, SessionId};
use crate::runtime::StreamRuntime;

/// Delay before the new-chat hand-off navigation. Cosmetic only.
pub const DEFAULT_HANDOFF_DELAY: Duration = Duration::from_millis(50);

const CHAT_ROUTE_PREFIX: &str = "/chat/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    NewChat,
    Chat(SessionId),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Self::NewChat => "/".to_owned(),
            Self::Chat(id) => format!("{CHAT_ROUTE_PREFIX}{id}"),
        }
    }

    pub fn parse(path: &str) -> Option<Self> {
        let path = path.trim();
        if path.is_empty() || path == "/" {
            return Some(Self::NewChat);
        }
        let id = path.strip_prefix(CHAT_ROUTE_PREFIX)?.trim_end_matches('/');
        if id.is_empty() || id.contains('/') {
            return None;
        }
        Some(Self::Chat(SessionId::new(id)))
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::NewChat => None,
            Self::Chat(id) => Some(id),
        }
    }

    /// Key into [`SessionPreferences`].
    pub fn preference_key(&self) -> &str {
        match self {
            Self::NewChat => NEW_CHAT_KEY,
            Self::Chat(id) => id.as_str(),
        }
    }
}

/// State carried by the new-chat hand-off navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffState {
    pub initial_messages: Vec<Message>,
    pub from_new_chat_flow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub route: Route,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
    pub state: Option<HandoffState>,
    pub delay: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatPhase {
    #[default]
    Initializing,
    PreparingContent,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendRejected {
    #[error("message is empty")]
    EmptyPrompt,
    #[error("a response is still streaming")]
    StreamInProgress,
    #[error("chat is still loading")]
    NotReady,
}

#[derive(Debug)]
pub struct SendReceipt {
    pub session_id: SessionId,
    pub completion: StreamCompletion,
    /// Set when the send happened on the new-chat page.
    pub navigation: Option<NavigationRequest>,
}

/// What the reconciler needs from the stream layer.
pub trait StreamHost {
    fn messages(&self) -> Vec<Message>;
    fn focus(&self) -> Option<SessionId>;
    fn streaming_session(&self) -> Option<SessionId>;
    fn set_messages_for_context(&self, messages: Vec<Message>, focus: Option<SessionId>);
    fn clear_stream_state(&self);
    fn start_stream(
        &self,
        prompt: &str,
        model: &ModelConfig,
        session_id: &SessionId,
        thinking_enabled: Option<bool>,
    ) -> StreamCompletion;

    fn is_streaming_for(&self, session_id: &SessionId) -> bool {
        self.streaming_session().as_ref() == Some(session_id)
    }
}

impl StreamHost for StreamRuntime {
    fn messages(&self) -> Vec<Message> {
        self.snapshot().messages
    }

    fn focus(&self) -> Option<SessionId> {
        self.snapshot().focus
    }

    fn streaming_session(&self) -> Option<SessionId> {
        self.snapshot().streaming_session
    }

    fn set_messages_for_context(&self, messages: Vec<Message>, focus: Option<SessionId>) {
        StreamRuntime::set_messages_for_context(self, messages, focus);
    }

    fn clear_stream_state(&self) {
        StreamRuntime::clear_stream_state(self);
    }

    fn start_stream(
        &self,
        prompt: &str,
        model: &ModelConfig,
        session_id: &SessionId,
        thinking_enabled: Option<bool>,
    ) -> StreamCompletion {
        StreamRuntime::start_stream(self, prompt, model, session_id, thinking_enabled)
    }
}

#[derive(Debug)]
pub struct NavigationReconciler {
    route: Route,
    phase: ChatPhase,
    /// Session started from the new-chat page whose route has not loaded yet.
    pending_new_chat: Option<SessionId>,
    handoff_delay: Duration,
}

impl Default for NavigationReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationReconciler {
    pub fn new() -> Self {
        Self {
            route: Route::NewChat,
            phase: ChatPhase::Initializing,
            pending_new_chat: None,
            handoff_delay: DEFAULT_HANDOFF_DELAY,
        }
    }

    #[must_use]
    pub fn with_handoff_delay(mut self, delay: Duration) -> Self {
        self.handoff_delay = delay;
        self
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn is_new_chat_in_transition(&self) -> bool {
        self.pending_new_chat.is_some()
    }

    /// A route finished loading. `history` is what the loader fetched for a
    /// chat route; `navigation_state` is taken so a hand-off applies once.
    pub fn on_route_loaded(
        &mut self,
        host: &dyn StreamHost,
        route: Route,
        history: Vec<Message>,
        navigation_state: &mut Option<HandoffState>,
    ) {
        self.phase = ChatPhase::PreparingContent;
        let handoff = navigation_state
            .take()
            .filter(|state| state.from_new_chat_flow);

        match &route {
            Route::NewChat => {
                let mid_transition = self
                    .pending_new_chat
                    .as_ref()
                    .is_some_and(|pending| host.is_streaming_for(pending));
                if mid_transition {
                    tracing::debug!("keeping new-chat stream during hand-off");
                } else {
                    self.pending_new_chat = None;
                    host.clear_stream_state();
                }
            }
            Route::Chat(id) => {
                let handing_off = handoff.is_some() || self.pending_new_chat.as_ref() == Some(id);
                if self.pending_new_chat.as_ref() == Some(id) {
                    self.pending_new_chat = None;
                }
                self.load_chat(host, id, history, handoff, handing_off);
            }
        }

        self.route = route;
        self.phase = ChatPhase::Ready;
    }

    fn load_chat(
        &self,
        host: &dyn StreamHost,
        id: &SessionId,
        history: Vec<Message>,
        handoff: Option<HandoffState>,
        handing_off: bool,
    ) {
        let streaming_here = host.is_streaming_for(id);
        let focused_here = host.focus().as_ref() == Some(id);

        if streaming_here {
            tracing::debug!(session_id = %id, "live stream wins over loaded history");
            return;
        }

        // The hand-off target already holds the session's newest turns, even
        // when its stream finished before the route landed.
        if focused_here && !host.messages().is_empty() && (handing_off || history.is_empty()) {
            tracing::debug!(
                session_id = %id,
                handing_off,
                "keeping held messages over loaded history"
            );
            return;
        }

        if host.focus().is_some() && !focused_here {
            host.clear_stream_state();
        }

        let messages = match handoff {
            Some(state) if !state.initial_messages.is_empty() => state.initial_messages,
            _ => history,
        };
        host.set_messages_for_context(messages, Some(id.clone()));
    }

    /// Send `input` in the current chat.
    ///
    /// On the new-chat page this creates the session and returns the
    /// hand-off navigation to its permanent route.
    pub fn send_message(
        &mut self,
        host: &dyn StreamHost,
        prefs: &mut SessionPreferences,
        input: &str,
        model: &ModelConfig,
        thinking_enabled: Option<bool>,
    ) -> Result<SendReceipt, SendRejected> {
        let prompt = input.trim();
        if prompt.is_empty() {
            return Err(SendRejected::EmptyPrompt);
        }
        if self.phase != ChatPhase::Ready {
            return Err(SendRejected::NotReady);
        }
        if host.streaming_session().is_some() {
            return Err(SendRejected::StreamInProgress);
        }

        prefs.set_model(self.route.preference_key(), model.id.clone());
        if let Some(enabled) = thinking_enabled {
            prefs.set_thinking_enabled(self.route.preference_key(), enabled);
        }

        match self.route.clone() {
            Route::NewChat => {
                let session_id = SessionId::new_random();
                prefs.prime_model(session_id.as_str());

                let user = Message::user(prompt);
                host.set_messages_for_context(vec![user.clone()], Some(session_id.clone()));
                let completion = host.start_stream(prompt, model, &session_id, thinking_enabled);
                self.pending_new_chat = Some(session_id.clone());

                Ok(SendReceipt {
                    navigation: Some(NavigationRequest {
                        route: Route::Chat(session_id.clone()),
                        replace: true,
                        state: Some(HandoffState {
                            initial_messages: vec![user],
                            from_new_chat_flow: true,
                        }),
                        delay: self.handoff_delay,
                    }),
                    session_id,
                    completion,
                })
            }
            Route::Chat(session_id) => {
                let mut messages = host.messages();
                messages.push(Message::user(prompt));
                host.set_messages_for_context(messages, Some(session_id.clone()));
                let completion = host.start_stream(prompt, model, &session_id, thinking_enabled);

                Ok(SendReceipt {
                    session_id,
                    completion,
                    navigation: None,
                })
            }
        }
    }
}
